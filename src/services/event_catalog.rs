use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::Utc;

/// Organizer-facing write surface for the sale catalog: events, ticket types,
/// discount codes and pricing rules. Discount percentages and refund policies
/// are validated here, at write time, so purchases never trip over data-entry
/// errors.
#[derive(Clone)]
pub struct EventCatalogService {
    pool: DbPool,
}

impl EventCatalogService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_event(
        &self,
        organizer_id: i64,
        request: CreateEventRequest,
    ) -> AppResult<Event> {
        if request.title.trim().is_empty() {
            return Err(AppError::ValidationError("Event title is required".to_string()));
        }
        if request.end_at <= request.start_at {
            return Err(AppError::ValidationError(
                "Event end must be after its start".to_string(),
            ));
        }

        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events (organizer_id, title, venue, start_at, end_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING id
            "#,
        )
        .bind(organizer_id)
        .bind(request.title.trim())
        .bind(&request.venue)
        .bind(request.start_at)
        .bind(request.end_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.load_event(id).await
    }

    pub async fn publish_event(&self, event_id: i64, organizer_id: i64) -> AppResult<Event> {
        self.require_owner(event_id, organizer_id).await?;

        sqlx::query("UPDATE events SET is_published = 1, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        self.load_event(event_id).await
    }

    pub async fn create_ticket_type(
        &self,
        event_id: i64,
        organizer_id: i64,
        request: CreateTicketTypeRequest,
    ) -> AppResult<TicketType> {
        self.require_owner(event_id, organizer_id).await?;

        if request.price < 0 {
            return Err(AppError::ValidationError("Price must not be negative".to_string()));
        }
        if let Some(cap) = request.total_capacity {
            if cap <= 0 {
                return Err(AppError::ValidationError(
                    "Capacity must be positive when set".to_string(),
                ));
            }
        }
        if request.min_per_order < 1 || request.max_per_order < request.min_per_order {
            return Err(AppError::ValidationError(
                "Per-order bounds are inconsistent".to_string(),
            ));
        }
        if request.is_hidden && request.access_code.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::ValidationError(
                "Hidden ticket types need an access code".to_string(),
            ));
        }
        request.refund_policy.validate()?;

        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ticket_types (
                event_id, name, price, total_capacity, sale_start_at, sale_end_at,
                is_hidden, access_code, min_per_order, max_per_order, max_per_user,
                gender_restriction, refund_allowed, refund_deadline_hours,
                refund_percentage, display_order, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(request.name.trim())
        .bind(request.price)
        .bind(request.total_capacity)
        .bind(request.sale_start_at)
        .bind(request.sale_end_at)
        .bind(request.is_hidden)
        .bind(&request.access_code)
        .bind(request.min_per_order)
        .bind(request.max_per_order)
        .bind(request.max_per_user)
        .bind(request.gender_restriction)
        .bind(request.refund_policy.allowed)
        .bind(request.refund_policy.deadline_hours_before)
        .bind(request.refund_policy.percentage)
        .bind(request.display_order)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.load_ticket_type(id).await
    }

    pub async fn update_ticket_type(
        &self,
        event_id: i64,
        ticket_type_id: i64,
        organizer_id: i64,
        request: UpdateTicketTypeRequest,
    ) -> AppResult<TicketType> {
        self.require_owner(event_id, organizer_id).await?;

        let current = sqlx::query_as::<_, TicketType>(
            "SELECT * FROM ticket_types WHERE id = ?1 AND event_id = ?2",
        )
        .bind(ticket_type_id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

        if let Some(policy) = &request.refund_policy {
            policy.validate()?;
        }
        if let Some(cap) = request.total_capacity {
            // Capacity can never be lowered below what is already sold.
            if cap < current.sold_count {
                return Err(AppError::ValidationError(
                    "Capacity cannot be below the sold count".to_string(),
                ));
            }
        }

        let policy = request.refund_policy.unwrap_or_else(|| current.refund_policy());
        sqlx::query(
            r#"
            UPDATE ticket_types
            SET name = ?1, price = ?2, total_capacity = ?3, sale_start_at = ?4,
                sale_end_at = ?5, is_active = ?6, refund_allowed = ?7,
                refund_deadline_hours = ?8, refund_percentage = ?9,
                display_order = ?10, updated_at = ?11
            WHERE id = ?12
            "#,
        )
        .bind(request.name.unwrap_or(current.name))
        .bind(request.price.unwrap_or(current.price))
        .bind(request.total_capacity.or(current.total_capacity))
        .bind(request.sale_start_at.or(current.sale_start_at))
        .bind(request.sale_end_at.or(current.sale_end_at))
        .bind(request.is_active.unwrap_or(current.is_active))
        .bind(policy.allowed)
        .bind(policy.deadline_hours_before)
        .bind(policy.percentage)
        .bind(request.display_order.unwrap_or(current.display_order))
        .bind(Utc::now())
        .bind(ticket_type_id)
        .execute(&self.pool)
        .await?;

        self.load_ticket_type(ticket_type_id).await
    }

    pub async fn create_discount_code(
        &self,
        event_id: i64,
        organizer_id: i64,
        request: CreateDiscountCodeRequest,
    ) -> AppResult<DiscountCode> {
        self.require_owner(event_id, organizer_id).await?;

        let normalized = request.code.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(AppError::ValidationError("Code is required".to_string()));
        }
        if request.value <= 0 {
            return Err(AppError::ValidationError(
                "Discount value must be positive".to_string(),
            ));
        }
        if request.discount_type == DiscountType::Percentage && request.value > 100 {
            return Err(AppError::ValidationError(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }

        let allowlist = match &request.ticket_type_ids {
            Some(ids) => Some(serde_json::to_string(ids)?),
            None => None,
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO discount_codes (
                event_id, code, discount_type, value, max_uses, max_uses_per_user,
                valid_from, valid_until, min_cart_value, ticket_type_ids,
                stackable, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(&normalized)
        .bind(request.discount_type)
        .bind(request.value)
        .bind(request.max_uses)
        .bind(request.max_uses_per_user)
        .bind(request.valid_from)
        .bind(request.valid_until)
        .bind(request.min_cart_value)
        .bind(allowlist)
        .bind(request.stackable)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let code = sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(code)
    }

    pub async fn create_pricing_rule(
        &self,
        event_id: i64,
        organizer_id: i64,
        request: CreatePricingRuleRequest,
    ) -> AppResult<PricingRule> {
        self.require_owner(event_id, organizer_id).await?;

        if request.value <= 0 {
            return Err(AppError::ValidationError(
                "Discount value must be positive".to_string(),
            ));
        }
        if request.discount_type == DiscountType::Percentage && request.value > 100 {
            return Err(AppError::ValidationError(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }
        match request.rule_kind {
            RuleKind::EarlyBirdVolume | RuleKind::Group => {
                if request.quantity_threshold.unwrap_or(0) <= 0 {
                    return Err(AppError::ValidationError(
                        "This rule kind needs a positive quantity threshold".to_string(),
                    ));
                }
            }
            RuleKind::EarlyBirdDate => {}
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO pricing_rules (
                event_id, ticket_type_id, rule_kind, discount_type, value,
                quantity_threshold, valid_from, valid_until, priority, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(request.ticket_type_id)
        .bind(request.rule_kind)
        .bind(request.discount_type)
        .bind(request.value)
        .bind(request.quantity_threshold)
        .bind(request.valid_from)
        .bind(request.valid_until)
        .bind(request.priority)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let rule = sqlx::query_as::<_, PricingRule>("SELECT * FROM pricing_rules WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(rule)
    }

    async fn require_owner(&self, event_id: i64, organizer_id: i64) -> AppResult<()> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT organizer_id FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        match owner {
            None => Err(AppError::NotFound("Event not found".to_string())),
            Some(id) if id != organizer_id => Err(AppError::Forbidden),
            Some(_) => Ok(()),
        }
    }

    async fn load_event(&self, id: i64) -> AppResult<Event> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(event)
    }

    async fn load_ticket_type(&self, id: i64) -> AppResult<TicketType> {
        let ticket_type = sqlx::query_as::<_, TicketType>("SELECT * FROM ticket_types WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(ticket_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_util::*;
    use chrono::Duration;

    #[tokio::test]
    async fn write_time_validation_rejects_bad_percentages() {
        let pool = setup_pool().await;
        let organizer = seed_member(&pool, "org@example.com", None).await;
        let event_id = seed_event(&pool, organizer, Duration::hours(48)).await;

        let svc = EventCatalogService::new(pool.clone());
        let err = svc
            .create_discount_code(
                event_id,
                organizer,
                CreateDiscountCodeRequest {
                    code: "TOOBIG".to_string(),
                    discount_type: DiscountType::Percentage,
                    value: 150,
                    max_uses: None,
                    max_uses_per_user: None,
                    valid_from: None,
                    valid_until: None,
                    min_cart_value: None,
                    ticket_type_ids: None,
                    stackable: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn codes_are_stored_uppercase() {
        let pool = setup_pool().await;
        let organizer = seed_member(&pool, "org@example.com", None).await;
        let event_id = seed_event(&pool, organizer, Duration::hours(48)).await;

        let svc = EventCatalogService::new(pool.clone());
        let code = svc
            .create_discount_code(
                event_id,
                organizer,
                CreateDiscountCodeRequest {
                    code: "  early10 ".to_string(),
                    discount_type: DiscountType::Percentage,
                    value: 10,
                    max_uses: None,
                    max_uses_per_user: None,
                    valid_from: None,
                    valid_until: None,
                    min_cart_value: None,
                    ticket_type_ids: None,
                    stackable: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(code.code, "EARLY10");
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_sold() {
        let pool = setup_pool().await;
        let organizer = seed_member(&pool, "org@example.com", None).await;
        let event_id = seed_event(&pool, organizer, Duration::hours(48)).await;
        let tt = seed_ticket_type(&pool, event_id, 500, Some(10)).await;
        sqlx::query("UPDATE ticket_types SET sold_count = 5 WHERE id = ?1")
            .bind(tt)
            .execute(&pool)
            .await
            .unwrap();

        let svc = EventCatalogService::new(pool.clone());
        let err = svc
            .update_ticket_type(
                event_id,
                tt,
                organizer,
                UpdateTicketTypeRequest {
                    name: None,
                    price: None,
                    total_capacity: Some(3),
                    sale_start_at: None,
                    sale_end_at: None,
                    is_active: None,
                    refund_policy: None,
                    display_order: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn only_the_owner_writes_the_catalog() {
        let pool = setup_pool().await;
        let organizer = seed_member(&pool, "org@example.com", None).await;
        let stranger = seed_member(&pool, "other@example.com", None).await;
        let event_id = seed_event(&pool, organizer, Duration::hours(48)).await;

        let svc = EventCatalogService::new(pool.clone());
        let err = svc.publish_event(event_id, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn volume_rule_requires_threshold() {
        let pool = setup_pool().await;
        let organizer = seed_member(&pool, "org@example.com", None).await;
        let event_id = seed_event(&pool, organizer, Duration::hours(48)).await;

        let svc = EventCatalogService::new(pool.clone());
        let err = svc
            .create_pricing_rule(
                event_id,
                organizer,
                CreatePricingRuleRequest {
                    ticket_type_id: None,
                    rule_kind: RuleKind::EarlyBirdVolume,
                    discount_type: DiscountType::Percentage,
                    value: 10,
                    quantity_threshold: None,
                    valid_from: None,
                    valid_until: None,
                    priority: 100,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
