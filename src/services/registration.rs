use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::external::{EmailPayload, Notification, PartyType};
use crate::models::*;
use crate::services::{inventory, outbox, pricing, refund};
use crate::utils::{format_credential, generate_token};
use chrono::Utc;
use serde_json::json;

#[derive(Clone)]
pub struct RegistrationService {
    pool: DbPool,
}

impl RegistrationService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Atomically book a cart for a member: validates the event, the cart and
    /// the inventory, prices it, persists the registration with snapshotted
    /// unit prices, claims capacity and promo uses, and enqueues the
    /// post-commit notifications on the outbox. Any failure rolls the whole
    /// unit of work back.
    pub async fn register(
        &self,
        event_id: i64,
        member_id: i64,
        request: RegisterRequest,
    ) -> AppResult<RegisterResponse> {
        if request.items.is_empty() {
            return Err(AppError::ValidationError("Cart is empty".to_string()));
        }
        for line in &request.items {
            if line.quantity <= 0 {
                return Err(AppError::ValidationError(
                    "Ticket quantity must be positive".to_string(),
                ));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for line in &request.items {
            if !seen.insert(line.ticket_type_id) {
                return Err(AppError::ValidationError(
                    "Duplicate ticket type in cart".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        if !event.is_published {
            return Err(AppError::StateError("Event is not published".to_string()));
        }
        if event.is_cancelled {
            return Err(AppError::StateError("Event has been cancelled".to_string()));
        }
        if event.start_at <= now {
            return Err(AppError::StateError("Event has already started".to_string()));
        }

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM registrations WHERE event_id = ?1 AND member_id = ?2 AND status != 'cancelled'",
        )
        .bind(event_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(AppError::StateError(
                "You are already registered for this event".to_string(),
            ));
        }

        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?1")
            .bind(member_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        // Validate every line before any counter moves; one bad line aborts
        // the whole cart.
        let mut cart: Vec<(TicketType, i64)> = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let ticket_type = sqlx::query_as::<_, TicketType>(
                "SELECT * FROM ticket_types WHERE id = ?1 AND event_id = ?2",
            )
            .bind(line.ticket_type_id)
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

            if ticket_type.is_hidden {
                let supplied = request.access_code.as_deref().unwrap_or("");
                if ticket_type.access_code.as_deref() != Some(supplied) {
                    return Err(AppError::InventoryError(format!(
                        "Access code required for '{}'",
                        ticket_type.name
                    )));
                }
            }

            inventory::validate_order(
                &mut *tx,
                &ticket_type,
                member_id,
                member.gender,
                line.quantity,
                now,
            )
            .await?;

            cart.push((ticket_type, line.quantity));
        }

        let promo = match request.promo_code.as_deref() {
            Some(raw) => {
                let normalized = raw.trim().to_uppercase();
                let code = sqlx::query_as::<_, DiscountCode>(
                    "SELECT * FROM discount_codes WHERE event_id = ?1 AND code = ?2",
                )
                .bind(event_id)
                .bind(&normalized)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::DiscountError("Promo code not found".to_string()))?;

                // Codes are event-scoped; a same-named code at another event
                // is a different code.
                let user_uses: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM registrations WHERE member_id = ?1 AND promo_code = ?2 AND event_id = ?3 AND status != 'cancelled'",
                )
                .bind(member_id)
                .bind(&normalized)
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await?;

                Some(pricing::PromoContext { code, user_uses })
            }
            None => None,
        };

        let rules = sqlx::query_as::<_, PricingRule>(
            "SELECT * FROM pricing_rules WHERE event_id = ?1 AND is_active = 1",
        )
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await?;

        let quote = pricing::price(&cart, promo.as_ref(), &rules, now)?;

        for (ticket_type, quantity) in &cart {
            inventory::reserve(&mut *tx, ticket_type.id, *quantity).await?;
        }

        let mut applied_code = None;
        if quote.promo_applied {
            if let Some(ctx) = promo.as_ref() {
                let claimed = sqlx::query(
                    r#"
                    UPDATE discount_codes
                    SET current_uses = current_uses + 1
                    WHERE id = ?1 AND (max_uses IS NULL OR current_uses < max_uses)
                    "#,
                )
                .bind(ctx.code.id)
                .execute(&mut *tx)
                .await?;
                if claimed.rows_affected() == 0 {
                    return Err(AppError::DiscountError(
                        "Promo code usage limit reached".to_string(),
                    ));
                }
                applied_code = Some(ctx.code.code.clone());
            }
        }

        let token = generate_token();
        let registration_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO registrations (
                event_id, member_id, status, total_amount, discount_amount,
                promo_code, qr_token, created_at
            ) VALUES (?1, ?2, 'registered', ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(member_id)
        .bind(quote.total)
        .bind(quote.discount_amount)
        .bind(&applied_code)
        .bind(&token)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for line in &quote.lines {
            sqlx::query(
                r#"
                INSERT INTO registration_tickets (
                    registration_id, ticket_type_id, quantity, unit_price, line_total
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(registration_id)
            .bind(line.ticket_type_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        // Registering supersedes bookmarking.
        sqlx::query("DELETE FROM event_bookmarks WHERE member_id = ?1 AND event_id = ?2")
            .bind(member_id)
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        let qr_credential = format_credential(event_id, registration_id, &token);

        outbox::enqueue_notification(
            &mut *tx,
            &Notification {
                recipient_id: event.organizer_id,
                recipient_type: PartyType::Organizer,
                actor_id: Some(member_id),
                actor_type: Some(PartyType::Member),
                event_type: "event_registration".to_string(),
                payload: json!({
                    "event_id": event_id,
                    "registration_id": registration_id,
                    "member_name": member.name,
                    "total_amount": quote.total,
                }),
            },
        )
        .await?;

        outbox::enqueue_email(
            &mut *tx,
            member_id,
            &EmailPayload::BookingConfirmation {
                to: member.email.clone(),
                member_name: member.name.clone(),
                event_title: event.title.clone(),
                qr_credential: qr_credential.clone(),
                total_amount: quote.total,
            },
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "Registration {registration_id} created for member {member_id} on event {event_id} (total {})",
            quote.total
        );

        Ok(RegisterResponse {
            registration_id,
            qr_credential,
            total_amount: quote.total,
            discount_amount: quote.discount_amount,
        })
    }

    /// Cancel the member's active registration, compute the refund from each
    /// line's current refund policy and return the claimed capacity.
    pub async fn cancel(&self, event_id: i64, member_id: i64) -> AppResult<CancelResponse> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Scoped to status = 'registered': a second cancellation finds nothing.
        let registration = sqlx::query_as::<_, Registration>(
            "SELECT * FROM registrations WHERE event_id = ?1 AND member_id = ?2 AND status = 'registered'",
        )
        .bind(event_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("No active registration for this event".to_string()))?;

        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;

        let lines = sqlx::query_as::<_, RegistrationTicket>(
            "SELECT * FROM registration_tickets WHERE registration_id = ?1",
        )
        .bind(registration.id)
        .fetch_all(&mut *tx)
        .await?;

        // Refund terms are re-read from the ticket type at cancellation time.
        let mut lines_with_policies = Vec::with_capacity(lines.len());
        for line in lines {
            let ticket_type = sqlx::query_as::<_, TicketType>(
                "SELECT * FROM ticket_types WHERE id = ?1",
            )
            .bind(line.ticket_type_id)
            .fetch_one(&mut *tx)
            .await?;
            lines_with_policies.push((line, ticket_type.refund_policy()));
        }

        let refund_amount = refund::refund_for(&lines_with_policies, event.start_at, now);

        let updated = sqlx::query(
            r#"
            UPDATE registrations
            SET status = 'cancelled', cancelled_at = ?1, refund_amount = ?2
            WHERE id = ?3 AND status = 'registered'
            "#,
        )
        .bind(now)
        .bind(refund_amount)
        .bind(registration.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::StateError(
                "Registration is no longer active".to_string(),
            ));
        }

        for (line, _) in &lines_with_policies {
            inventory::release(&mut *tx, line.ticket_type_id, line.quantity).await?;
        }

        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?1")
            .bind(member_id)
            .fetch_one(&mut *tx)
            .await?;

        outbox::enqueue_notification(
            &mut *tx,
            &Notification {
                recipient_id: event.organizer_id,
                recipient_type: PartyType::Organizer,
                actor_id: Some(member_id),
                actor_type: Some(PartyType::Member),
                event_type: "registration_cancelled".to_string(),
                payload: json!({
                    "event_id": event_id,
                    "registration_id": registration.id,
                    "refund_amount": refund_amount,
                }),
            },
        )
        .await?;

        outbox::enqueue_email(
            &mut *tx,
            member_id,
            &EmailPayload::BookingCancellation {
                to: member.email,
                member_name: member.name,
                event_title: event.title,
                refund_amount,
            },
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "Registration {} cancelled for member {member_id} on event {event_id} (refund {refund_amount})",
            registration.id
        );

        Ok(CancelResponse { refund_amount })
    }

    /// Full ticket detail for the member's own registration, including the QR
    /// payload and the price breakdown.
    pub async fn my_ticket(&self, event_id: i64, member_id: i64) -> AppResult<TicketDetailResponse> {
        let registration = sqlx::query_as::<_, Registration>(
            "SELECT * FROM registrations WHERE event_id = ?1 AND member_id = ?2 AND status != 'cancelled'",
        )
        .bind(event_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No registration for this event".to_string()))?;

        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;

        let lines = sqlx::query_as::<_, (i64, String, i64, i64, i64)>(
            r#"
            SELECT rt.ticket_type_id, tt.name, rt.quantity, rt.unit_price, rt.line_total
            FROM registration_tickets rt
            JOIN ticket_types tt ON tt.id = rt.ticket_type_id
            WHERE rt.registration_id = ?1
            ORDER BY rt.id
            "#,
        )
        .bind(registration.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(
            |(ticket_type_id, ticket_type_name, quantity, unit_price, line_total)| {
                TicketLineDetail {
                    ticket_type_id,
                    ticket_type_name,
                    quantity,
                    unit_price,
                    line_total,
                }
            },
        )
        .collect();

        Ok(TicketDetailResponse {
            registration_id: registration.id,
            event_id,
            event_title: event.title,
            event_start_at: event.start_at,
            status: registration.status,
            total_amount: registration.total_amount,
            discount_amount: registration.discount_amount,
            promo_code: registration.promo_code,
            qr_credential: format_credential(event_id, registration.id, &registration.qr_token),
            lines,
            created_at: registration.created_at,
            checked_in_at: registration.checked_in_at,
        })
    }

    /// Organizer-only roster of non-cancelled registrations.
    pub async fn attendees(
        &self,
        event_id: i64,
        organizer_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<AttendeeRow>> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT organizer_id FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        match owner {
            None => return Err(AppError::NotFound("Event not found".to_string())),
            Some(id) if id != organizer_id => return Err(AppError::Forbidden),
            Some(_) => {}
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = ?1 AND status != 'cancelled'",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, AttendeeRow>(
            r#"
            SELECT r.id AS registration_id, r.member_id, m.name AS member_name,
                   m.email AS member_email, r.status, r.total_amount,
                   r.created_at, r.checked_in_at
            FROM registrations r
            JOIN members m ON m.id = r.member_id
            WHERE r.event_id = ?1 AND r.status != 'cancelled'
            ORDER BY r.created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(event_id)
        .bind(i64::from(params.get_limit()))
        .bind(i64::from(params.get_offset()))
        .fetch_all(&self.pool)
        .await?;

        Ok(PaginatedResponse::new(items, params, total))
    }

    /// Toggle the member's "interested" marker. Returns the new state.
    pub async fn toggle_bookmark(&self, event_id: i64, member_id: i64) -> AppResult<bool> {
        let removed = sqlx::query(
            "DELETE FROM event_bookmarks WHERE member_id = ?1 AND event_id = ?2",
        )
        .bind(member_id)
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO event_bookmarks (member_id, event_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(member_id)
        .bind(event_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(true)
    }
}
