use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::parse_credential;
use chrono::Utc;

#[derive(Clone)]
pub struct AdmissionService {
    pool: DbPool,
}

impl AdmissionService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Verify a scanned QR credential and check the attendee in.
    ///
    /// The registered→attended transition is a conditional UPDATE: only the
    /// first of two simultaneous scans flips the row, the second is told the
    /// ticket was already used. No transaction wraps anything else.
    pub async fn verify(
        &self,
        event_id: i64,
        organizer_id: i64,
        qr_data: &str,
    ) -> AppResult<VerifyTicketResponse> {
        let credential = parse_credential(qr_data).ok_or(AppError::CredentialError)?;
        if credential.event_id != event_id {
            return Err(AppError::CredentialError);
        }

        let owner: Option<i64> = sqlx::query_scalar("SELECT organizer_id FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        match owner {
            None => return Err(AppError::NotFound("Event not found".to_string())),
            Some(id) if id != organizer_id => return Err(AppError::Forbidden),
            Some(_) => {}
        }

        let registration = sqlx::query_as::<_, Registration>(
            "SELECT * FROM registrations WHERE id = ?1 AND event_id = ?2",
        )
        .bind(credential.registration_id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::CredentialError)?;

        if registration.qr_token != credential.token {
            return Err(AppError::CredentialError);
        }

        match registration.status {
            RegistrationStatus::Cancelled | RegistrationStatus::Refunded => {
                return Err(AppError::StateError("Ticket has been cancelled".to_string()));
            }
            RegistrationStatus::Attended => {
                let when = registration
                    .checked_in_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "earlier".to_string());
                return Err(AppError::StateError(format!(
                    "Ticket already checked in at {when}"
                )));
            }
            RegistrationStatus::Registered => {}
        }

        let checked_in_at = Utc::now();
        let updated = sqlx::query(
            r#"
            UPDATE registrations
            SET status = 'attended', checked_in_at = ?1
            WHERE id = ?2 AND status = 'registered'
            "#,
        )
        .bind(checked_in_at)
        .bind(registration.id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            // Lost the race to another scan or a concurrent cancellation.
            return Err(AppError::StateError(
                "Ticket already checked in".to_string(),
            ));
        }

        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?1")
            .bind(registration.member_id)
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

        log::info!(
            "Registration {} checked in for event {event_id}",
            registration.id
        );

        Ok(VerifyTicketResponse {
            registration_id: registration.id,
            member_name: member.name,
            member_email: member.email,
            checked_in_at,
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registration::RegistrationService;
    use crate::services::test_util::*;
    use chrono::Duration;

    async fn booked(
        pool: &crate::database::DbPool,
    ) -> (i64, i64, i64, String) {
        let organizer = seed_member(pool, "org@example.com", None).await;
        let member = seed_member(pool, "m@example.com", None).await;
        let event_id = seed_event(pool, organizer, Duration::hours(48)).await;
        let tt = seed_ticket_type(pool, event_id, 500, None).await;

        let svc = RegistrationService::new(pool.clone());
        let res = svc
            .register(
                event_id,
                member,
                RegisterRequest {
                    items: vec![CartLine {
                        ticket_type_id: tt,
                        quantity: 1,
                        unit_price: None,
                    }],
                    promo_code: None,
                    access_code: None,
                },
            )
            .await
            .unwrap();

        (event_id, organizer, member, res.qr_credential)
    }

    #[tokio::test]
    async fn valid_scan_checks_in_exactly_once() {
        let pool = setup_pool().await;
        let (event_id, organizer, _member, credential) = booked(&pool).await;

        let svc = AdmissionService::new(pool.clone());
        let first = svc.verify(event_id, organizer, &credential).await.unwrap();
        assert_eq!(first.lines.len(), 1);

        let second = svc.verify(event_id, organizer, &credential).await.unwrap_err();
        assert!(matches!(second, AppError::StateError(_)));

        let status: String =
            sqlx::query_scalar("SELECT status FROM registrations WHERE id = ?1")
                .bind(first.registration_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "attended");
    }

    #[tokio::test]
    async fn cancelled_ticket_is_rejected_without_transition() {
        let pool = setup_pool().await;
        let (event_id, organizer, member, credential) = booked(&pool).await;

        RegistrationService::new(pool.clone())
            .cancel(event_id, member)
            .await
            .unwrap();

        let svc = AdmissionService::new(pool.clone());
        let err = svc.verify(event_id, organizer, &credential).await.unwrap_err();
        assert!(matches!(err, AppError::StateError(_)));
    }

    #[tokio::test]
    async fn foreign_organizer_cannot_verify() {
        let pool = setup_pool().await;
        let (event_id, _organizer, _member, credential) = booked(&pool).await;
        let stranger = seed_member(&pool, "other@example.com", None).await;

        let svc = AdmissionService::new(pool.clone());
        let err = svc.verify(event_id, stranger, &credential).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn tampered_credentials_say_only_invalid() {
        let pool = setup_pool().await;
        let (event_id, organizer, _member, credential) = booked(&pool).await;

        let svc = AdmissionService::new(pool.clone());

        // Garbage.
        let err = svc.verify(event_id, organizer, "not-a-ticket").await.unwrap_err();
        assert!(matches!(err, AppError::CredentialError));

        // Wrong event id embedded.
        let for_other_event = credential.replacen(&format!("E{event_id}"), "E999", 1);
        let err = svc.verify(event_id, organizer, &for_other_event).await.unwrap_err();
        assert!(matches!(err, AppError::CredentialError));

        // Token flipped.
        let mut chars: Vec<char> = credential.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        let err = svc.verify(event_id, organizer, &tampered).await.unwrap_err();
        assert!(matches!(err, AppError::CredentialError));
    }
}
