//! Transactional outbox for post-commit side effects.
//!
//! Business transactions enqueue rows; a background drain delivers them to
//! the notification sink or the email service. A slow or failing channel can
//! therefore never block or fail a booking, and a failed delivery stays in
//! the table for the next drain.

use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::external::{EmailPayload, EmailService, Notification, NotificationSink, PartyType};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum OutboxChannel {
    Notification,
    Email,
}

#[derive(Debug, Clone, FromRow)]
pub struct OutboxRow {
    pub id: i64,
    pub channel: OutboxChannel,
    pub recipient_id: i64,
    pub recipient_type: String,
    pub actor_id: Option<i64>,
    pub actor_type: Option<String>,
    pub event_type: String,
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

fn party_type_str(t: PartyType) -> &'static str {
    match t {
        PartyType::Member => "member",
        PartyType::Organizer => "organizer",
        PartyType::System => "system",
    }
}

fn parse_party_type(raw: &str) -> PartyType {
    match raw {
        "organizer" => PartyType::Organizer,
        "system" => PartyType::System,
        _ => PartyType::Member,
    }
}

/// Enqueue an in-app notification inside the caller's transaction.
pub async fn enqueue_notification(
    tx: &mut SqliteConnection,
    notification: &Notification,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox (
            channel, recipient_id, recipient_type, actor_id, actor_type,
            event_type, payload, created_at
        ) VALUES ('notification', ?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(notification.recipient_id)
    .bind(party_type_str(notification.recipient_type))
    .bind(notification.actor_id)
    .bind(notification.actor_type.map(party_type_str))
    .bind(&notification.event_type)
    .bind(notification.payload.to_string())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

/// Enqueue an outbound email inside the caller's transaction.
pub async fn enqueue_email(
    tx: &mut SqliteConnection,
    recipient_id: i64,
    payload: &EmailPayload,
) -> AppResult<()> {
    let body = serde_json::to_string(payload)?;
    let event_type = match payload {
        EmailPayload::BookingConfirmation { .. } => "booking_confirmation",
        EmailPayload::BookingCancellation { .. } => "booking_cancellation",
    };

    sqlx::query(
        r#"
        INSERT INTO outbox (
            channel, recipient_id, recipient_type, event_type, payload, created_at
        ) VALUES ('email', ?1, 'member', ?2, ?3, ?4)
        "#,
    )
    .bind(recipient_id)
    .bind(event_type)
    .bind(body)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct OutboxService {
    pool: DbPool,
    sink: NotificationSink,
    mailer: EmailService,
}

impl OutboxService {
    pub fn new(pool: DbPool, sink: NotificationSink, mailer: EmailService) -> Self {
        Self { pool, sink, mailer }
    }

    /// Deliver up to `batch` pending rows. Returns how many were dispatched;
    /// a failed row records the error and stays pending.
    pub async fn drain(&self, batch: i64) -> AppResult<u64> {
        let pending = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, channel, recipient_id, recipient_type, actor_id, actor_type,
                   event_type, payload, attempts, last_error, created_at, dispatched_at
            FROM outbox
            WHERE dispatched_at IS NULL
            ORDER BY created_at, id
            LIMIT ?1
            "#,
        )
        .bind(batch)
        .fetch_all(&self.pool)
        .await?;

        let mut dispatched = 0u64;
        for row in pending {
            match self.deliver(&row).await {
                Ok(()) => {
                    sqlx::query("UPDATE outbox SET dispatched_at = ?1 WHERE id = ?2")
                        .bind(Utc::now())
                        .bind(row.id)
                        .execute(&self.pool)
                        .await?;
                    dispatched += 1;
                }
                Err(e) => {
                    log::error!("Outbox delivery failed for row {}: {e:?}", row.id);
                    sqlx::query(
                        "UPDATE outbox SET attempts = attempts + 1, last_error = ?1 WHERE id = ?2",
                    )
                    .bind(e.to_string())
                    .bind(row.id)
                    .execute(&self.pool)
                    .await?;
                }
            }
        }

        Ok(dispatched)
    }

    async fn deliver(&self, row: &OutboxRow) -> AppResult<()> {
        match row.channel {
            OutboxChannel::Notification => {
                let payload = serde_json::from_str(&row.payload)?;
                let notification = Notification {
                    recipient_id: row.recipient_id,
                    recipient_type: parse_party_type(&row.recipient_type),
                    actor_id: row.actor_id,
                    actor_type: row.actor_type.as_deref().map(parse_party_type),
                    event_type: row.event_type.clone(),
                    payload,
                };
                self.sink.send(&notification).await
            }
            OutboxChannel::Email => {
                let payload: EmailPayload = serde_json::from_str(&row.payload)
                    .map_err(|e| AppError::InternalError(format!("Bad email payload: {e}")))?;
                // The mailer is best-effort by contract and never errors.
                self.mailer.send(&payload).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmailConfig, NotificationsConfig};
    use crate::services::test_util::*;
    use serde_json::json;

    fn service(pool: &DbPool) -> OutboxService {
        OutboxService::new(
            pool.clone(),
            NotificationSink::new(NotificationsConfig { enabled: true }),
            EmailService::new(EmailConfig::default()),
        )
    }

    async fn enqueue_pair(pool: &DbPool, member_id: i64) {
        let mut tx = pool.begin().await.unwrap();
        enqueue_notification(
            &mut *tx,
            &Notification {
                recipient_id: member_id,
                recipient_type: PartyType::Organizer,
                actor_id: None,
                actor_type: None,
                event_type: "event_registration".to_string(),
                payload: json!({"event_id": 1}),
            },
        )
        .await
        .unwrap();
        enqueue_email(
            &mut *tx,
            member_id,
            &EmailPayload::BookingConfirmation {
                to: "m@example.com".to_string(),
                member_name: "m".to_string(),
                event_title: "Test Event".to_string(),
                qr_credential: "SNOO-E1-R1-0123456789abcdef0123456789abcdef".to_string(),
                total_amount: 1000,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn drain_marks_rows_dispatched() {
        let pool = setup_pool().await;
        let member = seed_member(&pool, "m@example.com", None).await;
        enqueue_pair(&pool, member).await;

        let svc = service(&pool);
        assert_eq!(svc.drain(100).await.unwrap(), 2);

        let pending: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE dispatched_at IS NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(pending, 0);

        // Nothing left for the next drain.
        assert_eq!(svc.drain(100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn undeliverable_row_records_error_and_stays_pending() {
        let pool = setup_pool().await;
        sqlx::query(
            r#"
            INSERT INTO outbox (channel, recipient_id, recipient_type, event_type, payload, created_at)
            VALUES ('email', 1, 'member', 'booking_confirmation', 'not json', ?1)
            "#,
        )
        .bind(chrono::Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let svc = service(&pool);
        assert_eq!(svc.drain(100).await.unwrap(), 0);

        let (attempts, last_error): (i64, Option<String>) =
            sqlx::query_as("SELECT attempts, last_error FROM outbox LIMIT 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(attempts, 1);
        assert!(last_error.is_some());
    }

    #[tokio::test]
    async fn drain_respects_the_batch_limit() {
        let pool = setup_pool().await;
        let member = seed_member(&pool, "m@example.com", None).await;
        enqueue_pair(&pool, member).await;

        let svc = service(&pool);
        assert_eq!(svc.drain(1).await.unwrap(), 1);
        assert_eq!(svc.drain(100).await.unwrap(), 1);
    }
}
