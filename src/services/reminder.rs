use crate::database::DbPool;
use crate::error::AppResult;
use crate::external::{Notification, NotificationSink, PartyType};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::FromRow;

/// Half-width of each reminder window. A sweep running every few minutes will
/// land inside the window at least once per registration.
const WINDOW_MARGIN_MINUTES: i64 = 15;

#[derive(Debug, FromRow)]
struct DueReminder {
    registration_id: i64,
    member_id: i64,
    event_id: i64,
    event_title: String,
    start_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ReminderService {
    pool: DbPool,
    sink: NotificationSink,
}

impl ReminderService {
    pub fn new(pool: DbPool, sink: NotificationSink) -> Self {
        Self { pool, sink }
    }

    /// One sweep over both reminder windows. Each registration's reminder
    /// column is stamped immediately after a successful notify, so a crash
    /// mid-sweep never double-sends for members already processed, and one
    /// member's failure does not abort the rest of the batch.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut sent = 0u64;
        sent += self
            .sweep_window(now, Duration::hours(24), "reminder_24h_sent_at", "event_reminder_24h")
            .await?;
        sent += self
            .sweep_window(now, Duration::hours(1), "reminder_1h_sent_at", "event_reminder_1h")
            .await?;
        Ok(sent)
    }

    async fn sweep_window(
        &self,
        now: DateTime<Utc>,
        lead: Duration,
        sent_column: &str,
        event_type: &str,
    ) -> AppResult<u64> {
        let margin = Duration::minutes(WINDOW_MARGIN_MINUTES);
        let window_start = now + lead - margin;
        let window_end = now + lead + margin;

        let query = format!(
            r#"
            SELECT r.id AS registration_id, r.member_id, r.event_id,
                   e.title AS event_title, e.start_at
            FROM registrations r
            JOIN events e ON e.id = r.event_id
            WHERE r.status = 'registered'
              AND r.{sent_column} IS NULL
              AND e.is_cancelled = 0
              AND e.start_at > ?1
              AND e.start_at <= ?2
            ORDER BY e.start_at
            "#
        );

        let due = sqlx::query_as::<_, DueReminder>(&query)
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;

        let mut sent = 0u64;
        for reminder in due {
            let notification = Notification {
                recipient_id: reminder.member_id,
                recipient_type: PartyType::Member,
                actor_id: None,
                actor_type: Some(PartyType::System),
                event_type: event_type.to_string(),
                payload: json!({
                    "event_id": reminder.event_id,
                    "event_title": reminder.event_title,
                    "start_at": reminder.start_at,
                }),
            };

            match self.sink.send(&notification).await {
                Ok(()) => {
                    let stamp = format!(
                        "UPDATE registrations SET {sent_column} = ?1 WHERE id = ?2"
                    );
                    sqlx::query(&stamp)
                        .bind(now)
                        .bind(reminder.registration_id)
                        .execute(&self.pool)
                        .await?;
                    sent += 1;
                }
                Err(e) => {
                    log::error!(
                        "Reminder notify failed for registration {}: {e:?}",
                        reminder.registration_id
                    );
                }
            }
        }

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationsConfig;
    use crate::models::{CartLine, RegisterRequest};
    use crate::services::registration::RegistrationService;
    use crate::services::test_util::*;

    async fn book(pool: &DbPool, lead: Duration) -> i64 {
        let organizer = seed_member(pool, &format!("org{}@example.com", lead.num_minutes()), None).await;
        let member = seed_member(pool, &format!("m{}@example.com", lead.num_minutes()), None).await;
        let event_id = seed_event(pool, organizer, lead).await;
        let tt = seed_ticket_type(pool, event_id, 500, None).await;

        let res = RegistrationService::new(pool.clone())
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
        res.registration_id
    }

    fn service(pool: &DbPool) -> ReminderService {
        ReminderService::new(
            pool.clone(),
            NotificationSink::new(NotificationsConfig { enabled: true }),
        )
    }

    #[tokio::test]
    async fn sends_once_per_window_and_never_again() {
        let pool = setup_pool().await;
        let registration_id = book(&pool, Duration::hours(24)).await;

        let svc = service(&pool);
        let now = Utc::now();
        assert_eq!(svc.run_sweep(now).await.unwrap(), 1);

        let stamped: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT reminder_24h_sent_at FROM registrations WHERE id = ?1",
        )
        .bind(registration_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(stamped.is_some());

        // Same window again: nothing due.
        assert_eq!(svc.run_sweep(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn event_outside_both_windows_is_ignored() {
        let pool = setup_pool().await;
        book(&pool, Duration::hours(6)).await;

        let svc = service(&pool);
        assert_eq!(svc.run_sweep(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn one_hour_window_is_independent_of_24h() {
        let pool = setup_pool().await;
        let registration_id = book(&pool, Duration::hours(1)).await;

        let svc = service(&pool);
        assert_eq!(svc.run_sweep(Utc::now()).await.unwrap(), 1);

        let h24: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT reminder_24h_sent_at FROM registrations WHERE id = ?1",
        )
        .bind(registration_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        let h1: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT reminder_1h_sent_at FROM registrations WHERE id = ?1",
        )
        .bind(registration_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(h24.is_none());
        assert!(h1.is_some());
    }
}
