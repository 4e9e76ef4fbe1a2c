pub mod admission;
pub mod event_catalog;
pub mod inventory;
pub mod outbox;
pub mod pricing;
pub mod refund;
pub mod registration;
pub mod reminder;

pub use admission::AdmissionService;
pub use event_catalog::EventCatalogService;
pub use outbox::OutboxService;
pub use registration::RegistrationService;
pub use reminder::ReminderService;

#[cfg(test)]
pub(crate) mod test_util {
    use crate::database::DbPool;
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    /// One in-memory database per test. A single connection keeps every
    /// handle on the same database.
    pub async fn setup_pool() -> DbPool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        pool
    }

    /// Named shared-cache in-memory database so more than one pooled
    /// connection sees the same tables. `name` must be unique per test.
    pub async fn setup_shared_pool(name: &str, max_connections: u32) -> DbPool {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
            .await
            .expect("shared in-memory pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        pool
    }

    pub async fn seed_member(pool: &DbPool, email: &str, gender: Option<&str>) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO members (name, email, gender, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING id",
        )
        .bind(email.split('@').next().unwrap_or("member"))
        .bind(email)
        .bind(gender)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .expect("seed member")
    }

    /// Published event starting `lead` from now.
    pub async fn seed_event(pool: &DbPool, organizer_id: i64, lead: Duration) -> i64 {
        let start = Utc::now() + lead;
        sqlx::query_scalar(
            r#"
            INSERT INTO events (organizer_id, title, venue, start_at, end_at, is_published, created_at, updated_at)
            VALUES (?1, 'Test Event', 'Hall A', ?2, ?3, 1, ?4, ?4)
            RETURNING id
            "#,
        )
        .bind(organizer_id)
        .bind(start)
        .bind(start + Duration::hours(2))
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .expect("seed event")
    }

    pub async fn seed_ticket_type(
        pool: &DbPool,
        event_id: i64,
        price: i64,
        capacity: Option<i64>,
    ) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO ticket_types (event_id, name, price, total_capacity, created_at, updated_at)
            VALUES (?1, 'General', ?2, ?3, ?4, ?4)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(price)
        .bind(capacity)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .expect("seed ticket type")
    }

    pub async fn seed_flat_code(
        pool: &DbPool,
        event_id: i64,
        code: &str,
        value: i64,
        min_cart_value: Option<i64>,
    ) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO discount_codes (event_id, code, discount_type, value, min_cart_value, created_at)
            VALUES (?1, ?2, 'flat', ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(code)
        .bind(value)
        .bind(min_cart_value)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .expect("seed discount code")
    }
}
