//! Inventory checks and counter updates for ticket types.
//!
//! Every function here operates on the caller's open transaction; none of the
//! counter updates is meaningful outside one. Capacity is enforced by a single
//! conditional UPDATE so two carts racing for the last unit can never both
//! succeed.

use crate::error::{AppError, AppResult};
use crate::models::{Gender, TicketType};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

/// Validate a single cart line against the ticket type's sale constraints.
/// Does not touch counters; `reserve` performs the capacity check atomically.
pub async fn validate_order(
    tx: &mut SqliteConnection,
    ticket_type: &TicketType,
    member_id: i64,
    member_gender: Option<Gender>,
    quantity: i64,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !ticket_type.is_active {
        return Err(AppError::InventoryError(format!(
            "Ticket '{}' is not on sale",
            ticket_type.name
        )));
    }

    if quantity < ticket_type.min_per_order {
        return Err(AppError::InventoryError(format!(
            "Minimum {} ticket(s) per order for '{}'",
            ticket_type.min_per_order, ticket_type.name
        )));
    }
    if quantity > ticket_type.max_per_order {
        return Err(AppError::InventoryError(format!(
            "Maximum {} ticket(s) per order for '{}'",
            ticket_type.max_per_order, ticket_type.name
        )));
    }

    if let Some(start) = ticket_type.sale_start_at {
        if now < start {
            return Err(AppError::InventoryError(format!(
                "Sale for '{}' has not opened yet",
                ticket_type.name
            )));
        }
    }
    if let Some(end) = ticket_type.sale_end_at {
        if now > end {
            return Err(AppError::InventoryError(format!(
                "Sale for '{}' has ended",
                ticket_type.name
            )));
        }
    }

    if let Some(restriction) = ticket_type.gender_restriction {
        if member_gender != Some(restriction) {
            return Err(AppError::InventoryError(format!(
                "Ticket '{}' is gender-restricted",
                ticket_type.name
            )));
        }
    }

    if let Some(cap) = ticket_type.max_per_user {
        let prior: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(rt.quantity), 0)
            FROM registration_tickets rt
            JOIN registrations r ON r.id = rt.registration_id
            WHERE rt.ticket_type_id = ?1
              AND r.member_id = ?2
              AND r.status != 'cancelled'
            "#,
        )
        .bind(ticket_type.id)
        .bind(member_id)
        .fetch_one(&mut *tx)
        .await?;

        if prior + quantity > cap {
            return Err(AppError::InventoryError(format!(
                "Per-user limit of {} ticket(s) exceeded for '{}'",
                cap, ticket_type.name
            )));
        }
    }

    Ok(())
}

/// Atomically claim `quantity` units of capacity. The WHERE clause is the
/// concurrency guard: zero rows affected means the inventory cannot cover the
/// request, whichever writer got there first.
pub async fn reserve(
    tx: &mut SqliteConnection,
    ticket_type_id: i64,
    quantity: i64,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE ticket_types
        SET sold_count = sold_count + ?1,
            updated_at = ?2
        WHERE id = ?3
          AND (total_capacity IS NULL OR sold_count + ?1 <= total_capacity)
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(ticket_type_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InventoryError(
            "Not enough tickets remaining".to_string(),
        ));
    }

    Ok(())
}

/// Return `quantity` units of capacity, floored at zero to tolerate a
/// double-release race.
pub async fn release(
    tx: &mut SqliteConnection,
    ticket_type_id: i64,
    quantity: i64,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE ticket_types
        SET sold_count = MAX(0, sold_count - ?1),
            updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(ticket_type_id)
    .execute(&mut *tx)
    .await?;

    Ok(())
}
