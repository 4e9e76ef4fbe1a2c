use crate::error::{AppError, AppResult};
use crate::models::member::Gender;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Refund terms embedded in a ticket type, validated when the ticket type is
/// written, not re-checked ad hoc at cancellation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RefundPolicy {
    pub allowed: bool,
    pub deadline_hours_before: i64,
    pub percentage: i64,
}

impl RefundPolicy {
    pub fn validate(&self) -> AppResult<()> {
        if self.deadline_hours_before < 0 {
            return Err(AppError::ValidationError(
                "Refund deadline hours must not be negative".to_string(),
            ));
        }
        if !(0..=100).contains(&self.percentage) {
            return Err(AppError::ValidationError(
                "Refund percentage must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            allowed: false,
            deadline_hours_before: 0,
            percentage: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TicketType {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    /// Base price in minor currency units.
    pub price: i64,
    /// NULL means unlimited capacity.
    pub total_capacity: Option<i64>,
    pub sold_count: i64,
    pub reserved_count: i64,
    pub sale_start_at: Option<DateTime<Utc>>,
    pub sale_end_at: Option<DateTime<Utc>>,
    pub is_hidden: bool,
    pub access_code: Option<String>,
    pub min_per_order: i64,
    pub max_per_order: i64,
    pub max_per_user: Option<i64>,
    pub gender_restriction: Option<Gender>,
    pub refund_allowed: bool,
    pub refund_deadline_hours: i64,
    pub refund_percentage: i64,
    pub is_active: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    pub fn refund_policy(&self) -> RefundPolicy {
        RefundPolicy {
            allowed: self.refund_allowed,
            deadline_hours_before: self.refund_deadline_hours,
            percentage: self.refund_percentage,
        }
    }

    pub fn remaining(&self) -> Option<i64> {
        self.total_capacity.map(|cap| (cap - self.sold_count).max(0))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTicketTypeRequest {
    pub name: String,
    pub price: i64,
    pub total_capacity: Option<i64>,
    pub sale_start_at: Option<DateTime<Utc>>,
    pub sale_end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_hidden: bool,
    pub access_code: Option<String>,
    #[serde(default = "default_min_per_order")]
    pub min_per_order: i64,
    #[serde(default = "default_max_per_order")]
    pub max_per_order: i64,
    pub max_per_user: Option<i64>,
    pub gender_restriction: Option<Gender>,
    #[serde(default)]
    pub refund_policy: RefundPolicy,
    #[serde(default)]
    pub display_order: i64,
}

fn default_min_per_order() -> i64 {
    1
}

fn default_max_per_order() -> i64 {
    10
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateTicketTypeRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub total_capacity: Option<i64>,
    pub sale_start_at: Option<DateTime<Utc>>,
    pub sale_end_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub refund_policy: Option<RefundPolicy>,
    pub display_order: Option<i64>,
}
