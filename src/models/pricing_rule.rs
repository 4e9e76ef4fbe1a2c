use crate::models::discount_code::DiscountType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Discount while within the rule's validity window.
    EarlyBirdDate,
    /// Discount while the scoped ticket type's sold_count is below the threshold.
    EarlyBirdVolume,
    /// Discount when a single line's quantity reaches the threshold.
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PricingRule {
    pub id: i64,
    pub event_id: i64,
    /// NULL scopes the rule to every ticket type of the event.
    pub ticket_type_id: Option<i64>,
    pub rule_kind: RuleKind,
    pub discount_type: DiscountType,
    pub value: i64,
    pub quantity_threshold: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Lower is evaluated first.
    pub priority: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePricingRuleRequest {
    pub ticket_type_id: Option<i64>,
    pub rule_kind: RuleKind,
    pub discount_type: DiscountType,
    pub value: i64,
    pub quantity_threshold: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

fn default_priority() -> i64 {
    100
}
