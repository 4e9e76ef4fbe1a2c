use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Flat,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::Flat => write!(f, "flat"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DiscountCode {
    pub id: i64,
    pub event_id: i64,
    /// Stored normalized uppercase; matched case-insensitively.
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent for `percentage`, minor units for `flat`.
    pub value: i64,
    pub max_uses: Option<i64>,
    pub max_uses_per_user: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub min_cart_value: Option<i64>,
    /// JSON array of ticket type ids; NULL applies the code to every line.
    pub ticket_type_ids: Option<String>,
    pub stackable: bool,
    pub is_active: bool,
    pub current_uses: i64,
    pub created_at: DateTime<Utc>,
}

impl DiscountCode {
    pub fn allowlist(&self) -> Option<Vec<i64>> {
        self.ticket_type_ids
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDiscountCodeRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub max_uses: Option<i64>,
    pub max_uses_per_user: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub min_cart_value: Option<i64>,
    pub ticket_type_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub stackable: bool,
}
