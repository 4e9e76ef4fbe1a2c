use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Attended,
    Cancelled,
    Refunded,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Registered => write!(f, "registered"),
            RegistrationStatus::Attended => write!(f, "attended"),
            RegistrationStatus::Cancelled => write!(f, "cancelled"),
            RegistrationStatus::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Registration {
    pub id: i64,
    pub event_id: i64,
    pub member_id: i64,
    pub status: RegistrationStatus,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub promo_code: Option<String>,
    pub qr_token: String,
    pub refund_amount: Option<i64>,
    pub reminder_24h_sent_at: Option<DateTime<Utc>>,
    pub reminder_1h_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// Immutable once created; only the parent registration mutates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RegistrationTicket {
    pub id: i64,
    pub registration_id: i64,
    pub ticket_type_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub ticket_type_id: i64,
    pub quantity: i64,
    /// Client-side display price; the server snapshots the current base
    /// price and does not trust this field.
    #[serde(default)]
    pub unit_price: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub items: Vec<CartLine>,
    pub promo_code: Option<String>,
    /// Required when the cart contains a hidden ticket type.
    pub access_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub registration_id: i64,
    pub qr_credential: String,
    pub total_amount: i64,
    pub discount_amount: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    pub refund_amount: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TicketLineDetail {
    pub ticket_type_id: i64,
    pub ticket_type_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TicketDetailResponse {
    pub registration_id: i64,
    pub event_id: i64,
    pub event_title: String,
    pub event_start_at: DateTime<Utc>,
    pub status: RegistrationStatus,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub promo_code: Option<String>,
    pub qr_credential: String,
    pub lines: Vec<TicketLineDetail>,
    pub created_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyTicketRequest {
    pub qr_data: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyTicketResponse {
    pub registration_id: i64,
    pub member_name: String,
    pub member_email: String,
    pub checked_in_at: DateTime<Utc>,
    pub lines: Vec<TicketLineDetail>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AttendeeRow {
    pub registration_id: i64,
    pub member_id: i64,
    pub member_name: String,
    pub member_email: String,
    pub status: RegistrationStatus,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}
