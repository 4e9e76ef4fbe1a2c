use crate::config::EmailConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailPayload {
    BookingConfirmation {
        to: String,
        member_name: String,
        event_title: String,
        qr_credential: String,
        total_amount: i64,
    },
    BookingCancellation {
        to: String,
        member_name: String,
        event_title: String,
        refund_amount: i64,
    },
}

impl EmailPayload {
    pub fn recipient(&self) -> &str {
        match self {
            EmailPayload::BookingConfirmation { to, .. } => to,
            EmailPayload::BookingCancellation { to, .. } => to,
        }
    }
}

/// Outbound email. A no-op when unconfigured; never raises past the caller.
#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub async fn send(&self, payload: &EmailPayload) {
        if !self.config.enabled || self.config.from_address.is_none() {
            log::debug!("Email suppressed (unconfigured): to={}", payload.recipient());
            return;
        }

        // Delivery is delegated to the provider integration; here we log the
        // structured payload so operators can trace it.
        match serde_json::to_string(payload) {
            Ok(body) => log::info!(
                "Email dispatched: from={} to={} payload={}",
                self.config.from_address.as_deref().unwrap_or(""),
                payload.recipient(),
                body
            ),
            Err(e) => log::error!("Failed to serialize email payload: {e}"),
        }
    }
}
