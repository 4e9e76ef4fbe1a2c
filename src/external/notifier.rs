use crate::config::NotificationsConfig;
use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    Member,
    Organizer,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: i64,
    pub recipient_type: PartyType,
    pub actor_id: Option<i64>,
    pub actor_type: Option<PartyType>,
    pub event_type: String,
    pub payload: Value,
}

/// In-app notification sink. Suppressible so non-production environments can
/// run with notifications disabled without touching call sites.
#[derive(Clone)]
pub struct NotificationSink {
    config: NotificationsConfig,
}

impl NotificationSink {
    pub fn new(config: NotificationsConfig) -> Self {
        Self { config }
    }

    pub async fn send(&self, notification: &Notification) -> AppResult<()> {
        if !self.config.enabled {
            log::debug!(
                "Notification suppressed (disabled): {} -> {}",
                notification.event_type,
                notification.recipient_id
            );
            return Ok(());
        }

        log::info!(
            "Notification dispatched: type={} recipient={} payload={}",
            notification.event_type,
            notification.recipient_id,
            notification.payload
        );
        Ok(())
    }
}
