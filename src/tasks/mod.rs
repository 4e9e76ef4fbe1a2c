//! Background scheduled tasks for the application.
//!
//! Two recurring jobs: the pre-event reminder sweep and the outbox drain.
//! Call `spawn_all` once during startup to launch them.

use crate::services::{OutboxService, ReminderService};
use chrono::Utc;

const REMINDER_SWEEP_SECS: u64 = 5 * 60;
const OUTBOX_DRAIN_SECS: u64 = 10;
const OUTBOX_BATCH: i64 = 100;

/// Spawn all background tasks.
///
/// Each task loops on its own schedule; failures are logged per tick and the
/// loop carries on. This function detaches tasks via `tokio::spawn` and does
/// not block.
pub fn spawn_all(reminder_service: ReminderService, outbox_service: OutboxService) {
    {
        let svc = reminder_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.run_sweep(Utc::now()).await {
                    Ok(n) if n > 0 => log::info!("Event reminders sent: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Reminder sweep failed: {e:?}"),
                }
                tokio::time::sleep(std::time::Duration::from_secs(REMINDER_SWEEP_SECS)).await;
            }
        });
    }

    {
        let svc = outbox_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.drain(OUTBOX_BATCH).await {
                    Ok(n) if n > 0 => log::debug!("Outbox rows dispatched: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Outbox drain failed: {e:?}"),
                }
                tokio::time::sleep(std::time::Duration::from_secs(OUTBOX_DRAIN_SECS)).await;
            }
        });
    }
}
