use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::errors::BotError;
use crate::gateway::MessageGateway;
use crate::store::CalendarStore;

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const SEND_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

pub async fn run_reminder_loop(store: CalendarStore, gateway: Arc<dyn MessageGateway>) {
    loop {
        sleep(POLL_INTERVAL).await;
        if let Err(err) = reminder_tick(&store, gateway.as_ref(), Utc::now(), RETRY_DELAY).await {
            error!(%err, "reminder tick failed");
        }
    }
}

/// One scheduler pass: deliver everything due at `now`. A reminder is only
/// marked sent after the gateway accepts it, so an undelivered one comes
/// back on the next pass.
pub async fn reminder_tick(
    store: &CalendarStore,
    gateway: &dyn MessageGateway,
    now: DateTime<Utc>,
    retry_delay: Duration,
) -> Result<(), BotError> {
    for reminder in store.due_reminders(now).await? {
        let text = format!("⏰ Reminder!\nTask: {}", reminder.text);
        match send_with_retry(gateway, reminder.user_id, &text, retry_delay).await {
            Ok(()) => {
                store.mark_reminder_sent(reminder.task_id).await?;
                info!(
                    task_id = reminder.task_id,
                    user_id = reminder.user_id,
                    "reminder delivered"
                );
            }
            Err(err) => {
                warn!(
                    task_id = reminder.task_id,
                    user_id = reminder.user_id,
                    %err,
                    "reminder undelivered, retrying next pass"
                );
            }
        }
    }
    Ok(())
}

async fn send_with_retry(
    gateway: &dyn MessageGateway,
    user_id: i64,
    text: &str,
    retry_delay: Duration,
) -> Result<(), BotError> {
    let mut last_err = None;
    for attempt in 1..=SEND_ATTEMPTS {
        match gateway.send_text(user_id, text, None).await {
            Ok(_) => return Ok(()),
            Err(err) => {
                warn!(user_id, attempt, %err, "reminder send attempt failed");
                last_err = Some(err);
                if attempt < SEND_ATTEMPTS {
                    sleep(retry_delay).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| BotError::Delivery("send failed".to_string())))
}
