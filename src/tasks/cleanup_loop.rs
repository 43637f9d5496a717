use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info};

use crate::errors::BotError;
use crate::store::CalendarStore;

pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const RETENTION_DAYS: i64 = 60;

pub async fn run_cleanup_loop(store: CalendarStore) {
    loop {
        sleep(CLEANUP_INTERVAL).await;
        if let Err(err) = cleanup_tick(&store, Utc::now()).await {
            error!(%err, "cleanup tick failed");
        }
    }
}

/// Drops markers and tasks older than the retention window.
pub async fn cleanup_tick(store: &CalendarStore, now: DateTime<Utc>) -> Result<(), BotError> {
    let cutoff = now - chrono::Duration::days(RETENTION_DAYS);
    store.purge_older_than(cutoff).await?;
    info!(%cutoff, "cleanup pass finished");
    Ok(())
}
