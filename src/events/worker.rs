use std::sync::Arc;

use tokio::sync::mpsc;

use crate::events::action::InboundEvent;
use crate::service::dialog::DialogEngine;

/// Drains the inbound queue sequentially. One worker means events are
/// processed in arrival order, which also guarantees per-user ordering.
pub async fn run_event_worker(mut rx: mpsc::Receiver<InboundEvent>, engine: Arc<DialogEngine>) {
    while let Some(event) = rx.recv().await {
        engine.handle_event(event).await;
    }
}
