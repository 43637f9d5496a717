use tokio::sync::mpsc;

use crate::events::action::InboundEvent;

/// Handle for pushing inbound events into the single dialog worker.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<InboundEvent>,
}

impl EventBus {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn emit(&self, event: InboundEvent) {
        let _ = self.tx.send(event).await;
    }
}
