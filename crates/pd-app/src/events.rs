//! Subscriber fan-out for [`DestinationEvent`]s.

use std::sync::{Arc, Mutex};

use pd_core::DestinationEvent;
use tokio::sync::mpsc;

/// Observer list of event subscribers.
///
/// Cloning shares the same subscriber list. Subscribers whose receiver has
/// been dropped are pruned on the next emit.
#[derive(Clone, Default)]
pub struct EventBus {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<DestinationEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DestinationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.senders.lock() {
            Ok(mut senders) => senders.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    pub fn emit(&self, event: DestinationEvent) {
        tracing::debug!(?event, "destination event");
        let mut senders = match self.senders.lock() {
            Ok(senders) => senders,
            Err(poisoned) => poisoned.into_inner(),
        };
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        match self.senders.lock() {
            Ok(senders) => senders.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
