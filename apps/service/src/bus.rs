use std::sync::Arc;

use tokio::sync::broadcast;

use crate::status::StatusSnapshot;

const CHANNEL_CAPACITY: usize = 64;

/// Change notifier: fans one immutable snapshot out to every subscriber.
///
/// Subscribers attach with `subscribe` and deregister by dropping the
/// receiver; a slow or gone subscriber never affects delivery to the rest.
#[derive(Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<Arc<StatusSnapshot>>,
}

impl StatusBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StatusSnapshot>> {
        self.tx.subscribe()
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        // No receivers is fine; the snapshot is simply dropped.
        let _ = self.tx.send(Arc::new(snapshot));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}
