//! Stage reporting for in-flight acquisitions.

use crate::content::ItemState;
use std::sync::Arc;
use tokio::sync::watch;

/// Publishes the processing stage of one acquisition.
#[derive(Clone)]
pub struct StageReporter {
    tx: Arc<watch::Sender<ItemState>>,
}

impl StageReporter {
    /// Create a reporter and the receiver that observes it.
    pub fn channel(initial: ItemState) -> (Self, watch::Receiver<ItemState>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// A reporter nobody listens to.
    pub fn detached() -> Self {
        Self::channel(ItemState::Absent).0
    }

    pub fn report(&self, state: ItemState) {
        self.tx.send_replace(state);
    }

    pub fn current(&self) -> ItemState {
        self.tx.borrow().clone()
    }
}
