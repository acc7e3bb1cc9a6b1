//! Change counter shared between the uploader and the document registry

use std::sync::Arc;
use tokio::sync::watch;

/// Monotonic counter bumped once per successful upload batch.
///
/// Cloning is cheap and every clone observes the same counter. Readers
/// either poll [`RefreshToken::current`] or wait on a receiver from
/// [`RefreshToken::subscribe`].
#[derive(Debug, Clone)]
pub struct RefreshToken {
    tx: Arc<watch::Sender<u64>>,
}

impl RefreshToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Current counter value
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Receive a notification on every bump
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Increment by one and wake subscribers. Returns the new value.
    pub(crate) fn bump(&self) -> u64 {
        let mut bumped = 0;
        self.tx.send_modify(|value| {
            *value += 1;
            bumped = *value;
        });
        bumped
    }
}

impl Default for RefreshToken {
    fn default() -> Self {
        Self::new()
    }
}
