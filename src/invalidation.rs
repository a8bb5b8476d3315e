use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Generation counter telling collection views their data went stale.
///
/// Mutating components call [`Invalidation::invalidate`] after a successful
/// write; views keep the generation they last fetched at and refetch when it
/// moved.
#[derive(Clone)]
pub struct Invalidation {
    sender: Arc<watch::Sender<u64>>,
}

impl Invalidation {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn generation(&self) -> u64 {
        *self.sender.borrow()
    }

    /// Mark every view stale, returning the new generation
    pub fn invalidate(&self, reason: &str) -> u64 {
        self.sender.send_modify(|generation| *generation += 1);
        let generation = self.generation();
        debug!(generation, reason, "Collection invalidated");
        generation
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }
}

impl Default for Invalidation {
    fn default() -> Self {
        Self::new()
    }
}
