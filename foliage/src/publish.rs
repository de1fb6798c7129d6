//! Published/working handoff of composited batches.

use std::sync::Arc;

use crate::batch::BatchSet;

/// The render-visible side of a layer's batches.
///
/// The working set lives on the worker until its cycle completes; publishing
/// swaps it in as one `Arc` replacement, so readers only ever hold a complete set.
#[derive(Debug, Clone, Default)]
pub struct BatchSlots {
    published: Arc<BatchSet>,
    publishes: u64,
}

impl BatchSlots {
    /// The last published set; empty before the first cycle completes.
    pub fn visible(&self) -> Arc<BatchSet> {
        self.published.clone()
    }

    pub fn publish(&mut self, working: BatchSet) {
        self.published = Arc::new(working);
        self.publishes += 1;
    }

    /// Number of completed publishes.
    pub fn publishes(&self) -> u64 {
        self.publishes
    }
}
