//! Repacking live chunks into fixed-capacity instanced draw batches.

use bevy::prelude::*;

use crate::chunk::Chunk;

/// Maximum instances per draw batch.
pub const BATCH_CAPACITY: usize = 1023;

/// One instanced draw worth of transforms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    transforms: Vec<Mat4>,
}

impl Batch {
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    /// Valid instance count.
    pub fn count(&self) -> usize {
        self.transforms.len()
    }
}

/// A layer's composited batches for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSet {
    pub batches: Vec<Batch>,
    /// Cycle that produced this set; 0 before the first publish.
    pub cycle: u64,
}

impl BatchSet {
    pub fn new(batches: Vec<Batch>, cycle: u64) -> Self {
        Self { batches, cycle }
    }

    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(Batch::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Packs chunks in order. A chunk that would push the open batch past
/// [`BATCH_CAPACITY`] closes it first; chunks are never split across batches.
pub fn compose(chunks: &[Chunk]) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current = Batch::default();

    for chunk in chunks.iter().filter(|c| !c.is_empty()) {
        if current.count() + chunk.len() > BATCH_CAPACITY {
            batches.push(std::mem::take(&mut current));
        }
        current.transforms.extend(
            chunk
                .instances()
                .iter()
                .map(|t| Mat4::from_scale_rotation_translation(t.scale, t.rotation, t.translation)),
        );
    }

    if current.count() > 0 {
        batches.push(current);
    }
    batches
}
