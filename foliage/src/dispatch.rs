//! Spatial slicing of the load region across scoped worker threads.

use std::panic;
use std::thread;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkCoord};
use crate::error::FoliageError;

/// How many slices a cycle's load region is cut into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadScaling {
    Single,
    /// Split at the tracked row.
    Halves,
    /// Split at the tracked row and column.
    Quadrants,
}

impl ThreadScaling {
    pub fn slices(self) -> usize {
        match self {
            ThreadScaling::Single => 1,
            ThreadScaling::Halves => 2,
            ThreadScaling::Quadrants => 4,
        }
    }

    /// The worker knob value (1, 2 or 3) for this scaling.
    pub fn knob(self) -> u8 {
        match self {
            ThreadScaling::Single => 1,
            ThreadScaling::Halves => 2,
            ThreadScaling::Quadrants => 3,
        }
    }
}

impl TryFrom<u8> for ThreadScaling {
    type Error = FoliageError;

    fn try_from(knob: u8) -> Result<Self, Self::Error> {
        match knob {
            1 => Ok(ThreadScaling::Single),
            2 => Ok(ThreadScaling::Halves),
            3 => Ok(ThreadScaling::Quadrants),
            other => Err(FoliageError::InvalidWorkerCount(other)),
        }
    }
}

/// Inclusive rectangle of chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRegion {
    pub min: IVec2,
    pub max: IVec2,
}

impl LoadRegion {
    pub const fn new(min: IVec2, max: IVec2) -> Self {
        Self { min, max }
    }

    /// Bounding box of the radius around `tracked`, clamped to a `cols` x `rows` grid.
    pub fn around(tracked: Vec2, radius: f32, cols: usize, rows: usize) -> Self {
        let max_col = cols as i32 - 1;
        let max_row = rows as i32 - 1;
        Self {
            min: IVec2::new(((tracked.x - radius) as i32).max(0), ((tracked.y - radius) as i32).max(0)),
            max: IVec2::new(
                ((tracked.x + radius) as i32).min(max_col),
                ((tracked.y + radius) as i32).min(max_row),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            ((self.max.x - self.min.x + 1) * (self.max.y - self.min.y + 1)) as usize
        }
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        (self.min.x..=self.max.x).flat_map(move |x| (self.min.y..=self.max.y).map(move |y| ChunkCoord::new(x, y)))
    }

    /// Rows up to and including `row`, and the rows after it.
    fn split_rows(self, row: i32) -> [LoadRegion; 2] {
        [
            Self::new(self.min, IVec2::new(self.max.x, row.min(self.max.y))),
            Self::new(IVec2::new(self.min.x, (row + 1).max(self.min.y)), self.max),
        ]
    }

    fn split_cols(self, col: i32) -> [LoadRegion; 2] {
        [
            Self::new(self.min, IVec2::new(col.min(self.max.x), self.max.y)),
            Self::new(IVec2::new((col + 1).max(self.min.x), self.min.y), self.max),
        ]
    }

    /// Cuts the region at `pivot`; empty slices are dropped.
    pub fn split(self, scaling: ThreadScaling, pivot: IVec2) -> Vec<LoadRegion> {
        let slices = match scaling {
            ThreadScaling::Single => vec![self],
            ThreadScaling::Halves => self.split_rows(pivot.y).to_vec(),
            ThreadScaling::Quadrants => self
                .split_rows(pivot.y)
                .into_iter()
                .flat_map(|half| half.split_cols(pivot.x))
                .collect(),
        };
        slices.into_iter().filter(|s| !s.is_empty()).collect()
    }
}

/// Runs `job` once per slice and returns each slice's private chunk list.
///
/// A single slice runs on the calling thread; otherwise every slice gets a scoped
/// thread and all of them are joined before returning. A panicking slice is
/// re-raised on the calling thread after the join.
pub fn dispatch<F>(region: LoadRegion, scaling: ThreadScaling, pivot: IVec2, job: F) -> Vec<Vec<Chunk>>
where
    F: Fn(LoadRegion) -> Vec<Chunk> + Sync,
{
    let slices = region.split(scaling, pivot);
    if slices.len() <= 1 {
        return slices.into_iter().map(&job).collect();
    }

    let job = &job;
    thread::scope(|scope| {
        let handles: Vec<_> = slices
            .into_iter()
            .map(|slice| scope.spawn(move || job(slice)))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
            .collect()
    })
}
