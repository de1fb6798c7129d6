//! Per-layer chunk streaming: grid sizing, eviction, parallel loading and the
//! full generation cycle run on the worker.

use bevy::prelude::*;

use crate::batch::{compose, BatchSet};
use crate::chunk::{within_radius, Chunk, ChunkCoord, ChunkGenerator};
use crate::cycle::LayerCycle;
use crate::dispatch::{dispatch, LoadRegion};
use crate::grid::ChunkGrid;

/// What one cycle did to a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// The grid was reallocated and every live chunk dropped.
    pub reallocated: bool,
    pub evicted: usize,
    pub loaded: usize,
    /// Generated chunks discarded because their cell was already occupied.
    pub collisions: usize,
    /// Live chunks flagged as clipping after loading.
    pub clipping: usize,
    pub live: usize,
    pub instances: usize,
}

/// Whether a chunk at `coord` should be resident for this cycle.
fn in_load_range(coord: ChunkCoord, cycle: &LayerCycle) -> bool {
    if cycle.profile.corner_tests {
        coord
            .corners()
            .iter()
            .any(|c| within_radius(c.as_vec2(), cycle.tracked, cycle.radius))
    } else {
        within_radius(coord.as_vec2(), cycle.tracked, cycle.radius)
    }
}

fn should_evict(chunk: &Chunk, cycle: &LayerCycle) -> bool {
    if chunk.clipping {
        return true;
    }
    if cycle.profile.corner_tests {
        chunk
            .coord
            .corners()
            .iter()
            .any(|c| !within_radius(c.as_vec2(), cycle.tracked, cycle.radius))
    } else {
        !within_radius(chunk.coord.as_vec2(), cycle.tracked, cycle.radius)
    }
}

/// A layer's chunk grid and live chunk list.
#[derive(Debug, Clone, Default)]
pub struct ChunkStreamer {
    grid: ChunkGrid,
    chunks: Vec<Chunk>,
}

impl ChunkStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.grid.get(coord).map(|i| &self.chunks[i])
    }

    /// Reallocates the grid if it is smaller than `required`, dropping every chunk.
    pub fn prepare_grid(&mut self, required: UVec2) -> bool {
        if self.grid.fits(required) {
            return false;
        }
        self.grid = ChunkGrid::new(required.x as usize, required.y as usize);
        self.chunks.clear();
        true
    }

    /// Drops clipping chunks and chunks that fell out of range, then re-indexes
    /// the survivors.
    pub fn evict(&mut self, cycle: &LayerCycle) -> usize {
        let before = self.chunks.len();
        let grid = &mut self.grid;
        self.chunks.retain(|chunk| {
            let evict = should_evict(chunk, cycle);
            if evict {
                grid.clear(chunk.coord);
            }
            !evict
        });

        for (index, chunk) in self.chunks.iter().enumerate() {
            self.grid.set(chunk.coord, index);
        }
        before - self.chunks.len()
    }

    /// Generates every missing in-range chunk across the cycle's slices and merges
    /// them. Returns `(loaded, collisions)`.
    pub fn load(&mut self, cycle: &LayerCycle) -> (usize, usize) {
        let region = LoadRegion::around(cycle.tracked, cycle.radius, self.grid.cols(), self.grid.rows());
        if region.is_empty() {
            return (0, 0);
        }

        let pivot = cycle.tracked.floor().as_ivec2();
        let grid = &self.grid;
        let slices = dispatch(region, cycle.field.scaling, pivot, |slice| {
            let mut generator = ChunkGenerator::new(cycle);
            slice
                .coords()
                .filter(|&coord| grid.get(coord).is_none() && in_load_range(coord, cycle))
                .map(|coord| generator.generate(coord))
                .collect()
        });

        self.merge(slices.into_iter().flatten())
    }

    /// Inserts generated chunks. An occupied cell keeps its chunk and the newcomer
    /// is discarded.
    pub(crate) fn merge(&mut self, generated: impl IntoIterator<Item = Chunk>) -> (usize, usize) {
        let mut loaded = 0;
        let mut collisions = 0;
        for chunk in generated {
            if self.grid.get(chunk.coord).is_some() {
                warn!(
                    "Chunk {:?} generated twice in one cycle; keeping the existing chunk",
                    chunk.coord
                );
                collisions += 1;
                continue;
            }
            if !self.grid.set(chunk.coord, self.chunks.len()) {
                warn!("Chunk {:?} lies outside the {}x{} grid", chunk.coord, self.grid.cols(), self.grid.rows());
                continue;
            }
            self.chunks.push(chunk);
            loaded += 1;
        }
        (loaded, collisions)
    }

    /// Runs one streaming update: resize, evict, load.
    pub fn update(&mut self, cycle: &LayerCycle) -> CycleReport {
        let reallocated = self.prepare_grid(cycle.required_grid);
        let evicted = self.evict(cycle);
        let (loaded, collisions) = self.load(cycle);

        CycleReport {
            reallocated,
            evicted,
            loaded,
            collisions,
            clipping: self.chunks.iter().filter(|c| c.clipping).count(),
            live: self.chunks.len(),
            instances: self.chunks.iter().map(Chunk::len).sum(),
        }
    }
}

/// One layer's share of a generation cycle, moved onto the worker.
#[derive(Debug)]
pub struct LayerJob {
    pub cycle: LayerCycle,
    pub streamer: ChunkStreamer,
}

/// A layer's result, moved back to the main thread for publishing.
#[derive(Debug)]
pub struct LayerOutcome {
    pub streamer: ChunkStreamer,
    pub batches: BatchSet,
    pub report: CycleReport,
}

/// Runs a full cycle for every layer: stream, then composite.
pub fn run_generation_cycle(jobs: Vec<LayerJob>, cycle_id: u64) -> Vec<LayerOutcome> {
    jobs.into_iter()
        .map(|LayerJob { cycle, mut streamer }| {
            let report = streamer.update(&cycle);
            let batches = BatchSet::new(compose(streamer.chunks()), cycle_id);
            debug!(
                "Foliage cycle {}: {} live chunks (+{} -{}), {} instances in {} batches",
                cycle_id,
                report.live,
                report.loaded,
                report.evicted,
                report.instances,
                batches.batches.len()
            );
            LayerOutcome {
                streamer,
                batches,
                report,
            }
        })
        .collect()
}
