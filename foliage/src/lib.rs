//! Chunked procedural foliage streaming.
//!
//! Terrain detail maps are turned into instance transforms chunk by chunk around a
//! tracked point. Generation runs on the async compute pool, split across up to four
//! slice threads, and finished cycles are published as fixed-capacity instanced
//! draw batches the renderer reads without waiting.

pub mod batch;
pub mod chunk;
pub mod config;
pub mod curve;
pub mod cycle;
pub mod density;
pub mod dispatch;
pub mod error;
pub mod field;
pub mod grid;
pub mod material;
pub mod plugin;
pub mod publish;
pub mod streaming;
pub mod terrain;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use batch::{Batch, BatchSet, BATCH_CAPACITY};
pub use chunk::{Chunk, ChunkCoord, ChunkGenerator, CHUNK_CAPACITY, CHUNK_SIZE};
pub use config::{FieldSettings, FoliageManifest, LayerProfile, LayerSettings};
pub use curve::{Keyframe, ResponseCurve};
pub use dispatch::ThreadScaling;
pub use error::{FoliageError, Result};
pub use field::{BatchDraw, FoliageField, FoliageLayer, InstanceSink};
pub use material::{layer_material, TextureBinding, TextureSlot};
pub use plugin::{FoliagePlugin, FoliageSystems, FoliageViewpoint};
pub use streaming::{ChunkStreamer, CycleReport};
pub use terrain::{DetailMap, HeightField, TerrainSnapshot, TerrainSource};
pub use worker::WorkerStatus;
