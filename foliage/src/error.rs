//! Error type shared by every fallible foliage operation.

use bevy::math::Vec3;
use thiserror::Error;

use crate::material::TextureSlot;

/// Result alias used throughout the crate.
pub type Result<T, E = FoliageError> = std::result::Result<T, E>;

/// Configuration and setup faults.
///
/// Everything here is surfaced before a generation cycle starts. Faults that happen
/// inside a running cycle are reported through [`crate::worker::WorkerPanic`] instead.
#[derive(Debug, Error)]
pub enum FoliageError {
    #[error("layer '{layer}' has no mesh assigned")]
    MissingMesh { layer: String },

    #[error("layer '{layer}' has no material assigned")]
    MissingMaterial { layer: String },

    #[error("worker count must be 1, 2 or 3 (got {0})")]
    InvalidWorkerCount(u8),

    #[error("density must be in (0, 64] (got {0})")]
    InvalidDensity(f32),

    #[error("terrain size must be positive on every axis (got {0})")]
    InvalidTerrainSize(Vec3),

    #[error("{what} of {width}x{height} needs {expected} samples, got {actual}")]
    GridSize {
        what: &'static str,
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("response curve needs at least one keyframe")]
    EmptyCurve,

    #[error("response curve keyframe {index} has a non-finite component")]
    NonFiniteKeyframe { index: usize },

    #[error("layer '{layer}' binds more than one texture to {slot:?}")]
    DuplicateTextureSlot { layer: String, slot: TextureSlot },

    #[error("terrain provides no detail layer {0}")]
    MissingDetailLayer(usize),

    #[error("failed to read foliage settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse foliage settings: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
