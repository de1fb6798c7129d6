//! Immutable per-cycle context handed to the generation worker.
//!
//! Everything a cycle reads is captured here on the main thread when the cycle
//! starts; workers never see live settings.

use std::sync::Arc;

use bevy::prelude::*;

use crate::chunk::CHUNK_SIZE;
use crate::config::{FieldSettings, LayerProfile, LayerSettings};
use crate::curve::{ResponseCurve, SharedCurve};
use crate::density::NoiseChannels;
use crate::dispatch::ThreadScaling;
use crate::error::Result;
use crate::terrain::{DetailMap, TerrainSnapshot};

/// Field-wide state shared by every layer of one cycle.
#[derive(Debug)]
pub struct FieldCycle {
    pub terrain: Arc<TerrainSnapshot>,
    pub tracked_world: Vec3,
    pub density: f32,
    /// Density used for position jitter, corrected for the terrain's aspect ratio.
    pub jitter_density: Vec2,
    pub noise_scale: f32,
    pub size_multiplier: f32,
    pub density_curve: ResponseCurve,
    pub size_curve: ResponseCurve,
    pub size_density_curve: SharedCurve,
    pub noise: NoiseChannels,
    pub scaling: ThreadScaling,
}

impl FieldCycle {
    pub fn capture(settings: &FieldSettings, terrain: Arc<TerrainSnapshot>, tracked_world: Vec3) -> Result<Self> {
        settings.validate()?;
        let scaling = settings.scaling()?;
        let size = terrain.size;
        Ok(Self {
            jitter_density: Vec2::new(settings.density, settings.density * size.x / size.z),
            terrain,
            tracked_world,
            density: settings.density,
            noise_scale: settings.noise_scale,
            size_multiplier: settings.size_multiplier,
            density_curve: settings.density_curve.clone(),
            size_curve: settings.size_curve.clone(),
            size_density_curve: SharedCurve::new(settings.size_density_curve.clone()),
            noise: NoiseChannels::new(settings.seed),
            scaling,
        })
    }

    /// Chunks per detail texel.
    pub fn chunk_scale(&self) -> f32 {
        self.density / CHUNK_SIZE as f32
    }
}

/// One layer's view of a cycle: its detail map and the derived chunk-space geometry.
#[derive(Debug, Clone)]
pub struct LayerCycle {
    pub field: Arc<FieldCycle>,
    pub detail: Arc<DetailMap>,
    pub min_size: Vec3,
    pub max_size: Vec3,
    pub size_noise_scale: f32,
    pub profile: LayerProfile,
    /// Tracked point in chunk space; `x` runs along terrain Z, `y` along terrain X.
    pub tracked: Vec2,
    /// Load radius in chunk units.
    pub radius: f32,
    /// Grid columns and rows needed to cover the detail map at this density.
    pub required_grid: UVec2,
}

impl LayerCycle {
    pub fn new(field: Arc<FieldCycle>, settings: &LayerSettings, detail: Arc<DetailMap>) -> Self {
        let terrain = &field.terrain;
        let scale = field.chunk_scale();
        let width = detail.width() as f32;
        let height = detail.height() as f32;
        let local = terrain.local(field.tracked_world);

        let tracked = Vec2::new(
            local.z / terrain.size.z * scale * width,
            local.x / terrain.size.x * scale * height,
        );
        let radius = terrain.detail_distance / terrain.size.z * scale * width;
        let required_grid = UVec2::new(
            ((scale * width) as u32).saturating_add(1),
            ((scale * height) as u32).saturating_add(1),
        );

        Self {
            detail,
            min_size: settings.min_size,
            max_size: settings.max_size,
            size_noise_scale: settings.size_noise_scale,
            profile: settings.profile,
            tracked,
            radius,
            required_grid,
            field,
        }
    }
}
