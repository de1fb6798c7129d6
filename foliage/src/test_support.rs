//! Shared fixture: a flat 310 x 310 terrain with full detail weights, tracked at
//! its centre. At density 1 that is an 11 x 11 chunk grid, tracked chunk (5, 5)
//! and a load radius of 3 chunks.

use std::sync::Arc;

use bevy::prelude::*;

use crate::config::{FieldSettings, LayerProfile, LayerSettings};
use crate::curve::ResponseCurve;
use crate::cycle::{FieldCycle, LayerCycle};
use crate::terrain::{DetailMap, HeightField, TerrainSnapshot};

pub struct Fixture {
    pub terrain: Arc<TerrainSnapshot>,
    pub detail: Arc<DetailMap>,
    pub settings: FieldSettings,
    pub tracked_world: Vec3,
    /// World height of the flat ground.
    pub ground_height: f32,
}

pub fn fixture() -> Fixture {
    let heights = HeightField::flat(64, 64, 0.25).unwrap();
    let terrain = TerrainSnapshot::new(Vec3::ZERO, Vec3::new(310.0, 20.0, 310.0), heights, 93.0).unwrap();
    Fixture {
        terrain: Arc::new(terrain),
        detail: Arc::new(DetailMap::filled(310, 310, 16).unwrap()),
        settings: FieldSettings {
            density_curve: ResponseCurve::linear(),
            size_density_curve: ResponseCurve::linear(),
            ..default()
        },
        tracked_world: Vec3::new(155.0, 0.0, 155.0),
        ground_height: 5.0,
    }
}

pub fn layer_settings(profile: LayerProfile) -> LayerSettings {
    LayerSettings {
        name: "test".to_string(),
        profile,
        ..default()
    }
}

pub fn field_cycle(fixture: &Fixture) -> Arc<FieldCycle> {
    Arc::new(FieldCycle::capture(&fixture.settings, fixture.terrain.clone(), fixture.tracked_world).unwrap())
}

pub fn layer_cycle(fixture: &Fixture, profile: LayerProfile) -> LayerCycle {
    LayerCycle::new(field_cycle(fixture), &layer_settings(profile), fixture.detail.clone())
}
