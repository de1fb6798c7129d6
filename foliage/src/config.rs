//! Field and layer settings, loadable from RON.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::curve::ResponseCurve;
use crate::dispatch::ThreadScaling;
use crate::error::{FoliageError, Result};
use crate::material::{check_bindings, TextureBinding};

/// Default noise seed for every foliage field.
pub const DEFAULT_SEED: u32 = 0;

/// Largest accepted density. The chunk grid grows with the square of it.
pub const MAX_DENSITY: f32 = 64.0;

/// Density must lie in `(0, MAX_DENSITY]`.
pub fn check_density(density: f32) -> Result<()> {
    if density.is_finite() && density > 0.0 && density <= MAX_DENSITY {
        Ok(())
    } else {
        Err(FoliageError::InvalidDensity(density))
    }
}

/// Settings shared by every layer of a foliage field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Suspends drawing without stopping generation.
    pub draw: bool,
    /// Samples per detail texel along each axis.
    pub density: f32,
    /// Frequency of the placement noise.
    pub noise_scale: f32,
    /// Global multiplier on every instance scale.
    pub size_multiplier: f32,
    /// Worker knob: 1, 2 or 3 (four slices).
    pub worker_count: u8,
    pub seed: u32,
    pub density_curve: ResponseCurve,
    pub size_density_curve: ResponseCurve,
    pub size_curve: ResponseCurve,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            draw: true,
            density: 1.0,
            noise_scale: 1.0,
            size_multiplier: 0.3,
            worker_count: 2,
            seed: DEFAULT_SEED,
            density_curve: ResponseCurve::default_density(),
            size_density_curve: ResponseCurve::default_size_density(),
            size_curve: ResponseCurve::default_size(),
        }
    }
}

impl FieldSettings {
    pub fn validate(&self) -> Result<()> {
        check_density(self.density)?;
        self.scaling()?;
        Ok(())
    }

    pub fn scaling(&self) -> Result<ThreadScaling> {
        ThreadScaling::try_from(self.worker_count)
    }
}

/// How a layer streams its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerProfile {
    /// Flag chunks with points past the load radius as clipping and skip those points.
    pub clip_to_radius: bool,
    /// Test the chunk's three far corners as well as its own coordinate.
    pub corner_tests: bool,
    /// Blend each instance's yaw by noise; otherwise instances keep the identity rotation.
    pub yaw_variation: bool,
}

impl LayerProfile {
    /// Clumps and bushes.
    pub const FOLIAGE: Self = Self {
        clip_to_radius: true,
        corner_tests: true,
        yaw_variation: true,
    };

    /// Grass blades: centre-only radius tests, no clipping, fixed orientation.
    pub const GRASS: Self = Self {
        clip_to_radius: false,
        corner_tests: false,
        yaw_variation: false,
    };
}

impl Default for LayerProfile {
    fn default() -> Self {
        Self::FOLIAGE
    }
}

/// Per-layer settings. Mesh and base material are assets and are bound in code;
/// `textures` are applied onto a copy of the base material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    pub name: String,
    /// Terrain detail layer this layer reads its weights from.
    pub detail_layer: usize,
    pub min_size: Vec3,
    pub max_size: Vec3,
    /// Frequency of the size noise.
    pub size_noise_scale: f32,
    pub profile: LayerProfile,
    pub textures: Vec<TextureBinding>,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            name: "foliage".to_string(),
            detail_layer: 0,
            min_size: Vec3::splat(0.8),
            max_size: Vec3::splat(1.2),
            size_noise_scale: 1.0,
            profile: LayerProfile::FOLIAGE,
            textures: Vec::new(),
        }
    }
}

/// A field plus its layers, as stored on disk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageManifest {
    pub field: FieldSettings,
    pub layers: Vec<LayerSettings>,
}

impl FoliageManifest {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let manifest: Self = ron::from_str(source)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        self.field.validate()?;
        for layer in &self.layers {
            check_bindings(&layer.name, &layer.textures)?;
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::TextureSlot;

    #[test]
    fn defaults_validate() {
        let settings = FieldSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.scaling().unwrap(), ThreadScaling::Halves);
    }

    #[test]
    fn rejects_bad_density_and_worker_knob() {
        let mut settings = FieldSettings {
            density: 0.0,
            ..default()
        };
        assert!(matches!(settings.validate(), Err(FoliageError::InvalidDensity(_))));
        settings.density = 1.0e30;
        assert!(matches!(settings.validate(), Err(FoliageError::InvalidDensity(_))));
        settings.density = MAX_DENSITY;
        assert!(settings.validate().is_ok());

        settings.density = 1.0;
        settings.worker_count = 4;
        assert!(matches!(settings.validate(), Err(FoliageError::InvalidWorkerCount(4))));
    }

    #[test]
    fn manifest_fills_missing_fields_with_defaults() {
        let manifest = FoliageManifest::from_ron_str(
            r#"(
                field: (density: 2.0, worker_count: 3),
                layers: [
                    (name: "grass", detail_layer: 1, profile: (clip_to_radius: false, corner_tests: false, yaw_variation: false)),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(manifest.field.density, 2.0);
        assert_eq!(manifest.field.size_multiplier, 0.3);
        assert_eq!(manifest.field.size_curve, ResponseCurve::default_size());
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.layers[0].profile, LayerProfile::GRASS);
        assert_eq!(manifest.layers[0].max_size, Vec3::splat(1.2));
    }

    #[test]
    fn manifest_reads_texture_bindings() {
        let manifest = FoliageManifest::from_ron_str(
            r#"(
                layers: [
                    (name: "grass", textures: [(slot: BaseColor, path: "textures/blade.png")]),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(manifest.layers[0].textures.len(), 1);
        assert_eq!(manifest.layers[0].textures[0].slot, TextureSlot::BaseColor);

        let err = FoliageManifest::from_ron_str(
            r#"(
                layers: [
                    (name: "grass", textures: [(slot: Normal, path: "a.png"), (slot: Normal, path: "b.png")]),
                ],
            )"#,
        )
        .unwrap_err();
        assert!(matches!(err, FoliageError::DuplicateTextureSlot { .. }));
    }

    #[test]
    fn load_reports_missing_files() {
        let err = FoliageManifest::load("does/not/exist.ron").unwrap_err();
        assert!(matches!(err, FoliageError::Io(_)));
    }

    #[test]
    fn manifest_reports_invalid_settings() {
        let err = FoliageManifest::from_ron_str("(field: (density: -1.0))").unwrap_err();
        assert!(matches!(err, FoliageError::InvalidDensity(_)));
        assert!(matches!(FoliageManifest::from_ron_str("(field: ("), Err(FoliageError::Ron(_))));
    }
}
