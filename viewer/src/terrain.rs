//! Noise terrain for the viewer: heightfield, detail layers and the ground mesh.
//!
//! Uses deterministic noise so the same seed always gives the same terrain.

use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, VertexAttributeValues};
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;
use foliage::{DetailMap, HeightField, TerrainSource};
use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Detail layer index for grass.
pub const GRASS_LAYER: usize = 0;
/// Detail layer index for foliage clumps.
pub const CLUMP_LAYER: usize = 1;

/// Terrain parameters from the viewer manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub seed: u32,
    /// World extents; `y` is the maximum height.
    pub size: Vec3,
    /// Heightfield samples per side.
    pub height_resolution: usize,
    /// Detail map texels per side.
    pub detail_resolution: usize,
    /// Foliage draw distance in world units.
    pub detail_distance: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            size: Vec3::new(256.0, 24.0, 256.0),
            height_resolution: 129,
            detail_resolution: 256,
            detail_distance: 60.0,
        }
    }
}

/// Noise-generated terrain implementing the foliage terrain collaborator.
#[derive(Resource, Clone)]
pub struct NoiseTerrain {
    config: TerrainConfig,
    heights: HeightField,
    height_noise: Perlin,
    meadow_noise: Perlin,
    clump_noise: Perlin,
}

impl NoiseTerrain {
    pub fn new(config: TerrainConfig) -> foliage::Result<Self> {
        let height_noise = Perlin::new(config.seed);
        let res = config.height_resolution.max(2);

        let heights = HeightField::from_fn(res, res, |u, v| {
            let z = u as f32 / (res - 1) as f32 * config.size.z;
            let x = v as f32 / (res - 1) as f32 * config.size.x;
            normalized_height(&height_noise, x, z)
        })?;

        Ok(Self {
            height_noise,
            meadow_noise: Perlin::new(config.seed.wrapping_add(1000)),
            clump_noise: Perlin::new(config.seed.wrapping_add(2000)),
            heights,
            config,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn set_detail_distance(&mut self, distance: f32) {
        self.config.detail_distance = distance.max(1.0);
    }

    /// World position of detail texel `(u, v)`.
    fn texel_world(&self, u: usize, v: usize) -> (f32, f32) {
        let res = self.config.detail_resolution as f32;
        (
            (v as f32 + 0.5) / res * self.config.size.x,
            (u as f32 + 0.5) / res * self.config.size.z,
        )
    }

    /// Grass: dense meadows on low ground, thinning uphill, with random bare texels.
    fn grass_map(&self) -> foliage::Result<DetailMap> {
        let res = self.config.detail_resolution;
        let mut rng = StdRng::seed_from_u64(self.config.seed as u64);
        DetailMap::from_fn(res, res, |u, v| {
            let (x, z) = self.texel_world(u, v);
            let meadow = self.meadow_noise.get([x as f64 * 0.02, z as f64 * 0.02]) as f32 * 0.5 + 0.5;
            let height = normalized_height(&self.height_noise, x, z);
            let weight = (meadow * 1.4 - height * 0.6).clamp(0.0, 1.0);
            if rng.gen_bool(0.05) {
                0
            } else {
                (weight * 16.0).round() as u8
            }
        })
    }

    /// Clumps: sparse patches where the clump noise peaks.
    fn clump_map(&self) -> foliage::Result<DetailMap> {
        let res = self.config.detail_resolution;
        DetailMap::from_fn(res, res, |u, v| {
            let (x, z) = self.texel_world(u, v);
            let patch = self.clump_noise.get([x as f64 * 0.035, z as f64 * 0.035]) as f32;
            if patch > 0.35 {
                (((patch - 0.35) / 0.65) * 16.0).round().min(16.0) as u8
            } else {
                0
            }
        })
    }

    /// Ground mesh matching the heightfield's triangle split.
    pub fn build_mesh(&self) -> Mesh {
        let (res_u, res_v) = self.heights.resolution();
        let size = self.config.size;
        let spacing = Vec2::new(size.x / (res_v - 1) as f32, size.z / (res_u - 1) as f32);

        let mut positions = Vec::with_capacity(res_u * res_v);
        let mut normals = Vec::with_capacity(res_u * res_v);
        let mut uvs = Vec::with_capacity(res_u * res_v);
        let mut colors = Vec::with_capacity(res_u * res_v);
        let mut indices = Vec::new();

        for u in 0..res_u {
            for v in 0..res_v {
                let h = self.heights.sample(u, v);
                positions.push([v as f32 * spacing.x, h * size.y, u as f32 * spacing.y]);
                uvs.push([v as f32 / (res_v - 1) as f32, u as f32 / (res_u - 1) as f32]);

                // Greener in valleys, drier on hills
                let dry = h.clamp(0.0, 1.0);
                colors.push([0.22 + dry * 0.25, 0.38 + dry * 0.08, 0.16, 1.0]);
            }
        }

        for u in 0..res_u {
            for v in 0..res_v {
                let idx = u * res_v + v;
                let h = |i: usize| positions[i][1];

                let h_left = if v > 0 { h(idx - 1) } else { h(idx) };
                let h_right = if v < res_v - 1 { h(idx + 1) } else { h(idx) };
                let h_down = if u > 0 { h(idx - res_v) } else { h(idx) };
                let h_up = if u < res_u - 1 { h(idx + res_v) } else { h(idx) };

                let normal = Vec3::new(
                    (h_left - h_right) / spacing.x,
                    2.0,
                    (h_down - h_up) / spacing.y,
                )
                .normalize();
                normals.push([normal.x, normal.y, normal.z]);
            }
        }

        // Split every quad along its (u, v) -> (u + 1, v + 1) diagonal.
        for u in 0..(res_u - 1) {
            for v in 0..(res_v - 1) {
                let top_left = (u * res_v + v) as u32;
                let top_right = top_left + 1;
                let bottom_left = top_left + res_v as u32;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[top_left, bottom_left, bottom_right]);
                indices.extend_from_slice(&[top_left, bottom_right, top_right]);
            }
        }

        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, VertexAttributeValues::Float32x3(positions));
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, VertexAttributeValues::Float32x3(normals));
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, VertexAttributeValues::Float32x2(uvs));
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, VertexAttributeValues::Float32x4(colors));
        mesh.insert_indices(Indices::U32(indices));
        mesh
    }
}

/// Rolling hills in 0..=1.
fn normalized_height(noise: &Perlin, x: f32, z: f32) -> f32 {
    let hills = noise.get([x as f64 * 0.008, z as f64 * 0.008]) as f32;
    let bumps = noise.get([x as f64 * 0.04 + 100.0, z as f64 * 0.04 + 100.0]) as f32;
    ((hills * 0.8 + bumps * 0.2) * 0.5 + 0.5).clamp(0.0, 1.0)
}

impl TerrainSource for NoiseTerrain {
    fn origin(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn size(&self) -> Vec3 {
        self.config.size
    }

    fn heightfield(&self) -> HeightField {
        self.heights.clone()
    }

    fn detail_layer(&self, index: usize) -> Option<DetailMap> {
        let map = match index {
            GRASS_LAYER => self.grass_map(),
            CLUMP_LAYER => self.clump_map(),
            _ => return None,
        };
        map.map_err(|err| error!("Detail layer {index} could not be built: {err}"))
            .ok()
    }

    fn detail_distance(&self) -> f32 {
        self.config.detail_distance
    }
}
