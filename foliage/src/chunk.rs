//! Chunks and the per-chunk instance generator.
//!
//! Chunk space: one chunk spans `CHUNK_SIZE` detail texels at density 1. Higher
//! densities shrink chunks in texel terms, so a chunk always holds at most
//! `CHUNK_SIZE²` candidate samples.

use std::f32::consts::PI;

use bevy::prelude::*;

use crate::curve::CurveCursor;
use crate::cycle::LayerCycle;
use crate::density::{accepts, sample_weights, DensityModel};

/// Chunk edge length in detail texels at density 1.
pub const CHUNK_SIZE: u32 = 31;

/// Hard cap on instances per chunk; further accepted points are dropped.
pub const CHUNK_CAPACITY: usize = 1022;

/// Frequency multiplier for the jitter noise channel.
const JITTER_FREQUENCY: f32 = 100.0;
/// Frequency multiplier for the rotation noise channel.
const ROTATION_FREQUENCY: f32 = 1000.0;

/// Integer chunk coordinate; `x` runs along terrain Z, `y` along terrain X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// The chunk's own coordinate followed by its three far corners.
    pub fn corners(self) -> [ChunkCoord; 4] {
        [
            self,
            Self::new(self.x + 1, self.y + 1),
            Self::new(self.x + 1, self.y),
            Self::new(self.x, self.y + 1),
        ]
    }
}

impl From<IVec2> for ChunkCoord {
    fn from(v: IVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

/// Inclusive radius test in chunk space.
#[inline]
pub fn within_radius(point: Vec2, tracked: Vec2, radius: f32) -> bool {
    point.distance(tracked) <= radius
}

/// A generated chunk: capped instance list plus the clipping flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub coord: ChunkCoord,
    /// Part of the chunk lay outside the load radius; it must be regenerated.
    pub clipping: bool,
    instances: Vec<Transform>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            clipping: false,
            instances: Vec::new(),
        }
    }

    /// Appends an instance; returns `false` once the chunk is full.
    pub fn push(&mut self, transform: Transform) -> bool {
        if self.is_full() {
            return false;
        }
        self.instances.push(transform);
        true
    }

    pub fn instances(&self) -> &[Transform] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.instances.len() >= CHUNK_CAPACITY
    }
}

/// Generates chunks for one slice of a cycle.
///
/// Owns its own probability and size curve cursors; the size-vs-density curve is
/// shared with the other slices through its lock.
pub struct ChunkGenerator<'a> {
    cycle: &'a LayerCycle,
    density: DensityModel,
    size_curve: CurveCursor,
}

impl<'a> ChunkGenerator<'a> {
    pub fn new(cycle: &'a LayerCycle) -> Self {
        let field = &cycle.field;
        Self {
            cycle,
            density: DensityModel::new(&field.density_curve, field.size_density_curve.clone()),
            size_curve: CurveCursor::new(field.size_curve.clone()),
        }
    }

    pub fn generate(&mut self, coord: ChunkCoord) -> Chunk {
        let cycle = self.cycle;
        let detail = &cycle.detail;
        let scale = cycle.field.chunk_scale();
        let width = detail.width() as f32;
        let height = detail.height() as f32;
        let step = 1.0 / CHUNK_SIZE as f32;

        let limit_x = ((width - 1.0) * scale).min(coord.x as f32 + 1.0);
        let limit_y = ((height - 1.0) * scale).min(coord.y as f32 + 1.0);

        let mut chunk = Chunk::new(coord);

        'samples: for i in 0..CHUNK_SIZE {
            let cx = coord.x as f32 + i as f32 * step;
            if cx >= limit_x {
                break;
            }
            for j in 0..CHUNK_SIZE {
                let cy = coord.y as f32 + j as f32 * step;
                if cy >= limit_y {
                    break;
                }

                let x = cx / scale;
                let y = cy / scale;
                if x < 0.0 || y < 0.0 || x >= width || y >= height {
                    continue;
                }

                let weights = sample_weights(detail, x, y);
                let probability = self.density.probability(weights);
                let (a, b) = self.noise_coords(x, y);
                let noise_scale = cycle.field.noise_scale;
                if !accepts(cycle.field.noise.placement(a * noise_scale, b * noise_scale), probability) {
                    continue;
                }

                if cycle.profile.clip_to_radius && !within_radius(Vec2::new(cx, cy), cycle.tracked, cycle.radius) {
                    chunk.clipping = true;
                    continue;
                }

                let size_factor = self.density.size_factor(weights);
                let transform = self.place(x, y, size_factor);
                if !chunk.push(transform) {
                    break 'samples;
                }
            }
        }

        chunk
    }

    /// Terrain-proportional noise input for map coordinates `(x, y)`.
    fn noise_coords(&self, x: f32, y: f32) -> (f32, f32) {
        let size = self.cycle.field.terrain.size;
        (
            x / self.cycle.detail.width() as f32 * size.z,
            y / self.cycle.detail.height() as f32 * size.x,
        )
    }

    /// Builds the instance transform for an accepted sample.
    pub fn place(&mut self, x: f32, y: f32, size_factor: f32) -> Transform {
        let cycle = self.cycle;
        let field = &cycle.field;
        let terrain = &field.terrain;
        let width = cycle.detail.width() as f32;
        let height = cycle.detail.height() as f32;
        let (a, b) = self.noise_coords(x, y);

        let jitter = Vec2::new(
            field.noise.jitter(a * JITTER_FREQUENCY, b * JITTER_FREQUENCY),
            field.noise.jitter(b * JITTER_FREQUENCY, a * JITTER_FREQUENCY),
        );
        let ju = x + jitter.x * 2.0 / field.jitter_density.x;
        let jv = y + jitter.y * 2.0 / field.jitter_density.y;

        let translation = terrain.origin
            + Vec3::new(
                terrain.size.x * jv / height,
                terrain.height_at(ju / width, jv / height),
                terrain.size.z * ju / width,
            );

        let rotation = if cycle.profile.yaw_variation {
            let blend = field.noise.rotation(a * ROTATION_FREQUENCY, b * ROTATION_FREQUENCY);
            Quat::IDENTITY.slerp(Quat::from_rotation_y(PI), blend)
        } else {
            Quat::IDENTITY
        };

        let size_noise = field
            .noise
            .size(a * cycle.size_noise_scale, b * cycle.size_noise_scale);
        let t = self.size_curve.evaluate(size_noise).clamp(0.0, 1.0);
        let scale = cycle.min_size.lerp(cycle.max_size, t) * field.size_multiplier * size_factor;

        Transform {
            translation,
            rotation,
            scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, layer_cycle};
    use crate::config::LayerProfile;

    #[test]
    fn push_stops_at_capacity() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        for _ in 0..CHUNK_CAPACITY {
            assert!(chunk.push(Transform::IDENTITY));
        }
        assert!(chunk.is_full());
        assert!(!chunk.push(Transform::IDENTITY));
        assert_eq!(chunk.len(), CHUNK_CAPACITY);
    }

    #[test]
    fn corners_start_with_self() {
        let corners = ChunkCoord::new(2, 3).corners();
        assert_eq!(corners[0], ChunkCoord::new(2, 3));
        assert!(corners.contains(&ChunkCoord::new(3, 4)));
        assert!(corners.contains(&ChunkCoord::new(3, 3)));
        assert!(corners.contains(&ChunkCoord::new(2, 4)));
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let tracked = Vec2::new(5.0, 5.0);
        assert!(within_radius(Vec2::new(8.0, 5.0), tracked, 3.0));
        assert!(!within_radius(Vec2::new(9.0, 5.0), tracked, 3.0));
        assert!(within_radius(Vec2::new(5.0, 2.0), tracked, 3.0));
    }

    #[test]
    fn full_weight_chunk_fills_every_sample() {
        // Weight 16 with linear curves gives probability 1 everywhere.
        let cycle = layer_cycle(&fixture(), LayerProfile::FOLIAGE);
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(5, 5));

        assert!(!chunk.clipping);
        assert_eq!(chunk.len(), (CHUNK_SIZE * CHUNK_SIZE) as usize);
    }

    #[test]
    fn instances_stay_on_the_chunk_footprint() {
        let fixture = fixture();
        let cycle = layer_cycle(&fixture, LayerProfile::FOLIAGE);
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(4, 6));

        // Chunk (4, 6) covers texels 124..155 along Z and 186..217 along X, plus up to 2 texels of jitter.
        for t in chunk.instances() {
            assert!(t.translation.z >= 124.0 && t.translation.z <= 157.0, "{t:?}");
            assert!(t.translation.x >= 186.0 && t.translation.x <= 219.0, "{t:?}");
            assert!((t.translation.y - fixture.ground_height).abs() < 1e-3);
        }
    }

    #[test]
    fn scale_stays_within_layer_range() {
        let cycle = layer_cycle(&fixture(), LayerProfile::FOLIAGE);
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(5, 5));
        let multiplier = cycle.field.size_multiplier;
        for t in chunk.instances() {
            assert!(t.scale.cmpge(cycle.min_size * multiplier - 1e-4).all(), "{:?}", t.scale);
            assert!(t.scale.cmple(cycle.max_size * multiplier + 1e-4).all(), "{:?}", t.scale);
        }
    }

    #[test]
    fn rotation_is_a_pure_yaw() {
        let cycle = layer_cycle(&fixture(), LayerProfile::FOLIAGE);
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(5, 5));
        for t in chunk.instances() {
            let up = t.rotation * Vec3::Y;
            assert!((up - Vec3::Y).length() < 1e-4);
        }

        let grass = layer_cycle(&fixture(), LayerProfile::GRASS);
        let chunk = ChunkGenerator::new(&grass).generate(ChunkCoord::new(5, 5));
        assert!(chunk.instances().iter().all(|t| t.rotation == Quat::IDENTITY));
    }

    #[test]
    fn points_past_the_radius_flag_clipping() {
        // Chunk (7, 5) spans chunk-space x in 7..8 and the radius ends at x = 8.
        let cycle = layer_cycle(&fixture(), LayerProfile::FOLIAGE);
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(7, 5));
        assert!(chunk.clipping);
        assert!(!chunk.is_empty());
        assert!(chunk.len() < (CHUNK_SIZE * CHUNK_SIZE) as usize);

        // Grass layers never clip.
        let grass = layer_cycle(&fixture(), LayerProfile::GRASS);
        let chunk = ChunkGenerator::new(&grass).generate(ChunkCoord::new(7, 5));
        assert!(!chunk.clipping);
        assert_eq!(chunk.len(), (CHUNK_SIZE * CHUNK_SIZE) as usize);
    }

    #[test]
    fn zero_weights_place_nothing() {
        let mut fixture = fixture();
        fixture.detail = std::sync::Arc::new(crate::terrain::DetailMap::filled(310, 310, 0).unwrap());
        let cycle = layer_cycle(&fixture, LayerProfile::FOLIAGE);
        assert!(ChunkGenerator::new(&cycle).generate(ChunkCoord::new(5, 5)).is_empty());
    }

    #[test]
    fn chunks_past_the_map_edge_are_trimmed() {
        // The last chunk starts at texel 310, past the map.
        let cycle = layer_cycle(&fixture(), LayerProfile::GRASS);
        assert!(ChunkGenerator::new(&cycle).generate(ChunkCoord::new(10, 5)).is_empty());
        // The chunk before it stops short of its last column, which lands on texel 309.
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(9, 5));
        assert_eq!(chunk.len(), ((CHUNK_SIZE - 1) * CHUNK_SIZE) as usize);
    }

    #[test]
    fn sampling_limit_is_exclusive() {
        // Density 31 makes one texel per chunk unit, so an 11 texel map ends at exactly x = 10.
        let mut fixture = fixture();
        fixture.settings.density = 31.0;
        fixture.detail = std::sync::Arc::new(crate::terrain::DetailMap::filled(11, 11, 16).unwrap());
        let cycle = layer_cycle(&fixture, LayerProfile::GRASS);

        assert!(ChunkGenerator::new(&cycle).generate(ChunkCoord::new(10, 5)).is_empty());
        assert!(ChunkGenerator::new(&cycle).generate(ChunkCoord::new(5, 10)).is_empty());
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(9, 5));
        assert_eq!(chunk.len(), (CHUNK_SIZE * CHUNK_SIZE) as usize);
    }

    #[test]
    fn random_weights_thin_the_chunk() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut fixture = fixture();
        let mut rng = StdRng::seed_from_u64(17);
        let detail = crate::terrain::DetailMap::from_fn(310, 310, |_, _| rng.gen_range(0..=16)).unwrap();
        fixture.detail = std::sync::Arc::new(detail);

        let cycle = layer_cycle(&fixture, LayerProfile::GRASS);
        let chunk = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(5, 5));
        assert!(!chunk.is_empty());
        assert!(chunk.len() < (CHUNK_SIZE * CHUNK_SIZE) as usize);
    }

    #[test]
    fn generation_is_reproducible() {
        let cycle = layer_cycle(&fixture(), LayerProfile::FOLIAGE);
        let a = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(3, 4));
        let b = ChunkGenerator::new(&cycle).generate(ChunkCoord::new(3, 4));
        assert_eq!(a, b);
    }
}
