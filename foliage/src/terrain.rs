//! Read-only terrain data captured from the host terrain.
//!
//! Detail maps and heightfields share one convention: the first grid axis (`u`)
//! runs along terrain Z and the second (`v`) along terrain X. The two grids may
//! have different resolutions; lookups map between them proportionally.

use bevy::prelude::*;

use crate::error::{FoliageError, Result};

/// Documented maximum raw detail weight.
pub const MAX_DETAIL_WEIGHT: f32 = 16.0;

/// Per-texel integer density weights for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailMap {
    width: usize,
    height: usize,
    weights: Vec<u8>,
}

impl DetailMap {
    /// `weights` is laid out `u`-major: index `u * height + v`.
    pub fn new(width: usize, height: usize, weights: Vec<u8>) -> Result<Self> {
        let expected = width * height;
        if width == 0 || height == 0 || weights.len() != expected {
            return Err(FoliageError::GridSize {
                what: "detail map",
                width,
                height,
                expected,
                actual: weights.len(),
            });
        }
        Ok(Self {
            width,
            height,
            weights,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Result<Self> {
        let mut weights = Vec::with_capacity(width * height);
        for u in 0..width {
            for v in 0..height {
                weights.push(f(u, v));
            }
        }
        Self::new(width, height, weights)
    }

    pub fn filled(width: usize, height: usize, weight: u8) -> Result<Self> {
        Self::new(width, height, vec![weight; width * height])
    }

    /// Resolution along `u` (terrain Z).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Resolution along `v` (terrain X).
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw weight, indices clamped to the map.
    #[inline]
    pub fn weight(&self, u: usize, v: usize) -> f32 {
        let u = u.min(self.width - 1);
        let v = v.min(self.height - 1);
        self.weights[u * self.height + v] as f32
    }
}

/// Normalized heights (0..=1) sampled at the terrain's heightmap resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    res_u: usize,
    res_v: usize,
    samples: Vec<f32>,
}

impl HeightField {
    /// `samples` is laid out `u`-major like [`DetailMap`].
    pub fn new(res_u: usize, res_v: usize, samples: Vec<f32>) -> Result<Self> {
        let expected = res_u * res_v;
        if res_u == 0 || res_v == 0 || samples.len() != expected {
            return Err(FoliageError::GridSize {
                what: "heightfield",
                width: res_u,
                height: res_v,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            res_u,
            res_v,
            samples,
        })
    }

    pub fn from_fn(res_u: usize, res_v: usize, mut f: impl FnMut(usize, usize) -> f32) -> Result<Self> {
        let mut samples = Vec::with_capacity(res_u * res_v);
        for u in 0..res_u {
            for v in 0..res_v {
                samples.push(f(u, v));
            }
        }
        Self::new(res_u, res_v, samples)
    }

    pub fn flat(res_u: usize, res_v: usize, height: f32) -> Result<Self> {
        Self::new(res_u, res_v, vec![height; res_u * res_v])
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.res_u, self.res_v)
    }

    #[inline]
    pub fn sample(&self, u: usize, v: usize) -> f32 {
        let u = u.min(self.res_u - 1);
        let v = v.min(self.res_v - 1);
        self.samples[u * self.res_v + v]
    }

    /// Height at fractional grid coordinates.
    ///
    /// Each cell is two triangles split along its (0,0)-(1,1) diagonal; the
    /// fractional offsets pick the triangle and the height is the plane through it.
    pub fn interpolate(&self, fu: f32, fv: f32) -> f32 {
        let fu = fu.max(0.0);
        let fv = fv.max(0.0);
        let u0 = fu as usize;
        let v0 = fv as usize;
        let ru = fu - u0 as f32;
        let rv = fv - v0 as f32;
        let u1 = fu.ceil() as usize;
        let v1 = fv.ceil() as usize;

        let h00 = self.sample(u0, v0);
        let h10 = self.sample(u1, v0);
        let h01 = self.sample(u0, v1);
        let h11 = self.sample(u1, v1);

        if ru < rv {
            h00 + (h11 - h01) * ru + (h01 - h00) * rv
        } else {
            h00 + (h10 - h00) * ru + (h11 - h10) * rv
        }
    }
}

/// Immutable terrain state captured for generation cycles.
#[derive(Debug, Clone)]
pub struct TerrainSnapshot {
    /// World position of the terrain's (0, 0, 0) corner.
    pub origin: Vec3,
    /// World extents; `y` scales the normalized heights.
    pub size: Vec3,
    pub heights: HeightField,
    /// Maximum draw distance for detail objects, in world units.
    pub detail_distance: f32,
}

impl TerrainSnapshot {
    pub fn new(origin: Vec3, size: Vec3, heights: HeightField, detail_distance: f32) -> Result<Self> {
        if !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0) {
            return Err(FoliageError::InvalidTerrainSize(size));
        }
        Ok(Self {
            origin,
            size,
            heights,
            detail_distance,
        })
    }

    /// World-space height offset at normalized map coordinates (`nu` along Z, `nv` along X).
    pub fn height_at(&self, nu: f32, nv: f32) -> f32 {
        let (res_u, res_v) = self.heights.resolution();
        let fu = nu * (res_u - 1) as f32;
        let fv = nv * (res_v - 1) as f32;
        self.heights.interpolate(fu, fv) * self.size.y
    }

    /// Terrain-local position of a world point.
    pub fn local(&self, world: Vec3) -> Vec3 {
        world - self.origin
    }
}

/// Host terrain collaborator.
pub trait TerrainSource {
    fn origin(&self) -> Vec3;
    fn size(&self) -> Vec3;
    fn heightfield(&self) -> HeightField;
    /// Detail layer `index`, if the terrain has one.
    fn detail_layer(&self, index: usize) -> Option<DetailMap>;
    fn detail_distance(&self) -> f32;

    fn snapshot(&self) -> Result<TerrainSnapshot> {
        TerrainSnapshot::new(self.origin(), self.size(), self.heightfield(), self.detail_distance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_map_rejects_wrong_length() {
        assert!(DetailMap::new(4, 4, vec![0; 15]).is_err());
        assert!(DetailMap::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn detail_map_clamps_indices() {
        let map = DetailMap::from_fn(3, 2, |u, v| (u * 10 + v) as u8).unwrap();
        assert_eq!(map.weight(1, 1), 11.0);
        assert_eq!(map.weight(9, 9), 21.0);
        assert_eq!(map.weight(0, 5), 1.0);
    }

    #[test]
    fn height_interpolation_hits_corners() {
        // 2x2 cell with distinct corner heights.
        let field = HeightField::new(2, 2, vec![0.0, 0.2, 0.4, 1.0]).unwrap();
        assert_eq!(field.interpolate(0.0, 0.0), 0.0);
        assert!((field.interpolate(0.999_999, 0.0) - 0.4).abs() < 1e-4);
        assert!((field.interpolate(0.0, 0.999_999) - 0.2).abs() < 1e-4);
        assert!((field.interpolate(0.999_999, 0.999_999) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn triangle_choice_follows_fractional_offsets() {
        // Only the (1,1) corner is raised; both triangles share the diagonal.
        let field = HeightField::new(2, 2, vec![0.0, 0.0, 0.0, 1.0]).unwrap();
        // Below the diagonal (ru >= rv) uses (0,0),(1,0),(1,1): height = rv.
        assert!((field.interpolate(0.75, 0.25) - 0.25).abs() < 1e-6);
        // Above it (ru < rv) uses (0,0),(0,1),(1,1): height = ru.
        assert!((field.interpolate(0.25, 0.75) - 0.25).abs() < 1e-6);
        // On the diagonal both agree.
        assert!((field.interpolate(0.5, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn height_lookups_scale_between_resolutions() {
        let heights = HeightField::from_fn(5, 5, |u, _| u as f32 / 4.0).unwrap();
        let terrain = TerrainSnapshot::new(Vec3::ZERO, Vec3::new(100.0, 20.0, 100.0), heights, 50.0).unwrap();
        assert!((terrain.height_at(0.5, 0.3) - 10.0).abs() < 1e-4);
        assert!((terrain.height_at(1.0, 1.0) - 20.0).abs() < 1e-4);
        // Past the edge clamps to the last sample.
        assert!((terrain.height_at(1.5, 0.0) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn snapshot_rejects_flat_extents() {
        let heights = HeightField::flat(2, 2, 0.0).unwrap();
        assert!(TerrainSnapshot::new(Vec3::ZERO, Vec3::new(10.0, 0.0, 10.0), heights, 1.0).is_err());
    }
}
