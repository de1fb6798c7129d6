//! Density model: detail weights + noise -> placement probability and size factor.

use noise::{NoiseFn, Perlin};

use crate::curve::{CurveCursor, ResponseCurve, SharedCurve};
use crate::terrain::{DetailMap, MAX_DETAIL_WEIGHT};

/// Per-axis blended weights at a sample point, normalized to 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisWeights {
    pub u: f32,
    pub v: f32,
}

impl AxisWeights {
    /// Product of the pre-curve weights; drives the size response.
    pub fn coverage(&self) -> f32 {
        self.u * self.v
    }
}

/// Blends the weight along one axis with its previous or next neighbour.
///
/// Below the texel midpoint the previous texel blends into the local one over
/// `t = 2f`. Above it the same `t` saturates, so the weight holds at the local
/// texel; the next texel is only read when it exists.
fn one_sided(coord: f32, len: usize, local: f32, at: impl Fn(usize) -> f32) -> f32 {
    let index = coord as usize;
    let frac = coord - index as f32;
    let t = (frac * 2.0).min(1.0);

    if index == 0 {
        local
    } else if frac < 0.5 {
        lerp(at(index - 1), local, t)
    } else if coord + 1.0 < len as f32 {
        lerp(at(index + 1), local, t)
    } else {
        local
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Samples both axis weights at map coordinates `(x, y)`; `x` indexes `u`, `y` indexes `v`.
pub fn sample_weights(map: &DetailMap, x: f32, y: f32) -> AxisWeights {
    let iu = x as usize;
    let iv = y as usize;
    let local = map.weight(iu, iv);

    let u = one_sided(x, map.width(), local, |i| map.weight(i, iv));
    let v = one_sided(y, map.height(), local, |i| map.weight(iu, i));

    AxisWeights {
        u: u / MAX_DETAIL_WEIGHT,
        v: v / MAX_DETAIL_WEIGHT,
    }
}

/// Placement test: noise must be strictly below the probability.
#[inline]
pub fn accepts(noise: f32, probability: f32) -> bool {
    noise.clamp(0.0, 1.0) < probability
}

/// Response curves for one slice of a generation cycle.
///
/// The probability curve is owned per slice; the size-vs-density curve is the
/// shared, locked evaluator.
#[derive(Debug, Clone)]
pub struct DensityModel {
    response: CurveCursor,
    size_response: SharedCurve,
}

impl DensityModel {
    pub fn new(response: &ResponseCurve, size_response: SharedCurve) -> Self {
        Self {
            response: CurveCursor::new(response.clone()),
            size_response,
        }
    }

    pub fn probability(&mut self, weights: AxisWeights) -> f32 {
        self.response.evaluate(weights.u) * self.response.evaluate(weights.v)
    }

    pub fn size_factor(&self, weights: AxisWeights) -> f32 {
        self.size_response.evaluate(weights.coverage())
    }
}

/// Independent Perlin channels derived from one seed.
#[derive(Debug, Clone)]
pub struct NoiseChannels {
    placement: Perlin,
    size: Perlin,
    jitter: Perlin,
    rotation: Perlin,
}

impl NoiseChannels {
    pub fn new(seed: u32) -> Self {
        Self {
            placement: Perlin::new(seed),
            size: Perlin::new(seed.wrapping_add(1000)),
            jitter: Perlin::new(seed.wrapping_add(2000)),
            rotation: Perlin::new(seed.wrapping_add(3000)),
        }
    }

    pub fn placement(&self, a: f32, b: f32) -> f32 {
        unit(&self.placement, a, b)
    }

    pub fn size(&self, a: f32, b: f32) -> f32 {
        unit(&self.size, a, b)
    }

    pub fn jitter(&self, a: f32, b: f32) -> f32 {
        unit(&self.jitter, a, b)
    }

    pub fn rotation(&self, a: f32, b: f32) -> f32 {
        unit(&self.rotation, a, b)
    }
}

/// Perlin remapped from -1..=1 to 0..=1.
#[inline]
fn unit(perlin: &Perlin, a: f32, b: f32) -> f32 {
    (perlin.get([a as f64, b as f64]) as f32 * 0.5 + 0.5).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_map() -> DetailMap {
        // Weight grows with u; constant along v.
        DetailMap::from_fn(4, 4, |u, _| (u * 4) as u8).unwrap()
    }

    #[test]
    fn first_texel_uses_raw_weight() {
        let map = ramp_map();
        let w = sample_weights(&map, 0.2, 0.0);
        assert_eq!(w.u, 0.0);
        let w = sample_weights(&map, 0.8, 0.0);
        assert_eq!(w.u, 0.0);
    }

    #[test]
    fn lower_half_blends_from_previous_texel() {
        let map = ramp_map();
        // At the texel start the previous weight (4) dominates.
        assert_eq!(sample_weights(&map, 2.0, 0.0).u, 4.0 / 16.0);
        // Quarter way: halfway between 4 and 8.
        assert_eq!(sample_weights(&map, 2.25, 0.0).u, 6.0 / 16.0);
    }

    #[test]
    fn upper_half_holds_local_weight() {
        let map = ramp_map();
        assert_eq!(sample_weights(&map, 2.5, 0.0).u, 8.0 / 16.0);
        assert_eq!(sample_weights(&map, 2.9, 0.0).u, 8.0 / 16.0);
    }

    #[test]
    fn advancing_edge_falls_back_to_raw_weight() {
        let map = ramp_map();
        // Texel 3 is the last one; its upper half has no next texel.
        assert_eq!(sample_weights(&map, 3.7, 0.0).u, 12.0 / 16.0);
    }

    #[test]
    fn probability_is_product_of_axis_responses() {
        let mut model = DensityModel::new(&ResponseCurve::linear(), SharedCurve::new(ResponseCurve::linear()));
        let weights = AxisWeights { u: 0.5, v: 0.5 };
        assert!((model.probability(weights) - 0.25).abs() < 1e-5);
        assert!((model.size_factor(weights) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn size_factor_ignores_probability_curve() {
        // A probability curve that rejects everything leaves size untouched.
        let mut model = DensityModel::new(&ResponseCurve::constant(0.0), SharedCurve::new(ResponseCurve::linear()));
        let weights = AxisWeights { u: 1.0, v: 0.5 };
        assert_eq!(model.probability(weights), 0.0);
        assert!((model.size_factor(weights) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn acceptance_is_strict() {
        assert!(accepts(0.3, 0.31));
        assert!(!accepts(0.31, 0.31));
        assert!(!accepts(0.0, 0.0));
        assert!(accepts(-0.5, 0.01));
    }

    #[test]
    fn noise_channels_are_deterministic_and_in_range() {
        let a = NoiseChannels::new(7);
        let b = NoiseChannels::new(7);
        for i in 0..50 {
            let x = i as f32 * 0.37;
            let y = i as f32 * 1.13;
            assert_eq!(a.placement(x, y), b.placement(x, y));
            assert!((0.0..=1.0).contains(&a.jitter(x, y)));
        }
    }
}
