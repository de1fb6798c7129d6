//! Keyframed response curves.
//!
//! Curves map a normalized input (weights, noise) to a response value. They are
//! cubic Hermite splines over keyframes with explicit in/out tangents, clamped to
//! the first/last key outside the keyed range.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{FoliageError, Result};

/// A single curve key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
}

impl Keyframe {
    pub const fn new(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }
}

/// Immutable Hermite curve. Keys are kept sorted by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct ResponseCurve {
    keys: Vec<Keyframe>,
}

impl ResponseCurve {
    pub fn new(mut keys: Vec<Keyframe>) -> Result<Self> {
        if keys.is_empty() {
            return Err(FoliageError::EmptyCurve);
        }
        if let Some(index) = keys.iter().position(|k| {
            !(k.time.is_finite()
                && k.value.is_finite()
                && k.in_tangent.is_finite()
                && k.out_tangent.is_finite())
        }) {
            return Err(FoliageError::NonFiniteKeyframe { index });
        }
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self { keys })
    }

    /// Straight line from (0, 0) to (1, 1).
    pub fn linear() -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, 0.0, 1.0, 1.0), Keyframe::new(1.0, 1.0, 1.0, 1.0)],
        }
    }

    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, value, 0.0, 0.0)],
        }
    }

    /// Default placement-probability response: steep near zero, flattening out.
    pub fn default_density() -> Self {
        Self {
            keys: vec![
                Keyframe::new(0.0, 0.0, 3.963, 3.963),
                Keyframe::new(0.235, 0.578, 1.334, 1.334),
                Keyframe::new(1.0, 1.0, 0.06, 0.06),
            ],
        }
    }

    /// Default size-vs-density response.
    pub fn default_size_density() -> Self {
        Self {
            keys: vec![
                Keyframe::new(0.0, 0.0, 7.6, 7.6),
                Keyframe::new(0.195, 0.774, 0.7, 0.7),
                Keyframe::new(1.0, 1.0, 0.0, 0.0),
            ],
        }
    }

    /// Default size randomization response.
    pub fn default_size() -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, 0.3, 0.913, 0.913), Keyframe::new(1.0, 1.0, 0.0, 0.0)],
        }
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        match self.clamped(t) {
            Some(value) => value,
            None => {
                // First key with time > t; clamping guarantees 1..len.
                let upper = self.keys.partition_point(|k| k.time <= t);
                self.segment(upper - 1, t)
            }
        }
    }

    /// Value outside (or exactly on the ends of) the keyed range.
    fn clamped(&self, t: f32) -> Option<f32> {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if self.keys.len() == 1 || t <= first.time {
            Some(first.value)
        } else if t >= last.time {
            Some(last.value)
        } else {
            None
        }
    }

    fn segment(&self, index: usize, t: f32) -> f32 {
        let k0 = self.keys[index];
        let k1 = self.keys[index + 1];
        let dt = k1.time - k0.time;
        if dt <= f32::EPSILON {
            return k1.value;
        }

        let s = (t - k0.time) / dt;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * k0.value + h10 * dt * k0.out_tangent + h01 * k1.value + h11 * dt * k1.in_tangent
    }
}

impl TryFrom<Vec<Keyframe>> for ResponseCurve {
    type Error = FoliageError;

    fn try_from(keys: Vec<Keyframe>) -> Result<Self> {
        Self::new(keys)
    }
}

impl From<ResponseCurve> for Vec<Keyframe> {
    fn from(curve: ResponseCurve) -> Self {
        curve.keys
    }
}

/// Stateful evaluator that remembers the last segment it hit.
///
/// Consecutive samples inside a chunk land in the same segment almost every time,
/// so the cached index skips the binary search. The cache makes evaluation `&mut`:
/// give each thread its own clone, or share one through [`SharedCurve`].
#[derive(Debug, Clone)]
pub struct CurveCursor {
    curve: ResponseCurve,
    segment: usize,
}

impl CurveCursor {
    pub fn new(curve: ResponseCurve) -> Self {
        Self { curve, segment: 0 }
    }

    pub fn curve(&self) -> &ResponseCurve {
        &self.curve
    }

    pub fn evaluate(&mut self, t: f32) -> f32 {
        if let Some(value) = self.curve.clamped(t) {
            return value;
        }

        let keys = &self.curve.keys;
        let cached = self.segment;
        let hit = cached + 1 < keys.len() && keys[cached].time <= t && t < keys[cached + 1].time;
        if !hit {
            self.segment = keys.partition_point(|k| k.time <= t) - 1;
        }
        self.curve.segment(self.segment, t)
    }
}

/// A [`CurveCursor`] shared between slice threads behind a single lock.
#[derive(Debug, Clone)]
pub struct SharedCurve {
    inner: Arc<Mutex<CurveCursor>>,
}

impl SharedCurve {
    pub fn new(curve: ResponseCurve) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CurveCursor::new(curve))),
        }
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        // A poisoned cursor only holds a stale segment index.
        let mut cursor = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cursor.evaluate(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_hit_exactly() {
        let curve = ResponseCurve::default_density();
        for key in curve.keys() {
            assert!((curve.evaluate(key.time) - key.value).abs() < 1e-5);
        }
    }

    #[test]
    fn clamps_outside_range() {
        let curve = ResponseCurve::default_size();
        assert_eq!(curve.evaluate(-3.0), 0.3);
        assert_eq!(curve.evaluate(7.0), 1.0);
        assert_eq!(ResponseCurve::constant(0.4).evaluate(0.9), 0.4);
    }

    #[test]
    fn linear_curve_is_identity_inside_range() {
        let curve = ResponseCurve::linear();
        for i in 0..=20 {
            let t = i as f32 / 20.0;
            assert!((curve.evaluate(t) - t).abs() < 1e-5, "t = {t}");
        }
    }

    #[test]
    fn unsorted_keys_are_sorted() {
        let curve = ResponseCurve::new(vec![
            Keyframe::new(1.0, 1.0, 1.0, 1.0),
            Keyframe::new(0.0, 0.0, 1.0, 1.0),
        ])
        .unwrap();
        assert!((curve.evaluate(0.25) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn rejects_empty_and_nan_keys() {
        assert!(matches!(ResponseCurve::new(Vec::new()), Err(FoliageError::EmptyCurve)));
        assert!(matches!(
            ResponseCurve::new(vec![Keyframe::new(0.0, f32::NAN, 0.0, 0.0)]),
            Err(FoliageError::NonFiniteKeyframe { index: 0 })
        ));
    }

    #[test]
    fn cursor_matches_curve_in_any_order() {
        let curve = ResponseCurve::default_size_density();
        let mut cursor = CurveCursor::new(curve.clone());
        let shared = SharedCurve::new(curve.clone());
        // Jump back and forth across segments to exercise the cache.
        for t in [0.9, 0.1, 0.15, 0.6, 0.195, 0.0, 1.0, 0.3, 0.05] {
            assert_eq!(cursor.evaluate(t), curve.evaluate(t));
            assert_eq!(shared.evaluate(t), curve.evaluate(t));
        }
    }

    #[test]
    fn curve_loads_from_ron_key_list() {
        let curve: ResponseCurve = ron::from_str(
            "[(time: 0.0, value: 0.0, in_tangent: 1.0, out_tangent: 1.0), \
              (time: 1.0, value: 1.0, in_tangent: 1.0, out_tangent: 1.0)]",
        )
        .unwrap();
        assert_eq!(curve, ResponseCurve::linear());
        assert!(ron::from_str::<ResponseCurve>("[]").is_err());
    }
}
