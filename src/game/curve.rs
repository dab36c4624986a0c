//! Keyframed scalar curve
//!
//! Spawn groups describe their emission probability as a curve over the
//! normalized wave time `[0, 1]`. Keys are interpolated linearly and the curve
//! is clamped to its first/last key outside the keyed range.

use serde::{Deserialize, Serialize};

/// Single (time, value) key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear curve. Keys are kept sorted by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct Curve {
    keys: Vec<Keyframe>,
}

impl Curve {
    pub fn new(keys: impl IntoIterator<Item = Keyframe>) -> Self {
        let mut keys: Vec<Keyframe> = keys
            .into_iter()
            .filter(|k| k.time.is_finite() && k.value.is_finite())
            .collect();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Same value everywhere
    pub fn constant(value: f32) -> Self {
        Self::new([Keyframe::new(0.0, value)])
    }

    /// Straight line from `start` at t=0 to `end` at t=1
    pub fn linear(start: f32, end: f32) -> Self {
        Self::new([Keyframe::new(0.0, start), Keyframe::new(1.0, end)])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Last key as (time, value); (0, 0) for an empty curve
    pub fn last_point(&self) -> (f32, f32) {
        self.keys
            .last()
            .map(|k| (k.time, k.value))
            .unwrap_or((0.0, 0.0))
    }

    /// Value at `time`. An empty curve evaluates to 0.
    pub fn evaluate(&self, time: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };

        if time.is_nan() || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        // First key strictly after `time`; guaranteed to be in 1..len
        let upper = self.keys.partition_point(|k| k.time <= time);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        let t = (time - a.time) / span;
        a.value + (b.value - a.value) * t
    }
}

impl From<Vec<Keyframe>> for Curve {
    fn from(keys: Vec<Keyframe>) -> Self {
        Self::new(keys)
    }
}

impl From<Curve> for Vec<Keyframe> {
    fn from(curve: Curve) -> Self {
        curve.keys
    }
}
