use std::{
    fmt,
    ops::{Add, Mul},
    rc::Rc,
};

use nalgebra::{Quaternion, Vector3};

use super::palette::{QUATERNION_DOT_TOLERANCE, VECTOR_DISTANCE_SQ_TOLERANCE};
use crate::scene::{AnimationSampler, Interpolation};

/// Value type a curve can carry.
///
/// Interpolation is component-wise for vectors and quaternions alike.
pub trait CurveValue:
    Copy + fmt::Debug + Add<Output = Self> + Mul<f32, Output = Self> + 'static
{
    /// Tolerance-based equality used for constant-curve detection.
    fn approx_eq(&self, other: &Self) -> bool;

    fn lerp(&self, other: &Self, u: f32) -> Self {
        *self * (1.0 - u) + *other * u
    }

    fn is_finite(&self) -> bool;
}

impl CurveValue for Vector3<f32> {
    fn approx_eq(&self, other: &Self) -> bool {
        (self - other).norm_squared() < VECTOR_DISTANCE_SQ_TOLERANCE
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|value| value.is_finite())
    }
}

impl CurveValue for Quaternion<f32> {
    fn approx_eq(&self, other: &Self) -> bool {
        let (Some(a), Some(b)) = (
            self.coords.try_normalize(1e-12),
            other.coords.try_normalize(1e-12),
        ) else {
            return self == other;
        };
        a.dot(&b).abs() > QUATERNION_DOT_TOLERANCE
    }

    fn is_finite(&self) -> bool {
        self.coords.iter().all(|value| value.is_finite())
    }
}

/// A sampler able to produce a value at any time, typically backed by the
/// source document's own interpolation rules.
pub trait CurveSampler<T>: fmt::Debug {
    fn sample(&self, time: f32) -> T;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}

/// Keyframe sequence (time ascending, times unique) with an optional native
/// sampler that takes precedence over manual interpolation.
#[derive(Debug, Clone)]
pub struct Curve<T> {
    keys: Vec<Keyframe<T>>,
    native: Option<Rc<dyn CurveSampler<T>>>,
    constant: bool,
}

impl<T: CurveValue> Default for Curve<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: CurveValue> Curve<T> {
    pub fn new(keys: Vec<Keyframe<T>>) -> Self {
        debug_assert!(keys.windows(2).all(|pair| pair[0].time < pair[1].time));
        let constant = keys
            .first()
            .map(|first| keys.iter().all(|key| key.value.approx_eq(&first.value)))
            .unwrap_or(false);
        Self {
            keys,
            native: None,
            constant,
        }
    }

    pub fn with_native(mut self, sampler: Rc<dyn CurveSampler<T>>) -> Self {
        self.native = Some(sampler);
        self
    }

    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    pub fn native(&self) -> Option<&Rc<dyn CurveSampler<T>>> {
        self.native.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when every key equals the first one within tolerance.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn last_time(&self) -> Option<f32> {
        self.keys.last().map(|key| key.time)
    }

    /// Sample the curve at `time`.
    ///
    /// Returns `None` for an empty curve. Constant curves return their first
    /// value, times outside the key range clamp to the boundary keys.
    pub fn evaluate(&self, time: f32) -> Option<T> {
        let first = self.keys.first()?;
        if self.constant {
            return Some(first.value);
        }
        if time <= first.time {
            return Some(first.value);
        }
        let last = self.keys.last()?;
        if time >= last.time {
            return Some(last.value);
        }

        if let Some(native) = &self.native {
            return Some(native.sample(time));
        }
        Some(interpolate_keys(&self.keys, time))
    }
}

/// Linear interpolation between the keys bracketing `time`.
///
/// `keys` must be non-empty and sorted; times outside the range clamp.
pub fn interpolate_keys<T: CurveValue>(keys: &[Keyframe<T>], time: f32) -> T {
    let upper = keys.partition_point(|key| key.time <= time);
    if upper == 0 {
        return keys[0].value;
    }
    if upper >= keys.len() {
        return keys[keys.len() - 1].value;
    }

    let k0 = &keys[upper - 1];
    let k1 = &keys[upper];
    let span = k1.time - k0.time;
    let u = if span > 0.0 {
        ((time - k0.time) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    k0.value.lerp(&k1.value, u)
}

/// Native sampler honouring the source interpolation mode.
#[derive(Debug, Clone)]
pub struct SplineSampler<T> {
    interpolation: Interpolation,
    times: Vec<f32>,
    values: Vec<T>,
    in_tangents: Vec<T>,
    out_tangents: Vec<T>,
}

impl<T: CurveValue> SplineSampler<T> {
    /// `outputs` holds one entry per key, or three per key (in-tangent, value,
    /// out-tangent) for cubic splines.
    pub fn new(interpolation: Interpolation, times: Vec<f32>, outputs: &[T]) -> Option<Self> {
        if times.is_empty() {
            return None;
        }
        match interpolation {
            Interpolation::CubicSpline => {
                if outputs.len() != times.len() * 3 {
                    return None;
                }
                let in_tangents = outputs.iter().step_by(3).copied().collect();
                let values = outputs.iter().skip(1).step_by(3).copied().collect();
                let out_tangents = outputs.iter().skip(2).step_by(3).copied().collect();
                Some(Self {
                    interpolation,
                    times,
                    values,
                    in_tangents,
                    out_tangents,
                })
            }
            Interpolation::Step | Interpolation::Linear => {
                if outputs.len() != times.len() {
                    return None;
                }
                Some(Self {
                    interpolation,
                    times,
                    values: outputs.to_vec(),
                    in_tangents: Vec::new(),
                    out_tangents: Vec::new(),
                })
            }
        }
    }
}

impl<T: CurveValue> CurveSampler<T> for SplineSampler<T> {
    fn sample(&self, time: f32) -> T {
        let last = self.times.len() - 1;
        if time <= self.times[0] {
            return self.values[0];
        }
        if time >= self.times[last] {
            return self.values[last];
        }

        let k = self.times.partition_point(|&t| t <= time) - 1;
        let t0 = self.times[k];
        let t1 = self.times[k + 1];
        let span = t1 - t0;
        let s = if span > 0.0 {
            ((time - t0) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        match self.interpolation {
            Interpolation::Step => self.values[k],
            Interpolation::Linear => self.values[k].lerp(&self.values[k + 1], s),
            Interpolation::CubicSpline => {
                let s2 = s * s;
                let s3 = s2 * s;
                self.values[k] * (2.0 * s3 - 3.0 * s2 + 1.0)
                    + self.out_tangents[k] * ((s3 - 2.0 * s2 + s) * span)
                    + self.values[k + 1] * (-2.0 * s3 + 3.0 * s2)
                    + self.in_tangents[k + 1] * ((s3 - s2) * span)
            }
        }
    }
}

/// Native sampler for a scene sampler whose outputs were already converted to
/// `T`. Returns `None` when the output count does not fit the interpolation.
pub fn native_sampler<T: CurveValue>(
    sampler: &AnimationSampler,
    outputs: &[T],
) -> Option<Rc<dyn CurveSampler<T>>> {
    SplineSampler::new(sampler.interpolation, sampler.input.clone(), outputs)
        .map(|spline| Rc::new(spline) as Rc<dyn CurveSampler<T>>)
}
