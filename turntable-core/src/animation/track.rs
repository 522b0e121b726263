//! Keyframe tracks targeting scene node properties.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// How values between two keyframes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
    /// Hermite spline; the keyframes carry in/out tangents.
    CubicSpline,
}

/// Values that can be keyframed.
///
/// Rotations are keyed as raw quaternions so spline tangents are not forced
/// to unit length; the sampled result is normalized by the consumer.
pub trait Animatable: Copy {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self;

    fn scale(&self, factor: f32) -> Self;

    fn add(&self, other: &Self) -> Self;
}

impl Animatable for Vector3<f32> {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        a.lerp(b, t)
    }

    fn scale(&self, factor: f32) -> Self {
        *self * factor
    }

    fn add(&self, other: &Self) -> Self {
        *self + *other
    }
}

impl Animatable for Quaternion<f32> {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        let ua = UnitQuaternion::new_normalize(*a);
        let ub = UnitQuaternion::new_normalize(*b);
        ua.try_slerp(&ub, t, 1e-6)
            .unwrap_or_else(|| ua.nlerp(&ub, t))
            .into_inner()
    }

    fn scale(&self, factor: f32) -> Self {
        *self * factor
    }

    fn add(&self, other: &Self) -> Self {
        *self + *other
    }
}

/// Cubic Hermite between `v0` and `v1` with per-segment tangents `m0`, `m1`.
fn hermite<T: Animatable>(v0: &T, m0: &T, v1: &T, m1: &T, t: f32) -> T {
    let t2 = t * t;
    let t3 = t2 * t;
    v0.scale(2.0 * t3 - 3.0 * t2 + 1.0)
        .add(&m0.scale(t3 - 2.0 * t2 + t))
        .add(&v1.scale(-2.0 * t3 + 3.0 * t2))
        .add(&m1.scale(t3 - t2))
}

/// Keyframe times (ascending, seconds) and their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes<T> {
    times: Vec<f32>,
    values: Vec<T>,
    /// `(in, out)` tangents per keyframe, only for cubic splines.
    tangents: Option<Vec<(T, T)>>,
    interpolation: Interpolation,
}

impl<T: Animatable> Keyframes<T> {
    /// Pair times with values; extra entries on either side are dropped.
    /// Cubic splines must go through [`Keyframes::cubic_spline`].
    pub fn new(mut times: Vec<f32>, mut values: Vec<T>, interpolation: Interpolation) -> Self {
        let len = times.len().min(values.len());
        times.truncate(len);
        values.truncate(len);
        let interpolation = match interpolation {
            Interpolation::CubicSpline => Interpolation::Linear,
            other => other,
        };
        Self {
            times,
            values,
            tangents: None,
            interpolation,
        }
    }

    /// Build from a glTF-style cubic output: `[in, value, out]` per keyframe.
    pub fn cubic_spline(mut times: Vec<f32>, triplets: Vec<T>) -> Self {
        let len = times.len().min(triplets.len() / 3);
        times.truncate(len);
        let mut values = Vec::with_capacity(len);
        let mut tangents = Vec::with_capacity(len);
        for chunk in triplets.chunks_exact(3).take(len) {
            tangents.push((chunk[0], chunk[2]));
            values.push(chunk[1]);
        }
        Self {
            times,
            values,
            tangents: Some(tangents),
            interpolation: Interpolation::CubicSpline,
        }
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Value at `time`, holding the first/last keyframe outside the range.
    pub fn sample(&self, time: f32) -> Option<T> {
        let last = self.times.len().checked_sub(1)?;
        if last == 0 || time <= self.times[0] {
            return Some(self.values[0]);
        }
        if time >= self.times[last] {
            return Some(self.values[last]);
        }

        let next = self.times.partition_point(|&t| t <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        if span <= 0.0 {
            return Some(self.values[next]);
        }
        let t = (time - self.times[prev]) / span;

        let value = match (self.interpolation, &self.tangents) {
            (Interpolation::Step, _) => self.values[prev],
            (Interpolation::CubicSpline, Some(tangents)) => hermite(
                &self.values[prev],
                &tangents[prev].1.scale(span),
                &self.values[next],
                &tangents[next].0.scale(span),
                t,
            ),
            _ => T::lerp(&self.values[prev], &self.values[next], t),
        };
        Some(value)
    }
}

/// Animated node property with its keyframes.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    Translation(Keyframes<Vector3<f32>>),
    Rotation(Keyframes<Quaternion<f32>>),
    Scale(Keyframes<Vector3<f32>>),
}

/// Which node property a track drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackProperty {
    Translation,
    Rotation,
    Scale,
}

/// A sampled track value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackSample {
    Translation(Vector3<f32>),
    Rotation(UnitQuaternion<f32>),
    Scale(Vector3<f32>),
}

/// Keyframes for one property of one scene node.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Index into the model's node list.
    pub node: usize,
    pub values: TrackValues,
}

impl Track {
    pub fn new(node: usize, values: TrackValues) -> Self {
        Self { node, values }
    }

    pub fn property(&self) -> TrackProperty {
        match self.values {
            TrackValues::Translation(_) => TrackProperty::Translation,
            TrackValues::Rotation(_) => TrackProperty::Rotation,
            TrackValues::Scale(_) => TrackProperty::Scale,
        }
    }

    pub fn duration(&self) -> f32 {
        match &self.values {
            TrackValues::Translation(k) | TrackValues::Scale(k) => k.duration(),
            TrackValues::Rotation(k) => k.duration(),
        }
    }

    pub fn sample(&self, time: f32) -> Option<TrackSample> {
        match &self.values {
            TrackValues::Translation(k) => k.sample(time).map(TrackSample::Translation),
            TrackValues::Scale(k) => k.sample(time).map(TrackSample::Scale),
            TrackValues::Rotation(k) => k
                .sample(time)
                .and_then(|q| UnitQuaternion::try_new(q, 1e-12))
                .map(TrackSample::Rotation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn ramp(interpolation: Interpolation) -> Keyframes<Vector3<f32>> {
        Keyframes::new(
            vec![0.0, 1.0, 3.0],
            vec![Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0), Vector3::new(2.0, 4.0, 0.0)],
            interpolation,
        )
    }

    #[test]
    fn test_linear_sampling() {
        let keys = ramp(Interpolation::Linear);
        assert_eq!(keys.duration(), 3.0);
        assert!((keys.sample(0.5).unwrap() - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-6);
        assert!((keys.sample(2.0).unwrap() - Vector3::new(2.0, 2.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_step_holds_previous_value() {
        let keys = ramp(Interpolation::Step);
        assert_eq!(keys.sample(0.99).unwrap(), Vector3::zeros());
        assert_eq!(keys.sample(1.0).unwrap(), Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_clamps_outside_range() {
        let keys = ramp(Interpolation::Linear);
        assert_eq!(keys.sample(-1.0).unwrap(), Vector3::zeros());
        assert_eq!(keys.sample(10.0).unwrap(), Vector3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn test_empty_keyframes_sample_none() {
        let keys: Keyframes<Vector3<f32>> = Keyframes::new(vec![], vec![], Interpolation::Linear);
        assert!(keys.sample(0.0).is_none());
        assert_eq!(keys.duration(), 0.0);
    }

    #[test]
    fn test_cubic_spline_hits_keyframes_and_uses_tangents() {
        let zero = Vector3::zeros();
        let keys = Keyframes::cubic_spline(
            vec![0.0, 1.0],
            vec![
                zero,
                Vector3::zeros(),
                zero,
                zero,
                Vector3::new(1.0, 0.0, 0.0),
                zero,
            ],
        );
        assert_eq!(keys.interpolation(), Interpolation::CubicSpline);
        assert_eq!(keys.len(), 2);
        // Flat tangents give the smoothstep curve.
        let mid = keys.sample(0.5).unwrap();
        assert!((mid.x - 0.5).abs() < 1e-6);
        let early = keys.sample(0.25).unwrap();
        assert!((early.x - 0.15625).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_track_slerps() {
        let half = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        let track = Track::new(
            0,
            TrackValues::Rotation(Keyframes::new(
                vec![0.0, 1.0],
                vec![Quaternion::identity(), half.into_inner()],
                Interpolation::Linear,
            )),
        );
        assert_eq!(track.property(), TrackProperty::Rotation);
        let Some(TrackSample::Rotation(q)) = track.sample(0.5) else {
            panic!("expected a rotation sample");
        };
        assert!((q.angle() - FRAC_PI_2 / 2.0).abs() < 1e-5);
    }
}
