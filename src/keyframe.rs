//! Keyframe interpolation: sorted keyframe tracks, easing curves, and the
//! value-lerp rules for scalar and bezier-path parameters.

use crate::{
    core::FrameIndex,
    model::MaskPath,
};

/// Easing applied over the span ending at a keyframe. `Hold` emits the lower
/// keyframe of the bracket unchanged.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Hold,
    Bezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::Hold => 0.0,
            Self::Bezier { x1, y1, x2, y2 } => bezier_ease(x1, y1, x2, y2, t),
        }
    }
}

fn sample_curve(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

/// CSS-style cubic bezier: `t` is the horizontal coordinate; solve for the
/// curve parameter with 20 bisection steps, then evaluate the y polynomial.
fn bezier_ease(x1: f64, y1: f64, x2: f64, y2: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    for _ in 0..20 {
        let mid = (lo + hi) * 0.5;
        if sample_curve(x1, x2, mid) < t {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    sample_curve(y1, y2, (lo + hi) * 0.5)
}

/// An animatable parameter value. Scalars and bezier paths, plus uniform
/// collections of either.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Path(MaskPath),
    ScalarList(Vec<f64>),
    PathList(Vec<MaskPath>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&MaskPath> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Lerp rules: scalars linearly; paths with matching vertex counts
    /// component-wise; uniform collections element-wise when lengths match;
    /// anything else snaps at `t < 0.5`.
    pub fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        match (a, b) {
            (Self::Scalar(x), Self::Scalar(y)) => Self::Scalar(x + (y - x) * t),
            (Self::Path(x), Self::Path(y)) if x.points.len() == y.points.len() => {
                Self::Path(MaskPath::lerp(x, y, t))
            }
            (Self::ScalarList(x), Self::ScalarList(y)) if x.len() == y.len() => Self::ScalarList(
                x.iter()
                    .zip(y.iter())
                    .map(|(a, b)| a + (b - a) * t)
                    .collect(),
            ),
            (Self::PathList(x), Self::PathList(y))
                if x.len() == y.len()
                    && x.iter()
                        .zip(y.iter())
                        .all(|(a, b)| a.points.len() == b.points.len()) =>
            {
                Self::PathList(
                    x.iter()
                        .zip(y.iter())
                        .map(|(a, b)| MaskPath::lerp(a, b, t))
                        .collect(),
                )
            }
            _ => {
                if t < 0.5 {
                    a.clone()
                } else {
                    b.clone()
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    pub frame: FrameIndex,
    pub value: ParamValue,
    pub easing: Easing,
}

/// A parameter timeline: keyframes invariantly sorted by frame with strictly
/// increasing frames (inserting at an existing frame replaces).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct KeyframeTrack {
    keys: Vec<Keyframe>,
}

impl KeyframeTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a track from possibly unsorted keyframes. Later duplicates on
    /// the same frame win.
    pub fn from_keys(keys: Vec<Keyframe>) -> Self {
        let mut track = Self::new();
        for k in keys {
            track.add(k.frame, k.value, k.easing);
        }
        track
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn add(&mut self, frame: FrameIndex, value: ParamValue, easing: Easing) {
        if let Some(existing) = self.keys.iter_mut().find(|k| k.frame == frame) {
            existing.value = value;
            existing.easing = easing;
            return;
        }
        self.keys.push(Keyframe {
            frame,
            value,
            easing,
        });
        self.keys.sort_by_key(|k| k.frame);
    }

    pub fn remove(&mut self, frame: FrameIndex) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k.frame != frame);
        before != self.keys.len()
    }

    /// Sample the track at `frame`. Returns `None` on an empty track; clamps
    /// outside the keyed range; otherwise eases with the *upper* keyframe of
    /// the bracketing pair and lerps.
    pub fn value_at(&self, frame: FrameIndex) -> Option<ParamValue> {
        let first = self.keys.first()?;
        if frame.0 <= first.frame.0 {
            return Some(first.value.clone());
        }
        let last = self.keys.last()?;
        if frame.0 >= last.frame.0 {
            return Some(last.value.clone());
        }

        // Bracket by linear scan; tracks are short in practice.
        for pair in self.keys.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.frame.0 <= frame.0 && frame.0 < b.frame.0 {
                let span = (b.frame.0 - a.frame.0) as f64;
                let t = (frame.0 - a.frame.0) as f64 / span;
                let te = b.easing.apply(t);
                return Some(ParamValue::lerp(&a.value, &b.value, te));
            }
        }
        Some(last.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_track(pairs: &[(i64, f64)]) -> KeyframeTrack {
        let mut t = KeyframeTrack::new();
        for &(f, v) in pairs {
            t.add(FrameIndex(f), ParamValue::Scalar(v), Easing::Linear);
        }
        t
    }

    #[test]
    fn empty_track_returns_none() {
        assert_eq!(KeyframeTrack::new().value_at(FrameIndex(3)), None);
    }

    #[test]
    fn linear_interpolation_and_clamping() {
        let t = scalar_track(&[(0, 0.0), (10, 100.0)]);
        assert_eq!(t.value_at(FrameIndex(5)), Some(ParamValue::Scalar(50.0)));
        assert_eq!(t.value_at(FrameIndex(3)), Some(ParamValue::Scalar(30.0)));
        assert_eq!(t.value_at(FrameIndex(-1)), Some(ParamValue::Scalar(0.0)));
        assert_eq!(t.value_at(FrameIndex(11)), Some(ParamValue::Scalar(100.0)));
    }

    #[test]
    fn hold_emits_lower_keyframe() {
        let mut t = KeyframeTrack::new();
        t.add(FrameIndex(0), ParamValue::Scalar(1.0), Easing::Linear);
        t.add(FrameIndex(10), ParamValue::Scalar(9.0), Easing::Hold);
        assert_eq!(t.value_at(FrameIndex(9)), Some(ParamValue::Scalar(1.0)));
        assert_eq!(t.value_at(FrameIndex(10)), Some(ParamValue::Scalar(9.0)));
    }

    #[test]
    fn add_replaces_on_same_frame_and_stays_sorted() {
        let mut t = scalar_track(&[(10, 1.0), (0, 0.0), (5, 0.5)]);
        t.add(FrameIndex(5), ParamValue::Scalar(2.0), Easing::Linear);
        let frames: Vec<i64> = t.keys().iter().map(|k| k.frame.0).collect();
        assert_eq!(frames, vec![0, 5, 10]);
        assert_eq!(t.value_at(FrameIndex(5)), Some(ParamValue::Scalar(2.0)));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn remove_keyframe() {
        let mut t = scalar_track(&[(0, 0.0), (5, 5.0)]);
        assert!(t.remove(FrameIndex(5)));
        assert!(!t.remove(FrameIndex(5)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn ease_in_out_midpoint() {
        assert_eq!(Easing::EaseInOut.apply(0.5), 0.5);
        assert!(Easing::EaseIn.apply(0.25) < 0.25);
        assert!(Easing::EaseOut.apply(0.25) > 0.25);
    }

    #[test]
    fn bezier_ease_endpoints_and_linearity() {
        let e = Easing::Bezier {
            x1: 0.25,
            y1: 0.25,
            x2: 0.75,
            y2: 0.75,
        };
        assert_eq!(e.apply(0.0), 0.0);
        assert_eq!(e.apply(1.0), 1.0);
        // Control points on the diagonal approximate the identity.
        assert!((e.apply(0.3) - 0.3).abs() < 1e-3);
    }

    #[test]
    fn mismatched_values_snap_at_half() {
        let a = ParamValue::Scalar(1.0);
        let b = ParamValue::ScalarList(vec![2.0]);
        assert_eq!(ParamValue::lerp(&a, &b, 0.4), a);
        assert_eq!(ParamValue::lerp(&a, &b, 0.6), b);
    }
}
