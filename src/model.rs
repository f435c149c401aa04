//! Timeline-facing data model: clips, masks, roto strokes, and the project
//! document the CLI loads. The host timeline owns creation and destruction;
//! the core only reads these.

use std::collections::BTreeMap;

use crate::{
    color::TransferCurve,
    core::{FrameIndex, FrameRange},
    error::{PrismatteError, PrismatteResult},
    keyframe::{KeyframeTrack, ParamValue},
    params::{EffectInstance, EffectParams},
    state::ProjectSettings,
    transitions::Transition,
};

/// One vertex of a mask path with incoming/outgoing bezier handle offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub in_x: f64,
    pub in_y: f64,
    pub out_x: f64,
    pub out_y: f64,
}

impl PathPoint {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        let l = |a: f64, b: f64| a + (b - a) * t;
        Self {
            x: l(a.x, b.x),
            y: l(a.y, b.y),
            in_x: l(a.in_x, b.in_x),
            in_y: l(a.in_y, b.in_y),
            out_x: l(a.out_x, b.out_x),
            out_y: l(a.out_y, b.out_y),
        }
    }
}

/// A mask path in normalized canvas coordinates ([0,1]^2) so masks survive
/// resolution changes.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MaskPath {
    pub closed: bool,
    pub points: Vec<PathPoint>,
}

impl MaskPath {
    /// Component-wise lerp; callers guarantee equal vertex counts.
    pub fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Self {
            closed: if t < 0.5 { a.closed } else { b.closed },
            points: a
                .points
                .iter()
                .zip(b.points.iter())
                .map(|(pa, pb)| PathPoint::lerp(pa, pb, t))
                .collect(),
        }
    }

    pub fn validate(&self) -> PrismatteResult<()> {
        if self.points.is_empty() {
            return Err(PrismatteError::invalid(
                "mask path",
                "must have at least one point",
            ));
        }
        if self.closed && self.points.len() < 3 {
            return Err(PrismatteError::invalid(
                "mask path",
                "a closed path needs at least 3 points to be rasterizable",
            ));
        }
        for p in &self.points {
            if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                return Err(PrismatteError::invalid(
                    "mask path",
                    "points must be in [0,1]^2",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskMode {
    Add,
    Subtract,
    Intersect,
    Difference,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MaskParam {
    Feather,
    Opacity,
    Expansion,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Mask {
    pub id: String,
    pub mode: MaskMode,
    pub inverted: bool,
    pub enabled: bool,
    pub feather: f64,   // px at canvas resolution
    pub opacity: f64,   // 0..100
    pub expansion: f64, // px, signed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keyframes: BTreeMap<MaskParam, KeyframeTrack>,
    pub path: MaskPath,
    #[serde(default, skip_serializing_if = "KeyframeTrack::is_empty")]
    pub path_keyframes: KeyframeTrack,
}

impl Mask {
    fn scalar_at(&self, param: MaskParam, base: f64, frame: FrameIndex) -> f64 {
        self.keyframes
            .get(&param)
            .and_then(|t| t.value_at(frame))
            .and_then(|v| v.as_scalar())
            .unwrap_or(base)
    }

    pub fn feather_at(&self, frame: FrameIndex) -> f64 {
        self.scalar_at(MaskParam::Feather, self.feather, frame)
    }

    pub fn opacity_at(&self, frame: FrameIndex) -> f64 {
        self.scalar_at(MaskParam::Opacity, self.opacity, frame)
    }

    pub fn expansion_at(&self, frame: FrameIndex) -> f64 {
        self.scalar_at(MaskParam::Expansion, self.expansion, frame)
    }

    /// The path at a frame: tracked path keyframes win over the static path.
    pub fn path_at(&self, frame: FrameIndex) -> MaskPath {
        self.path_keyframes
            .value_at(frame)
            .and_then(|v| v.as_path().cloned())
            .unwrap_or_else(|| self.path.clone())
    }

    pub fn validate(&self) -> PrismatteResult<()> {
        self.path.validate()?;
        for k in self.path_keyframes.keys() {
            match &k.value {
                ParamValue::Path(p) => p.validate()?,
                _ => {
                    return Err(PrismatteError::invalid(
                        format!("mask '{}'", self.id),
                        "path keyframes must hold path values",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrokeKind {
    Foreground,
    Background,
}

/// A roto-brush scribble on a specific frame, points in [0,1]^2.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RotoStroke {
    pub id: String,
    pub frame: FrameIndex,
    pub kind: StrokeKind,
    pub points: Vec<[f64; 2]>,
    pub radius: f64, // px at source resolution
}

impl RotoStroke {
    pub fn validate(&self) -> PrismatteResult<()> {
        if self.points.is_empty() {
            return Err(PrismatteError::invalid(
                format!("roto stroke '{}'", self.id),
                "needs at least one point",
            ));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(PrismatteError::invalid(
                format!("roto stroke '{}'", self.id),
                "radius must be finite and > 0",
            ));
        }
        for p in &self.points {
            if !(0.0..=1.0).contains(&p[0]) || !(0.0..=1.0).contains(&p[1]) {
                return Err(PrismatteError::invalid(
                    format!("roto stroke '{}'", self.id),
                    "points must be in [0,1]^2",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Clip {
    pub id: String,
    pub media_id: String,
    /// Native source frame size (w, h).
    pub source_rect: (u32, u32),
    pub start_frame: FrameIndex,
    pub source_in_frame: FrameIndex,
    pub source_out_frame: FrameIndex,
    pub speed: f64,
    #[serde(default)]
    pub input_curve: TransferCurve,
    pub effects: Vec<EffectInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<Mask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_clip_id: Option<String>,
}

impl Clip {
    /// A clip with its intrinsic effect slots populated. Intrinsics are always
    /// present and cannot be removed.
    pub fn new(id: impl Into<String>, media_id: impl Into<String>, source_rect: (u32, u32)) -> Self {
        let id = id.into();
        Self {
            media_id: media_id.into(),
            source_rect,
            start_frame: FrameIndex(0),
            source_in_frame: FrameIndex(0),
            source_out_frame: FrameIndex(0),
            speed: 1.0,
            input_curve: TransferCurve::Srgb,
            effects: EffectParams::intrinsic_defaults()
                .into_iter()
                .enumerate()
                .map(|(i, params)| EffectInstance::new(format!("{id}-intrinsic-{i}"), params))
                .collect(),
            masks: Vec::new(),
            linked_clip_id: None,
            id,
        }
    }

    /// Timeline placement of this clip.
    pub fn timeline_range(&self) -> FrameRange {
        let src_len = (self.source_out_frame.0 - self.source_in_frame.0).max(0) as f64;
        let out_len = (src_len / self.speed.max(1e-6)).ceil().max(1.0) as i64;
        FrameRange {
            start: self.start_frame,
            end: FrameIndex(self.start_frame.0 + out_len),
        }
    }

    /// Map a timeline frame to a source frame, honoring in/out points, speed,
    /// and the time-remap intrinsic when animated.
    pub fn source_frame_at(&self, frame: FrameIndex) -> FrameIndex {
        let local = (frame.0 - self.start_frame.0).max(0) as f64;
        // The time-remap intrinsic overrides the clip speed only when the
        // user actually touched it; a pristine slot defers to `speed`.
        let speed = self
            .effects
            .iter()
            .filter(|fx| fx.enabled)
            .find_map(|fx| match fx.params_at(frame).as_ref() {
                EffectParams::TimeRemap { speed } if fx.is_animated() || *speed != 1.0 => {
                    Some(*speed)
                }
                _ => None,
            })
            .unwrap_or(self.speed)
            .max(1e-6);
        let src = self.source_in_frame.0 + (local * speed).floor() as i64;
        FrameIndex(src.clamp(self.source_in_frame.0, self.source_out_frame.0))
    }

    pub fn validate(&self) -> PrismatteResult<()> {
        if self.source_in_frame.0 > self.source_out_frame.0 {
            return Err(PrismatteError::invalid(
                format!("clip '{}'", self.id),
                "source_in_frame must be <= source_out_frame",
            ));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(PrismatteError::invalid(
                format!("clip '{}'", self.id),
                "speed must be finite and > 0",
            ));
        }
        if self.source_rect.0 == 0 || self.source_rect.1 == 0 {
            return Err(PrismatteError::invalid(
                format!("clip '{}'", self.id),
                "source_rect must be non-empty",
            ));
        }
        for fx in &self.effects {
            fx.validate()?;
        }
        for mask in &self.masks {
            mask.validate()?;
        }
        Ok(())
    }
}

/// The project document the CLI loads: settings plus the clips and transitions
/// visible to this core. The host saves it as JSON.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Project {
    pub settings: ProjectSettings,
    pub clips: Vec<Clip>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<Transition>,
}

impl Project {
    pub fn validate(&self) -> PrismatteResult<()> {
        self.settings.validate()?;
        for clip in &self.clips {
            clip.validate()?;
            if let Some(link) = &clip.linked_clip_id
                && !self.clips.iter().any(|c| &c.id == link)
            {
                return Err(PrismatteError::MissingRef {
                    kind: "clip",
                    id: link.clone(),
                });
            }
        }
        for tr in &self.transitions {
            tr.validate()?;
            for id in [&tr.out_clip_id, &tr.in_clip_id] {
                if !self.clips.iter().any(|c| &c.id == id) {
                    return Err(PrismatteError::MissingRef {
                        kind: "clip",
                        id: (*id).clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    fn clip_mut(&mut self, id: &str) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    /// Write one scalar keyframe on an effect and announce the timeline
    /// change on the bus.
    pub fn set_effect_keyframe(
        &mut self,
        bus: &crate::state::EventBus,
        clip_id: &str,
        effect_id: &str,
        param: crate::params::ParamId,
        frame: FrameIndex,
        value: f64,
        easing: crate::keyframe::Easing,
    ) -> PrismatteResult<()> {
        let clip = self
            .clip_mut(clip_id)
            .ok_or_else(|| PrismatteError::MissingRef {
                kind: "clip",
                id: clip_id.to_string(),
            })?;
        let fx = clip
            .effects
            .iter_mut()
            .find(|fx| fx.id == effect_id)
            .ok_or_else(|| PrismatteError::MissingRef {
                kind: "effect",
                id: effect_id.to_string(),
            })?;
        fx.set_keyframe(param, frame, value, easing);
        bus.publish(&crate::state::BusEvent::TimelineUpdated {
            clip_id: Some(clip_id.to_string()),
        });
        Ok(())
    }

    /// Replace a roto instance's strokes and announce the timeline change.
    /// The render pipeline notices the mutation through its stroke
    /// fingerprint and drops the matte cache.
    pub fn set_roto_strokes(
        &mut self,
        bus: &crate::state::EventBus,
        clip_id: &str,
        effect_id: &str,
        strokes: Vec<RotoStroke>,
    ) -> PrismatteResult<()> {
        for s in &strokes {
            s.validate()?;
        }
        let clip = self
            .clip_mut(clip_id)
            .ok_or_else(|| PrismatteError::MissingRef {
                kind: "clip",
                id: clip_id.to_string(),
            })?;
        let fx = clip
            .effects
            .iter_mut()
            .find(|fx| fx.id == effect_id)
            .ok_or_else(|| PrismatteError::MissingRef {
                kind: "effect",
                id: effect_id.to_string(),
            })?;
        match &mut fx.params {
            EffectParams::RotoBrush(p) => p.strokes = strokes,
            _ => {
                return Err(PrismatteError::invalid(
                    format!("effect '{effect_id}'"),
                    "strokes belong to a roto-brush effect",
                ));
            }
        }
        bus.publish(&crate::state::BusEvent::TimelineUpdated {
            clip_id: Some(clip_id.to_string()),
        });
        Ok(())
    }
}
