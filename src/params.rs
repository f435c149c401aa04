//! Typed effect parameters and per-frame resolution.
//!
//! Effects carry a tagged parameter sum instead of a string-keyed property
//! bag; the render path dispatches on the tag. Animation overrides individual
//! scalar fields addressed by [`ParamId`].

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::{
    color::ToneMapOperator,
    core::FrameIndex,
    error::{PrismatteError, PrismatteResult},
    keyframe::{Easing, KeyframeTrack, ParamValue},
    model::RotoStroke,
};

/// Addresses one animatable scalar field inside an [`EffectParams`] variant.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ParamId {
    Brightness,
    Contrast,
    Saturation,
    HueDegrees,
    Amount,
    Radius,
    InBlack,
    InWhite,
    Gamma,
    OutBlack,
    OutWhite,
    Hue,
    Lightness,
    OffsetX,
    OffsetY,
    Softness,
    ShadowOpacity,
    Exposure,
    Temperature,
    Tint,
    Highlights,
    Shadows,
    Whites,
    Blacks,
    Vibrance,
    VignetteAmount,
    VignetteMidpoint,
    VignetteRoundness,
    VignetteFeather,
    PositionX,
    PositionY,
    ScaleX,
    ScaleY,
    Rotation,
    AnchorX,
    AnchorY,
    CropLeft,
    CropRight,
    CropTop,
    CropBottom,
    Opacity,
    Speed,
    Choke,
    ShiftEdge,
    Feather,
}

/// Lumetri "Basic Correction" section. All sliders are user-range values;
/// rescaling to shader units happens at pass-selection time.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LumetriBasic {
    pub enabled: bool,
    pub temperature: f64, // -100..100, blue..orange
    pub tint: f64,        // -100..100, green..magenta
    pub exposure: f64,    // stops, -5..5
    pub contrast: f64,    // -100..100
    pub highlights: f64,  // -100..100
    pub shadows: f64,     // -100..100
    pub whites: f64,      // -100..100
    pub blacks: f64,      // -100..100
    pub saturation: f64,  // 0..200, 100 = identity
    pub vibrance: f64,    // -100..100
}

impl Default for LumetriBasic {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: 0.0,
            tint: 0.0,
            exposure: 0.0,
            contrast: 0.0,
            highlights: 0.0,
            shadows: 0.0,
            whites: 0.0,
            blacks: 0.0,
            saturation: 100.0,
            vibrance: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LumetriCreative {
    pub enabled: bool,
    pub faded_film: f64, // 0..100
    pub sharpen: f64,    // 0..100
    pub vibrance: f64,   // -100..100
    pub saturation: f64, // 0..200
    /// Shadow/highlight tint colors; neutral gray (0.5, 0.5, 0.5) is a no-op.
    pub shadow_tint: [f64; 3],
    pub highlight_tint: [f64; 3],
}

impl Default for LumetriCreative {
    fn default() -> Self {
        Self {
            enabled: false,
            faded_film: 0.0,
            sharpen: 0.0,
            vibrance: 0.0,
            saturation: 100.0,
            shadow_tint: [0.5, 0.5, 0.5],
            highlight_tint: [0.5, 0.5, 0.5],
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LumetriWheels {
    pub enabled: bool,
    pub shadow_offset: [f64; 3],
    pub shadow_luma: f64,
    pub midtone_offset: [f64; 3],
    pub midtone_luma: f64,
    pub highlight_offset: [f64; 3],
    pub highlight_luma: f64,
}

impl Default for LumetriWheels {
    fn default() -> Self {
        Self {
            enabled: false,
            shadow_offset: [0.0; 3],
            shadow_luma: 0.0,
            midtone_offset: [0.0; 3],
            midtone_luma: 0.0,
            highlight_offset: [0.0; 3],
            highlight_luma: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LumetriVignette {
    pub amount: f64,    // -100..100, negative darkens
    pub midpoint: f64,  // 0..100
    pub roundness: f64, // -100..100
    pub feather: f64,   // 0..100
}

/// HSL secondary: a keyer over hue/saturation/luma ranges plus the correction
/// applied inside the key.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LumetriSecondary {
    pub enabled: bool,
    pub hue_center: f64, // degrees
    pub hue_range: f64,  // degrees, half-width
    pub sat_center: f64, // 0..100
    pub sat_range: f64,
    pub luma_center: f64, // 0..100
    pub luma_range: f64,
    pub denoise: f64, // 0..1
    pub show_mask: bool,
    pub temperature: f64,
    pub tint: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub sharpen: f64,
}

impl Default for LumetriSecondary {
    fn default() -> Self {
        Self {
            enabled: false,
            hue_center: 0.0,
            hue_range: 30.0,
            sat_center: 50.0,
            sat_range: 50.0,
            luma_center: 50.0,
            luma_range: 50.0,
            denoise: 0.0,
            show_mask: false,
            temperature: 0.0,
            tint: 0.0,
            contrast: 0.0,
            saturation: 100.0,
            sharpen: 0.0,
        }
    }
}

/// The compound color grader. Sections toggle independently; curves LUTs are
/// looked up in the texture registry by stable name at render time.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LumetriParams {
    pub basic: LumetriBasic,
    pub creative: LumetriCreative,
    pub wheels: LumetriWheels,
    pub curves_enabled: bool,
    pub vignette: LumetriVignette,
    pub secondary: LumetriSecondary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotoOutputMode {
    #[default]
    Composite,
    Alpha,
    Matte,
    Boundary,
    Overlay,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RotoParams {
    pub strokes: Vec<RotoStroke>,
    pub refine_radius: u32, // px band around the scribbles
    pub choke: f64,         // -100..100
    pub shift_edge: i32,    // px, positive dilates
    pub contrast: f64,      // 0..100
    pub feather: f64,       // px
    pub output: RotoOutputMode,
    /// Seed trimaps from adjacent cached mattes when the frame has no strokes.
    pub propagation: bool,
}

impl Default for RotoParams {
    fn default() -> Self {
        Self {
            strokes: Vec::new(),
            refine_radius: 10,
            choke: 0.0,
            shift_edge: 0,
            contrast: 0.0,
            feather: 2.0,
            output: RotoOutputMode::Composite,
            propagation: true,
        }
    }
}

/// One tagged variant per effect. Intrinsic variants (motion, opacity,
/// time-remap) are always present on a clip.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "effect", rename_all = "kebab-case")]
pub enum EffectParams {
    BrightnessContrast {
        brightness: f64, // -100..100
        contrast: f64,   // -100..100
    },
    Saturation {
        amount: f64, // 0..200, 100 = identity
    },
    HueRotate {
        degrees: f64,
    },
    Invert {
        amount: f64, // 0..100
    },
    Grayscale {
        amount: f64, // 0..100
    },
    Sepia {
        amount: f64, // 0..100
    },
    Sharpen {
        amount: f64, // 0..100
    },
    Vignette {
        amount: f64,
        midpoint: f64,
        roundness: f64,
        feather: f64,
    },
    Levels {
        in_black: f64,  // 0..255
        in_white: f64,  // 0..255
        gamma: f64,     // 0.1..10
        out_black: f64, // 0..255
        out_white: f64, // 0..255
    },
    HslAdjust {
        hue: f64,        // degrees
        saturation: f64, // -100..100
        lightness: f64,  // -100..100
    },
    DropShadow {
        offset_x: f64, // px
        offset_y: f64, // px
        softness: f64, // blur radius px
        opacity: f64,  // 0..100
    },
    GaussianBlur {
        radius: f64, // px; 0 skips the effect
    },
    LumetriColor(Box<LumetriParams>),
    ToneMap {
        operator: ToneMapOperator,
    },
    Motion {
        position: [f64; 2], // px in canvas space
        scale: [f64; 2],    // percent, 100 = identity
        rotation_deg: f64,
        anchor: [f64; 2], // px in source space
        crop: [f64; 4],   // left/right/top/bottom edge ratios, 0..1
    },
    Opacity {
        percent: f64, // 0..100
    },
    TimeRemap {
        speed: f64, // > 0
    },
    RotoBrush(Box<RotoParams>),
}

impl EffectParams {
    /// Intrinsic slots created with every clip, in slot order.
    pub fn intrinsic_defaults() -> Vec<Self> {
        vec![
            Self::Motion {
                position: [0.0, 0.0],
                scale: [100.0, 100.0],
                rotation_deg: 0.0,
                anchor: [0.0, 0.0],
                crop: [0.0; 4],
            },
            Self::Opacity { percent: 100.0 },
            Self::TimeRemap { speed: 1.0 },
        ]
    }

    pub fn is_intrinsic(&self) -> bool {
        matches!(
            self,
            Self::Motion { .. } | Self::Opacity { .. } | Self::TimeRemap { .. }
        )
    }

    /// Override one scalar field. Unknown (variant, id) pairs are ignored; the
    /// engine never fails on a stale keyframe track.
    pub fn apply_scalar(&mut self, id: ParamId, v: f64) {
        use ParamId as P;
        match self {
            Self::BrightnessContrast {
                brightness,
                contrast,
            } => match id {
                P::Brightness => *brightness = v,
                P::Contrast => *contrast = v,
                _ => {}
            },
            Self::Saturation { amount }
            | Self::Invert { amount }
            | Self::Grayscale { amount }
            | Self::Sepia { amount }
            | Self::Sharpen { amount } => {
                if id == P::Amount {
                    *amount = v;
                }
            }
            Self::HueRotate { degrees } => {
                if id == P::HueDegrees {
                    *degrees = v;
                }
            }
            Self::Vignette {
                amount,
                midpoint,
                roundness,
                feather,
            } => match id {
                P::VignetteAmount | P::Amount => *amount = v,
                P::VignetteMidpoint => *midpoint = v,
                P::VignetteRoundness => *roundness = v,
                P::VignetteFeather => *feather = v,
                _ => {}
            },
            Self::Levels {
                in_black,
                in_white,
                gamma,
                out_black,
                out_white,
            } => match id {
                P::InBlack => *in_black = v,
                P::InWhite => *in_white = v,
                P::Gamma => *gamma = v,
                P::OutBlack => *out_black = v,
                P::OutWhite => *out_white = v,
                _ => {}
            },
            Self::HslAdjust {
                hue,
                saturation,
                lightness,
            } => match id {
                P::Hue => *hue = v,
                P::Saturation => *saturation = v,
                P::Lightness => *lightness = v,
                _ => {}
            },
            Self::DropShadow {
                offset_x,
                offset_y,
                softness,
                opacity,
            } => match id {
                P::OffsetX => *offset_x = v,
                P::OffsetY => *offset_y = v,
                P::Softness => *softness = v,
                P::ShadowOpacity | P::Opacity => *opacity = v,
                _ => {}
            },
            Self::GaussianBlur { radius } => {
                if id == P::Radius {
                    *radius = v;
                }
            }
            Self::LumetriColor(p) => match id {
                P::Temperature => p.basic.temperature = v,
                P::Tint => p.basic.tint = v,
                P::Exposure => p.basic.exposure = v,
                P::Contrast => p.basic.contrast = v,
                P::Highlights => p.basic.highlights = v,
                P::Shadows => p.basic.shadows = v,
                P::Whites => p.basic.whites = v,
                P::Blacks => p.basic.blacks = v,
                P::Saturation => p.basic.saturation = v,
                P::Vibrance => p.basic.vibrance = v,
                P::VignetteAmount => p.vignette.amount = v,
                P::VignetteMidpoint => p.vignette.midpoint = v,
                P::VignetteRoundness => p.vignette.roundness = v,
                P::VignetteFeather => p.vignette.feather = v,
                _ => {}
            },
            Self::ToneMap { .. } => {}
            Self::Motion {
                position,
                scale,
                rotation_deg,
                anchor,
                crop,
            } => match id {
                P::PositionX => position[0] = v,
                P::PositionY => position[1] = v,
                P::ScaleX => scale[0] = v,
                P::ScaleY => scale[1] = v,
                P::Rotation => *rotation_deg = v,
                P::AnchorX => anchor[0] = v,
                P::AnchorY => anchor[1] = v,
                P::CropLeft => crop[0] = v,
                P::CropRight => crop[1] = v,
                P::CropTop => crop[2] = v,
                P::CropBottom => crop[3] = v,
                _ => {}
            },
            Self::Opacity { percent } => {
                if id == P::Opacity {
                    *percent = v;
                }
            }
            Self::TimeRemap { speed } => {
                if id == P::Speed {
                    *speed = v;
                }
            }
            Self::RotoBrush(p) => match id {
                P::Choke => p.choke = v,
                P::ShiftEdge => p.shift_edge = v.round() as i32,
                P::Contrast => p.contrast = v,
                P::Feather => p.feather = v,
                P::Radius => p.refine_radius = v.max(0.0).round() as u32,
                _ => {}
            },
        }
    }

    fn scalars(&self) -> Vec<f64> {
        match self {
            Self::BrightnessContrast {
                brightness,
                contrast,
            } => vec![*brightness, *contrast],
            Self::Saturation { amount }
            | Self::Invert { amount }
            | Self::Grayscale { amount }
            | Self::Sepia { amount }
            | Self::Sharpen { amount } => vec![*amount],
            Self::HueRotate { degrees } => vec![*degrees],
            Self::Vignette {
                amount,
                midpoint,
                roundness,
                feather,
            } => vec![*amount, *midpoint, *roundness, *feather],
            Self::Levels {
                in_black,
                in_white,
                gamma,
                out_black,
                out_white,
            } => vec![*in_black, *in_white, *gamma, *out_black, *out_white],
            Self::HslAdjust {
                hue,
                saturation,
                lightness,
            } => vec![*hue, *saturation, *lightness],
            Self::DropShadow {
                offset_x,
                offset_y,
                softness,
                opacity,
            } => vec![*offset_x, *offset_y, *softness, *opacity],
            Self::GaussianBlur { radius } => vec![*radius],
            Self::LumetriColor(p) => vec![
                p.basic.temperature,
                p.basic.tint,
                p.basic.exposure,
                p.basic.contrast,
                p.basic.highlights,
                p.basic.shadows,
                p.basic.whites,
                p.basic.blacks,
                p.basic.saturation,
                p.basic.vibrance,
                p.creative.faded_film,
                p.creative.sharpen,
                p.vignette.amount,
                p.vignette.midpoint,
                p.vignette.roundness,
                p.vignette.feather,
                p.secondary.hue_center,
                p.secondary.hue_range,
            ],
            Self::ToneMap { .. } => vec![],
            Self::Motion {
                position,
                scale,
                rotation_deg,
                anchor,
                crop,
            } => {
                let mut v = vec![*rotation_deg];
                v.extend_from_slice(position);
                v.extend_from_slice(scale);
                v.extend_from_slice(anchor);
                v.extend_from_slice(crop);
                v
            }
            Self::Opacity { percent } => vec![*percent],
            Self::TimeRemap { speed } => vec![*speed],
            Self::RotoBrush(p) => vec![p.choke, p.contrast, p.feather],
        }
    }

    pub fn validate(&self) -> PrismatteResult<()> {
        if self.scalars().iter().any(|v| !v.is_finite()) {
            return Err(PrismatteError::invalid(
                "effect params",
                "every value must be finite",
            ));
        }
        if let Self::TimeRemap { speed } = self
            && *speed <= 0.0
        {
            return Err(PrismatteError::invalid("time remap", "speed must be > 0"));
        }
        if let Self::RotoBrush(p) = self {
            for s in &p.strokes {
                s.validate()?;
            }
        }
        Ok(())
    }
}

/// An effect placed on a clip: base params plus per-param keyframe tracks.
/// When a param's track is non-empty the base value is ignored at render time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EffectInstance {
    pub id: String,
    pub enabled: bool,
    pub params: EffectParams,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keyframes: BTreeMap<ParamId, KeyframeTrack>,
}

impl EffectInstance {
    pub fn new(id: impl Into<String>, params: EffectParams) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            params,
            keyframes: BTreeMap::new(),
        }
    }

    pub fn is_animated(&self) -> bool {
        self.keyframes.values().any(|t| !t.is_empty())
    }

    pub fn set_keyframe(&mut self, param: ParamId, frame: FrameIndex, value: f64, easing: Easing) {
        self.keyframes
            .entry(param)
            .or_default()
            .add(frame, ParamValue::Scalar(value), easing);
    }

    pub fn remove_keyframe(&mut self, param: ParamId, frame: FrameIndex) -> bool {
        self.keyframes
            .get_mut(&param)
            .is_some_and(|t| t.remove(frame))
    }

    /// Parameter snapshot at a frame. Fast path: a static instance borrows its
    /// base params; an animated one gets a copy with tracked fields overridden.
    pub fn params_at(&self, frame: FrameIndex) -> Cow<'_, EffectParams> {
        if !self.is_animated() {
            return Cow::Borrowed(&self.params);
        }
        let mut params = self.params.clone();
        for (&id, track) in &self.keyframes {
            if let Some(ParamValue::Scalar(v)) = track.value_at(frame) {
                params.apply_scalar(id, v);
            }
        }
        Cow::Owned(params)
    }

    pub fn validate(&self) -> PrismatteResult<()> {
        if self.id.trim().is_empty() {
            return Err(PrismatteError::invalid("effect instance", "id must be non-empty"));
        }
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_instance_borrows_params() {
        let fx = EffectInstance::new(
            "e0",
            EffectParams::BrightnessContrast {
                brightness: 10.0,
                contrast: 0.0,
            },
        );
        assert!(matches!(fx.params_at(FrameIndex(3)), Cow::Borrowed(_)));
    }

    #[test]
    fn animated_param_overrides_base() {
        let mut fx = EffectInstance::new("e0", EffectParams::GaussianBlur { radius: 4.0 });
        fx.set_keyframe(ParamId::Radius, FrameIndex(0), 0.0, Easing::Linear);
        fx.set_keyframe(ParamId::Radius, FrameIndex(10), 10.0, Easing::Linear);

        let at5 = fx.params_at(FrameIndex(5));
        assert_eq!(
            at5.as_ref(),
            &EffectParams::GaussianBlur { radius: 5.0 }
        );
        assert!(matches!(at5, Cow::Owned(_)));
    }

    #[test]
    fn stale_track_is_ignored() {
        let mut fx = EffectInstance::new("e0", EffectParams::Saturation { amount: 100.0 });
        // Track addresses a field this effect does not have.
        fx.set_keyframe(ParamId::Radius, FrameIndex(0), 3.0, Easing::Linear);
        assert_eq!(
            fx.params_at(FrameIndex(0)).as_ref(),
            &EffectParams::Saturation { amount: 100.0 }
        );
    }

    #[test]
    fn validate_rejects_nan() {
        let fx = EffectInstance::new(
            "e0",
            EffectParams::Saturation {
                amount: f64::NAN,
            },
        );
        assert!(fx.validate().is_err());
    }

    #[test]
    fn lumetri_params_roundtrip_json() {
        let p = EffectParams::LumetriColor(Box::default());
        let s = serde_json::to_string(&p).unwrap();
        let de: EffectParams = serde_json::from_str(&s).unwrap();
        assert_eq!(de, p);
    }
}
