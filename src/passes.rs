//! Effect-to-pass lowering. Each enabled effect expands into zero or more
//! named shader passes with rescaled uniforms; the scheduler in `pipeline`
//! runs them over ping-pong targets.

use std::sync::Arc;

use crate::{
    color::{ToneMapOperator, TransferCurve},
    curve_lut::{CURVE_LUT_NAME, HSL_CURVE_LUT_NAME, LutRegistry},
    params::{EffectParams, LumetriParams},
};

/// The Lumetri vignette mixes its aspect term between these two constants
/// regardless of the project canvas aspect. Upstream behavior, kept as-is.
pub const VIGNETTE_WIDE_ASPECT: f32 = 1.7777;

#[derive(Clone, Debug, PartialEq)]
pub struct VignetteUniforms {
    pub amount: f32,    // -1..1, negative darkens edges
    pub midpoint: f32,  // 0..1
    pub roundness: f32, // 0..1 toward circular
    pub feather: f32,   // 0..1
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LumetriMainUniforms {
    pub basic_enabled: bool,
    pub temperature: f32, // blue..orange shift, rescaled
    pub tint: f32,        // green..magenta shift, rescaled
    pub exposure: f32,    // stops
    pub contrast: f32,    // multiplier about 0.5
    pub highlights: f32,
    pub shadows: f32,
    pub whites: f32,
    pub blacks: f32,
    pub saturation: f32, // 1 = identity
    pub vibrance: f32,

    pub creative_enabled: bool,
    pub faded_film: f32,
    pub creative_vibrance: f32,
    pub creative_saturation: f32,
    pub shadow_tint: [f32; 3],    // 0.5 neutral
    pub highlight_tint: [f32; 3], // 0.5 neutral

    pub wheels_enabled: bool,
    pub shadow_offset: [f32; 3],
    pub shadow_luma: f32,
    pub midtone_offset: [f32; 3],
    pub midtone_luma: f32,
    pub highlight_offset: [f32; 3],
    pub highlight_luma: f32,

    pub vignette: Option<VignetteUniforms>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LumetriSecondaryUniforms {
    pub hue_center: f32, // degrees
    pub hue_range: f32,  // degrees
    pub sat_center: f32, // 0..1
    pub sat_range: f32,
    pub luma_center: f32,
    pub luma_range: f32,
    pub denoise: f32,
    pub show_mask: bool,
    pub temperature: f32,
    pub tint: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sharpen: f32,
}

/// One scheduled shader pass with its bound uniforms. Texture-valued uniforms
/// arrive as `Arc` handles resolved from the registry at selection time.
#[derive(Clone, Debug, PartialEq)]
pub enum Pass {
    BrightnessContrast { brightness: f32, contrast: f32 },
    Saturation { amount: f32 },
    HueRotate { radians: f32 },
    Invert { amount: f32 },
    Grayscale { amount: f32 },
    Sepia { amount: f32 },
    Sharpen { amount: f32 },
    Vignette(VignetteUniforms),
    Levels {
        in_black: f32,
        in_white: f32,
        gamma: f32,
        out_black: f32,
        out_white: f32,
    },
    HslAdjust {
        hue_offset: f32, // 0..1 hue turns
        saturation: f32, // -1..1
        lightness: f32,  // -1..1
    },
    DropShadow {
        offset_x: f32,
        offset_y: f32,
        softness: f32,
        opacity: f32,
    },
    GaussianBlurH { radius: f32 },
    GaussianBlurV { radius: f32 },
    LumetriMain(Box<LumetriMainUniforms>),
    LumetriCurves {
        curve: Option<Arc<[u8]>>, // 256x1 RGBA
        hsl: Option<Arc<[u8]>>,   // 256x5 R
    },
    LumetriSecondary(Box<LumetriSecondaryUniforms>),
    InputLinearize { curve: TransferCurve },
    Delinearize,
    ToneMap { operator: ToneMapOperator },
}

impl Pass {
    /// Stable pass name, used for logging and one-shot warnings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BrightnessContrast { .. } => "brightness-contrast",
            Self::Saturation { .. } => "saturation",
            Self::HueRotate { .. } => "hue-rotate",
            Self::Invert { .. } => "invert",
            Self::Grayscale { .. } => "grayscale",
            Self::Sepia { .. } => "sepia",
            Self::Sharpen { .. } => "sharpen",
            Self::Vignette(_) => "vignette",
            Self::Levels { .. } => "levels",
            Self::HslAdjust { .. } => "hsl-adjust",
            Self::DropShadow { .. } => "drop-shadow",
            Self::GaussianBlurH { .. } => "gaussian-blur-h",
            Self::GaussianBlurV { .. } => "gaussian-blur-v",
            Self::LumetriMain(_) => "lumetri-color-main",
            Self::LumetriCurves { .. } => "lumetri-color-curves",
            Self::LumetriSecondary(_) => "lumetri-color-secondary",
            Self::InputLinearize { .. } => "_input-linearize",
            Self::Delinearize => "_delinearize",
            Self::ToneMap { .. } => "_tone-map",
        }
    }
}

fn vignette_uniforms(amount: f64, midpoint: f64, roundness: f64, feather: f64) -> VignetteUniforms {
    VignetteUniforms {
        amount: (amount / 100.0).clamp(-1.0, 1.0) as f32,
        midpoint: (midpoint / 100.0).clamp(0.0, 1.0) as f32,
        roundness: (roundness / 100.0).clamp(-1.0, 1.0) as f32,
        feather: (feather / 100.0).clamp(0.0, 1.0) as f32,
    }
}

fn lumetri_main_uniforms(p: &LumetriParams) -> LumetriMainUniforms {
    LumetriMainUniforms {
        basic_enabled: p.basic.enabled,
        temperature: (p.basic.temperature / 100.0 * 0.2) as f32,
        tint: (p.basic.tint / 100.0 * 0.2) as f32,
        exposure: p.basic.exposure as f32,
        contrast: ((p.basic.contrast + 100.0) / 100.0) as f32,
        highlights: (p.basic.highlights / 100.0) as f32,
        shadows: (p.basic.shadows / 100.0) as f32,
        whites: (p.basic.whites / 100.0) as f32,
        blacks: (p.basic.blacks / 100.0) as f32,
        saturation: (p.basic.saturation / 100.0) as f32,
        vibrance: (p.basic.vibrance / 100.0) as f32,

        creative_enabled: p.creative.enabled,
        faded_film: (p.creative.faded_film / 100.0) as f32,
        creative_vibrance: (p.creative.vibrance / 100.0) as f32,
        creative_saturation: (p.creative.saturation / 100.0) as f32,
        shadow_tint: p.creative.shadow_tint.map(|v| v as f32),
        highlight_tint: p.creative.highlight_tint.map(|v| v as f32),

        wheels_enabled: p.wheels.enabled,
        shadow_offset: p.wheels.shadow_offset.map(|v| (v / 200.0) as f32),
        shadow_luma: (p.wheels.shadow_luma / 200.0) as f32,
        midtone_offset: p.wheels.midtone_offset.map(|v| (v / 200.0) as f32),
        midtone_luma: (p.wheels.midtone_luma / 200.0) as f32,
        highlight_offset: p.wheels.highlight_offset.map(|v| (v / 200.0) as f32),
        highlight_luma: (p.wheels.highlight_luma / 200.0) as f32,

        vignette: (p.vignette.amount != 0.0).then(|| {
            vignette_uniforms(
                p.vignette.amount,
                p.vignette.midpoint,
                p.vignette.roundness,
                p.vignette.feather,
            )
        }),
    }
}

/// Expand one effect into its pass chain. `None`/empty means the effect is
/// skipped for this frame (disabled or a structural no-op such as blur radius
/// zero). Intrinsics and the roto brush run outside the pass system.
pub fn effect_config(params: &EffectParams, luts: &LutRegistry) -> Option<Vec<Pass>> {
    let passes = match params {
        EffectParams::BrightnessContrast {
            brightness,
            contrast,
        } => vec![Pass::BrightnessContrast {
            brightness: (brightness / 100.0) as f32,
            contrast: ((contrast + 100.0) / 100.0) as f32,
        }],
        EffectParams::Saturation { amount } => vec![Pass::Saturation {
            amount: (amount / 100.0) as f32,
        }],
        EffectParams::HueRotate { degrees } => vec![Pass::HueRotate {
            radians: degrees.to_radians() as f32,
        }],
        EffectParams::Invert { amount } => vec![Pass::Invert {
            amount: (amount / 100.0) as f32,
        }],
        EffectParams::Grayscale { amount } => vec![Pass::Grayscale {
            amount: (amount / 100.0) as f32,
        }],
        EffectParams::Sepia { amount } => vec![Pass::Sepia {
            amount: (amount / 100.0) as f32,
        }],
        EffectParams::Sharpen { amount } => vec![Pass::Sharpen {
            amount: (amount / 100.0) as f32,
        }],
        EffectParams::Vignette {
            amount,
            midpoint,
            roundness,
            feather,
        } => vec![Pass::Vignette(vignette_uniforms(
            *amount, *midpoint, *roundness, *feather,
        ))],
        EffectParams::Levels {
            in_black,
            in_white,
            gamma,
            out_black,
            out_white,
        } => vec![Pass::Levels {
            in_black: (in_black / 255.0) as f32,
            in_white: (in_white / 255.0) as f32,
            gamma: gamma.clamp(0.1, 10.0) as f32,
            out_black: (out_black / 255.0) as f32,
            out_white: (out_white / 255.0) as f32,
        }],
        EffectParams::HslAdjust {
            hue,
            saturation,
            lightness,
        } => vec![Pass::HslAdjust {
            hue_offset: (hue / 360.0) as f32,
            saturation: (saturation / 100.0) as f32,
            lightness: (lightness / 100.0) as f32,
        }],
        EffectParams::DropShadow {
            offset_x,
            offset_y,
            softness,
            opacity,
        } => vec![Pass::DropShadow {
            offset_x: *offset_x as f32,
            offset_y: *offset_y as f32,
            softness: softness.max(0.0) as f32,
            opacity: (opacity / 100.0).clamp(0.0, 1.0) as f32,
        }],
        EffectParams::GaussianBlur { radius } => {
            let radius = radius.max(0.0) as f32;
            if radius <= 0.0 {
                return Some(Vec::new());
            }
            vec![
                Pass::GaussianBlurH { radius },
                Pass::GaussianBlurV { radius },
            ]
        }
        EffectParams::LumetriColor(p) => {
            let mut passes = vec![Pass::LumetriMain(Box::new(lumetri_main_uniforms(p)))];
            if p.creative.enabled && p.creative.sharpen > 0.0 {
                passes.push(Pass::Sharpen {
                    amount: (p.creative.sharpen / 100.0) as f32,
                });
            }
            if p.curves_enabled {
                let curve = luts.get(CURVE_LUT_NAME);
                let hsl = luts.get(HSL_CURVE_LUT_NAME);
                // With no LUT uploaded at all there is nothing to sample.
                if curve.is_some() || hsl.is_some() {
                    passes.push(Pass::LumetriCurves { curve, hsl });
                }
            }
            if p.secondary.enabled {
                let s = &p.secondary;
                passes.push(Pass::LumetriSecondary(Box::new(
                    LumetriSecondaryUniforms {
                        hue_center: s.hue_center as f32,
                        hue_range: s.hue_range.max(1.0) as f32,
                        sat_center: (s.sat_center / 100.0) as f32,
                        sat_range: (s.sat_range / 100.0).max(0.01) as f32,
                        luma_center: (s.luma_center / 100.0) as f32,
                        luma_range: (s.luma_range / 100.0).max(0.01) as f32,
                        denoise: s.denoise.clamp(0.0, 1.0) as f32,
                        show_mask: s.show_mask,
                        temperature: (s.temperature / 100.0 * 0.2) as f32,
                        tint: (s.tint / 100.0 * 0.2) as f32,
                        contrast: ((s.contrast + 100.0) / 100.0) as f32,
                        saturation: (s.saturation / 100.0) as f32,
                        sharpen: (s.sharpen / 100.0) as f32,
                    },
                )));
            }
            passes
        }
        EffectParams::ToneMap { operator } => vec![Pass::ToneMap {
            operator: *operator,
        }],
        // Handled by the final composite / roto engine, not the pass system.
        EffectParams::Motion { .. }
        | EffectParams::Opacity { .. }
        | EffectParams::TimeRemap { .. }
        | EffectParams::RotoBrush(_) => Vec::new(),
    };
    Some(passes)
}

/// Linearize pass for a clip's input curve; sRGB sources skip it unless the
/// project composites in linear light.
pub fn input_linearize_pass(curve: TransferCurve, linear_compositing: bool) -> Option<Pass> {
    if curve == TransferCurve::Srgb && !linear_compositing {
        return None;
    }
    Some(Pass::InputLinearize { curve })
}
