//! Color primitives: BT.709 luma, RGB/HSL conversion, camera log transfer
//! curves, tone mapping, and the color-space tag tables consumed by the host
//! exporter.

use crate::math::clamp01;

/// BT.709 luma weights. Every grayscale derivation in the pipeline uses these.
pub const LUMA_709: [f32; 3] = [0.2126, 0.7152, 0.0722];

pub fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_709[0] + rgb[1] * LUMA_709[1] + rgb[2] * LUMA_709[2]
}

/// RGB in [0,1] to (h, s, l), hue in [0,1).
pub fn rgb_to_hsl(rgb: [f32; 3]) -> [f32; 3] {
    let (r, g, b) = (rgb[0], rgb[1], rgb[2]);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) * 0.5;

    if max == min {
        return [0.0, 0.0, l];
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let mut h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    h /= 6.0;

    [h, s, l]
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

pub fn hsl_to_rgb(hsl: [f32; 3]) -> [f32; 3] {
    let (h, s, l) = (hsl[0].rem_euclid(1.0), clamp01(hsl[1]), clamp01(hsl[2]));
    if s == 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    ]
}

/// Input transfer curve of a clip's source media. Non-sRGB curves get a
/// linearize pass before any effect runs.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum TransferCurve {
    #[default]
    Srgb,
    SLog3,
    CLog,
    CLog3,
    VLog,
    LogC3,
    LogC4,
    NLog,
}

impl TransferCurve {
    /// Decode one encoded channel value to scene-linear light.
    pub fn linearize(self, x: f32) -> f32 {
        match self {
            Self::Srgb => srgb_eotf(x),
            Self::SLog3 => slog3_to_linear(x),
            Self::CLog => clog_to_linear(x),
            Self::CLog3 => clog3_to_linear(x),
            Self::VLog => vlog_to_linear(x),
            Self::LogC3 => logc3_to_linear(x),
            Self::LogC4 => logc4_to_linear(x),
            Self::NLog => nlog_to_linear(x),
        }
    }
}

pub fn srgb_eotf(x: f32) -> f32 {
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

pub fn srgb_oetf(x: f32) -> f32 {
    if x <= 0.003_130_8 {
        x * 12.92
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

fn slog3_to_linear(x: f32) -> f32 {
    let v = x * 1023.0;
    if v >= 171.210_3 {
        (10.0f32.powf((v - 420.0) / 261.5)) * (0.18 + 0.01) - 0.01
    } else {
        (v - 95.0) * 0.011_25 / (171.210_3 - 95.0)
    }
}

fn clog_to_linear(x: f32) -> f32 {
    (10.0f32.powf((x - 0.073_059_7) / 0.529_136) - 1.0) / 10.1596
}

fn clog3_to_linear(x: f32) -> f32 {
    if x < 0.097_465_1 {
        -(10.0f32.powf((0.129_755_8 - x) / 0.529_136) - 1.0) / 14.98325
    } else if x <= 0.153_042_5 {
        (x - 0.125_122_4) / 1.9754798
    } else {
        (10.0f32.powf((x - 0.129_755_8) / 0.529_136) - 1.0) / 14.98325
    }
}

fn vlog_to_linear(x: f32) -> f32 {
    const B: f32 = 0.008_730_4;
    const C: f32 = 0.241_514;
    const D: f32 = 0.598_206;
    if x >= 0.181 {
        10.0f32.powf((x - D) / C) - B
    } else {
        (x - 0.125) / 5.6
    }
}

fn logc3_to_linear(x: f32) -> f32 {
    // ARRI LogC3 EI 800.
    const A: f32 = 5.555_556;
    const B: f32 = 0.052_272;
    const C: f32 = 0.247_190;
    const D: f32 = 0.385_537;
    const E: f32 = 5.367_655;
    const F: f32 = 0.092_809;
    const CUT: f32 = 0.010_591;
    if x > E * CUT + F {
        (10.0f32.powf((x - D) / C) - B) / A
    } else {
        (x - F) / E
    }
}

fn logc4_to_linear(x: f32) -> f32 {
    const A: f32 = (262_144.0 - 16.0) / 117.45;
    const B: f32 = (1023.0 - 95.0) / 1023.0;
    const C: f32 = 95.0 / 1023.0;
    if x < 0.0 {
        let s = (7.0 * std::f32::consts::LN_2 * 2.0f32.powf(7.0 - 14.0 * C / B)) / (A * B);
        let t = (2.0f32.powf(14.0 * (-C / B) + 6.0) - 64.0) / A;
        x * s + t
    } else {
        (2.0f32.powf(14.0 * (x - C) / B + 6.0) - 64.0) / A
    }
}

fn nlog_to_linear(x: f32) -> f32 {
    let v = x * 1023.0;
    if v >= 452.0 {
        ((v - 619.0) / 150.0).exp()
    } else {
        (v / 650.0).powi(3) - 0.0075
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToneMapOperator {
    Reinhard,
    Aces,
}

pub fn tone_map(op: ToneMapOperator, c: f32) -> f32 {
    match op {
        ToneMapOperator::Reinhard => c / (1.0 + c.max(0.0)),
        ToneMapOperator::Aces => {
            // Narkowicz ACES filmic approximation.
            let x = c.max(0.0);
            clamp01((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14))
        }
    }
}

/// Project working / output color spaces.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSpace {
    #[default]
    Rec709,
    DisplayP3,
    Rec2020,
}

/// Tag attached to a decoded video frame after primaries/transfer sniffing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColorSpaceTag {
    Srgb,
    Rec709,
    Rec601Ntsc,
    Rec601Pal,
    Rec2020,
    DisplayP3,
}

/// Map decoded-frame metadata to a working tag. Unknown combinations fall back
/// to Rec.709.
pub fn map_video_frame_color_space(primaries: &str, transfer: &str) -> ColorSpaceTag {
    match (primaries, transfer) {
        ("bt709", "iec61966-2-1") => ColorSpaceTag::Srgb,
        ("bt709", _) => ColorSpaceTag::Rec709,
        ("smpte170m", _) => ColorSpaceTag::Rec601Ntsc,
        ("bt470bg", _) => ColorSpaceTag::Rec601Pal,
        ("bt2020", _) => ColorSpaceTag::Rec2020,
        ("smpte432", _) => ColorSpaceTag::DisplayP3,
        _ => ColorSpaceTag::Rec709,
    }
}

/// Encoder-facing color description. `full_range` is always false: exports are
/// tagged video-range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportColorSpace {
    pub primaries: &'static str,
    pub transfer: &'static str,
    pub matrix: &'static str,
    pub full_range: bool,
}

pub fn export_color_space(space: ColorSpace) -> ExportColorSpace {
    match space {
        ColorSpace::Rec709 => ExportColorSpace {
            primaries: "bt709",
            transfer: "bt709",
            matrix: "bt709",
            full_range: false,
        },
        ColorSpace::DisplayP3 => ExportColorSpace {
            primaries: "smpte432",
            transfer: "iec61966-2-1",
            matrix: "bt709",
            full_range: false,
        },
        ColorSpace::Rec2020 => ExportColorSpace {
            primaries: "bt2020",
            transfer: "bt2020-10",
            matrix: "bt2020ncl",
            full_range: false,
        },
    }
}

/// Flag list handed verbatim to the host's encoder wrapper.
pub fn export_encoder_flags(space: ColorSpace) -> Vec<String> {
    let cs = export_color_space(space);
    vec![
        "-color_primaries".to_string(),
        cs.primaries.to_string(),
        "-color_trc".to_string(),
        cs.transfer.to_string(),
        "-colorspace".to_string(),
        cs.matrix.to_string(),
        "-color_range".to_string(),
        "tv".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_of_white_is_one() {
        assert!((luma([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hsl_roundtrip() {
        for rgb in [
            [0.2f32, 0.4, 0.8],
            [1.0, 0.0, 0.0],
            [0.5, 0.5, 0.5],
            [0.0, 0.9, 0.3],
        ] {
            let back = hsl_to_rgb(rgb_to_hsl(rgb));
            for (a, b) in back.iter().zip(rgb.iter()) {
                assert!((a - b).abs() < 1e-4, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn srgb_transfer_roundtrip() {
        for x in [0.0f32, 0.01, 0.2, 0.5, 1.0] {
            assert!((srgb_oetf(srgb_eotf(x)) - x).abs() < 1e-5);
        }
    }

    #[test]
    fn log_curves_map_mid_grey_near_018() {
        // Each camera curve encodes scene 18% grey somewhere mid-range; decode
        // of the published code values should land close to 0.18.
        assert!((slog3_to_linear(420.0 / 1023.0) - 0.18).abs() < 0.01);
        assert!((vlog_to_linear(0.423) - 0.18).abs() < 0.01);
        assert!((logc3_to_linear(0.385_537) - 0.18).abs() < 0.02);
    }

    #[test]
    fn tone_map_is_bounded() {
        for op in [ToneMapOperator::Reinhard, ToneMapOperator::Aces] {
            for x in [0.0f32, 0.5, 1.0, 4.0, 100.0] {
                let y = tone_map(op, x);
                assert!((0.0..=1.0).contains(&y), "{op:?} {x} -> {y}");
            }
        }
    }

    #[test]
    fn frame_tag_table() {
        assert_eq!(
            map_video_frame_color_space("bt709", "iec61966-2-1"),
            ColorSpaceTag::Srgb
        );
        assert_eq!(
            map_video_frame_color_space("bt709", "bt709"),
            ColorSpaceTag::Rec709
        );
        assert_eq!(
            map_video_frame_color_space("smpte170m", "smpte170m"),
            ColorSpaceTag::Rec601Ntsc
        );
        assert_eq!(
            map_video_frame_color_space("bt470bg", "bt470bg"),
            ColorSpaceTag::Rec601Pal
        );
        assert_eq!(
            map_video_frame_color_space("bt2020", "arib-std-b67"),
            ColorSpaceTag::Rec2020
        );
        assert_eq!(
            map_video_frame_color_space("smpte432", "iec61966-2-1"),
            ColorSpaceTag::DisplayP3
        );
        assert_eq!(
            map_video_frame_color_space("weird", "weird"),
            ColorSpaceTag::Rec709
        );
    }

    #[test]
    fn export_flags_are_paired() {
        let flags = export_encoder_flags(ColorSpace::Rec709);
        assert_eq!(flags.len() % 2, 0);
        assert!(flags.contains(&"bt709".to_string()));
        assert!(!export_color_space(ColorSpace::Rec2020).full_range);
    }
}
