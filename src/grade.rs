//! The compound color grader: main correction chain, curves LUT pass, and the
//! HSL secondary keyer.

use crate::{
    color::{self, luma},
    core::PixelBuf,
    error::PrismatteResult,
    fx_cpu::{saturate_rgb, vignette_factor},
    math::{clamp01, lerp, mix3, smoothstep},
    passes::{LumetriMainUniforms, LumetriSecondaryUniforms},
};

/// Basic correction -> creative -> color wheels -> vignette, each section
/// independently toggleable, applied in sequence to the same RGB.
pub fn lumetri_main(
    src: &PixelBuf,
    dst: &mut PixelBuf,
    uni: &LumetriMainUniforms,
) -> PrismatteResult<()> {
    let w = src.width.max(1) as f32;
    let h = src.height.max(1) as f32;

    for y in 0..src.height {
        for x in 0..src.width {
            let px = src.pixel(x, y);
            let mut rgb = [px[0], px[1], px[2]];

            if uni.basic_enabled {
                rgb = basic_correction(rgb, uni);
            }
            if uni.creative_enabled {
                rgb = creative(rgb, uni);
            }
            if uni.wheels_enabled {
                rgb = color_wheels(rgb, uni);
            }
            if let Some(v) = &uni.vignette {
                let f = vignette_factor((x as f32 + 0.5) / w, (y as f32 + 0.5) / h, v);
                rgb = [rgb[0] * f, rgb[1] * f, rgb[2] * f];
            }

            dst.put_pixel(x, y, [rgb[0], rgb[1], rgb[2], px[3]]);
        }
    }
    Ok(())
}

fn basic_correction(mut rgb: [f32; 3], uni: &LumetriMainUniforms) -> [f32; 3] {
    // White balance: blue-orange on the temperature axis, green-magenta on tint.
    rgb[0] += uni.temperature;
    rgb[2] -= uni.temperature;
    rgb[1] -= uni.tint;

    // Exposure in stops.
    let gain = 2.0f32.powf(uni.exposure);
    for c in &mut rgb {
        *c *= gain;
    }

    // Contrast about mid-gray.
    for c in &mut rgb {
        *c = (*c - 0.5) * uni.contrast + 0.5;
    }

    // Zone-targeted lifts, each gated by a smoothstep mask on luma.
    let l = luma(rgb);
    let highlight_mask = smoothstep(0.5, 0.9, l);
    let shadow_mask = 1.0 - smoothstep(0.1, 0.5, l);
    let white_mask = smoothstep(0.8, 1.0, l);
    let black_mask = 1.0 - smoothstep(0.0, 0.2, l);
    let lift = 0.25
        * (uni.highlights * highlight_mask
            + uni.shadows * shadow_mask
            + uni.whites * white_mask
            + uni.blacks * black_mask);
    for c in &mut rgb {
        *c += lift;
    }

    rgb = saturate_rgb(rgb, uni.saturation);
    vibrance(rgb, uni.vibrance)
}

/// Extra saturation push weighted toward pixels that are not yet saturated.
fn vibrance(rgb: [f32; 3], amount: f32) -> [f32; 3] {
    if amount == 0.0 {
        return rgb;
    }
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    let min = rgb[0].min(rgb[1]).min(rgb[2]);
    let current = max - min;
    let push = amount * (1.0 - clamp01(current));
    saturate_rgb(rgb, 1.0 + push)
}

fn creative(mut rgb: [f32; 3], uni: &LumetriMainUniforms) -> [f32; 3] {
    // Faded film: linear black lift toward a low-contrast ramp.
    if uni.faded_film > 0.0 {
        let faded = [
            rgb[0] * 0.84 + 0.08,
            rgb[1] * 0.84 + 0.08,
            rgb[2] * 0.84 + 0.08,
        ];
        rgb = mix3(rgb, faded, uni.faded_film);
    }

    rgb = vibrance(rgb, uni.creative_vibrance);
    rgb = saturate_rgb(rgb, uni.creative_saturation);

    // Additive split tints; a neutral 0.5 gray tint contributes nothing.
    let l = clamp01(luma(rgb));
    const TINT_STRENGTH: f32 = 0.2;
    for i in 0..3 {
        rgb[i] += (uni.shadow_tint[i] - 0.5) * (1.0 - l) * TINT_STRENGTH;
        rgb[i] += (uni.highlight_tint[i] - 0.5) * l * TINT_STRENGTH;
    }
    rgb
}

fn color_wheels(mut rgb: [f32; 3], uni: &LumetriMainUniforms) -> [f32; 3] {
    let l = clamp01(luma(rgb));
    let shadow_mask = 1.0 - smoothstep(0.0, 0.5, l);
    let midtone_mask = (1.0 - (l - 0.5).abs() * 2.0).max(0.0);
    let highlight_mask = smoothstep(0.5, 1.0, l);

    for i in 0..3 {
        rgb[i] += uni.shadow_offset[i] * shadow_mask
            + uni.midtone_offset[i] * midtone_mask
            + uni.highlight_offset[i] * highlight_mask;
    }
    let bias = uni.shadow_luma * shadow_mask
        + uni.midtone_luma * midtone_mask
        + uni.highlight_luma * highlight_mask;
    for c in &mut rgb {
        *c += bias;
    }
    rgb
}

/// Row centers of the 256x5 HSL strip, top to bottom:
/// HueVsSat, HueVsHue, HueVsLuma, LumaVsSat, SatVsSat.
#[derive(Clone, Copy)]
enum HslRow {
    HueVsSat = 0,
    HueVsHue = 1,
    HueVsLuma = 2,
    LumaVsSat = 3,
    SatVsSat = 4,
}

fn hsl_offset(strip: &[u8], row: HslRow, coord: f32) -> f32 {
    let idx = (clamp01(coord) * 255.0).round() as usize;
    let byte = strip[(row as usize) * 256 + idx];
    (f32::from(byte) - 128.0) / 255.0
}

/// Per-channel curve LUT fetch, then HSL curve offsets when the strip is
/// present. Either texture may be absent independently.
pub fn lumetri_curves(
    src: &PixelBuf,
    dst: &mut PixelBuf,
    curve: Option<&[u8]>,
    hsl: Option<&[u8]>,
) -> PrismatteResult<()> {
    let curve = curve.filter(|t| t.len() >= 256 * 4);
    let hsl = hsl.filter(|t| t.len() >= 256 * 5);

    for (d, s) in dst.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
        let mut rgb = [s[0], s[1], s[2]];

        if let Some(tex) = curve {
            for (i, c) in rgb.iter_mut().enumerate() {
                let idx = (clamp01(*c) * 255.0).round() as usize;
                *c = f32::from(tex[idx * 4 + i]) / 255.0;
            }
        }

        if let Some(strip) = hsl {
            let [h, s_, l] = color::rgb_to_hsl(rgb);
            let mut h2 = h + hsl_offset(strip, HslRow::HueVsHue, h);
            let mut s2 = s_
                + hsl_offset(strip, HslRow::HueVsSat, h)
                + hsl_offset(strip, HslRow::LumaVsSat, l)
                + hsl_offset(strip, HslRow::SatVsSat, s_);
            let mut l2 = l + hsl_offset(strip, HslRow::HueVsLuma, h);
            h2 = h2.rem_euclid(1.0);
            s2 = clamp01(s2);
            l2 = clamp01(l2);
            rgb = color::hsl_to_rgb([h2, s2, l2]);
        }

        d[0] = rgb[0];
        d[1] = rgb[1];
        d[2] = rgb[2];
        d[3] = s[3];
    }
    Ok(())
}

/// Wrap-aware hue distance in degrees.
fn hue_distance_deg(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// HSL secondary: key a hue/sat/luma range, soften each axis over the outer
/// 20% of its range, multiply into a mask, then correct inside the key.
pub fn lumetri_secondary(
    src: &PixelBuf,
    dst: &mut PixelBuf,
    uni: &LumetriSecondaryUniforms,
) -> PrismatteResult<()> {
    let n = (src.width as usize) * (src.height as usize);
    let mut mask = vec![0.0f32; n];

    for (i, s) in src.data.chunks_exact(4).enumerate() {
        let hsl = color::rgb_to_hsl([s[0], s[1], s[2]]);
        let hue_deg = hsl[0] * 360.0;

        let hd = hue_distance_deg(hue_deg, uni.hue_center);
        let sd = (hsl[1] - uni.sat_center).abs();
        let ld = (hsl[2] - uni.luma_center).abs();

        let hue_m = 1.0 - smoothstep(uni.hue_range * 0.8, uni.hue_range, hd);
        let sat_m = 1.0 - smoothstep(uni.sat_range * 0.8, uni.sat_range, sd);
        let luma_m = 1.0 - smoothstep(uni.luma_range * 0.8, uni.luma_range, ld);

        let mut m = hue_m * sat_m * luma_m;
        m = smoothstep(uni.denoise, uni.denoise + 0.1, m);
        mask[i] = m;
    }

    if uni.show_mask {
        for (i, d) in dst.data.chunks_exact_mut(4).enumerate() {
            let m = mask[i];
            d.copy_from_slice(&[m, m, m, 1.0]);
        }
        return Ok(());
    }

    // Pointwise correction of a copy, then an unsharp step on the corrected
    // pixels, blended back under the mask.
    let mut corrected = src.clone();
    for (d, s) in corrected
        .data
        .chunks_exact_mut(4)
        .zip(src.data.chunks_exact(4))
    {
        let mut rgb = [s[0], s[1], s[2]];
        rgb[0] += uni.temperature;
        rgb[2] -= uni.temperature;
        rgb[1] -= uni.tint;
        for c in &mut rgb {
            *c = (*c - 0.5) * uni.contrast + 0.5;
        }
        rgb = saturate_rgb(rgb, uni.saturation);
        d[0] = rgb[0];
        d[1] = rgb[1];
        d[2] = rgb[2];
    }

    if uni.sharpen > 0.0 {
        let blurless = corrected.clone();
        let (w, h) = (src.width as i32, src.height as i32);
        for y in 0..h {
            for x in 0..w {
                let at = |dx: i32, dy: i32| {
                    blurless.pixel(
                        (x + dx).clamp(0, w - 1) as u32,
                        (y + dy).clamp(0, h - 1) as u32,
                    )
                };
                let c = at(0, 0);
                let (l, r, u, dn) = (at(-1, 0), at(1, 0), at(0, -1), at(0, 1));
                let mut out = c;
                for i in 0..3 {
                    let lap = 4.0 * c[i] - l[i] - r[i] - u[i] - dn[i];
                    out[i] = c[i] + uni.sharpen * lap;
                }
                corrected.put_pixel(x as u32, y as u32, out);
            }
        }
    }

    for (i, (d, (s, c))) in dst
        .data
        .chunks_exact_mut(4)
        .zip(src.data.chunks_exact(4).zip(corrected.data.chunks_exact(4)))
        .enumerate()
    {
        let m = mask[i];
        d[0] = lerp(s[0], c[0], m);
        d[1] = lerp(s[1], c[1], m);
        d[2] = lerp(s[2], c[2], m);
        d[3] = s[3];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ImageBuf;

    fn flat(w: u32, h: u32, px: [u8; 4]) -> PixelBuf {
        let mut img = ImageBuf::transparent(w, h);
        for y in 0..h {
            for x in 0..w {
                img.put_pixel(x, y, px);
            }
        }
        PixelBuf::from_image(&img)
    }

    fn default_main() -> LumetriMainUniforms {
        LumetriMainUniforms {
            basic_enabled: true,
            contrast: 1.0,
            saturation: 1.0,
            creative_saturation: 1.0,
            shadow_tint: [0.5; 3],
            highlight_tint: [0.5; 3],
            ..LumetriMainUniforms::default()
        }
    }

    #[test]
    fn neutral_uniforms_are_identity() {
        let src = flat(3, 2, [120, 60, 200, 255]);
        let mut dst = PixelBuf::new(3, 2);
        lumetri_main(&src, &mut dst, &default_main()).unwrap();
        assert_eq!(src.to_image(), dst.to_image());
    }

    #[test]
    fn exposure_doubles_per_stop() {
        let src = flat(1, 1, [64, 64, 64, 255]);
        let mut dst = PixelBuf::new(1, 1);
        let mut uni = default_main();
        uni.exposure = 1.0;
        lumetri_main(&src, &mut dst, &uni).unwrap();
        let px = dst.pixel(0, 0);
        assert!((px[0] - 2.0 * 64.0 / 255.0).abs() < 1e-5);
    }

    #[test]
    fn neutral_gray_tint_is_noop() {
        let src = flat(2, 2, [90, 140, 40, 255]);
        let mut uni = default_main();
        uni.creative_enabled = true;
        let mut dst = PixelBuf::new(2, 2);
        lumetri_main(&src, &mut dst, &uni).unwrap();
        assert_eq!(src.to_image(), dst.to_image());
    }

    #[test]
    fn shadow_tint_moves_dark_pixels_more() {
        let dark = flat(1, 1, [25, 25, 25, 255]);
        let bright = flat(1, 1, [230, 230, 230, 255]);
        let mut uni = default_main();
        uni.creative_enabled = true;
        uni.shadow_tint = [1.0, 0.5, 0.5]; // push shadows red

        let mut d1 = PixelBuf::new(1, 1);
        lumetri_main(&dark, &mut d1, &uni).unwrap();
        let mut d2 = PixelBuf::new(1, 1);
        lumetri_main(&bright, &mut d2, &uni).unwrap();

        let dark_shift = d1.pixel(0, 0)[0] - dark.pixel(0, 0)[0];
        let bright_shift = d2.pixel(0, 0)[0] - bright.pixel(0, 0)[0];
        assert!(dark_shift > bright_shift);
        assert!(dark_shift > 0.0);
    }

    #[test]
    fn wheel_masks_partition_luma() {
        // Shadow offsets move a dark pixel, highlight offsets a bright one.
        let mut uni = default_main();
        uni.basic_enabled = false;
        uni.wheels_enabled = true;
        uni.shadow_offset = [0.2, 0.0, 0.0];

        let dark = flat(1, 1, [12, 12, 12, 255]);
        let bright = flat(1, 1, [245, 245, 245, 255]);
        let mut d1 = PixelBuf::new(1, 1);
        lumetri_main(&dark, &mut d1, &uni).unwrap();
        let mut d2 = PixelBuf::new(1, 1);
        lumetri_main(&bright, &mut d2, &uni).unwrap();

        assert!(d1.pixel(0, 0)[0] - dark.pixel(0, 0)[0] > 0.1);
        assert!((d2.pixel(0, 0)[0] - bright.pixel(0, 0)[0]).abs() < 1e-3);
    }

    #[test]
    fn curves_identity_lut_is_identity() {
        let lut = crate::curve_lut::build_curve_lut_texture(&[], &[], &[], &[]);
        let src = flat(2, 2, [10, 100, 200, 128]);
        let mut dst = PixelBuf::new(2, 2);
        lumetri_curves(&src, &mut dst, Some(&lut), None).unwrap();
        assert_eq!(src.to_image(), dst.to_image());
    }

    #[test]
    fn curves_identity_hsl_strip_is_near_identity() {
        let strip = crate::curve_lut::build_hsl_curve_lut(&[], &[], &[], &[], &[]);
        let src = flat(2, 2, [10, 100, 200, 255]);
        let mut dst = PixelBuf::new(2, 2);
        lumetri_curves(&src, &mut dst, None, Some(&strip)).unwrap();
        for (a, b) in dst.data.iter().zip(src.data.iter()) {
            assert!((a - b).abs() < 0.01);
        }
    }

    #[test]
    fn hue_distance_wraps() {
        assert!((hue_distance_deg(350.0, 10.0) - 20.0).abs() < 1e-4);
        assert!((hue_distance_deg(10.0, 350.0) - 20.0).abs() < 1e-4);
        assert_eq!(hue_distance_deg(180.0, 180.0), 0.0);
    }

    #[test]
    fn secondary_show_mask_keys_target_hue() {
        // A saturated red pixel inside the key, a blue one outside.
        let mut img = ImageBuf::transparent(2, 1);
        img.put_pixel(0, 0, [255, 0, 0, 255]);
        img.put_pixel(1, 0, [0, 0, 255, 255]);
        let src = PixelBuf::from_image(&img);

        let uni = LumetriSecondaryUniforms {
            hue_center: 0.0,
            hue_range: 60.0,
            sat_center: 1.0,
            sat_range: 1.0,
            luma_center: 0.5,
            luma_range: 0.5,
            denoise: 0.0,
            show_mask: true,
            temperature: 0.0,
            tint: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpen: 0.0,
        };
        let mut dst = PixelBuf::new(2, 1);
        lumetri_secondary(&src, &mut dst, &uni).unwrap();
        assert!(dst.pixel(0, 0)[0] > 0.9);
        assert!(dst.pixel(1, 0)[0] < 0.1);
    }

    #[test]
    fn secondary_blends_correction_only_inside_mask() {
        let mut img = ImageBuf::transparent(2, 1);
        img.put_pixel(0, 0, [255, 0, 0, 255]);
        img.put_pixel(1, 0, [0, 0, 255, 255]);
        let src = PixelBuf::from_image(&img);

        let uni = LumetriSecondaryUniforms {
            hue_center: 0.0,
            hue_range: 60.0,
            sat_center: 1.0,
            sat_range: 1.0,
            luma_center: 0.5,
            luma_range: 0.5,
            denoise: 0.0,
            show_mask: false,
            temperature: 0.0,
            tint: 0.0,
            contrast: 1.0,
            saturation: 0.0, // desaturate inside the key
            sharpen: 0.0,
        };
        let mut dst = PixelBuf::new(2, 1);
        lumetri_secondary(&src, &mut dst, &uni).unwrap();

        // Red pixel desaturated, blue pixel untouched.
        let red = dst.pixel(0, 0);
        assert!((red[0] - red[1]).abs() < 0.05);
        assert_eq!(dst.to_image().pixel(1, 0), [0, 0, 255, 255]);
    }
}
