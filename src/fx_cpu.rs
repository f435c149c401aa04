//! CPU reference kernels for the shader passes. Each kernel reads one source
//! target and writes one destination target of the same resolution; a pass is
//! atomic and never leaves partial output visible.

use crate::{
    color,
    core::PixelBuf,
    error::{PrismatteError, PrismatteResult},
    grade,
    math::{clamp01, lerp, smoothstep},
    passes::{Pass, VignetteUniforms},
};

pub fn run_pass(pass: &Pass, src: &PixelBuf, dst: &mut PixelBuf) -> PrismatteResult<()> {
    if !src.same_size_as(dst) {
        return Err(PrismatteError::ResolutionMismatch {
            stage: pass.name(),
            width: src.width,
            height: src.height,
            got_width: dst.width,
            got_height: dst.height,
        });
    }

    match pass {
        Pass::BrightnessContrast {
            brightness,
            contrast,
        } => map_rgb(src, dst, |c| {
            (c + brightness - 0.5) * contrast + 0.5
        }),
        Pass::Saturation { amount } => map_pixels(src, dst, |px| {
            let rgb = saturate_rgb([px[0], px[1], px[2]], *amount);
            [rgb[0], rgb[1], rgb[2], px[3]]
        }),
        Pass::HueRotate { radians } => {
            let turns = radians / std::f32::consts::TAU;
            map_pixels(src, dst, |px| {
                let mut hsl = color::rgb_to_hsl([px[0], px[1], px[2]]);
                hsl[0] = (hsl[0] + turns).rem_euclid(1.0);
                let rgb = color::hsl_to_rgb(hsl);
                [rgb[0], rgb[1], rgb[2], px[3]]
            })
        }
        Pass::Invert { amount } => map_rgb(src, dst, |c| lerp(c, 1.0 - c, *amount)),
        Pass::Grayscale { amount } => map_pixels(src, dst, |px| {
            let l = color::luma([px[0], px[1], px[2]]);
            [
                lerp(px[0], l, *amount),
                lerp(px[1], l, *amount),
                lerp(px[2], l, *amount),
                px[3],
            ]
        }),
        Pass::Sepia { amount } => map_pixels(src, dst, |px| {
            let (r, g, b) = (px[0], px[1], px[2]);
            let sr = 0.393 * r + 0.769 * g + 0.189 * b;
            let sg = 0.349 * r + 0.686 * g + 0.168 * b;
            let sb = 0.272 * r + 0.534 * g + 0.131 * b;
            [
                lerp(r, sr, *amount),
                lerp(g, sg, *amount),
                lerp(b, sb, *amount),
                px[3],
            ]
        }),
        Pass::Sharpen { amount } => sharpen(src, dst, *amount),
        Pass::Vignette(uni) => {
            let w = src.width.max(1) as f32;
            let h = src.height.max(1) as f32;
            for y in 0..src.height {
                for x in 0..src.width {
                    let px = src.pixel(x, y);
                    let f = vignette_factor(
                        (x as f32 + 0.5) / w,
                        (y as f32 + 0.5) / h,
                        uni,
                    );
                    dst.put_pixel(x, y, [px[0] * f, px[1] * f, px[2] * f, px[3]]);
                }
            }
            Ok(())
        }
        Pass::Levels {
            in_black,
            in_white,
            gamma,
            out_black,
            out_white,
        } => map_rgb(src, dst, |c| {
            let t = clamp01((c - in_black) / (in_white - in_black).max(1e-4));
            out_black + t.powf(1.0 / gamma) * (out_white - out_black)
        }),
        Pass::HslAdjust {
            hue_offset,
            saturation,
            lightness,
        } => map_pixels(src, dst, |px| {
            let mut hsl = color::rgb_to_hsl([px[0], px[1], px[2]]);
            hsl[0] = (hsl[0] + hue_offset).rem_euclid(1.0);
            hsl[1] = clamp01(hsl[1] * (1.0 + saturation));
            hsl[2] = clamp01(hsl[2] * (1.0 + lightness));
            let rgb = color::hsl_to_rgb(hsl);
            [rgb[0], rgb[1], rgb[2], px[3]]
        }),
        Pass::DropShadow {
            offset_x,
            offset_y,
            softness,
            opacity,
        } => drop_shadow(src, dst, *offset_x, *offset_y, *softness, *opacity),
        Pass::GaussianBlurH { radius } => blur_axis(src, dst, *radius, true),
        Pass::GaussianBlurV { radius } => blur_axis(src, dst, *radius, false),
        Pass::LumetriMain(uni) => grade::lumetri_main(src, dst, uni),
        Pass::LumetriCurves { curve, hsl } => {
            grade::lumetri_curves(src, dst, curve.as_deref(), hsl.as_deref())
        }
        Pass::LumetriSecondary(uni) => grade::lumetri_secondary(src, dst, uni),
        Pass::InputLinearize { curve } => {
            map_rgb(src, dst, |c| curve.linearize(c))
        }
        Pass::Delinearize => map_rgb(src, dst, color::srgb_oetf),
        Pass::ToneMap { operator } => map_rgb(src, dst, |c| color::tone_map(*operator, c)),
    }
}

fn map_pixels(
    src: &PixelBuf,
    dst: &mut PixelBuf,
    f: impl Fn([f32; 4]) -> [f32; 4],
) -> PrismatteResult<()> {
    for (d, s) in dst.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
        let out = f([s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

fn map_rgb(
    src: &PixelBuf,
    dst: &mut PixelBuf,
    f: impl Fn(f32) -> f32,
) -> PrismatteResult<()> {
    map_pixels(src, dst, |px| [f(px[0]), f(px[1]), f(px[2]), px[3]])
}

pub(crate) fn saturate_rgb(rgb: [f32; 3], amount: f32) -> [f32; 3] {
    let l = color::luma(rgb);
    [
        lerp(l, rgb[0], amount),
        lerp(l, rgb[1], amount),
        lerp(l, rgb[2], amount),
    ]
}

/// Radial falloff factor. The aspect term mixes between a fixed 16:9 constant
/// and 1:1 with roundness; it does not track the project canvas.
pub(crate) fn vignette_factor(u: f32, v: f32, uni: &VignetteUniforms) -> f32 {
    use crate::passes::VIGNETTE_WIDE_ASPECT;
    let aspect = lerp(VIGNETTE_WIDE_ASPECT, 1.0, clamp01(uni.roundness));
    let dx = (u - 0.5) * aspect;
    let dy = v - 0.5;
    let d = (dx * dx + dy * dy).sqrt();
    let mid = uni.midpoint * std::f32::consts::FRAC_1_SQRT_2;
    let spread = (uni.feather * 0.5).max(1e-3);
    let falloff = smoothstep(mid - spread, mid + spread, d);
    (1.0 + uni.amount * falloff).max(0.0)
}

/// Separable gaussian: weight `exp(-0.5 x^2 / max((radius/2)^2, 0.001))`,
/// normalized after summation, clamped at the image edge.
pub(crate) fn gaussian_weights(radius: f32) -> Vec<f32> {
    let half = radius.ceil().max(0.0) as i32;
    let sigma_sq = ((radius * 0.5) * (radius * 0.5)).max(0.001);
    let mut w: Vec<f32> = (-half..=half)
        .map(|i| {
            let x = i as f32;
            (-0.5 * x * x / sigma_sq).exp()
        })
        .collect();
    let sum: f32 = w.iter().sum();
    for v in &mut w {
        *v /= sum;
    }
    w
}

fn blur_axis(src: &PixelBuf, dst: &mut PixelBuf, radius: f32, horizontal: bool) -> PrismatteResult<()> {
    if radius <= 0.0 {
        dst.data.copy_from_slice(&src.data);
        return Ok(());
    }
    let k = gaussian_weights(radius);
    let half = (k.len() / 2) as i32;
    let (w, h) = (src.width as i32, src.height as i32);

    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let o = ki as i32 - half;
                let (sx, sy) = if horizontal {
                    ((x + o).clamp(0, w - 1), y)
                } else {
                    (x, (y + o).clamp(0, h - 1))
                };
                let px = src.pixel(sx as u32, sy as u32);
                for c in 0..4 {
                    acc[c] += kw * px[c];
                }
            }
            dst.put_pixel(x as u32, y as u32, acc);
        }
    }
    Ok(())
}

/// Unsharp mask against the 4-neighborhood laplacian.
fn sharpen(src: &PixelBuf, dst: &mut PixelBuf, amount: f32) -> PrismatteResult<()> {
    if amount <= 0.0 {
        dst.data.copy_from_slice(&src.data);
        return Ok(());
    }
    let (w, h) = (src.width as i32, src.height as i32);
    for y in 0..h {
        for x in 0..w {
            let at = |dx: i32, dy: i32| {
                src.pixel(
                    (x + dx).clamp(0, w - 1) as u32,
                    (y + dy).clamp(0, h - 1) as u32,
                )
            };
            let c = at(0, 0);
            let (l, r, u, d) = (at(-1, 0), at(1, 0), at(0, -1), at(0, 1));
            let mut out = c;
            for i in 0..3 {
                let lap = 4.0 * c[i] - l[i] - r[i] - u[i] - d[i];
                out[i] = c[i] + amount * lap;
            }
            dst.put_pixel(x as u32, y as u32, out);
        }
    }
    Ok(())
}

fn drop_shadow(
    src: &PixelBuf,
    dst: &mut PixelBuf,
    offset_x: f32,
    offset_y: f32,
    softness: f32,
    opacity: f32,
) -> PrismatteResult<()> {
    let (w, h) = (src.width as i32, src.height as i32);
    let n = (w * h) as usize;
    let ox = offset_x.round() as i32;
    let oy = offset_y.round() as i32;

    // Alpha plane shifted by the offset, outside reads transparent.
    let mut shadow = vec![0.0f32; n];
    for y in 0..h {
        for x in 0..w {
            let sx = x - ox;
            let sy = y - oy;
            if sx >= 0 && sx < w && sy >= 0 && sy < h {
                shadow[(y * w + x) as usize] = src.pixel(sx as u32, sy as u32)[3];
            }
        }
    }

    if softness > 0.0 {
        let k = gaussian_weights(softness);
        let half = (k.len() / 2) as i32;
        let mut tmp = vec![0.0f32; n];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = (x + ki as i32 - half).clamp(0, w - 1);
                    acc += kw * shadow[(y * w + sx) as usize];
                }
                tmp[(y * w + x) as usize] = acc;
            }
        }
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (ki, &kw) in k.iter().enumerate() {
                    let sy = (y + ki as i32 - half).clamp(0, h - 1);
                    acc += kw * tmp[(sy * w + x) as usize];
                }
                shadow[(y * w + x) as usize] = acc;
            }
        }
    }

    // Source over a black shadow layer, straight alpha.
    for y in 0..h {
        for x in 0..w {
            let px = src.pixel(x as u32, y as u32);
            let sa = shadow[(y * w + x) as usize] * opacity;
            let out_a = px[3] + sa * (1.0 - px[3]);
            let out = if out_a > 1e-6 {
                [
                    px[0] * px[3] / out_a,
                    px[1] * px[3] / out_a,
                    px[2] * px[3] / out_a,
                    out_a,
                ]
            } else {
                [0.0, 0.0, 0.0, 0.0]
            };
            dst.put_pixel(x as u32, y as u32, out);
        }
    }
    Ok(())
}
