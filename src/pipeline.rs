//! Per-frame render pipeline: pass scheduling over ping-pong targets, the
//! intrinsic final composite (motion, crop, opacity, masks), clip stacking,
//! and transitions. No error crosses a frame boundary; every failure path
//! degrades to a pass-through or black frame.

use std::collections::{HashMap, HashSet};

use kurbo::{Affine, Point};

use crate::{
    core::{CancelFlag, Canvas, FrameIndex, ImageBuf, PixelBuf},
    curve_lut::LutRegistry,
    frame_source::{FrameSource, missing_frame},
    mask::mask_coverage,
    model::{Clip, Project},
    params::{EffectParams, RotoParams},
    passes::{Pass, effect_config, input_linearize_pass},
    roto::{RotoEngine, Segmenter, apply_output},
    state::ProjectSettings,
    transitions::render_transition,
};

/// Everything a render needs beyond the timeline model itself. Parameter
/// resolution snapshots values at the start of the chain; nothing here is
/// mutated mid-frame.
pub struct RenderContext<'a> {
    pub settings: &'a ProjectSettings,
    pub luts: &'a LutRegistry,
    pub cancel: CancelFlag,
}

/// Owns the render-side state that outlives a single frame: per-instance roto
/// engines and the one-shot warning set.
#[derive(Default)]
pub struct Pipeline {
    roto: HashMap<String, RotoEngine>,
    warned: HashSet<(String, &'static str)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop per-instance state for effects that no longer exist.
    pub fn evict_instance(&mut self, instance_id: &str) {
        self.roto.remove(instance_id);
    }

    fn warn_once(&mut self, instance_id: &str, pass: &'static str, err: &crate::PrismatteError) {
        let key = (instance_id.to_string(), pass);
        if self.warned.insert(key) {
            tracing::warn!(instance_id, pass, %err, "pass disabled, image passes through");
        }
    }

    /// Render one clip at a timeline frame to a canvas-resolution image.
    #[tracing::instrument(skip_all, fields(clip = %clip.id, frame = frame.0))]
    pub fn render_clip_frame(
        &mut self,
        clip: &Clip,
        frame: FrameIndex,
        source: &mut dyn FrameSource,
        mut segmenter: Option<&mut (dyn Segmenter + '_)>,
        ctx: &RenderContext<'_>,
    ) -> ImageBuf {
        let canvas = ctx.settings.canvas;

        let src_frame = clip.source_frame_at(frame);
        let time = ctx.settings.frame_rate.frames_to_secs(src_frame.0);
        let Some(bitmap) = source.get_frame(&clip.media_id, time) else {
            tracing::warn!(clip = %clip.id, frame = frame.0, "missing source frame, using black");
            return missing_frame(canvas);
        };

        // The entry stage is the only point that may resample; every pass
        // after it sees canvas resolution.
        let mut current = resample_to(&bitmap, canvas);
        let mut scratch = PixelBuf::new(canvas.width, canvas.height);

        let linear = ctx.settings.linear_compositing;
        if let Some(pass) = input_linearize_pass(clip.input_curve, linear) {
            self.run_one(&clip.id, &pass, &mut current, &mut scratch);
        }

        for fx in clip.effects.iter().filter(|fx| fx.enabled) {
            let params = fx.params_at(frame);
            if let EffectParams::RotoBrush(_) | EffectParams::Motion { .. }
            | EffectParams::Opacity { .. } | EffectParams::TimeRemap { .. } = params.as_ref()
            {
                continue; // handled outside the pass chain
            }
            let Some(passes) = effect_config(params.as_ref(), ctx.luts) else {
                continue;
            };
            for pass in &passes {
                self.run_one(&fx.id, pass, &mut current, &mut scratch);
            }
        }

        if linear {
            self.run_one(&clip.id, &Pass::Delinearize, &mut current, &mut scratch);
        }

        let mut image = current.to_image();

        // Roto matting runs on the effect output, CPU-side.
        if let Some((fx_id, roto_params)) = roto_instance(clip, frame) {
            let engine = self.roto.entry(fx_id.clone()).or_default();
            match engine.matte_at(
                frame,
                &image,
                &roto_params,
                segmenter.as_deref_mut(),
                &ctx.cancel,
            ) {
                Ok(Some(matte)) => image = apply_output(&image, &matte, roto_params.output),
                Ok(None) => {}
                Err(err) => self.warn_once(&fx_id, "roto-brush", &err),
            }
        }

        self.final_composite(clip, frame, &image, canvas)
    }

    /// Intrinsic motion/crop/opacity plus mask coverage, into canvas space.
    fn final_composite(
        &mut self,
        clip: &Clip,
        frame: FrameIndex,
        image: &ImageBuf,
        canvas: Canvas,
    ) -> ImageBuf {
        let mut motion = Affine::IDENTITY;
        let mut crop = [0.0f64; 4];
        let mut opacity = 1.0f64;

        for fx in clip.effects.iter().filter(|fx| fx.enabled) {
            match fx.params_at(frame).as_ref() {
                EffectParams::Motion {
                    position,
                    scale,
                    rotation_deg,
                    anchor,
                    crop: c,
                } => {
                    motion = Affine::translate((position[0], position[1]))
                        * Affine::rotate(rotation_deg.to_radians())
                        * Affine::scale_non_uniform(scale[0] / 100.0, scale[1] / 100.0)
                        * Affine::translate((-anchor[0], -anchor[1]));
                    crop = *c;
                }
                EffectParams::Opacity { percent } => {
                    opacity *= (percent / 100.0).clamp(0.0, 1.0);
                }
                _ => {}
            }
        }

        let mask_cov = match mask_coverage(&clip.masks, frame, canvas) {
            Ok(cov) => cov,
            Err(err) => {
                self.warn_once(&clip.id, "mask", &err);
                None
            }
        };

        let inv = motion.inverse();
        let (sw, sh) = (f64::from(image.width), f64::from(image.height));
        let x_min = sw * crop[0].clamp(0.0, 1.0);
        let x_max = sw * (1.0 - crop[1].clamp(0.0, 1.0));
        let y_min = sh * crop[2].clamp(0.0, 1.0);
        let y_max = sh * (1.0 - crop[3].clamp(0.0, 1.0));

        let mut out = ImageBuf::transparent(canvas.width, canvas.height);
        for y in 0..canvas.height {
            for x in 0..canvas.width {
                let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if p.x < x_min || p.x >= x_max || p.y < y_min || p.y >= y_max {
                    continue;
                }
                let mut px = sample_bilinear(image, p.x, p.y);
                let mut a = px[3] * opacity as f32;
                if let Some(cov) = &mask_cov {
                    a *= cov.get(x, y);
                }
                px[3] = a;
                out.put_pixel(
                    x,
                    y,
                    [
                        (px[0] * 255.0).round().clamp(0.0, 255.0) as u8,
                        (px[1] * 255.0).round().clamp(0.0, 255.0) as u8,
                        (px[2] * 255.0).round().clamp(0.0, 255.0) as u8,
                        (px[3] * 255.0).round().clamp(0.0, 255.0) as u8,
                    ],
                );
            }
        }
        out
    }

    fn run_one(
        &mut self,
        instance_id: &str,
        pass: &Pass,
        current: &mut PixelBuf,
        scratch: &mut PixelBuf,
    ) {
        match crate::fx_cpu::run_pass(pass, current, scratch) {
            Ok(()) => std::mem::swap(current, scratch),
            Err(err) => self.warn_once(instance_id, pass.name(), &err),
        }
    }

    /// Render the full timeline frame: every active clip in list order,
    /// transition pairs blended, everything stacked over opaque black.
    #[tracing::instrument(skip_all, fields(frame = frame.0))]
    pub fn render_frame(
        &mut self,
        project: &Project,
        frame: FrameIndex,
        source: &mut dyn FrameSource,
        mut segmenter: Option<&mut (dyn Segmenter + '_)>,
        ctx: &RenderContext<'_>,
    ) -> ImageBuf {
        let canvas = ctx.settings.canvas;
        let mut out = ImageBuf::black(canvas.width, canvas.height);

        // Transitions claim their clip pair for the frames they are active.
        let mut claimed: HashMap<&str, usize> = HashMap::new();
        let mut blended: Vec<Option<ImageBuf>> = Vec::new();
        for tr in &project.transitions {
            let Some(progress) = tr.progress(frame) else {
                continue;
            };
            let (Some(out_clip), Some(in_clip)) =
                (project.clip(&tr.out_clip_id), project.clip(&tr.in_clip_id))
            else {
                continue;
            };
            let a = self.render_clip_frame(out_clip, frame, source, segmenter.as_deref_mut(), ctx);
            let b = self.render_clip_frame(in_clip, frame, source, segmenter.as_deref_mut(), ctx);
            let idx = blended.len();
            match render_transition(&tr.kind, &a, &b, progress as f32) {
                Ok(frame_img) => blended.push(Some(frame_img)),
                Err(err) => {
                    self.warn_once(&tr.id, "transition", &err);
                    blended.push(Some(a));
                }
            }
            claimed.insert(tr.out_clip_id.as_str(), idx);
            claimed.insert(tr.in_clip_id.as_str(), idx);
        }

        for clip in &project.clips {
            if let Some(&idx) = claimed.get(clip.id.as_str()) {
                if let Some(img) = blended[idx].take() {
                    over_in_place(&mut out, &img);
                }
                continue;
            }
            if !clip.timeline_range().contains(frame) {
                continue;
            }
            let img = self.render_clip_frame(clip, frame, source, segmenter.as_deref_mut(), ctx);
            over_in_place(&mut out, &img);
        }
        out
    }

    /// Convenience wrapper rendering `[start, end)` in timeline order.
    pub fn render_frames(
        &mut self,
        project: &Project,
        start: FrameIndex,
        end: FrameIndex,
        source: &mut dyn FrameSource,
        ctx: &RenderContext<'_>,
    ) -> Vec<ImageBuf> {
        let mut frames = Vec::new();
        for f in start.0..end.0 {
            if ctx.cancel.is_cancelled() {
                break;
            }
            frames.push(self.render_frame(project, FrameIndex(f), source, None, ctx));
        }
        frames
    }
}

fn roto_instance(clip: &Clip, frame: FrameIndex) -> Option<(String, RotoParams)> {
    clip.effects
        .iter()
        .filter(|fx| fx.enabled)
        .find_map(|fx| match fx.params_at(frame).as_ref() {
            EffectParams::RotoBrush(p) => Some((fx.id.clone(), (**p).clone())),
            _ => None,
        })
}

/// Resample a source bitmap to canvas resolution (bilinear); a same-size
/// source converts without resampling.
fn resample_to(img: &ImageBuf, canvas: Canvas) -> PixelBuf {
    if img.width == canvas.width && img.height == canvas.height {
        return PixelBuf::from_image(img);
    }
    let mut out = PixelBuf::new(canvas.width, canvas.height);
    let sx = f64::from(img.width) / f64::from(canvas.width);
    let sy = f64::from(img.height) / f64::from(canvas.height);
    for y in 0..canvas.height {
        for x in 0..canvas.width {
            let px = sample_bilinear(
                img,
                (f64::from(x) + 0.5) * sx,
                (f64::from(y) + 0.5) * sy,
            );
            out.put_pixel(x, y, px);
        }
    }
    out
}

/// Bilinear sample at a pixel-space point, edge-clamped, in [0,1] channels.
fn sample_bilinear(img: &ImageBuf, x: f64, y: f64) -> [f32; 4] {
    let fx = (x - 0.5).max(0.0);
    let fy = (y - 0.5).max(0.0);
    let x0 = (fx as u32).min(img.width - 1);
    let y0 = (fy as u32).min(img.height - 1);
    let x1 = (x0 + 1).min(img.width - 1);
    let y1 = (y0 + 1).min(img.height - 1);
    let tx = (fx - f64::from(x0)) as f32;
    let ty = (fy - f64::from(y0)) as f32;

    let p00 = img.pixel(x0, y0);
    let p10 = img.pixel(x1, y0);
    let p01 = img.pixel(x0, y1);
    let p11 = img.pixel(x1, y1);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = f32::from(p00[c]) * (1.0 - tx) + f32::from(p10[c]) * tx;
        let bot = f32::from(p01[c]) * (1.0 - tx) + f32::from(p11[c]) * tx;
        out[c] = (top * (1.0 - ty) + bot * ty) / 255.0;
    }
    out
}

/// Straight-alpha source-over, in place.
fn over_in_place(dst: &mut ImageBuf, src: &ImageBuf) {
    for (d, s) in dst.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
        let sa = f32::from(s[3]) / 255.0;
        if sa <= 0.0 {
            continue;
        }
        let da = f32::from(d[3]) / 255.0;
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 0.0 {
            continue;
        }
        for c in 0..3 {
            let sc = f32::from(s[c]);
            let dc = f32::from(d[c]);
            d[c] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round() as u8;
        }
        d[3] = (out_a * 255.0).round() as u8;
    }
}
