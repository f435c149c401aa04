//! The roto matte engine: per-frame matte sourcing (segmenter, cache, strokes,
//! propagation), the full refinement pipeline, and the output composite modes.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    color::LUMA_709,
    core::{CancelFlag, FrameIndex, ImageBuf, MatteBuf},
    error::{PrismatteError, PrismatteResult},
    model::StrokeKind,
    params::{RotoOutputMode, RotoParams},
    roto::{
        color_model::estimate_alpha,
        guided::guided_filter,
        post,
        trimap::{rasterize_strokes, trimap_from_matte, trimap_from_strokes},
    },
};

/// External segmentation collaborator. When present it outranks every other
/// matte source.
pub trait Segmenter {
    /// Mask at exactly this frame, if the segmenter has one.
    fn mask_at(&mut self, frame: FrameIndex) -> Option<MatteBuf>;

    /// Nearest available mask within `max_distance` frames, for propagation
    /// mode. Default: probe outward from the requested frame.
    fn nearest_mask(
        &mut self,
        frame: FrameIndex,
        max_distance: i64,
    ) -> Option<(FrameIndex, MatteBuf)> {
        for d in 0..=max_distance {
            for f in [FrameIndex(frame.0 - d), FrameIndex(frame.0 + d)] {
                if let Some(m) = self.mask_at(f) {
                    return Some((f, m));
                }
            }
        }
        None
    }
}

/// How far the engine looks for a nearby segmentation mask in propagation
/// mode.
const SEGMENTER_SEARCH_FRAMES: i64 = 5;

fn luma_of(src: &ImageBuf) -> MatteBuf {
    let mut out = MatteBuf::new(src.width, src.height);
    for (v, px) in out.data.iter_mut().zip(src.data.chunks_exact(4)) {
        *v = (f32::from(px[0]) * LUMA_709[0]
            + f32::from(px[1]) * LUMA_709[1]
            + f32::from(px[2]) * LUMA_709[2])
            / 255.0;
    }
    out
}

fn strokes_fingerprint(params: &RotoParams) -> u64 {
    // FNV-1a 64 over the stroke geometry; any mutation invalidates the cache.
    let mut h = 0xcbf2_9ce4_8422_2325u64;
    let mut write = |bytes: &[u8]| {
        for &b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(0x0000_0100_0000_01B3);
        }
    };
    for s in &params.strokes {
        write(s.id.as_bytes());
        write(&s.frame.0.to_le_bytes());
        write(&[match s.kind {
            StrokeKind::Foreground => 1,
            StrokeKind::Background => 2,
        }]);
        write(&s.radius.to_le_bytes());
        for p in &s.points {
            write(&p[0].to_le_bytes());
            write(&p[1].to_le_bytes());
        }
    }
    h
}

/// Per-effect-instance matte cache and compute pipeline. Cache entries are
/// immutable once written; a stroke mutation clears the whole cache.
#[derive(Default)]
pub struct RotoEngine {
    cache: BTreeMap<i64, Arc<MatteBuf>>,
    fingerprint: u64,
}

impl RotoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn cached(&self, frame: FrameIndex) -> Option<Arc<MatteBuf>> {
        self.cache.get(&frame.0).cloned()
    }

    /// Produce the matte for `frame`, consulting sources in priority order:
    /// segmenter, cache, fresh strokes, propagation from an adjacent cached
    /// matte. Returns `Ok(None)` when no source applies (the effect is
    /// skipped) or when the job was cancelled before completion.
    #[tracing::instrument(skip_all, fields(frame = frame.0))]
    pub fn matte_at(
        &mut self,
        frame: FrameIndex,
        src: &ImageBuf,
        params: &RotoParams,
        mut segmenter: Option<&mut (dyn Segmenter + '_)>,
        cancel: &CancelFlag,
    ) -> PrismatteResult<Option<Arc<MatteBuf>>> {
        let fp = strokes_fingerprint(params);
        if fp != self.fingerprint {
            self.invalidate();
            self.fingerprint = fp;
        }

        if let Some(seg) = segmenter.as_deref_mut() {
            let external = seg.mask_at(frame).or_else(|| {
                params
                    .propagation
                    .then(|| {
                        seg.nearest_mask(frame, SEGMENTER_SEARCH_FRAMES)
                            .map(|(_, m)| m)
                    })
                    .flatten()
            });
            if let Some(m) = external {
                if m.width != src.width || m.height != src.height {
                    return Err(PrismatteError::ResolutionMismatch {
                        stage: "segmentation mask",
                        width: src.width,
                        height: src.height,
                        got_width: m.width,
                        got_height: m.height,
                    });
                }
                return Ok(Some(self.commit(frame, m)));
            }
        }

        if let Some(hit) = self.cached(frame) {
            return Ok(Some(hit));
        }

        let has_strokes_here = params.strokes.iter().any(|s| s.frame == frame);
        let trimap = if has_strokes_here {
            let on_frame: Vec<_> = params
                .strokes
                .iter()
                .filter(|s| s.frame == frame)
                .cloned()
                .collect();
            let fg = rasterize_strokes(&on_frame, StrokeKind::Foreground, src.width, src.height)?;
            let bg = rasterize_strokes(&on_frame, StrokeKind::Background, src.width, src.height)?;
            if fg.iter().all(|&b| !b) {
                return Ok(None); // no foreground scribble, nothing to matte
            }
            trimap_from_strokes(&fg, &bg, src.width, src.height, params.refine_radius)
        } else if params.propagation {
            let adjacent = self
                .cached(FrameIndex(frame.0 - 1))
                .or_else(|| self.cached(FrameIndex(frame.0 + 1)));
            let Some(prev) = adjacent else {
                return Ok(None);
            };
            trimap_from_matte(&prev, params.refine_radius)
        } else {
            return Ok(None);
        };

        let Some(matte) = self.compute(src, &trimap, params, cancel)? else {
            return Ok(None); // cancelled; nothing committed
        };
        Ok(Some(self.commit(frame, matte)))
    }

    /// The refinement pipeline, with a cancellation check between stages.
    fn compute(
        &self,
        src: &ImageBuf,
        trimap: &[u8],
        params: &RotoParams,
        cancel: &CancelFlag,
    ) -> PrismatteResult<Option<MatteBuf>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let matte = estimate_alpha(src, trimap);

        if cancel.is_cancelled() {
            return Ok(None);
        }
        let guide = luma_of(src);
        let radius = (params.refine_radius / 2).max(1);
        let mut matte = guided_filter(&matte, &guide, radius, 0.01);

        if cancel.is_cancelled() {
            return Ok(None);
        }
        post::remove_small_islands(
            &mut matte,
            post::ISLAND_ALPHA_THRESHOLD,
            post::ISLAND_MIN_FRACTION,
        );

        if cancel.is_cancelled() {
            return Ok(None);
        }
        let mut matte = post::morph_open(&matte, 1);
        post::apply_choke(&mut matte, params.choke);
        let mut matte = post::shift_edge(&matte, params.shift_edge);
        post::apply_contrast(&mut matte, params.contrast);

        if cancel.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(post::apply_feather(&matte, params.feather)))
    }

    /// Idempotent cache write: the first matte committed at a frame wins.
    fn commit(&mut self, frame: FrameIndex, matte: MatteBuf) -> Arc<MatteBuf> {
        self.cache
            .entry(frame.0)
            .or_insert_with(|| Arc::new(matte))
            .clone()
    }
}

/// Combine the matte with the source according to the output mode.
pub fn apply_output(src: &ImageBuf, matte: &MatteBuf, mode: RotoOutputMode) -> ImageBuf {
    let (w, h) = (src.width, src.height);
    let mut out = src.clone();

    match mode {
        RotoOutputMode::Composite => {
            // Source-in: only pixels under the matte survive.
            for (px, &m) in out.data.chunks_exact_mut(4).zip(matte.data.iter()) {
                px[3] = (f32::from(px[3]) * m).round() as u8;
            }
        }
        RotoOutputMode::Alpha => {
            for (px, &m) in out.data.chunks_exact_mut(4).zip(matte.data.iter()) {
                for c in px.iter_mut() {
                    *c = (f32::from(*c) * m).round() as u8;
                }
            }
        }
        RotoOutputMode::Matte => {
            for (px, &m) in out.data.chunks_exact_mut(4).zip(matte.data.iter()) {
                let g = (m * 255.0).round() as u8;
                px.copy_from_slice(&[g, g, g, 255]);
            }
        }
        RotoOutputMode::Boundary => {
            // Green contour where the alpha gradient is strong inside the
            // transition band.
            for y in 0..h as i32 {
                for x in 0..w as i32 {
                    let at = |xx: i32, yy: i32| {
                        matte.get(
                            xx.clamp(0, w as i32 - 1) as u32,
                            yy.clamp(0, h as i32 - 1) as u32,
                        )
                    };
                    let m = at(x, y);
                    let gx = (at(x + 1, y) - at(x - 1, y)) * 0.5;
                    let gy = (at(x, y + 1) - at(x, y - 1)) * 0.5;
                    let grad = (gx * gx + gy * gy).sqrt();
                    if grad > 0.2 && (0.3..=0.7).contains(&m) {
                        out.put_pixel(x as u32, y as u32, [0, 255, 0, 255]);
                    }
                }
            }
        }
        RotoOutputMode::Overlay => {
            for (px, &m) in out.data.chunks_exact_mut(4).zip(matte.data.iter()) {
                let bg = 1.0 - m;
                px[0] = (f32::from(px[0]) + (255.0 - f32::from(px[0])) * bg * 0.5).round() as u8;
                px[1] = (f32::from(px[1]) * (1.0 - bg * 0.5)).round() as u8;
                px[2] = (f32::from(px[2]) * (1.0 - bg * 0.5)).round() as u8;
            }
        }
    }
    out
}
