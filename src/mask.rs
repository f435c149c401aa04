//! Mask rasterization: interpolated bezier paths in normalized coordinates,
//! scaled to the canvas, with feather/expansion/opacity and the four combine
//! modes folded into one coverage buffer.

use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

use crate::{
    core::{Canvas, FrameIndex, MatteBuf},
    error::{PrismatteError, PrismatteResult},
    model::{Mask, MaskMode, MaskPath},
    roto::post,
};

/// Rasterize one path at canvas resolution into a coverage buffer in [0,1].
pub fn rasterize_mask_path(path: &MaskPath, canvas: Canvas) -> PrismatteResult<MatteBuf> {
    path.validate()?;
    let mut pixmap = Pixmap::new(canvas.width, canvas.height)
        .ok_or(PrismatteError::EmptyTarget {
            stage: "mask raster",
        })?;

    let w = f64::from(canvas.width);
    let h = f64::from(canvas.height);
    let at = |x: f64, y: f64| ((x * w) as f32, (y * h) as f32);

    let pts = &path.points;
    let mut pb = PathBuilder::new();
    let (x0, y0) = at(pts[0].x, pts[0].y);
    pb.move_to(x0, y0);
    let n = pts.len();
    let seg_count = if path.closed { n } else { n - 1 };
    for s in 0..seg_count {
        let a = &pts[s];
        let b = &pts[(s + 1) % n];
        let (c1x, c1y) = at(a.x + a.out_x, a.y + a.out_y);
        let (c2x, c2y) = at(b.x + b.in_x, b.y + b.in_y);
        let (bx, by) = at(b.x, b.y);
        pb.cubic_to(c1x, c1y, c2x, c2y, bx, by);
    }
    if path.closed {
        pb.close();
    }
    let Some(sk_path) = pb.finish() else {
        return Ok(MatteBuf::new(canvas.width, canvas.height));
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = true;
    pixmap.fill_path(&sk_path, &paint, FillRule::Winding, Transform::identity(), None);

    let mut out = MatteBuf::new(canvas.width, canvas.height);
    for (v, px) in out.data.iter_mut().zip(pixmap.data().chunks_exact(4)) {
        *v = f32::from(px[3]) / 255.0;
    }
    Ok(out)
}

fn combine(mode: MaskMode, c: f32, m: f32) -> f32 {
    match mode {
        MaskMode::Add => (c + m).min(1.0),
        MaskMode::Subtract => c * (1.0 - m),
        MaskMode::Intersect => c * m,
        MaskMode::Difference => c + m - 2.0 * c * m,
    }
}

/// Fold every enabled mask at `frame` into one coverage buffer. Returns
/// `None` when no mask participates, meaning the clip's alpha is untouched.
pub fn mask_coverage(
    masks: &[Mask],
    frame: FrameIndex,
    canvas: Canvas,
) -> PrismatteResult<Option<MatteBuf>> {
    let enabled: Vec<&Mask> = masks.iter().filter(|m| m.enabled).collect();
    if enabled.is_empty() {
        return Ok(None);
    }

    let mut coverage = MatteBuf::new(canvas.width, canvas.height);
    for mask in enabled {
        let path = mask.path_at(frame);
        let mut layer = rasterize_mask_path(&path, canvas)?;

        let expansion = mask.expansion_at(frame).round() as i32;
        if expansion != 0 {
            layer = post::shift_edge(&layer, expansion);
        }
        let feather = mask.feather_at(frame);
        if feather > 0.0 {
            layer = post::apply_feather(&layer, feather);
        }
        let opacity = (mask.opacity_at(frame) / 100.0).clamp(0.0, 1.0) as f32;

        for v in &mut layer.data {
            let mut m = *v;
            if mask.inverted {
                m = 1.0 - m;
            }
            *v = m * opacity;
        }

        for (c, &m) in coverage.data.iter_mut().zip(layer.data.iter()) {
            *c = combine(mask.mode, *c, m);
        }
    }
    Ok(Some(coverage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::{
        keyframe::KeyframeTrack,
        model::PathPoint,
    };

    fn rect_path(x0: f64, y0: f64, x1: f64, y1: f64) -> MaskPath {
        let corner = |x, y| PathPoint {
            x,
            y,
            ..PathPoint::default()
        };
        MaskPath {
            closed: true,
            points: vec![
                corner(x0, y0),
                corner(x1, y0),
                corner(x1, y1),
                corner(x0, y1),
            ],
        }
    }

    fn mask(mode: MaskMode, path: MaskPath) -> Mask {
        Mask {
            id: "m0".into(),
            mode,
            inverted: false,
            enabled: true,
            feather: 0.0,
            opacity: 100.0,
            expansion: 0.0,
            keyframes: BTreeMap::new(),
            path,
            path_keyframes: KeyframeTrack::new(),
        }
    }

    const CANVAS: Canvas = Canvas {
        width: 20,
        height: 20,
    };

    #[test]
    fn rect_covers_inside_not_outside() {
        let m = rasterize_mask_path(&rect_path(0.25, 0.25, 0.75, 0.75), CANVAS).unwrap();
        assert!(m.get(10, 10) > 0.99);
        assert!(m.get(1, 1) < 0.01);
    }

    #[test]
    fn disabled_masks_yield_none() {
        let mut mk = mask(MaskMode::Add, rect_path(0.0, 0.0, 1.0, 1.0));
        mk.enabled = false;
        assert!(
            mask_coverage(&[mk], FrameIndex(0), CANVAS)
                .unwrap()
                .is_none()
        );
        assert!(mask_coverage(&[], FrameIndex(0), CANVAS).unwrap().is_none());
    }

    #[test]
    fn subtract_cuts_hole() {
        let base = mask(MaskMode::Add, rect_path(0.0, 0.0, 1.0, 1.0));
        let hole = mask(MaskMode::Subtract, rect_path(0.4, 0.4, 0.6, 0.6));
        let cov = mask_coverage(&[base, hole], FrameIndex(0), CANVAS)
            .unwrap()
            .unwrap();
        assert!(cov.get(10, 10) < 0.01);
        assert!(cov.get(2, 2) > 0.99);
    }

    #[test]
    fn intersect_keeps_overlap_only() {
        let a = mask(MaskMode::Add, rect_path(0.0, 0.0, 0.6, 1.0));
        let b = mask(MaskMode::Intersect, rect_path(0.4, 0.0, 1.0, 1.0));
        let cov = mask_coverage(&[a, b], FrameIndex(0), CANVAS)
            .unwrap()
            .unwrap();
        assert!(cov.get(10, 10) > 0.99); // x=0.5, inside both
        assert!(cov.get(2, 10) < 0.01); // only in the first
        assert!(cov.get(18, 10) < 0.01); // only in the second
    }

    #[test]
    fn inverted_mask_flips_coverage() {
        let mut mk = mask(MaskMode::Add, rect_path(0.25, 0.25, 0.75, 0.75));
        mk.inverted = true;
        let cov = mask_coverage(&[mk], FrameIndex(0), CANVAS)
            .unwrap()
            .unwrap();
        assert!(cov.get(10, 10) < 0.01);
        assert!(cov.get(1, 1) > 0.99);
    }

    #[test]
    fn expansion_grows_coverage() {
        let mut mk = mask(MaskMode::Add, rect_path(0.3, 0.3, 0.6, 0.6));
        mk.expansion = 3.0;
        let grown = mask_coverage(&[mk.clone()], FrameIndex(0), CANVAS)
            .unwrap()
            .unwrap();
        mk.expansion = 0.0;
        let base = mask_coverage(&[mk], FrameIndex(0), CANVAS)
            .unwrap()
            .unwrap();
        assert!(base.get(4, 10) < 0.1);
        assert!(grown.get(4, 10) > 0.9);
    }

    #[test]
    fn opacity_scales_coverage() {
        let mut mk = mask(MaskMode::Add, rect_path(0.0, 0.0, 1.0, 1.0));
        mk.opacity = 40.0;
        let cov = mask_coverage(&[mk], FrameIndex(0), CANVAS)
            .unwrap()
            .unwrap();
        assert!((cov.get(10, 10) - 0.4).abs() < 0.01);
    }
}
