//! Stroke rasterization and trimap construction.
//!
//! A trimap is a three-valued per-pixel classification: definite foreground
//! (255), definite background (0), unknown (128). It seeds the color-model
//! alpha estimate.

use tiny_skia::{LineCap, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::{
    core::MatteBuf,
    error::{PrismatteError, PrismatteResult},
    model::{RotoStroke, StrokeKind},
};

pub const TRIMAP_FG: u8 = 255;
pub const TRIMAP_BG: u8 = 0;
pub const TRIMAP_UNKNOWN: u8 = 128;

/// Offsets of the Euclidean disc of radius `r`, origin included.
pub(crate) fn disc_offsets(r: i32) -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    let r2 = r * r;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r2 {
                out.push((dx, dy));
            }
        }
    }
    out
}

/// Draw the strokes of one polarity as round-capped polylines of width
/// `2 * radius`, then threshold coverage at 128 into a binary mask.
pub fn rasterize_strokes(
    strokes: &[RotoStroke],
    kind: StrokeKind,
    width: u32,
    height: u32,
) -> PrismatteResult<Vec<bool>> {
    let mut pixmap = Pixmap::new(width, height)
        .ok_or(PrismatteError::EmptyTarget {
            stage: "stroke raster",
        })?;

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = true;

    for stroke in strokes.iter().filter(|s| s.kind == kind) {
        let to_px = |p: [f64; 2]| {
            (
                (p[0] * f64::from(width)) as f32,
                (p[1] * f64::from(height)) as f32,
            )
        };

        let path = if stroke.points.len() == 1 {
            let (x, y) = to_px(stroke.points[0]);
            PathBuilder::from_circle(x, y, stroke.radius.max(0.5) as f32)
        } else {
            let mut pb = PathBuilder::new();
            let (x0, y0) = to_px(stroke.points[0]);
            pb.move_to(x0, y0);
            for &p in &stroke.points[1..] {
                let (x, y) = to_px(p);
                pb.line_to(x, y);
            }
            pb.finish()
        };
        let Some(path) = path else { continue };

        if stroke.points.len() == 1 {
            pixmap.fill_path(
                &path,
                &paint,
                tiny_skia::FillRule::Winding,
                Transform::identity(),
                None,
            );
        } else {
            let sk_stroke = Stroke {
                width: (stroke.radius * 2.0).max(1.0) as f32,
                line_cap: LineCap::Round,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &sk_stroke, Transform::identity(), None);
        }
    }

    Ok(pixmap
        .data()
        .chunks_exact(4)
        .map(|px| px[3] >= 128)
        .collect())
}

/// Trimap from scribbles: definite FG wins, then definite BG, then a
/// `refine_radius` Euclidean dilation of the FG marks the unknown band.
pub fn trimap_from_strokes(
    fg: &[bool],
    bg: &[bool],
    width: u32,
    height: u32,
    refine_radius: u32,
) -> Vec<u8> {
    let (w, h) = (width as i32, height as i32);
    let n = (w * h) as usize;
    debug_assert_eq!(fg.len(), n);
    debug_assert_eq!(bg.len(), n);

    let mut dilated = vec![false; n];
    let offsets = disc_offsets(refine_radius as i32);
    for y in 0..h {
        for x in 0..w {
            if !fg[(y * w + x) as usize] {
                continue;
            }
            for &(dx, dy) in &offsets {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && nx < w && ny >= 0 && ny < h {
                    dilated[(ny * w + nx) as usize] = true;
                }
            }
        }
    }

    (0..n)
        .map(|i| {
            if fg[i] {
                TRIMAP_FG
            } else if bg[i] {
                TRIMAP_BG
            } else if dilated[i] {
                TRIMAP_UNKNOWN
            } else {
                TRIMAP_BG
            }
        })
        .collect()
}

/// Trimap seeded from a cached matte on an adjacent frame: confident alpha
/// becomes definite FG/BG, and a `refine_radius` band around edge pixels is
/// reopened as unknown.
pub fn trimap_from_matte(matte: &MatteBuf, refine_radius: u32) -> Vec<u8> {
    let (w, h) = (matte.width as i32, matte.height as i32);
    let n = (w * h) as usize;

    let mut trimap = vec![TRIMAP_BG; n];
    let mut edge = vec![false; n];
    for (i, &a) in matte.data.iter().enumerate() {
        if a > 0.9 {
            trimap[i] = TRIMAP_FG;
        } else if a < 0.1 {
            trimap[i] = TRIMAP_BG;
        } else {
            edge[i] = true;
        }
    }

    let offsets = disc_offsets(refine_radius as i32);
    for y in 0..h {
        for x in 0..w {
            if !edge[(y * w + x) as usize] {
                continue;
            }
            for &(dx, dy) in &offsets {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && nx < w && ny >= 0 && ny < h {
                    trimap[(ny * w + nx) as usize] = TRIMAP_UNKNOWN;
                }
            }
        }
    }
    trimap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameIndex;

    fn dot_stroke(x: f64, y: f64, radius: f64, kind: StrokeKind) -> RotoStroke {
        RotoStroke {
            id: "s0".into(),
            frame: FrameIndex(0),
            kind,
            points: vec![[x, y]],
            radius,
        }
    }

    #[test]
    fn single_dot_trimap_shape() {
        // 10x10 grid, one FG dot at pixel (5,5), radius 1, refine radius 2.
        let strokes = vec![dot_stroke(0.55, 0.55, 1.0, StrokeKind::Foreground)];
        let fg = rasterize_strokes(&strokes, StrokeKind::Foreground, 10, 10).unwrap();
        let bg = rasterize_strokes(&strokes, StrokeKind::Background, 10, 10).unwrap();
        assert!(fg[5 * 10 + 5]);
        assert!(bg.iter().all(|&b| !b));

        let trimap = trimap_from_strokes(&fg, &bg, 10, 10, 2);
        assert_eq!(trimap[5 * 10 + 5], TRIMAP_FG);
        assert_eq!(trimap[7 * 10 + 5], TRIMAP_UNKNOWN);
        assert_eq!(trimap[0], TRIMAP_BG);

        // The unknown band is the 2px Euclidean disc around every FG pixel,
        // minus the FG pixels themselves.
        let offsets = disc_offsets(2);
        let mut expected = vec![false; 100];
        for y in 0..10i32 {
            for x in 0..10i32 {
                if !fg[(y * 10 + x) as usize] {
                    continue;
                }
                for &(dx, dy) in &offsets {
                    let (nx, ny) = (x + dx, y + dy);
                    if (0..10).contains(&nx) && (0..10).contains(&ny) {
                        expected[(ny * 10 + nx) as usize] = true;
                    }
                }
            }
        }
        let expected_unknown = expected
            .iter()
            .enumerate()
            .filter(|&(i, &e)| e && !fg[i])
            .count();
        let unknown = trimap.iter().filter(|&&t| t == TRIMAP_UNKNOWN).count();
        assert_eq!(unknown, expected_unknown);
    }

    #[test]
    fn bg_strokes_pin_background() {
        let strokes = vec![
            dot_stroke(0.5, 0.5, 1.0, StrokeKind::Foreground),
            dot_stroke(0.55, 0.5, 1.5, StrokeKind::Background),
        ];
        let fg = rasterize_strokes(&strokes, StrokeKind::Foreground, 20, 20).unwrap();
        let bg = rasterize_strokes(&strokes, StrokeKind::Background, 20, 20).unwrap();
        let trimap = trimap_from_strokes(&fg, &bg, 20, 20, 3);

        // FG beats BG where both drew; elsewhere BG wins over the dilation.
        for i in 0..400 {
            if fg[i] {
                assert_eq!(trimap[i], TRIMAP_FG);
            } else if bg[i] {
                assert_eq!(trimap[i], TRIMAP_BG);
            }
        }
    }

    #[test]
    fn matte_seeded_trimap_reopens_edges() {
        // Left half 0, right half 1, one soft column between.
        let mut matte = MatteBuf::new(8, 4);
        for y in 0..4 {
            for x in 0..8 {
                let v = if x < 3 {
                    0.0
                } else if x == 3 {
                    0.5
                } else {
                    1.0
                };
                matte.set(x, y, v);
            }
        }
        let trimap = trimap_from_matte(&matte, 1);
        assert_eq!(trimap[0], TRIMAP_BG);
        assert_eq!(trimap[7], TRIMAP_FG);
        // The soft column and its 1px band are unknown.
        assert_eq!(trimap[3], TRIMAP_UNKNOWN);
        assert_eq!(trimap[2], TRIMAP_UNKNOWN);
        assert_eq!(trimap[4], TRIMAP_UNKNOWN);
    }

    #[test]
    fn polyline_stroke_covers_segment() {
        let stroke = RotoStroke {
            id: "s0".into(),
            frame: FrameIndex(0),
            kind: StrokeKind::Foreground,
            points: vec![[0.1, 0.5], [0.9, 0.5]],
            radius: 2.0,
        };
        let fg = rasterize_strokes(&[stroke], StrokeKind::Foreground, 20, 10).unwrap();
        assert!(fg[5 * 20 + 10]);
        assert!(!fg[0]);
    }
}
