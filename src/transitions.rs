//! Transitions between an outgoing and an incoming clip: timeline windowing
//! from alignment + offset, and the progress-driven frame blends.

use crate::{
    core::{FrameIndex, FrameRange, ImageBuf},
    error::{PrismatteError, PrismatteResult},
    math::mul_div255,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WipeDir {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransitionKind {
    CrossDissolve,
    DipToColor { color: [u8; 3] },
    Wipe { dir: WipeDir },
    Slide,
    Push,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionAlign {
    #[default]
    Center,
    Start,
    End,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Transition {
    pub id: String,
    pub kind: TransitionKind,
    pub duration_frames: i64,
    pub out_clip_id: String,
    pub in_clip_id: String,
    /// The cut point between the two clips on the timeline.
    pub edit_point: FrameIndex,
    pub align: TransitionAlign,
    #[serde(default)]
    pub offset: i64,
}

impl Transition {
    /// Active timeline range from alignment and offset. An invalid duration
    /// collapses to a 1-frame placeholder at the edit point.
    pub fn active_range(&self) -> FrameRange {
        let d = self.duration_frames;
        if d <= 0 {
            return FrameRange {
                start: self.edit_point,
                end: self.edit_point.offset(1),
            }
            .shift(self.offset);
        }
        let start = match self.align {
            TransitionAlign::Center => self.edit_point.0 - d / 2,
            TransitionAlign::Start => self.edit_point.0,
            TransitionAlign::End => self.edit_point.0 - d,
        };
        FrameRange {
            start: FrameIndex(start),
            end: FrameIndex(start + d),
        }
        .shift(self.offset)
    }

    /// Blend progress in [0,1] when `frame` lies inside the active range.
    pub fn progress(&self, frame: FrameIndex) -> Option<f64> {
        let range = self.active_range();
        if !range.contains(frame) {
            return None;
        }
        let span = range.len_frames().max(1) as f64;
        Some((frame.0 - range.start.0) as f64 / span)
    }

    pub fn validate(&self) -> PrismatteResult<()> {
        if self.id.trim().is_empty() {
            return Err(PrismatteError::invalid("transition", "id must be non-empty"));
        }
        if self.out_clip_id == self.in_clip_id {
            return Err(PrismatteError::invalid(
                format!("transition '{}'", self.id),
                "must join two distinct clips",
            ));
        }
        Ok(())
    }
}

fn crossfade_px(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let tt = ((t.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - tt;
    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = mul_div255(u16::from(a[i]), it);
        let bv = mul_div255(u16::from(b[i]), tt);
        out[i] = av.saturating_add(bv);
    }
    out
}

/// Composite `out_frame` and `in_frame` at `progress` in [0,1]. Both frames
/// must be at canvas resolution.
pub fn render_transition(
    kind: &TransitionKind,
    out_frame: &ImageBuf,
    in_frame: &ImageBuf,
    progress: f32,
) -> PrismatteResult<ImageBuf> {
    if out_frame.width != in_frame.width || out_frame.height != in_frame.height {
        return Err(PrismatteError::ResolutionMismatch {
            stage: "transition",
            width: out_frame.width,
            height: out_frame.height,
            got_width: in_frame.width,
            got_height: in_frame.height,
        });
    }
    let (w, h) = (out_frame.width, out_frame.height);
    let p = progress.clamp(0.0, 1.0);
    let mut out = ImageBuf::transparent(w, h);

    match kind {
        TransitionKind::CrossDissolve => {
            for y in 0..h {
                for x in 0..w {
                    out.put_pixel(x, y, crossfade_px(out_frame.pixel(x, y), in_frame.pixel(x, y), p));
                }
            }
        }
        TransitionKind::DipToColor { color } => {
            let solid = [color[0], color[1], color[2], 255];
            for y in 0..h {
                for x in 0..w {
                    // Fade to the solid until the midpoint, then from it.
                    let px = if p < 0.5 {
                        crossfade_px(out_frame.pixel(x, y), solid, p * 2.0)
                    } else {
                        crossfade_px(solid, in_frame.pixel(x, y), (p - 0.5) * 2.0)
                    };
                    out.put_pixel(x, y, px);
                }
            }
        }
        TransitionKind::Wipe { dir } => {
            for y in 0..h {
                for x in 0..w {
                    let reveal = match dir {
                        WipeDir::LeftToRight => (x as f32 + 0.5) / (w as f32) < p,
                        WipeDir::RightToLeft => (x as f32 + 0.5) / (w as f32) > 1.0 - p,
                        WipeDir::TopToBottom => (y as f32 + 0.5) / (h as f32) < p,
                        WipeDir::BottomToTop => (y as f32 + 0.5) / (h as f32) > 1.0 - p,
                    };
                    let px = if reveal {
                        in_frame.pixel(x, y)
                    } else {
                        out_frame.pixel(x, y)
                    };
                    out.put_pixel(x, y, px);
                }
            }
        }
        TransitionKind::Slide => {
            // Incoming enters from the right; outgoing stays put underneath.
            let shift = ((1.0 - p) * w as f32).round() as i64;
            for y in 0..h {
                for x in 0..w {
                    let sx = x as i64 - shift;
                    let px = if sx >= 0 {
                        in_frame.pixel(sx as u32, y)
                    } else {
                        out_frame.pixel(x, y)
                    };
                    out.put_pixel(x, y, px);
                }
            }
        }
        TransitionKind::Push => {
            // Both frames move together, the incoming pushing the outgoing out.
            let shift = (p * w as f32).round() as i64;
            for y in 0..h {
                for x in 0..w {
                    let ox = x as i64 + shift;
                    let px = if ox < i64::from(w) {
                        out_frame.pixel(ox as u32, y)
                    } else {
                        in_frame.pixel((ox - i64::from(w)) as u32, y)
                    };
                    out.put_pixel(x, y, px);
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tr(align: TransitionAlign, duration: i64, offset: i64) -> Transition {
        Transition {
            id: "t0".into(),
            kind: TransitionKind::CrossDissolve,
            duration_frames: duration,
            out_clip_id: "a".into(),
            in_clip_id: "b".into(),
            edit_point: FrameIndex(100),
            align,
            offset,
        }
    }

    #[test]
    fn alignment_windows() {
        assert_eq!(
            tr(TransitionAlign::Center, 10, 0).active_range(),
            FrameRange {
                start: FrameIndex(95),
                end: FrameIndex(105)
            }
        );
        assert_eq!(
            tr(TransitionAlign::Start, 10, 0).active_range(),
            FrameRange {
                start: FrameIndex(100),
                end: FrameIndex(110)
            }
        );
        assert_eq!(
            tr(TransitionAlign::End, 10, 0).active_range(),
            FrameRange {
                start: FrameIndex(90),
                end: FrameIndex(100)
            }
        );
        assert_eq!(
            tr(TransitionAlign::Start, 10, 3).active_range(),
            FrameRange {
                start: FrameIndex(103),
                end: FrameIndex(113)
            }
        );
    }

    #[test]
    fn invalid_duration_collapses_to_placeholder() {
        let r = tr(TransitionAlign::Center, 0, 0).active_range();
        assert_eq!(r.len_frames(), 1);
        assert_eq!(r.start, FrameIndex(100));
    }

    #[test]
    fn progress_spans_range() {
        let t = tr(TransitionAlign::Start, 10, 0);
        assert_eq!(t.progress(FrameIndex(99)), None);
        assert_eq!(t.progress(FrameIndex(100)), Some(0.0));
        assert_eq!(t.progress(FrameIndex(105)), Some(0.5));
        assert_eq!(t.progress(FrameIndex(110)), None);
    }

    fn px_frame(px: [u8; 4]) -> ImageBuf {
        let mut f = ImageBuf::transparent(1, 1);
        f.put_pixel(0, 0, px);
        f
    }

    #[test]
    fn cross_dissolve_midpoint() {
        let a = px_frame([255, 0, 0, 255]);
        let b = px_frame([0, 0, 255, 255]);
        let out = render_transition(&TransitionKind::CrossDissolve, &a, &b, 0.5).unwrap();
        let px = out.pixel(0, 0);
        assert!((i32::from(px[0]) - 127).abs() <= 1);
        assert_eq!(px[1], 0);
        assert!((i32::from(px[2]) - 127).abs() <= 1);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn dip_to_color_pivots_at_half() {
        let a = px_frame([255, 255, 255, 255]);
        let b = px_frame([0, 255, 0, 255]);
        let kind = TransitionKind::DipToColor { color: [0, 0, 0] };
        let mid = render_transition(&kind, &a, &b, 0.5).unwrap();
        assert_eq!(mid.pixel(0, 0), [0, 0, 0, 255]);
        let early = render_transition(&kind, &a, &b, 0.25).unwrap();
        assert!((i32::from(early.pixel(0, 0)[0]) - 127).abs() <= 1);
    }

    #[test]
    fn wipe_reveals_incoming() {
        let mut a = ImageBuf::transparent(4, 1);
        let mut b = ImageBuf::transparent(4, 1);
        for x in 0..4 {
            a.put_pixel(x, 0, [255, 0, 0, 255]);
            b.put_pixel(x, 0, [0, 255, 0, 255]);
        }
        let out =
            render_transition(&TransitionKind::Wipe { dir: WipeDir::LeftToRight }, &a, &b, 0.5)
                .unwrap();
        assert_eq!(out.pixel(0, 0), [0, 255, 0, 255]);
        assert_eq!(out.pixel(3, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn push_moves_both_frames() {
        let mut a = ImageBuf::transparent(4, 1);
        let mut b = ImageBuf::transparent(4, 1);
        for x in 0..4 {
            a.put_pixel(x, 0, [(x * 10) as u8, 0, 0, 255]);
            b.put_pixel(x, 0, [0, (x * 10) as u8, 0, 255]);
        }
        let out = render_transition(&TransitionKind::Push, &a, &b, 0.5).unwrap();
        // Left half shows the tail of the outgoing frame.
        assert_eq!(out.pixel(0, 0), [20, 0, 0, 255]);
        // Right half shows the head of the incoming frame.
        assert_eq!(out.pixel(2, 0), [0, 0, 0, 255]);
        assert_eq!(out.pixel(3, 0), [0, 10, 0, 255]);
    }

    #[test]
    fn slide_keeps_outgoing_static() {
        let mut a = ImageBuf::transparent(4, 1);
        let mut b = ImageBuf::transparent(4, 1);
        for x in 0..4 {
            a.put_pixel(x, 0, [(100 + x * 10) as u8, 0, 0, 255]);
            b.put_pixel(x, 0, [0, (100 + x * 10) as u8, 0, 255]);
        }
        let out = render_transition(&TransitionKind::Slide, &a, &b, 0.5).unwrap();
        // Outgoing pixels keep their own coordinates on the uncovered side.
        assert_eq!(out.pixel(0, 0), [100, 0, 0, 255]);
        assert_eq!(out.pixel(1, 0), [110, 0, 0, 255]);
        // Incoming slides in from the right edge.
        assert_eq!(out.pixel(2, 0), [0, 100, 0, 255]);
        assert_eq!(out.pixel(3, 0), [0, 110, 0, 255]);
    }
}
