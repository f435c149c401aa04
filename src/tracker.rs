//! Sequential mask-tracker feed.
//!
//! The tracking worker accepts exactly one frame at a time: the next frame is
//! submitted only after the reply for the previous one lands, and a
//! re-entrancy guard protects the decode-then-send step. Keyframe writes
//! arrive in frame order, so readers observe monotone progress.

use crate::{
    core::{CancelFlag, FrameIndex, ImageBuf},
    error::{PrismatteError, PrismatteResult},
    model::MaskPath,
};

/// The tracking collaborator: given a frame's pixels and the current path,
/// return the path for that frame (or `None` when tracking is lost).
pub trait MaskTracker {
    fn track(&mut self, frame: FrameIndex, image: &ImageBuf, path: &MaskPath)
    -> Option<MaskPath>;
}

/// Outcome of a tracking run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    Finished,
    Cancelled,
    /// Tracking lost at this frame; keyframes up to it were already written.
    Lost(FrameIndex),
}

/// Drives a tracker over a frame range, writing one path keyframe per frame
/// through `write_keyframe`. Strictly sequential: one frame in flight.
pub struct TrackerFeed {
    feeding: bool,
    cancel: CancelFlag,
}

impl TrackerFeed {
    pub fn new(cancel: CancelFlag) -> Self {
        Self {
            feeding: false,
            cancel,
        }
    }

    pub fn run(
        &mut self,
        tracker: &mut dyn MaskTracker,
        frames: impl Iterator<Item = (FrameIndex, ImageBuf)>,
        seed_path: MaskPath,
        mut write_keyframe: impl FnMut(FrameIndex, MaskPath),
    ) -> PrismatteResult<TrackOutcome> {
        if self.feeding {
            return Err(PrismatteError::TrackerBusy);
        }
        self.feeding = true;

        let mut current = seed_path;
        let mut outcome = TrackOutcome::Finished;
        for (frame, image) in frames {
            if self.cancel.is_cancelled() {
                outcome = TrackOutcome::Cancelled;
                break;
            }
            match tracker.track(frame, &image, &current) {
                Some(path) => {
                    write_keyframe(frame, path.clone());
                    current = path;
                }
                None => {
                    outcome = TrackOutcome::Lost(frame);
                    break;
                }
            }
        }

        self.feeding = false;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathPoint;

    fn path_at(x: f64) -> MaskPath {
        MaskPath {
            closed: true,
            points: vec![
                PathPoint {
                    x,
                    y: 0.2,
                    ..PathPoint::default()
                },
                PathPoint {
                    x: x + 0.1,
                    y: 0.2,
                    ..PathPoint::default()
                },
                PathPoint {
                    x,
                    y: 0.4,
                    ..PathPoint::default()
                },
            ],
        }
    }

    struct DriftTracker {
        lose_at: Option<i64>,
    }

    impl MaskTracker for DriftTracker {
        fn track(
            &mut self,
            frame: FrameIndex,
            _image: &ImageBuf,
            path: &MaskPath,
        ) -> Option<MaskPath> {
            if self.lose_at == Some(frame.0) {
                return None;
            }
            let mut out = path.clone();
            for p in &mut out.points {
                p.x += 0.01;
            }
            Some(out)
        }
    }

    fn frames(range: std::ops::Range<i64>) -> impl Iterator<Item = (FrameIndex, ImageBuf)> {
        range.map(|f| (FrameIndex(f), ImageBuf::black(4, 4)))
    }

    #[test]
    fn writes_keyframes_in_frame_order() {
        let mut feed = TrackerFeed::new(CancelFlag::new());
        let mut written = Vec::new();
        let outcome = feed
            .run(
                &mut DriftTracker { lose_at: None },
                frames(0..5),
                path_at(0.1),
                |f, _| written.push(f.0),
            )
            .unwrap();
        assert_eq!(outcome, TrackOutcome::Finished);
        assert_eq!(written, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn lost_tracking_keeps_earlier_keyframes() {
        let mut feed = TrackerFeed::new(CancelFlag::new());
        let mut written = Vec::new();
        let outcome = feed
            .run(
                &mut DriftTracker { lose_at: Some(3) },
                frames(0..6),
                path_at(0.1),
                |f, _| written.push(f.0),
            )
            .unwrap();
        assert_eq!(outcome, TrackOutcome::Lost(FrameIndex(3)));
        assert_eq!(written, vec![0, 1, 2]);
    }

    #[test]
    fn cancel_stops_before_next_frame() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut feed = TrackerFeed::new(cancel);
        let mut written = Vec::new();
        let outcome = feed
            .run(
                &mut DriftTracker { lose_at: None },
                frames(0..6),
                path_at(0.1),
                |f, _| written.push(f.0),
            )
            .unwrap();
        assert_eq!(outcome, TrackOutcome::Cancelled);
        assert!(written.is_empty());
    }
}
