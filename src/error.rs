pub type PrismatteResult<T> = Result<T, PrismatteError>;

/// Failure surface of the core. Every variant corresponds to a concrete
/// failure site: model invariants, dangling timeline references, mismatched
/// render targets, malformed pixel buffers, raster targets with no area, and
/// the tracker feed's re-entrancy guard. Per-frame rendering never surfaces
/// these across a frame boundary; they degrade to pass-through or black
/// frames at the pipeline level.
#[derive(thiserror::Error, Debug)]
pub enum PrismatteError {
    /// A model object violates one of its documented invariants.
    #[error("invalid {subject}: {reason}")]
    Invalid { subject: String, reason: String },

    /// A timeline edit or transition referenced an id that does not exist.
    #[error("no {kind} '{id}'")]
    MissingRef { kind: &'static str, id: String },

    /// Two buffers that must share one resolution do not. `stage` names the
    /// pass or composite step that noticed.
    #[error("{stage}: targets are {got_width}x{got_height}, expected {width}x{height}")]
    ResolutionMismatch {
        stage: &'static str,
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// A pixel or matte buffer's data length disagrees with its dimensions.
    #[error("{buffer} data length {got} does not match {expected}")]
    BufferSize {
        buffer: &'static str,
        expected: usize,
        got: usize,
    },

    /// A raster target (mask or stroke pixmap) has zero area.
    #[error("{stage} target must be non-empty")]
    EmptyTarget { stage: &'static str },

    /// The tracker feed was re-entered while a run was still in flight.
    #[error("tracker feed is already running")]
    TrackerBusy,
}

impl PrismatteError {
    pub fn invalid(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}
