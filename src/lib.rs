#![forbid(unsafe_code)]

mod color;
mod core;
mod curve_lut;
mod error;
mod frame_source;
mod fx_cpu;
mod grade;
mod keyframe;
mod mask;
mod math;
mod model;
mod params;
mod passes;
mod pipeline;
mod roto;
mod state;
mod tracker;
mod transitions;

pub use color::{
    ColorSpace, ColorSpaceTag, ExportColorSpace, ToneMapOperator, TransferCurve,
    export_color_space, export_encoder_flags, map_video_frame_color_space,
};
pub use core::{CancelFlag, Canvas, Fps, FrameIndex, FrameRange, ImageBuf, MatteBuf, PixelBuf};
pub use curve_lut::{
    CURVE_LUT_NAME, HSL_CURVE_LUT_NAME, LUT_SIZE, LutRegistry, build_curve_lut_texture,
    build_hsl_curve_lut, control_points_to_lut,
};
pub use error::{PrismatteError, PrismatteResult};
pub use frame_source::{FrameSource, SolidSource, missing_frame};
pub use keyframe::{Easing, Keyframe, KeyframeTrack, ParamValue};
pub use mask::{mask_coverage, rasterize_mask_path};
pub use model::{
    Clip, Mask, MaskMode, MaskParam, MaskPath, PathPoint, Project, RotoStroke, StrokeKind,
};
pub use params::{
    EffectInstance, EffectParams, LumetriBasic, LumetriCreative, LumetriParams, LumetriSecondary,
    LumetriVignette, LumetriWheels, ParamId, RotoOutputMode, RotoParams,
};
pub use passes::{Pass, effect_config, input_linearize_pass};
pub use pipeline::{Pipeline, RenderContext};
pub use roto::{RotoEngine, Segmenter, apply_output, guided_filter};
pub use state::{BusEvent, ChangeKind, ColorPreset, EventBus, ProjectSettings, StateStore, Topic};
pub use tracker::{MaskTracker, TrackOutcome, TrackerFeed};
pub use transitions::{Transition, TransitionAlign, TransitionKind, WipeDir, render_transition};
