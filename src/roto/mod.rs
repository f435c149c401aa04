//! Roto-brush alpha matting: sparse scribbles to a refined per-pixel matte.
//!
//! The pipeline is trimap construction, Mahalanobis color modeling, guided
//! filtering, and morphological post-processing, with per-instance caching
//! and cross-frame propagation.

pub mod color_model;
pub mod engine;
pub mod guided;
pub mod post;
pub mod trimap;

pub use engine::{RotoEngine, Segmenter, apply_output};
pub use guided::guided_filter;
