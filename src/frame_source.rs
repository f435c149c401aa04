//! The frame-source contract: the host's decoder hands the core immutable
//! bitmaps; a missing frame becomes a black frame at canvas resolution.

use crate::core::{Canvas, ImageBuf};

/// Supplies decoded source frames. Bitmaps are owned by the caller once
/// returned and are never mutated by the core.
pub trait FrameSource {
    fn get_frame(&mut self, media_id: &str, time_secs: f64) -> Option<ImageBuf>;
}

/// Fallback for a frame the source could not provide.
pub fn missing_frame(canvas: Canvas) -> ImageBuf {
    ImageBuf::black(canvas.width, canvas.height)
}

/// A source that always returns one solid color, for tests and previews.
pub struct SolidSource {
    pub width: u32,
    pub height: u32,
    pub rgba: [u8; 4],
}

impl FrameSource for SolidSource {
    fn get_frame(&mut self, _media_id: &str, _time_secs: f64) -> Option<ImageBuf> {
        let mut img = ImageBuf::transparent(self.width, self.height);
        for px in img.data.chunks_exact_mut(4) {
            px.copy_from_slice(&self.rgba);
        }
        Some(img)
    }
}
