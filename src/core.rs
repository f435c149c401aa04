use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::error::{PrismatteError, PrismatteResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct FrameIndex(pub i64);

impl FrameIndex {
    pub fn offset(self, delta: i64) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> PrismatteResult<Self> {
        if start.0 > end.0 {
            return Err(PrismatteError::invalid("frame range", "start must be <= end"));
        }
        Ok(Self { start, end })
    }

    pub fn len_frames(self) -> i64 {
        (self.end.0 - self.start.0).max(0)
    }

    pub fn is_empty(self) -> bool {
        self.start.0 >= self.end.0
    }

    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    pub fn shift(self, delta: i64) -> Self {
        Self {
            start: FrameIndex(self.start.0.saturating_add(delta)),
            end: FrameIndex(self.end.0.saturating_add(delta)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> PrismatteResult<Self> {
        if num == 0 || den == 0 {
            return Err(PrismatteError::invalid("frame rate", "num and den must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frames_to_secs(self, frames: i64) -> f64 {
        (frames as f64) * f64::from(self.den) / f64::from(self.num)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn pixel_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

fn rgba_len(width: u32, height: u32) -> PrismatteResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| {
            PrismatteError::invalid("image dimensions", "width*height*4 overflows usize")
        })
}

/// 8-bit straight-alpha RGBA frame, row-major. The interchange format at the
/// frame-source and worker boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuf {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageBuf {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> PrismatteResult<Self> {
        let expected = rgba_len(width, height)?;
        if data.len() != expected {
            return Err(PrismatteError::BufferSize {
                buffer: "ImageBuf",
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Opaque black frame, the defined fallback for a missing source bitmap.
    pub fn black(width: u32, height: u32) -> Self {
        let n = (width as usize) * (height as usize);
        let mut data = vec![0u8; n * 4];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }
}

/// Float RGBA working buffer used between pipeline passes. Channels are
/// straight-alpha, nominally in [0,1] but unclamped mid-chain.
#[derive(Clone, Debug)]
pub struct PixelBuf {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl PixelBuf {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn from_image(img: &ImageBuf) -> Self {
        let data = img.data.iter().map(|&b| f32::from(b) / 255.0).collect();
        Self {
            width: img.width,
            height: img.height,
            data,
        }
    }

    pub fn to_image(&self) -> ImageBuf {
        let data = self
            .data
            .iter()
            .map(|&f| (f.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        ImageBuf {
            width: self.width,
            height: self.height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, px: [f32; 4]) {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }

    pub fn same_size_as(&self, other: &PixelBuf) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Single-channel f32 matte, row-major, values in [0,1]. The worker-boundary
/// output format of the roto engine.
#[derive(Clone, Debug, PartialEq)]
pub struct MatteBuf {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl MatteBuf {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; (width as usize) * (height as usize)],
        }
    }

    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> PrismatteResult<Self> {
        let expected = (width as usize).checked_mul(height as usize).ok_or_else(|| {
            PrismatteError::invalid("matte dimensions", "width*height overflows usize")
        })?;
        if data.len() != expected {
            return Err(PrismatteError::BufferSize {
                buffer: "MatteBuf",
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y as usize) * (self.width as usize) + (x as usize)]
    }

    pub fn set(&mut self, x: u32, y: u32, v: f32) {
        self.data[(y as usize) * (self.width as usize) + (x as usize)] = v;
    }
}

/// Cooperatively checked cancellation token shared with long-running jobs.
/// Checked at bounded frequency (per stage / per frame); on cancel, in-flight
/// work finalizes the current stage and returns without committing results.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
