//! Mahalanobis color models for alpha estimation.
//!
//! Definite foreground/background pixels near the unknown band are fitted
//! with a mean + regularized covariance each; unknown pixels get an alpha
//! from the ratio of their distances to the two models.

use crate::{
    core::{ImageBuf, MatteBuf},
    math::Mat3,
    roto::trimap::{TRIMAP_FG, TRIMAP_UNKNOWN, disc_offsets},
};

/// Samples closer than this to the unknown band feed the models.
const SAMPLE_BAND_PX: i32 = 2;
/// Fewer samples than this cannot support a covariance fit.
const MIN_SAMPLES: usize = 4;

pub struct ColorModel {
    mean: [f64; 3],
    inv_cov: Mat3,
}

impl ColorModel {
    /// Mean and 3x3 covariance with `+1` added on the diagonal, inverted.
    /// Returns `None` for under-sampled or degenerate sets (|det| < 1e-12).
    pub fn fit(samples: &[[f64; 3]]) -> Option<Self> {
        if samples.len() < MIN_SAMPLES {
            return None;
        }
        let n = samples.len() as f64;
        let mut mean = [0.0f64; 3];
        for s in samples {
            for c in 0..3 {
                mean[c] += s[c];
            }
        }
        for c in &mut mean {
            *c /= n;
        }

        let mut cov = [0.0f64; 9];
        for s in samples {
            let d = [s[0] - mean[0], s[1] - mean[1], s[2] - mean[2]];
            for r in 0..3 {
                for c in 0..3 {
                    cov[r * 3 + c] += d[r] * d[c];
                }
            }
        }
        for v in &mut cov {
            *v /= n;
        }
        for c in 0..3 {
            cov[c * 3 + c] += 1.0;
        }

        let inv_cov = Mat3(cov).invert()?;
        Some(Self { mean, inv_cov })
    }

    pub fn mahalanobis(&self, color: [f64; 3]) -> f64 {
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let md = self.inv_cov.mul_vec3(d);
        (d[0] * md[0] + d[1] * md[1] + d[2] * md[2]).max(0.0).sqrt()
    }
}

fn pixel_rgb(src: &ImageBuf, i: usize) -> [f64; 3] {
    [
        f64::from(src.data[i * 4]),
        f64::from(src.data[i * 4 + 1]),
        f64::from(src.data[i * 4 + 2]),
    ]
}

/// Collect model samples: definite pixels of the wanted class lying within
/// `SAMPLE_BAND_PX` of any unknown pixel.
fn collect_samples(src: &ImageBuf, trimap: &[u8], class: u8) -> Vec<[f64; 3]> {
    let (w, h) = (src.width as i32, src.height as i32);
    let n = (w * h) as usize;

    let mut near_unknown = vec![false; n];
    let offsets = disc_offsets(SAMPLE_BAND_PX);
    for y in 0..h {
        for x in 0..w {
            if trimap[(y * w + x) as usize] != TRIMAP_UNKNOWN {
                continue;
            }
            for &(dx, dy) in &offsets {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && nx < w && ny >= 0 && ny < h {
                    near_unknown[(ny * w + nx) as usize] = true;
                }
            }
        }
    }

    (0..n)
        .filter(|&i| trimap[i] == class && near_unknown[i])
        .map(|i| pixel_rgb(src, i))
        .collect()
}

/// Alpha for every pixel: known pixels take their trimap value, unknown ones
/// the Mahalanobis distance ratio `d_bg / (d_fg + d_bg)`. A degenerate model
/// or vanishing denominator yields 0.5.
pub fn estimate_alpha(src: &ImageBuf, trimap: &[u8]) -> MatteBuf {
    let mut matte = MatteBuf::new(src.width, src.height);

    let fg_model = ColorModel::fit(&collect_samples(src, trimap, TRIMAP_FG));
    let bg_model = ColorModel::fit(&collect_samples(
        src,
        trimap,
        crate::roto::trimap::TRIMAP_BG,
    ));

    for (i, out) in matte.data.iter_mut().enumerate() {
        *out = match trimap[i] {
            TRIMAP_FG => 1.0,
            TRIMAP_UNKNOWN => match (&fg_model, &bg_model) {
                (Some(fg), Some(bg)) => {
                    let c = pixel_rgb(src, i);
                    let d_fg = fg.mahalanobis(c);
                    let d_bg = bg.mahalanobis(c);
                    let denom = d_fg + d_bg;
                    if denom < 1e-6 {
                        0.5
                    } else {
                        (d_bg / denom).clamp(0.0, 1.0) as f32
                    }
                }
                _ => 0.5,
            },
            _ => 0.0,
        };
    }
    matte
}
