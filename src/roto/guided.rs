//! Guided-filter matte refinement: a local linear model of the matte against
//! a grayscale guidance image, solved with integral-image box sums in O(N).

use crate::core::MatteBuf;

struct Integral {
    w: usize,
    h: usize,
    // (w+1) x (h+1) prefix sums.
    data: Vec<f64>,
}

impl Integral {
    fn build(src: &[f32], w: usize, h: usize) -> Self {
        let mut data = vec![0.0f64; (w + 1) * (h + 1)];
        for y in 0..h {
            let mut row = 0.0f64;
            for x in 0..w {
                row += f64::from(src[y * w + x]);
                data[(y + 1) * (w + 1) + (x + 1)] = data[y * (w + 1) + (x + 1)] + row;
            }
        }
        Self { w, h, data }
    }

    fn build_product(a: &[f32], b: &[f32], w: usize, h: usize) -> Self {
        let prod: Vec<f32> = a.iter().zip(b.iter()).map(|(x, y)| x * y).collect();
        Self::build(&prod, w, h)
    }

    /// Sum over the clamped window centered at (x, y) with radius `r`, plus
    /// the number of pixels in it.
    fn window(&self, x: usize, y: usize, r: usize) -> (f64, f64) {
        let x0 = x.saturating_sub(r);
        let y0 = y.saturating_sub(r);
        let x1 = (x + r).min(self.w - 1);
        let y1 = (y + r).min(self.h - 1);
        let s = self.data[(y1 + 1) * (self.w + 1) + (x1 + 1)]
            - self.data[y0 * (self.w + 1) + (x1 + 1)]
            - self.data[(y1 + 1) * (self.w + 1) + x0]
            + self.data[y0 * (self.w + 1) + x0];
        let count = ((x1 - x0 + 1) * (y1 - y0 + 1)) as f64;
        (s, count)
    }
}

fn box_mean(src: &[f32], w: usize, h: usize, r: usize) -> Vec<f32> {
    let integral = Integral::build(src, w, h);
    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let (s, n) = integral.window(x, y, r);
            out[y * w + x] = (s / n) as f32;
        }
    }
    out
}

/// Edge-preserving refinement of `matte` against the guidance image. Radius 0
/// is the identity; a huge `eps` converges to the windowed mean of the matte.
pub fn guided_filter(matte: &MatteBuf, guide: &MatteBuf, radius: u32, eps: f64) -> MatteBuf {
    if radius == 0 || matte.width != guide.width || matte.height != guide.height {
        return matte.clone();
    }
    let (w, h) = (matte.width as usize, matte.height as usize);
    let r = radius as usize;

    let int_i = Integral::build(&guide.data, w, h);
    let int_p = Integral::build(&matte.data, w, h);
    let int_ii = Integral::build_product(&guide.data, &guide.data, w, h);
    let int_ip = Integral::build_product(&guide.data, &matte.data, w, h);

    let mut a = vec![0.0f32; w * h];
    let mut b = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let (si, n) = int_i.window(x, y, r);
            let (sp, _) = int_p.window(x, y, r);
            let (sii, _) = int_ii.window(x, y, r);
            let (sip, _) = int_ip.window(x, y, r);

            let mean_i = si / n;
            let mean_p = sp / n;
            let var_i = (sii / n - mean_i * mean_i).max(0.0);
            let cov_ip = sip / n - mean_i * mean_p;

            let ak = cov_ip / (var_i + eps);
            a[y * w + x] = ak as f32;
            b[y * w + x] = (mean_p - ak * mean_i) as f32;
        }
    }

    // Smooth the model fields with the same box before evaluation.
    let mean_a = box_mean(&a, w, h, r);
    let mean_b = box_mean(&b, w, h, r);

    let mut out = MatteBuf::new(matte.width, matte.height);
    for i in 0..w * h {
        out.data[i] = (mean_a[i] * guide.data[i] + mean_b[i]).clamp(0.0, 1.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_matte(w: u32, h: u32) -> MatteBuf {
        let mut m = MatteBuf::new(w, h);
        for y in 0..h {
            for x in 0..w {
                m.set(x, y, if x < w / 2 { 0.0 } else { 1.0 });
            }
        }
        m
    }

    #[test]
    fn radius_zero_is_identity() {
        let m = step_matte(8, 8);
        let out = guided_filter(&m, &m, 0, 0.01);
        assert_eq!(out, m);
    }

    #[test]
    fn preserves_step_edge_with_matching_guide() {
        let m = step_matte(32, 32);
        let out = guided_filter(&m, &m, 4, 0.01);
        for y in 0..32 {
            for x in 0..32 {
                let expected = if x < 15 {
                    0.0
                } else if x > 16 {
                    1.0
                } else {
                    continue; // allow 1px of slack at the edge itself
                };
                let got = out.get(x, y);
                assert!(
                    (got - expected).abs() < 0.05,
                    "({x},{y}) expected {expected}, got {got}"
                );
            }
        }
    }

    #[test]
    fn huge_eps_converges_to_window_mean() {
        let m = step_matte(16, 16);
        let out = guided_filter(&m, &m, 3, 1e9);
        let mean = box_mean(&m.data, 16, 16, 3);
        // a ~ 0, so output ~ double-boxed mean of the matte; compare against a
        // second smoothing of the window mean.
        let mean2 = box_mean(&mean, 16, 16, 3);
        for i in 0..256 {
            assert!((out.data[i] - mean2[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn constant_matte_is_fixed_point() {
        let mut m = MatteBuf::new(10, 10);
        m.data.fill(0.6);
        let mut guide = MatteBuf::new(10, 10);
        for (i, v) in guide.data.iter_mut().enumerate() {
            *v = (i % 7) as f32 / 7.0;
        }
        let out = guided_filter(&m, &guide, 2, 0.01);
        for &v in &out.data {
            assert!((v - 0.6).abs() < 1e-4);
        }
    }
}
