//! Curve LUT builder: Fritsch-Carlson monotone cubic interpolation over
//! user-edited control points, packed into the lookup textures the color
//! grader's curves pass samples.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

pub const LUT_SIZE: usize = 256;

/// Registry key for the packed RGBA curve texture.
pub const CURVE_LUT_NAME: &str = "lumetri-curve";
/// Registry key for the 256x5 HSL offset strip.
pub const HSL_CURVE_LUT_NAME: &str = "lumetri-hsl-curve";

/// Dense LUT from bezier-curve control points, each `[x, y]` in [0,1]^2.
///
/// Fewer than two points degrade to the identity ramp. Input order does not
/// matter; points are sorted by x internally.
pub fn control_points_to_lut(points: &[[f64; 2]], size: usize) -> Vec<f64> {
    let size = size.max(2);
    if points.len() < 2 {
        return (0..size).map(|i| i as f64 / (size - 1) as f64).collect();
    }

    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a[0].total_cmp(&b[0]));
    let n = pts.len();

    // Secant slopes with a floored denominator so coincident x's stay finite.
    let mut delta = vec![0.0f64; n - 1];
    for i in 0..n - 1 {
        delta[i] = (pts[i + 1][1] - pts[i][1]) / (pts[i + 1][0] - pts[i][0]).max(1e-6);
    }

    let mut m = vec![0.0f64; n];
    m[0] = delta[0];
    m[n - 1] = delta[n - 2];
    for i in 1..n - 1 {
        m[i] = if delta[i - 1] * delta[i] <= 0.0 {
            0.0
        } else {
            (delta[i - 1] + delta[i]) * 0.5
        };
    }

    // Fritsch-Carlson monotonicity clamp.
    for i in 0..n - 1 {
        if delta[i].abs() < 1e-6 {
            m[i] = 0.0;
            m[i + 1] = 0.0;
        } else {
            let alpha = m[i] / delta[i];
            let beta = m[i + 1] / delta[i];
            let s = alpha * alpha + beta * beta;
            if s > 9.0 {
                let tau = 3.0 / s.sqrt();
                m[i] = tau * alpha * delta[i];
                m[i + 1] = tau * beta * delta[i];
            }
        }
    }

    let mut lut = Vec::with_capacity(size);
    for i in 0..size {
        let x = i as f64 / (size - 1) as f64;
        lut.push(sample_hermite(&pts, &m, x).clamp(0.0, 1.0));
    }
    lut
}

fn sample_hermite(pts: &[[f64; 2]], m: &[f64], x: f64) -> f64 {
    let n = pts.len();
    if x <= pts[0][0] {
        return pts[0][1];
    }
    if x >= pts[n - 1][0] {
        return pts[n - 1][1];
    }

    let mut seg = 0;
    for i in 0..n - 1 {
        if x < pts[i + 1][0] {
            seg = i;
            break;
        }
    }

    let h = (pts[seg + 1][0] - pts[seg][0]).max(1e-6);
    let t = (x - pts[seg][0]) / h;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * pts[seg][1] + h10 * h * m[seg] + h01 * pts[seg + 1][1] + h11 * h * m[seg + 1]
}

/// Pack master + per-channel curves into one 256x1 RGBA texture realizing
/// `out = per_channel(master(in))` in a single fetch. Alpha is 255, unused.
pub fn build_curve_lut_texture(
    master: &[[f64; 2]],
    red: &[[f64; 2]],
    green: &[[f64; 2]],
    blue: &[[f64; 2]],
) -> Vec<u8> {
    let master_lut = control_points_to_lut(master, LUT_SIZE);
    let red_lut = control_points_to_lut(red, LUT_SIZE);
    let green_lut = control_points_to_lut(green, LUT_SIZE);
    let blue_lut = control_points_to_lut(blue, LUT_SIZE);

    let mut out = Vec::with_capacity(LUT_SIZE * 4);
    for i in 0..LUT_SIZE {
        let m = (master_lut[i] * 255.0).round().clamp(0.0, 255.0) as usize;
        out.push((red_lut[m] * 255.0).round().clamp(0.0, 255.0) as u8);
        out.push((green_lut[m] * 255.0).round().clamp(0.0, 255.0) as u8);
        out.push((blue_lut[m] * 255.0).round().clamp(0.0, 255.0) as u8);
        out.push(255);
    }
    out
}

/// Row order of the HSL strip, top to bottom.
pub const HSL_ROWS: usize = 5;

/// Pack the five HSL curves into a 256x5 single-channel strip storing each
/// curve's offset from identity, biased so 128 means zero offset. Rows with at
/// most one control point are identity (all 128).
pub fn build_hsl_curve_lut(
    hue_vs_sat: &[[f64; 2]],
    hue_vs_hue: &[[f64; 2]],
    hue_vs_luma: &[[f64; 2]],
    luma_vs_sat: &[[f64; 2]],
    sat_vs_sat: &[[f64; 2]],
) -> Vec<u8> {
    let rows = [hue_vs_sat, hue_vs_hue, hue_vs_luma, luma_vs_sat, sat_vs_sat];
    let mut out = Vec::with_capacity(LUT_SIZE * HSL_ROWS);
    for row in rows {
        if row.len() <= 1 {
            out.extend(std::iter::repeat_n(128u8, LUT_SIZE));
            continue;
        }
        let lut = control_points_to_lut(row, LUT_SIZE);
        for (i, &v) in lut.iter().enumerate() {
            let identity = i as f64 / (LUT_SIZE - 1) as f64;
            let biased = ((v - identity + 0.5) * 255.0).clamp(0.0, 255.0);
            out.push(biased.round() as u8);
        }
    }
    out
}

/// Process-wide texture registry keyed by stable string names. Writes replace
/// entries atomically; a reader holding an `Arc` keeps the old texture alive,
/// never observes a torn one.
#[derive(Debug, Default)]
pub struct LutRegistry {
    map: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl LutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, bytes: Vec<u8>) {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.insert(name.into(), Arc::from(bytes.into_boxed_slice()));
    }

    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.remove(name).is_some()
    }
}
