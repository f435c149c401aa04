//! Matte post-processing: connected-component clean-up, morphology, choke,
//! edge shift, contrast, and feather. Stages run in this exact order in the
//! engine.

use crate::core::MatteBuf;

/// Binarization threshold for the component clean-up.
pub const ISLAND_ALPHA_THRESHOLD: f32 = 0.3;
/// Components smaller than this fraction of the frame are zeroed.
pub const ISLAND_MIN_FRACTION: f32 = 0.005;

/// Keep only the largest 4-connected component of `matte > threshold`; zero
/// pixels of every other component, and of any component smaller than
/// `min_fraction` of the frame (the largest included).
pub fn remove_small_islands(matte: &mut MatteBuf, threshold: f32, min_fraction: f32) {
    let (w, h) = (matte.width as i32, matte.height as i32);
    let n = (w * h) as usize;
    if n == 0 {
        return;
    }

    let binary: Vec<bool> = matte.data.iter().map(|&a| a > threshold).collect();
    let mut label = vec![0u32; n]; // 0 = unlabeled
    let mut sizes = vec![0usize; 1];
    let mut next = 1u32;
    let mut stack = Vec::new();

    for start in 0..n {
        if !binary[start] || label[start] != 0 {
            continue;
        }
        let id = next;
        next += 1;
        sizes.push(0);
        stack.push(start);
        label[start] = id;
        while let Some(i) = stack.pop() {
            sizes[id as usize] += 1;
            let x = (i as i32) % w;
            let y = (i as i32) / w;
            for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
                if nx < 0 || nx >= w || ny < 0 || ny >= h {
                    continue;
                }
                let j = (ny * w + nx) as usize;
                if binary[j] && label[j] == 0 {
                    label[j] = id;
                    stack.push(j);
                }
            }
        }
    }

    let largest = (1..next as usize).max_by_key(|&id| sizes[id]).unwrap_or(0);
    let min_size = (min_fraction * n as f32).ceil() as usize;

    for i in 0..n {
        let id = label[i] as usize;
        if id == 0 {
            continue;
        }
        if id != largest || sizes[id] < min_size {
            matte.data[i] = 0.0;
        }
    }
}

fn minmax_filter(matte: &MatteBuf, radius: i32, take_max: bool) -> MatteBuf {
    let (w, h) = (matte.width as i32, matte.height as i32);
    let mut out = matte.clone();
    if radius <= 0 {
        return out;
    }
    // Separable: square window min/max decomposes into two axis passes.
    let mut tmp = matte.clone();
    for y in 0..h {
        for x in 0..w {
            let mut best = matte.get(x as u32, y as u32);
            for dx in -radius..=radius {
                let sx = (x + dx).clamp(0, w - 1);
                let v = matte.get(sx as u32, y as u32);
                best = if take_max { best.max(v) } else { best.min(v) };
            }
            tmp.set(x as u32, y as u32, best);
        }
    }
    for y in 0..h {
        for x in 0..w {
            let mut best = tmp.get(x as u32, y as u32);
            for dy in -radius..=radius {
                let sy = (y + dy).clamp(0, h - 1);
                let v = tmp.get(x as u32, sy as u32);
                best = if take_max { best.max(v) } else { best.min(v) };
            }
            out.set(x as u32, y as u32, best);
        }
    }
    out
}

/// Morphological open (erode then dilate) with a square element.
pub fn morph_open(matte: &MatteBuf, radius: i32) -> MatteBuf {
    let eroded = minmax_filter(matte, radius, false);
    minmax_filter(&eroded, radius, true)
}

/// Add `choke / 100` to every pixel and clamp to [0,1].
pub fn apply_choke(matte: &mut MatteBuf, choke: f64) {
    let delta = (choke / 100.0).clamp(-1.0, 1.0) as f32;
    if delta == 0.0 {
        return;
    }
    for v in &mut matte.data {
        *v = (*v + delta).clamp(0.0, 1.0);
    }
}

/// Positive amounts dilate the matte (pixel-accurate max filter), negative
/// amounts erode it.
pub fn shift_edge(matte: &MatteBuf, amount: i32) -> MatteBuf {
    if amount == 0 {
        return matte.clone();
    }
    minmax_filter(matte, amount.abs(), amount > 0)
}

/// Sigmoid edge contrast, steepness `1 + contrast * 0.19`; skipped at zero.
pub fn apply_contrast(matte: &mut MatteBuf, contrast: f64) {
    if contrast <= 0.0 {
        return;
    }
    let k = (1.0 + contrast * 0.19) as f32;
    for v in &mut matte.data {
        *v = 1.0 / (1.0 + (-k * (*v - 0.5)).exp());
    }
}

/// Gaussian feather with `sigma = max(0.5, feather)`; a zero feather skips.
pub fn apply_feather(matte: &MatteBuf, feather: f64) -> MatteBuf {
    if feather <= 0.0 {
        return matte.clone();
    }
    let sigma = feather.max(0.5) as f32;
    let half = (sigma * 3.0).ceil() as i32;
    let mut k: Vec<f32> = (-half..=half)
        .map(|i| (-0.5 * (i as f32 / sigma).powi(2)).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }

    let (w, h) = (matte.width as i32, matte.height as i32);
    let mut tmp = MatteBuf::new(matte.width, matte.height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - half).clamp(0, w - 1);
                acc += kw * matte.get(sx as u32, y as u32);
            }
            tmp.set(x as u32, y as u32, acc);
        }
    }
    let mut out = MatteBuf::new(matte.width, matte.height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - half).clamp(0, h - 1);
                acc += kw * tmp.get(x as u32, sy as u32);
            }
            out.set(x as u32, y as u32, acc.clamp(0.0, 1.0));
        }
    }
    out
}
