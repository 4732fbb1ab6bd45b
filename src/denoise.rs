//! Per-pixel noise estimation for denoising hints.
//!
//! A local median error is extracted from the in-progress frame, spread
//! along similar surfaces of the G-buffer and finally aggregated per object
//! so whole objects request a consistent amount of filtering.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::color::Color;
use crate::float::*;
use crate::gbuffer::{gbuff_diff, GBufferPixel};
use crate::renderer::RenderError;

const SPREAD_WINDOW: i64 = 64;
const GAUSSIAN_SIGMA: Float = 1.0 / 50.0;
const NOISE_FLOOR: Float = 0.1;
const COVERAGE_SOLID: Float = 0.85;

fn median_of_max_in_window(
    data: &[Color],
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    window: i64,
) -> Float {
    let min_x = (x - window).max(0);
    let max_x = (x + window).min(width - 1);
    let min_y = (y - window).max(0);
    let max_y = (y + window).min(height - 1);

    let mut vals = Vec::with_capacity(((max_x - min_x + 1) * (max_y - min_y + 1)) as usize);
    for y1 in min_y..=max_y {
        let offset = y1 * width;
        for x1 in min_x..=max_x {
            vals.push(data[(offset + x1) as usize].max_comp());
        }
    }
    vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    vals[vals.len() / 2]
}

/// Estimate per-pixel noise as the deviation of each pixel from the local
/// median, normalized over the whole image.
pub fn extract_noise(data: &[Color], width: u32, height: u32, user_coeff: Float) -> Vec<Float> {
    let w = width as i64;
    let h = height as i64;
    let mut err = vec![0.0; data.len()];
    let mut max_val = 0.0 as Float;
    for y in 0..h {
        for x in 0..w {
            let this_val = data[(y * w + x) as usize].max_comp();
            let median = median_of_max_in_window(data, x, y, w, h, 3);
            let e = (this_val - median).abs();
            max_val = max_val.max(e);
            err[(y * w + x) as usize] = e;
        }
    }

    let mut sorted = err.clone();
    let mid = sorted.len() / 2;
    sorted.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap());
    let median = sorted[mid];

    let norm_const = if median + max_val > 0.0 {
        2.0 * user_coeff / (median + max_val)
    } else {
        0.0
    };
    for e in &mut err {
        *e *= norm_const;
    }
    err
}

/// Admission rule for a spread neighbor: it must be solid itself and either
/// lie on a similar surface or touch an unstable pixel directly.
fn admits(
    this_pixel: &GBufferPixel,
    other_pixel: &GBufferPixel,
    diff: Float,
    d: i64,
) -> bool {
    other_pixel.data1.coverage > COVERAGE_SOLID
        && (diff < 1.0 || (this_pixel.data1.coverage < COVERAGE_SOLID && d <= 1))
}

/// Edge preserving separable spread of the noise estimate along the G-buffer
pub fn spread_noise(
    gbuffer: &[GBufferPixel],
    noise: &mut [Float],
    width: u32,
    height: u32,
    fov: Float,
) {
    let w = width as i64;
    let h = height as i64;
    let fw = width.to_float();
    let fh = height.to_float();

    // Horizontal pass
    let mut temp = vec![0.0; noise.len()];
    for y in 0..h {
        for x in 0..w {
            let this_pixel = &gbuffer[(y * w + x) as usize];
            let min_x = (x - SPREAD_WINDOW).max(0);
            let max_x = (x + SPREAD_WINDOW).min(w - 1);

            let mut avg_val = 0.0;
            let mut max_val = 0.0 as Float;
            let mut weight_sum = 0.0;
            for x1 in min_x..=max_x {
                let other_pixel = &gbuffer[(y * w + x1) as usize];
                let diff = gbuff_diff(this_pixel, other_pixel, fov, fw, fh);
                let d = (x - x1).abs();
                let gauss_w = (-(d * d) as Float * GAUSSIAN_SIGMA).exp();
                if admits(this_pixel, other_pixel, diff, d) {
                    let val = noise[(y * w + x1) as usize] * gauss_w;
                    max_val = max_val.max(val);
                    avg_val += val;
                    weight_sum += gauss_w;
                }
            }
            temp[(y * w + x) as usize] = if weight_sum > 0.0 {
                0.5 * (avg_val / weight_sum + max_val)
            } else {
                noise[(y * w + x) as usize]
            };
        }
    }

    // Vertical pass
    for x in 0..w {
        for y in 0..h {
            let this_pixel = &gbuffer[(y * w + x) as usize];
            let min_y = (y - SPREAD_WINDOW).max(0);
            let max_y = (y + SPREAD_WINDOW).min(h - 1);

            let mut avg_val = 0.0;
            let mut max_val = 0.0 as Float;
            let mut weight_sum = 0.0;
            for y1 in min_y..=max_y {
                let other_pixel = &gbuffer[(y1 * w + x) as usize];
                let diff = gbuff_diff(this_pixel, other_pixel, fov, fw, fh);
                let d = (y - y1).abs();
                let gauss_w = (-(d * d) as Float * GAUSSIAN_SIGMA).exp();
                if admits(this_pixel, other_pixel, diff, d) {
                    let val = temp[(y1 * w + x) as usize] * gauss_w;
                    max_val = max_val.max(val);
                    avg_val += val;
                    weight_sum += gauss_w;
                }
            }
            noise[(y * w + x) as usize] = if weight_sum > 0.0 {
                0.5 * (avg_val / weight_sum + max_val)
            } else {
                temp[(y * w + x) as usize]
            };
        }
    }
}

fn object_class_id(px: &GBufferPixel) -> u64 {
    let mat_id = px.data1.mat_id as u32 as u64;
    let inst_id = px.data2.inst_id as u32 as u64;
    (mat_id << 32) | inst_id
}

struct ObjectInfo {
    avg_noise: Float,
    max_noise: Float,
    num_noise: usize,
}

/// Aggregate the noise per object class and paint it back, so every pixel
/// of a noisy object ends up with the same hint level.
pub fn spread_noise2(gbuffer: &[GBufferPixel], noise: &mut [Float]) {
    let mut objects: HashMap<u64, ObjectInfo> = HashMap::with_capacity(1000);

    // Collect per object info
    for (i, &level) in noise.iter().enumerate() {
        let px = &gbuffer[i];
        if level < NOISE_FLOOR || px.data1.coverage < COVERAGE_SOLID {
            continue;
        }
        let entry = objects.entry(object_class_id(px)).or_insert(ObjectInfo {
            avg_noise: 0.0,
            max_noise: 0.0,
            num_noise: 0,
        });
        entry.avg_noise += level;
        entry.num_noise += 1;
        entry.max_noise = entry.max_noise.max(level);
    }

    // Paint all pixels of each noisy object
    let mut max_val = 0.0 as Float;
    for (i, level) in noise.iter_mut().enumerate() {
        let px = &gbuffer[i];
        if let Some(info) = objects.get(&object_class_id(px)) {
            *level = 0.5 * (info.avg_noise / info.num_noise.to_float() + info.max_noise);
        }
        max_val = max_val.max(*level);
    }

    // Rescale; opaque pixels clamp into the active range,
    // transparent ones are not denoised at all
    let scale_inv = if max_val > 0.0 { 1.0 / max_val } else { 0.0 };
    for (i, level) in noise.iter_mut().enumerate() {
        let new_val = scale_inv * *level;
        let px = &gbuffer[i];
        if px.data1.rgba[3] <= 0.5 {
            *level = new_val.max(NOISE_FLOOR).min(1.0);
        } else {
            *level = 0.0;
        }
    }
}

/// Run the three hint passes over a developed frame
pub fn denoise_hints(
    data: &[Color],
    gbuffer: &[GBufferPixel],
    width: u32,
    height: u32,
    fov: Float,
) -> Vec<Float> {
    let mut noise = extract_noise(data, width, height, 1.0);
    spread_noise(gbuffer, &mut noise, width, height, fov);
    spread_noise2(gbuffer, &mut noise);
    noise
}

/// Save the hint channel as a 32 bit float hdr image
pub fn save_noise_hdr(
    noise: &[Float],
    width: u32,
    height: u32,
    path: &Path,
) -> Result<(), RenderError> {
    let mut data = Vec::with_capacity(noise.len());
    for y in (0..height).rev() {
        for x in 0..width {
            let v = noise[(y * width + x) as usize] as f32;
            data.push(image::Rgb([v, v, v]));
        }
    }
    let file = BufWriter::new(File::create(path)?);
    let encoder = image::hdr::HDREncoder::new(file);
    encoder.encode(&data, width as usize, height as usize)?;
    Ok(())
}
