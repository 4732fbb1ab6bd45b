use std::path::Path;

use crate::color::Color;
use crate::float::*;

use super::coordinator::Rect;
use super::RenderError;

/// Accumulation frame buffer.
///
/// Pixel samples accumulate into per-pixel means while splats from the light
/// tracing techniques accumulate additively and are normalized by the number
/// of sub-path passes when the frame is developed.
pub struct Frame {
    pub width: u32,
    pub height: u32,
    accum: Vec<Float>,
    n_samples: Vec<u32>,
    splat: Vec<Float>,
    /// Completed splat passes measured in sub-paths per pixel
    splat_norm: Float,
    /// Extra splat scale, the Metropolis normalization constant
    splat_scale: Float,
}

impl Frame {
    pub fn empty(width: u32, height: u32) -> Frame {
        let pixels = (width * height) as usize;
        Frame {
            width,
            height,
            accum: vec![0.0; 3 * pixels],
            n_samples: vec![0; pixels],
            splat: vec![0.0; 3 * pixels],
            splat_norm: 0.0,
            splat_scale: 1.0,
        }
    }

    /// Add one sample pass of a block
    pub fn add_block(&mut self, rect: Rect, block: &[Float]) {
        for h in 0..rect.height {
            for w in 0..rect.width {
                let i_image = ((h + rect.bottom) * self.width + w + rect.left) as usize;
                let i_block = (h * rect.width + w) as usize;
                self.n_samples[i_image] += 1;
                for c in 0..3 {
                    self.accum[3 * i_image + c] += block[3 * i_block + c];
                }
            }
        }
    }

    pub fn add_splat(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) as usize;
        self.splat[3 * i] += color.r();
        self.splat[3 * i + 1] += color.g();
        self.splat[3 * i + 2] += color.b();
    }

    pub fn set_splat_norm(&mut self, norm: Float) {
        self.splat_norm = norm;
    }

    pub fn set_splat_scale(&mut self, scale: Float) {
        self.splat_scale = scale;
    }

    /// Resolve the pixel at (x, y) to its current color estimate
    pub fn develop_pixel(&self, x: u32, y: u32) -> Color {
        let i = (y * self.width + x) as usize;
        let mut c = Color::black();
        if self.n_samples[i] > 0 {
            let inv = 1.0 / self.n_samples[i].to_float();
            c += inv * Color::new(self.accum[3 * i], self.accum[3 * i + 1], self.accum[3 * i + 2]);
        }
        if self.splat_norm > 0.0 {
            let inv = self.splat_scale / self.splat_norm;
            c += inv * Color::new(self.splat[3 * i], self.splat[3 * i + 1], self.splat[3 * i + 2]);
        }
        c
    }

    /// Resolve the whole frame, one color per pixel in row major order
    pub fn develop(&self) -> Vec<Color> {
        let mut out = Vec::with_capacity((self.width * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.develop_pixel(x, y));
            }
        }
        out
    }

    /// Save the tone mapped frame as a png.
    /// Image rows run top down while the frame is stored bottom up.
    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        let mut data = Vec::with_capacity((3 * self.width * self.height) as usize);
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let pixel = self.develop_pixel(x, y).to_srgb().to_pixel();
                data.extend_from_slice(&pixel.0);
            }
        }
        let image = image::RgbImage::from_raw(self.width, self.height, data)
            .expect("Frame dimensions do not match the pixel data");
        image.save(path)?;
        Ok(())
    }
}
