//! Local (adaptive) thresholding of grayscale frames.

use gazecal_core::{GrayImage, GrayImageView};
use serde::{Deserialize, Serialize};

/// How the local mean is weighted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveMethod {
    /// Plain box average over the block.
    Mean,
    /// Gaussian-weighted average, sigma derived from the block size.
    Gaussian,
}

/// Adaptive threshold settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    pub method: AdaptiveMethod,
    /// Odd neighbourhood size in pixels (even values are bumped up by one).
    pub block_size: usize,
    /// Constant subtracted from the local mean.
    pub offset: f32,
    /// Foreground is `src - mean <= -offset` instead of `src - mean > -offset`.
    pub invert: bool,
}

impl AdaptiveThreshold {
    fn block(&self) -> usize {
        let b = self.block_size.max(3);
        if b % 2 == 0 {
            b + 1
        } else {
            b
        }
    }

    /// Binarize `img`: 1 = foreground, 0 = background.
    pub fn apply(&self, img: &GrayImageView<'_>) -> BinaryImage {
        let block = self.block();
        let kernel = match self.method {
            AdaptiveMethod::Mean => vec![1.0 / block as f32; block],
            AdaptiveMethod::Gaussian => gaussian_kernel(block),
        };
        let mean = separable_filter(img, &kernel);

        let mut data = vec![0u8; img.width * img.height];
        for (idx, out) in data.iter_mut().enumerate() {
            let diff = img.data[idx] as f32 - mean[idx].round().clamp(0.0, 255.0);
            let fg = if self.invert {
                diff <= -self.offset
            } else {
                diff > -self.offset
            };
            *out = fg as u8;
        }

        BinaryImage {
            width: img.width,
            height: img.height,
            data,
        }
    }
}

/// 0/1 image produced by thresholding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl BinaryImage {
    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// 3x3 box blur with a replicated border.
pub fn box_blur3(img: &GrayImageView<'_>) -> GrayImage {
    let kernel = [1.0 / 3.0; 3];
    let smoothed = separable_filter(img, &kernel);
    GrayImage {
        width: img.width,
        height: img.height,
        data: smoothed
            .into_iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect(),
    }
}

/// Gaussian weights for an odd kernel size, sigma = 0.3*((k-1)/2 - 1) + 0.8.
pub(crate) fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let c = (size / 2) as f32;
    let mut k: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - c;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = k.iter().sum();
    for w in &mut k {
        *w /= sum;
    }
    k
}

/// Horizontal then vertical pass of a symmetric 1D kernel, replicated border.
fn separable_filter(img: &GrayImageView<'_>, kernel: &[f32]) -> Vec<f32> {
    let (w, h) = (img.width, img.height);
    let r = (kernel.len() / 2) as i32;

    let mut horiz = vec![0f32; w * h];
    for y in 0..h {
        let row = &img.data[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &wk) in kernel.iter().enumerate() {
                let xx = (x as i32 + k as i32 - r).clamp(0, w as i32 - 1) as usize;
                acc += wk * row[xx] as f32;
            }
            horiz[y * w + x] = acc;
        }
    }

    let mut out = vec![0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &wk) in kernel.iter().enumerate() {
                let yy = (y as i32 + k as i32 - r).clamp(0, h as i32 - 1) as usize;
                acc += wk * horiz[yy * w + x];
            }
            out[y * w + x] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_image() -> GrayImage {
        // left half dark, right half bright
        let mut img = GrayImage::filled(20, 10, 20);
        for y in 0..10 {
            for x in 10..20 {
                img.set(x, y, 220);
            }
        }
        img
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(25);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((k[0] - k[24]).abs() < 1e-7);
        assert!(k[12] > k[11]);
    }

    #[test]
    fn flat_regions_are_foreground_for_both_polarities() {
        let img = GrayImage::filled(16, 16, 90);
        let bin = AdaptiveThreshold {
            method: AdaptiveMethod::Mean,
            block_size: 5,
            offset: 11.0,
            invert: false,
        }
        .apply(&img.view());
        assert_eq!(bin.count_set(), 16 * 16);

        let inv = AdaptiveThreshold {
            method: AdaptiveMethod::Gaussian,
            block_size: 25,
            offset: -5.0,
            invert: true,
        }
        .apply(&img.view());
        assert_eq!(inv.count_set(), 16 * 16);
    }

    #[test]
    fn binary_mode_clears_dark_side_of_edges() {
        let img = step_image();
        let bin = AdaptiveThreshold {
            method: AdaptiveMethod::Mean,
            block_size: 5,
            offset: 11.0,
            invert: false,
        }
        .apply(&img.view());
        // dark pixel next to the edge falls below the local mean
        assert!(!bin.is_set(9, 5));
        assert!(bin.is_set(10, 5));
        assert!(bin.is_set(2, 5));
    }

    #[test]
    fn inverted_mode_clears_bright_side_of_edges() {
        let img = step_image();
        let bin = AdaptiveThreshold {
            method: AdaptiveMethod::Gaussian,
            block_size: 7,
            offset: -5.0,
            invert: true,
        }
        .apply(&img.view());
        assert!(!bin.is_set(10, 5));
        assert!(bin.is_set(9, 5));
        assert!(bin.is_set(19, 5));
    }

    #[test]
    fn box_blur_keeps_flat_image() {
        let img = GrayImage::filled(6, 6, 77);
        let blurred = box_blur3(&img.view());
        assert!(blurred.data.iter().all(|&v| v == 77));
    }
}
