//! Iterative sub-pixel corner refinement.
//!
//! Every gradient inside a window around a true corner is orthogonal to the
//! vector from the corner to the gradient's location. Solving the weighted
//! least-squares system for that condition and re-centering the window until
//! it stops moving gives the corner to a fraction of a pixel.

use gazecal_core::{sample_bilinear_clamped, GrayImageView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubPixCriteria {
    /// Half window size; the window spans `2 * half_window + 1` pixels.
    pub half_window: i32,
    pub max_iter: usize,
    /// Stop once a step moves the corner by less than this (pixels).
    pub epsilon: f32,
}

impl Default for SubPixCriteria {
    fn default() -> Self {
        Self {
            half_window: 3,
            max_iter: 100,
            epsilon: 0.001,
        }
    }
}

/// Refine `corners` in place.
///
/// A corner that would leave its search window reverts to its input
/// position; a corner sitting in a textureless patch stays where it is.
pub fn refine_corners_subpix(
    img: &GrayImageView<'_>,
    corners: &mut [Point2<f32>],
    criteria: &SubPixCriteria,
) {
    let hw = criteria.half_window.max(1);
    let side = (2 * hw + 1) as usize;

    let mut mask = vec![0f32; side * side];
    for i in 0..side {
        let y = (i as f32 - hw as f32) / hw as f32;
        for j in 0..side {
            let x = (j as f32 - hw as f32) / hw as f32;
            mask[i * side + j] = (-(x * x + y * y)).exp();
        }
    }

    let eps2 = criteria.epsilon * criteria.epsilon;
    let (w, h) = (img.width as f32, img.height as f32);

    for corner in corners.iter_mut() {
        let start = *corner;
        let mut current = start;

        for _ in 0..criteria.max_iter.max(1) {
            let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
            let (mut bb1, mut bb2) = (0.0f32, 0.0f32);

            for i in 0..side {
                let py = i as f32 - hw as f32;
                for j in 0..side {
                    let px = j as f32 - hw as f32;
                    let sx = current.x + px;
                    let sy = current.y + py;
                    let gx = sample_bilinear_clamped(img, sx + 1.0, sy)
                        - sample_bilinear_clamped(img, sx - 1.0, sy);
                    let gy = sample_bilinear_clamped(img, sx, sy + 1.0)
                        - sample_bilinear_clamped(img, sx, sy - 1.0);
                    let m = mask[i * side + j];
                    let gxx = gx * gx * m;
                    let gxy = gx * gy * m;
                    let gyy = gy * gy * m;
                    a += gxx;
                    b += gxy;
                    c += gyy;
                    bb1 += gxx * px + gxy * py;
                    bb2 += gxy * px + gyy * py;
                }
            }

            let det = a * c - b * b;
            if det.abs() <= f32::EPSILON * (a * c).abs().max(1.0) {
                break;
            }
            let inv = 1.0 / det;
            let next = Point2::new(
                current.x + inv * (c * bb1 - b * bb2),
                current.y + inv * (a * bb2 - b * bb1),
            );
            let step = (next - current).norm_squared();
            current = next;
            if current.x < 0.0 || current.y < 0.0 || current.x >= w || current.y >= h {
                break;
            }
            if step <= eps2 {
                break;
            }
        }

        let drift = current - start;
        *corner = if drift.x.abs() > hw as f32 || drift.y.abs() > hw as f32 {
            start
        } else {
            current
        };
    }
}
