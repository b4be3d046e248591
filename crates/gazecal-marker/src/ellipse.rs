//! Ellipse estimation from closed contours.
//!
//! The fit uses the second-order area moments of the contour polygon. It is
//! exact for a polygon sampled densely on an ellipse and cheap enough to run on
//! every contour in a frame; the radial residual then tells real rings apart
//! from arbitrary blobs.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point2<f32>,
    pub semi_major: f32,
    pub semi_minor: f32,
    /// Direction of the major axis, radians, image coordinates.
    pub angle: f32,
}

impl Ellipse {
    /// Ellipse with the same area moments as the closed polygon `pts`.
    ///
    /// Returns `None` for fewer than three points, zero area, or a
    /// degenerate (line-like) second moment.
    pub fn from_polygon_moments(pts: &[Point2<f32>]) -> Option<Self> {
        let n = pts.len();
        if n < 3 {
            return None;
        }

        // shift to the vertex mean to keep the sums well conditioned
        let (mx, my) = pts.iter().fold((0.0f64, 0.0f64), |(sx, sy), p| {
            (sx + p.x as f64, sy + p.y as f64)
        });
        let (mx, my) = (mx / n as f64, my / n as f64);

        let mut a = 0.0f64;
        let mut sx = 0.0f64;
        let mut sy = 0.0f64;
        let mut sxx = 0.0f64;
        let mut syy = 0.0f64;
        let mut sxy = 0.0f64;
        for i in 0..n {
            let p = pts[i];
            let q = pts[(i + 1) % n];
            let (x0, y0) = (p.x as f64 - mx, p.y as f64 - my);
            let (x1, y1) = (q.x as f64 - mx, q.y as f64 - my);
            let c = x0 * y1 - x1 * y0;
            a += c;
            sx += (x0 + x1) * c;
            sy += (y0 + y1) * c;
            sxx += (x0 * x0 + x0 * x1 + x1 * x1) * c;
            syy += (y0 * y0 + y0 * y1 + y1 * y1) * c;
            sxy += (x0 * y1 + 2.0 * x0 * y0 + 2.0 * x1 * y1 + x1 * y0) * c;
        }
        a *= 0.5;
        if a.abs() < 1e-9 {
            return None;
        }

        let cx = sx / (6.0 * a);
        let cy = sy / (6.0 * a);
        let mu20 = sxx / (12.0 * a) - cx * cx;
        let mu02 = syy / (12.0 * a) - cy * cy;
        let mu11 = sxy / (24.0 * a) - cx * cy;

        let half_tr = 0.5 * (mu20 + mu02);
        let disc = (0.25 * (mu20 - mu02).powi(2) + mu11 * mu11).sqrt();
        let l_max = half_tr + disc;
        let l_min = half_tr - disc;
        if l_min <= 0.0 || !l_max.is_finite() {
            return None;
        }

        Some(Self {
            center: Point2::new((cx + mx) as f32, (cy + my) as f32),
            semi_major: (2.0 * l_max.sqrt()) as f32,
            semi_minor: (2.0 * l_min.sqrt()) as f32,
            angle: (0.5 * (2.0 * mu11).atan2(mu20 - mu02)) as f32,
        })
    }

    /// Radius of the circle with the same area.
    #[inline]
    pub fn mean_radius(&self) -> f32 {
        (self.semi_major * self.semi_minor).sqrt()
    }

    #[inline]
    pub fn axis_ratio(&self) -> f32 {
        if self.semi_major <= 0.0 {
            0.0
        } else {
            self.semi_minor / self.semi_major
        }
    }

    /// Normalized radial coordinate of `p`: 1.0 on the ellipse.
    pub fn radial_coordinate(&self, p: Point2<f32>) -> f32 {
        let (s, c) = self.angle.sin_cos();
        let d = p - self.center;
        let u = d.x * c + d.y * s;
        let v = -d.x * s + d.y * c;
        ((u / self.semi_major).powi(2) + (v / self.semi_minor).powi(2)).sqrt()
    }

    /// RMS distance of `pts` from the ellipse, approximated in pixels.
    pub fn rms_residual(&self, pts: &[Point2<f32>]) -> f32 {
        if pts.is_empty() {
            return f32::INFINITY;
        }
        let scale = self.mean_radius();
        let sum: f32 = pts
            .iter()
            .map(|&p| ((self.radial_coordinate(p) - 1.0) * scale).powi(2))
            .sum();
        (sum / pts.len() as f32).sqrt()
    }

    /// `count` points evenly spaced in parameter along the ellipse.
    pub fn sample_points(&self, count: usize) -> Vec<Point2<f32>> {
        let (s, c) = self.angle.sin_cos();
        (0..count)
            .map(|i| {
                let t = i as f32 / count as f32 * std::f32::consts::TAU;
                let (st, ct) = t.sin_cos();
                let u = self.semi_major * ct;
                let v = self.semi_minor * st;
                Point2::new(
                    self.center.x + u * c - v * s,
                    self.center.y + u * s + v * c,
                )
            })
            .collect()
    }
}
