use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Plane-to-plane projective map, `dst ~ h * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(f64::from(p.x), f64::from(p.y), 1.0);
        Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Image of a `[tl, tr, br, bl]` quad.
    pub fn map_quad(&self, quad: &[Point2<f32>; 4]) -> [Point2<f32>; 4] {
        quad.map(|p| self.apply(p))
    }
}

/// Similarity moving a point set to zero mean and mean distance sqrt(2).
fn conditioning(pts: &[Point2<f32>; 4]) -> Matrix3<f64> {
    let pts = pts.map(|p| Point2::new(f64::from(p.x), f64::from(p.y)));
    let center = pts.iter().fold(Vector3::zeros(), |acc, p| {
        acc + Vector3::new(p.x, p.y, 0.0)
    }) / 4.0;
    let spread = pts
        .iter()
        .map(|p| ((p.x - center.x).powi(2) + (p.y - center.y).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;
    let s = if spread > 1e-12 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };
    Matrix3::new(
        s, 0.0, -s * center.x, //
        0.0, s, -s * center.y, //
        0.0, 0.0, 1.0,
    )
}

fn conditioned(t: &Matrix3<f64>, p: Point2<f32>) -> (f64, f64) {
    let v = t * Vector3::new(f64::from(p.x), f64::from(p.y), 1.0);
    (v.x, v.y)
}

/// Homography through four correspondences, `dst[i] ~ H * src[i]`.
///
/// Both point sets are conditioned before the 8x8 solve. Returns `None` when
/// three of the points are collinear or the solve is singular.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let t_src = conditioning(src);
    let t_dst = conditioning(dst);

    // h33 fixed to 1; two rows per correspondence
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (&s, &d)) in src.iter().zip(dst.iter()).enumerate() {
        let (x, y) = conditioned(&t_src, s);
        let (u, v) = conditioned(&t_dst, d);
        for (row, target, offset) in [(2 * k, u, 0), (2 * k + 1, v, 3)] {
            a[(row, offset)] = x;
            a[(row, offset + 1)] = y;
            a[(row, offset + 2)] = 1.0;
            a[(row, 6)] = -target * x;
            a[(row, 7)] = -target * y;
            b[row] = target;
        }
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    let h = t_dst.try_inverse()? * hn * t_src;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / scale))
}

/// Unit square in surface coordinates, ordered like screen corners
/// (top-left, top-right, bottom-right, bottom-left) with the surface origin at
/// the bottom-left.
pub fn unit_surface_corners() -> [Point2<f32>; 4] {
    [
        Point2::new(0.0, 1.0),
        Point2::new(1.0, 1.0),
        Point2::new(1.0, 0.0),
        Point2::new(0.0, 0.0),
    ]
}

/// Homography mapping surface coordinates (unit square) onto the given
/// `[tl, tr, br, bl]` quadrilateral.
pub fn surface_to_quad(quad: &[Point2<f32>; 4]) -> Option<Homography> {
    homography_from_4pt(&unit_surface_corners(), quad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        assert!((a - b).abs().max() < tol, "{a:?} vs {b:?} (tol {tol})");
    }

    #[test]
    fn inverse_undoes_apply() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(50.0_f32, -20.0),
            Point2::new(320.0_f32, 200.0),
        ] {
            let back = inv.apply(h.apply(p));
            assert_close(back, p, 1e-3);
        }
    }

    #[test]
    fn four_correspondences_recover_the_map() {
        let truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let rect = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(180.0_f32, 0.0),
            Point2::new(180.0_f32, 130.0),
            Point2::new(0.0_f32, 130.0),
        ];
        let dst = rect.map(|p| truth.apply(p));

        let recovered = homography_from_4pt(&rect, &dst).expect("recoverable");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_close(recovered.apply(p), truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn surface_corners_land_on_quad() {
        let quad = [
            Point2::new(0.2_f32, 0.9),
            Point2::new(0.8, 0.85),
            Point2::new(0.75, 0.1),
            Point2::new(0.25, 0.15),
        ];
        let h = surface_to_quad(&quad).expect("non-degenerate quad");
        for (s, q) in h.map_quad(&unit_surface_corners()).iter().zip(quad.iter()) {
            assert_close(*s, *q, 1e-4);
        }
    }
}
