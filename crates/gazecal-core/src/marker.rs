use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Which detector produced a marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// Nested rings of alternating intensity (on-screen calibration target).
    ConcentricRings,
    /// The four corners of a display bezel.
    ScreenCorners,
}

/// One detected calibration target in a single frame.
///
/// Markers are produced fresh for each frame and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub kind: MarkerKind,
    /// Optional fixed identifier (screen corners always report one).
    #[serde(default)]
    pub id: Option<u32>,
    /// Position in image pixels.
    pub position: Point2<f32>,
    /// Position in the unit square, origin bottom-left.
    pub normalized_position: Point2<f32>,
    pub confidence: f32,
    /// Ordered outline points in image pixels.
    pub geometry: Vec<Point2<f32>>,
}

impl Marker {
    /// Closed perimeter of `geometry`.
    pub fn perimeter(&self) -> f32 {
        let n = self.geometry.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let a = self.geometry[i];
                let b = self.geometry[(i + 1) % n];
                (b - a).norm()
            })
            .sum()
    }
}

/// Map an image-space point into the unit square.
///
/// With `flip_y` the origin moves from top-left to bottom-left, matching the
/// convention of gaze coordinates.
pub fn normalize(pos: Point2<f32>, size: (usize, usize), flip_y: bool) -> Point2<f32> {
    let (w, h) = (size.0 as f32, size.1 as f32);
    let x = pos.x / w;
    let y = pos.y / h;
    if flip_y {
        Point2::new(x, 1.0 - y)
    } else {
        Point2::new(x, y)
    }
}

/// Inverse of [`normalize`].
pub fn denormalize(pos: Point2<f32>, size: (usize, usize), flip_y: bool) -> Point2<f32> {
    let (w, h) = (size.0 as f32, size.1 as f32);
    let y = if flip_y { 1.0 - pos.y } else { pos.y };
    Point2::new(pos.x * w, y * h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_flips_vertical_axis() {
        let p = normalize(Point2::new(160.0, 60.0), (640, 480), true);
        assert_relative_eq!(p.x, 0.25);
        assert_relative_eq!(p.y, 0.875);

        let q = normalize(Point2::new(160.0, 60.0), (640, 480), false);
        assert_relative_eq!(q.y, 0.125);
    }

    #[test]
    fn denormalize_inverts_normalize() {
        let p = Point2::new(123.5_f32, 77.25);
        let back = denormalize(normalize(p, (320, 240), true), (320, 240), true);
        assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
    }

    #[test]
    fn perimeter_of_unit_square() {
        let m = Marker {
            kind: MarkerKind::ScreenCorners,
            id: Some(32),
            position: Point2::new(0.5, 0.5),
            normalized_position: Point2::new(0.5, 0.5),
            confidence: 1.0,
            geometry: vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
        };
        assert_relative_eq!(m.perimeter(), 4.0);
    }

    #[test]
    fn marker_serializes_kind_in_snake_case() {
        let m = Marker {
            kind: MarkerKind::ConcentricRings,
            id: None,
            position: Point2::new(1.0, 2.0),
            normalized_position: Point2::new(0.1, 0.9),
            confidence: 0.8,
            geometry: Vec::new(),
        };
        let json = serde_json::to_string(&m).expect("serialize");
        assert!(json.contains("\"concentric_rings\""));
        let back: Marker = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, m);
    }
}
