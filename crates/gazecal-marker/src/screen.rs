//! Display bezel detection: the four corners of the screen seen by the world
//! camera, reported as a single marker with a fixed id.

use gazecal_core::{normalize, GrayImageView, Marker, MarkerKind, SharedSink};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::contours::find_contours;
use crate::detector::MarkerDetector;
use crate::polygon::{approx_polygon, arc_length, centroid, contour_area};
use crate::subpix::{refine_corners_subpix, SubPixCriteria};
use crate::threshold::{AdaptiveMethod, AdaptiveThreshold};

/// Id reported by every screen-corner marker.
pub const SCREEN_MARKER_ID: u32 = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenCornerParams {
    pub threshold: AdaptiveThreshold,
    /// Contours enclosing less than this many square pixels are ignored.
    pub min_area: f32,
    /// Polygon simplification tolerance as a fraction of the perimeter.
    pub approx_epsilon_frac: f32,
    pub subpix: SubPixCriteria,
    pub marker_id: u32,
}

impl Default for ScreenCornerParams {
    fn default() -> Self {
        Self {
            threshold: AdaptiveThreshold {
                method: AdaptiveMethod::Gaussian,
                block_size: 25,
                offset: -5.0,
                invert: true,
            },
            min_area: 20.0 * 2500.0,
            approx_epsilon_frac: 0.1,
            subpix: SubPixCriteria::default(),
            marker_id: SCREEN_MARKER_ID,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CornerOrderError {
    #[error("corner split is {top} above / {bottom} below the centroid, need 2 / 2")]
    DegenerateSplit { top: usize, bottom: usize },
}

/// Order four corners as `[top-left, top-right, bottom-right, bottom-left]`.
///
/// Corners strictly above the centroid form the top pair, the rest the bottom
/// pair; each pair is then ordered by x.
pub fn sort_corners(corners: &[Point2<f32>; 4]) -> Result<[Point2<f32>; 4], CornerOrderError> {
    let c = centroid(corners).unwrap_or_else(Point2::origin);
    sort_corners_about(corners, c)
}

/// [`sort_corners`] against an explicit center.
pub fn sort_corners_about(
    corners: &[Point2<f32>; 4],
    center: Point2<f32>,
) -> Result<[Point2<f32>; 4], CornerOrderError> {
    let (mut top, mut bottom): (Vec<Point2<f32>>, Vec<Point2<f32>>) =
        corners.iter().partition(|p| p.y < center.y);
    if top.len() != 2 {
        return Err(CornerOrderError::DegenerateSplit {
            top: top.len(),
            bottom: bottom.len(),
        });
    }
    let by_x = |a: &Point2<f32>, b: &Point2<f32>| {
        a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
    };
    top.sort_by(by_x);
    bottom.sort_by(by_x);
    Ok([top[0], top[1], bottom[1], bottom[0]])
}

/// Ordered screen outline found in one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenQuad {
    pub corners: [Point2<f32>; 4],
    pub center: Point2<f32>,
}

/// Find the screen outline in `img`.
///
/// Only contours that sit inside another contour and themselves contain one
/// qualify. When several do, the first is used and a warning goes to `sink`.
pub fn find_screen_quad(
    img: &GrayImageView<'_>,
    params: &ScreenCornerParams,
    sink: &SharedSink,
) -> Option<ScreenQuad> {
    let bin = params.threshold.apply(img);
    let contours = find_contours(&bin);

    let candidates: Vec<Vec<Point2<f32>>> = contours
        .iter()
        .filter(|c| c.has_parent() && c.has_child())
        .map(|c| c.points_f32())
        .filter(|pts| contour_area(pts) > params.min_area)
        .collect();

    let first = candidates.first()?;
    if candidates.len() > 1 {
        sink.warn(format_args!(
            "{} screen outline candidates, using the first",
            candidates.len()
        ));
    }

    let eps = params.approx_epsilon_frac * arc_length(first, true);
    let poly = approx_polygon(first, eps, true);
    let mut corners: [Point2<f32>; 4] = match poly.as_slice() {
        [a, b, c, d] => [*a, *b, *c, *d],
        _ => {
            sink.debug(format_args!(
                "screen outline simplified to {} vertices, expected 4",
                poly.len()
            ));
            return None;
        }
    };

    refine_corners_subpix(img, &mut corners, &params.subpix);
    let center = centroid(&corners)?;
    match sort_corners_about(&corners, center) {
        Ok(corners) => Some(ScreenQuad { corners, center }),
        Err(err) => {
            sink.debug(format_args!("dropping screen outline: {err}"));
            None
        }
    }
}

/// [`MarkerDetector`] for display bezels.
pub struct ScreenCornerDetector {
    params: ScreenCornerParams,
    sink: SharedSink,
}

impl ScreenCornerDetector {
    pub fn new(params: ScreenCornerParams, sink: SharedSink) -> Self {
        Self { params, sink }
    }

    pub fn params(&self) -> &ScreenCornerParams {
        &self.params
    }
}

impl MarkerDetector for ScreenCornerDetector {
    fn kind(&self) -> MarkerKind {
        MarkerKind::ScreenCorners
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, image), fields(w = image.width, h = image.height))
    )]
    fn detect(&self, image: &GrayImageView<'_>) -> Vec<Marker> {
        let Some(quad) = find_screen_quad(image, &self.params, &self.sink) else {
            return Vec::new();
        };
        vec![Marker {
            kind: MarkerKind::ScreenCorners,
            id: Some(self.params.marker_id),
            position: quad.center,
            normalized_position: normalize(quad.center, (image.width, image.height), true),
            confidence: 1.0,
            geometry: quad.corners.to_vec(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotate(p: Point2<f32>, c: Point2<f32>, angle: f32) -> Point2<f32> {
        let (s, co) = angle.sin_cos();
        let d = p - c;
        Point2::new(c.x + d.x * co - d.y * s, c.y + d.x * s + d.y * co)
    }

    fn permutations(items: [Point2<f32>; 4]) -> Vec<[Point2<f32>; 4]> {
        let mut out = Vec::new();
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        let idx = [a, b, c, d];
                        let mut seen = [false; 4];
                        idx.iter().for_each(|&i| seen[i] = true);
                        if seen.iter().all(|&s| s) {
                            out.push([items[a], items[b], items[c], items[d]]);
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn orders_rotated_rectangles_from_any_input_order() {
        let c = Point2::new(300.0, 200.0);
        let base = [
            Point2::new(150.0, 100.0),
            Point2::new(450.0, 100.0),
            Point2::new(450.0, 300.0),
            Point2::new(150.0, 300.0),
        ];
        for step in -6..=6 {
            let angle = (step as f32 * 5.0).to_radians();
            let expected = base.map(|p| rotate(p, c, angle));
            for input in permutations(expected) {
                let sorted = sort_corners(&input).expect("2/2 split");
                assert_eq!(sorted, expected, "angle {step}x5deg, input {input:?}");
            }
        }
    }

    #[test]
    fn orders_perspective_trapezoid() {
        let tl = Point2::new(120.0, 90.0);
        let tr = Point2::new(500.0, 110.0);
        let br = Point2::new(540.0, 400.0);
        let bl = Point2::new(90.0, 380.0);
        let sorted = sort_corners(&[br, tl, bl, tr]).expect("ordered");
        assert_eq!(sorted, [tl, tr, br, bl]);
    }

    #[test]
    fn diamond_is_a_degenerate_split() {
        // left and right vertices sit exactly on the centroid row
        let pts = [
            Point2::new(0.0, -10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(-10.0, 0.0),
        ];
        assert_eq!(
            sort_corners(&pts),
            Err(CornerOrderError::DegenerateSplit { top: 1, bottom: 3 })
        );
    }

    #[test]
    fn three_above_one_below_fails() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 1.0),
            Point2::new(5.0, 30.0),
        ];
        assert!(matches!(
            sort_corners(&pts),
            Err(CornerOrderError::DegenerateSplit { top: 3, bottom: 1 })
        ));
    }
}
