//! Concentric ring marker detection.
//!
//! Pipeline: light blur, adaptive threshold, border following, an ellipse fit
//! per outer border, then grouping of ellipses that share a center. A group
//! with enough nested rings is a marker; its innermost ellipse gives the
//! position and its outermost ellipse the outline.

use gazecal_core::{normalize, GrayImageView, Marker, MarkerKind, SharedSink};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::contours::{find_contours, BorderKind};
use crate::detector::MarkerDetector;
use crate::ellipse::Ellipse;
use crate::threshold::{box_blur3, AdaptiveMethod, AdaptiveThreshold};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingDetectorParams {
    /// Apply a 3x3 box blur before thresholding.
    pub pre_blur: bool,
    pub threshold: AdaptiveThreshold,
    /// Minimum number of nested ellipses for a marker.
    pub min_ring_count: usize,
    pub min_contour_points: usize,
    pub min_semi_minor: f32,
    /// Reject ellipses flatter than this minor/major ratio.
    pub min_axis_ratio: f32,
    /// Accepted RMS fit error: `max_fit_error_px + max_fit_error_rel * mean_radius`.
    pub max_fit_error_px: f32,
    pub max_fit_error_rel: f32,
    /// Centers closer than `max(center_tolerance_px, center_tolerance_rel * semi_minor)`
    /// belong to the same marker.
    pub center_tolerance_px: f32,
    pub center_tolerance_rel: f32,
    /// Ellipses whose mean radii differ by less than this are the same ring.
    pub min_ring_gap_px: f32,
    /// Points sampled on the outermost ellipse for the marker outline.
    pub outline_samples: usize,
}

impl Default for RingDetectorParams {
    fn default() -> Self {
        Self {
            pre_blur: true,
            threshold: AdaptiveThreshold {
                method: AdaptiveMethod::Mean,
                block_size: 5,
                offset: 11.0,
                invert: false,
            },
            min_ring_count: 4,
            min_contour_points: 8,
            min_semi_minor: 2.0,
            min_axis_ratio: 0.3,
            max_fit_error_px: 1.0,
            max_fit_error_rel: 0.05,
            center_tolerance_px: 2.0,
            center_tolerance_rel: 0.15,
            min_ring_gap_px: 1.5,
            outline_samples: 16,
        }
    }
}

/// Nested ellipses sharing one center, innermost first.
#[derive(Clone, Debug, PartialEq)]
pub struct RingCluster {
    pub ellipses: Vec<Ellipse>,
    /// Mean fit quality in `[0, 1]`.
    pub quality: f32,
}

impl RingCluster {
    #[inline]
    pub fn ring_count(&self) -> usize {
        self.ellipses.len()
    }

    pub fn center(&self) -> Point2<f32> {
        self.ellipses[0].center
    }

    pub fn outermost(&self) -> &Ellipse {
        &self.ellipses[self.ellipses.len() - 1]
    }
}

#[derive(Clone, Copy, Debug)]
struct RingCandidate {
    ellipse: Ellipse,
    quality: f32,
}

/// All ring clusters in `img`, best first (more rings, then better fit).
pub fn find_concentric_rings(img: &GrayImageView<'_>, params: &RingDetectorParams) -> Vec<RingCluster> {
    let blurred;
    let src = if params.pre_blur {
        blurred = box_blur3(img);
        blurred.view()
    } else {
        *img
    };

    let bin = params.threshold.apply(&src);
    let contours = find_contours(&bin);

    let mut candidates: Vec<RingCandidate> = contours
        .iter()
        .filter(|c| c.kind == BorderKind::Outer && c.points.len() >= params.min_contour_points)
        .filter_map(|c| fit_ring(&c.points_f32(), params))
        .collect();
    log::trace!("{} ellipse candidates from {} contours", candidates.len(), contours.len());

    candidates.sort_by(|a, b| {
        a.ellipse
            .mean_radius()
            .partial_cmp(&b.ellipse.mean_radius())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut groups: Vec<Vec<RingCandidate>> = Vec::new();
    for cand in candidates {
        let mut best: Option<(usize, f32)> = None;
        for (gi, group) in groups.iter().enumerate() {
            let Some(last) = group.last() else {
                continue;
            };
            let tol = params
                .center_tolerance_px
                .max(params.center_tolerance_rel * last.ellipse.semi_minor);
            let d = (cand.ellipse.center - last.ellipse.center).norm();
            if d <= tol && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((gi, d));
            }
        }

        match best {
            Some((gi, _)) => {
                let group = &mut groups[gi];
                let last_radius = group
                    .last()
                    .map(|c| c.ellipse.mean_radius())
                    .unwrap_or(0.0);
                if cand.ellipse.mean_radius() - last_radius >= params.min_ring_gap_px {
                    group.push(cand);
                }
            }
            None => groups.push(vec![cand]),
        }
    }

    let mut clusters: Vec<RingCluster> = groups
        .into_iter()
        .filter(|g| g.len() >= params.min_ring_count.max(1))
        .map(|g| {
            let quality = g.iter().map(|c| c.quality).sum::<f32>() / g.len() as f32;
            RingCluster {
                ellipses: g.into_iter().map(|c| c.ellipse).collect(),
                quality,
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.ring_count().cmp(&a.ring_count()).then(
            b.quality
                .partial_cmp(&a.quality)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    clusters
}

fn fit_ring(pts: &[Point2<f32>], params: &RingDetectorParams) -> Option<RingCandidate> {
    let ellipse = Ellipse::from_polygon_moments(pts)?;
    if ellipse.semi_minor < params.min_semi_minor || ellipse.axis_ratio() < params.min_axis_ratio {
        return None;
    }
    let allowed = params.max_fit_error_px + params.max_fit_error_rel * ellipse.mean_radius();
    let err = ellipse.rms_residual(pts);
    if err > allowed {
        return None;
    }
    Some(RingCandidate {
        ellipse,
        quality: (1.0 - err / allowed).clamp(0.0, 1.0),
    })
}

/// [`MarkerDetector`] for concentric ring targets.
pub struct RingMarkerDetector {
    params: RingDetectorParams,
    sink: SharedSink,
}

impl RingMarkerDetector {
    pub fn new(params: RingDetectorParams, sink: SharedSink) -> Self {
        Self { params, sink }
    }

    pub fn params(&self) -> &RingDetectorParams {
        &self.params
    }
}

impl MarkerDetector for RingMarkerDetector {
    fn kind(&self) -> MarkerKind {
        MarkerKind::ConcentricRings
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, image), fields(w = image.width, h = image.height))
    )]
    fn detect(&self, image: &GrayImageView<'_>) -> Vec<Marker> {
        let clusters = find_concentric_rings(image, &self.params);
        if clusters.len() > 1 {
            self.sink.debug(format_args!("{} ring markers in frame", clusters.len()));
        }
        let size = (image.width, image.height);
        clusters
            .into_iter()
            .map(|cluster| {
                let position = cluster.center();
                Marker {
                    kind: MarkerKind::ConcentricRings,
                    id: None,
                    position,
                    normalized_position: normalize(position, size, true),
                    confidence: cluster.quality,
                    geometry: cluster.outermost().sample_points(self.params.outline_samples),
                }
            })
            .collect()
    }
}
