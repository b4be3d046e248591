use gazecal_core::{GrayImageView, Marker, MarkerKind, SharedSink};
use serde::{Deserialize, Serialize};

use crate::rings::{RingDetectorParams, RingMarkerDetector};
use crate::screen::{ScreenCornerDetector, ScreenCornerParams};

/// A per-frame marker detection strategy.
///
/// Detectors are pure with respect to their input frame; diagnostics go to
/// the sink they were built with.
pub trait MarkerDetector: Send {
    fn kind(&self) -> MarkerKind;

    /// Candidates found in `image`, best first. May be empty.
    fn detect(&self, image: &GrayImageView<'_>) -> Vec<Marker>;
}

/// Serializable choice of detection strategy and its parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DetectorConfig {
    Rings(RingDetectorParams),
    ScreenCorners(ScreenCornerParams),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::Rings(RingDetectorParams::default())
    }
}

impl DetectorConfig {
    pub fn kind(&self) -> MarkerKind {
        match self {
            Self::Rings(_) => MarkerKind::ConcentricRings,
            Self::ScreenCorners(_) => MarkerKind::ScreenCorners,
        }
    }

    pub fn build(&self, sink: SharedSink) -> Box<dyn MarkerDetector> {
        match self {
            Self::Rings(p) => Box::new(RingMarkerDetector::new(p.clone(), sink)),
            Self::ScreenCorners(p) => Box::new(ScreenCornerDetector::new(p.clone(), sink)),
        }
    }
}
