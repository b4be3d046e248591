//! Marker detection for screen-marker gaze calibration.
//!
//! Two strategies share the [`MarkerDetector`] trait:
//! - [`RingMarkerDetector`] finds on-screen concentric ring targets.
//! - [`ScreenCornerDetector`] finds the display bezel and reports its four
//!   corners as one marker with id 32.
//!
//! The image-processing building blocks (adaptive threshold, border following,
//! polygon simplification, ellipse fit, sub-pixel corners) are public so tools
//! can reuse them.

pub mod contours;
pub mod ellipse;
pub mod polygon;
pub mod subpix;
pub mod threshold;

mod detector;
mod rings;
mod screen;

pub use detector::{DetectorConfig, MarkerDetector};
pub use rings::{find_concentric_rings, RingCluster, RingDetectorParams, RingMarkerDetector};
pub use screen::{
    find_screen_quad, sort_corners, sort_corners_about, CornerOrderError, ScreenCornerDetector,
    ScreenCornerParams, ScreenQuad, SCREEN_MARKER_ID,
};
