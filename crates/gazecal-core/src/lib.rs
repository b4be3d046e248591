//! Core types and utilities for screen-marker gaze calibration.
//!
//! This crate is intentionally small. It holds the image view used by every
//! detector, the per-frame [`Marker`] model, coordinate normalization, the
//! 4-point homography used for surface mapping, and the diagnostics plumbing.

mod diagnostics;
mod error;
mod homography;
mod image;
mod logger;
mod marker;

pub use diagnostics::{
    default_sink, DiagnosticSink, LogSink, MemorySink, NullSink, SharedSink, LOG_TARGET,
};
pub use error::ImageError;
pub use homography::{homography_from_4pt, surface_to_quad, unit_surface_corners, Homography};
pub use image::{sample_bilinear, sample_bilinear_clamped, GrayImage, GrayImageView};
pub use marker::{denormalize, normalize, Marker, MarkerKind};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

/// One delivered video frame.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub image: GrayImageView<'a>,
    /// Capture timestamp in seconds.
    pub timestamp: f64,
    pub index: u64,
}

impl Frame<'_> {
    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.image.width, self.image.height)
    }
}
