//! High-level facade crate for the `gazecal-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the core, marker and session crates
//! - (feature `image`) helpers that run the marker detectors on an
//!   `image::GrayImage` or raw buffer, and a frame source that replays a
//!   directory of images
//! - (feature `cli`) the `gazecal` command line tool
//!
//! ## Quickstart
//!
//! ```no_run
//! use gazecal::detect;
//! use gazecal::marker::RingDetectorParams;
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("frame.png")?.decode()?.to_luma8();
//! let markers = detect::detect_rings(&img, RingDetectorParams::default());
//! println!("detected: {}", markers.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `gazecal::core`: image views, the `Marker` model, homographies, diagnostics.
//! - `gazecal::marker`: concentric-ring and screen-corner detectors plus the
//!   vision primitives they share.
//! - `gazecal::session`: the calibration session, its driver and surface tracking.
//! - `gazecal::detect` (feature `image`): end-to-end helpers from `image::GrayImage`.
//! - `gazecal::frames` (feature `image`): `ImageDirectorySource`.

pub use gazecal_core as core;
pub use gazecal_marker as marker;
pub use gazecal_session as session;

pub use gazecal_core::{Frame, Marker, MarkerKind};
pub use gazecal_marker::{DetectorConfig, MarkerDetector};
pub use gazecal_session::{
    CalibrationConfig, Calibrator, RunMode, Session, SessionFinisher, SessionOutcome,
};

#[cfg(feature = "image")]
pub mod detect;

#[cfg(feature = "image")]
pub mod frames;
