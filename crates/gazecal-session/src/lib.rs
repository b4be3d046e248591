//! Participant-driven screen-marker calibration.
//!
//! The [`Session`] state machine sequences target sites, gates sampling on
//! participant readiness and marker detection, and collects reference points
//! and pupil samples. [`Calibrator`] drives it from frames and hands the
//! result to a [`SessionFinisher`] when the session ends. The [`surface`]
//! module tracks named surfaces anchored on the screen-corner marker.
//!
//! ```
//! use std::sync::Arc;
//! use gazecal_core::{GrayImage, NullSink};
//! use gazecal_session::{
//!     CalibrationConfig, Calibrator, FrameSource, InputEvent, Key, MemoryFinisher,
//!     MemoryFrameSource, SessionOutcome,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = MemoryFrameSource::repeat(&GrayImage::filled(64, 48, 128), 90, 30.0);
//! let mut cal = Calibrator::new(
//!     CalibrationConfig::default(),
//!     MemoryFinisher::default(),
//!     Arc::new(NullSink),
//! )?;
//! cal.start(&source)?;
//! while let Some(frame) = source.next_frame() {
//!     cal.push_event(InputEvent::KeyDown(Key::Space));
//!     cal.process_frame(&frame.as_frame(), &[], &[])?;
//! }
//!
//! // blank frames never show the marker, so the first site waits in its
//! // sampling window until the session is stopped
//! assert!(cal.is_active());
//! cal.stop()?;
//! let handoff = &cal.finisher().handoffs[0];
//! assert_eq!(handoff.outcome, SessionOutcome::Aborted);
//! assert_eq!(handoff.samples.ref_list.len(), 0);
//! # Ok(())
//! # }
//! ```

mod calibrator;
mod capture;
mod collector;
mod config;
mod error;
mod finish;
mod input;
mod presentation;
mod session;
mod sites;
pub mod surface;

pub use calibrator::Calibrator;
pub use capture::{FrameSource, MemoryFrameSource, OwnedFrame};
pub use collector::{CollectedSamples, FixationEvent, PupilSample, ReferencePoint, SampleCollector};
pub use config::{
    CalibrationConfig, RunMode, SessionParams, MARKER_SCALE_RANGE, MAX_LEAD_FRAMES,
    SAMPLE_DURATION_RANGE,
};
pub use error::{ConfigError, FinishError, SessionError, SurfaceError};
pub use finish::{Handoff, JsonReportFinisher, MemoryFinisher, SessionFinisher};
pub use input::{InputEvent, InputLatch, Key, LatchedInput};
pub use presentation::{ease_in_out_quad, marker_alpha, marker_placement, MarkerPlacement};
pub use session::{MarkerFeedback, Phase, Session, SessionOutcome, TickInput, TickSnapshot};
pub use sites::{accuracy_sites, calibration_grid, calibration_sites, sites_for, Site};
pub use surface::{
    JsonFileStore, ObjectStore, SurfaceDefinition, SurfaceStore, SurfaceTracker,
};
