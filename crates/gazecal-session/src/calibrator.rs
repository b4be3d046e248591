//! Drives a [`Session`] from frames: owns the configuration, the detector, the
//! input latch and the finishing collaborator.

use gazecal_core::{Frame, SharedSink};
use gazecal_marker::MarkerDetector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capture::FrameSource;
use crate::collector::{FixationEvent, PupilSample};
use crate::config::CalibrationConfig;
use crate::error::{ConfigError, SessionError};
use crate::finish::SessionFinisher;
use crate::input::{InputEvent, InputLatch};
use crate::session::{Session, TickInput, TickSnapshot};
use crate::sites::sites_for;

pub struct Calibrator<F: SessionFinisher> {
    config: CalibrationConfig,
    detector: Box<dyn MarkerDetector>,
    finisher: F,
    sink: SharedSink,
    session: Option<Session>,
    latch: InputLatch,
    handed_off: bool,
}

impl<F: SessionFinisher> Calibrator<F> {
    /// Validate `config` and build its detector.
    pub fn new(config: CalibrationConfig, finisher: F, sink: SharedSink) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = config.detector.build(sink.clone());
        Ok(Self {
            config,
            detector,
            finisher,
            sink,
            session: None,
            latch: InputLatch::new(),
            handed_off: false,
        })
    }

    /// Replace the detector built from the configuration.
    pub fn with_detector(mut self, detector: Box<dyn MarkerDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Change settings through the validating setters. Applies to the next
    /// session; the running one keeps its snapshot.
    pub fn configure<G>(&mut self, edit: G) -> Result<(), ConfigError>
    where
        G: FnOnce(&mut CalibrationConfig) -> Result<(), ConfigError>,
    {
        let mut next = self.config.clone();
        edit(&mut next)?;
        next.validate()?;
        if next.detector != self.config.detector {
            self.detector = next.detector.build(self.sink.clone());
        }
        self.config = next;
        Ok(())
    }

    pub fn finisher(&self) -> &F {
        &self.finisher
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// A session exists and has not ended.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_terminal())
    }

    /// Start a session, shuffling sites with `shuffle_seed` or fresh entropy.
    pub fn start(&mut self, source: &dyn FrameSource) -> Result<(), SessionError> {
        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.start_with_rng(source, &mut rng)
    }

    pub fn start_with_rng<R: Rng + ?Sized>(
        &mut self,
        source: &dyn FrameSource,
        rng: &mut R,
    ) -> Result<(), SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyRunning);
        }
        if !source.is_available() {
            self.sink
                .warn(format_args!("capture device unavailable, not starting calibration"));
            return Err(SessionError::CaptureUnavailable);
        }

        let sites = sites_for(self.config.run_mode, rng);
        self.sink.info(format_args!(
            "starting {:?} session with {} sites",
            self.config.run_mode,
            sites.len()
        ));
        self.latch = InputLatch::new();
        self.handed_off = false;
        self.session = Some(Session::new(
            self.config.session_params(),
            sites,
            self.sink.clone(),
        ));
        self.hand_off_if_done()
    }

    /// Queue a participant input; it is seen by the next processed frame.
    pub fn push_event(&mut self, event: InputEvent) {
        self.latch.push(event);
    }

    /// Run one tick on `frame`.
    ///
    /// Returns `Ok(None)` when no session is running. When the tick ends the
    /// session, the samples are handed to the finisher before returning. A
    /// handoff that failed is retried by later calls and by [`Self::stop`].
    pub fn process_frame(
        &mut self,
        frame: &Frame<'_>,
        pupil: &[PupilSample],
        fixations: &[FixationEvent],
    ) -> Result<Option<TickSnapshot>, SessionError> {
        if !self.is_active() {
            self.hand_off_if_done()?;
            return Ok(None);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        let input = TickInput {
            timestamp: frame.timestamp,
            pupil,
            fixations,
            events: self.latch.drain(),
        };
        let detector = &self.detector;
        let snapshot = session.tick(input, || detector.detect(&frame.image));

        self.hand_off_if_done()?;
        Ok(Some(snapshot))
    }

    /// Abort the running session now and hand off what was collected.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if let Some(session) = self.session.as_mut() {
            session.abort();
        }
        self.hand_off_if_done()
    }

    fn hand_off_if_done(&mut self) -> Result<(), SessionError> {
        if self.handed_off {
            return Ok(());
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let Some(outcome) = session.outcome() else {
            return Ok(());
        };
        self.finisher
            .finish(self.config.run_mode, outcome, session.samples())?;
        self.handed_off = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MemoryFrameSource;
    use crate::finish::MemoryFinisher;
    use gazecal_core::NullSink;
    use std::sync::Arc;

    #[test]
    fn start_without_capture_fails_and_creates_no_session() {
        let mut cal = Calibrator::new(
            CalibrationConfig::default(),
            MemoryFinisher::default(),
            Arc::new(NullSink),
        )
        .expect("valid config");
        let err = cal.start(&MemoryFrameSource::default()).unwrap_err();
        assert!(matches!(err, SessionError::CaptureUnavailable));
        assert!(cal.session().is_none());
        assert!(cal.finisher().handoffs.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = CalibrationConfig {
            sample_duration: 5,
            ..CalibrationConfig::default()
        };
        assert!(Calibrator::new(cfg, MemoryFinisher::default(), Arc::new(NullSink)).is_err());
    }

    #[test]
    fn configure_applies_only_valid_edits() {
        let mut cal = Calibrator::new(
            CalibrationConfig::default(),
            MemoryFinisher::default(),
            Arc::new(NullSink),
        )
        .expect("valid config");
        assert!(cal.configure(|c| c.set_sample_duration(200)).is_err());
        assert_eq!(cal.config().sample_duration, 40);
        cal.configure(|c| c.set_marker_scale(1.5)).expect("in range");
        assert_eq!(cal.config().marker_scale, 1.5);
    }
}
