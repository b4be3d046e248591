//! The participant-driven calibration state machine.
//!
//! One [`Session::tick`] runs per delivered frame. Each site goes through a
//! lead-in, a scored sampling window and a lead-out, all counted in frames.
//! Inside the window the counter only moves while the marker is detected and
//! the participant has signaled readiness, so the session waits rather than
//! timing out. A confirmed fixation can jump the counter to the end of the
//! window.

use std::collections::VecDeque;

use gazecal_core::{Marker, SharedSink};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::collector::{CollectedSamples, FixationEvent, PupilSample, ReferencePoint, SampleCollector};
use crate::config::SessionParams;
use crate::input::LatchedInput;
use crate::presentation::marker_alpha;
use crate::sites::Site;

/// How a session ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every site was shown.
    Completed,
    /// The participant cancelled.
    Aborted,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LeadIn,
    Sampling,
    LeadOut,
}

/// Feedback dot drawn on top of the marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerFeedback {
    /// Detected, in the window and the participant is ready: samples are scored.
    Sampling,
    /// Detected but not scoring.
    Detected,
    NotDetected,
}

/// Per-frame inputs besides the detector result.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickInput<'a> {
    /// Frame timestamp in seconds.
    pub timestamp: f64,
    pub pupil: &'a [PupilSample],
    pub fixations: &'a [FixationEvent],
    pub events: LatchedInput,
}

/// Immutable description of the session after one tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickSnapshot {
    pub progress: u32,
    pub phase: Phase,
    pub on_window: bool,
    pub detected: bool,
    /// Normalized position of the marker used this tick.
    pub marker_position: Option<Point2<f32>>,
    pub participant_gate: bool,
    pub active_site: Option<Site>,
    /// 1-based number of the active site.
    pub site_number: usize,
    pub total_sites: usize,
    pub feedback: MarkerFeedback,
    pub alpha: f32,
    /// Clicks still needed to cancel, once cancelling has started.
    pub abort_clicks_remaining: Option<i32>,
    pub status_text: String,
    /// Set on the tick that ended the session.
    pub outcome: Option<SessionOutcome>,
}

pub struct Session {
    params: SessionParams,
    sites: VecDeque<Site>,
    total_sites: usize,
    active_site: Option<Site>,
    site_number: usize,
    progress: u32,
    gate: bool,
    abort_counter: i32,
    collector: SampleCollector,
    outcome: Option<SessionOutcome>,
    sink: SharedSink,
}

impl Session {
    /// Start a session over `sites`; the first site becomes active right away.
    ///
    /// With no sites the session is already completed.
    pub fn new(params: SessionParams, sites: Vec<Site>, sink: SharedSink) -> Self {
        let total_sites = sites.len();
        let mut sites: VecDeque<Site> = sites.into();
        let active_site = sites.pop_front();
        let outcome = if active_site.is_none() {
            sink.info(format_args!("no calibration sites, session ends immediately"));
            Some(SessionOutcome::Completed)
        } else {
            None
        };
        Self {
            params,
            sites,
            total_sites,
            active_site,
            site_number: usize::from(active_site.is_some()),
            progress: 0,
            gate: false,
            abort_counter: params.abort_limit,
            collector: SampleCollector::new(params.pupil_confidence_threshold),
            outcome,
            sink,
        }
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn participant_gate(&self) -> bool {
        self.gate
    }

    pub fn abort_counter(&self) -> i32 {
        self.abort_counter
    }

    pub fn active_site(&self) -> Option<Site> {
        self.active_site
    }

    pub fn remaining_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn samples(&self) -> &CollectedSamples {
        self.collector.samples()
    }

    pub fn into_samples(self) -> CollectedSamples {
        self.collector.into_samples()
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// End the session from outside (e.g. the calibration toggle).
    pub fn abort(&mut self) {
        if self.outcome.is_none() {
            self.terminate(SessionOutcome::Aborted);
        }
    }

    /// Advance by one frame.
    ///
    /// `detect` runs at most once, after the abort check. Ticks on a
    /// terminated session change nothing.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all, fields(progress = self.progress))
    )]
    pub fn tick<F>(&mut self, input: TickInput<'_>, detect: F) -> TickSnapshot
    where
        F: FnOnce() -> Vec<Marker>,
    {
        if self.outcome.is_some() {
            return self.snapshot(false, None, None);
        }

        self.apply_events(input.events);
        if self.abort_counter <= 0 {
            self.terminate(SessionOutcome::Aborted);
            return self.snapshot(false, None, self.outcome);
        }

        let markers = detect();
        if markers.len() > 1 {
            self.sink.warn(format_args!(
                "{} markers detected, using the first",
                markers.len()
            ));
        }
        let marker = markers.first();
        let detected = marker.is_some();

        let on_window = self.params.in_window(self.progress);
        if let Some(m) = marker.filter(|_| on_window && self.gate) {
            self.collector
                .push_reference(ReferencePoint::from_marker(m, input.timestamp));
        }

        self.collector.push_pupil(input.pupil);

        if on_window && detected && self.gate && !input.fixations.is_empty() {
            let boosted = self
                .progress
                .saturating_add(self.params.fixation_boost)
                .min(self.params.window_end());
            log::trace!("fixation boost {} -> {}", self.progress, boosted);
            self.progress = boosted;
        }

        let mut outcome = None;
        if self.progress < self.params.ceiling() {
            if (detected && self.gate) || !on_window {
                self.progress += 1;
            }
        } else {
            self.gate = false;
            self.progress = 0;
            match self.sites.pop_front() {
                Some(site) => {
                    self.active_site = Some(site);
                    self.site_number += 1;
                    self.sink.debug(format_args!(
                        "moving screen marker to site at {} {}",
                        site.target.x, site.target.y
                    ));
                }
                None => {
                    self.terminate(SessionOutcome::Completed);
                    outcome = self.outcome;
                }
            }
        }

        let marker_position = marker.map(|m| m.normalized_position);
        self.snapshot(on_window, marker_position, outcome)
    }

    fn apply_events(&mut self, events: LatchedInput) {
        if events.cancel {
            self.abort_counter = 0;
        }
        if events.clicks > 0 {
            let clicks = i32::try_from(events.clicks).unwrap_or(i32::MAX);
            self.abort_counter = self.abort_counter.saturating_sub(clicks);
        }
        if events.ready {
            self.gate = true;
        }
    }

    fn terminate(&mut self, outcome: SessionOutcome) {
        self.outcome = Some(outcome);
        self.active_site = None;
        self.sink.info(format_args!(
            "calibration session {:?} with {} reference points and {} pupil samples",
            outcome,
            self.collector.ref_count(),
            self.collector.samples().pupil_list.len()
        ));
    }

    fn phase(&self) -> Phase {
        if self.progress <= self.params.lead_in {
            Phase::LeadIn
        } else if self.progress < self.params.window_end() {
            Phase::Sampling
        } else {
            Phase::LeadOut
        }
    }

    fn snapshot(
        &self,
        on_window: bool,
        marker_position: Option<Point2<f32>>,
        outcome: Option<SessionOutcome>,
    ) -> TickSnapshot {
        let detected = marker_position.is_some();
        let feedback = if detected && on_window && self.gate {
            MarkerFeedback::Sampling
        } else if detected {
            MarkerFeedback::Detected
        } else {
            MarkerFeedback::NotDetected
        };
        let status_text = match self.active_site {
            Some(_) => format!("{} / {}", self.site_number, self.total_sites),
            None => format!("{} / {}", self.total_sites, self.total_sites),
        };
        TickSnapshot {
            progress: self.progress,
            phase: self.phase(),
            on_window,
            detected,
            marker_position,
            participant_gate: self.gate,
            active_site: self.active_site,
            site_number: self.site_number,
            total_sites: self.total_sites,
            feedback,
            alpha: marker_alpha(self.progress, &self.params),
            abort_clicks_remaining: (self.abort_counter < self.params.abort_limit)
                .then_some(self.abort_counter.max(0)),
            status_text,
            outcome,
        }
    }
}
