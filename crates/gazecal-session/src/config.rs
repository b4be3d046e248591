//! Session configuration and the per-session parameter snapshot.

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use gazecal_marker::DetectorConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const SAMPLE_DURATION_RANGE: RangeInclusive<u32> = 10..=100;
pub const MARKER_SCALE_RANGE: RangeInclusive<f32> = 0.5..=2.0;
/// Upper bound for `lead_in` and `lead_out`.
pub const MAX_LEAD_FRAMES: u32 = 1000;

/// What the collected samples are handed to at the end of a session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Nine shuffled sites, result goes to the calibration fit.
    #[default]
    Calibration,
    /// Five fixed sites, result goes to the accuracy evaluation.
    Accuracy,
}

/// User-facing calibration settings.
///
/// Changes made while a session runs take effect at the next start; the
/// session works on a [`SessionParams`] snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub monitor_index: usize,
    pub fullscreen: bool,
    pub marker_scale: f32,
    /// Frames in the scored sampling window.
    pub sample_duration: u32,
    pub lead_in: u32,
    pub lead_out: u32,
    /// Pointer clicks needed to cancel a running session.
    pub abort_limit: i32,
    pub pupil_confidence_threshold: f32,
    pub run_mode: RunMode,
    pub detector: DetectorConfig,
    /// Fixed seed for the site shuffle; fresh entropy when absent.
    pub shuffle_seed: Option<u64>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            monitor_index: 0,
            fullscreen: true,
            marker_scale: 1.0,
            sample_duration: 40,
            lead_in: 25,
            lead_out: 5,
            abort_limit: 5,
            pupil_confidence_threshold: 0.6,
            run_mode: RunMode::Calibration,
            detector: DetectorConfig::default(),
            shuffle_seed: None,
        }
    }
}

impl CalibrationConfig {
    /// Load a JSON config from disk and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_sample_duration(self.sample_duration)?;
        check_marker_scale(self.marker_scale)?;
        if self.lead_in == 0 {
            return Err(ConfigError::ZeroLeadIn);
        }
        check_lead_frames("lead_in", self.lead_in)?;
        check_lead_frames("lead_out", self.lead_out)?;
        if self.abort_limit <= 0 {
            return Err(ConfigError::AbortLimit(self.abort_limit));
        }
        let t = self.pupil_confidence_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::ConfidenceThreshold(t));
        }
        Ok(())
    }

    pub fn set_sample_duration(&mut self, frames: u32) -> Result<(), ConfigError> {
        check_sample_duration(frames)?;
        self.sample_duration = frames;
        Ok(())
    }

    pub fn set_marker_scale(&mut self, scale: f32) -> Result<(), ConfigError> {
        check_marker_scale(scale)?;
        self.marker_scale = scale;
        Ok(())
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.run_mode = mode;
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    pub fn set_monitor_index(&mut self, index: usize) {
        self.monitor_index = index;
    }

    pub fn session_params(&self) -> SessionParams {
        SessionParams::from_config(self)
    }
}

fn check_sample_duration(value: u32) -> Result<(), ConfigError> {
    if SAMPLE_DURATION_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::SampleDuration {
            value,
            range: SAMPLE_DURATION_RANGE,
        })
    }
}

fn check_lead_frames(name: &'static str, value: u32) -> Result<(), ConfigError> {
    if value <= MAX_LEAD_FRAMES {
        Ok(())
    } else {
        Err(ConfigError::LeadFrames {
            name,
            value,
            max: MAX_LEAD_FRAMES,
        })
    }
}

fn check_marker_scale(value: f32) -> Result<(), ConfigError> {
    if MARKER_SCALE_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::MarkerScale {
            value,
            range: MARKER_SCALE_RANGE,
        })
    }
}

/// Timing and filtering parameters frozen for one session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub lead_in: u32,
    pub sample_duration: u32,
    pub lead_out: u32,
    pub fixation_boost: u32,
    pub abort_limit: i32,
    pub pupil_confidence_threshold: f32,
}

impl SessionParams {
    pub fn from_config(cfg: &CalibrationConfig) -> Self {
        Self {
            lead_in: cfg.lead_in,
            sample_duration: cfg.sample_duration,
            lead_out: cfg.lead_out,
            fixation_boost: cfg.sample_duration / 2,
            abort_limit: cfg.abort_limit,
            pupil_confidence_threshold: cfg.pupil_confidence_threshold,
        }
    }

    /// Last counter value (exclusive) of the sampling window.
    #[inline]
    pub fn window_end(&self) -> u32 {
        self.lead_in.saturating_add(self.sample_duration)
    }

    /// Counter value at which the active site is finished.
    #[inline]
    pub fn ceiling(&self) -> u32 {
        self.window_end().saturating_add(self.lead_out)
    }

    #[inline]
    pub fn in_window(&self, progress: u32) -> bool {
        self.lead_in < progress && progress < self.window_end()
    }
}

impl Default for SessionParams {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}
