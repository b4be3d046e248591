//! Collaborators that receive the collected samples when a session ends.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::collector::CollectedSamples;
use crate::config::RunMode;
use crate::error::FinishError;
use crate::session::SessionOutcome;

/// Receives the session result exactly once, keyed by run mode.
pub trait SessionFinisher {
    fn finish_calibration(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError>;

    fn finish_accuracy_test(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError>;

    /// Dispatch on `mode`.
    fn finish(
        &mut self,
        mode: RunMode,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        match mode {
            RunMode::Calibration => self.finish_calibration(outcome, samples),
            RunMode::Accuracy => self.finish_accuracy_test(outcome, samples),
        }
    }
}

#[derive(Serialize)]
struct SampleReport<'a> {
    outcome: SessionOutcome,
    ref_count: usize,
    pupil_count: usize,
    #[serde(flatten)]
    samples: &'a CollectedSamples,
}

/// Writes `calibration_samples.json` or `accuracy_samples.json` into a
/// directory.
#[derive(Clone, Debug)]
pub struct JsonReportFinisher {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl JsonReportFinisher {
    pub const CALIBRATION_FILE: &'static str = "calibration_samples.json";
    pub const ACCURACY_FILE: &'static str = "accuracy_samples.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reports written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write(
        &mut self,
        file: &str,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        fs::create_dir_all(&self.dir)?;
        let report = SampleReport {
            outcome,
            ref_count: samples.ref_list.len(),
            pupil_count: samples.pupil_list.len(),
            samples,
        };
        let path = self.dir.join(file);
        fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        log::info!("wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

impl SessionFinisher for JsonReportFinisher {
    fn finish_calibration(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        self.write(Self::CALIBRATION_FILE, outcome, samples)
    }

    fn finish_accuracy_test(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        self.write(Self::ACCURACY_FILE, outcome, samples)
    }
}

/// One recorded handoff.
#[derive(Clone, Debug, PartialEq)]
pub struct Handoff {
    pub mode: RunMode,
    pub outcome: SessionOutcome,
    pub samples: CollectedSamples,
}

/// Keeps every handoff in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryFinisher {
    pub handoffs: Vec<Handoff>,
}

impl SessionFinisher for MemoryFinisher {
    fn finish_calibration(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        self.handoffs.push(Handoff {
            mode: RunMode::Calibration,
            outcome,
            samples: samples.clone(),
        });
        Ok(())
    }

    fn finish_accuracy_test(
        &mut self,
        outcome: SessionOutcome,
        samples: &CollectedSamples,
    ) -> Result<(), FinishError> {
        self.handoffs.push(Handoff {
            mode: RunMode::Accuracy,
            outcome,
            samples: samples.clone(),
        });
        Ok(())
    }
}
