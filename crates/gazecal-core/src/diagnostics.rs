//! Explicit logging capability handed to detectors and the session.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::Level;

/// Log target used by [`LogSink`].
pub const LOG_TARGET: &str = "gazecal";

/// Destination for detector and session diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, level: Level, message: fmt::Arguments<'_>);

    fn warn(&self, message: fmt::Arguments<'_>) {
        self.record(Level::Warn, message);
    }

    fn info(&self, message: fmt::Arguments<'_>) {
        self.record(Level::Info, message);
    }

    fn debug(&self, message: fmt::Arguments<'_>) {
        self.record(Level::Debug, message);
    }
}

/// Forwards to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, level: Level, message: fmt::Arguments<'_>) {
        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _level: Level, _message: fmt::Arguments<'_>) {}
}

/// Keeps every message in memory. Useful to assert on surfaced warnings.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages recorded at `Warn` level.
    pub fn warnings(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, msg)| msg)
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, level: Level, message: fmt::Arguments<'_>) {
        let text = message.to_string();
        match self.records.lock() {
            Ok(mut guard) => guard.push((level, text)),
            Err(poisoned) => poisoned.into_inner().push((level, text)),
        }
    }
}

/// Shared handle type used throughout the workspace.
pub type SharedSink = Arc<dyn DiagnosticSink>;

/// The default sink: the `log` facade.
pub fn default_sink() -> SharedSink {
    Arc::new(LogSink)
}
