//! Process logger for binaries.
//!
//! Libraries never install a logger themselves; they report through a
//! [`crate::DiagnosticSink`], whose default forwards to the `log` facade.
//! Both loggers here write to stderr so that stdout stays free for results.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

use crate::diagnostics::LOG_TARGET;

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f64();
        let mut out = std::io::stderr().lock();
        // diagnostics from the sink carry the shared target; module targets are shown
        let _ = if record.target() == LOG_TARGET {
            writeln!(out, "[{secs:7.3}s {:>5}] {}", record.level(), record.args())
        } else {
            writeln!(
                out,
                "[{secs:7.3}s {:>5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger at `level`.
///
/// Only the first call installs; later calls return `Ok(())` and keep the
/// original level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber on stderr, filtered by `RUST_LOG`
/// (default `info`). `log` records are bridged into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_with_level(LevelFilter::Warn).expect("first install");
        init_with_level(LevelFilter::Trace).expect("later calls succeed");
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
