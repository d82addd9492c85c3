/// Structured logging for the frost risk service
///
/// Thin setup layer over `tracing`: a console formatter on stderr, an
/// optional append-only log file, and a few domain helpers so dropped
/// records and run summaries are reported the same way everywhere.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::model::DropReason;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Setup
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `min_level`. With `log_file` set, output
/// is appended to that file instead of stderr. Returns `Ok(false)` when a
/// subscriber was already installed (e.g. by a test harness).
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> std::io::Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_directive()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match (log_file, console_timestamps) {
        (Some(path), _) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok()
        }
        (None, true) => builder.with_writer(std::io::stderr).try_init().is_ok(),
        (None, false) => builder
            .without_time()
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    };
    Ok(installed)
}

// ---------------------------------------------------------------------------
// Domain Logging Helpers
// ---------------------------------------------------------------------------

/// Records a raw record excluded during normalization. Partial upstream data
/// is normal, so this is debug-level.
pub fn log_dropped_record(station: Option<&str>, reason: DropReason) {
    debug!(station = station.unwrap_or("-"), %reason, "dropped raw record");
}

/// Logs the outcome of one pipeline run.
pub fn log_pipeline_summary(raw_records: usize, kept: usize, hourly: usize, days: usize) {
    let dropped = raw_records.saturating_sub(kept);
    if hourly == 0 {
        warn!(raw_records, dropped, "frost risk run produced no hourly records");
    } else {
        info!(
            raw_records,
            dropped,
            hourly,
            days,
            "frost risk run complete: {}/{} records usable",
            kept,
            raw_records
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" info ".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_directives_round_trip() {
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warning, LogLevel::Error] {
            assert_eq!(level.as_directive().parse::<LogLevel>(), Ok(level));
        }
    }
}
