//! Minimal stderr backend for the `log` facade.
//!
//! The level comes from `COCOM_LOG` (`error`, `warn`, `info`, `debug`,
//! `trace`); unset or unrecognised values fall back to `info`.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;

pub const ENV_VAR: &str = "COCOM_LOG";

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl StderrLogger {
    const fn color_code(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = record.level();
        let mut stderr = std::io::stderr().lock();
        // a closed stderr is not worth failing over
        let _ = writeln!(
            stderr,
            "{}[{:<5}]\x1b[0m {}: {}",
            Self::color_code(level),
            level,
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Parse a level name, case-insensitively.
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    value.trim().parse().ok()
}

/// Install the logger with the level taken from `COCOM_LOG`.
pub fn init() -> Result<(), log::SetLoggerError> {
    let level = std::env::var(ENV_VAR)
        .ok()
        .and_then(|v| parse_level(&v))
        .unwrap_or(LevelFilter::Info);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
