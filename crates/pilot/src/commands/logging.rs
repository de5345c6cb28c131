//! Logging initialization.
//!
//! Logs go to a file in the platform state directory unless `--verbose` asks
//! for them on stderr.

use pilot_util::log::{self, LogConfig};
use pilot_util::LogLevel;
use std::path::PathBuf;

/// Initialize logging. Returns the log file path if logging to file.
pub fn init_logging(verbose: bool, level: Option<LogLevel>) -> Option<PathBuf> {
    let level = if verbose {
        LogLevel::Debug
    } else {
        level.unwrap_or_default()
    };

    log::init(LogConfig {
        print: verbose,
        level,
        include_location: verbose,
        file: None,
    })
}

/// Read `log_level` from the project configuration without failing.
///
/// Logging is set up before the configuration is loaded for real, so a broken
/// configuration still gets reported through the log.
pub async fn configured_level(root: &std::path::Path) -> Option<LogLevel> {
    pilot_core::Config::load(Some(root))
        .await
        .ok()
        .and_then(|(config, _)| config.log_level)
}
