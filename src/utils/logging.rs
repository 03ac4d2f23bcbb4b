use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

use crate::models::config::LoggingConfig;
use crate::utils::error::LoggingError;
use crate::utils::rotation::FileRotator;

/// Initialize the logger with custom formatting.
///
/// Logs go to a rotating file when a log path is configured, to stderr otherwise.
pub fn init_logger(config: &LoggingConfig) -> Result<(), LoggingError> {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, get_log_level(&config.level));

    if let Some(policy) = &config.rotation {
        let path = policy.active_file();
        let rotator = FileRotator::open(policy.clone())
            .map_err(|source| LoggingError::OpenFile { path, source })?;
        builder.target(Target::Pipe(Box::new(rotator)));
    } else {
        builder.target(Target::Stderr);
    }

    builder.try_init().map_err(|_| LoggingError::AlreadyInitialized)
}

/// Get log level from string
pub fn get_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" | "err" | "critical" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered_by_verbosity() {
        let names = ["off", "critical", "warning", "info", "debug", "trace"];
        let levels: Vec<LevelFilter> = names.iter().map(|n| get_log_level(n)).collect();
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        assert_eq!(get_log_level("chatty"), LevelFilter::Info);
        assert_eq!(get_log_level("DEBUG"), LevelFilter::Debug);
    }
}
