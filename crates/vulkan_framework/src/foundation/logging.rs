//! Logging setup on top of `env_logger`

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence; `default_level` applies when it is unset.
pub fn init(default_level: log::LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // A second init (tests, embedding apps) keeps the first logger.
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

/// Parse a textual log level, defaulting to `Info` for unknown values
pub fn level_from_str(level: &str) -> log::LevelFilter {
    level.parse().unwrap_or(log::LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(level_from_str("debug"), log::LevelFilter::Debug);
        assert_eq!(level_from_str("WARN"), log::LevelFilter::Warn);
        assert_eq!(level_from_str("nonsense"), log::LevelFilter::Info);
    }

    #[test]
    fn test_double_init_is_harmless() {
        init(log::LevelFilter::Warn);
        init(log::LevelFilter::Debug);
    }
}
