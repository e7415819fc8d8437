//! Command line arguments shared by every viewer

use clap::Args;
use std::path::PathBuf;
use vulkan_framework::config::Config;
use vulkan_framework::foundation::logging;
use vulkan_framework::{AppConfig, AppError};

/// Options every viewer accepts
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Configuration file (.toml or .ron)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CommonArgs {
    /// Start logging at the requested level
    pub fn init_logging(&self) {
        logging::init(logging::level_from_str(&self.log_level));
    }

    /// Load `--config` if given, otherwise defaults titled `title`
    pub fn app_config(&self, title: &str) -> Result<AppConfig, AppError> {
        match &self.config {
            Some(path) => {
                log::info!("Loading configuration from {:?}", path);
                Ok(AppConfig::load_from_file(path)?)
            }
            None => Ok(AppConfig::new(title)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["viewer"]);
        assert!(cli.common.config.is_none());
        assert_eq!(cli.common.log_level, "info");

        let config = cli.common.app_config("Viewer").unwrap();
        assert_eq!(config.window.title, "Viewer");
    }

    #[test]
    fn test_config_file_is_loaded() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/viewer.toml");
        let cli = TestCli::parse_from(["viewer", "--config", path, "--log-level", "debug"]);
        assert_eq!(cli.common.log_level, "debug");

        let config = cli.common.app_config("ignored").unwrap();
        assert_eq!(config.window.title, "OBJ Viewer");
        assert_eq!(config.window.width, 1280);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_config_file() {
        let cli = TestCli::parse_from(["viewer", "--config", "nowhere/viewer.toml"]);
        assert!(matches!(cli.common.app_config("x"), Err(AppError::Config(_))));
    }
}
