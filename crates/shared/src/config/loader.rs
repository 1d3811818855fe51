//! Configuration loader
//!
//! Loads configuration from an optional `.env` file plus environment
//! variables, then validates it. Values from the `.env` file take precedence
//! over the inherited environment, which keeps local development overrides
//! out of the system environment.

use std::path::Path;

use super::dto::AppConfig;
use super::error::{ConfigError, Result};
use super::validator::validate_app_config;

/// Configuration loader
///
/// # Example
///
/// ```ignore
/// use printfleet_shared::config::ConfigLoader;
///
/// let loader = ConfigLoader::new(Some(".env".into()));
/// let config = loader.load()?;
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Optional path to a `.env` file
    env_file_path: Option<std::path::PathBuf>,
}

impl ConfigLoader {
    pub fn new(env_file_path: Option<std::path::PathBuf>) -> Self {
        Self { env_file_path }
    }

    /// Loads and validates the application configuration.
    pub fn load(&self) -> Result<AppConfig> {
        if let Some(path) = &self.env_file_path {
            self.load_env_file(path)?;
        }

        let config = AppConfig::from_env()?;
        validate_app_config(&config)?;

        Ok(config)
    }

    fn load_env_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(ConfigError::EnvFileLoad {
                path: path.to_path_buf(),
                source: dotenv::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path.display()),
                )),
            });
        }

        dotenv::from_path(path).map_err(|e| ConfigError::EnvFileLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }
}
