use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load env file {path}: {source}")]
    EnvFileLoad {
        path: PathBuf,
        source: dotenv::Error,
    },

    #[error("Missing required variable: {name}")]
    MissingVariable { name: &'static str },

    #[error("Invalid value for {name}: {value} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}
