//! Runner error types.

use thiserror::Error;
use wateremu_meter::ConfigError;
use wateremu_protocol::InvalidTariff;

/// Errors that stop the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration error: {0}")]
    Tariff(#[from] InvalidTariff),
}
