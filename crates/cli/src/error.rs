//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Building the fork from the configuration failed
    #[error("Failed to build fork: {0}")]
    Build(#[from] fanout::ForkError),

    /// The run ended on a failure
    #[error("Run failed: {reason}")]
    RunFailed { reason: String },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn run_failed(reason: impl Into<String>) -> Self {
        Self::RunFailed {
            reason: reason.into(),
        }
    }
}

/// Fail early with a clear message when the configuration file is missing
pub fn ensure_config_exists(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::config_not_found(path))
    }
}
