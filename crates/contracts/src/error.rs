//! Layered error definitions
//!
//! Categorized by source: config / sink / general

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink flush / close error
    #[error("sink '{sink_name}' close error: {message}")]
    SinkClose { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Operation issued after the sink was closed
    #[error("sink '{sink_name}' is closed")]
    SinkClosed { sink_name: String },

    /// Failure reported out of band, outside any write or close
    #[error("sink '{sink_name}' fault: {message}")]
    SinkFault { sink_name: String, message: String },

    /// Worker task of a sink stopped before acknowledging a command
    #[error("sink '{sink_name}' worker is gone")]
    WorkerGone { sink_name: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink close error
    pub fn sink_close(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkClose {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_closed(sink_name: impl Into<String>) -> Self {
        Self::SinkClosed {
            sink_name: sink_name.into(),
        }
    }

    /// Create out-of-band sink fault
    pub fn sink_fault(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkFault {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn worker_gone(sink_name: impl Into<String>) -> Self {
        Self::WorkerGone {
            sink_name: sink_name.into(),
        }
    }

    /// Name of the sink the error originated from, if any
    pub fn sink_name(&self) -> Option<&str> {
        match self {
            Self::SinkWrite { sink_name, .. }
            | Self::SinkClose { sink_name, .. }
            | Self::SinkConnection { sink_name, .. }
            | Self::SinkClosed { sink_name }
            | Self::SinkFault { sink_name, .. }
            | Self::WorkerGone { sink_name } => Some(sink_name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_error_display() {
        let err = ContractError::sink_write("disk", "no space left");
        assert_eq!(err.to_string(), "sink 'disk' write error: no space left");
        assert_eq!(err.sink_name(), Some("disk"));
    }

    #[test]
    fn test_config_error_has_no_sink_name() {
        let err = ContractError::config_validation("sinks[0].name", "empty");
        assert_eq!(err.sink_name(), None);
    }
}
