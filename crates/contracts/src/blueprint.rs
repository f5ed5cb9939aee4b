//! ForkBlueprint - Config Loader output
//!
//! Describes a complete fan-out tree: the root fork, its failure policy and its targets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::FailurePolicy;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete fan-out blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForkBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Root fork settings
    #[serde(default)]
    #[validate(nested)]
    pub fork: ForkSettings,

    /// Downstream targets of the root fork
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// Settings of the root fork
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForkSettings {
    /// Name used in logs and metrics
    #[serde(default = "default_fork_name")]
    #[validate(length(min = 1))]
    pub name: String,

    /// Failure policy
    #[serde(default)]
    pub policy: FailurePolicy,
}

impl Default for ForkSettings {
    fn default() -> Self {
        Self {
            name: default_fork_name(),
            policy: FailurePolicy::default(),
        }
    }
}

fn default_fork_name() -> String {
    "fork".to_string()
}

/// Sink output config
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Command queue capacity of the sink worker
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Failure policy (fork only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<FailurePolicy>,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Child targets (fork only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

fn default_queue_capacity() -> usize {
    16
}

impl SinkConfig {
    /// Create a config with default capacity and no params
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            queue_capacity: default_queue_capacity(),
            policy: None,
            params: HashMap::new(),
            sinks: Vec::new(),
        }
    }

    /// Add a type specific parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Number of leaf targets below this config
    pub fn leaf_count(&self) -> usize {
        match self.sink_type {
            SinkType::Fork => self.sinks.iter().map(SinkConfig::leaf_count).sum(),
            _ => 1,
        }
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// File output
    File,
    /// Network output (TCP)
    Network,
    /// In-memory buffer
    ///
    /// Built from a config file nothing can read the buffer back, so the
    /// sink acts as a counting black hole. Only `MemorySink::new` hands out
    /// the control that inspects it.
    Memory,
    /// Nested fan-out
    Fork,
}

impl ForkBlueprint {
    /// Number of leaf targets in the whole tree
    pub fn leaf_count(&self) -> usize {
        self.sinks.iter().map(SinkConfig::leaf_count).sum()
    }
}
