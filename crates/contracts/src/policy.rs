//! Failure policy of a fan-out sink

use serde::{Deserialize, Serialize};

/// What a fan-out sink does when one of its targets fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the first failure of an operation to the producer and drop the failed targets
    #[default]
    Strict,
    /// Never report failures, only drop the failed targets
    #[serde(alias = "ignore_errors")]
    Permissive,
}

impl FailurePolicy {
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}
