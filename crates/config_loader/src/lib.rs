//! # Config Loader
//!
//! Turns a TOML or JSON fork description into a validated [`ForkBlueprint`].
//! Command-line adjustments ([`ConfigOverrides`]) are applied before
//! validation, so an override can never produce a blueprint the file itself
//! would have been rejected for.
//!
//! ```no_run
//! use config_loader::{ConfigLoader, ConfigOverrides};
//! use contracts::FailurePolicy;
//! use std::path::Path;
//!
//! let overrides = ConfigOverrides {
//!     policy: Some(FailurePolicy::Permissive),
//!     ..Default::default()
//! };
//! let blueprint = ConfigLoader::load_with_overrides(Path::new("fork.toml"), &overrides)?;
//! println!("{} leaf targets", blueprint.leaf_count());
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod validator;

pub use contracts::ForkBlueprint;
pub use parser::ConfigFormat;

use std::path::Path;

use contracts::{ContractError, FailurePolicy, SinkConfig};

/// Adjustments layered over a configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replaces the root fork's policy; nested forks keep their own
    pub policy: Option<FailurePolicy>,
    /// Replaces the root fork's name
    pub fork_name: Option<String>,
    /// Replaces the queue capacity of every sink in the tree
    pub queue_capacity: Option<usize>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, blueprint: &mut ForkBlueprint) {
        if let Some(policy) = self.policy {
            blueprint.fork.policy = policy;
        }
        if let Some(name) = &self.fork_name {
            blueprint.fork.name = name.clone();
        }
        if let Some(capacity) = self.queue_capacity {
            set_queue_capacity(&mut blueprint.sinks, capacity);
        }
    }
}

fn set_queue_capacity(sinks: &mut [SinkConfig], capacity: usize) {
    for sink in sinks {
        sink.queue_capacity = capacity;
        set_queue_capacity(&mut sink.sinks, capacity);
    }
}

/// Entry point for reading and writing fork configurations
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a file as written, format taken from its extension
    pub fn load_from_path(path: &Path) -> Result<ForkBlueprint, ContractError> {
        Self::load_with_overrides(path, &ConfigOverrides::default())
    }

    /// Load a file, apply `overrides`, then validate the result
    pub fn load_with_overrides(
        path: &Path,
        overrides: &ConfigOverrides,
    ) -> Result<ForkBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;

        let mut blueprint = parser::parse(&content, format)?;
        overrides.apply(&mut blueprint);
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ForkBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Serialize a blueprint; loading the output yields an equivalent tree
    pub fn render(blueprint: &ForkBlueprint, format: ConfigFormat) -> Result<String, ContractError> {
        parser::render(blueprint, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;
    use std::io::Write;

    const NESTED_TOML: &str = r#"
[fork]
name = "tee"

[[sinks]]
name = "console"
sink_type = "log"
queue_capacity = 4

[[sinks]]
name = "mirror"
sink_type = "fork"
policy = "permissive"

[[sinks.sinks]]
name = "copy"
sink_type = "file"
params = { path = "/tmp/forksink-copy.log", append = "false" }
"#;

    fn config_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_overrides_touch_root_policy_only() {
        let file = config_file(NESTED_TOML, ".toml");
        let overrides = ConfigOverrides {
            policy: Some(FailurePolicy::Permissive),
            fork_name: Some("renamed".to_string()),
            queue_capacity: None,
        };

        let blueprint = ConfigLoader::load_with_overrides(file.path(), &overrides).unwrap();
        assert_eq!(blueprint.fork.name, "renamed");
        assert_eq!(blueprint.fork.policy, FailurePolicy::Permissive);
        assert_eq!(blueprint.sinks[1].policy, Some(FailurePolicy::Permissive));
        assert_eq!(blueprint.sinks[0].queue_capacity, 4);
    }

    #[test]
    fn test_queue_capacity_override_reaches_nested_sinks() {
        let mut blueprint = ConfigLoader::load_from_str(NESTED_TOML, ConfigFormat::Toml).unwrap();
        ConfigOverrides {
            queue_capacity: Some(64),
            ..Default::default()
        }
        .apply(&mut blueprint);

        assert_eq!(blueprint.sinks[0].queue_capacity, 64);
        assert_eq!(blueprint.sinks[1].queue_capacity, 64);
        assert_eq!(blueprint.sinks[1].sinks[0].queue_capacity, 64);
    }

    #[test]
    fn test_overrides_are_validated() {
        let file = config_file(NESTED_TOML, ".toml");
        let overrides = ConfigOverrides {
            queue_capacity: Some(0),
            ..Default::default()
        };

        let result = ConfigLoader::load_with_overrides(file.path(), &overrides);
        assert!(matches!(result, Err(ContractError::ConfigValidation { .. })));
    }

    #[test]
    fn test_empty_overrides() {
        assert!(ConfigOverrides::default().is_empty());
        assert!(!ConfigOverrides {
            fork_name: Some("x".into()),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_render_keeps_nesting() {
        let blueprint = ConfigLoader::load_from_str(NESTED_TOML, ConfigFormat::Toml).unwrap();

        for format in [ConfigFormat::Toml, ConfigFormat::Json] {
            let rendered = ConfigLoader::render(&blueprint, format).unwrap();
            let reloaded = ConfigLoader::load_from_str(&rendered, format).unwrap();
            assert_eq!(reloaded.leaf_count(), 2);
            assert_eq!(reloaded.sinks[1].sink_type, SinkType::Fork);
            assert_eq!(reloaded.sinks[1].sinks[0].params, blueprint.sinks[1].sinks[0].params);
        }
    }

    #[test]
    fn test_json_file_detected_by_extension() {
        let file = config_file(r#"{ "sinks": [{ "name": "m", "sink_type": "memory" }] }"#, ".json");
        let blueprint = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(blueprint.fork.name, "fork");
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ConfigLoader::load_from_path(Path::new("fork.yaml"));
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }
}
