//! Configuration parsing and rendering
//!
//! TOML (primary) and JSON formats.

use std::path::Path;

use contracts::{ContractError, ForkBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Infer the format of a configuration file from its path
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "cannot determine config format of {}",
                path.display()
            ))
        })?;
        Self::from_extension(ext)
            .ok_or_else(|| ContractError::config_parse(format!("unsupported config format: .{ext}")))
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<ForkBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<ForkBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse configuration in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<ForkBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

/// Render a blueprint in the given format
pub fn render(blueprint: &ForkBlueprint, format: ConfigFormat) -> Result<String, ContractError> {
    match format {
        ConfigFormat::Toml => toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}"))),
        ConfigFormat::Json => serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FailurePolicy, SinkType};

    #[test]
    fn test_parse_toml_nested() {
        let content = r#"
[fork]
name = "tee"
policy = "permissive"

[[sinks]]
name = "log"
sink_type = "log"

[[sinks]]
name = "mirror"
sink_type = "fork"
policy = "strict"

[[sinks.sinks]]
name = "copy"
sink_type = "file"
params = { path = "/tmp/copy.log" }
"#;
        let blueprint = parse_toml(content).unwrap();
        assert_eq!(blueprint.fork.name, "tee");
        assert_eq!(blueprint.fork.policy, FailurePolicy::Permissive);
        assert_eq!(blueprint.sinks.len(), 2);
        assert_eq!(blueprint.sinks[1].sink_type, SinkType::Fork);
        assert_eq!(blueprint.sinks[1].policy, Some(FailurePolicy::Strict));
        assert_eq!(
            blueprint.sinks[1].sinks[0].params.get("path").map(String::as_str),
            Some("/tmp/copy.log")
        );
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "fork": { "policy": "ignore_errors" },
            "sinks": [{ "name": "log", "sink_type": "log", "queue_capacity": 4 }]
        }"#;
        let blueprint = parse_json(content).unwrap();
        assert_eq!(blueprint.fork.policy, FailurePolicy::Permissive);
        assert_eq!(blueprint.sinks[0].queue_capacity, 4);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_sink_type() {
        let content = r#"
[[sinks]]
name = "x"
sink_type = "carrier_pigeon"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
