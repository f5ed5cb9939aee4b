//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{FailurePolicy, ForkBlueprint, SinkConfig, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    fork: String,
    policy: String,
    sink_count: usize,
    leaf_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    fork: blueprint.fork.name.clone(),
                    policy: blueprint.fork.policy.to_string(),
                    sink_count: blueprint.sinks.len(),
                    leaf_count: blueprint.leaf_count(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ForkBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - input will be discarded".to_string());
    }

    if blueprint.fork.policy == FailurePolicy::Permissive {
        warnings.push(
            "Root fork is permissive - the run only stops once every sink failed".to_string(),
        );
    }

    collect_sink_warnings(&blueprint.sinks, &mut warnings);
    warnings
}

fn collect_sink_warnings(sinks: &[SinkConfig], warnings: &mut Vec<String>) {
    for sink in sinks {
        match sink.sink_type {
            SinkType::Memory => warnings.push(format!(
                "Sink '{}' keeps all data in memory and discards it on exit",
                sink.name
            )),
            SinkType::Fork => collect_sink_warnings(&sink.sinks, warnings),
            _ => {}
        }
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Fork: {}", summary.fork);
            println!("  Policy: {}", summary.policy);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Leaf targets: {}", summary.leaf_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let (_file, args) = args_for(
            r#"
[fork]
policy = "permissive"

[[sinks]]
name = "scratch"
sink_type = "memory"
"#,
        );

        let result = validate_config(&args);
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(result.summary.unwrap().leaf_count, 1);
    }

    #[test]
    fn test_invalid_config() {
        let (_file, args) = args_for(
            r#"
[[sinks]]
name = "copy"
sink_type = "file"
"#,
        );

        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("path"));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/fork.toml".into(),
            json: false,
        };
        assert!(run_validate(&args).is_err());
    }
}
