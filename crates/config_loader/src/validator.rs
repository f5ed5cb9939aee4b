//! Configuration validation
//!
//! Rules:
//! - field constraints derived on the blueprint types (non-empty names, queue capacity)
//! - sink names unique within one fork
//! - file sinks carry a `path`, network sinks a parseable `addr`
//! - fork sinks have at least one child; only fork sinks carry `policy` / `sinks`

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, ForkBlueprint, SinkConfig, SinkType};
use ::validator::{Validate, ValidationErrors};

/// Validate a ForkBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ForkBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(field_errors)?;
    validate_sinks("sinks", &blueprint.sinks)?;
    Ok(())
}

/// Flatten derive errors into the first offending field
fn field_errors(errors: ValidationErrors) -> ContractError {
    let message = errors.to_string();
    let field = message
        .split(':')
        .next()
        .unwrap_or("blueprint")
        .trim()
        .to_string();
    ContractError::config_validation(field, message)
}

/// Validate one level of sinks, then recurse into nested forks
fn validate_sinks(path: &str, sinks: &[SinkConfig]) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in sinks.iter().enumerate() {
        let field = format!("{}[{}]", path, idx);

        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("{}.name", field),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("{}[name={}]", path, sink.name),
                "duplicate sink name",
            ));
        }

        validate_sink(&field, sink)?;
    }
    Ok(())
}

fn validate_sink(field: &str, sink: &SinkConfig) -> Result<(), ContractError> {
    if sink.sink_type != SinkType::Fork {
        if sink.policy.is_some() {
            return Err(ContractError::config_validation(
                format!("{}.policy", field),
                "only fork sinks have a failure policy",
            ));
        }
        if !sink.sinks.is_empty() {
            return Err(ContractError::config_validation(
                format!("{}.sinks", field),
                "only fork sinks have child sinks",
            ));
        }
    }

    match sink.sink_type {
        SinkType::Log | SinkType::Memory => Ok(()),
        SinkType::File => {
            if sink.params.get("path").is_none_or(|p| p.is_empty()) {
                return Err(ContractError::config_validation(
                    format!("{}.params.path", field),
                    "file sink requires a path",
                ));
            }
            Ok(())
        }
        SinkType::Network => {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    format!("{}.params.addr", field),
                    "network sink requires an addr",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    format!("{}.params.addr", field),
                    format!("invalid address '{}': {}", addr, e),
                )
            })?;
            Ok(())
        }
        SinkType::Fork => {
            if sink.sinks.is_empty() {
                return Err(ContractError::config_validation(
                    format!("{}.sinks", field),
                    "fork sink needs at least one child",
                ));
            }
            validate_sinks(&format!("{}.sinks", field), &sink.sinks)
        }
    }
}
