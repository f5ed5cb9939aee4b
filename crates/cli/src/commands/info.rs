//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::{ForkBlueprint, SinkConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    fork: String,
    policy: String,
    leaf_count: usize,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");
    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &ForkBlueprint, args: &InfoArgs) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        fork: blueprint.fork.name.clone(),
        policy: blueprint.fork.policy.to_string(),
        leaf_count: blueprint.leaf_count(),
        sinks: blueprint
            .sinks
            .iter()
            .map(|sink| sink_info(sink, args.params))
            .collect(),
    }
}

fn sink_info(sink: &SinkConfig, with_params: bool) -> SinkInfo {
    SinkInfo {
        name: sink.name.clone(),
        sink_type: format!("{:?}", sink.sink_type),
        queue_capacity: sink.queue_capacity,
        policy: sink.policy.map(|p| p.to_string()),
        params: if with_params {
            sink.params.clone().into_iter().collect()
        } else {
            BTreeMap::new()
        },
        sinks: sink
            .sinks
            .iter()
            .map(|child| sink_info(child, with_params))
            .collect(),
    }
}

fn print_config_info(blueprint: &ForkBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  ForkSink Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🔀 Fork");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", blueprint.fork.name);
    println!("   ├─ Policy: {}", blueprint.fork.policy);
    println!("   └─ Leaf targets: {}", blueprint.leaf_count());

    println!("\n📤 Sinks ({})", blueprint.sinks.len());
    print_sinks(&blueprint.sinks, "   ", args.params);
    println!();
}

fn print_sinks(sinks: &[SinkConfig], indent: &str, with_params: bool) {
    for (i, sink) in sinks.iter().enumerate() {
        let is_last = i == sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_indent = format!("{}{}", indent, if is_last { "   " } else { "│  " });

        match sink.policy {
            Some(policy) => println!(
                "{}{} {} ({:?}, {})",
                indent, prefix, sink.name, sink.sink_type, policy
            ),
            None => println!("{}{} {} ({:?})", indent, prefix, sink.name, sink.sink_type),
        }

        if with_params {
            let params: BTreeMap<_, _> = sink.params.iter().collect();
            for (key, value) in params {
                println!("{}   {} = {}", child_indent, key, value);
            }
        }

        print_sinks(&sink.sinks, &child_indent, with_params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FailurePolicy, SinkType};

    #[test]
    fn test_nested_info() {
        let mut mirror = SinkConfig::new("mirror", SinkType::Fork);
        mirror.policy = Some(FailurePolicy::Permissive);
        mirror.sinks = vec![SinkConfig::new("copy", SinkType::File).with_param("path", "/tmp/c")];

        let blueprint = ForkBlueprint {
            version: Default::default(),
            fork: Default::default(),
            sinks: vec![SinkConfig::new("log", SinkType::Log), mirror],
        };
        let args = InfoArgs {
            config: "fork.toml".into(),
            json: true,
            params: true,
        };

        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.leaf_count, 2);
        assert_eq!(info.sinks[1].policy.as_deref(), Some("permissive"));
        assert_eq!(info.sinks[1].sinks[0].params["path"], "/tmp/c");

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["sinks"][0].get("params").is_none());
    }
}
