//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, ConfigOverrides};
use tokio::io::BufReader;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::{ensure_config_exists, CliError};
use crate::pipeline::{Pipeline, PipelineConfig, ReadMode};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    ensure_config_exists(&args.config)?;

    let overrides = ConfigOverrides {
        policy: args.policy.map(Into::into),
        fork_name: None,
        queue_capacity: args
            .queue_capacity
            .map(|capacity| usize::try_from(capacity).unwrap_or(usize::MAX)),
    };
    if !overrides.is_empty() {
        info!(?overrides, "Applying CLI overrides");
    }

    let blueprint = ConfigLoader::load_with_overrides(&args.config, &overrides)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        fork = %blueprint.fork.name,
        policy = %blueprint.fork.policy,
        sinks = blueprint.sinks.len(),
        leaves = blueprint.leaf_count(),
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let fork = fanout::ForkBuilder::new(blueprint)
        .build()
        .await
        .map_err(CliError::from)?;

    let config = PipelineConfig {
        mode: if args.lines {
            ReadMode::Lines
        } else {
            ReadMode::Bytes(usize::try_from(args.chunk_size).unwrap_or(usize::MAX))
        },
        keep_going: args.keep_going,
    };

    info!("Reading standard input...");
    let stats = Pipeline::new(fork, config)
        .run(BufReader::new(tokio::io::stdin()), shutdown_signal())
        .await;

    info!(
        reason = %stats.stop_reason,
        writes = stats.dispatch.total_writes(),
        failed = stats.dispatch.writes_failed,
        bytes = stats.dispatch.bytes,
        duration_secs = stats.duration.as_secs_f64(),
        "Run finished"
    );
    stats.print_summary();

    if stats.is_failure() {
        let reason = if stats.close_ok {
            stats.stop_reason.to_string()
        } else {
            format!("{} (close failed)", stats.stop_reason)
        };
        return Err(CliError::run_failed(reason).into());
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal");
}
