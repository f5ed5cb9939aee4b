//! ForkBuilder - assembles a fork tree from a blueprint

use futures::future::{BoxFuture, FutureExt};
use tracing::{info, info_span, instrument, Instrument};

use contracts::{ForkBlueprint, SinkConfig, SinkType};

use crate::error::ForkError;
use crate::fork::ForkSink;
use crate::handle::SinkHandle;
use crate::sinks::{FileSink, LogSink, MemorySink, NetworkSink};

/// Builder for creating a ForkSink from configuration
pub struct ForkBuilder {
    blueprint: ForkBlueprint,
}

impl ForkBuilder {
    /// Create a new ForkBuilder
    pub fn new(blueprint: ForkBlueprint) -> Self {
        Self { blueprint }
    }

    /// Connect every target and build the root fork
    #[instrument(
        name = "fork_builder_build",
        skip(self),
        fields(fork = %self.blueprint.fork.name, sink_count = self.blueprint.sinks.len())
    )]
    pub async fn build(self) -> Result<ForkSink, ForkError> {
        let handles = initialize_handles(&self.blueprint.sinks).await?;
        let settings = self.blueprint.fork;

        info!(targets = handles.len(), policy = %settings.policy, "Fork assembled");
        Ok(ForkSink::new(settings.name, handles, settings.policy))
    }
}

/// Create handles for `configs`, in order
///
/// Handles created before a failure are shut down in the background.
async fn initialize_handles(configs: &[SinkConfig]) -> Result<Vec<SinkHandle>, ForkError> {
    let mut handles = Vec::with_capacity(configs.len());
    for sink_config in configs {
        handles.push(create_sink_handle(sink_config).await?);
    }
    Ok(handles)
}

/// Create a SinkHandle from configuration
///
/// Boxed because `fork` configs recurse.
pub fn create_sink_handle(config: &SinkConfig) -> BoxFuture<'_, Result<SinkHandle, ForkError>> {
    let span = info_span!(
        "fork_create_sink_handle",
        sink = %config.name,
        sink_type = ?config.sink_type
    );

    async move {
        match config.sink_type {
            SinkType::Log => {
                let sink = LogSink::new(&config.name);
                Ok(SinkHandle::spawn(sink, config.queue_capacity))
            }
            SinkType::Memory => {
                // No caller to hand the control to; contents are discarded
                let (sink, _control) = MemorySink::new(&config.name);
                Ok(SinkHandle::spawn(sink, config.queue_capacity))
            }
            SinkType::File => {
                let sink = FileSink::from_params(&config.name, &config.params)
                    .await
                    .map_err(|e| ForkError::sink_creation(&config.name, e.to_string()))?;
                Ok(SinkHandle::spawn(sink, config.queue_capacity))
            }
            SinkType::Network => {
                let sink = NetworkSink::from_params(&config.name, &config.params)
                    .await
                    .map_err(|e| ForkError::sink_creation(&config.name, e.to_string()))?;
                Ok(SinkHandle::spawn(sink, config.queue_capacity))
            }
            SinkType::Fork => {
                let children = initialize_handles(&config.sinks).await?;
                let policy = config.policy.unwrap_or_default();
                let fork = ForkSink::new(&config.name, children, policy);
                Ok(SinkHandle::spawn(fork, config.queue_capacity))
            }
        }
    }
    .instrument(span)
    .boxed()
}

/// Convenience function to create a fork from a blueprint
pub async fn create_fork(blueprint: ForkBlueprint) -> Result<ForkSink, ForkError> {
    ForkBuilder::new(blueprint).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Chunk, ConfigVersion, FailurePolicy, ForkSettings};
    use tempfile::tempdir;

    fn blueprint(sinks: Vec<SinkConfig>) -> ForkBlueprint {
        ForkBlueprint {
            version: ConfigVersion::V1,
            fork: ForkSettings {
                name: "root".to_string(),
                policy: FailurePolicy::Strict,
            },
            sinks,
        }
    }

    #[tokio::test]
    async fn test_build_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("copy.log");

        let sinks = vec![
            SinkConfig::new("log", SinkType::Log),
            SinkConfig::new("file", SinkType::File)
                .with_param("path", path.to_string_lossy().to_string()),
        ];
        let mut fork = create_fork(blueprint(sinks)).await.unwrap();

        assert_eq!(fork.name(), "root");
        assert_eq!(fork.live_targets(), vec!["log", "file"]);

        fork.write(&Chunk::text("line\n")).await.unwrap();
        fork.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");
    }

    #[tokio::test]
    async fn test_build_nested_fork() {
        let mut mirror = SinkConfig::new("mirror", SinkType::Fork);
        mirror.policy = Some(FailurePolicy::Permissive);
        mirror.sinks = vec![
            SinkConfig::new("m1", SinkType::Memory),
            SinkConfig::new("m2", SinkType::Memory),
        ];

        let mut fork = create_fork(blueprint(vec![mirror])).await.unwrap();
        assert_eq!(fork.live_targets(), vec!["mirror"]);

        fork.write(&Chunk::text("x")).await.unwrap();
        fork.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_config_memory_sink_counts_and_discards() {
        let sinks = vec![SinkConfig::new("void", SinkType::Memory)];
        let mut fork = create_fork(blueprint(sinks)).await.unwrap();

        fork.write(&Chunk::text("a")).await.unwrap();
        fork.write(&Chunk::text("b")).await.unwrap();

        let metrics = fork.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].0, "void");
        assert_eq!(metrics[0].1.write_count, 2);
        assert_eq!(metrics[0].1.failure_count, 0);
        fork.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_fails_on_missing_params() {
        let sinks = vec![SinkConfig::new("file", SinkType::File)];
        let err = create_fork(blueprint(sinks)).await.unwrap_err();

        assert!(matches!(err, ForkError::SinkCreation { ref name, .. } if name == "file"));
    }
}
