//! FileSink - appends chunks to a file on disk

use contracts::{Chunk, ContractError, DataSink};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    /// Output file
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it
    pub append: bool,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        let append = match params.get("append").map(String::as_str) {
            Some("true") | None => true,
            Some("false") => false,
            Some(other) => return Err(format!("invalid 'append' value '{}'", other)),
        };

        Ok(Self { path, append })
    }
}

/// Sink that writes chunks to a file
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink, creating parent directories as needed
    pub async fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.path)
            .await?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Create from params map (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_closed(&self.name))
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, chunk),
        fields(sink = %self.name, bytes = chunk.len())
    )]
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        let writer = self.writer()?;
        if let Err(e) = writer.write_all(&chunk.data).await {
            error!(sink = %self.name, path = %self.config.path.display(), error = %e, "Write failed");
            return Err(ContractError::sink_write(&self.name, e.to_string()));
        }
        Ok(())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        match self.writer.as_mut() {
            Some(writer) => writer
                .flush()
                .await
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string())),
            None => Ok(()),
        }
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        writer
            .flush()
            .await
            .map_err(|e| ContractError::sink_close(&self.name, e.to_string()))?;
        writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| ContractError::sink_close(&self.name, e.to_string()))?;

        debug!(sink = %self.name, path = %self.config.path.display(), "FileSink closed");
        Ok(())
    }
}
