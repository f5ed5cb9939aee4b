//! LogSink - logs chunk summaries via tracing

use contracts::{Chunk, ContractError, DataSink, Encoding};
use tracing::{info, instrument};

/// Longest text preview included in a log line
const PREVIEW_LEN: usize = 64;

/// Sink that logs chunk summaries for debugging
pub struct LogSink {
    name: String,
    chunks: u64,
    bytes: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: 0,
            bytes: 0,
        }
    }

    fn log_chunk_summary(&self, chunk: &Chunk) {
        let text = match chunk.encoding {
            Encoding::Utf8 => chunk.as_str().map(preview),
            Encoding::Buffer => None,
        };

        info!(
            sink = %self.name,
            seq = self.chunks,
            bytes = chunk.len(),
            encoding = ?chunk.encoding,
            preview = text.unwrap_or_default(),
            "Chunk received"
        );
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, chunk),
        fields(sink = %self.name, bytes = chunk.len())
    )]
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        self.log_chunk_summary(chunk);
        self.chunks += 1;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            chunks = self.chunks,
            bytes = self.bytes,
            "LogSink closed"
        );
        Ok(())
    }
}
