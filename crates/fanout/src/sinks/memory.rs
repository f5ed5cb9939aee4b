//! MemorySink - keeps written chunks in memory
//!
//! Paired with a [`MemorySinkControl`] that inspects what was received and
//! injects failures, which makes it the target of choice for tests and
//! dry runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use contracts::{fault_channel, Chunk, ContractError, DataSink, FaultReceiver, FaultSender};
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct MemoryState {
    chunks: Vec<Chunk>,
    write_attempts: u64,
    closed: bool,
    /// Failures consumed one per write, before `fail_writes`
    queued_write_failures: VecDeque<String>,
    /// Failure returned by every write
    fail_writes: Option<String>,
    fail_close: Option<String>,
    write_delay: Option<Duration>,
}

/// Sink that appends every chunk to an in-memory buffer
pub struct MemorySink {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    faults: Option<FaultReceiver>,
}

/// Inspection and failure-injection handle of a [`MemorySink`]
#[derive(Clone)]
pub struct MemorySinkControl {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    faults: FaultSender,
}

impl MemorySink {
    /// Create a sink together with its control handle
    pub fn new(name: impl Into<String>) -> (Self, MemorySinkControl) {
        let name = name.into();
        let state = Arc::new(Mutex::new(MemoryState::default()));
        let (fault_tx, fault_rx) = fault_channel();

        let sink = Self {
            name: name.clone(),
            state: Arc::clone(&state),
            faults: Some(fault_rx),
        };
        let control = MemorySinkControl {
            name,
            state,
            faults: fault_tx,
        };
        (sink, control)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }
}

/// A panicking test must not hide the buffered chunks from the others
fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DataSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "memory_sink_write",
        skip(self, chunk),
        fields(sink = %self.name, bytes = chunk.len())
    )]
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        let delay = self.state().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.write_attempts += 1;

        if state.closed {
            return Err(ContractError::sink_closed(&self.name));
        }
        if let Some(message) = state.queued_write_failures.pop_front() {
            return Err(ContractError::sink_write(&self.name, message));
        }
        if let Some(message) = &state.fail_writes {
            return Err(ContractError::sink_write(&self.name, message.clone()));
        }

        state.chunks.push(chunk.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "memory_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let mut state = self.state();
        if let Some(message) = &state.fail_close {
            return Err(ContractError::sink_close(&self.name, message.clone()));
        }
        state.closed = true;
        debug!(sink = %self.name, chunks = state.chunks.len(), "MemorySink closed");
        Ok(())
    }

    fn take_faults(&mut self) -> Option<FaultReceiver> {
        self.faults.take()
    }
}

impl MemorySinkControl {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chunks accepted so far
    pub fn chunks(&self) -> Vec<Chunk> {
        lock(&self.state).chunks.clone()
    }

    /// Accepted chunks decoded as text (lossy)
    pub fn texts(&self) -> Vec<String> {
        lock(&self.state)
            .chunks
            .iter()
            .map(|chunk| String::from_utf8_lossy(&chunk.data).into_owned())
            .collect()
    }

    /// Number of writes that reached the sink, failed ones included
    pub fn write_attempts(&self) -> u64 {
        lock(&self.state).write_attempts
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Fail the next write only
    pub fn fail_next_write(&self, message: impl Into<String>) {
        lock(&self.state)
            .queued_write_failures
            .push_back(message.into());
    }

    /// Fail every write from now on
    pub fn fail_writes(&self, message: impl Into<String>) {
        lock(&self.state).fail_writes = Some(message.into());
    }

    pub fn fail_close(&self, message: impl Into<String>) {
        lock(&self.state).fail_close = Some(message.into());
    }

    /// Delay every write, to let concurrent dispatches overlap
    pub fn set_write_delay(&self, delay: Duration) {
        lock(&self.state).write_delay = Some(delay);
    }

    /// Report an out-of-band fault, outside of any write or close
    ///
    /// Returns false when nobody listens to the sink's faults anymore.
    pub fn raise_fault(&self, message: impl Into<String>) -> bool {
        self.faults
            .send(ContractError::sink_fault(&self.name, message))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_chunks() {
        let (mut sink, control) = MemorySink::new("mem");

        sink.write(&Chunk::text("a")).await.unwrap();
        sink.write(&Chunk::text("b")).await.unwrap();

        assert_eq!(control.texts(), vec!["a", "b"]);
        assert_eq!(control.write_attempts(), 2);
    }

    #[tokio::test]
    async fn test_queued_failures_precede_persistent_ones() {
        let (mut sink, control) = MemorySink::new("mem");
        control.fail_next_write("once");

        let err = sink.write(&Chunk::text("a")).await.unwrap_err();
        assert!(err.to_string().contains("once"));
        sink.write(&Chunk::text("b")).await.unwrap();

        control.fail_writes("always");
        assert!(sink.write(&Chunk::text("c")).await.is_err());
        assert!(sink.write(&Chunk::text("d")).await.is_err());
        assert_eq!(control.texts(), vec!["b"]);
        assert_eq!(control.write_attempts(), 4);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (mut sink, control) = MemorySink::new("mem");
        sink.close().await.unwrap();
        assert!(control.is_closed());

        let err = sink.write(&Chunk::text("late")).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkClosed { .. }));
    }

    #[tokio::test]
    async fn test_close_failure() {
        let (mut sink, control) = MemorySink::new("mem");
        control.fail_close("disk gone");

        assert!(sink.close().await.is_err());
        assert!(!control.is_closed());
    }

    #[tokio::test]
    async fn test_fault_channel_handed_out_once() {
        let (mut sink, control) = MemorySink::new("mem");
        let mut faults = sink.take_faults().unwrap();
        assert!(sink.take_faults().is_none());

        assert!(control.raise_fault("hang up"));
        let fault = faults.recv().await.unwrap();
        assert_eq!(fault.sink_name(), Some("mem"));

        drop(faults);
        assert!(!control.raise_fault("nobody listens"));
    }
}
