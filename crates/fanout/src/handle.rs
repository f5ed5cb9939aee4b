//! SinkHandle - runs a target in its own worker task behind a command queue

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{Chunk, ContractError, DataSink, FaultReceiver};

use crate::metrics::SinkMetrics;

type Ack = oneshot::Sender<Result<(), ContractError>>;

/// Request sent to a sink worker, acknowledged once the sink settles
enum Command {
    Write { chunk: Chunk, ack: Ack },
    Flush { ack: Ack },
    Close { ack: Ack },
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send commands to worker
    tx: mpsc::Sender<Command>,
    /// Out-of-band error channel of the sink, if it has one
    faults: Option<FaultReceiver>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Set when the worker must stop without flushing or closing the sink
    detached: Arc<AtomicBool>,
    /// Worker task handle, taken when the worker is joined
    worker_handle: Option<JoinHandle<()>>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S: DataSink + Send + 'static>(mut sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let faults = sink.take_faults();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let detached = Arc::new(AtomicBool::new(false));

        let worker_metrics = Arc::clone(&metrics);
        let worker_detached = Arc::clone(&detached);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_detached, worker_name).await;
        });

        Self {
            name,
            tx,
            faults,
            metrics,
            detached,
            worker_handle: Some(worker_handle),
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Write a chunk and wait until the sink acknowledges it
    ///
    /// A worker that can no longer accept commands fails immediately; a
    /// worker that fails the write reports it through the acknowledgement.
    /// Both surface as the returned error.
    pub async fn write(&self, chunk: &Chunk) -> Result<(), ContractError> {
        self.request(|ack| Command::Write {
            chunk: chunk.clone(),
            ack,
        })
        .await
    }

    /// Flush the sink and wait for the acknowledgement
    pub async fn flush(&self) -> Result<(), ContractError> {
        self.request(|ack| Command::Flush { ack }).await
    }

    /// Flush and close the sink, then join the worker
    #[instrument(name = "sink_handle_close", skip(self), fields(sink = %self.name))]
    pub async fn close(&mut self) -> Result<(), ContractError> {
        let result = self.request(|ack| Command::Close { ack }).await;

        if let Some(worker) = self.worker_handle.take() {
            if let Err(e) = worker.await {
                error!(sink = %self.name, error = ?e, "Worker task panicked");
                return result.and(Err(ContractError::worker_gone(&self.name)));
            }
        }

        result
    }

    /// Whether the sink still exposes an out-of-band error channel
    pub fn has_fault_channel(&self) -> bool {
        self.faults.is_some()
    }

    /// Take a pending out-of-band fault without waiting
    pub fn try_fault(&mut self) -> Option<ContractError> {
        let faults = self.faults.as_mut()?;
        match faults.try_recv() {
            Ok(fault) => {
                self.metrics.inc_fault_count();
                Some(fault)
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.faults = None;
                None
            }
        }
    }

    /// Wait for the next out-of-band fault
    ///
    /// Returns `None` once the sink has dropped its end of the channel.
    /// Cancel safe.
    pub async fn next_fault(&mut self) -> Option<ContractError> {
        let faults = self.faults.as_mut()?;
        match faults.recv().await {
            Some(fault) => {
                self.metrics.inc_fault_count();
                Some(fault)
            }
            None => {
                self.faults = None;
                None
            }
        }
    }

    /// Shutdown the sink worker without an explicit close
    ///
    /// The worker drains queued commands, then flushes and closes the sink.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        let Self {
            name,
            tx,
            worker_handle,
            ..
        } = self;

        // Drop sender to signal worker to stop
        drop(tx);
        if let Some(worker) = worker_handle {
            if let Err(e) = worker.await {
                error!(sink = %name, error = ?e, "Worker task panicked");
            }
        }
        debug!(sink = %name, "SinkHandle shutdown complete");
    }

    /// Let go of the sink without flushing or closing it
    ///
    /// The worker finishes commands already queued, then drops the sink as
    /// is. Used for targets a fork has given up on.
    pub fn detach(self) {
        self.detached.store(true, Ordering::Release);
        debug!(sink = %self.name, "SinkHandle detached");
    }

    async fn request(&self, command: impl FnOnce(Ack) -> Command) -> Result<(), ContractError> {
        let (ack, settled) = oneshot::channel();
        self.tx
            .send(command(ack))
            .await
            .map_err(|_| ContractError::worker_gone(&self.name))?;
        settled
            .await
            .map_err(|_| ContractError::worker_gone(&self.name))?
    }
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("name", &self.name)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

/// Worker task that consumes commands and drives the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics, detached),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Command>,
    metrics: Arc<SinkMetrics>,
    detached: Arc<AtomicBool>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(command) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match command {
            Command::Write { chunk, ack } => {
                let result = sink.write(&chunk).await;
                match &result {
                    Ok(()) => metrics.inc_write_count(),
                    Err(e) => {
                        metrics.inc_failure_count();
                        warn!(sink = %name, bytes = chunk.len(), error = %e, "Write failed");
                    }
                }
                // The requester may have gone away; the outcome is recorded either way
                let _ = ack.send(result);
            }
            Command::Flush { ack } => {
                let result = sink.flush().await;
                if result.is_err() {
                    metrics.inc_failure_count();
                }
                let _ = ack.send(result);
            }
            Command::Close { ack } => {
                let result = finish(&mut sink).await;
                if result.is_err() {
                    metrics.inc_failure_count();
                }
                let _ = ack.send(result);
                debug!(sink = %name, "Sink worker stopped after close");
                return;
            }
        }
    }

    if detached.load(Ordering::Acquire) {
        debug!(sink = %name, "Sink worker stopped, sink left open");
        return;
    }

    // Handle dropped without close
    if let Err(e) = finish(&mut sink).await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

/// Flush then close; close is attempted even when the flush fails
async fn finish<S: DataSink>(sink: &mut S) -> Result<(), ContractError> {
    let flushed = sink.flush().await;
    let closed = sink.close().await;
    flushed.and(closed)
}
