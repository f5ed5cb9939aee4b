//! Pipeline orchestrator - pumps input chunks through a fork.

use std::future::Future;
use std::time::Instant;

use contracts::{ContractError, FaultReceiver};
use fanout::ForkSink;
use observability::{record_chunk_written, DispatchStats};
use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

use super::{ChunkReader, ReadMode, RunStats, StopReason};

/// Pipeline configuration
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// How input is cut into chunks
    pub mode: ReadMode,

    /// Keep reading after a failed write
    pub keep_going: bool,
}

/// Drives one fork from one input stream until either runs out
pub struct Pipeline {
    fork: ForkSink,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(fork: ForkSink, config: PipelineConfig) -> Self {
        Self { fork, config }
    }

    /// Run until end of input, `shutdown`, or a stopping failure, then close
    /// the fork
    ///
    /// Every way of stopping, input errors included, ends with the fork
    /// closed and is reported in the returned [`RunStats`].
    pub async fn run<R, S>(mut self, input: R, shutdown: S) -> RunStats
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let fork_name = self.fork.name().to_string();
        let mut reader = ChunkReader::new(input, self.config.mode);
        let mut escalations = self.fork.take_faults();
        let mut dispatch = DispatchStats::new();
        let mut faults_observed = 0u64;
        tokio::pin!(shutdown);

        let stop_reason = loop {
            if self.fork.is_empty() {
                warn!(fork = %fork_name, "No live targets left");
                break StopReason::NoTargetsLeft;
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => break StopReason::Interrupted,

                Some(fault) = next_escalation(&mut escalations) => {
                    warn!(fork = %fork_name, error = %fault, "Target fault escalated");
                    break StopReason::Escalated(fault.to_string());
                }

                _ = self.fork.observe_faults() => {
                    faults_observed += 1;
                    debug!(fork = %fork_name, live = self.fork.len(), "Fault observed while idle");
                }

                next = reader.next_chunk() => {
                    let chunk = match next {
                        Ok(Some(chunk)) => chunk,
                        Ok(None) => break StopReason::EndOfInput,
                        Err(e) => {
                            warn!(fork = %fork_name, error = %e, "Failed to read input");
                            break StopReason::InputFailed(e.to_string());
                        }
                    };

                    match self.fork.write(&chunk).await {
                        Ok(()) => {
                            dispatch.record_ok(chunk.len());
                            record_chunk_written(&fork_name, chunk.len(), true);
                        }
                        Err(e) => {
                            dispatch.record_failure(e.sink_name());
                            record_chunk_written(&fork_name, chunk.len(), false);
                            warn!(fork = %fork_name, error = %e, "Write failed");
                            if !self.config.keep_going {
                                break StopReason::WriteFailed(e.to_string());
                            }
                        }
                    }
                }
            }
        };

        info!(fork = %fork_name, reason = %stop_reason, "Stopping, closing fork");
        let close_ok = match self.fork.close().await {
            Ok(()) => true,
            Err(e) => {
                warn!(fork = %fork_name, error = %e, "Close failed");
                false
            }
        };

        RunStats {
            stop_reason,
            dispatch,
            faults_observed,
            close_ok,
            targets: self.fork.metrics(),
            duration: start_time.elapsed(),
        }
    }
}

/// Next escalated fault; pending forever once the channel is gone
async fn next_escalation(escalations: &mut Option<FaultReceiver>) -> Option<ContractError> {
    match escalations {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
