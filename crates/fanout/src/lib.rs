//! # Fanout
//!
//! Fan-out sink: one writable endpoint that duplicates every chunk to a
//! fixed set of downstream targets.
//!
//! Responsibilities:
//! - Dispatch each write concurrently to every live target
//! - Drop failing targets from the live set
//! - Report failures to the producer according to the failure policy
//! - Run every target in its own worker task

pub mod builder;
pub mod error;
pub mod fork;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use builder::{create_fork, create_sink_handle, ForkBuilder};
pub use contracts::{Chunk, DataSink, Encoding, FailurePolicy};
pub use error::ForkError;
pub use fork::{fork, DispatchState, ForkSink};
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{
    FileSink, FileSinkConfig, Framing, LogSink, MemorySink, MemorySinkControl, NetworkSink,
    NetworkSinkConfig,
};
