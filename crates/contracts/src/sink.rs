//! DataSink trait - interface of every fan-out target
//!
//! Defines the abstract interface for Sinks.

use tokio::sync::mpsc;

use crate::{Chunk, ContractError};

/// Out-of-band error channel of a sink
///
/// Carries failures that happen outside of any `write` or `close` call,
/// e.g. a remote peer hanging up between writes.
pub type FaultReceiver = mpsc::UnboundedReceiver<ContractError>;

/// Sending half of a [`FaultReceiver`]
pub type FaultSender = mpsc::UnboundedSender<ContractError>;

/// Create a fault channel
pub fn fault_channel() -> (FaultSender, FaultReceiver) {
    mpsc::unbounded_channel()
}

/// Data output trait
///
/// All sink implementations must implement this trait.
/// Every failure of `write` / `flush` / `close` is returned explicitly.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one chunk
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;

    /// Hand out the out-of-band error channel
    ///
    /// Called once by the owner of the sink. Sinks that never fail
    /// out of band keep the default.
    fn take_faults(&mut self) -> Option<FaultReceiver> {
        None
    }
}
