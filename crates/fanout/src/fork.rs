//! ForkSink - duplicates every write to a fixed set of targets
//!
//! Each operation (write, flush, close) is dispatched concurrently to every
//! live target and completes once all of them settled. Targets that fail are
//! dropped from the live set, which only ever shrinks. Whether the producer
//! sees the failure depends on the [`FailurePolicy`].
//!
//! Only one operation is in flight at a time (`&mut self`), so the live set is
//! never mutated while target dispatches are outstanding.

use futures::future::{join_all, select_all};
use tracing::{debug, info, instrument, warn};

use contracts::{
    fault_channel, Chunk, ContractError, DataSink, FailurePolicy, FaultReceiver, FaultSender,
};

use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;

/// Whether any operation has been dispatched through the fork yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Out-of-band target faults are still escalated (strict policy)
    NotStarted,
    /// Out-of-band target faults only drop the target
    Dispatching,
}

/// Entry of the target list
///
/// Failed targets become `Dropped` in place so that dispatch outcomes keep
/// their index; tombstones are compacted before the next dispatch.
enum Slot {
    Live(SinkHandle),
    Dropped,
}

impl Slot {
    fn is_live(&self) -> bool {
        matches!(self, Slot::Live(_))
    }

    fn handle(&self) -> Option<&SinkHandle> {
        match self {
            Slot::Live(handle) => Some(handle),
            Slot::Dropped => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Write,
    Flush,
    Close,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Write => "write",
            Operation::Flush => "flush",
            Operation::Close => "close",
        }
    }
}

/// Fan-out sink over a set of [`SinkHandle`] targets
pub struct ForkSink {
    name: String,
    slots: Vec<Slot>,
    policy: FailurePolicy,
    state: DispatchState,
    closed: bool,
    /// Escalated target faults; the fork's own out-of-band error channel
    fault_tx: FaultSender,
    fault_rx: Option<FaultReceiver>,
}

/// Fork `targets` with the strict policy
pub fn fork(targets: Vec<SinkHandle>) -> ForkSink {
    ForkSink::new("fork", targets, FailurePolicy::Strict)
}

impl ForkSink {
    /// Create a fork over `targets`, in order
    pub fn new(name: impl Into<String>, targets: Vec<SinkHandle>, policy: FailurePolicy) -> Self {
        let name = name.into();
        let (fault_tx, fault_rx) = fault_channel();

        info!(fork = %name, targets = targets.len(), %policy, "ForkSink created");
        observability::record_live_targets(&name, targets.len());

        Self {
            name,
            slots: targets.into_iter().map(Slot::Live).collect(),
            policy,
            state: DispatchState::NotStarted,
            closed: false,
            fault_tx,
            fault_rx: Some(fault_rx),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once every target has been dropped
    ///
    /// Writes to an empty fork are no-ops that succeed.
    pub fn is_empty(&self) -> bool {
        !self.slots.iter().any(Slot::is_live)
    }

    /// Number of live targets
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_live()).count()
    }

    /// Names of the live targets, in target order
    pub fn live_targets(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(Slot::handle)
            .map(SinkHandle::name)
            .collect()
    }

    /// Metrics of the live targets, in target order
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.slots
            .iter()
            .filter_map(Slot::handle)
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Hand out the fork's out-of-band error channel
    ///
    /// Receives target faults escalated before the first dispatch under the
    /// strict policy.
    pub fn take_faults(&mut self) -> Option<FaultReceiver> {
        self.fault_rx.take()
    }

    /// Write `chunk` to every live target and wait for all of them
    ///
    /// # Errors
    /// Strict policy: the failure of the first failing target in target
    /// order. Permissive policy: never fails, except after `close`.
    #[instrument(
        name = "fork_write",
        skip(self, chunk),
        fields(fork = %self.name, bytes = chunk.len())
    )]
    pub async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        self.begin(Operation::Write)?;

        let outcomes = join_all(self.slots.iter().map(|slot| async move {
            match slot {
                Slot::Live(handle) => handle.write(chunk).await,
                Slot::Dropped => Ok(()),
            }
        }))
        .await;

        self.settle(Operation::Write, outcomes)
    }

    /// Flush every live target, with the same aggregation as `write`
    #[instrument(name = "fork_flush", skip(self), fields(fork = %self.name))]
    pub async fn flush(&mut self) -> Result<(), ContractError> {
        self.begin(Operation::Flush)?;

        let outcomes = join_all(self.slots.iter().map(|slot| async move {
            match slot {
                Slot::Live(handle) => handle.flush().await,
                Slot::Dropped => Ok(()),
            }
        }))
        .await;

        self.settle(Operation::Flush, outcomes)
    }

    /// Close every live target; no operation may follow
    #[instrument(name = "fork_close", skip(self), fields(fork = %self.name))]
    pub async fn close(&mut self) -> Result<(), ContractError> {
        self.begin(Operation::Close)?;
        self.closed = true;

        let outcomes = join_all(self.slots.iter_mut().map(|slot| async move {
            match slot {
                Slot::Live(handle) => handle.close().await,
                Slot::Dropped => Ok(()),
            }
        }))
        .await;

        let result = self.settle(Operation::Close, outcomes);
        info!(fork = %self.name, live = self.len(), ok = result.is_ok(), "ForkSink closed");
        result
    }

    /// Handle every target fault that is already pending
    ///
    /// Runs at the start of every operation. Returns the number of faults seen.
    pub fn poll_faults(&mut self) -> usize {
        let mut observed = 0;
        for index in 0..self.slots.len() {
            while let Some(fault) = match &mut self.slots[index] {
                Slot::Live(handle) => handle.try_fault(),
                Slot::Dropped => None,
            } {
                observed += 1;
                self.handle_fault(index, fault);
            }
        }
        observed
    }

    /// Wait until a live target reports a fault, then handle it
    ///
    /// Never completes when no live target has a fault channel. Cancel safe,
    /// meant to be raced against the producer's next input while idle.
    pub async fn observe_faults(&mut self) {
        loop {
            let watchers: Vec<_> = self
                .slots
                .iter_mut()
                .enumerate()
                .filter_map(|(index, slot)| match slot {
                    Slot::Live(handle) if handle.has_fault_channel() => {
                        Some(Box::pin(async move { (index, handle.next_fault().await) }))
                    }
                    _ => None,
                })
                .collect();

            if watchers.is_empty() {
                return std::future::pending::<()>().await;
            }

            let (settled, _, rest) = select_all(watchers).await;
            drop(rest);

            // A closed channel only removes the watcher
            if let (index, Some(fault)) = settled {
                self.handle_fault(index, fault);
                return;
            }
        }
    }

    /// Common prologue: reject after close, handle pending faults, compact
    /// tombstones, then leave the `NotStarted` state for good
    fn begin(&mut self, operation: Operation) -> Result<(), ContractError> {
        if self.closed {
            debug!(fork = %self.name, operation = operation.as_str(), "Rejected after close");
            return Err(ContractError::sink_closed(&self.name));
        }

        self.poll_faults();
        self.slots.retain(Slot::is_live);

        if self.state == DispatchState::NotStarted {
            debug!(fork = %self.name, "First dispatch, fault escalation disarmed");
            self.state = DispatchState::Dispatching;
        }
        Ok(())
    }

    /// Aggregate the outcomes of one operation, in target order
    fn settle(
        &mut self,
        operation: Operation,
        outcomes: Vec<Result<(), ContractError>>,
    ) -> Result<(), ContractError> {
        let mut first_failure = None;

        for (index, outcome) in outcomes.into_iter().enumerate() {
            let Some(sink) = self.slots[index].handle().map(|h| h.name().to_string()) else {
                continue;
            };
            observability::record_target_dispatch(
                &self.name,
                &sink,
                operation.as_str(),
                outcome.is_ok(),
            );

            if let Err(error) = outcome {
                warn!(
                    fork = %self.name,
                    sink = %sink,
                    index,
                    operation = operation.as_str(),
                    error = %error,
                    "Target failed, dropping it"
                );
                self.drop_target(index);
                first_failure.get_or_insert(error);
            }
        }

        match (first_failure, self.policy) {
            (Some(error), FailurePolicy::Strict) => Err(error),
            _ => Ok(()),
        }
    }

    fn handle_fault(&mut self, index: usize, fault: ContractError) {
        let Some(sink) = self.slots[index].handle().map(|h| h.name().to_string()) else {
            return;
        };

        match (self.policy, self.state) {
            (FailurePolicy::Permissive, _) => {
                debug!(fork = %self.name, sink = %sink, error = %fault, "Target fault ignored");
                observability::record_fault(&self.name, &sink, false);
            }
            (FailurePolicy::Strict, DispatchState::NotStarted) => {
                warn!(
                    fork = %self.name,
                    sink = %sink,
                    error = %fault,
                    "Target fault before first dispatch, escalating"
                );
                self.drop_target(index);
                observability::record_fault(&self.name, &sink, true);
                // The receiver lives in self until taken, so only a dropped receiver fails
                let _ = self.fault_tx.send(fault);
            }
            (FailurePolicy::Strict, DispatchState::Dispatching) => {
                warn!(fork = %self.name, sink = %sink, error = %fault, "Target fault, dropping it");
                self.drop_target(index);
                observability::record_fault(&self.name, &sink, false);
            }
        }
    }

    /// Tombstone a target; it is released without flush or close
    fn drop_target(&mut self, index: usize) {
        if let Slot::Live(handle) = std::mem::replace(&mut self.slots[index], Slot::Dropped) {
            observability::record_target_dropped(&self.name, handle.name());
            handle.detach();
        }
        observability::record_live_targets(&self.name, self.len());
    }
}

impl std::fmt::Debug for ForkSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkSink")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("closed", &self.closed)
            .field("live", &self.live_targets())
            .finish()
    }
}

/// Only `close` closes targets; a fork dropped before it releases them as is
impl Drop for ForkSink {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        for slot in self.slots.drain(..) {
            if let Slot::Live(handle) = slot {
                handle.detach();
            }
        }
    }
}

/// A fork is itself a sink, so forks nest
impl DataSink for ForkSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        ForkSink::write(self, chunk).await
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        ForkSink::flush(self).await
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        ForkSink::close(self).await
    }

    fn take_faults(&mut self) -> Option<FaultReceiver> {
        ForkSink::take_faults(self)
    }
}
