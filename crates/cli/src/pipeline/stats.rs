//! Run statistics.

use std::time::Duration;

use fanout::MetricsSnapshot;
use observability::DispatchStats;

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Input reached end of file
    EndOfInput,
    /// Shutdown signal received
    Interrupted,
    /// Every target was dropped
    NoTargetsLeft,
    /// A write failed under the strict policy
    WriteFailed(String),
    /// A target fault was escalated before the first write
    Escalated(String),
    /// Reading the input failed
    InputFailed(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndOfInput => write!(f, "end of input"),
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::NoTargetsLeft => write!(f, "no targets left"),
            StopReason::WriteFailed(error) => write!(f, "write failed: {}", error),
            StopReason::Escalated(error) => write!(f, "target fault: {}", error),
            StopReason::InputFailed(error) => write!(f, "input error: {}", error),
        }
    }
}

/// Statistics from a run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub stop_reason: StopReason,

    /// Write outcomes as seen by the producer
    pub dispatch: DispatchStats,

    /// Target faults observed while waiting for input
    pub faults_observed: u64,

    /// Whether closing the fork succeeded
    pub close_ok: bool,

    /// Targets still live at the end, with their counters
    pub targets: Vec<(String, MetricsSnapshot)>,

    pub duration: Duration,
}

impl RunStats {
    /// Whether the run ended in a state that warrants a failing exit code
    pub fn is_failure(&self) -> bool {
        !self.close_ok
            || matches!(
                self.stop_reason,
                StopReason::WriteFailed(_)
                    | StopReason::Escalated(_)
                    | StopReason::InputFailed(_)
            )
    }

    /// Throughput in bytes per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.dispatch.bytes as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Summary ===\n");
        println!("Stopped: {}", self.stop_reason);
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.0} B/s", self.throughput());
        println!("Faults observed while idle: {}", self.faults_observed);
        println!("Close: {}", if self.close_ok { "ok" } else { "failed" });
        println!();
        print!("{}", self.dispatch);

        println!("\nLive targets ({}):", self.targets.len());
        for (name, snapshot) in &self.targets {
            println!(
                "  {}: {} writes, {} failures, {} faults",
                name, snapshot.write_count, snapshot.failure_count, snapshot.fault_count
            );
        }
        println!();
    }
}
