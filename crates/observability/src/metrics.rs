//! Fan-out metrics
//!
//! Counters recorded by the fork coordinator, plus an in-memory aggregator
//! used for end-of-run summaries.

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// Record the outcome of one target dispatch (write, flush or close)
pub fn record_target_dispatch(fork: &str, sink: &str, operation: &'static str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "forksink_dispatches_total",
        "fork" => fork.to_string(),
        "sink" => sink.to_string(),
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a target removed from the live set
pub fn record_target_dropped(fork: &str, sink: &str) {
    counter!(
        "forksink_targets_dropped_total",
        "fork" => fork.to_string(),
        "sink" => sink.to_string()
    )
    .increment(1);
}

/// Record an out-of-band target fault
pub fn record_fault(fork: &str, sink: &str, escalated: bool) {
    let escalated = if escalated { "true" } else { "false" };
    counter!(
        "forksink_faults_total",
        "fork" => fork.to_string(),
        "sink" => sink.to_string(),
        "escalated" => escalated
    )
    .increment(1);
}

/// Record the current size of the live set
pub fn record_live_targets(fork: &str, live: usize) {
    gauge!("forksink_live_targets", "fork" => fork.to_string()).set(live as f64);
}

/// Record one producer-level write
pub fn record_chunk_written(fork: &str, bytes: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "forksink_writes_total",
        "fork" => fork.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("forksink_chunk_bytes", "fork" => fork.to_string()).record(bytes as f64);
}

/// Producer-side dispatch aggregator
///
/// Aggregates write outcomes in memory for the summary printed at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    /// Writes reported successful
    pub writes_ok: u64,

    /// Writes reported failed
    pub writes_failed: u64,

    /// Total payload bytes accepted
    pub bytes: u64,

    /// Chunk size statistics
    pub chunk_stats: RunningStats,

    /// Failure count per target name
    pub failures: HashMap<String, u64>,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful write of `bytes`
    pub fn record_ok(&mut self, bytes: usize) {
        self.writes_ok += 1;
        self.bytes += bytes as u64;
        self.chunk_stats.push(bytes as f64);
    }

    /// Record a failed write, attributed to `sink` when known
    pub fn record_failure(&mut self, sink: Option<&str>) {
        self.writes_failed += 1;
        if let Some(sink) = sink {
            *self.failures.entry(sink.to_string()).or_insert(0) += 1;
        }
    }

    pub fn total_writes(&self) -> u64 {
        self.writes_ok + self.writes_failed
    }

    /// Failure rate in percent
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_writes();
        if total > 0 {
            self.writes_failed as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Writes: {}", self.total_writes())?;
        writeln!(
            f,
            "Failed writes: {} ({:.2}%)",
            self.writes_failed,
            self.failure_rate()
        )?;
        writeln!(f, "Bytes: {}", self.bytes)?;
        writeln!(f, "Chunk size: {}", StatsSummary::from(&self.chunk_stats))?;

        if !self.failures.is_empty() {
            writeln!(f, "Failures per sink:")?;
            let mut failures: Vec<_> = self.failures.iter().collect();
            failures.sort();
            for (sink, count) in failures {
                writeln!(f, "  {}: {}", sink, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
