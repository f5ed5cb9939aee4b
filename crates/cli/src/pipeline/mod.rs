//! Pipeline orchestration module.

mod orchestrator;
mod reader;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use reader::{ChunkReader, ReadMode};
pub use stats::{RunStats, StopReason};
