//! Sink implementations
//!
//! Contains LogSink, FileSink, NetworkSink and MemorySink.

mod file;
mod log;
mod memory;
mod network;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::memory::{MemorySink, MemorySinkControl};
pub use self::network::{Framing, NetworkSink, NetworkSinkConfig};
