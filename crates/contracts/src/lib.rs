//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the fan-out sink.
//! All business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `Chunk` is the unit a producer writes; its payload is reference counted,
//!   so handing every target its own copy is cheap
//! - `DataSink` is the capability every downstream target implements
//! - `ForkBlueprint` describes a fan-out tree loaded from configuration

mod blueprint;
mod chunk;
mod error;
mod policy;
mod sink;

pub use blueprint::*;
pub use chunk::*;
pub use error::*;
pub use policy::FailurePolicy;
pub use sink::*;
