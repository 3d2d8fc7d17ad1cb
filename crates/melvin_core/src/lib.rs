//! Melvin COS core types
//!
//! Leaf crate of the workspace: the parameter genome, the typed event
//! payloads carried on the bus, the TOML configuration, and the startup
//! error taxonomy. Everything here is runtime-agnostic; the scheduler and
//! services live in `melvin_runtime`.

pub mod config;
pub mod error;
pub mod events;
pub mod genome;

pub use config::MelvinConfig;
pub use error::StartupError;
pub use events::{monotonic_micros, Event, Payload};
pub use genome::{Gene, Genome};

/// Identifier of a node in the activation field. Nodes are created by an
/// external content loader; the core only references them.
pub type NodeId = u64;
