//! Global activation field
//!
//! A thread-safe weighted-graph overlay holding per-node activation under
//! decay, input injection, spreading, and k-WTA sparsity control. The
//! topology (nodes + weighted directed edges) is read-only after load; the
//! activation map is sparse: entries below ε are erased, never stored as
//! zero.

mod field;
mod metrics;
mod topology;

pub use field::ActivationField;
pub use melvin_core::events::FieldMetrics;
pub use topology::{Edge, Topology};

/// Prune threshold ε: activations below this are erased.
pub const EPSILON: f32 = 1e-3;

/// Default activation ceiling A_max.
pub const A_MAX: f32 = 1.0;
