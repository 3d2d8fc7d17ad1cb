//! Built-in cognitive services
//!
//! Content-agnostic implementations of the five standard faculties. Each
//! is an ordinary [`CognitiveService`](crate::CognitiveService): it drains
//! bus topics, mutates the activation field, and publishes results. No
//! service calls another.

mod attention;
mod learning;
mod reasoning;
mod reflection;
mod working_memory;

pub use attention::AttentionService;
pub use learning::LearningService;
pub use reasoning::ReasoningService;
pub use reflection::ReflectionService;
pub use working_memory::WorkingMemoryService;
