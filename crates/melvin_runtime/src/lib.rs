//! Melvin COS runtime
//!
//! The coordinator side of the system: the 50 Hz master scheduler, the
//! arousal/budget feedback controller, the built-in cognitive services,
//! and the per-tick KPI logger. Services talk to the rest of the system
//! exclusively through the event bus and the activation field; there are
//! no direct cross-service calls.

pub mod arousal;
pub mod budget;
pub mod kpi;
pub mod scheduler;
pub mod service;
pub mod services;

pub use arousal::ArousalState;
pub use budget::Budgets;
pub use kpi::{KpiLogger, KpiRecord};
pub use scheduler::{Scheduler, SchedulerControl};
pub use service::{CognitiveService, ServiceContext};
