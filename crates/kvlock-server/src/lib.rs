//! kvlock server - a shared counter whose increments are serialized by a
//! distributed lock over Redis (or an in-process store).

pub mod api; // HTTP handlers
pub mod cache; // Two-tier counter cache
pub mod metrics; // Metrics and observability
pub mod model; // Configuration, state and response models
pub mod startup; // Application startup utilities

pub use model::{AppState, Configuration};
