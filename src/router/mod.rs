//! src/router/mod.rs

pub mod cleanup;
pub mod dlq_fallback;
pub mod router;

pub use cleanup::CleanupScheduler;
pub use router::{Alert, AlertSeverity, AlertType, OpportunityRouter};
