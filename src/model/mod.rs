//! src/model/mod.rs

pub mod chain;
pub mod opportunity;
pub mod wire;

pub use opportunity::{Opportunity, OpportunityStatus, OpportunityType};
