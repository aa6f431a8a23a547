//! src/control/mod.rs

pub mod surface;

pub use surface::{ControlSurface, StatusSnapshot};
