//! Pipeline execution

pub mod runner;
pub mod trigger;
