//! Data models

pub mod backup;
pub mod deployment;
pub mod host;
pub mod pipeline;
pub mod project;
