//! CI provider API models

pub mod models;
