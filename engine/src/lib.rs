//! DevFlow Engine Library
//!
//! Remote orchestration core: builds and runs shell commands against
//! deployment targets and drives pipeline runs and rollbacks on top of them.

pub mod backup;
pub mod cancel;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod remote;
pub mod storage;
pub mod utils;
