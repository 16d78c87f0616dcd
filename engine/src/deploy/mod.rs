//! Deployment workflows: status machine, rollback saga and its collaborators

pub mod compose;
pub mod env;
pub mod fsm;
pub mod orchestrator;
pub mod points;
pub mod rollback;
