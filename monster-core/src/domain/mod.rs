//! Core domain types
//!
//! These types describe what the orchestrator persists in the management hub
//! and what it needs to reach a host. They are shared between the engine
//! (which reads and writes them) and the CLI (which displays them).

pub mod command;
pub mod record;
pub mod status;
