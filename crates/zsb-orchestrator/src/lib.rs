//! Match-server process supervision.
//!
//! ## Core Types
//!
//! - [`Orchestrator`] — spawns child match servers, reaps exits, sweeps
//!   lapsed heartbeats, and keeps a minimum pool of ready instances
//! - [`OrchestratorConfig`] — executable path, spawn args, callback address
mod orchestrator;

pub use orchestrator::*;
