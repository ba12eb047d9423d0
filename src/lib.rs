//! Kanban backend library.
//!
//! Exposes the store backends, the task dependency graph and the HTTP API
//! for the binary and for integration tests.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
