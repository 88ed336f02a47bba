//! # worldline
//!
//! The application layer around `worldline-core`: configuration, save
//! stores, the interactive session, the CLI and the HTTP API.
//!
//! Split from `main.rs` so integration tests can drive the router and the
//! stores directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod repl;
