//! SoDEX crawler — incremental account discovery and PnL snapshotter.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod client;
pub mod engine;
pub mod storage;
