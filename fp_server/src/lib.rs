//! FunPot HTTP server.
//!
//! Wires the `funpot` authentication core to an axum router together with
//! configuration, logging and metrics.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
