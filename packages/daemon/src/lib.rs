//! `forecastd`: the forecast queue daemon.
//!
//! Reads its configuration from the environment, connects to SurrealDB and
//! drains the job queue with the baseline backend until interrupted.

mod config;

pub use config::{ConfigError, DaemonConfig, ExecutionMode};
