//! Actor system for the forecast scan loop.
//!
//! This crate provides the Ractor-based scan loop that drains the job
//! queue, and the runner that implements the claim protocol.
//!
//! # Architecture
//!
//! - `Scheduler` - Handle owned by `main`; starts and stops the loop
//! - `ScanActor` - Runs one scan cycle per tick, never two at once
//! - `JobRunner` - Claims, computes, persists and finalizes each job
//! - `QueueStore` / `ForecastBackend` - Seams for persistence and compute
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use actors::{DbQueueStore, JobRunner, Scheduler, SchedulerConfig};
//!
//! let runner = JobRunner::new(Arc::new(DbQueueStore), Arc::new(backend));
//! let scheduler = Scheduler::start(runner, SchedulerConfig::default()).await?;
//! let mut events = scheduler.subscribe();
//! // ...
//! scheduler.shutdown().await?;
//! ```

mod backend;
mod messages;
mod runner;
mod scan_actor;
mod scheduler;
mod store;

pub use backend::{ComputeError, ComputeFuture, FnBackend, ForecastBackend};
pub use messages::ScanMessage;
pub use runner::{JobOutcome, JobRunner};
pub use scan_actor::{ScanActor, ScanArgs, ScanStats};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError};
pub use store::{DbQueueStore, QueueStore, StoreFuture};

pub use forecast_core::{ForecastJob, ForecastOutput};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort};
