//! # Tickwire Scheduler
//!
//! Runs validated wirings:
//!
//! - [`TickArtifactCache`]: one cycle's artifacts, keyed by artifact type
//! - [`ExecutionScheduler`]: calls workers level by level so every read
//!   finds its artifact already written
//! - [`bind_rules`]: subscribes wiring-rule targets on the bus
//! - [`Pipeline`]: one scheduler and cache per processing group

pub mod cache;
pub mod context;
pub mod error;
pub mod notice;
pub mod pipeline;
pub mod routing;
pub mod scheduler;
pub mod worker;

pub use cache::TickArtifactCache;
pub use context::CycleContext;
pub use error::CycleError;
pub use notice::{CycleNotice, CYCLE_ABORTED, CYCLE_COMPLETED, CYCLE_STARTED};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use routing::{bind_rules, unbind, HandlerTable};
pub use scheduler::{CycleReport, ExecutionScheduler, SchedulerState};
pub use worker::{worker_fn, FnWorker, Worker, WorkerSet};
