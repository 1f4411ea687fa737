//! Aspect engine: the backend half of a scene.
//!
//! An [`AspectEngine`] owns one [`ChangeArbiter`](scenesync_arbiter::ChangeArbiter)
//! and the aspects registered with it. A frame drains the arbiter into the
//! aspects' registries, runs their jobs through the [`JobScheduler`] and
//! queues the jobs' write-backs for the frontend tree.
//!
//! # Invariants
//! - Job outputs are posted in submission order, whatever the worker count.
//! - A job never runs before the jobs it depends on (within its aspect).

pub mod config;
pub mod engine;
pub mod errors;
pub mod scheduler;

pub use config::EngineConfig;
pub use engine::{AspectEngine, FrameReport};
pub use errors::{EngineError, SchedulerError};
pub use scheduler::{JobOutput, JobScheduler, ScheduledJob};
