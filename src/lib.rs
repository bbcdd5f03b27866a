//! sori - Unattended podcast episode generation
//!
//! A scheduling system that turns per-category schedulers into finished
//! podcast episodes on a cron cadence, end to end and without human
//! input.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`cron`] - Cron expression parsing and next-run calculation
//! - [`models`] - Core data structures and types
//! - [`topics`] - Topic list state machine and auto-replenishment
//! - [`services`] - Generative and storage service clients
//! - [`pipeline`] - The seven-step episode generation pipeline
//! - [`dispatch`] - Due-scheduler selection and run bookkeeping
//! - [`registry`] - Per-scheduler timer tasks
//! - [`storage`] - Database operations (SQLite, in-memory)
//! - [`notify`] - Run outcome webhooks
//!
//! # Example
//!
//! ```no_run
//! use sori::config::Config;
//! use sori::cron;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!     let next = cron::next_run("0 9 * * *", chrono::Utc::now())?;
//!     println!("next episode at {next}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cron;
pub mod dispatch;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod services;
pub mod storage;
pub mod topics;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::cron::{next_run, CronError, CronExpr};
    pub use crate::dispatch::{DispatchResult, Dispatcher};
    pub use crate::models::{Audio, Category, GenerationMode, RunOutcome, Scheduler, Topic};
    pub use crate::notify::RunNotifier;
    pub use crate::pipeline::{EpisodePipeline, PipelineError};
    pub use crate::registry::SchedulerRegistry;
    pub use crate::storage::{SqliteDatabase, Store};
    pub use crate::topics::{TopicQueue, TopicReplenisher};
}
