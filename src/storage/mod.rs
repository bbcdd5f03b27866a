//! Repository pattern for persistence
//!
//! Trait-based repository abstractions decouple the pipeline and
//! dispatch loop from the storage backend:
//!
//! - [`SchedulerRepository`] - scheduler rows and run bookkeeping
//! - [`EpisodeRepository`] - Audio rows and the append-only
//!   GeneratedAudio join
//! - [`CategoryRepository`] - read-mostly category lookup
//!
//! [`SqliteDatabase`] is the production backend; [`MemoryDatabase`] is
//! the in-memory implementation used by tests.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Audio, Category, GeneratedAudio, Scheduler, Topic};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDatabase;
pub use sqlite::SqliteDatabase;

/// Repository for scheduler rows
pub trait SchedulerRepository: Send + Sync {
    /// Insert a new scheduler
    fn insert_scheduler(&self, scheduler: &Scheduler) -> Result<()>;

    /// Fetch a scheduler by id
    fn get_scheduler(&self, id: &str) -> Result<Option<Scheduler>>;

    /// All active schedulers
    fn list_active_schedulers(&self) -> Result<Vec<Scheduler>>;

    /// Schedulers where `active AND next_run_at <= now`
    ///
    /// No lease or claim guards this read; two concurrent dispatch
    /// invocations can both select the same due scheduler.
    fn due_schedulers(&self, now: DateTime<Utc>) -> Result<Vec<Scheduler>>;

    /// Persist the topic list and cursor
    fn update_topics(&self, id: &str, topics: &[Topic], cursor: usize) -> Result<()>;

    /// Persist run bookkeeping; called after every attempt, success or
    /// failure. `next_run_at = None` marks the scheduler stalled.
    fn update_run_bookkeeping(
        &self,
        id: &str,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Bump the success counter; called only after full persistence
    fn increment_total_generated(&self, id: &str) -> Result<()>;
}

/// Repository for episodes and the scheduler/episode join
pub trait EpisodeRepository: Send + Sync {
    /// Insert a finished episode
    fn insert_audio(&self, audio: &Audio) -> Result<()>;

    /// Fetch an episode by id
    fn get_audio(&self, id: &str) -> Result<Option<Audio>>;

    /// Append a scheduler/episode join row (audit trail, never mutated)
    fn insert_generated_audio(&self, row: &GeneratedAudio) -> Result<()>;

    /// Titles of the most recently produced episodes for a scheduler,
    /// newest first, bounded by `limit`
    fn recent_titles(&self, scheduler_id: &str, limit: usize) -> Result<Vec<String>>;
}

/// Repository for category metadata
pub trait CategoryRepository: Send + Sync {
    /// Insert a category
    fn insert_category(&self, category: &Category) -> Result<()>;

    /// Fetch a category by id
    fn get_category(&self, id: &str) -> Result<Option<Category>>;
}

/// Combined storage surface consumed by the pipeline and dispatch loop
pub trait Store: SchedulerRepository + EpisodeRepository + CategoryRepository {}

impl<T: SchedulerRepository + EpisodeRepository + CategoryRepository> Store for T {}
