//! Dispatch loop
//!
//! Polls the store for due schedulers and runs the pipeline for each,
//! sequentially. Cadence bookkeeping always advances: whether a run
//! succeeds or fails, `last_run_at` is set to the execution instant and
//! `next_run_at` is recomputed from the cron expression anchored at that
//! same instant. A scheduler whose expression no longer parses gets a
//! NULL `next_run_at`, which drops it out of due-selection until an
//! operator fixes the expression.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cron;
use crate::models::{RunOutcome, Scheduler};
use crate::notify::RunNotifier;
use crate::pipeline::EpisodePipeline;
use crate::storage::{CategoryRepository, EpisodeRepository, SchedulerRepository, Store};

/// Result of dispatching one scheduler
#[derive(Debug)]
pub struct DispatchResult {
    pub scheduler_id: String,
    pub outcome: RunOutcome,
    /// Recomputed next fire time; `None` when the scheduler stalled or
    /// the run aborted before rescheduling
    pub next_run_at: Option<DateTime<Utc>>,
    /// Set when the cron expression failed to parse or match
    pub stalled: bool,
}

/// Runs due schedulers and keeps their cadence bookkeeping current
pub struct Dispatcher {
    store: Arc<dyn Store>,
    pipeline: Arc<EpisodePipeline>,
    notifier: Arc<RunNotifier>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        pipeline: Arc<EpisodePipeline>,
        notifier: Arc<RunNotifier>,
    ) -> Self {
        Self {
            store,
            pipeline,
            notifier,
        }
    }

    /// Run every scheduler that is active and due at `now`, sequentially
    ///
    /// Selection is a point-in-time read; a scheduler toggled inactive
    /// after selection still runs this tick. One result comes back per
    /// selected scheduler: a run that aborts on a storage error is
    /// recorded as a failure and the loop moves on.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<DispatchResult>> {
        let due = self.store.due_schedulers(now)?;
        if due.is_empty() {
            tracing::debug!("no schedulers due");
            return Ok(Vec::new());
        }

        tracing::info!(count = due.len(), "dispatching due schedulers");

        let mut results = Vec::with_capacity(due.len());
        for scheduler in &due {
            match self.run_scheduler(scheduler).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A storage error for one scheduler must not starve
                    // the rest of the due set
                    tracing::error!(
                        scheduler_id = %scheduler.id,
                        error = %e,
                        "scheduler run aborted, continuing"
                    );
                    results.push(DispatchResult {
                        scheduler_id: scheduler.id.clone(),
                        outcome: RunOutcome::failure(e.to_string(), None),
                        next_run_at: None,
                        stalled: false,
                    });
                }
            }
        }
        Ok(results)
    }

    /// Run one scheduler by id, regardless of due state
    ///
    /// Used by per-scheduler timers and manual triggers.
    pub async fn run_one(&self, scheduler_id: &str) -> anyhow::Result<DispatchResult> {
        let scheduler = self
            .store
            .get_scheduler(scheduler_id)?
            .ok_or_else(|| anyhow::anyhow!("scheduler not found: {scheduler_id}"))?;
        self.run_scheduler(&scheduler).await
    }

    async fn run_scheduler(&self, scheduler: &Scheduler) -> anyhow::Result<DispatchResult> {
        let executed_at = Utc::now();

        tracing::info!(
            scheduler_id = %scheduler.id,
            mode = %scheduler.mode.as_str(),
            "running scheduler"
        );

        let outcome = match self.store.get_category(&scheduler.category_id)? {
            Some(category) => self.pipeline.run(scheduler, &category).await,
            None => RunOutcome::failure(
                format!("category not found: {}", scheduler.category_id),
                None,
            ),
        };

        // Cadence advances unconditionally, anchored at the execution
        // instant rather than the run's end
        let (next_run_at, stalled) = match cron::next_run(&scheduler.cron_expression, executed_at) {
            Ok(next) => (Some(next), false),
            Err(e) => {
                tracing::error!(
                    scheduler_id = %scheduler.id,
                    expression = %scheduler.cron_expression,
                    error = %e,
                    "cron expression unusable, scheduler stalled"
                );
                (None, true)
            }
        };

        self.store
            .update_run_bookkeeping(&scheduler.id, executed_at, next_run_at)?;

        self.notify(scheduler, &outcome).await;

        Ok(DispatchResult {
            scheduler_id: scheduler.id.clone(),
            outcome,
            next_run_at,
            stalled,
        })
    }

    /// Notification failures are logged and swallowed; they never affect
    /// the run outcome or the cadence
    async fn notify(&self, scheduler: &Scheduler, outcome: &RunOutcome) {
        let sent = if outcome.success {
            let title = outcome
                .audio_id
                .as_deref()
                .and_then(|id| self.store.get_audio(id).ok().flatten())
                .map(|audio| audio.title);
            self.notifier
                .notify_success(&scheduler.id, title.as_deref().unwrap_or(""))
                .await
        } else {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            self.notifier.notify_failure(&scheduler.id, error).await
        };

        if let Err(e) = sent {
            tracing::warn!(
                scheduler_id = %scheduler.id,
                error = %e,
                "run notification failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, GenerationMode};
    use crate::notify::RunNotifier;
    use crate::services::mock::{
        MockImageSearch, MockObjectStorage, MockSearchGenerator, MockSpeechSynthesizer,
        MockTextGenerator,
    };
    use crate::storage::{MemoryDatabase, SchedulerRepository};
    use chrono::Duration;

    fn dispatcher(store: Arc<MemoryDatabase>, tts_fails: bool) -> Dispatcher {
        let tts: Arc<MockSpeechSynthesizer> = if tts_fails {
            Arc::new(MockSpeechSynthesizer::failing())
        } else {
            Arc::new(MockSpeechSynthesizer::new(vec![0u8; 16_000]))
        };
        let pipeline = EpisodePipeline::new(
            Arc::new(MockTextGenerator::new().with_default("script")),
            Arc::new(MockSearchGenerator::new("searched")),
            tts,
            Arc::new(MockImageSearch::empty()),
            Arc::new(MockObjectStorage::new()),
            store.clone(),
        );
        Dispatcher::new(store, Arc::new(pipeline), Arc::new(RunNotifier::disabled()))
    }

    fn seed_category(store: &MemoryDatabase) {
        store
            .insert_category(&Category {
                id: String::from("cat-1"),
                name: String::from("Tech"),
                paid: false,
                presenter_name: String::from("Han"),
                presenter_persona: String::from("calm"),
                voice_id: String::from("voice-7"),
            })
            .unwrap();
    }

    fn scheduler_due(now: DateTime<Utc>) -> Scheduler {
        let mut s = Scheduler::new("cat-1", GenerationMode::Single, "0 9 * * *");
        s.prompt = String::from("subject");
        s.next_run_at = Some(now - Duration::minutes(1));
        s
    }

    use crate::storage::CategoryRepository;

    /// Delegating store whose category lookups fail for one poisoned id
    struct FaultyCategoryStore {
        inner: MemoryDatabase,
        broken_category: &'static str,
    }

    impl SchedulerRepository for FaultyCategoryStore {
        fn insert_scheduler(&self, scheduler: &Scheduler) -> anyhow::Result<()> {
            self.inner.insert_scheduler(scheduler)
        }

        fn get_scheduler(&self, id: &str) -> anyhow::Result<Option<Scheduler>> {
            self.inner.get_scheduler(id)
        }

        fn list_active_schedulers(&self) -> anyhow::Result<Vec<Scheduler>> {
            self.inner.list_active_schedulers()
        }

        fn due_schedulers(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Scheduler>> {
            self.inner.due_schedulers(now)
        }

        fn update_topics(
            &self,
            id: &str,
            topics: &[crate::models::Topic],
            cursor: usize,
        ) -> anyhow::Result<()> {
            self.inner.update_topics(id, topics, cursor)
        }

        fn update_run_bookkeeping(
            &self,
            id: &str,
            last_run_at: DateTime<Utc>,
            next_run_at: Option<DateTime<Utc>>,
        ) -> anyhow::Result<()> {
            self.inner.update_run_bookkeeping(id, last_run_at, next_run_at)
        }

        fn increment_total_generated(&self, id: &str) -> anyhow::Result<()> {
            self.inner.increment_total_generated(id)
        }
    }

    impl EpisodeRepository for FaultyCategoryStore {
        fn insert_audio(&self, audio: &crate::models::Audio) -> anyhow::Result<()> {
            self.inner.insert_audio(audio)
        }

        fn get_audio(&self, id: &str) -> anyhow::Result<Option<crate::models::Audio>> {
            self.inner.get_audio(id)
        }

        fn insert_generated_audio(
            &self,
            row: &crate::models::GeneratedAudio,
        ) -> anyhow::Result<()> {
            self.inner.insert_generated_audio(row)
        }

        fn recent_titles(&self, scheduler_id: &str, limit: usize) -> anyhow::Result<Vec<String>> {
            self.inner.recent_titles(scheduler_id, limit)
        }
    }

    impl CategoryRepository for FaultyCategoryStore {
        fn insert_category(&self, category: &Category) -> anyhow::Result<()> {
            self.inner.insert_category(category)
        }

        fn get_category(&self, id: &str) -> anyhow::Result<Option<Category>> {
            if id == self.broken_category {
                anyhow::bail!("category table unavailable");
            }
            self.inner.get_category(id)
        }
    }

    #[tokio::test]
    async fn test_dispatch_selects_only_active_and_due() {
        let store = Arc::new(MemoryDatabase::new());
        seed_category(&store);
        let now = Utc::now();

        let due = scheduler_due(now);
        store.insert_scheduler(&due).unwrap();

        let mut not_due = scheduler_due(now);
        not_due.next_run_at = Some(now + Duration::hours(1));
        store.insert_scheduler(&not_due).unwrap();

        let mut inactive = scheduler_due(now);
        inactive.active = false;
        store.insert_scheduler(&inactive).unwrap();

        let results = dispatcher(store.clone(), false).dispatch_due(now).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].scheduler_id, due.id);
        assert!(results[0].outcome.success);
    }

    #[tokio::test]
    async fn test_bookkeeping_advances_on_failure() {
        let store = Arc::new(MemoryDatabase::new());
        seed_category(&store);
        let now = Utc::now();

        let scheduler = scheduler_due(now);
        store.insert_scheduler(&scheduler).unwrap();

        let results = dispatcher(store.clone(), true).dispatch_due(now).await.unwrap();
        assert!(!results[0].outcome.success);

        // The failed run still advanced the cadence
        let loaded = store.get_scheduler(&scheduler.id).unwrap().unwrap();
        assert!(loaded.last_run_at.is_some());
        let next = loaded.next_run_at.unwrap();
        assert!(next > now);

        // No longer due this tick
        let again = dispatcher(store.clone(), true)
            .dispatch_due(now + Duration::seconds(1))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_cron_stalls_scheduler() {
        let store = Arc::new(MemoryDatabase::new());
        seed_category(&store);
        let now = Utc::now();

        let mut scheduler = scheduler_due(now);
        scheduler.cron_expression = String::from("not a cron");
        store.insert_scheduler(&scheduler).unwrap();

        let results = dispatcher(store.clone(), false).dispatch_due(now).await.unwrap();
        assert!(results[0].stalled);
        assert!(results[0].next_run_at.is_none());

        let loaded = store.get_scheduler(&scheduler.id).unwrap().unwrap();
        assert!(loaded.last_run_at.is_some());
        assert!(loaded.next_run_at.is_none());

        // NULL next_run_at drops it out of selection
        let again = dispatcher(store.clone(), false)
            .dispatch_due(now + Duration::hours(1))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_missing_category_fails_run_but_advances() {
        let store = Arc::new(MemoryDatabase::new());
        let now = Utc::now();

        let scheduler = scheduler_due(now);
        store.insert_scheduler(&scheduler).unwrap();

        let results = dispatcher(store.clone(), false).dispatch_due(now).await.unwrap();
        assert!(!results[0].outcome.success);
        assert!(results[0]
            .outcome
            .error
            .as_deref()
            .unwrap()
            .contains("category not found"));

        let loaded = store.get_scheduler(&scheduler.id).unwrap().unwrap();
        assert!(loaded.next_run_at.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_continues_past_store_error() {
        let inner = MemoryDatabase::new();
        seed_category(&inner);
        let now = Utc::now();

        let mut broken = scheduler_due(now);
        broken.category_id = String::from("cat-broken");
        inner.insert_scheduler(&broken).unwrap();

        let healthy = scheduler_due(now);
        inner.insert_scheduler(&healthy).unwrap();

        let store = Arc::new(FaultyCategoryStore {
            inner,
            broken_category: "cat-broken",
        });
        let pipeline = EpisodePipeline::new(
            Arc::new(MockTextGenerator::new().with_default("script")),
            Arc::new(MockSearchGenerator::new("searched")),
            Arc::new(MockSpeechSynthesizer::new(vec![0u8; 16_000])),
            Arc::new(MockImageSearch::empty()),
            Arc::new(MockObjectStorage::new()),
            store.clone(),
        );
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(pipeline),
            Arc::new(RunNotifier::disabled()),
        );

        // One result per due scheduler, even though one run aborted on
        // a storage error
        let results = dispatcher.dispatch_due(now).await.unwrap();
        assert_eq!(results.len(), 2);

        let aborted = results
            .iter()
            .find(|r| r.scheduler_id == broken.id)
            .unwrap();
        assert!(!aborted.outcome.success);
        assert!(aborted
            .outcome
            .error
            .as_deref()
            .unwrap()
            .contains("category table unavailable"));
        assert!(aborted.next_run_at.is_none());
        assert!(!aborted.stalled);

        let ran = results
            .iter()
            .find(|r| r.scheduler_id == healthy.id)
            .unwrap();
        assert!(ran.outcome.success);
        assert!(ran.next_run_at.is_some());
    }

    #[tokio::test]
    async fn test_run_one_ignores_due_state() {
        let store = Arc::new(MemoryDatabase::new());
        seed_category(&store);
        let now = Utc::now();

        let mut scheduler = scheduler_due(now);
        scheduler.next_run_at = Some(now + Duration::hours(5));
        store.insert_scheduler(&scheduler).unwrap();

        let result = dispatcher(store.clone(), false)
            .run_one(&scheduler.id)
            .await
            .unwrap();
        assert!(result.outcome.success);
    }

    #[tokio::test]
    async fn test_run_one_unknown_id_is_error() {
        let store = Arc::new(MemoryDatabase::new());
        let err = dispatcher(store, false).run_one("missing").await.unwrap_err();
        assert!(err.to_string().contains("scheduler not found"));
    }
}
