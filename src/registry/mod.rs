//! Scheduler registry
//!
//! Owns one timer task per active scheduler. Each task sleeps until the
//! scheduler's next cron fire time, triggers a run through the
//! dispatcher, and recomputes. The registry is the single writer of the
//! task map: scheduling an id that already has a task replaces it, so
//! at most one task exists per scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::cron;
use crate::dispatch::Dispatcher;
use crate::models::Scheduler;
use crate::storage::{SchedulerRepository, Store};

/// Keeps one live timer task per active scheduler
pub struct SchedulerRegistry {
    store: Arc<dyn Store>,
    dispatcher: Arc<Dispatcher>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    started: AtomicBool,
}

impl SchedulerRegistry {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            tasks: Mutex::new(HashMap::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Spawn timers for every active scheduler; idempotent
    pub fn initialize(&self) -> anyhow::Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("registry already initialized");
            return Ok(());
        }

        let active = self.store.list_active_schedulers()?;
        tracing::info!(count = active.len(), "initializing scheduler registry");

        for scheduler in active {
            self.schedule(&scheduler);
        }
        Ok(())
    }

    /// Create (or replace) the timer task for one scheduler
    pub fn schedule(&self, scheduler: &Scheduler) {
        let id = scheduler.id.clone();
        let expression = scheduler.cron_expression.clone();
        let dispatcher = self.dispatcher.clone();

        let handle = tokio::spawn(async move {
            loop {
                let next = match cron::next_run(&expression, Utc::now()) {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::error!(
                            scheduler_id = %id,
                            expression = %expression,
                            error = %e,
                            "cron expression unusable, timer exiting"
                        );
                        break;
                    }
                };

                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tracing::debug!(scheduler_id = %id, fire_at = %next, "timer armed");
                tokio::time::sleep(wait).await;

                if let Err(e) = dispatcher.run_one(&id).await {
                    tracing::error!(scheduler_id = %id, error = %e, "timer-triggered run failed");
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap();
        if let Some(old) = tasks.insert(scheduler.id.clone(), handle) {
            old.abort();
            tracing::debug!(scheduler_id = %scheduler.id, "replaced existing timer");
        }
    }

    /// Abort and forget the timer for one scheduler, if any
    pub fn stop(&self, scheduler_id: &str) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(scheduler_id) {
            handle.abort();
            tracing::info!(scheduler_id = %scheduler_id, "timer stopped");
        }
    }

    /// Re-read one scheduler and reconcile its timer with stored state
    ///
    /// Deleted or deactivated schedulers lose their timer; everything
    /// else gets a fresh one reflecting the current cron expression.
    pub fn refresh(&self, scheduler_id: &str) -> anyhow::Result<()> {
        match self.store.get_scheduler(scheduler_id)? {
            Some(scheduler) if scheduler.active => self.schedule(&scheduler),
            _ => self.stop(scheduler_id),
        }
        Ok(())
    }

    /// Abort every timer
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
        self.started.store(false, Ordering::SeqCst);
    }

    /// Number of live timer tasks
    pub fn task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Whether a timer task exists and has not exited
    pub fn is_running(&self, scheduler_id: &str) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(scheduler_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SchedulerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
