//! In-memory repository implementation for testing

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::{CategoryRepository, EpisodeRepository, SchedulerRepository};
use crate::models::{Audio, Category, GeneratedAudio, Scheduler, Topic};

/// In-memory database mirroring [`super::SqliteDatabase`]
#[derive(Default)]
pub struct MemoryDatabase {
    schedulers: RwLock<HashMap<String, Scheduler>>,
    audios: RwLock<HashMap<String, Audio>>,
    generated: RwLock<Vec<GeneratedAudio>>,
    categories: RwLock<HashMap<String, Category>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored episodes (test assertion helper)
    pub fn audio_count(&self) -> usize {
        self.audios.read().unwrap().len()
    }

    /// Number of join rows (test assertion helper)
    pub fn generated_count(&self) -> usize {
        self.generated.read().unwrap().len()
    }
}

impl SchedulerRepository for MemoryDatabase {
    fn insert_scheduler(&self, scheduler: &Scheduler) -> Result<()> {
        self.schedulers
            .write()
            .unwrap()
            .insert(scheduler.id.clone(), scheduler.clone());
        Ok(())
    }

    fn get_scheduler(&self, id: &str) -> Result<Option<Scheduler>> {
        Ok(self.schedulers.read().unwrap().get(id).cloned())
    }

    fn list_active_schedulers(&self) -> Result<Vec<Scheduler>> {
        Ok(self
            .schedulers
            .read()
            .unwrap()
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }

    fn due_schedulers(&self, now: DateTime<Utc>) -> Result<Vec<Scheduler>> {
        Ok(self
            .schedulers
            .read()
            .unwrap()
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect())
    }

    fn update_topics(&self, id: &str, topics: &[Topic], cursor: usize) -> Result<()> {
        if let Some(scheduler) = self.schedulers.write().unwrap().get_mut(id) {
            scheduler.topics = topics.to_vec();
            scheduler.topic_cursor = cursor;
        }
        Ok(())
    }

    fn update_run_bookkeeping(
        &self,
        id: &str,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(scheduler) = self.schedulers.write().unwrap().get_mut(id) {
            scheduler.last_run_at = Some(last_run_at);
            scheduler.next_run_at = next_run_at;
        }
        Ok(())
    }

    fn increment_total_generated(&self, id: &str) -> Result<()> {
        if let Some(scheduler) = self.schedulers.write().unwrap().get_mut(id) {
            scheduler.total_generated += 1;
        }
        Ok(())
    }
}

impl EpisodeRepository for MemoryDatabase {
    fn insert_audio(&self, audio: &Audio) -> Result<()> {
        self.audios
            .write()
            .unwrap()
            .insert(audio.id.clone(), audio.clone());
        Ok(())
    }

    fn get_audio(&self, id: &str) -> Result<Option<Audio>> {
        Ok(self.audios.read().unwrap().get(id).cloned())
    }

    fn insert_generated_audio(&self, row: &GeneratedAudio) -> Result<()> {
        self.generated.write().unwrap().push(row.clone());
        Ok(())
    }

    fn recent_titles(&self, scheduler_id: &str, limit: usize) -> Result<Vec<String>> {
        let generated = self.generated.read().unwrap();
        let audios = self.audios.read().unwrap();

        let mut rows: Vec<&GeneratedAudio> = generated
            .iter()
            .filter(|g| g.scheduler_id == scheduler_id)
            .collect();
        rows.sort_by_key(|g| std::cmp::Reverse(g.created_at));

        Ok(rows
            .into_iter()
            .take(limit)
            .filter_map(|g| audios.get(&g.audio_id).map(|a| a.title.clone()))
            .collect())
    }
}

impl CategoryRepository for MemoryDatabase {
    fn insert_category(&self, category: &Category) -> Result<()> {
        self.categories
            .write()
            .unwrap()
            .insert(category.id.clone(), category.clone());
        Ok(())
    }

    fn get_category(&self, id: &str) -> Result<Option<Category>> {
        Ok(self.categories.read().unwrap().get(id).cloned())
    }
}
