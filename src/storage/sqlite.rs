//! SQLite-backed repository implementation

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{CategoryRepository, EpisodeRepository, SchedulerRepository};
use crate::models::{Audio, Category, GeneratedAudio, Scheduler, Topic};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schedulers (
    id TEXT PRIMARY KEY,
    category_id TEXT NOT NULL,
    mode TEXT NOT NULL,
    prompt TEXT NOT NULL DEFAULT '',
    search_instruction TEXT,
    topics TEXT NOT NULL DEFAULT '[]',
    topic_cursor INTEGER NOT NULL DEFAULT 0,
    auto_replenish INTEGER NOT NULL DEFAULT 0,
    replenish_threshold INTEGER NOT NULL DEFAULT 3,
    replenish_batch_size INTEGER NOT NULL DEFAULT 5,
    cron_expression TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    last_run_at TEXT,
    next_run_at TEXT,
    total_generated INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audios (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    publish_date TEXT NOT NULL,
    audio_url TEXT NOT NULL,
    image_url TEXT,
    description TEXT NOT NULL,
    script TEXT NOT NULL,
    duration_secs INTEGER NOT NULL,
    category_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS generated_audios (
    scheduler_id TEXT NOT NULL,
    audio_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (scheduler_id, audio_id)
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    paid INTEGER NOT NULL DEFAULT 0,
    presenter_name TEXT NOT NULL,
    presenter_persona TEXT NOT NULL,
    voice_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_schedulers_due
    ON schedulers (active, next_run_at);
CREATE INDEX IF NOT EXISTS idx_generated_scheduler
    ON generated_audios (scheduler_id, created_at);
"#;

/// SQLite database holding schedulers, episodes, and categories
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Open (or create) the database at `path` and apply the schema
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {}", path.as_ref().display()))?;
        conn.execute_batch(SCHEMA).context("Failed to apply schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn scheduler_from_row(row: &Row<'_>) -> rusqlite::Result<Scheduler> {
        let mode: String = row.get("mode")?;
        let topics_json: String = row.get("topics")?;
        let topics: Vec<Topic> = serde_json::from_str(&topics_json).unwrap_or_default();

        Ok(Scheduler {
            id: row.get("id")?,
            category_id: row.get("category_id")?,
            mode: mode.parse().unwrap_or(crate::models::GenerationMode::Single),
            prompt: row.get("prompt")?,
            search_instruction: row.get("search_instruction")?,
            topics,
            topic_cursor: row.get::<_, i64>("topic_cursor")? as usize,
            auto_replenish: row.get("auto_replenish")?,
            replenish_threshold: row.get::<_, i64>("replenish_threshold")? as usize,
            replenish_batch_size: row.get::<_, i64>("replenish_batch_size")? as usize,
            cron_expression: row.get("cron_expression")?,
            active: row.get("active")?,
            last_run_at: parse_timestamp(row.get::<_, Option<String>>("last_run_at")?),
            next_run_at: parse_timestamp(row.get::<_, Option<String>>("next_run_at")?),
            total_generated: row.get::<_, i64>("total_generated")? as u64,
            created_at: parse_timestamp(Some(row.get("created_at")?)).unwrap_or_else(Utc::now),
        })
    }

    fn audio_from_row(row: &Row<'_>) -> rusqlite::Result<Audio> {
        Ok(Audio {
            id: row.get("id")?,
            title: row.get("title")?,
            publish_date: parse_timestamp(Some(row.get("publish_date")?))
                .unwrap_or_else(Utc::now),
            audio_url: row.get("audio_url")?,
            image_url: row.get("image_url")?,
            description: row.get("description")?,
            script: row.get("script")?,
            duration_secs: row.get::<_, i64>("duration_secs")? as u32,
            category_id: row.get("category_id")?,
        })
    }
}

fn parse_timestamp(text: Option<String>) -> Option<DateTime<Utc>> {
    text.and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn fmt_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

impl SchedulerRepository for SqliteDatabase {
    fn insert_scheduler(&self, scheduler: &Scheduler) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO schedulers
               (id, category_id, mode, prompt, search_instruction, topics, topic_cursor,
                auto_replenish, replenish_threshold, replenish_batch_size,
                cron_expression, active, last_run_at, next_run_at, total_generated, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"#,
            params![
                scheduler.id,
                scheduler.category_id,
                scheduler.mode.as_str(),
                scheduler.prompt,
                scheduler.search_instruction,
                serde_json::to_string(&scheduler.topics)?,
                scheduler.topic_cursor as i64,
                scheduler.auto_replenish,
                scheduler.replenish_threshold as i64,
                scheduler.replenish_batch_size as i64,
                scheduler.cron_expression,
                scheduler.active,
                scheduler.last_run_at.map(fmt_timestamp),
                scheduler.next_run_at.map(fmt_timestamp),
                scheduler.total_generated as i64,
                fmt_timestamp(scheduler.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_scheduler(&self, id: &str) -> Result<Option<Scheduler>> {
        let conn = self.conn.lock().unwrap();
        let scheduler = conn
            .query_row(
                "SELECT * FROM schedulers WHERE id = ?1",
                params![id],
                Self::scheduler_from_row,
            )
            .optional()?;
        Ok(scheduler)
    }

    fn list_active_schedulers(&self) -> Result<Vec<Scheduler>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM schedulers WHERE active = 1")?;
        let rows = stmt.query_map([], Self::scheduler_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn due_schedulers(&self, now: DateTime<Utc>) -> Result<Vec<Scheduler>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM schedulers
             WHERE active = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?1",
        )?;
        let rows = stmt.query_map(params![fmt_timestamp(now)], Self::scheduler_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_topics(&self, id: &str, topics: &[Topic], cursor: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE schedulers SET topics = ?1, topic_cursor = ?2 WHERE id = ?3",
            params![serde_json::to_string(topics)?, cursor as i64, id],
        )?;
        Ok(())
    }

    fn update_run_bookkeeping(
        &self,
        id: &str,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE schedulers SET last_run_at = ?1, next_run_at = ?2 WHERE id = ?3",
            params![
                fmt_timestamp(last_run_at),
                next_run_at.map(fmt_timestamp),
                id
            ],
        )?;
        Ok(())
    }

    fn increment_total_generated(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE schedulers SET total_generated = total_generated + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }
}

impl EpisodeRepository for SqliteDatabase {
    fn insert_audio(&self, audio: &Audio) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO audios
               (id, title, publish_date, audio_url, image_url, description, script,
                duration_secs, category_id)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                audio.id,
                audio.title,
                fmt_timestamp(audio.publish_date),
                audio.audio_url,
                audio.image_url,
                audio.description,
                audio.script,
                audio.duration_secs as i64,
                audio.category_id,
            ],
        )?;
        Ok(())
    }

    fn get_audio(&self, id: &str) -> Result<Option<Audio>> {
        let conn = self.conn.lock().unwrap();
        let audio = conn
            .query_row(
                "SELECT * FROM audios WHERE id = ?1",
                params![id],
                Self::audio_from_row,
            )
            .optional()?;
        Ok(audio)
    }

    fn insert_generated_audio(&self, row: &GeneratedAudio) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO generated_audios (scheduler_id, audio_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![row.scheduler_id, row.audio_id, fmt_timestamp(row.created_at)],
        )?;
        Ok(())
    }

    fn recent_titles(&self, scheduler_id: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.title FROM generated_audios g
             JOIN audios a ON a.id = g.audio_id
             WHERE g.scheduler_id = ?1
             ORDER BY g.created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![scheduler_id, limit as i64], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl CategoryRepository for SqliteDatabase {
    fn insert_category(&self, category: &Category) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO categories
               (id, name, paid, presenter_name, presenter_persona, voice_id)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                category.id,
                category.name,
                category.paid,
                category.presenter_name,
                category.presenter_persona,
                category.voice_id,
            ],
        )?;
        Ok(())
    }

    fn get_category(&self, id: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock().unwrap();
        let category = conn
            .query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Category {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        paid: row.get("paid")?,
                        presenter_name: row.get("presenter_name")?,
                        presenter_persona: row.get("presenter_persona")?,
                        voice_id: row.get("voice_id")?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationMode;
    use chrono::Duration;

    fn sample_scheduler() -> Scheduler {
        let mut scheduler = Scheduler::new("cat-1", GenerationMode::List, "0 9 * * *");
        scheduler.prompt = String::from("daily news");
        scheduler.topics = vec![Topic::new("A"), Topic::with_description("B", "details")];
        scheduler.next_run_at = Some(Utc::now() - Duration::minutes(5));
        scheduler
    }

    #[test]
    fn test_scheduler_roundtrip() {
        let db = SqliteDatabase::in_memory().unwrap();
        let scheduler = sample_scheduler();
        db.insert_scheduler(&scheduler).unwrap();

        let loaded = db.get_scheduler(&scheduler.id).unwrap().unwrap();
        assert_eq!(loaded.mode, GenerationMode::List);
        assert_eq!(loaded.topics.len(), 2);
        assert_eq!(loaded.topics[1].description.as_deref(), Some("details"));
        assert_eq!(loaded.cron_expression, "0 9 * * *");
        assert_eq!(loaded.total_generated, 0);
    }

    #[test]
    fn test_due_selection() {
        let db = SqliteDatabase::in_memory().unwrap();
        let now = Utc::now();

        let mut due = sample_scheduler();
        due.next_run_at = Some(now - Duration::minutes(1));
        db.insert_scheduler(&due).unwrap();

        let mut not_due = sample_scheduler();
        not_due.next_run_at = Some(now + Duration::hours(1));
        db.insert_scheduler(&not_due).unwrap();

        let mut inactive = sample_scheduler();
        inactive.active = false;
        inactive.next_run_at = Some(now - Duration::minutes(1));
        db.insert_scheduler(&inactive).unwrap();

        let mut stalled = sample_scheduler();
        stalled.next_run_at = None;
        db.insert_scheduler(&stalled).unwrap();

        let selected = db.due_schedulers(now).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, due.id);
    }

    #[test]
    fn test_bookkeeping_and_counter() {
        let db = SqliteDatabase::in_memory().unwrap();
        let scheduler = sample_scheduler();
        db.insert_scheduler(&scheduler).unwrap();

        let ran_at = Utc::now();
        db.update_run_bookkeeping(&scheduler.id, ran_at, None).unwrap();
        db.increment_total_generated(&scheduler.id).unwrap();

        let loaded = db.get_scheduler(&scheduler.id).unwrap().unwrap();
        assert!(loaded.last_run_at.is_some());
        assert!(loaded.next_run_at.is_none());
        assert_eq!(loaded.total_generated, 1);
    }

    #[test]
    fn test_update_topics() {
        let db = SqliteDatabase::in_memory().unwrap();
        let scheduler = sample_scheduler();
        db.insert_scheduler(&scheduler).unwrap();

        let topics = vec![Topic::new("A"), Topic::new("B"), Topic::new("C")];
        db.update_topics(&scheduler.id, &topics, 1).unwrap();

        let loaded = db.get_scheduler(&scheduler.id).unwrap().unwrap();
        assert_eq!(loaded.topics.len(), 3);
        assert_eq!(loaded.topic_cursor, 1);
    }

    #[test]
    fn test_recent_titles_ordering() {
        let db = SqliteDatabase::in_memory().unwrap();
        let scheduler = sample_scheduler();
        db.insert_scheduler(&scheduler).unwrap();

        let base = Utc::now();
        for (i, title) in ["first", "second", "third"].iter().enumerate() {
            let audio = Audio {
                id: format!("audio-{i}"),
                title: title.to_string(),
                publish_date: base,
                audio_url: String::from("https://cdn.test/a.mp3"),
                image_url: None,
                description: String::new(),
                script: String::new(),
                duration_secs: 60,
                category_id: String::from("cat-1"),
            };
            db.insert_audio(&audio).unwrap();
            db.insert_generated_audio(&GeneratedAudio {
                scheduler_id: scheduler.id.clone(),
                audio_id: audio.id.clone(),
                created_at: base + Duration::seconds(i as i64),
            })
            .unwrap();
        }

        let titles = db.recent_titles(&scheduler.id, 2).unwrap();
        assert_eq!(titles, vec!["third", "second"]);
    }

    #[test]
    fn test_category_roundtrip() {
        let db = SqliteDatabase::in_memory().unwrap();
        let category = Category {
            id: String::from("cat-1"),
            name: String::from("Tech"),
            paid: true,
            presenter_name: String::from("Han"),
            presenter_persona: String::from("calm, analytical"),
            voice_id: String::from("voice-7"),
        };
        db.insert_category(&category).unwrap();

        let loaded = db.get_category("cat-1").unwrap().unwrap();
        assert_eq!(loaded.name, "Tech");
        assert!(loaded.paid);
        assert_eq!(loaded.voice_id, "voice-7");
        assert!(db.get_category("missing").unwrap().is_none());
    }
}
