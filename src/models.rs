//! Core data structures for the sori generation pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content acquisition mode for a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Use the stored prompt verbatim
    Single,
    /// Synthesize the prompt via a search-augmented generation call
    Search,
    /// Consume the next entry from the ordered topic list
    List,
}

impl GenerationMode {
    /// Convert to string representation (database column value)
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Single => "single",
            GenerationMode::Search => "search",
            GenerationMode::List => "list",
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(GenerationMode::Single),
            "search" => Ok(GenerationMode::Search),
            "list" => Ok(GenerationMode::List),
            other => Err(format!("unknown generation mode: {other}")),
        }
    }
}

/// One entry in a list-mode scheduler's topic queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Topic {
    /// Create a topic with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    /// Create a topic with a title and description
    pub fn with_description(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: Some(description.into()),
        }
    }

    /// Render the topic as a content prompt (title plus optional description)
    pub fn as_prompt(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => format!("{}\n{}", self.title, desc),
            _ => self.title.clone(),
        }
    }
}

/// A configured, periodically-triggered content-generation recipe
///
/// Non-list-mode fields (`topics`, `topic_cursor`, replenishment knobs)
/// are inert for other modes but always preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduler {
    pub id: String,
    pub category_id: String,
    pub mode: GenerationMode,

    /// Prompt text (single mode: used verbatim; search mode: the query)
    pub prompt: String,

    /// Search-synthesis system instruction (search mode only)
    pub search_instruction: Option<String>,

    /// Ordered topic queue (list mode only)
    pub topics: Vec<Topic>,

    /// 0-based index of the next topic to consume; `cursor == topics.len()`
    /// means exhausted
    pub topic_cursor: usize,

    pub auto_replenish: bool,
    pub replenish_threshold: usize,
    pub replenish_batch_size: usize,

    /// 5-field cron expression
    pub cron_expression: String,

    pub active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,

    /// Monotonic count of fully persisted episodes
    pub total_generated: u64,

    pub created_at: DateTime<Utc>,
}

impl Scheduler {
    /// Create a new scheduler with a fresh UUID
    pub fn new(category_id: impl Into<String>, mode: GenerationMode, cron: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category_id: category_id.into(),
            mode,
            prompt: String::new(),
            search_instruction: None,
            topics: Vec::new(),
            topic_cursor: 0,
            auto_replenish: false,
            replenish_threshold: 3,
            replenish_batch_size: 5,
            cron_expression: cron.into(),
            active: true,
            last_run_at: None,
            next_run_at: None,
            total_generated: 0,
            created_at: Utc::now(),
        }
    }

    /// Number of topics not yet consumed
    pub fn topics_remaining(&self) -> usize {
        self.topics.len().saturating_sub(self.topic_cursor)
    }

    /// Check if the scheduler is due at the given instant
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_run_at.is_some_and(|t| t <= now)
    }
}

/// Category metadata consumed for prompt construction and voice selection
///
/// Read-mostly: the pipeline never mutates categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub paid: bool,
    pub presenter_name: String,
    pub presenter_persona: String,
    pub voice_id: String,
}

/// A finished, published episode
///
/// Created atomically only after a successful audio upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audio {
    pub id: String,
    pub title: String,
    pub publish_date: DateTime<Utc>,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub description: String,
    pub script: String,
    pub duration_secs: u32,
    pub category_id: String,
}

impl Audio {
    /// Estimate playback duration from MPEG payload size (128 kbit/s)
    pub fn estimate_duration_secs(payload_bytes: usize) -> u32 {
        (payload_bytes / 16_000) as u32
    }
}

/// Append-only join row linking a scheduler to an episode it produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAudio {
    pub scheduler_id: String,
    pub audio_id: String,
    pub created_at: DateTime<Utc>,
}

/// Result of one pipeline run for one scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub audio_id: Option<String>,
    pub error: Option<String>,
    /// Topic title consumed by a list-mode run, if any
    pub used_topic: Option<String>,
}

impl RunOutcome {
    /// Successful run
    pub fn success(audio_id: impl Into<String>, used_topic: Option<String>) -> Self {
        Self {
            success: true,
            audio_id: Some(audio_id.into()),
            error: None,
            used_topic,
        }
    }

    /// Failed run
    pub fn failure(error: impl Into<String>, used_topic: Option<String>) -> Self {
        Self {
            success: false,
            audio_id: None,
            error: Some(error.into()),
            used_topic,
        }
    }
}
