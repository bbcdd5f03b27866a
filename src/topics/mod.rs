//! Topic list state management
//!
//! This module provides cursor-based consumption of a list-mode
//! scheduler's ordered topic queue and threshold-triggered
//! auto-replenishment through the text-generation service.
//!
//! Consumption is optimistic: the pipeline commits the cursor advance
//! when the topic is acquired, before the episode is confirmed, so a
//! failed run still consumes its topic. This matches the persisted
//! bookkeeping contract and is intentionally not transactional.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::models::Topic;
use crate::services::llm::extract_json;
use crate::services::TextGenerator;

/// Result type for topic operations
pub type TopicsResult<T> = Result<T, TopicsError>;

/// Topic queue errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicsError {
    /// Cursor has reached the end of the list; the run must hard-stop
    #[error("topic list exhausted (cursor {cursor} of {len})")]
    Exhausted { cursor: usize, len: usize },

    /// Replenishment reply could not be parsed into topics
    #[error("replenishment returned no usable topics: {reason}")]
    UnusableReplenishment { reason: String },
}

/// A topic plus the candidate cursor position after consuming it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAdvance {
    pub topic: Topic,
    pub next_cursor: usize,
}

// ============================================================================
// Topic Queue
// ============================================================================

/// Cursor-based view over an ordered topic list
///
/// `next()` never mutates; the caller commits the returned cursor.
#[derive(Debug, Clone)]
pub struct TopicQueue {
    topics: Vec<Topic>,
    cursor: usize,
}

impl TopicQueue {
    /// Create a queue from a scheduler's persisted state
    pub fn new(topics: Vec<Topic>, cursor: usize) -> Self {
        Self { topics, cursor }
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Full topic list, consumed entries included
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Number of topics not yet consumed
    pub fn remaining(&self) -> usize {
        self.topics.len().saturating_sub(self.cursor)
    }

    /// Peek the topic at the cursor and the candidate next cursor
    pub fn next(&self) -> TopicsResult<TopicAdvance> {
        if self.cursor >= self.topics.len() {
            return Err(TopicsError::Exhausted {
                cursor: self.cursor,
                len: self.topics.len(),
            });
        }

        Ok(TopicAdvance {
            topic: self.topics[self.cursor].clone(),
            next_cursor: self.cursor + 1,
        })
    }

    /// Commit a cursor advance obtained from [`next`](Self::next)
    pub fn commit(&mut self, next_cursor: usize) {
        debug_assert!(next_cursor <= self.topics.len());
        self.cursor = next_cursor;
    }

    /// Check whether remaining topics have fallen to the threshold
    pub fn needs_replenish(&self, threshold: usize) -> bool {
        self.remaining() <= threshold
    }

    /// Append replenished topics; never touches the cursor or existing
    /// entries
    pub fn append(&mut self, new_topics: Vec<Topic>) {
        self.topics.extend(new_topics);
    }

    /// Consume the queue back into its parts for persistence
    pub fn into_parts(self) -> (Vec<Topic>, usize) {
        (self.topics, self.cursor)
    }
}

// ============================================================================
// Replenisher
// ============================================================================

/// De-duplication context handed to the topic generator
#[derive(Debug, Clone)]
pub struct ReplenishContext<'a> {
    /// Presenter persona of the category
    pub persona: &'a str,
    /// Category name
    pub category_name: &'a str,
    /// Titles of recently produced episodes (bounded window)
    pub recent_titles: &'a [String],
    /// The full existing topic list
    pub existing: &'a [Topic],
    /// Number of topics to request
    pub batch_size: usize,
}

/// Wire shape tolerated from the LLM: either a bare array or a wrapper
#[derive(Debug, Deserialize)]
struct TopicBatch {
    #[serde(default)]
    topics: Vec<Topic>,
}

/// Generates replacement topics through the text-generation service
pub struct TopicReplenisher {
    generator: Arc<dyn TextGenerator>,
}

impl TopicReplenisher {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Request up to `batch_size` fresh topics
    ///
    /// Returns fewer when the service does; the caller appends whatever
    /// came back.
    pub async fn replenish(&self, ctx: ReplenishContext<'_>) -> TopicsResult<Vec<Topic>> {
        let prompt = self.build_prompt(&ctx);

        let reply = self.generator.generate(&prompt).await.map_err(|e| {
            TopicsError::UnusableReplenishment {
                reason: e.to_string(),
            }
        })?;

        let mut topics = Self::parse_topics(&reply)?;
        topics.truncate(ctx.batch_size);
        Ok(topics)
    }

    fn build_prompt(&self, ctx: &ReplenishContext<'_>) -> String {
        let recent = if ctx.recent_titles.is_empty() {
            String::from("(none yet)")
        } else {
            ctx.recent_titles.join("\n- ")
        };

        let existing = if ctx.existing.is_empty() {
            String::from("(empty)")
        } else {
            ctx.existing
                .iter()
                .map(|t| t.title.as_str())
                .collect::<Vec<_>>()
                .join("\n- ")
        };

        format!(
            r#"You plan episode topics for the podcast category "{category}".
The presenter persona is: {persona}

Propose {count} new episode topics.

## Rules:
1. Do not repeat or rephrase any episode already produced or any topic already queued.
2. Every topic needs a concise title; a one-sentence description is optional.
3. Output a JSON array only, no commentary.

## Recently produced episodes:
- {recent}

## Topics already queued:
- {existing}

## Output format (JSON):
```json
[
  {{"title": "Topic title", "description": "One sentence of angle or focus"}}
]
```

## New topics (JSON):"#,
            category = ctx.category_name,
            persona = ctx.persona,
            count = ctx.batch_size,
            recent = recent,
            existing = existing,
        )
    }

    fn parse_topics(reply: &str) -> TopicsResult<Vec<Topic>> {
        let json = extract_json(reply);

        if let Ok(topics) = serde_json::from_str::<Vec<Topic>>(&json) {
            return Self::non_empty(topics);
        }

        if let Ok(batch) = serde_json::from_str::<TopicBatch>(&json) {
            return Self::non_empty(batch.topics);
        }

        // Truncate on character boundaries; replies are frequently
        // non-ASCII and a byte slice could split a code point
        let preview: String = reply.chars().take(200).collect();
        tracing::warn!("unparseable replenishment reply (truncated): {}", preview);
        Err(TopicsError::UnusableReplenishment {
            reason: String::from("reply is not a topic array"),
        })
    }

    fn non_empty(topics: Vec<Topic>) -> TopicsResult<Vec<Topic>> {
        let topics: Vec<Topic> = topics.into_iter().filter(|t| !t.title.is_empty()).collect();
        if topics.is_empty() {
            return Err(TopicsError::UnusableReplenishment {
                reason: String::from("no topics with titles"),
            });
        }
        Ok(topics)
    }
}
