//! Content generation pipeline
//!
//! One pipeline run turns a resolved scheduler + category into a
//! finished, uploaded, persisted episode:
//!
//! 1. Acquire the content prompt (mode dispatch: single / search / list)
//! 2. Draft the spoken script
//! 3. Clean the script (LLM pass, then the deterministic regex floor)
//! 4. Derive metadata (summary, title) with deterministic fallbacks
//! 5. Look up a thumbnail photo (non-fatal)
//! 6. Synthesize speech (fatal on failure)
//! 7. Upload audio, persist the Audio and join rows, bump the counter
//!
//! Invariant: an Audio row exists if and only if audio bytes were
//! produced and durably uploaded. Steps 4 and 5 degrade to fallbacks;
//! steps 1 (exhaustion), 2, 6, and 7 abort the run.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    Audio, Category, GeneratedAudio, GenerationMode, RunOutcome, Scheduler,
};
use crate::services::object_store::sanitize_filename;
use crate::services::{ImageSearch, ObjectStorage, SearchGenerator, SpeechSynthesizer, TextGenerator};
use crate::storage::{EpisodeRepository, SchedulerRepository, Store};
use crate::topics::{ReplenishContext, TopicQueue, TopicReplenisher};

pub mod cleanup;
mod error;

pub use error::{PipelineError, PipelineResult};

/// Bounded window of recent episode titles fed to replenishment
const RECENT_TITLE_WINDOW: usize = 10;

/// Storage folder for uploaded episodes
const AUDIO_FOLDER: &str = "episodes";

/// Maximum length of the LLM-derived short title, in characters
const SHORT_TITLE_MAX_CHARS: usize = 15;

// ============================================================================
// Pipeline
// ============================================================================

/// Orchestrates one episode generation run per scheduler
pub struct EpisodePipeline {
    text: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchGenerator>,
    tts: Arc<dyn SpeechSynthesizer>,
    images: Arc<dyn ImageSearch>,
    storage: Arc<dyn ObjectStorage>,
    store: Arc<dyn Store>,
    replenisher: TopicReplenisher,
}

impl EpisodePipeline {
    /// Create a pipeline over the given services and store
    pub fn new(
        text: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchGenerator>,
        tts: Arc<dyn SpeechSynthesizer>,
        images: Arc<dyn ImageSearch>,
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn Store>,
    ) -> Self {
        let replenisher = TopicReplenisher::new(text.clone());
        Self {
            text,
            search,
            tts,
            images,
            storage,
            store,
            replenisher,
        }
    }

    /// Run the pipeline for one scheduler
    ///
    /// Never panics or propagates; every failure lands in the outcome so
    /// the dispatch loop can keep advancing the cadence.
    pub async fn run(&self, scheduler: &Scheduler, category: &Category) -> RunOutcome {
        let mut used_topic = None;

        match self.execute(scheduler, category, &mut used_topic).await {
            Ok(audio_id) => {
                tracing::info!(
                    scheduler_id = %scheduler.id,
                    audio_id = %audio_id,
                    "pipeline run succeeded"
                );
                RunOutcome::success(audio_id, used_topic)
            }
            Err(err) => {
                tracing::warn!(
                    scheduler_id = %scheduler.id,
                    error = %err,
                    "pipeline run failed"
                );
                RunOutcome::failure(err.to_string(), used_topic)
            }
        }
    }

    async fn execute(
        &self,
        scheduler: &Scheduler,
        category: &Category,
        used_topic: &mut Option<String>,
    ) -> PipelineResult<String> {
        // Configuration checks happen before any side effect
        if category.voice_id.is_empty() {
            return Err(PipelineError::config(format!(
                "category '{}' has no voice id",
                category.name
            )));
        }

        // Step 1: content prompt
        let content_prompt = self
            .acquire_content_prompt(scheduler, category, used_topic)
            .await?;

        // Step 2: script draft
        let draft = self
            .text
            .generate(&prompts::script(category, &content_prompt))
            .await
            .map_err(|e| PipelineError::ScriptDraft(e.to_string()))?;

        // Step 3: two-layer cleanup; the regex floor runs unconditionally
        let script = match self.text.generate(&prompts::cleanup(&draft)).await {
            Ok(cleaned) => cleaned,
            Err(e) => {
                tracing::warn!(error = %e, "LLM cleanup pass failed, regex floor only");
                draft
            }
        };
        let script = cleanup::strip_annotations(&script);

        let now = Utc::now();

        // Step 4: derived metadata, each with a deterministic fallback
        let description = self.derive_description(category, &script, now).await;
        let title = self.derive_title(category, &script, now).await;

        // Step 5: illustration, non-fatal
        let image_url = self.find_illustration(category, &script).await;

        // Step 6: speech synthesis
        let audio_bytes = self
            .tts
            .synthesize(&script, &category.voice_id)
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        // Step 7: durable upload, then persistence
        let key = storage_key(&title, now);
        let audio_url = self
            .storage
            .upload(audio_bytes.clone(), AUDIO_FOLDER, &key, "audio/mpeg")
            .await
            .map_err(|e| PipelineError::Upload(e.to_string()))?;

        let audio = Audio {
            id: Uuid::new_v4().to_string(),
            title,
            publish_date: now,
            audio_url,
            image_url,
            description,
            script,
            duration_secs: Audio::estimate_duration_secs(audio_bytes.len()),
            category_id: category.id.clone(),
        };

        self.store
            .insert_audio(&audio)
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        self.store
            .insert_generated_audio(&GeneratedAudio {
                scheduler_id: scheduler.id.clone(),
                audio_id: audio.id.clone(),
                created_at: now,
            })
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        self.store
            .increment_total_generated(&scheduler.id)
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;

        Ok(audio.id)
    }

    /// Step 1: mode-dispatched content prompt acquisition
    async fn acquire_content_prompt(
        &self,
        scheduler: &Scheduler,
        category: &Category,
        used_topic: &mut Option<String>,
    ) -> PipelineResult<String> {
        match scheduler.mode {
            GenerationMode::Single => Ok(scheduler.prompt.clone()),

            GenerationMode::Search => {
                let instruction = scheduler.search_instruction.as_deref().unwrap_or_default();
                self.search
                    .search_synthesize(&scheduler.prompt, instruction)
                    .await
                    .map_err(|e| PipelineError::Acquisition(e.to_string()))
            }

            GenerationMode::List => {
                let mut queue =
                    TopicQueue::new(scheduler.topics.clone(), scheduler.topic_cursor);

                // Exhaustion is a hard stop, never a mode fallback
                let advance = queue.next()?;
                queue.commit(advance.next_cursor);
                *used_topic = Some(advance.topic.title.clone());

                // Replenishment fires after the advance; its failure
                // never fails the run
                if scheduler.auto_replenish && queue.needs_replenish(scheduler.replenish_threshold)
                {
                    match self.replenish(scheduler, category, &queue).await {
                        Ok(new_topics) => {
                            tracing::info!(
                                scheduler_id = %scheduler.id,
                                count = new_topics.len(),
                                "replenished topic list"
                            );
                            queue.append(new_topics);
                        }
                        Err(e) => {
                            tracing::warn!(
                                scheduler_id = %scheduler.id,
                                error = %e,
                                "topic replenishment failed"
                            );
                        }
                    }
                }

                // Optimistic commit: the cursor is persisted before the
                // episode is confirmed
                let (topics, cursor) = queue.into_parts();
                self.store
                    .update_topics(&scheduler.id, &topics, cursor)
                    .map_err(|e| PipelineError::Persistence(e.to_string()))?;

                Ok(advance.topic.as_prompt())
            }
        }
    }

    async fn replenish(
        &self,
        scheduler: &Scheduler,
        category: &Category,
        queue: &TopicQueue,
    ) -> anyhow::Result<Vec<crate::models::Topic>> {
        let recent_titles = self
            .store
            .recent_titles(&scheduler.id, RECENT_TITLE_WINDOW)
            .unwrap_or_default();

        let topics = self
            .replenisher
            .replenish(ReplenishContext {
                persona: &category.presenter_persona,
                category_name: &category.name,
                recent_titles: &recent_titles,
                existing: queue.topics(),
                batch_size: scheduler.replenish_batch_size,
            })
            .await?;

        Ok(topics)
    }

    /// Step 4a: episode description with template fallback
    async fn derive_description(
        &self,
        category: &Category,
        script: &str,
        now: DateTime<Utc>,
    ) -> String {
        match self.text.generate(&prompts::description(script)).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "description derivation failed, using template");
                fallback_label(category, now)
            }
        }
    }

    /// Step 4b: short title (with localized date suffix) and fallback
    async fn derive_title(&self, category: &Category, script: &str, now: DateTime<Utc>) -> String {
        let date = now.format("%Y-%m-%d");
        match self.text.generate(&prompts::title(script)).await {
            Ok(raw) => {
                let short: String = raw
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .trim_matches('"')
                    .chars()
                    .take(SHORT_TITLE_MAX_CHARS)
                    .collect();
                if short.is_empty() {
                    fallback_label(category, now)
                } else {
                    format!("{short} - {date}")
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "title derivation failed, using template");
                fallback_label(category, now)
            }
        }
    }

    /// Step 5: thumbnail lookup; both the query derivation and the photo
    /// search may fail without consequence
    async fn find_illustration(&self, category: &Category, script: &str) -> Option<String> {
        let query = match self.text.generate(&prompts::image_query(script)).await {
            Ok(q) => q.lines().next().unwrap_or("").trim().to_string(),
            Err(_) => String::new(),
        };
        let query = if query.is_empty() {
            format!("{} podcast microphone", category.name)
        } else {
            query
        };

        match self.images.find_landscape_photo(&query).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "image search failed");
                None
            }
        }
    }
}

fn fallback_label(category: &Category, now: DateTime<Utc>) -> String {
    format!("{} - {}", category.name, now.format("%Y-%m-%d"))
}

/// Collision-resistant storage key: timestamp, random suffix, sanitized
/// title
fn storage_key(title: &str, now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!(
        "{}-{}-{}.mp3",
        now.timestamp_millis(),
        suffix,
        sanitize_filename(title)
    )
}

// ============================================================================
// Prompt construction
// ============================================================================

mod prompts {
    use crate::models::Category;

    pub fn script(category: &Category, content_prompt: &str) -> String {
        format!(
            r#"You are {presenter}, the presenter of the "{category}" podcast.
Persona: {persona}

Write a complete monologue episode script about the following subject.

## Subject:
{content_prompt}

## Rules:
1. Spoken words only: no stage directions, no sound cues, no annotations of any kind.
2. Open with a short greeting and close with a sign-off, in character.
3. Target length 800-1200 characters, roughly 3-5 minutes of speech.
4. Output the script text and nothing else."#,
            presenter = category.presenter_name,
            category = category.name,
            persona = category.presenter_persona,
        )
    }

    pub fn cleanup(draft: &str) -> String {
        format!(
            r#"Remove every stage direction, bracketed or parenthetical annotation,
and narrator-style meta-text from this podcast script. Keep only the words
meant to be spoken aloud, unchanged. Output the cleaned script only.

## Script:
{draft}"#
        )
    }

    pub fn description(script: &str) -> String {
        format!(
            r#"Write a two to three sentence episode summary for this podcast
script, suitable as a listing description. Output the summary only.

## Script:
{script}"#
        )
    }

    pub fn title(script: &str) -> String {
        format!(
            r#"Write a catchy episode title of at most 15 characters for this
podcast script. Output the title only, no quotes.

## Script:
{script}"#
        )
    }

    pub fn image_query(script: &str) -> String {
        format!(
            r#"Derive a short English image search query (2-4 words) capturing
the visual theme of this podcast script. Output the query only.

## Script:
{script}"#
        )
    }
}
