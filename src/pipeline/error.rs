//! Error types for the content generation pipeline

use thiserror::Error;

use crate::topics::TopicsError;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal pipeline errors
///
/// Only failures that abort a run appear here; degradable steps
/// (summary, title, image, LLM-layer cleanup) fall back internally and
/// never surface as errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing configuration on the scheduler or category; no side
    /// effects were made
    #[error("configuration error: {0}")]
    Config(String),

    /// List mode ran out of topics; distinct from other failures so
    /// operators can tell replenishment starvation from service outages
    #[error("topic list exhausted")]
    TopicsExhausted,

    /// Content prompt acquisition failed (search mode)
    #[error("content acquisition failed: {0}")]
    Acquisition(String),

    /// Script drafting call failed
    #[error("script drafting failed: {0}")]
    ScriptDraft(String),

    /// Text-to-speech call failed
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// Durable upload failed; no Audio row was written
    #[error("audio upload failed: {0}")]
    Upload(String),

    /// Database write failed
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<TopicsError> for PipelineError {
    fn from(err: TopicsError) -> Self {
        match err {
            TopicsError::Exhausted { .. } => Self::TopicsExhausted,
            TopicsError::UnusableReplenishment { reason } => Self::Acquisition(reason),
        }
    }
}
