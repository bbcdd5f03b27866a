//! External service abstractions
//!
//! This module defines the request/response contracts the pipeline
//! consumes and their HTTP implementations:
//!
//! - [`TextGenerator`] - generative text (scripts, cleanup, metadata, topics)
//! - [`SearchGenerator`] - search-augmented synthesis
//! - [`SpeechSynthesizer`] - text-to-speech, binary audio out
//! - [`ImageSearch`] - episode thumbnail lookup
//! - [`ObjectStorage`] - durable audio upload
//!
//! Mock implementations for testing live in [`mock`], mirroring the
//! trait/mock pairing used by the storage repositories.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod images;
pub mod llm;
pub mod mock;
pub mod object_store;
pub mod search;
pub mod tts;

pub use images::PhotoClient;
pub use llm::LlmClient;
pub use object_store::StorageClient;
pub use search::SearchClient;
pub use tts::TtsClient;

/// Result type for service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from external service calls
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level HTTP failure (connect, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the service
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Required credential or identifier is not configured
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Service replied but the payload was unusable
    #[error("{service} returned an unusable response: {reason}")]
    BadResponse {
        service: &'static str,
        reason: String,
    },
}

impl ServiceError {
    /// Create a non-success status error
    pub fn status(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            service,
            status,
            body: body.into(),
        }
    }

    /// Create a bad response error
    pub fn bad_response(service: &'static str, reason: impl Into<String>) -> Self {
        Self::BadResponse {
            service,
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::MissingCredential(_) => false,
            Self::BadResponse { .. } => false,
        }
    }
}

/// Generative text service: instruction in, plain text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> ServiceResult<String>;
}

/// Search-augmented generative service
#[async_trait]
pub trait SearchGenerator: Send + Sync {
    /// Synthesize text for `query` under a system `instruction`
    async fn search_synthesize(&self, query: &str, instruction: &str) -> ServiceResult<String>;
}

/// Text-to-speech service
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given voice; returns MPEG audio bytes
    async fn synthesize(&self, text: &str, voice_id: &str) -> ServiceResult<Bytes>;
}

/// Image search service
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Find one landscape photo for `query`; `None` when nothing matched
    async fn find_landscape_photo(&self, query: &str) -> ServiceResult<Option<String>>;
}

/// Durable object storage
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `bytes` under `folder/key` and return the public URL
    async fn upload(
        &self,
        bytes: Bytes,
        folder: &str,
        key: &str,
        content_type: &str,
    ) -> ServiceResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_recoverable() {
        assert!(ServiceError::status("tts", 503, "overloaded").is_recoverable());
        assert!(!ServiceError::status("tts", 401, "bad key").is_recoverable());
        assert!(!ServiceError::MissingCredential("voice_id").is_recoverable());
        assert!(!ServiceError::bad_response("llm", "empty body").is_recoverable());
    }

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::status("images", 429, "rate limited");
        assert!(err.to_string().contains("images"));
        assert!(err.to_string().contains("429"));
    }
}
