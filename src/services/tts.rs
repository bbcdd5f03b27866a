//! Text-to-speech client
//!
//! Submits a cleaned script and voice identifier to the synthesis
//! endpoint and returns binary MPEG audio. Any non-success response is
//! surfaced as an error; the pipeline treats synthesis failures as fatal.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{ServiceError, ServiceResult, SpeechSynthesizer};
use crate::config::TtsConfig;

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    format: &'a str,
}

/// HTTP client for the text-to-speech service
pub struct TtsClient {
    client: Client,
    config: TtsConfig,
}

impl TtsClient {
    /// Create a new client from configuration
    pub fn new(config: TtsConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> ServiceResult<Bytes> {
        if voice_id.is_empty() {
            return Err(ServiceError::MissingCredential("voice_id"));
        }

        let mut request = self.client.post(&self.config.endpoint).json(&TtsRequest {
            text,
            voice_id,
            format: &self.config.audio_format,
        });

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::status("tts", status, body));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ServiceError::bad_response("tts", "empty audio payload"));
        }

        Ok(bytes)
    }
}
