//! Search-augmented generation client
//!
//! Sends a query plus a system instruction to a web-search-backed
//! synthesis endpoint and returns the synthesized text.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SearchGenerator, ServiceError, ServiceResult};
use crate::config::SearchConfig;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    instruction: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    text: String,
}

/// HTTP client for the search-augmented generation service
pub struct SearchClient {
    client: Client,
    config: SearchConfig,
}

impl SearchClient {
    /// Create a new client from configuration
    pub fn new(config: SearchConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SearchGenerator for SearchClient {
    async fn search_synthesize(&self, query: &str, instruction: &str) -> ServiceResult<String> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&SearchRequest { query, instruction });

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::status("search", status, body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::bad_response("search", e.to_string()))?;

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(ServiceError::bad_response("search", "empty synthesis"));
        }

        Ok(text)
    }
}
