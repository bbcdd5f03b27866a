//! Image search client
//!
//! Queries a photo search API (Pexels-compatible) for one landscape
//! photo to use as an episode thumbnail. A missing photo is a normal
//! outcome, not an error.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{ImageSearch, ServiceError, ServiceResult};
use crate::config::ImageConfig;

#[derive(Debug, Deserialize)]
struct PhotoSearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSrc,
}

#[derive(Debug, Deserialize)]
struct PhotoSrc {
    landscape: String,
}

/// HTTP client for the image search service
pub struct PhotoClient {
    client: Client,
    config: ImageConfig,
}

impl PhotoClient {
    /// Create a new client from configuration
    pub fn new(config: ImageConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ImageSearch for PhotoClient {
    async fn find_landscape_photo(&self, query: &str) -> ServiceResult<Option<String>> {
        let url = format!("{}/search", self.config.endpoint);

        let mut request = self.client.get(&url).query(&[
            ("query", query),
            ("page", "1"),
            ("per_page", "1"),
            ("orientation", "landscape"),
        ]);

        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::status("images", status, body));
        }

        let parsed: PhotoSearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::bad_response("images", e.to_string()))?;

        Ok(parsed.photos.into_iter().next().map(|p| p.src.landscape))
    }
}
