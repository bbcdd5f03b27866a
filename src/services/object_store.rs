//! Object storage client
//!
//! Uploads audio payloads to an S3-compatible HTTP endpoint via PUT and
//! returns the public URL for the stored object.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

use super::{ObjectStorage, ServiceError, ServiceResult};
use crate::config::StorageConfig;

/// HTTP client for durable object storage
pub struct StorageClient {
    client: Client,
    config: StorageConfig,
}

impl StorageClient {
    /// Create a new client from configuration
    pub fn new(config: StorageConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn object_path(&self, folder: &str, key: &str) -> String {
        format!("{}/{}/{}", self.config.bucket, folder, key)
    }

    fn public_url(&self, folder: &str, key: &str) -> String {
        match &self.config.public_base_url {
            Some(base) => format!("{}/{}/{}", base.trim_end_matches('/'), folder, key),
            None => format!(
                "{}/{}",
                self.config.endpoint.trim_end_matches('/'),
                self.object_path(folder, key)
            ),
        }
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    async fn upload(
        &self,
        bytes: Bytes,
        folder: &str,
        key: &str,
        content_type: &str,
    ) -> ServiceResult<String> {
        let url = format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.object_path(folder, key)
        );

        let response = self
            .client
            .put(&url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::status("storage", status, body));
        }

        Ok(self.public_url(folder, key))
    }
}

/// Sanitize a title into a storage-key-safe filename fragment
///
/// Non-alphanumeric runs collapse to single hyphens; the result is
/// lowercased and truncated to keep keys short.
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::new();
    let mut last_was_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    let truncated: String = trimmed.chars().take(40).collect();
    if truncated.is_empty() {
        String::from("episode")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Morning News! (Jan 3)"), "morning-news-jan-3");
        assert_eq!(sanitize_filename("   "), "episode");
        assert_eq!(sanitize_filename("한국어 제목"), "episode");
        assert_eq!(sanitize_filename("already-clean"), "already-clean");
    }

    #[test]
    fn test_sanitize_filename_truncates() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_filename(&long).len(), 40);
    }

    #[test]
    fn test_public_url_fallback() {
        let config = StorageConfig {
            endpoint: String::from("http://localhost:9000/"),
            bucket: String::from("audio"),
            public_base_url: None,
            timeout_secs: 10,
        };
        let client = StorageClient::new(config).unwrap();
        assert_eq!(
            client.public_url("episodes", "a.mp3"),
            "http://localhost:9000/audio/episodes/a.mp3"
        );
    }

    #[test]
    fn test_public_url_override() {
        let config = StorageConfig {
            endpoint: String::from("http://localhost:9000"),
            bucket: String::from("audio"),
            public_base_url: Some(String::from("https://cdn.example.com/")),
            timeout_secs: 10,
        };
        let client = StorageClient::new(config).unwrap();
        assert_eq!(
            client.public_url("episodes", "a.mp3"),
            "https://cdn.example.com/episodes/a.mp3"
        );
    }
}
