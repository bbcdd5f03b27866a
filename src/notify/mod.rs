//! Run outcome notifications
//!
//! Posts a small JSON payload to a configured webhook after every
//! scheduler run. Delivery is best-effort: transient failures are
//! retried with exponential backoff, client errors (4xx) are not
//! retried, and the dispatch loop swallows whatever still fails.

use chrono::Utc;
use serde_json::json;
use std::time::Duration;

use crate::config::NotifyConfig;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_RETRIES: u32 = 3;

/// Webhook notifier for run outcomes
///
/// Constructed without a URL it becomes a no-op, so callers never need
/// to branch on whether notifications are configured.
pub struct RunNotifier {
    client: reqwest::Client,
    url: Option<String>,
    auth_token: Option<String>,
}

impl RunNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: config.url.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// A notifier that never sends anything
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: None,
            auth_token: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Announce a successful run
    pub async fn notify_success(&self, scheduler_id: &str, title: &str) -> anyhow::Result<()> {
        self.send(json!({
            "scheduler_id": scheduler_id,
            "status": "success",
            "title": title,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }

    /// Announce a failed run
    pub async fn notify_failure(&self, scheduler_id: &str, error: &str) -> anyhow::Result<()> {
        self.send(json!({
            "scheduler_id": scheduler_id,
            "status": "failure",
            "error": error,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }

    async fn send(&self, payload: serde_json::Value) -> anyhow::Result<()> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 1s, 2s, 4s
                let backoff = Duration::from_secs(1 << (attempt - 1));
                tracing::debug!(attempt, ?backoff, "retrying notification");
                tokio::time::sleep(backoff).await;
            }

            let mut request = self.client.post(url).json(&payload);
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    let status = response.status();
                    if status.is_client_error() {
                        // The payload will not get better on retry
                        anyhow::bail!("webhook rejected notification: {status}");
                    }
                    last_error = Some(anyhow::anyhow!("webhook returned {status}"));
                }
                Err(e) => {
                    last_error = Some(anyhow::Error::new(e).context("webhook request failed"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("notification failed")))
    }
}
