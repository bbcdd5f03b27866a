//! Configuration management for the sori pipeline
//!
//! This module handles loading and validating configuration from
//! environment variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Generative text service (Ollama-compatible)
    pub llm: LlmConfig,

    /// Search-augmented generation service
    pub search: SearchConfig,

    /// Text-to-speech service
    pub tts: TtsConfig,

    /// Image search service
    pub images: ImageConfig,

    /// Object storage service
    pub storage: StorageConfig,

    /// Run-result notification webhook
    pub notify: NotifyConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Dispatch loop configuration
    pub dispatch: DispatchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Generative text service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Endpoint URL (default: http://localhost:11434)
    pub endpoint: String,

    /// Model name to use
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 - 1.0)
    pub temperature: f32,
}

/// Search-augmented generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Endpoint URL
    pub endpoint: String,

    /// API key (optional)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Text-to-speech service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Endpoint URL
    pub endpoint: String,

    /// API key (optional)
    pub api_key: Option<String>,

    /// Audio output format requested from the service
    pub audio_format: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Image search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Endpoint URL
    pub endpoint: String,

    /// API key (optional)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Object storage service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Upload endpoint URL
    pub endpoint: String,

    /// Bucket or container name
    pub bucket: String,

    /// Base URL for public links; defaults to `{endpoint}/{bucket}`
    pub public_base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Notification webhook configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook URL; notifications are disabled when unset
    pub url: Option<String>,

    /// Bearer token (optional)
    pub auth_token: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Dispatch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Seconds between due-scheduler polls in serve mode
    pub poll_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            llm: LlmConfig {
                endpoint: env_or("SORI_LLM_ENDPOINT", "http://localhost:11434"),
                model: env_or("SORI_LLM_MODEL", "qwen2.5:7b"),
                timeout_secs: env_parse_or("SORI_LLM_TIMEOUT", 120),
                max_tokens: env_parse_or("SORI_LLM_MAX_TOKENS", 2048),
                temperature: env_parse_or("SORI_LLM_TEMPERATURE", 0.7),
            },
            search: SearchConfig {
                endpoint: env_or("SORI_SEARCH_ENDPOINT", "http://localhost:8080/search"),
                api_key: std::env::var("SORI_SEARCH_API_KEY").ok(),
                timeout_secs: env_parse_or("SORI_SEARCH_TIMEOUT", 120),
            },
            tts: TtsConfig {
                endpoint: env_or("SORI_TTS_ENDPOINT", "http://localhost:8020/tts"),
                api_key: std::env::var("SORI_TTS_API_KEY").ok(),
                audio_format: env_or("SORI_TTS_FORMAT", "mp3"),
                timeout_secs: env_parse_or("SORI_TTS_TIMEOUT", 180),
            },
            images: ImageConfig {
                endpoint: env_or("SORI_IMAGE_ENDPOINT", "https://api.pexels.com/v1"),
                api_key: std::env::var("SORI_IMAGE_API_KEY").ok(),
                timeout_secs: env_parse_or("SORI_IMAGE_TIMEOUT", 30),
            },
            storage: StorageConfig {
                endpoint: env_or("SORI_STORAGE_ENDPOINT", "http://localhost:9000"),
                bucket: env_or("SORI_STORAGE_BUCKET", "sori-audio"),
                public_base_url: std::env::var("SORI_STORAGE_PUBLIC_URL").ok(),
                timeout_secs: env_parse_or("SORI_STORAGE_TIMEOUT", 120),
            },
            notify: NotifyConfig {
                url: std::env::var("SORI_WEBHOOK_URL").ok(),
                auth_token: std::env::var("SORI_WEBHOOK_TOKEN").ok(),
            },
            database: DatabaseConfig {
                sqlite_path: env_or("SORI_SQLITE_PATH", "data/sori.db").into(),
            },
            dispatch: DispatchConfig {
                poll_interval_secs: env_parse_or("SORI_POLL_INTERVAL", 60),
            },
            logging: LoggingConfig {
                level: env_or("SORI_LOG_LEVEL", "info"),
                format: env_or("SORI_LOG_FORMAT", "text"),
            },
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, endpoint) in [
            ("llm.endpoint", &self.llm.endpoint),
            ("search.endpoint", &self.search.endpoint),
            ("tts.endpoint", &self.tts.endpoint),
            ("images.endpoint", &self.images.endpoint),
            ("storage.endpoint", &self.storage.endpoint),
        ] {
            url::Url::parse(endpoint).with_context(|| format!("{name} is not a valid URL"))?;
        }

        if !(0.0..=1.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be between 0.0 and 1.0");
        }

        if self.storage.bucket.is_empty() {
            anyhow::bail!("storage.bucket must not be empty");
        }

        if self.dispatch.poll_interval_secs == 0 {
            anyhow::bail!("dispatch.poll_interval_secs must be greater than 0");
        }

        if let Some(url) = &self.notify.url {
            let parsed = url::Url::parse(url).context("notify.url is not a valid URL")?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                anyhow::bail!("notify.url must use http or https");
            }
        }

        Ok(())
    }

    /// Get the dispatch poll interval as Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch.poll_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                endpoint: String::from("http://localhost:11434"),
                model: String::from("qwen2.5:7b"),
                timeout_secs: 120,
                max_tokens: 2048,
                temperature: 0.7,
            },
            search: SearchConfig {
                endpoint: String::from("http://localhost:8080/search"),
                api_key: None,
                timeout_secs: 120,
            },
            tts: TtsConfig {
                endpoint: String::from("http://localhost:8020/tts"),
                api_key: None,
                audio_format: String::from("mp3"),
                timeout_secs: 180,
            },
            images: ImageConfig {
                endpoint: String::from("https://api.pexels.com/v1"),
                api_key: None,
                timeout_secs: 30,
            },
            storage: StorageConfig {
                endpoint: String::from("http://localhost:9000"),
                bucket: String::from("sori-audio"),
                public_base_url: None,
                timeout_secs: 120,
            },
            notify: NotifyConfig::default(),
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/sori.db"),
            },
            dispatch: DispatchConfig {
                poll_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_poll_interval() {
        let mut config = Config::default();
        config.dispatch.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_temperature() {
        let mut config = Config::default();
        config.llm.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_webhook_url() {
        let mut config = Config::default();
        config.notify.url = Some(String::from("not-a-url"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_conversion() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.llm.model, config.llm.model);
        assert_eq!(parsed.database.sqlite_path, config.database.sqlite_path);
    }
}
