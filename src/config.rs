//! Client configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding [`ClientConfig::base_url`]
pub const BASE_URL_ENV: &str = "CHAT_SYNC_BASE_URL";

/// How file metadata travels with a file message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileMetaEncoding {
    /// `fileMeta` query parameter joined with `|` on `/messages/send-file`
    #[default]
    Delimited,
    /// Metadata as JSON fields of the regular `/messages` body
    Structured,
}

/// Client configuration
///
/// Stored as JSON; a missing or empty file yields the defaults.
///
/// # Example
/// ```rust,no_run
/// use chat_sync::config::ClientConfig;
///
/// let config = ClientConfig::load("chat-sync.json").expect("Failed to load");
/// println!("Backend: {}", config.base_url);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Page size requested from the group history endpoint
    pub group_page_size: u32,
    /// Wire format for file metadata
    pub file_meta_encoding: FileMetaEncoding,
    /// Acknowledge inbound messages in the background after each history change
    pub auto_acknowledge: bool,
    /// Where the CLI keeps the bearer token
    pub session_path: String,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment
    pub system_proxy: bool,
}

impl ClientConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Apply `CHAT_SYNC_BASE_URL` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        self
    }

    /// Reject values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.group_page_size == 0 {
            return Err(Error::Config("group_page_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 10,
            group_page_size: 20,
            file_meta_encoding: FileMetaEncoding::Delimited,
            auto_acknowledge: true,
            session_path: "./data/session.json".to_string(),
            system_proxy: true,
        }
    }
}
