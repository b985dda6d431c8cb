/*!
common/src/lib.rs

Shared configuration types and helpers for Newstalk.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- Resolution of the API base URL (environment > file > built-in default)
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable that overrides `api.base_url`.
pub const API_BASE_URL_ENV: &str = "NEWSTALK_API_BASE_URL";

/// Base URL used when neither the environment nor the config file set one.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

/// Conversation style forwarded opaquely to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Casual,
    Genz,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Casual => "casual",
            Style::Genz => "genz",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "casual" => Ok(Style::Casual),
            "genz" => Ok(Style::Genz),
            other => anyhow::bail!("unknown style '{}' (expected casual or genz)", other),
        }
    }
}

/// Backend API section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host serving `/api/*` (e.g. "http://localhost:5000")
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub style: Option<Style>,
}

/// Conversation synthesis knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Number of turns forwarded to the remote chat endpoint
    pub history_limit: Option<usize>,
    /// Number of summary bullets shown in the facts panel
    pub fact_count: Option<usize>,
    /// Min/max delay in milliseconds for the staggered "typing" reveal
    pub reveal_delay_ms: Option<[u64; 2]>,
    /// Use the backend chat endpoint for follow-ups (local templates otherwise)
    pub remote_chat: Option<bool>,
}

/// Spoken playback section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub pause_ms: Option<u64>,
    /// External text-to-speech command, e.g. "espeak" or "say"
    pub command: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// API host, resolved as environment variable > config file > default.
    /// Trailing slashes are stripped so endpoint paths can be appended directly.
    pub fn api_base_url(&self) -> Result<String> {
        let raw = std::env::var(API_BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api.base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        url::Url::parse(raw.trim())
            .with_context(|| format!("Invalid API base URL: {}", raw))?;
        Ok(raw.trim().trim_end_matches('/').to_string())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds.unwrap_or(15))
    }

    pub fn style(&self) -> Style {
        self.api.style.unwrap_or_default()
    }

    pub fn history_limit(&self) -> usize {
        self.conversation.history_limit.unwrap_or(5)
    }

    pub fn fact_count(&self) -> usize {
        self.conversation.fact_count.unwrap_or(5).max(1)
    }

    /// Reveal delay window; a reversed pair is normalised to (min, max).
    pub fn reveal_delay(&self) -> (Duration, Duration) {
        let [a, b] = self.conversation.reveal_delay_ms.unwrap_or([500, 1500]);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        (Duration::from_millis(lo), Duration::from_millis(hi))
    }

    pub fn remote_chat(&self) -> bool {
        self.conversation.remote_chat.unwrap_or(true)
    }

    pub fn playback_pause(&self) -> Duration {
        Duration::from_millis(self.playback.pause_ms.unwrap_or(400))
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
