// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::RetryPolicy;
use crate::cursor::DEFAULT_CURSOR_KEY;
use crate::gap::{GapMode, DEFAULT_GAP_THRESHOLD};
use crate::source::hn::DEFAULT_API_BASE;

pub const ENV_CONFIG_PATH: &str = "HN_WATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/hn_watch.toml";

const ENV_API_BASE: &str = "HN_WATCH_API_BASE";
const ENV_STATE_PATH: &str = "HN_WATCH_STATE_PATH";
const ENV_GAP_MODE: &str = "HN_WATCH_GAP_MODE";
const ENV_IDLE_SECS: &str = "HN_WATCH_IDLE_SECS";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state/cursor.json")
}
fn default_cursor_key() -> String {
    DEFAULT_CURSOR_KEY.to_string()
}
fn default_idle_secs() -> u64 {
    120
}
fn default_gap_threshold() -> i64 {
    DEFAULT_GAP_THRESHOLD
}
fn default_grace_secs() -> u64 {
    3
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    5
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_retry_max_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_cursor_key")]
    pub cursor_key: String,
    #[serde(default = "default_idle_secs")]
    pub idle_interval_secs: u64,
    /// Gaps strictly above this ask for a replay decision.
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: i64,
    #[serde(default = "default_grace_secs")]
    pub gap_grace_secs: u64,
    #[serde(default)]
    pub gap_mode: GapMode,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            state_path: default_state_path(),
            cursor_key: default_cursor_key(),
            idle_interval_secs: default_idle_secs(),
            gap_threshold: default_gap_threshold(),
            gap_grace_secs: default_grace_secs(),
            gap_mode: GapMode::default(),
            request_timeout_secs: default_timeout_secs(),
            retry_max_attempts: default_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl WatchConfig {
    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: WatchConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $HN_WATCH_CONFIG
    /// 2) config/hn_watch.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = std::env::var(ENV_API_BASE) {
            if !v.trim().is_empty() {
                self.api_base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_STATE_PATH) {
            if !v.trim().is_empty() {
                self.state_path = PathBuf::from(v.trim());
            }
        }
        if let Ok(v) = std::env::var(ENV_GAP_MODE) {
            self.gap_mode = GapMode::parse(&v)
                .ok_or_else(|| anyhow!("{ENV_GAP_MODE}={v} is not one of ask|replay|fast_forward"))?;
        }
        if let Ok(v) = std::env::var(ENV_IDLE_SECS) {
            self.idle_interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_IDLE_SECS}={v} is not a number of seconds"))?;
        }
        Ok(self.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.idle_interval_secs == 0 {
            self.idle_interval_secs = default_idle_secs();
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_timeout_secs();
        }
        if self.retry_max_attempts == 0 {
            self.retry_max_attempts = default_retry_attempts();
        }
        if self.gap_threshold < 0 {
            self.gap_threshold = 0;
        }
        if self.cursor_key.trim().is_empty() {
            self.cursor_key = default_cursor_key();
        }
        self
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    pub fn gap_grace(&self) -> Duration {
        Duration::from_secs(self.gap_grace_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts, self.retry_base_ms, self.retry_max_ms)
    }
}
