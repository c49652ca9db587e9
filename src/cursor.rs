//! Durable single-value store for the last processed item ID.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

pub const DEFAULT_CURSOR_KEY: &str = "hn_last_id";

/// Value `load` returns when nothing has been persisted yet.
pub const NO_CURSOR: i64 = -1;

#[async_trait::async_trait]
pub trait CursorStore: Send + Sync {
    /// Persisted cursor or [`NO_CURSOR`]. An `Err` means the storage itself
    /// is unusable and must stop the process.
    async fn load(&self) -> Result<i64>;

    /// Returns `false` for negative IDs (nothing written) and on write failure.
    async fn save(&self, id: i64) -> bool;
}

/// JSON object file; the cursor sits under one key as a decimal string.
pub struct FileCursorStore {
    path: PathBuf,
    key: String,
}

impl FileCursorStore {
    /// Makes sure the parent directory exists so an unusable location
    /// surfaces before the walk starts.
    pub async fn open(path: impl Into<PathBuf>, key: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.with_context(|| {
                format!(
                    "cannot create state directory {}: the process needs write permission there \
                     (or point HN_WATCH_STATE_PATH somewhere writable)",
                    dir.display()
                )
            })?;
        }
        Ok(Self {
            path,
            key: key.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<Option<BTreeMap<String, Value>>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "cannot read cursor file {}: grant the process read/write permission on it \
                         (or set HN_WATCH_STATE_PATH)",
                        self.path.display()
                    )
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Some(BTreeMap::new()));
        }
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(Some(map)),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "cursor file is not a JSON object, ignoring it");
                Ok(Some(BTreeMap::new()))
            }
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        let body = serde_json::to_vec_pretty(map).context("encode cursor map")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<i64> {
        let Some(map) = self.read_map().await? else {
            return Ok(NO_CURSOR);
        };
        let Some(raw) = map.get(&self.key) else {
            return Ok(NO_CURSOR);
        };
        let parsed = match raw {
            Value::String(s) => s.trim().parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        match parsed {
            Some(v) if v >= 0 => Ok(v),
            _ => {
                tracing::warn!(key = %self.key, value = %raw, "stored cursor is not a valid id, ignoring it");
                Ok(NO_CURSOR)
            }
        }
    }

    async fn save(&self, id: i64) -> bool {
        if id < 0 {
            return false;
        }
        // Keep whatever else lives in the file.
        let mut map = match self.read_map().await {
            Ok(m) => m.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("cursor read before save: {e:#}");
                return false;
            }
        };
        map.insert(self.key.clone(), Value::String(id.to_string()));
        match self.write_map(&map).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("cursor save: {e:#}");
                false
            }
        }
    }
}

// --- Test helper ---
#[derive(Debug)]
pub struct MemoryCursorStore {
    value: Mutex<i64>,
    pub saves: Mutex<Vec<i64>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::with_cursor(NO_CURSOR)
    }

    pub fn with_cursor(value: i64) -> Self {
        Self {
            value: Mutex::new(value),
            saves: Mutex::new(vec![]),
        }
    }

    pub fn current(&self) -> i64 {
        *self.value.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MemoryCursorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<i64> {
        Ok(self.current())
    }

    async fn save(&self, id: i64) -> bool {
        if id < 0 {
            return false;
        }
        *self.value.lock().unwrap_or_else(|p| p.into_inner()) = id;
        self.saves
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(id);
        true
    }
}
