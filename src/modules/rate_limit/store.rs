//! File-backed persistence for rate limit state.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "targets": {
//!     "github": {
//!       "count": 12,
//!       "reset_time": "2026-10-18T12:00:00Z",
//!       "delay": 1.0,
//!       "last_request": "2026-10-18T11:59:00Z"
//!     }
//!   }
//! }
//! ```
//!
//! Loading is forgiving: a missing or empty file yields an empty table, corrupt
//! JSON yields an empty table plus a warning, and each record is repaired on
//! its own. A timestamp that is missing, unparsable or not a string is read as
//! "now", a penalty further out than one window is cut back to one window, and
//! a last request in the future is read as "now". Saving writes a sibling temp file and renames it over the
//! original so a crash mid-write leaves the previous file intact.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::{MAX_DELAY_SECS, MIN_DELAY_SECS, PENALTY_WINDOW, RateLimitState, chrono_duration};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    #[error("rate limit store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rate limit store serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to replace rate limit file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One target's on-disk record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersistedRecord {
    pub count: u64,
    pub reset_time: Option<String>,
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request: Option<String>,
}

impl PersistedRecord {
    pub fn from_state(state: &RateLimitState) -> Self {
        Self {
            count: state.count,
            reset_time: Some(state.penalty_until.to_rfc3339()),
            delay: Some(state.delay_secs),
            last_request: state.last_request.map(|ts| ts.to_rfc3339()),
        }
    }

    /// Reads one record field by field. Fields of the wrong type are dropped
    /// rather than failing the record.
    pub fn from_value(value: &Value) -> Self {
        let text = |field: &str| value.get(field).and_then(Value::as_str).map(str::to_string);
        Self {
            count: value.get("count").and_then(Value::as_u64).unwrap_or_default(),
            reset_time: text("reset_time"),
            delay: value.get("delay").and_then(Value::as_f64),
            last_request: text("last_request"),
        }
    }

    /// Rebuilds in-memory state, repairing whatever does not parse.
    pub fn into_state(self, now: DateTime<Utc>) -> RateLimitState {
        let delay_secs = match self.delay {
            Some(delay) if delay.is_finite() => delay.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS),
            _ => MIN_DELAY_SECS,
        };
        // No recorded request can open a penalty longer than one window.
        let latest_penalty = now + chrono_duration(PENALTY_WINDOW);
        RateLimitState {
            delay_secs,
            last_request: self
                .last_request
                .as_deref()
                .and_then(parse_timestamp)
                .map(|ts| ts.min(now)),
            penalty_until: self
                .reset_time
                .as_deref()
                .and_then(parse_timestamp)
                .map_or(now, |ts| ts.min(latest_penalty)),
            count: self.count,
        }
    }
}

#[derive(Debug, Serialize)]
struct StoreFile<'a> {
    version: u32,
    targets: BTreeMap<&'a str, &'a PersistedRecord>,
}

/// Accepts RFC 3339 and offset-less ISO-8601 (read as UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Location of the persisted table. Reads and writes are whole-file.
#[derive(Debug, Clone)]
pub struct RateLimitStore {
    path: PathBuf,
}

impl RateLimitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self, now: DateTime<Utc>) -> Result<HashMap<String, RateLimitState>, RateLimitStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(RateLimitStoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let root: Value = match serde_json::from_str(&content) {
            Ok(root) => root,
            Err(err) => {
                log::warn!(
                    "ignoring unreadable rate limit file {} ({})",
                    self.path.display(),
                    err
                );
                return Ok(HashMap::new());
            }
        };

        let Some(targets) = root.get("targets").and_then(Value::as_object) else {
            log::warn!("rate limit file {} has no target table", self.path.display());
            return Ok(HashMap::new());
        };

        let version = root.get("version").and_then(Value::as_u64);
        if version != Some(u64::from(STORE_VERSION)) {
            log::warn!(
                "rate limit file {} has version {:?} (expected {}), loading best effort",
                self.path.display(),
                version,
                STORE_VERSION
            );
        }

        let mut loaded = HashMap::with_capacity(targets.len());
        for (target, value) in targets {
            if !value.is_object() {
                log::warn!("skipping malformed rate limit record for {target}");
                continue;
            }
            let state = PersistedRecord::from_value(value).into_state(now);
            loaded.insert(target.clone(), state);
        }
        Ok(loaded)
    }

    pub fn save(&self, records: &HashMap<String, PersistedRecord>) -> Result<(), RateLimitStoreError> {
        let file = StoreFile {
            version: STORE_VERSION,
            targets: records
                .iter()
                .map(|(target, record)| (target.as_str(), record))
                .collect(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|source| RateLimitStoreError::Io {
            path: parent.clone(),
            source,
        })?;

        let io_err = |source| RateLimitStoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut temp = NamedTempFile::new_in(&parent).map_err(io_err)?;
        temp.write_all(content.as_bytes()).map_err(io_err)?;
        temp.flush().map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&self.path)
            .map_err(|err| RateLimitStoreError::Persist {
                path: self.path.clone(),
                source: err.error,
            })?;

        Ok(())
    }
}
