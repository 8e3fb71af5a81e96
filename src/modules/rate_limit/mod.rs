//! Adaptive per-target rate limiting with cross-run persistence.
//!
//! Every target carries a spacing baseline that doubles on an explicit
//! throttling signal (capped at 30s) and decays by 10% on each clean request
//! (floored at 0.5s). A throttling signal also opens a fixed 60s penalty
//! window. State is written through to disk after every recorded request;
//! persistence failures are logged and otherwise ignored.

pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub use store::{PersistedRecord, RateLimitStore, RateLimitStoreError};

pub const MIN_DELAY_SECS: f64 = 0.5;
pub const MAX_DELAY_SECS: f64 = 30.0;
pub const BACKOFF_FACTOR: f64 = 2.0;
pub const RECOVERY_FACTOR: f64 = 0.9;
pub const PENALTY_WINDOW: Duration = Duration::from_secs(60);

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| {
        let millis = duration.as_millis().min(i64::MAX as u128);
        chrono::Duration::milliseconds(millis as i64)
    })
}

fn secs_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier)
        .to_std()
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Limiter state for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitState {
    /// Minimum spacing between consecutive requests, in seconds.
    pub delay_secs: f64,
    pub last_request: Option<DateTime<Utc>>,
    /// Requests must wait until this instant. Equal to creation time when no
    /// penalty has been applied.
    pub penalty_until: DateTime<Utc>,
    /// Recorded request attempts (diagnostic only).
    pub count: u64,
}

impl RateLimitState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            delay_secs: MIN_DELAY_SECS,
            last_request: None,
            penalty_until: now,
            count: 0,
        }
    }

    pub fn wait_at(&self, now: DateTime<Utc>) -> Duration {
        if now < self.penalty_until {
            return Duration::from_secs_f64(secs_between(self.penalty_until, now));
        }

        if let Some(last) = self.last_request {
            let since_last = secs_between(now, last);
            if since_last < self.delay_secs {
                return Duration::from_secs_f64(self.delay_secs - since_last);
            }
        }

        Duration::ZERO
    }

    pub fn record_at(&mut self, was_rate_limited: bool, now: DateTime<Utc>) {
        self.last_request = Some(now);
        self.count = self.count.saturating_add(1);

        if was_rate_limited {
            self.delay_secs = (self.delay_secs * BACKOFF_FACTOR).min(MAX_DELAY_SECS);
            self.penalty_until = now + chrono_duration(PENALTY_WINDOW);
        } else {
            self.delay_secs = (self.delay_secs * RECOVERY_FACTOR).max(MIN_DELAY_SECS);
        }
    }

    pub fn is_penalized_at(&self, now: DateTime<Utc>) -> bool {
        now < self.penalty_until
    }
}

#[derive(Debug)]
struct TargetSlot {
    state: Mutex<RateLimitState>,
    gate: Arc<AsyncMutex<()>>,
}

impl TargetSlot {
    fn new(state: RateLimitState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            gate: Arc::new(AsyncMutex::new(())),
        })
    }
}

/// Exclusive right to run one check against a target.
///
/// Held by the pipeline for the whole wait/request/record sequence so that
/// two checks against the same target never interleave their limiter reads
/// and writes.
#[derive(Debug)]
pub struct TargetGate {
    target: String,
    _guard: OwnedMutexGuard<()>,
}

impl TargetGate {
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Thread-safe limiter shared by all checks in a process.
#[derive(Debug)]
pub struct RateLimiter {
    targets: RwLock<HashMap<String, Arc<TargetSlot>>>,
    store: Option<RateLimitStore>,
    persisted: Mutex<HashMap<String, PersistedRecord>>,
    store_degraded: AtomicBool,
}

impl RateLimiter {
    /// Limiter without durable storage.
    pub fn in_memory() -> Self {
        Self {
            targets: RwLock::new(HashMap::new()),
            store: None,
            persisted: Mutex::new(HashMap::new()),
            store_degraded: AtomicBool::new(false),
        }
    }

    /// Limiter backed by the file at `path`, preloaded with whatever it holds.
    /// An unreadable file degrades to an empty in-memory table.
    pub fn with_store(path: impl Into<PathBuf>) -> Self {
        let store = RateLimitStore::new(path);
        let now = Utc::now();
        let loaded = match store.load(now) {
            Ok(loaded) => loaded,
            Err(err) => {
                log::warn!("rate limit state not loaded: {err}");
                HashMap::new()
            }
        };

        let persisted = loaded
            .iter()
            .map(|(target, state)| (target.clone(), PersistedRecord::from_state(state)))
            .collect();
        let targets = loaded
            .into_iter()
            .map(|(target, state)| (target, TargetSlot::new(state)))
            .collect();

        log::debug!("rate limiter loaded from {}", store.path().display());
        Self {
            targets: RwLock::new(targets),
            store: Some(store),
            persisted: Mutex::new(persisted),
            store_degraded: AtomicBool::new(false),
        }
    }

    pub fn store_path(&self) -> Option<&std::path::Path> {
        self.store.as_ref().map(RateLimitStore::path)
    }

    fn slot(&self, target: &str) -> Arc<TargetSlot> {
        if let Ok(guard) = self.targets.read()
            && let Some(slot) = guard.get(target)
        {
            return Arc::clone(slot);
        }

        let mut guard = self
            .targets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            guard
                .entry(target.to_string())
                .or_insert_with(|| TargetSlot::new(RateLimitState::fresh(Utc::now()))),
        )
    }

    /// Serialises checks against `target`. Distinct targets never contend.
    pub async fn gate(&self, target: &str) -> TargetGate {
        let gate = Arc::clone(&self.slot(target).gate);
        TargetGate {
            target: target.to_string(),
            _guard: gate.lock_owned().await,
        }
    }

    /// Delay the caller must observe before the next request to `target`.
    pub fn should_wait(&self, target: &str) -> Duration {
        self.should_wait_at(target, Utc::now())
    }

    pub fn should_wait_at(&self, target: &str, now: DateTime<Utc>) -> Duration {
        let slot = self.slot(target);
        let state = slot
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.wait_at(now)
    }

    /// Must be called once after every completed request to `target`.
    pub fn record_request(&self, target: &str, was_rate_limited: bool) {
        self.record_request_at(target, was_rate_limited, Utc::now());
    }

    pub fn record_request_at(&self, target: &str, was_rate_limited: bool, now: DateTime<Utc>) {
        let slot = self.slot(target);
        let record = {
            let mut state = slot
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.record_at(was_rate_limited, now);
            if was_rate_limited {
                log::warn!(
                    "[{}] throttled, spacing now {:.2}s, penalty until {}",
                    target,
                    state.delay_secs,
                    state.penalty_until.to_rfc3339()
                );
            }
            PersistedRecord::from_state(&state)
        };

        self.persist(target, record);
    }

    fn persist(&self, target: &str, record: PersistedRecord) {
        let mut persisted = self
            .persisted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        persisted.insert(target.to_string(), record);

        let Some(store) = self.store.as_ref() else {
            return;
        };

        // The lock stays held across the write so renames land in order.
        match store.save(&persisted) {
            Ok(()) => {
                if self.store_degraded.swap(false, Ordering::Relaxed) {
                    log::info!("rate limit persistence recovered");
                }
            }
            Err(err) => {
                if !self.store_degraded.swap(true, Ordering::Relaxed) {
                    log::warn!("rate limit state kept in memory only: {err}");
                } else {
                    log::debug!("rate limit persistence still failing: {err}");
                }
            }
        }
    }

    /// Copy of the state for `target`, if it has been referenced.
    pub fn snapshot(&self, target: &str) -> Option<RateLimitState> {
        let slot = self.targets.read().ok()?.get(target).cloned()?;
        let state = slot
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(state.clone())
    }

    pub fn targets(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .targets
            .read()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::in_memory()
    }
}
