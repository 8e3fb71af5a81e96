//! Metrics collection utilities.
//!
//! Per-target request counts, latency percentiles and a tally of final check
//! outcomes, plus run-wide totals.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::checks::core::CheckOutcome;

/// Aggregated metrics across all targets.
#[derive(Debug, Clone)]
pub struct GlobalStats {
    pub started_at: DateTime<Utc>,
    pub total_requests: u64,
    pub transport_errors: u64,
    pub throttled: u64,
    pub checks: u64,
    pub average_latency: Option<Duration>,
    pub p95_latency: Option<Duration>,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            total_requests: 0,
            transport_errors: 0,
            throttled: 0,
            checks: 0,
            average_latency: None,
            p95_latency: None,
        }
    }
}

/// Target-scoped metrics snapshot.
#[derive(Debug, Clone)]
pub struct TargetStats {
    pub target: String,
    pub total_requests: u64,
    pub transport_errors: u64,
    pub throttled: u64,
    pub outcomes: BTreeMap<CheckOutcome, u64>,
    pub average_latency: Option<Duration>,
    pub p95_latency: Option<Duration>,
    pub last_status: Option<u16>,
}

impl TargetStats {
    fn from_accumulator(target: &str, acc: &TargetAccumulator) -> Self {
        let (avg, p95) = latency_stats(acc.latencies.iter().copied());
        Self {
            target: target.to_string(),
            total_requests: acc.total_requests,
            transport_errors: acc.transport_errors,
            throttled: acc.throttled,
            outcomes: acc.outcomes.clone(),
            average_latency: avg,
            p95_latency: p95,
            last_status: acc.last_status,
        }
    }

    pub fn outcome_count(&self, outcome: CheckOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub global: GlobalStats,
    /// Sorted by target key.
    pub targets: Vec<TargetStats>,
}

impl MetricsSnapshot {
    pub fn target(&self, target: &str) -> Option<&TargetStats> {
        self.targets.iter().find(|stats| stats.target == target)
    }
}

fn latency_stats(samples: impl Iterator<Item = Duration>) -> (Option<Duration>, Option<Duration>) {
    let mut samples: Vec<_> = samples.collect();
    if samples.is_empty() {
        return (None, None);
    }
    samples.sort_unstable();
    let avg = samples.iter().map(|d| d.as_secs_f64()).sum::<f64>() / samples.len() as f64;
    let p95_index = ((samples.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);
    (Some(Duration::from_secs_f64(avg)), Some(samples[p95_index]))
}

#[derive(Debug)]
struct TargetAccumulator {
    total_requests: u64,
    transport_errors: u64,
    throttled: u64,
    outcomes: BTreeMap<CheckOutcome, u64>,
    latencies: VecDeque<Duration>,
    max_window: usize,
    last_status: Option<u16>,
}

impl TargetAccumulator {
    fn new(max_window: usize) -> Self {
        Self {
            total_requests: 0,
            transport_errors: 0,
            throttled: 0,
            outcomes: BTreeMap::new(),
            latencies: VecDeque::with_capacity(max_window),
            max_window,
            last_status: None,
        }
    }

    fn record_response(&mut self, status: u16, latency: Duration) {
        self.total_requests += 1;
        self.last_status = Some(status);
        if self.latencies.len() == self.max_window {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
    }
}

#[derive(Debug)]
struct MetricsState {
    global: GlobalStats,
    max_window: usize,
    targets: HashMap<String, TargetAccumulator>,
}

impl MetricsState {
    fn new(max_window: usize) -> Self {
        Self {
            global: GlobalStats::default(),
            max_window,
            targets: HashMap::new(),
        }
    }

    fn accumulator_mut(&mut self, target: &str) -> &mut TargetAccumulator {
        self.targets
            .entry(target.to_string())
            .or_insert_with(|| TargetAccumulator::new(self.max_window))
    }
}

/// Thread-safe metrics collector fed by [`MetricsHandler`](super::events::MetricsHandler).
#[derive(Clone, Debug)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_window(128)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState::new(window.max(16)))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_response(&self, target: &str, status: u16, latency: Duration) {
        let mut guard = self.lock();
        guard.global.total_requests += 1;

        if let Some(avg) = guard.global.average_latency {
            let blended = (avg.as_secs_f64() * 0.9) + (latency.as_secs_f64() * 0.1);
            guard.global.average_latency = Some(Duration::from_secs_f64(blended));
        } else {
            guard.global.average_latency = Some(latency);
        }

        guard.accumulator_mut(target).record_response(status, latency);

        let all_samples: Vec<_> = guard
            .targets
            .values()
            .flat_map(|acc| acc.latencies.iter().copied())
            .collect();
        guard.global.p95_latency = latency_stats(all_samples.into_iter()).1;
    }

    pub fn record_transport_error(&self, target: &str) {
        let mut guard = self.lock();
        guard.global.total_requests += 1;
        guard.global.transport_errors += 1;
        let acc = guard.accumulator_mut(target);
        acc.total_requests += 1;
        acc.transport_errors += 1;
        acc.last_status = None;
    }

    pub fn record_throttled(&self, target: &str) {
        let mut guard = self.lock();
        guard.global.throttled += 1;
        guard.accumulator_mut(target).throttled += 1;
    }

    pub fn record_outcome(&self, target: &str, outcome: CheckOutcome) {
        let mut guard = self.lock();
        guard.global.checks += 1;
        *guard
            .accumulator_mut(target)
            .outcomes
            .entry(outcome)
            .or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let guard = self.lock();
        let mut targets: Vec<_> = guard
            .targets
            .iter()
            .map(|(target, acc)| TargetStats::from_accumulator(target, acc))
            .collect();
        targets.sort_by(|a, b| a.target.cmp(&b.target));
        MetricsSnapshot {
            global: guard.global.clone(),
            targets,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
