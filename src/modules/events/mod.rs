//! Event system for the check pipeline.
//!
//! Provides hooks for metrics, logging, and custom reactions around every
//! request a check issues.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::metrics::MetricsCollector;
use crate::checks::core::{CheckOutcome, ThrottleSignal};

/// Emitted right before a request, after any limiter wait.
#[derive(Debug, Clone)]
pub struct PreRequestEvent {
    pub target: String,
    pub url: Url,
    pub identity: String,
    pub waited: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Emitted for every response, whatever its status.
#[derive(Debug, Clone)]
pub struct PostResponseEvent {
    pub target: String,
    pub url: Url,
    pub final_url: Url,
    pub status: u16,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ThrottledEvent {
    pub target: String,
    pub url: Url,
    /// `None` when the detector applied its own throttling rule.
    pub signal: Option<ThrottleSignal>,
    pub retry_after: Option<Duration>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TransportErrorEvent {
    pub target: String,
    pub url: Url,
    pub kind: &'static str,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OutcomeEvent {
    pub target: String,
    pub handle: String,
    pub outcome: CheckOutcome,
    pub profile_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ProbeEvent {
    PreRequest(PreRequestEvent),
    PostResponse(PostResponseEvent),
    Throttled(ThrottledEvent),
    TransportError(TransportErrorEvent),
    Outcome(OutcomeEvent),
}

impl ProbeEvent {
    pub fn target(&self) -> &str {
        match self {
            ProbeEvent::PreRequest(event) => &event.target,
            ProbeEvent::PostResponse(event) => &event.target,
            ProbeEvent::Throttled(event) => &event.target,
            ProbeEvent::TransportError(event) => &event.target,
            ProbeEvent::Outcome(event) => &event.target,
        }
    }
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &ProbeEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&self, event: ProbeEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &ProbeEvent) {
        match event {
            ProbeEvent::PreRequest(pre) => {
                if pre.waited.is_zero() {
                    log::debug!("[{}] -> GET {}", pre.target, pre.url);
                } else {
                    log::debug!(
                        "[{}] -> GET {} (waited {:.2}s)",
                        pre.target,
                        pre.url,
                        pre.waited.as_secs_f64()
                    );
                }
            }
            ProbeEvent::PostResponse(post) => {
                log::debug!(
                    "[{}] <- {} {} ({:.2}s)",
                    post.target,
                    post.status,
                    post.final_url,
                    post.latency.as_secs_f64()
                );
            }
            ProbeEvent::Throttled(throttled) => {
                let signal = throttled.signal.map_or("detector", ThrottleSignal::as_str);
                match throttled.retry_after {
                    Some(hint) => log::info!(
                        "[{}] throttled ({}) on {}, server asks for {:.0}s",
                        throttled.target,
                        signal,
                        throttled.url,
                        hint.as_secs_f64()
                    ),
                    None => log::info!("[{}] throttled ({}) on {}", throttled.target, signal, throttled.url),
                }
            }
            ProbeEvent::TransportError(error) => {
                log::warn!("[{}] {} failed: {}", error.target, error.url, error.error);
            }
            ProbeEvent::Outcome(outcome) => {
                log::info!(
                    "[{}] {} -> {}",
                    outcome.target,
                    outcome.handle,
                    outcome.outcome.as_str()
                );
            }
        }
    }
}

/// Metrics handler that feeds the metrics collector.
#[derive(Clone, Debug)]
pub struct MetricsHandler {
    metrics: MetricsCollector,
}

impl MetricsHandler {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.metrics
    }
}

impl EventHandler for MetricsHandler {
    fn handle(&self, event: &ProbeEvent) {
        match event {
            ProbeEvent::PostResponse(post) => {
                self.metrics
                    .record_response(&post.target, post.status, post.latency);
            }
            ProbeEvent::TransportError(error) => {
                self.metrics.record_transport_error(&error.target);
            }
            ProbeEvent::Throttled(throttled) => {
                self.metrics.record_throttled(&throttled.target);
            }
            ProbeEvent::Outcome(outcome) => {
                self.metrics.record_outcome(&outcome.target, outcome.outcome);
            }
            ProbeEvent::PreRequest(_) => {}
        }
    }
}
