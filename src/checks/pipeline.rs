//! Check orchestration pipeline.
//!
//! Drives one `(target, handle)` check through its states: validate the
//! handle, take the target's gate, wait out the rate limiter, borrow the
//! target's session, then probe each candidate URL until a response settles
//! the question. Every failure mode ends in a [`CheckOutcome`]; nothing
//! escapes as an error.
//!
//! Detectors that need a bespoke probe loop receive a [`CheckContext`], which
//! exposes the same wait/session/request/record steps the default loop uses,
//! so overrides cannot bypass the limiter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use url::Url;

use crate::checks::core::{
    CheckOutcome, CheckReport, ProbeHttpClient, ProbeHttpError, ProbeResponse, retry_after_hint,
    throttle_signal, validate_handle,
};
use crate::checks::detectors::{Detector, Verdict, classify};
use crate::modules::events::{
    EventDispatcher, OutcomeEvent, PostResponseEvent, PreRequestEvent, ProbeEvent, ThrottledEvent,
    TransportErrorEvent,
};
use crate::modules::rate_limit::RateLimiter;
use crate::modules::session::{Session, SessionError, SessionManager};

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Result of a single request made through a [`CheckContext`].
#[derive(Debug)]
pub enum Attempt {
    /// A response that carried no throttling signal. Already recorded.
    Completed(ProbeResponse),
    /// A throttled response. Already recorded with the penalty applied.
    Throttled(ProbeResponse),
    /// No response. Not recorded.
    Failed(ProbeHttpError),
}

/// Per-check handle on the shared services.
pub struct CheckContext<'a> {
    detector: &'a dyn Detector,
    limiter: &'a RateLimiter,
    sessions: &'a SessionManager,
    client: &'a dyn ProbeHttpClient,
    events: &'a EventDispatcher,
    timeout: Duration,
}

impl<'a> CheckContext<'a> {
    pub fn target(&self) -> &str {
        self.detector.key()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sleeps for whatever the rate limiter demands and returns how long that was.
    pub async fn wait_turn(&self) -> Duration {
        let wait = self.limiter.should_wait(self.target());
        if !wait.is_zero() {
            log::debug!("[{}] waiting {:.2}s", self.target(), wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// The target's session, honouring the detector's pinned identity.
    pub fn session(&self) -> Result<Arc<Session>, SessionError> {
        match self.detector.pinned_identity() {
            Some(identity) => self.sessions.get_session_with_identity(self.target(), identity),
            None => self.sessions.get_session(self.target()),
        }
    }

    /// Issues one GET, classifies throttling and records the request.
    pub async fn attempt(&self, session: &Session, url: &str) -> Attempt {
        self.attempt_after(session, url, Duration::ZERO).await
    }

    async fn attempt_after(&self, session: &Session, url: &str, waited: Duration) -> Attempt {
        let target = self.target();
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Attempt::Failed(ProbeHttpError::InvalidUrl(format!("{url}: {err}")));
            }
        };

        self.events.dispatch(ProbeEvent::PreRequest(PreRequestEvent {
            target: target.to_string(),
            url: parsed.clone(),
            identity: session.identity().to_string(),
            waited,
            timestamp: Utc::now(),
        }));

        let started = Instant::now();
        let response = match self.client.get(session, &parsed, self.timeout).await {
            Ok(response) => response,
            Err(err) => {
                self.events.dispatch(ProbeEvent::TransportError(TransportErrorEvent {
                    target: target.to_string(),
                    url: parsed,
                    kind: err.kind(),
                    error: err.to_string(),
                    timestamp: Utc::now(),
                }));
                return Attempt::Failed(err);
            }
        };

        self.events.dispatch(ProbeEvent::PostResponse(PostResponseEvent {
            target: target.to_string(),
            url: parsed.clone(),
            final_url: response.url.clone(),
            status: response.status,
            latency: started.elapsed(),
            timestamp: Utc::now(),
        }));

        if self.detector.is_rate_limited(&response) {
            self.limiter.record_request(target, true);
            self.events.dispatch(ProbeEvent::Throttled(ThrottledEvent {
                target: target.to_string(),
                url: parsed,
                signal: throttle_signal(&response),
                retry_after: retry_after_hint(&response),
                timestamp: Utc::now(),
            }));
            return Attempt::Throttled(response);
        }

        self.limiter.record_request(target, false);
        Attempt::Completed(response)
    }
}

/// Runs checks against shared limiter, session and transport services.
#[derive(Clone)]
pub struct CheckPipeline {
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionManager>,
    client: Arc<dyn ProbeHttpClient>,
    events: EventDispatcher,
    timeout: Duration,
}

impl CheckPipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        sessions: Arc<SessionManager>,
        client: Arc<dyn ProbeHttpClient>,
    ) -> Self {
        Self {
            limiter,
            sessions,
            client,
            events: EventDispatcher::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Checks `handle` on the detector's platform. Always yields an outcome.
    pub async fn check(&self, detector: &dyn Detector, handle: &str) -> CheckOutcome {
        let target = detector.key();
        if let Err(err) = validate_handle(handle) {
            log::debug!("[{}] rejected handle '{}': {}", target, handle, err);
            return self.finish(target, handle, CheckOutcome::UnknownError, None);
        }

        let _gate = self.limiter.gate(target).await;
        let ctx = CheckContext {
            detector,
            limiter: &self.limiter,
            sessions: &self.sessions,
            client: self.client.as_ref(),
            events: &self.events,
            timeout: self.timeout,
        };

        let outcome = match detector.check_override(&ctx, handle).await {
            Some(outcome) => outcome,
            None => self.probe_urls(&ctx, detector, handle).await,
        };

        let profile_url = (outcome == CheckOutcome::Found).then(|| detector.profile_url(handle));
        self.finish(target, handle, outcome, profile_url)
    }

    /// Like [`check`](Self::check), with display metadata attached.
    pub async fn check_report(&self, detector: &dyn Detector, handle: &str) -> CheckReport {
        let outcome = self.check(detector, handle).await;
        let profile_url = (outcome == CheckOutcome::Found).then(|| detector.profile_url(handle));
        CheckReport::new(detector.key(), detector.name(), outcome, profile_url)
    }

    async fn probe_urls(&self, ctx: &CheckContext<'_>, detector: &dyn Detector, handle: &str) -> CheckOutcome {
        let waited = ctx.wait_turn().await;
        let session = match ctx.session() {
            Ok(session) => session,
            Err(err) => {
                log::warn!("[{}] no session: {}", ctx.target(), err);
                return CheckOutcome::UnknownError;
            }
        };

        for (index, url) in detector.urls(handle).iter().enumerate() {
            let waited = if index == 0 { waited } else { Duration::ZERO };
            let response = match ctx.attempt_after(&session, url, waited).await {
                Attempt::Completed(response) => response,
                Attempt::Throttled(_) => return CheckOutcome::RateLimited,
                Attempt::Failed(err) => return err.outcome(),
            };

            match classify(detector, &response, handle) {
                Verdict::Found => return CheckOutcome::Found,
                Verdict::NotFound | Verdict::Inconclusive => continue,
            }
        }

        CheckOutcome::NotFound
    }

    fn finish(
        &self,
        target: &str,
        handle: &str,
        outcome: CheckOutcome,
        profile_url: Option<String>,
    ) -> CheckOutcome {
        self.events.dispatch(ProbeEvent::Outcome(OutcomeEvent {
            target: target.to_string(),
            handle: handle.to_string(),
            outcome,
            profile_url,
            timestamp: Utc::now(),
        }));
        outcome
    }
}

impl std::fmt::Debug for CheckPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckPipeline")
            .field("timeout", &self.timeout)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
