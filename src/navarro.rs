//! High level probe orchestration.
//!
//! Wires the detector registry, the rate limiter, the session manager and the
//! event/metrics subsystems together behind one ergonomic entry point that
//! checks handles across every selected platform.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::checks::core::{
	CheckOutcome, CheckReport, HandleError, ProbeHttpClient, ReqwestProbeClient, validate_handle,
};
use crate::checks::detectors::{Detector, DetectorRegistry};
use crate::checks::pipeline::{CheckPipeline, DEFAULT_TIMEOUT};
use crate::config::default_state_path;
use crate::modules::events::{EventDispatcher, EventHandler, LoggingHandler, MetricsHandler};
use crate::modules::identity::IdentityPool;
use crate::modules::metrics::MetricsCollector;
use crate::modules::rate_limit::RateLimiter;
use crate::modules::session::{SessionConfig, SessionError, SessionManager};
use crate::report::HandleReport;

/// Result alias used across the orchestration layer.
pub type NavarroResult<T> = Result<T, NavarroError>;

/// High-level error surfaced by the orchestrator.
///
/// Individual checks never fail; these only cover misuse and I/O around them.
#[derive(Debug, Error)]
pub enum NavarroError {
	#[error("unknown platform(s): {}", .0.join(", "))]
	UnknownTargets(Vec<String>),
	#[error("invalid username: {0}")]
	InvalidHandle(#[from] HandleError),
	#[error("session error: {0}")]
	Session(#[from] SessionError),
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Orchestrator configuration used by the builder.
#[derive(Debug, Clone)]
pub struct NavarroConfig {
	pub timeout: Duration,
	/// `None` keeps rate limit state in memory only.
	pub state_path: Option<PathBuf>,
	pub persist_state: bool,
	pub handle_delay_min: Duration,
	pub handle_delay_max: Duration,
	/// 1 runs targets strictly one after another.
	pub max_parallel_targets: usize,
	pub session: SessionConfig,
	/// Empty uses the built-in identity rotation.
	pub user_agents: Vec<String>,
	pub enable_metrics: bool,
}

impl Default for NavarroConfig {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			state_path: None,
			persist_state: true,
			handle_delay_min: Duration::from_secs(2),
			handle_delay_max: Duration::from_secs(5),
			max_parallel_targets: 1,
			session: SessionConfig::default(),
			user_agents: Vec::new(),
			enable_metrics: true,
		}
	}
}

/// Fluent builder for [`Navarro`].
pub struct NavarroBuilder {
	config: NavarroConfig,
	registry: Option<DetectorRegistry>,
	client: Option<Arc<dyn ProbeHttpClient>>,
	limiter: Option<Arc<RateLimiter>>,
	handlers: Vec<Arc<dyn EventHandler>>,
}

impl NavarroBuilder {
	pub fn new() -> Self {
		Self {
			config: NavarroConfig::default(),
			registry: None,
			client: None,
			limiter: None,
			handlers: Vec::new(),
		}
	}

	pub fn with_config(mut self, config: NavarroConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.config.timeout = timeout;
		self
	}

	pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.config.state_path = Some(path.into());
		self
	}

	/// Uses [`default_state_path`] when one can be resolved.
	pub fn with_default_state_path(mut self) -> Self {
		self.config.state_path = default_state_path();
		self
	}

	pub fn without_persistence(mut self) -> Self {
		self.config.persist_state = false;
		self
	}

	pub fn with_handle_delay(mut self, min: Duration, max: Duration) -> Self {
		self.config.handle_delay_min = min;
		self.config.handle_delay_max = max;
		self
	}

	pub fn with_max_parallel_targets(mut self, max: usize) -> Self {
		self.config.max_parallel_targets = max.max(1);
		self
	}

	pub fn with_session_config(mut self, config: SessionConfig) -> Self {
		self.config.session = config;
		self
	}

	pub fn with_user_agents<I, S>(mut self, agents: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.user_agents = agents.into_iter().map(Into::into).collect();
		self
	}

	pub fn disable_metrics(mut self) -> Self {
		self.config.enable_metrics = false;
		self
	}

	pub fn with_registry(mut self, registry: DetectorRegistry) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Replaces the reqwest transport, mostly useful for tests.
	pub fn with_client(mut self, client: Arc<dyn ProbeHttpClient>) -> Self {
		self.client = Some(client);
		self
	}

	/// Shares an existing limiter instead of building one from the state path.
	pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
		self.limiter = Some(limiter);
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	pub fn build(self) -> NavarroResult<Navarro> {
		Navarro::from_builder(self)
	}
}

impl Default for NavarroBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Main probe orchestrator.
pub struct Navarro {
	config: NavarroConfig,
	registry: Arc<DetectorRegistry>,
	pipeline: CheckPipeline,
	metrics: Option<MetricsCollector>,
}

impl Navarro {
	/// Construct an orchestrator with default configuration.
	pub fn new() -> NavarroResult<Self> {
		NavarroBuilder::new().build()
	}

	/// Obtain a builder to customise the orchestrator instance.
	pub fn builder() -> NavarroBuilder {
		NavarroBuilder::new()
	}

	fn from_builder(builder: NavarroBuilder) -> NavarroResult<Self> {
		let NavarroBuilder {
			config,
			registry,
			client,
			limiter,
			handlers,
		} = builder;

		if config.timeout.is_zero() {
			return Err(NavarroError::InvalidConfig("timeout must be positive".into()));
		}
		if config.handle_delay_min > config.handle_delay_max {
			return Err(NavarroError::InvalidConfig(format!(
				"handle delay range {:?}..{:?} is empty",
				config.handle_delay_min, config.handle_delay_max
			)));
		}

		let limiter = limiter.unwrap_or_else(|| {
			let limiter = match (&config.state_path, config.persist_state) {
				(Some(path), true) => RateLimiter::with_store(path.clone()),
				_ => RateLimiter::in_memory(),
			};
			Arc::new(limiter)
		});

		let identities = IdentityPool::new(config.user_agents.iter().cloned());
		let sessions = Arc::new(SessionManager::with_identities(
			config.session.clone(),
			identities,
		));
		let client: Arc<dyn ProbeHttpClient> =
			client.unwrap_or_else(|| Arc::new(ReqwestProbeClient::new()));

		let mut events = EventDispatcher::new();
		events.register_handler(Arc::new(LoggingHandler));
		let metrics = if config.enable_metrics {
			let collector = MetricsCollector::new();
			events.register_handler(Arc::new(MetricsHandler::new(collector.clone())));
			Some(collector)
		} else {
			None
		};
		for handler in handlers {
			events.register_handler(handler);
		}

		let pipeline = CheckPipeline::new(limiter, sessions, client)
			.with_events(events)
			.with_timeout(config.timeout);

		Ok(Self {
			registry: Arc::new(registry.unwrap_or_else(DetectorRegistry::builtin)),
			config,
			pipeline,
			metrics,
		})
	}

	pub fn config(&self) -> &NavarroConfig {
		&self.config
	}

	pub fn registry(&self) -> &DetectorRegistry {
		&self.registry
	}

	pub fn limiter(&self) -> &Arc<RateLimiter> {
		self.pipeline.limiter()
	}

	pub fn sessions(&self) -> &Arc<SessionManager> {
		self.pipeline.sessions()
	}

	/// `None` when metrics were disabled.
	pub fn metrics(&self) -> Option<&MetricsCollector> {
		self.metrics.as_ref()
	}

	/// Checks one handle on one platform, looked up by key or display name.
	pub async fn check_target(&self, target: &str, handle: &str) -> NavarroResult<CheckReport> {
		let detector = self
			.registry
			.resolve(target)
			.ok_or_else(|| NavarroError::UnknownTargets(vec![target.to_string()]))?;
		validate_handle(handle)?;
		Ok(self.pipeline.check_report(detector.as_ref(), handle).await)
	}

	/// Checks one handle on every platform matching `filters` (all when empty).
	///
	/// Results keep registry order regardless of parallelism.
	pub async fn check_handle<S: AsRef<str>>(
		&self,
		handle: &str,
		filters: &[S],
	) -> NavarroResult<HandleReport> {
		validate_handle(handle)?;
		let detectors = self.registry.select(filters)?;
		Ok(self.run_handle(handle, &detectors).await)
	}

	/// Checks several handles in order, pausing between them.
	///
	/// Invalid handles are logged and skipped.
	pub async fn check_handles<H, S>(
		&self,
		handles: &[H],
		filters: &[S],
	) -> NavarroResult<Vec<HandleReport>>
	where
		H: AsRef<str>,
		S: AsRef<str>,
	{
		self.check_handles_with(handles, filters, |_| {}).await
	}

	/// Like [`check_handles`](Self::check_handles), calling `on_report` as
	/// each handle completes.
	pub async fn check_handles_with<H, S, F>(
		&self,
		handles: &[H],
		filters: &[S],
		mut on_report: F,
	) -> NavarroResult<Vec<HandleReport>>
	where
		H: AsRef<str>,
		S: AsRef<str>,
		F: FnMut(&HandleReport),
	{
		let detectors = self.registry.select(filters)?;
		let mut reports = Vec::with_capacity(handles.len());

		for handle in handles.iter().map(AsRef::as_ref) {
			if let Err(err) = validate_handle(handle) {
				log::warn!("skipping '{}': {}", handle, err);
				continue;
			}
			if !reports.is_empty() {
				let delay = self.handle_delay();
				log::debug!("waiting {:.2}s before '{}'", delay.as_secs_f64(), handle);
				tokio::time::sleep(delay).await;
			}

			let report = self.run_handle(handle, &detectors).await;
			on_report(&report);
			reports.push(report);
		}

		Ok(reports)
	}

	/// Releases every pooled session.
	pub fn close(&self) {
		self.pipeline.sessions().close_all();
		if let Some(metrics) = &self.metrics {
			let global = metrics.snapshot().global;
			log::debug!(
				"closed after {} request(s), {} throttled, {} transport error(s)",
				global.total_requests,
				global.throttled,
				global.transport_errors
			);
		}
	}

	fn handle_delay(&self) -> Duration {
		let min = self.config.handle_delay_min.as_secs_f64();
		let max = self.config.handle_delay_max.as_secs_f64();
		if max <= min {
			return self.config.handle_delay_min;
		}
		Duration::from_secs_f64(rand::thread_rng().gen_range(min..=max))
	}

	async fn run_handle(&self, handle: &str, detectors: &[Arc<dyn Detector>]) -> HandleReport {
		let results = if self.config.max_parallel_targets <= 1 {
			let mut results = Vec::with_capacity(detectors.len());
			for detector in detectors {
				results.push(self.pipeline.check_report(detector.as_ref(), handle).await);
			}
			results
		} else {
			self.run_parallel(handle, detectors).await
		};
		HandleReport::new(handle, results)
	}

	async fn run_parallel(&self, handle: &str, detectors: &[Arc<dyn Detector>]) -> Vec<CheckReport> {
		let permits = Arc::new(Semaphore::new(self.config.max_parallel_targets));
		let mut tasks = JoinSet::new();

		for (index, detector) in detectors.iter().enumerate() {
			let pipeline = self.pipeline.clone();
			let detector = Arc::clone(detector);
			let permits = Arc::clone(&permits);
			let handle = handle.to_string();
			tasks.spawn(async move {
				let _permit = permits.acquire_owned().await.ok();
				(index, pipeline.check_report(detector.as_ref(), &handle).await)
			});
		}

		let mut slots: Vec<Option<CheckReport>> = vec![None; detectors.len()];
		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((index, report)) => slots[index] = Some(report),
				Err(err) => log::warn!("check task for '{}' failed: {}", handle, err),
			}
		}

		slots
			.into_iter()
			.zip(detectors)
			.map(|(slot, detector)| {
				slot.unwrap_or_else(|| {
					CheckReport::new(detector.key(), detector.name(), CheckOutcome::UnknownError, None)
				})
			})
			.collect()
	}
}

impl std::fmt::Debug for Navarro {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Navarro")
			.field("config", &self.config)
			.field("targets", &self.registry.len())
			.field("pipeline", &self.pipeline)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_inverted_delay_range() {
		let err = Navarro::builder()
			.with_handle_delay(Duration::from_secs(5), Duration::from_secs(2))
			.build()
			.unwrap_err();
		assert!(matches!(err, NavarroError::InvalidConfig(_)));
	}

	#[test]
	fn rejects_zero_timeout() {
		let err = Navarro::builder().with_timeout(Duration::ZERO).build().unwrap_err();
		assert!(matches!(err, NavarroError::InvalidConfig(_)));
	}

	#[test]
	fn delay_stays_in_range() {
		let navarro = Navarro::builder()
			.with_handle_delay(Duration::from_millis(10), Duration::from_millis(20))
			.build()
			.unwrap();
		for _ in 0..50 {
			let delay = navarro.handle_delay();
			assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
		}
	}

	#[test]
	fn in_memory_without_state_path() {
		let navarro = Navarro::new().unwrap();
		assert!(navarro.limiter().store_path().is_none());
		assert_eq!(navarro.registry().len(), 38);
		assert!(navarro.metrics().is_some());
	}

	#[test]
	fn persistence_can_be_disabled() {
		let dir = tempfile::tempdir().unwrap();
		let navarro = Navarro::builder()
			.with_state_path(dir.path().join("limits.json"))
			.without_persistence()
			.build()
			.unwrap();
		assert!(navarro.limiter().store_path().is_none());
	}

	#[tokio::test]
	async fn unknown_target_and_bad_handle_are_errors() {
		let navarro = Navarro::builder().disable_metrics().build().unwrap();
		let err = navarro.check_target("myspace", "alice").await.unwrap_err();
		assert_eq!(err.to_string(), "unknown platform(s): myspace");

		let err = navarro.check_target("github", "bad handle").await.unwrap_err();
		assert!(matches!(err, NavarroError::InvalidHandle(HandleError::InvalidCharacters)));
		assert!(navarro.sessions().is_empty());
	}
}
