//! # navarro-rs
//!
//! Checks whether a username exists across dozens of web platforms, without
//! getting the prober banned along the way.
//!
//! Every check ends in exactly one [`CheckOutcome`]. Only `Found` and
//! `NotFound` are definitive; throttling, timeouts and transport failures are
//! reported as such and never collapse into "not found".
//!
//! ## Features
//!
//! - 38 built-in platforms, declared with a small evidence language
//! - Adaptive per-platform rate limiting with a 60s penalty window
//! - Rate limit state persisted across runs
//! - Pooled per-platform sessions with rotating identity headers
//! - JSON and CSV export
//!
//! ## Example
//!
//! ```no_run
//! use navarro_rs::Navarro;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let navarro = Navarro::builder().with_default_state_path().build()?;
//!     let report = navarro.check_handle("octocat", &["github", "gitlab"]).await?;
//!     for result in report.found() {
//!         println!("{}: {}", result.name, result.profile_url.as_deref().unwrap_or(""));
//!     }
//!     navarro.close();
//!     Ok(())
//! }
//! ```

mod navarro;

pub mod checks;
pub mod config;
pub mod modules;
pub mod report;

pub use crate::navarro::{
    Navarro,
    NavarroBuilder,
    NavarroConfig,
    NavarroError,
    NavarroResult,
};

pub use crate::checks::core::{
    CheckOutcome,
    CheckReport,
    HandleError,
    MAX_HANDLE_LEN,
    ProbeHttpClient,
    ProbeHttpError,
    ProbeResponse,
    ReqwestProbeClient,
    ThrottleSignal,
    is_rate_limited,
    is_valid_handle,
    normalize_handle,
    validate_handle,
};

pub use crate::checks::detectors::{
    Detector,
    DetectorRegistry,
    Evidence,
    FacebookDetector,
    MarkerDetector,
    MarkerDetectorBuilder,
    MastodonDetector,
    Precedence,
    Verdict,
    classify,
};

pub use crate::checks::pipeline::{
    Attempt,
    CheckContext,
    CheckPipeline,
    DEFAULT_TIMEOUT,
};

pub use crate::config::default_state_path;

pub use crate::modules::{
    EventDispatcher,
    EventHandler,
    GlobalStats,
    IdentityPool,
    LoggingHandler,
    MetricsCollector,
    MetricsHandler,
    MetricsSnapshot,
    ProbeEvent,
    RateLimitState,
    RateLimiter,
    Session,
    SessionConfig,
    SessionError,
    SessionManager,
    TargetStats,
};

pub use crate::report::{
    HandleReport,
    OutcomeSummary,
    export_csv,
    export_json,
    render_table,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
