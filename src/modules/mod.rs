//! Cross-cutting services module
//!
//! Identity rotation, per-target sessions, adaptive rate limiting, metrics and
//! the event hooks that tie them to the check pipeline.

pub mod events;
pub mod identity;
pub mod metrics;
pub mod rate_limit;
pub mod session;

// Re-export commonly used types
pub use events::{
    EventDispatcher, EventHandler, LoggingHandler, MetricsHandler, OutcomeEvent,
    PostResponseEvent, PreRequestEvent, ProbeEvent, ThrottledEvent, TransportErrorEvent,
};
pub use identity::{DEFAULT_USER_AGENTS, IdentityPool};
pub use metrics::{GlobalStats, MetricsCollector, MetricsSnapshot, TargetStats};
pub use rate_limit::{
    PersistedRecord, RateLimitState, RateLimitStore, RateLimitStoreError, RateLimiter, TargetGate,
};
pub use session::{Session, SessionConfig, SessionError, SessionManager};
