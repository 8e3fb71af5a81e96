//! Per-target HTTP sessions.
//!
//! A session is a pooled `reqwest::Client` carrying a target-scoped identity
//! header. The manager creates one lazily on first use, hands out shared
//! references for every later check against the same target, and drops them
//! all on [`SessionManager::close_all`]. No network traffic happens here.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::modules::identity::IdentityPool;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to build http client for '{target}': {source}")]
    Build {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid header value for '{0}'")]
    InvalidHeader(String),
}

/// Transport tuning applied to every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle connections kept per host.
    pub pool_size: usize,
    /// Reconnect attempts when a connection cannot be established.
    pub max_retries: u32,
    pub max_redirects: usize,
    pub idle_timeout: Duration,
    pub accept_language: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            max_retries: 3,
            max_redirects: 10,
            idle_timeout: Duration::from_secs(90),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

/// Reusable connection state for one target.
#[derive(Debug)]
pub struct Session {
    target: String,
    identity: String,
    client: reqwest::Client,
    max_retries: u32,
    created_at: DateTime<Utc>,
}

impl Session {
    fn build(target: &str, identity: String, config: &SessionConfig) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&identity)
                .map_err(|_| SessionError::InvalidHeader("user-agent".into()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|_| SessionError::InvalidHeader("accept-language".into()))?,
        );

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .redirect(Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(config.pool_size)
            .pool_idle_timeout(config.idle_timeout)
            .build()
            .map_err(|source| SessionError::Build {
                target: target.to_string(),
                source,
            })?;

        Ok(Self {
            target: target.to_string(),
            identity,
            client,
            max_retries: config.max_retries,
            created_at: Utc::now(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The `User-Agent` assigned at creation.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Owns every session; callers only ever borrow them.
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    identities: IdentityPool,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_identities(config, IdentityPool::default())
    }

    pub fn with_identities(config: SessionConfig, identities: IdentityPool) -> Self {
        Self {
            config,
            identities,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Existing session for `target`, or a new one with the next identity.
    pub fn get_session(&self, target: &str) -> Result<Arc<Session>, SessionError> {
        self.get_or_create(target, None)
    }

    /// Like [`get_session`](Self::get_session), but a newly created session
    /// uses `identity` instead of drawing from the rotation.
    pub fn get_session_with_identity(
        &self,
        target: &str,
        identity: &str,
    ) -> Result<Arc<Session>, SessionError> {
        self.get_or_create(target, Some(identity))
    }

    fn get_or_create(
        &self,
        target: &str,
        pinned: Option<&str>,
    ) -> Result<Arc<Session>, SessionError> {
        if let Ok(guard) = self.sessions.read()
            && let Some(session) = guard.get(target)
        {
            return Ok(Arc::clone(session));
        }

        let mut guard = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another caller may have created it between the two locks.
        if let Some(session) = guard.get(target) {
            return Ok(Arc::clone(session));
        }

        let identity = match pinned {
            Some(identity) => identity.to_string(),
            None => self.identities.next_identity(),
        };
        let session = Arc::new(Session::build(target, identity, &self.config)?);
        log::debug!(
            "[{}] new session, identity '{}'",
            target,
            session.identity()
        );
        guard.insert(target.to_string(), Arc::clone(&session));
        Ok(session)
    }

    pub fn contains(&self, target: &str) -> bool {
        self.sessions
            .read()
            .map(|guard| guard.contains_key(target))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every session. Connections close once in-flight borrowers
    /// drop their references.
    pub fn close_all(&self) {
        let mut guard = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !guard.is_empty() {
            log::debug!("closing {} session(s)", guard.len());
        }
        guard.clear();
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_session_per_target() {
        let manager = SessionManager::default();
        let first = manager.get_session("github").unwrap();
        let second = manager.get_session("github").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn distinct_targets_get_distinct_identities() {
        let manager = SessionManager::default();
        let a = manager.get_session("github").unwrap();
        let b = manager.get_session("gitlab").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.target(), "github");
        assert_eq!(b.target(), "gitlab");
    }

    #[test]
    fn rotation_follows_pool_order() {
        let pool = IdentityPool::new(["ua-1", "ua-2"]);
        let manager = SessionManager::with_identities(SessionConfig::default(), pool);
        assert_eq!(manager.get_session("a").unwrap().identity(), "ua-1");
        assert_eq!(manager.get_session("b").unwrap().identity(), "ua-2");
        assert_eq!(manager.get_session("c").unwrap().identity(), "ua-1");
        // Reuse does not advance the rotation.
        assert_eq!(manager.get_session("a").unwrap().identity(), "ua-1");
    }

    #[test]
    fn pinned_identity_skips_rotation() {
        let pool = IdentityPool::new(["ua-1", "ua-2"]);
        let manager = SessionManager::with_identities(SessionConfig::default(), pool.clone());
        let pinned = manager
            .get_session_with_identity("facebook", "custom-agent")
            .unwrap();
        assert_eq!(pinned.identity(), "custom-agent");
        assert_eq!(pool.issued(), 0);
    }

    #[test]
    fn close_all_is_safe_when_empty_and_clears() {
        let manager = SessionManager::default();
        manager.close_all();
        assert!(manager.is_empty());

        let before = manager.get_session("reddit").unwrap();
        manager.close_all();
        assert!(!manager.contains("reddit"));
        let after = manager.get_session("reddit").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
