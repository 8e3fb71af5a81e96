//! Per-platform detection policies.
//!
//! A [`Detector`] tells the pipeline which URLs to probe for a handle and how
//! to read the responses. Most platforms are plain [`MarkerDetector`]s built
//! from [`Evidence`] trees; a few replace the whole probe loop through
//! [`Detector::check_override`]. Detectors are collected into an immutable
//! [`DetectorRegistry`] at startup.

pub mod evidence;
pub mod facebook;
pub mod marker;
pub mod mastodon;
pub mod platforms;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::checks::core::{CheckOutcome, ProbeResponse, is_rate_limited};
use crate::checks::pipeline::CheckContext;
use crate::navarro::NavarroError;

pub use evidence::{Evidence, HANDLE_PLACEHOLDER};
pub use facebook::FacebookDetector;
pub use marker::{MarkerDetector, MarkerDetectorBuilder};
pub use mastodon::MastodonDetector;

/// Which predicate wins when a response satisfies both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precedence {
    #[default]
    NotFoundFirst,
    FoundFirst,
}

/// Reading of a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Found,
    NotFound,
    Inconclusive,
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Lowercase slug, also the rate limiter and session key.
    fn key(&self) -> &str;

    fn name(&self) -> &str;

    /// Candidate URLs, probed in order.
    fn urls(&self, handle: &str) -> Vec<String>;

    fn detect_found(&self, response: &ProbeResponse, handle: &str) -> bool;

    fn detect_not_found(&self, response: &ProbeResponse, handle: &str) -> bool;

    /// Display URL reported with a `Found` outcome.
    fn profile_url(&self, handle: &str) -> String {
        self.urls(handle).into_iter().next().unwrap_or_default()
    }

    fn is_rate_limited(&self, response: &ProbeResponse) -> bool {
        is_rate_limited(response)
    }

    fn precedence(&self) -> Precedence {
        Precedence::NotFoundFirst
    }

    /// Identity to use instead of the rotation when this target's session is
    /// first created.
    fn pinned_identity(&self) -> Option<&str> {
        None
    }

    /// Replaces the default probe loop when it returns `Some`.
    async fn check_override(&self, _ctx: &CheckContext<'_>, _handle: &str) -> Option<CheckOutcome> {
        None
    }
}

impl fmt::Debug for dyn Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("key", &self.key())
            .field("name", &self.name())
            .finish()
    }
}

/// Applies the detector's precedence to one response.
pub fn classify(detector: &dyn Detector, response: &ProbeResponse, handle: &str) -> Verdict {
    match detector.precedence() {
        Precedence::NotFoundFirst => {
            if detector.detect_not_found(response, handle) {
                Verdict::NotFound
            } else if detector.detect_found(response, handle) {
                Verdict::Found
            } else {
                Verdict::Inconclusive
            }
        }
        Precedence::FoundFirst => {
            if detector.detect_found(response, handle) {
                Verdict::Found
            } else if detector.detect_not_found(response, handle) {
                Verdict::NotFound
            } else {
                Verdict::Inconclusive
            }
        }
    }
}

/// Ordered, immutable set of detectors keyed by slug.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorRegistry {
    /// Every built-in platform in display order.
    pub fn builtin() -> Self {
        Self::from_detectors(platforms::builtin_detectors())
    }

    /// Later detectors replace earlier ones with the same key.
    pub fn from_detectors(detectors: impl IntoIterator<Item = Arc<dyn Detector>>) -> Self {
        detectors
            .into_iter()
            .fold(Self::default(), |registry, detector| registry.with(detector))
    }

    pub fn with(mut self, detector: Arc<dyn Detector>) -> Self {
        match self
            .detectors
            .iter()
            .position(|existing| existing.key() == detector.key())
        {
            Some(index) => self.detectors[index] = detector,
            None => self.detectors.push(detector),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Detector>> {
        self.detectors
            .iter()
            .find(|detector| detector.key() == key)
            .cloned()
    }

    /// Case-insensitive lookup by key or display name.
    pub fn resolve(&self, query: &str) -> Option<Arc<dyn Detector>> {
        let query = query.trim();
        self.detectors
            .iter()
            .find(|detector| {
                detector.key().eq_ignore_ascii_case(query) || detector.name().eq_ignore_ascii_case(query)
            })
            .cloned()
    }

    /// Detectors matching `filters`, in registry order. An empty filter list
    /// selects everything.
    pub fn select<S: AsRef<str>>(&self, filters: &[S]) -> Result<Vec<Arc<dyn Detector>>, NavarroError> {
        let filters: Vec<&str> = filters
            .iter()
            .map(|filter| filter.as_ref().trim())
            .filter(|filter| !filter.is_empty())
            .collect();
        if filters.is_empty() {
            return Ok(self.detectors.clone());
        }

        let mut wanted = HashSet::new();
        let mut unknown = Vec::new();
        for filter in filters {
            match self.resolve(filter) {
                Some(detector) => {
                    wanted.insert(detector.key().to_string());
                }
                None => unknown.push(filter.to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(NavarroError::UnknownTargets(unknown));
        }

        Ok(self
            .detectors
            .iter()
            .filter(|detector| wanted.contains(detector.key()))
            .cloned()
            .collect())
    }

    pub fn names(&self) -> Vec<&str> {
        self.detectors.iter().map(|detector| detector.name()).collect()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.detectors.iter().map(|detector| detector.key()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Detector>> {
        self.detectors.iter()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
