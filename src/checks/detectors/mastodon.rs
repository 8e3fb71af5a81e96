//! Fediverse sweep across several Mastodon instances.

use async_trait::async_trait;

use crate::checks::core::{CheckOutcome, ProbeResponse};
use crate::checks::pipeline::{Attempt, CheckContext};

use super::evidence::Evidence;
use super::{Detector, Verdict, classify};

pub const DEFAULT_INSTANCES: &[&str] = &["mastodon.social", "hachyderm.io", "infosec.exchange"];

/// Looks for `@handle` on each instance in turn.
///
/// An instance that cannot be reached is skipped rather than failing the
/// whole check. The outcome is only inconclusive when no instance answered.
#[derive(Debug, Clone)]
pub struct MastodonDetector {
    instances: Vec<String>,
    found: Evidence,
    not_found: Evidence,
}

impl MastodonDetector {
    pub fn new<I, S>(instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut instances: Vec<String> = instances.into_iter().map(Into::into).collect();
        if instances.is_empty() {
            instances = DEFAULT_INSTANCES.iter().map(|host| host.to_string()).collect();
        }
        Self {
            instances,
            found: Evidence::all([Evidence::status(200), Evidence::templated_ci("@{handle}")]),
            not_found: Evidence::status(404),
        }
    }

    pub fn instances(&self) -> &[String] {
        &self.instances
    }
}

impl Default for MastodonDetector {
    fn default() -> Self {
        Self::new(DEFAULT_INSTANCES.iter().copied())
    }
}

#[async_trait]
impl Detector for MastodonDetector {
    fn key(&self) -> &str {
        "mastodon"
    }

    fn name(&self) -> &str {
        "Mastodon"
    }

    fn urls(&self, handle: &str) -> Vec<String> {
        self.instances
            .iter()
            .map(|host| format!("https://{host}/@{handle}"))
            .collect()
    }

    fn detect_found(&self, response: &ProbeResponse, handle: &str) -> bool {
        self.found.matches(response, handle)
    }

    fn detect_not_found(&self, response: &ProbeResponse, handle: &str) -> bool {
        self.not_found.matches(response, handle)
    }

    async fn check_override(&self, ctx: &CheckContext<'_>, handle: &str) -> Option<CheckOutcome> {
        let session = match ctx.session() {
            Ok(session) => session,
            Err(err) => {
                log::warn!("[{}] no session: {}", ctx.target(), err);
                return Some(CheckOutcome::UnknownError);
            }
        };

        let mut answered = false;
        let mut last_error = None;
        for url in self.urls(handle) {
            ctx.wait_turn().await;
            match ctx.attempt(&session, &url).await {
                Attempt::Throttled(_) => return Some(CheckOutcome::RateLimited),
                Attempt::Failed(err) => {
                    log::debug!("[{}] skipping {}: {}", ctx.target(), url, err);
                    last_error = Some(err);
                }
                Attempt::Completed(response) => {
                    answered = true;
                    if classify(self, &response, handle) == Verdict::Found {
                        return Some(CheckOutcome::Found);
                    }
                }
            }
        }

        Some(match (answered, last_error) {
            (false, Some(err)) => err.outcome(),
            _ => CheckOutcome::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use url::Url;

    #[test]
    fn sweeps_default_instances() {
        let detector = MastodonDetector::default();
        assert_eq!(
            detector.urls("alice"),
            [
                "https://mastodon.social/@alice",
                "https://hachyderm.io/@alice",
                "https://infosec.exchange/@alice",
            ]
        );
        assert_eq!(detector.profile_url("alice"), "https://mastodon.social/@alice");
    }

    #[test]
    fn found_needs_the_mention() {
        let detector = MastodonDetector::new(["example.social"]);
        let url = Url::parse("https://example.social/@alice").unwrap();
        let hit = ProbeResponse::new(url.clone(), 200, HeaderMap::new(), "<span>@Alice</span>");
        let miss = ProbeResponse::new(url, 200, HeaderMap::new(), "<span>@bob</span>");
        assert!(detector.detect_found(&hit, "alice"));
        assert!(!detector.detect_found(&miss, "alice"));
    }
}
