//! Facebook probe: Graph picture API first, then the public page.
//!
//! The page itself answers 200 for almost everything, so the Graph API is the
//! stronger signal. Handles with `.` or `-` are retried with those characters
//! stripped, since Facebook vanity names often drop them.

use async_trait::async_trait;
use serde_json::Value;

use crate::checks::core::{CheckOutcome, ProbeResponse};
use crate::checks::pipeline::{Attempt, CheckContext};

use super::Detector;
use super::evidence::Evidence;

/// Identity Facebook serves full pages to.
pub const FACEBOOK_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) Chrome/125.0.0.0";

const NOT_FOUND_INDICATORS: &[&str] = &[
    "This content isn't available right now",
    "This page isn't available",
    "Page Not Found",
    "Content Not Found",
    "The page you requested cannot be displayed",
    "Sorry, this page isn't available",
    r#""error":{"message":"Unsupported get request"#,
    r#""error":{"message":"(#803)"#,
    r#""error":{"message":"Invalid username"#,
    "profile unavailable",
    "Page not found",
];

const PAGE_STRUCTURE: &[&str] = &[
    r#"id="facebook""#,
    r#"property="og:site_name" content="Facebook""#,
    r#"name="twitter:site" content="@facebook""#,
    "<title>",
    "www.facebook.com",
];

#[derive(Debug, Clone)]
pub struct FacebookDetector {
    page_not_found: Evidence,
    page_structure: Evidence,
    page_identity: Evidence,
}

impl FacebookDetector {
    pub fn new() -> Self {
        Self {
            page_not_found: Evidence::markers_ci(NOT_FOUND_INDICATORS),
            page_structure: Evidence::markers(PAGE_STRUCTURE),
            page_identity: Evidence::any([
                Evidence::templated("facebook.com/{handle}"),
                Evidence::markers(&[r#""userID":""#, r#""pageID":""#]),
            ]),
        }
    }

    pub fn graph_url(handle: &str) -> String {
        format!("https://graph.facebook.com/{handle}/picture?type=normal&redirect=false")
    }

    /// `data.url` pointing at facebook.com plus a non-zero `data.width`.
    pub fn graph_has_picture(response: &ProbeResponse) -> bool {
        if response.status != 200 {
            return false;
        }
        let Ok(json) = serde_json::from_str::<Value>(&response.body) else {
            return false;
        };
        let Some(data) = json.get("data").and_then(Value::as_object) else {
            return false;
        };
        let url_ok = data
            .get("url")
            .and_then(Value::as_str)
            .is_some_and(|url| !url.is_empty() && url.contains("facebook.com"));
        let width_ok = data
            .get("width")
            .and_then(Value::as_f64)
            .is_some_and(|width| width != 0.0);
        url_ok && width_ok
    }

    fn page_shows_profile(&self, response: &ProbeResponse, handle: &str) -> bool {
        if response.status != 200 || self.page_not_found.matches(response, handle) {
            return false;
        }
        if !self.page_structure.matches(response, handle) {
            return false;
        }
        // Punctuated vanity names rarely echo back verbatim.
        if handle.contains(['.', '-', '_']) {
            return true;
        }
        self.page_identity.matches(response, handle)
    }

    fn variants(handle: &str) -> Vec<String> {
        let cleaned: String = handle.chars().filter(|c| !matches!(c, '.' | '-')).collect();
        if cleaned != handle && !cleaned.is_empty() {
            vec![handle.to_string(), cleaned]
        } else {
            vec![handle.to_string()]
        }
    }
}

impl Default for FacebookDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for FacebookDetector {
    fn key(&self) -> &str {
        "facebook"
    }

    fn name(&self) -> &str {
        "Facebook"
    }

    fn urls(&self, handle: &str) -> Vec<String> {
        vec![format!("https://www.facebook.com/{handle}")]
    }

    fn detect_found(&self, response: &ProbeResponse, handle: &str) -> bool {
        self.page_shows_profile(response, handle)
    }

    fn detect_not_found(&self, response: &ProbeResponse, handle: &str) -> bool {
        response.status == 404 || self.page_not_found.matches(response, handle)
    }

    fn pinned_identity(&self) -> Option<&str> {
        Some(FACEBOOK_USER_AGENT)
    }

    async fn check_override(&self, ctx: &CheckContext<'_>, handle: &str) -> Option<CheckOutcome> {
        let session = match ctx.session() {
            Ok(session) => session,
            Err(err) => {
                log::warn!("[{}] no session: {}", ctx.target(), err);
                return Some(CheckOutcome::UnknownError);
            }
        };

        let variants = Self::variants(handle);
        let probes = variants
            .iter()
            .map(|variant| (Self::graph_url(variant), variant, true))
            .chain(
                variants
                    .iter()
                    .map(|variant| (format!("https://www.facebook.com/{variant}"), variant, false)),
            );

        let mut answered = false;
        let mut last_error = None;
        for (url, variant, graph) in probes {
            ctx.wait_turn().await;
            match ctx.attempt(&session, &url).await {
                Attempt::Throttled(_) => return Some(CheckOutcome::RateLimited),
                Attempt::Failed(err) => {
                    log::debug!("[{}] {} failed: {}", ctx.target(), url, err);
                    last_error = Some(err);
                }
                Attempt::Completed(response) => {
                    answered = true;
                    let hit = if graph {
                        Self::graph_has_picture(&response)
                    } else {
                        self.page_shows_profile(&response, variant)
                    };
                    if hit {
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
