//! Classification of throttling responses.
//!
//! A response counts as rate limited when any of these hold:
//! - status 429
//! - a `Retry-After` header is present
//! - `x-ratelimit-remaining` / `x-rate-limit-remaining` parses to 0
//! - the body contains a canonical throttling phrase (case-insensitive)

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::RETRY_AFTER;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::types::ProbeResponse;

const REMAINING_HEADERS: [&str; 2] = ["x-ratelimit-remaining", "x-rate-limit-remaining"];

static THROTTLE_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"rate limit exceeded|too many requests|429 too many requests")
        .case_insensitive(true)
        .build()
        .expect("invalid throttle phrase regex")
});

/// Why a response was classified as throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleSignal {
    Status429,
    RetryAfter,
    RemainingExhausted,
    BodyPhrase,
}

impl ThrottleSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ThrottleSignal::Status429 => "status_429",
            ThrottleSignal::RetryAfter => "retry_after",
            ThrottleSignal::RemainingExhausted => "remaining_exhausted",
            ThrottleSignal::BodyPhrase => "body_phrase",
        }
    }
}

/// Returns the first throttling signal found, checked in the order above.
pub fn throttle_signal(response: &ProbeResponse) -> Option<ThrottleSignal> {
    if response.status == 429 {
        return Some(ThrottleSignal::Status429);
    }

    if response.has_header(RETRY_AFTER.as_str()) {
        return Some(ThrottleSignal::RetryAfter);
    }

    let exhausted = REMAINING_HEADERS.iter().any(|name| {
        response
            .header(name)
            .and_then(|raw| raw.parse::<i64>().ok())
            .is_some_and(|remaining| remaining == 0)
    });
    if exhausted {
        return Some(ThrottleSignal::RemainingExhausted);
    }

    if THROTTLE_PHRASE_RE.is_match(&response.body) {
        return Some(ThrottleSignal::BodyPhrase);
    }

    None
}

pub fn is_rate_limited(response: &ProbeResponse) -> bool {
    throttle_signal(response).is_some()
}

/// Server-suggested wait from `Retry-After` (delta-seconds or HTTP date).
///
/// Informational only; the limiter applies its own fixed penalty window.
pub fn retry_after_hint(response: &ProbeResponse) -> Option<Duration> {
    let raw = response.header(RETRY_AFTER.as_str())?;
    if let Ok(seconds) = raw.parse::<f64>()
        && seconds.is_finite()
        && seconds >= 0.0
    {
        return Some(Duration::from_secs_f64(seconds));
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(raw).or_else(|_| DateTime::parse_from_rfc3339(raw))
        && let Ok(duration) = (date.with_timezone(&Utc) - Utc::now()).to_std()
    {
        return Some(duration);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue};
    use url::Url;

    fn response(status: u16, body: &str) -> ProbeResponse {
        ProbeResponse::new(
            Url::parse("https://example.com/alice").unwrap(),
            status,
            HeaderMap::new(),
            body,
        )
    }

    #[test]
    fn plain_ok_is_not_throttled() {
        assert!(!is_rate_limited(&response(200, "<html>profile</html>")));
    }

    #[test]
    fn status_429_wins_first() {
        let resp = response(429, "Too Many Requests");
        assert_eq!(throttle_signal(&resp), Some(ThrottleSignal::Status429));
    }

    #[test]
    fn retry_after_header_alone_is_enough() {
        let mut resp = response(200, "");
        resp.headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(throttle_signal(&resp), Some(ThrottleSignal::RetryAfter));
        assert_eq!(retry_after_hint(&resp), Some(Duration::from_secs(120)));
    }

    #[test]
    fn remaining_zero_is_throttled_but_non_numeric_is_ignored() {
        let mut exhausted = response(200, "");
        exhausted
            .headers
            .insert("x-rate-limit-remaining", HeaderValue::from_static("0"));
        assert!(is_rate_limited(&exhausted));

        let mut remaining = response(200, "");
        remaining
            .headers
            .insert("x-ratelimit-remaining", HeaderValue::from_static("12"));
        assert!(!is_rate_limited(&remaining));

        let mut garbage = response(200, "");
        garbage
            .headers
            .insert("x-ratelimit-remaining", HeaderValue::from_static("soon"));
        assert!(!is_rate_limited(&garbage));
    }

    #[test]
    fn body_phrase_is_case_insensitive() {
        let resp = response(200, "<h1>Rate Limit EXCEEDED</h1>");
        assert_eq!(throttle_signal(&resp), Some(ThrottleSignal::BodyPhrase));
    }
}
