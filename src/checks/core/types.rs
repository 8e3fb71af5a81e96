//! Core data structures shared across detectors, the throttling classifier and
//! the check pipeline.

use http::HeaderMap;
use url::Url;

/// Fully buffered HTTP response handed to detectors.
///
/// `url` is the final URL after redirects, which some detectors inspect (a
/// handle that bounces to a landing page is a negative signal).
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ProbeResponse {
    pub fn new(url: Url, status: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            url,
            status,
            headers,
            body: body.into(),
        }
    }

    /// Header value as a trimmed string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn header_lookup_is_case_insensitive_and_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static(" 0 "));
        let response = ProbeResponse::new(
            Url::parse("https://example.com/alice").unwrap(),
            200,
            headers,
            "",
        );

        assert_eq!(response.header("x-ratelimit-remaining"), Some("0"));
        assert!(response.has_header("X-RATELIMIT-REMAINING"));
        assert!(response.header("retry-after").is_none());
    }
}
