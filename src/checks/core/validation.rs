//! Handle syntax validation.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const MAX_HANDLE_LEN: usize = 64;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.\-]{1,64}$").expect("invalid handle regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("Username cannot be empty")]
    Empty,
    #[error("Username too long (max {MAX_HANDLE_LEN} characters)")]
    TooLong,
    #[error("Username contains invalid characters (allowed: a-z, A-Z, 0-9, _, ., -)")]
    InvalidCharacters,
}

/// Checks that `handle` is a plausible username on every supported platform.
pub fn validate_handle(handle: &str) -> Result<(), HandleError> {
    if handle.is_empty() {
        return Err(HandleError::Empty);
    }
    if handle.chars().count() > MAX_HANDLE_LEN {
        return Err(HandleError::TooLong);
    }
    if !HANDLE_RE.is_match(handle) {
        return Err(HandleError::InvalidCharacters);
    }
    Ok(())
}

pub fn is_valid_handle(handle: &str) -> bool {
    validate_handle(handle).is_ok()
}

/// Trims surrounding whitespace and a single leading `@`.
pub fn normalize_handle(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_shapes() {
        for handle in ["johndoe", "user123", "JohnDoe", "john_doe", "_username_", "john.doe-123"] {
            assert!(is_valid_handle(handle), "{handle} should be valid");
        }
    }

    #[test]
    fn rejects_empty() {
        let err = validate_handle("").unwrap_err();
        assert_eq!(err, HandleError::Empty);
        assert!(err.to_string().to_lowercase().contains("empty"));
    }

    #[test]
    fn length_boundary() {
        assert!(is_valid_handle(&"a".repeat(64)));
        let err = validate_handle(&"a".repeat(65)).unwrap_err();
        assert_eq!(err, HandleError::TooLong);
        assert!(err.to_string().contains("long"));
    }

    #[test]
    fn rejects_special_and_unicode() {
        for handle in ["john@doe", "john doe", "john!doe", "john#doe", "john$doe", "john/doe", "jöhn", "ジョン"] {
            assert_eq!(
                validate_handle(handle),
                Err(HandleError::InvalidCharacters),
                "{handle} should be rejected"
            );
        }
    }

    #[test]
    fn normalizes_leading_at() {
        assert_eq!(normalize_handle("  @alice "), "alice");
        assert_eq!(normalize_handle("bob"), "bob");
    }
}
