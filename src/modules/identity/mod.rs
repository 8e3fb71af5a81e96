//! Rotating client identities.
//!
//! Each new session takes the next identity from a fixed, ordered pool, so
//! targets created one after another get a round-robin spread of browser/OS
//! combinations instead of a random (possibly repeated) one.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Desktop browser/OS combinations, in rotation order.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36 Edg/121.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
];

/// Ordered identity pool with a shared, monotonically increasing cursor.
///
/// Clones share the cursor, so every session manager built from the same pool
/// continues one rotation.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    identities: Arc<[String]>,
    cursor: Arc<AtomicUsize>,
}

impl IdentityPool {
    /// Builds a pool from explicit identities. An empty list falls back to
    /// [`DEFAULT_USER_AGENTS`].
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = identities.into_iter().map(Into::into).collect();
        if list.is_empty() {
            list = DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect();
        }
        Self {
            identities: list.into(),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns `pool[counter mod len]` and advances the counter.
    pub fn next_identity(&self) -> String {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.identities[index % self.identities.len()].clone()
    }

    /// Number of identities handed out so far.
    pub fn issued(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn identities(&self) -> &[String] {
        &self.identities
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENTS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_round_robin() {
        let pool = IdentityPool::new(["a", "b", "c"]);
        let issued: Vec<_> = (0..7).map(|_| pool.next_identity()).collect();
        assert_eq!(issued, ["a", "b", "c", "a", "b", "c", "a"]);
        assert_eq!(pool.issued(), 7);
    }

    #[test]
    fn clones_share_the_cursor() {
        let pool = IdentityPool::new(["a", "b"]);
        let other = pool.clone();
        assert_eq!(pool.next_identity(), "a");
        assert_eq!(other.next_identity(), "b");
    }

    #[test]
    fn empty_input_uses_defaults() {
        let pool = IdentityPool::new(Vec::<String>::new());
        assert_eq!(pool.len(), DEFAULT_USER_AGENTS.len());
        assert!(!pool.is_empty());
    }
}
