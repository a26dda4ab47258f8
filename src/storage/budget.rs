//! Atomic Budget Reservation
//!
//! The store's single scripted primitive: check the accumulated total
//! against a ceiling and commit the addition only when it fits.

use std::time::Duration;
use tokio::time::Instant;

use super::store::{Entry, Store};

impl Store {
    /// Reserve `amount` against the running total at `key`, subject to
    /// `ceiling`. Returns `true` and commits `current + amount` when the
    /// sum fits; returns `false` and leaves the state untouched when it
    /// does not. A TTL, when given, is applied on commit; otherwise an
    /// existing expiry is preserved.
    ///
    /// The whole check-then-add runs under one write-lock acquisition,
    /// so it is atomic with respect to every other store operation.
    /// Rejection carries no reason: a total that fails to parse as an
    /// integer rejects the same way a ceiling breach does.
    pub fn try_reserve(
        &self,
        key: &str,
        amount: i64,
        ceiling: i64,
        ttl_secs: Option<u64>,
    ) -> bool {
        let mut map = self.inner.write();

        let existing = match map.get(key).cloned() {
            Some(entry) if entry.is_expired() => {
                map.remove(key);
                None
            }
            other => other,
        };

        let (current, prior_expiry) = match &existing {
            Some(entry) => match entry.value.parse::<i64>() {
                Ok(total) => (total, entry.expires_at),
                Err(_) => return false,
            },
            None => (0, None),
        };

        if current + amount > ceiling {
            return false;
        }

        let expires_at = ttl_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs))
            .or(prior_expiry);
        map.insert(
            key.to_string(),
            Entry {
                value: (current + amount).to_string(),
                expires_at,
            },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reserve_within_ceiling() {
        let store = Store::new();

        assert!(store.try_reserve("budget:sms:tenant-1", 5, 10, None));
        assert_eq!(store.get("budget:sms:tenant-1"), Some("5".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_leaves_total_untouched() {
        let store = Store::new();

        assert!(store.try_reserve("budget:k", 5, 10, None));
        assert!(!store.try_reserve("budget:k", 6, 10, None));
        assert_eq!(store.get("budget:k"), Some("5".to_string()));

        // Exact fit still commits.
        assert!(store.try_reserve("budget:k", 5, 10, None));
        assert_eq!(store.get("budget:k"), Some("10".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_applies_ttl_on_commit() {
        let store = Store::new();

        assert!(store.try_reserve("budget:window", 1, 100, Some(60)));
        assert_eq!(store.ttl("budget:window"), 60);

        // Rejection must not refresh the window.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!store.try_reserve("budget:window", 1000, 100, Some(60)));
        assert_eq!(store.ttl("budget:window"), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_total_restarts_from_zero() {
        let store = Store::new();

        assert!(store.try_reserve("budget:w", 90, 100, Some(30)));
        assert!(!store.try_reserve("budget:w", 20, 100, None));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.try_reserve("budget:w", 20, 100, None));
        assert_eq!(store.get("budget:w"), Some("20".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_total_rejects() {
        let store = Store::new();

        store.set("budget:bad", "not-a-number", None);
        assert!(!store.try_reserve("budget:bad", 1, 10, None));
        assert_eq!(store.get("budget:bad"), Some("not-a-number".to_string()));
    }
}
