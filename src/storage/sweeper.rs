//! Expiry Sweeper
//!
//! Background task that periodically removes expired keys. Lazy expiry
//! already keeps reads correct; the sweep only bounds memory held by
//! keys that are never read again.

use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

use super::Store;

/// Background expiry sweep task
pub struct Sweeper {
    store: Store,
    interval: Duration,
}

impl Sweeper {
    /// Create a new sweeper
    pub fn new(store: Store, interval_secs: u64) -> Self {
        Self {
            store,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Run the sweep loop (should be spawned as a task)
    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        info!("expiry sweeper started, interval: {:?}", self.interval);

        loop {
            ticker.tick().await;
            let removed = self.store.sweep_expired();
            if removed > 0 {
                debug!(removed = removed, "swept expired keys");
            }
        }
    }

    /// Spawn the sweeper as a background task
    pub fn spawn(store: Store, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let sweeper = Self::new(store, interval_secs);
        tokio::spawn(sweeper.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_expired_keys() {
        let store = Store::new();
        for i in 0..5 {
            store.setex(&format!("tmp:{i}"), 1, "x");
        }

        let handle = Sweeper::spawn(store.clone(), 2);

        // First tick fires immediately; the one after the entries expire
        // does the reclaiming.
        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.len(), 0);
        handle.abort();
    }
}
