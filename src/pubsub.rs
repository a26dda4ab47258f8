//! Publish/Subscribe Bus
//!
//! Exact-channel and glob-pattern subscriptions with synchronous,
//! in-process delivery. Best-effort only: a subscriber registered after
//! `publish` returns never sees that message.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

use crate::storage::PatternCache;

/// Subscription callback, invoked with (channel, message)
pub type Handler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// In-process publish/subscribe bus
#[derive(Clone)]
pub struct PubSub {
    channels: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
    patterns: Arc<RwLock<Vec<(String, Vec<Handler>)>>>,
    matcher: Arc<PatternCache>,
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub {
    /// Create a new bus with its own pattern cache
    pub fn new() -> Self {
        Self::with_pattern_cache(Arc::new(PatternCache::new()))
    }

    /// Create a bus sharing a pattern cache with other components
    pub fn with_pattern_cache(matcher: Arc<PatternCache>) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            patterns: Arc::new(RwLock::new(Vec::new())),
            matcher,
        }
    }

    /// Register a handler under an exact channel name
    pub fn subscribe<F>(&self, channel: &str, handler: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.channels
            .write()
            .entry(channel.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Register a handler under a glob pattern
    pub fn psubscribe<F>(&self, pattern: &str, handler: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        // Compile eagerly so a hot publish path only does cache hits.
        self.matcher.compile(pattern);
        let mut patterns = self.patterns.write();
        match patterns.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, handlers)) => handlers.push(Arc::new(handler)),
            None => patterns.push((pattern.to_string(), vec![Arc::new(handler)])),
        }
    }

    /// Remove all handlers for a channel, or every channel registration
    pub fn unsubscribe(&self, channel: Option<&str>) {
        let mut channels = self.channels.write();
        match channel {
            Some(name) => {
                channels.remove(name);
            }
            None => channels.clear(),
        }
    }

    /// Remove all handlers for a pattern, or every pattern registration
    pub fn punsubscribe(&self, pattern: Option<&str>) {
        let mut patterns = self.patterns.write();
        match pattern {
            Some(glob) => patterns.retain(|(p, _)| p != glob),
            None => patterns.clear(),
        }
    }

    /// Deliver a message to every matching handler, returning the count
    /// invoked. Delivery is synchronous: all matching handlers have run
    /// by the time this returns.
    pub fn publish(&self, channel: &str, message: &str) -> usize {
        // Handlers are cloned out before invocation so one of them may
        // itself subscribe or unsubscribe without deadlocking.
        let mut matched: Vec<Handler> = Vec::new();
        {
            let channels = self.channels.read();
            if let Some(handlers) = channels.get(channel) {
                matched.extend(handlers.iter().cloned());
            }
        }
        {
            let patterns = self.patterns.read();
            for (pattern, handlers) in patterns.iter() {
                if self.matcher.matches(pattern, channel) {
                    matched.extend(handlers.iter().cloned());
                }
            }
        }

        for handler in &matched {
            handler(channel, message);
        }
        trace!(channel = channel, delivered = matched.len(), "published");
        matched.len()
    }

    /// Total number of registered handlers (diagnostics)
    pub fn subscription_count(&self) -> usize {
        let exact: usize = self.channels.read().values().map(Vec::len).sum();
        let pattern: usize = self.patterns.read().iter().map(|(_, h)| h.len()).sum();
        exact + pattern
    }
}
