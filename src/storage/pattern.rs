//! Glob Pattern Compilation
//!
//! Compiles `*`-wildcard globs to anchored regexes, cached per pattern.

use hashbrown::HashMap;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;

/// Process-wide cache of compiled patterns, keyed by the literal
/// pattern string. Subscriptions and scans tend to reuse a small set of
/// patterns at high frequency.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: Mutex<HashMap<String, Arc<Regex>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or compile the anchored regex for a glob pattern.
    pub fn compile(&self, pattern: &str) -> Arc<Regex> {
        let mut cache = self.compiled.lock();
        if let Some(re) = cache.get(pattern) {
            return Arc::clone(re);
        }
        let re = Arc::new(compile_glob(pattern));
        cache.insert(pattern.to_string(), Arc::clone(&re));
        re
    }

    /// Test a candidate string against a glob pattern.
    pub fn matches(&self, pattern: &str, candidate: &str) -> bool {
        self.compile(pattern).is_match(candidate)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.compiled.lock().len()
    }
}

/// Compile a glob into an anchored regex. `*` matches any run of
/// characters; everything else is escaped, so no pattern can fail to
/// compile or backtrack pathologically.
fn compile_glob(pattern: &str) -> Regex {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for (i, segment) in pattern.split('*').enumerate() {
        if i > 0 {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(segment));
    }
    source.push('$');
    Regex::new(&source).expect("escaped glob always compiles")
}
