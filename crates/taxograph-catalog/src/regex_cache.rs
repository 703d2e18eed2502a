//! Memoized compilation of category query patterns.

use ahash::AHashMap;
use parking_lot::RwLock;
use regex::Regex;

/// Translate a `*` wildcard pattern into an anchored regex.
///
/// Everything except `*` is matched literally; `*` matches any run of
/// characters, including separators.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    format!("^{}$", escaped.join(".*"))
}

/// Patterns kept before older entries start being evicted.
pub const DEFAULT_PATTERN_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct RegexCache {
    compiled: RwLock<AHashMap<String, Regex>>,
    capacity: usize,
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PATTERN_CAPACITY)
    }
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` compiled patterns (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            compiled: RwLock::new(AHashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Compiled regex for a verbatim pattern.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        if let Some(re) = self.compiled.read().get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)?;
        let mut compiled = self.compiled.write();
        if !compiled.contains_key(pattern) && compiled.len() >= self.capacity {
            // Evict an arbitrary entry to stay within capacity.
            if let Some(victim) = compiled.keys().next().cloned() {
                compiled.remove(&victim);
            }
        }
        compiled
            .entry(pattern.to_string())
            .or_insert_with(|| re.clone());
        Ok(re)
    }

    /// Compiled regex for a `*` wildcard pattern. Never fails.
    pub fn wildcard(&self, pattern: &str) -> Regex {
        let key = wildcard_to_regex(pattern);
        match self.get_or_compile(&key) {
            Ok(re) => re,
            Err(err) => unreachable!("escaped wildcard `{key}` failed to compile: {err}"),
        }
    }

    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.compiled.write().clear();
    }
}
