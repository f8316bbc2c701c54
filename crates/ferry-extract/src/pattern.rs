//! Process-wide cache of compiled field patterns.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use regex::Regex;

/// Outcome of checking a raw value against a field pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternCheck {
    /// The value matches.
    Match,
    /// The value does not match.
    Mismatch,
    /// The pattern does not compile; the message is the regex error.
    Invalid(String),
}

type Compiled = Result<Arc<Regex>, String>;

fn cache() -> &'static DashMap<String, Compiled> {
    static PATTERNS: OnceLock<DashMap<String, Compiled>> = OnceLock::new();
    PATTERNS.get_or_init(DashMap::new)
}

/// Compiles `pattern` once and returns the cached result. Compile failures
/// are cached too.
pub fn compiled(pattern: &str) -> Compiled {
    if let Some(entry) = cache().get(pattern) {
        return entry.value().clone();
    }

    let result = Regex::new(pattern)
        .map(Arc::new)
        .map_err(|e| e.to_string());
    cache()
        .entry(pattern.to_string())
        .or_insert(result)
        .value()
        .clone()
}

/// Checks `value` against `pattern`.
pub fn check(pattern: &str, value: &str) -> PatternCheck {
    match compiled(pattern) {
        Ok(re) if re.is_match(value) => PatternCheck::Match,
        Ok(_) => PatternCheck::Mismatch,
        Err(e) => PatternCheck::Invalid(e),
    }
}
