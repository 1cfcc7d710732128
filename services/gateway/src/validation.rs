//! Request parameter checks.

use std::sync::LazyLock;

use regex::Regex;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug regex"));

static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]+$").expect("pair regex"));

/// Letters, digits, underscores or hyphens; at least one.
pub fn is_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

/// Lowercase ASCII letters only, e.g. `btcusd`.
pub fn is_pair(value: &str) -> bool {
    PAIR_RE.is_match(value)
}
