//! Detection of `Estimate: N days` annotations in issue text.
//!
//! The grammar is fixed: the word `Estimate` (any case), a colon, optional
//! whitespace, one or more ASCII digits, optional whitespace, and the word
//! `days`. Both ends must sit on word boundaries. Zero is a valid estimate;
//! the singular `day` is not accepted.

use std::sync::LazyLock;

use regex::Regex;

/// Compiled once on first use and shared read-only afterwards.
static ESTIMATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bEstimate:\s*[0-9]+\s*days\b").expect("estimate pattern is valid")
});

/// Returns `true` if `text` already carries an estimate annotation.
///
/// # Examples
///
/// ```
/// use estimate_bot::estimate::has_estimate;
///
/// assert!(has_estimate("Estimate: 2 days"));
/// assert!(has_estimate("Estimate:2days"));
/// assert!(has_estimate("estimate: 5 days"));
/// assert!(!has_estimate("Estimate: some days"));
/// assert!(!has_estimate("No estimate here"));
/// ```
pub fn has_estimate(text: &str) -> bool {
    ESTIMATE_RE.is_match(text)
}
