//! GitHub API error types.
//!
//! Errors are categorized as transient or permanent. The bot never retries a
//! failed call, but the category is logged so operators can tell a GitHub
//! outage or rate limit apart from a revoked installation or a bad key.

use std::fmt;
use thiserror::Error;

/// The kind of GitHub API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Likely to succeed if attempted again later.
    ///
    /// Examples:
    /// - HTTP 5xx (server errors)
    /// - HTTP 429 (rate limited)
    /// - HTTP 403 with a rate limit message
    /// - Network failures and timeouts
    Transient,

    /// Will not succeed without a change on our side or GitHub's.
    ///
    /// Examples:
    /// - HTTP 401 (bad App JWT)
    /// - HTTP 404 (installation removed, repository gone)
    /// - HTTP 403 (missing permission)
    /// - HTTP 422 (invalid comment)
    Permanent,
}

impl GitHubErrorKind {
    /// Returns true if the same call could reasonably succeed later.
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

/// A GitHub API error with its category.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    /// Transient or permanent.
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if GitHub answered at all.
    pub status_code: Option<u16>,

    /// What the bot was trying to do plus GitHub's message.
    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Categorizes an octocrab error raised while performing `operation`.
    pub fn from_octocrab(operation: &str, err: octocrab::Error) -> Self {
        let status_code = extract_status_code(&err);
        let detail = err.to_string();

        let kind = match status_code {
            Some(429) => GitHubErrorKind::Transient,
            Some(403) if is_rate_limit_error(&detail) => GitHubErrorKind::Transient,
            Some(code) if (500..600).contains(&code) => GitHubErrorKind::Transient,
            Some(_) => GitHubErrorKind::Permanent,
            None if is_network_error(&detail) => GitHubErrorKind::Transient,
            None => GitHubErrorKind::Permanent,
        };

        Self {
            kind,
            status_code,
            message: format!("{}: {}", operation, detail),
            source: Some(err),
        }
    }

    /// Creates a permanent error without an octocrab source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient error without an octocrab source.
    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }
}

/// Returns the HTTP status GitHub answered with, if the error carries one.
fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

/// Checks if an error message indicates a network-level error.
fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("timed out")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
}
