//! GitHub webhook payload parser.
//!
//! # Parsing Strategy
//!
//! 1. The event type comes from the `X-GitHub-Event` header
//! 2. The body must be a JSON object, whatever the event type
//! 3. `issues` bodies are decoded into [`IssuesEvent`]; fields GitHub may
//!    omit stay optional, but a field that is present with the wrong shape is
//!    an error
//! 4. Any other event type becomes [`WebhookEvent::Other`]

use serde::Deserialize;
use thiserror::Error;

use crate::types::{InstallationId, IssueNumber, RepoId};

use super::events::{IssueAction, IssueDetails, IssuesEvent, WebhookEvent};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes wrongly-typed fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is valid JSON but not an object.
    #[error("webhook payload must be a JSON object")]
    NotAnObject,
}

/// Parses a webhook payload into a typed event.
///
/// # Examples
///
/// ```
/// use estimate_bot::webhooks::{WebhookEvent, parse_webhook};
///
/// let payload = br#"{
///     "action": "opened",
///     "issue": { "number": 1, "body": "hi", "user": { "login": "mona" } },
///     "repository": { "name": "hello-world", "owner": { "login": "octocat" } },
///     "installation": { "id": 42 }
/// }"#;
///
/// let event = parse_webhook("issues", payload).unwrap();
/// assert!(event.as_opened_issue().is_some());
///
/// let ping = parse_webhook("ping", br#"{"zen": "Keep it logically awesome."}"#).unwrap();
/// assert!(matches!(ping, WebhookEvent::Other { .. }));
///
/// assert!(parse_webhook("ping", b"not json").is_err());
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<WebhookEvent, ParseError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }

    match event_type {
        "issues" => parse_issues(value).map(WebhookEvent::Issues),
        other => Ok(WebhookEvent::Other {
            event_type: other.to_string(),
        }),
    }
}

// ============================================================================
// Raw payload structures
//
// These mirror GitHub's JSON. Unknown fields are ignored.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    issue: Option<RawIssue>,
    repository: Option<RawRepository>,
    installation: Option<RawInstallation>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    body: Option<String>,
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawUser,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
}

fn parse_issues(value: serde_json::Value) -> Result<IssuesEvent, ParseError> {
    let raw: RawIssuesPayload = serde_json::from_value(value)?;

    Ok(IssuesEvent {
        action: IssueAction::parse(&raw.action),
        repo: raw
            .repository
            .map(|r| RepoId::new(r.owner.login, r.name)),
        issue: raw.issue.map(|i| IssueDetails {
            number: IssueNumber(i.number),
            body: i.body.unwrap_or_default(),
            author_login: i.user.login,
        }),
        installation: raw.installation.map(|i| InstallationId(i.id)),
    })
}
