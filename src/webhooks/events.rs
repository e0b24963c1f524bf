//! Typed GitHub webhook events.
//!
//! Only `issues` deliveries are decoded into a structured form. Every other
//! event type is kept as [`WebhookEvent::Other`] so the handler can
//! acknowledge it without acting on it.

use serde::{Deserialize, Serialize};

use crate::types::{InstallationId, IssueNumber, RepoId};

/// A decoded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    /// An `issues` event.
    Issues(IssuesEvent),

    /// Any event type the bot does not act on (`ping`, `pull_request`, ...).
    Other { event_type: String },
}

impl WebhookEvent {
    /// Returns the `X-GitHub-Event` name this event was decoded from.
    pub fn event_type(&self) -> &str {
        match self {
            WebhookEvent::Issues(_) => "issues",
            WebhookEvent::Other { event_type } => event_type,
        }
    }

    /// Returns the opened-issue view if this event is one the bot acts on.
    pub fn as_opened_issue(&self) -> Option<OpenedIssue> {
        match self {
            WebhookEvent::Issues(e) => e.as_opened(),
            WebhookEvent::Other { .. } => None,
        }
    }
}

/// Action performed on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueAction {
    /// Issue was opened.
    Opened,
    /// Any other action (`closed`, `edited`, `labeled`, ...).
    Other(String),
}

impl IssueAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "opened" => IssueAction::Opened,
            other => IssueAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IssueAction::Opened => "opened",
            IssueAction::Other(s) => s,
        }
    }
}

/// The issue fields the bot reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    /// The issue number.
    pub number: IssueNumber,

    /// The issue description. Empty when GitHub sends `null`.
    pub body: String,

    /// Login of the user who opened the issue.
    pub author_login: String,
}

/// An `issues` event.
///
/// Repository, issue and installation are optional because GitHub omits them
/// on some deliveries (installation is absent for plain repository webhooks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuesEvent {
    pub action: IssueAction,
    pub repo: Option<RepoId>,
    pub issue: Option<IssueDetails>,
    pub installation: Option<InstallationId>,
}

impl IssuesEvent {
    /// Returns a fully populated view when the action is `opened` and every
    /// field needed to post a comment is present.
    pub fn as_opened(&self) -> Option<OpenedIssue> {
        if self.action != IssueAction::Opened {
            return None;
        }

        Some(OpenedIssue {
            repo: self.repo.clone()?,
            issue: self.issue.clone()?,
            installation: self.installation?,
        })
    }
}

/// A newly opened issue with everything required to reply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedIssue {
    pub repo: RepoId,
    pub issue: IssueDetails,
    pub installation: InstallationId,
}
