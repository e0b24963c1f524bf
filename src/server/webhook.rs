//! Webhook endpoint handler.
//!
//! Each delivery runs through a fixed pipeline: verify the signature, decode
//! the event, filter for newly opened issues, check for an estimate, obtain an
//! installation client, and post a reminder comment.
//!
//! Only the first two steps influence the status code. Once a delivery is
//! authenticated and understood, GitHub always gets 200 so it does not
//! redeliver; failures after that point are only logged.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::estimate::has_estimate;
use crate::github::{CommentTarget, GitHubApiError, InstallationClientFactory, IssueCommenter};
use crate::webhooks::{
    IssueAction, ParseError, SignatureError, WebhookEvent, parse_webhook, verify_signature,
};

/// Header name for GitHub event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
pub const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Upper bound on obtaining an installation client, including any wait on
/// another request's token exchange.
pub const CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the outbound comment call.
pub const COMMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that reject a delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No `X-Hub-Signature-256` header.
    #[error("missing signature header")]
    MissingSignature,

    /// The signature does not match the body.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// No `X-GitHub-Event` header on an authenticated delivery.
    #[error("missing event type header")]
    MissingEventType,

    /// The body could not be decoded.
    #[error("bad payload: {0}")]
    Parse(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature(_) => {
                (StatusCode::UNAUTHORIZED, "invalid signature")
            }
            WebhookError::MissingEventType => (StatusCode::BAD_REQUEST, "missing event type"),
            WebhookError::Parse(_) => (StatusCode::BAD_REQUEST, "bad payload"),
        };

        (status, message).into_response()
    }
}

/// Why a delivery was acknowledged without action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not an `issues` event.
    UnsupportedEvent,
    /// An `issues` event whose action is not `opened`.
    NotOpened,
    /// Issue, repository or installation absent from the payload.
    MissingFields,
}

/// What happened to an authenticated, decoded delivery.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to do for this event.
    Ignored(IgnoreReason),

    /// The issue already carries an estimate.
    AlreadyEstimated(CommentTarget),

    /// The reminder was posted.
    Commented(CommentTarget),

    /// No installation client could be obtained.
    CredentialFailed {
        target: CommentTarget,
        error: GitHubApiError,
    },

    /// No installation client within [`CREDENTIAL_TIMEOUT`].
    CredentialTimedOut(CommentTarget),

    /// GitHub rejected the comment.
    CommentFailed {
        target: CommentTarget,
        error: GitHubApiError,
    },

    /// The comment call did not finish within [`COMMENT_TIMEOUT`].
    CommentTimedOut(CommentTarget),
}

impl Outcome {
    fn log(&self, delivery: &str, event_type: &str) {
        match self {
            Outcome::Ignored(reason) => {
                debug!(delivery, event_type, reason = ?reason, "Ignoring webhook");
            }
            Outcome::AlreadyEstimated(target) => {
                debug!(delivery, issue = %target, "Issue already has an estimate");
            }
            Outcome::Commented(target) => {
                info!(delivery, issue = %target, "Asked for an estimate");
            }
            Outcome::CredentialFailed { target, error } => {
                error!(
                    delivery,
                    issue = %target,
                    error = %error,
                    retriable = error.kind.is_retriable(),
                    "Failed to create client for installation"
                );
            }
            Outcome::CredentialTimedOut(target) => {
                error!(
                    delivery,
                    issue = %target,
                    timeout_secs = CREDENTIAL_TIMEOUT.as_secs(),
                    "Timed out creating client for installation"
                );
            }
            Outcome::CommentFailed { target, error } => {
                error!(
                    delivery,
                    issue = %target,
                    error = %error,
                    retriable = error.kind.is_retriable(),
                    "Failed to create comment"
                );
            }
            Outcome::CommentTimedOut(target) => {
                error!(
                    delivery,
                    issue = %target,
                    timeout_secs = COMMENT_TIMEOUT.as_secs(),
                    "Timed out creating comment"
                );
            }
        }
    }
}

/// Builds the reminder posted on issues without an estimate.
pub fn estimate_request_comment(author_login: &str) -> String {
    format!(
        "Thanks for opening this issue, @{}!\n\n\
         To help with planning, please add an estimate in the form **Estimate: X days** \
         to the issue description (e.g., **Estimate: 2 days**).",
        author_login
    )
}

/// Applies the business rule to a decoded event.
///
/// Never fails: every problem after decoding is reported as an [`Outcome`].
pub async fn process_event<F>(event: &WebhookEvent, factory: &F) -> Outcome
where
    F: InstallationClientFactory + Sync,
{
    let issues = match event {
        WebhookEvent::Issues(e) => e,
        WebhookEvent::Other { .. } => return Outcome::Ignored(IgnoreReason::UnsupportedEvent),
    };
    let Some(opened) = issues.as_opened() else {
        return Outcome::Ignored(match issues.action {
            IssueAction::Opened => IgnoreReason::MissingFields,
            IssueAction::Other(_) => IgnoreReason::NotOpened,
        });
    };

    let target = CommentTarget {
        repo: opened.repo,
        issue: opened.issue.number,
    };

    if has_estimate(&opened.issue.body) {
        return Outcome::AlreadyEstimated(target);
    }

    let client = match tokio::time::timeout(
        CREDENTIAL_TIMEOUT,
        factory.client_for(opened.installation),
    )
    .await
    {
        Ok(Ok(client)) => client,
        Ok(Err(error)) => return Outcome::CredentialFailed { target, error },
        Err(_) => return Outcome::CredentialTimedOut(target),
    };

    let body = estimate_request_comment(&opened.issue.author_login);

    // If the inbound connection goes away, axum drops this future and the
    // outbound call with it; the timeout bounds it otherwise.
    match tokio::time::timeout(COMMENT_TIMEOUT, client.create_comment(&target, &body)).await {
        Ok(Ok(())) => Outcome::Commented(target),
        Ok(Err(error)) => Outcome::CommentFailed { target, error },
        Err(_) => Outcome::CommentTimedOut(target),
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the payload
///   - `X-GitHub-Event`: Event type (e.g., "issues")
/// - Optional headers:
///   - `X-GitHub-Delivery`: Delivery ID, used in logs
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 200 OK: Processed, or intentionally skipped
/// - 400 Bad Request: Missing event type or undecodable payload
/// - 401 Unauthorized: Missing or invalid signature
pub async fn webhook_handler<F>(
    State(app_state): State<AppState<F>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError>
where
    F: InstallationClientFactory + Send + Sync + 'static,
{
    let delivery = get_header(&headers, HEADER_DELIVERY).unwrap_or("-");

    // Verify before touching the payload in any other way.
    let signature = get_header(&headers, HEADER_SIGNATURE).ok_or_else(|| {
        warn!(delivery, "Webhook without signature header");
        WebhookError::MissingSignature
    })?;
    verify_signature(&body, signature, app_state.webhook_secret()).map_err(|e| {
        warn!(delivery, reason = %e, "Invalid webhook signature");
        WebhookError::InvalidSignature(e)
    })?;

    let event_type = get_header(&headers, HEADER_EVENT).ok_or_else(|| {
        warn!(delivery, "Webhook without event type header");
        WebhookError::MissingEventType
    })?;
    let event = parse_webhook(event_type, &body).map_err(|e| {
        warn!(delivery, event_type, error = %e, "Failed to parse webhook");
        WebhookError::Parse(e)
    })?;

    let action = match &event {
        WebhookEvent::Issues(e) => e.action.as_str(),
        WebhookEvent::Other { .. } => "-",
    };
    debug!(delivery, event_type = event.event_type(), action, "Received webhook");

    let outcome = process_event(&event, app_state.factory()).await;
    outcome.log(delivery, event.event_type());

    Ok(StatusCode::OK)
}

/// Returns a header value if present and valid UTF-8.
fn get_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
