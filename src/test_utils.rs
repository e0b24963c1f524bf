//! Shared test fakes for the GitHub client seam.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::github::{CommentTarget, GitHubApiError, InstallationClientFactory, IssueCommenter};
use crate::types::InstallationId;

/// A comment the fake recorded instead of posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedComment {
    pub installation: InstallationId,
    pub target: CommentTarget,
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Behaviour {
    fail_exchange: bool,
    fail_comment: bool,
    exchange_delay: Option<Duration>,
    comment_delay: Option<Duration>,
}

/// In-memory stand-in for GitHub.
///
/// Clones share the same recorders, so a test can keep one handle and give
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct FakeGitHub {
    behaviour: Behaviour,
    exchanges: Arc<AtomicUsize>,
    comments: Arc<Mutex<Vec<RecordedComment>>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every token exchange fails with a permanent error.
    pub fn failing_exchange(mut self) -> Self {
        self.behaviour.fail_exchange = true;
        self
    }

    /// Every comment call fails with a transient error.
    pub fn failing_comments(mut self) -> Self {
        self.behaviour.fail_comment = true;
        self
    }

    pub fn with_exchange_delay(mut self, delay: Duration) -> Self {
        self.behaviour.exchange_delay = Some(delay);
        self
    }

    pub fn with_comment_delay(mut self, delay: Duration) -> Self {
        self.behaviour.comment_delay = Some(delay);
        self
    }

    /// Number of token exchanges attempted.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Comments successfully "posted".
    pub fn comments(&self) -> Vec<RecordedComment> {
        self.comments.lock().unwrap().clone()
    }
}

impl InstallationClientFactory for FakeGitHub {
    type Client = FakeClient;

    async fn client_for(&self, installation: InstallationId) -> Result<FakeClient, GitHubApiError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.behaviour.exchange_delay {
            tokio::time::sleep(delay).await;
        }
        if self.behaviour.fail_exchange {
            return Err(GitHubApiError::permanent_without_source(
                "installation token exchange: installation suspended",
            ));
        }

        Ok(FakeClient {
            installation,
            behaviour: self.behaviour,
            comments: Arc::clone(&self.comments),
        })
    }
}

/// Client handed out by [`FakeGitHub`].
#[derive(Debug, Clone)]
pub struct FakeClient {
    installation: InstallationId,
    behaviour: Behaviour,
    comments: Arc<Mutex<Vec<RecordedComment>>>,
}

impl FakeClient {
    pub fn installation(&self) -> InstallationId {
        self.installation
    }
}

impl IssueCommenter for FakeClient {
    async fn create_comment(&self, target: &CommentTarget, body: &str) -> Result<(), GitHubApiError> {
        if let Some(delay) = self.behaviour.comment_delay {
            tokio::time::sleep(delay).await;
        }
        if self.behaviour.fail_comment {
            return Err(GitHubApiError::transient_without_source(
                "create issue comment: 502 Bad Gateway",
            ));
        }

        self.comments.lock().unwrap().push(RecordedComment {
            installation: self.installation,
            target: target.clone(),
            body: body.to_string(),
        });
        Ok(())
    }
}
