//! GitHub API access as a GitHub App.
//!
//! Key features:
//! - App JWT signing and installation token exchange via octocrab
//! - Trait seam between the webhook handler and the API, for fakes in tests
//! - Per-installation client cache with expiry-aware refresh
//! - Transient vs permanent error categorization for logs

mod cache;
mod client;
mod error;

pub use cache::{CachedClientFactory, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use client::{
    AppClientFactory, AppKeyError, CommentTarget, InstallationClient, InstallationClientFactory,
    IssueCommenter, load_private_key,
};
pub use error::{GitHubApiError, GitHubErrorKind};
