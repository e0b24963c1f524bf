//! Installation-scoped GitHub clients.
//!
//! The bot authenticates as a GitHub App: it signs a short-lived JWT with the
//! App's private key and exchanges it for an installation access token. The
//! traits here are the seam between the webhook handler and the API so the
//! handler can be driven by fakes in tests.

use std::future::Future;
use std::path::{Path, PathBuf};

use jsonwebtoken::EncodingKey;
use octocrab::Octocrab;
use thiserror::Error;
use tracing::debug;

use crate::types::{AppId, InstallationId, IssueNumber, RepoId};

use super::error::GitHubApiError;

/// The issue a comment is posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTarget {
    pub repo: RepoId,
    pub issue: IssueNumber,
}

impl std::fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.repo, self.issue)
    }
}

/// Posts comments on issues.
pub trait IssueCommenter {
    /// Creates a comment with `body` on `target`.
    fn create_comment(
        &self,
        target: &CommentTarget,
        body: &str,
    ) -> impl Future<Output = Result<(), GitHubApiError>> + Send;
}

/// Produces API clients authenticated as one installation of the App.
///
/// # Example (fake for testing)
///
/// ```ignore
/// struct AlwaysFails;
///
/// impl InstallationClientFactory for AlwaysFails {
///     type Client = NeverUsed;
///
///     async fn client_for(&self, _: InstallationId) -> Result<NeverUsed, GitHubApiError> {
///         Err(GitHubApiError::permanent_without_source("installation suspended"))
///     }
/// }
/// ```
pub trait InstallationClientFactory {
    /// The client type handed out.
    type Client: IssueCommenter + Send + Sync;

    /// Returns a client whose token is valid for `installation`.
    ///
    /// Token exchange failures are returned here rather than on first use.
    fn client_for(
        &self,
        installation: InstallationId,
    ) -> impl Future<Output = Result<Self::Client, GitHubApiError>> + Send;
}

/// Errors building the App-level client at startup.
#[derive(Debug, Error)]
pub enum AppKeyError {
    /// The private key file could not be read.
    #[error("failed to read private key {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file does not hold a PKCS#1 or PKCS#8 RSA key in PEM form.
    #[error("invalid RSA private key in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// octocrab rejected the configuration (e.g. a malformed base URL).
    #[error("failed to build GitHub App client: {0}")]
    Build(#[source] octocrab::Error),
}

/// Loads a PEM-encoded RSA private key for signing App JWTs.
pub fn load_private_key(path: &Path) -> Result<EncodingKey, AppKeyError> {
    let pem = std::fs::read(path).map_err(|source| AppKeyError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    EncodingKey::from_rsa_pem(&pem).map_err(|source| AppKeyError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Mints installation clients from the App identity.
///
/// The App-level client is built once; every [`client_for`] call performs a
/// fresh token exchange. Wrap it in [`CachedClientFactory`] to reuse tokens.
///
/// [`client_for`]: InstallationClientFactory::client_for
/// [`CachedClientFactory`]: super::CachedClientFactory
#[derive(Clone)]
pub struct AppClientFactory {
    app: Octocrab,
    app_id: AppId,
}

impl AppClientFactory {
    /// Builds the factory from the App ID and private key file.
    ///
    /// `base_url` overrides the API root for GitHub Enterprise Server.
    pub fn new(
        app_id: AppId,
        private_key_path: &Path,
        base_url: Option<&str>,
    ) -> Result<Self, AppKeyError> {
        let key = load_private_key(private_key_path)?;

        let mut builder = Octocrab::builder().app(app_id.into(), key);
        if let Some(url) = base_url {
            builder = builder.base_uri(url).map_err(AppKeyError::Build)?;
        }
        let app = builder.build().map_err(AppKeyError::Build)?;

        Ok(Self { app, app_id })
    }
}

impl std::fmt::Debug for AppClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppClientFactory")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl InstallationClientFactory for AppClientFactory {
    type Client = InstallationClient;

    async fn client_for(
        &self,
        installation: InstallationId,
    ) -> Result<InstallationClient, GitHubApiError> {
        debug!(
            app_id = %self.app_id,
            installation = %installation,
            "Exchanging App JWT for installation token"
        );

        // The returned client keeps the App credentials and refreshes the
        // installation token itself once it nears expiry.
        let (client, _token) = self
            .app
            .installation_and_token(installation.into())
            .await
            .map_err(|e| GitHubApiError::from_octocrab("installation token exchange", e))?;

        Ok(InstallationClient {
            client,
            installation,
        })
    }
}

/// An octocrab client authenticated as one installation.
#[derive(Clone)]
pub struct InstallationClient {
    client: Octocrab,
    installation: InstallationId,
}

impl InstallationClient {
    /// Returns the installation this client acts as.
    pub fn installation(&self) -> InstallationId {
        self.installation
    }
}

impl std::fmt::Debug for InstallationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationClient")
            .field("installation", &self.installation)
            .finish_non_exhaustive()
    }
}

impl IssueCommenter for InstallationClient {
    async fn create_comment(
        &self,
        target: &CommentTarget,
        body: &str,
    ) -> Result<(), GitHubApiError> {
        self.client
            .issues(target.repo.owner.as_str(), target.repo.repo.as_str())
            .create_comment(target.issue.0, body)
            .await
            .map_err(|e| GitHubApiError::from_octocrab("create issue comment", e))?;

        Ok(())
    }
}
