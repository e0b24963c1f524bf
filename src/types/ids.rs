//! Newtype wrappers for GitHub identifiers.
//!
//! These keep App IDs, installation IDs and issue numbers from being mixed up
//! when they travel between the webhook decoder, the client factory and the
//! comment call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The numeric identifier of a GitHub App.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u64);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AppId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(AppId)
    }
}

impl From<AppId> for octocrab::models::AppId {
    fn from(id: AppId) -> Self {
        octocrab::models::AppId(id.0)
    }
}

/// The identifier of one installation of the App on an account or organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(pub u64);

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for InstallationId {
    fn from(n: u64) -> Self {
        InstallationId(n)
    }
}

impl From<InstallationId> for octocrab::models::InstallationId {
    fn from(id: InstallationId) -> Self {
        octocrab::models::InstallationId(id.0)
    }
}

/// An issue number within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueNumber(pub u64);

impl fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for IssueNumber {
    fn from(n: u64) -> Self {
        IssueNumber(n)
    }
}

/// A repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoId {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_id_parses_decimal() {
        assert_eq!("12345".parse::<AppId>().unwrap(), AppId(12345));
        assert_eq!(" 7 ".parse::<AppId>().unwrap(), AppId(7));
    }

    #[test]
    fn app_id_rejects_non_numeric() {
        assert!("abc".parse::<AppId>().is_err());
        assert!("".parse::<AppId>().is_err());
        assert!("-1".parse::<AppId>().is_err());
        assert!("12a".parse::<AppId>().is_err());
    }

    #[test]
    fn issue_number_display_has_hash() {
        assert_eq!(IssueNumber(42).to_string(), "#42");
    }

    #[test]
    fn repo_id_display() {
        assert_eq!(RepoId::new("octocat", "hello-world").to_string(), "octocat/hello-world");
    }

    #[test]
    fn installation_id_is_transparent_in_json() {
        let id: InstallationId = serde_json::from_str("99").unwrap();
        assert_eq!(id, InstallationId(99));
        assert_eq!(serde_json::to_string(&id).unwrap(), "99");
    }

    #[test]
    fn converts_into_octocrab_ids() {
        let app: octocrab::models::AppId = AppId(1).into();
        let inst: octocrab::models::InstallationId = InstallationId(2).into();
        assert_eq!(app.0, 1);
        assert_eq!(inst.0, 2);
    }
}
