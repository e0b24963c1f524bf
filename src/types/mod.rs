//! Core identifier types shared by the webhook decoder and the GitHub client.

pub mod ids;

pub use ids::{AppId, InstallationId, IssueNumber, RepoId};
