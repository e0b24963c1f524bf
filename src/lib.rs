//! Estimate Bot - a GitHub App that asks issue authors for an estimate.
//!
//! When an issue is opened without an `Estimate: N days` annotation in its
//! description, the bot posts a comment asking the author to add one. The
//! library exposes the pieces the binary wires together: configuration, the
//! estimate detector, webhook decoding, the installation client factory and
//! the HTTP server.

pub mod config;
pub mod estimate;
pub mod github;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
