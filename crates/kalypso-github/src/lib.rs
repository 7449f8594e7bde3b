//! GitHub adapter for the Kalypso scheduler.
//!
//! Publishes aggregated repo content as pull requests against the
//! downstream GitOps repository and mirrors assignment failures as issues.
//! The REST client is a thin typed layer over the git-data endpoints (refs,
//! trees, commits, blobs) plus pulls and issues; the tree diffing itself is
//! a pure function so the commit layout is testable without a network.

pub mod client;
pub mod models;
pub mod remote;
pub mod tree;

pub use client::GitHubClient;
pub use remote::{GitHubFactory, GitHubRepo, GitRemote, GitRemoteFactory, MockGitRemote};

/// Environment variable carrying the API token. A missing token is
/// tolerated at construction; calls fail with an unauthenticated error.
pub const GITHUB_AUTH_TOKEN_ENV: &str = "GITHUB_AUTH_TOKEN";
