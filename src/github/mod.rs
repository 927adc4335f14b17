//! GitHub REST client
//!
//! Fetches the user's open pull requests with their recent comments and
//! reviews, and probes which scopes the token can read along the way.

pub mod client;
pub mod types;

pub use client::{GitHubClient, SnapshotSource};
pub use types::{Comment, FetchedSnapshot, PullRequestSnapshot, Review};
