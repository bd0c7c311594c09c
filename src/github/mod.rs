// GitHub API module.
// Origin client, pagination helpers, and the repository record.

pub mod client;
pub mod pagination;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::{ApiClient, DEFAULT_TIMEOUT, GITHUB_API_BASE, GitHubClient};
pub use types::{ApiResponse, Repo};
