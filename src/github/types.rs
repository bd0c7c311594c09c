// GitHub API response types.
// Single-page fetch results and the repository fields the views sort and display.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Status and body of a single-page fetch. Cache hits report `200 OK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Vec<u8>) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

/// Subset of a GitHub repository object.
///
/// Everything else in the upstream payload is dropped during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    #[serde(default)]
    pub full_name: String,
    /// ISO-8601 timestamp, compared lexically.
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
}
