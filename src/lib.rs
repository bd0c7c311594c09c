// nfcache: an in-process cache in front of the GitHub REST API.
// Watched endpoints are refreshed in the background; everything else passes through.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod server;
pub mod view;

pub use cache::{CacheConfig, CacheEntry, CacheStore, RefresherStatus};
pub use config::Config;
pub use error::{CacheError, ErrorKind, Result};
pub use github::{ApiClient, ApiResponse, GitHubClient};
pub use view::{SortField, TieBreak, bottom_n};
