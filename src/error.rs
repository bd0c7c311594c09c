// Error types for nfcache.
// Covers transport, upstream, and decode failures from the origin API and the cache lifecycle.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("fetching {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    #[error("unreadable upstream response: {0}")]
    Upstream(String),

    #[error("authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("upstream returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("unknown sort field: {0}")]
    InvalidSortField(String),

    #[error("background refresh already started")]
    AlreadyStarted,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Coarse error category, used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Upstream,
    Decode,
    Lifecycle,
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Transport(_) | CacheError::Timeout { .. } => ErrorKind::Transport,
            CacheError::Upstream(_)
            | CacheError::Unauthorized
            | CacheError::NotFound(_)
            | CacheError::RateLimited { .. }
            | CacheError::Status { .. } => ErrorKind::Upstream,
            CacheError::Decode(_) => ErrorKind::Decode,
            CacheError::InvalidHeader(_)
            | CacheError::InvalidSortField(_)
            | CacheError::AlreadyStarted
            | CacheError::ZeroDuration(_) => ErrorKind::Lifecycle,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
