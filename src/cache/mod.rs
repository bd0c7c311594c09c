// Cache module.
// Keeps watched origin paths in memory and refreshes them in the background.

pub mod refresher;
pub mod store;

pub use refresher::RefresherStatus;
pub use store::{
    CacheConfig, CacheEntry, CacheStore, DEFAULT_FETCH_TIMEOUT, DEFAULT_REFRESH_INTERVAL,
};
