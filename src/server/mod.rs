// HTTP layer.
// Serves cached endpoints, proxies everything else, and exposes derived views.

pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::CacheStore;
use crate::error::CacheError;

/// Origin paths served from the cache for one GitHub organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    org: String,
}

impl Endpoints {
    pub fn new(org: impl Into<String>) -> Self {
        Self { org: org.into() }
    }

    pub fn org_path(&self) -> String {
        format!("/orgs/{}", self.org)
    }

    pub fn members_path(&self) -> String {
        format!("{}/members", self.org_path())
    }

    pub fn repos_path(&self) -> String {
        format!("{}/repos", self.org_path())
    }

    /// Paths watched from startup.
    pub fn cached_paths(&self) -> Vec<String> {
        vec![
            "/".to_string(),
            self.org_path(),
            self.members_path(),
            self.repos_path(),
        ]
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: CacheStore,
    pub endpoints: Arc<Endpoints>,
}

impl AppState {
    pub fn new(store: CacheStore, endpoints: Endpoints) -> Self {
        Self {
            store,
            endpoints: Arc::new(endpoints),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        // e.g. /view/bottom/10/forks
        .route("/view/bottom/:num/:attribute", get(handlers::view_bottom_repos));

    for path in state.endpoints.cached_paths() {
        router = router.route(&path, get(handlers::fetch_path));
    }

    // Unknown paths are proxied to the origin rather than 404ed.
    router.fallback(handlers::fetch_path).with_state(state)
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Transport(_)
            | CacheError::Timeout { .. }
            | CacheError::Upstream(_)
            | CacheError::Unauthorized
            | CacheError::RateLimited { .. }
            | CacheError::Status { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
