// Route handlers.

use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::error::CacheError;
use crate::view::{SortField, bottom_n};

use super::AppState;

pub async fn healthcheck() -> &'static str {
    "Ok"
}

fn json_body(status: StatusCode, payload: Vec<u8>) -> Response {
    if payload.is_empty() {
        if status.is_success() {
            return StatusCode::NO_CONTENT.into_response();
        }
        return status.into_response();
    }
    (status, [(header::CONTENT_TYPE, "application/json")], payload).into_response()
}

/// Serve the request path from the cache, or from the origin on a miss.
/// Origin statuses and bodies are relayed as is.
pub async fn fetch_path(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path();
    match state.store.fetch(path).await {
        Ok(response) => json_body(response.status, response.body),
        Err(e) => {
            error!(path, error = %e, "Fetch failed");
            e.into_response()
        }
    }
}

/// Bottom-N view over the organization's cached repositories.
pub async fn view_bottom_repos(
    State(state): State<AppState>,
    Path((num, attribute)): Path<(String, String)>,
) -> Response {
    let Ok(num) = num.parse::<i64>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    // Invalid sort field, just 404 rather than try to proxy the request.
    let Ok(field) = attribute.parse::<SortField>() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let repos_path = state.endpoints.repos_path();
    let repos = match state.store.fetch(&repos_path).await {
        Ok(repos) if repos.status.is_success() && !repos.body.is_empty() => repos.body,
        Ok(repos) => {
            error!(path = %repos_path, status = %repos.status, "Repo data is unavailable");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(e) => {
            error!(path = %repos_path, error = %e, "Fetching repo data failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match bottom_n(&repos, field, num) {
        Ok(view) => json_body(StatusCode::OK, view),
        Err(e @ CacheError::Decode(_)) => {
            error!(error = %e, "Repo data could not be decoded");
            debug!(repos = %String::from_utf8_lossy(&repos), "Undecodable repo data");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!(error = %e, "Building bottom view failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
