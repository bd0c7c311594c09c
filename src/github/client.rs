// GitHub API HTTP client.
// Single-page fetches and pagination-following fetches against the origin API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

use super::pagination::{MAX_PAGE_FOLLOW, PER_PAGE, has_next_page, page_url};
use super::types::ApiResponse;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Client-level timeout for every request, including ad hoc cache misses.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// GitHub rejects requests without a user agent.
const CLIENT_USER_AGENT: &str = "nfcache/0.1";

/// Origin API operations the cache depends on. Implementations must be usable
/// from many tasks at once.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// One GET, returning the upstream status and raw body whatever the status.
    async fn fetch(&self, path: &str) -> Result<ApiResponse>;

    /// GET that follows pagination for list responses and returns a single
    /// JSON array. Object responses are returned unchanged. Non-success
    /// statuses are errors, so an error body is never cached.
    async fn fetch_all(&self, path: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
}

impl GitHubClient {
    /// Client for api.github.com. Without a token requests are unauthenticated
    /// and subject to the lower anonymous rate limit.
    pub fn new(token: Option<&str>) -> Result<Self> {
        Self::with_base_url(GITHUB_API_BASE, token, DEFAULT_TIMEOUT)
    }

    /// Client for an arbitrary origin, e.g. a GitHub Enterprise host.
    pub fn with_base_url(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("token {}", token))
                    .map_err(|e| CacheError::InvalidHeader(e.to_string()))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        let full = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&full).map_err(|e| CacheError::Upstream(format!("invalid url {}: {}", full, e)))
    }

    /// Make a GET request and reject non-success statuses.
    async fn get(&self, url: Url) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        check_response(response)
    }

    /// Fetch one page of a list endpoint. Returns the decoded items and
    /// whether another page is declared.
    async fn fetch_page(&self, url: &Url, page: u32) -> Result<(Vec<Map<String, Value>>, bool)> {
        let response = self.get(page_url(url, PER_PAGE, page)).await?;
        let has_next = has_next_page(response.headers());
        let body = read_body(response).await?;
        let items = serde_json::from_slice(&body)?;
        Ok((items, has_next))
    }
}

#[async_trait]
impl ApiClient for GitHubClient {
    async fn fetch(&self, path: &str) -> Result<ApiResponse> {
        let response = self.client.get(self.url(path)?).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(path, %status, "Passing through non-success response");
        }
        Ok(ApiResponse::new(status, read_body(response).await?))
    }

    async fn fetch_all(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path)?;
        let mut page = 1;

        let response = self.get(page_url(&url, PER_PAGE, page)).await?;
        let mut has_next = has_next_page(response.headers());
        let body = read_body(response).await?;

        // Pagination only applies to collections, single resources are returned verbatim.
        match body.iter().copied().find(|b| !b.is_ascii_whitespace()) {
            None | Some(b'{') => return Ok(body),
            Some(_) => {}
        }

        let mut accumulated: Vec<Map<String, Value>> = serde_json::from_slice(&body)?;

        while has_next && page < MAX_PAGE_FOLLOW {
            page += 1;
            match self.fetch_page(&url, page).await {
                Ok((items, next)) => {
                    accumulated.extend(items);
                    has_next = next;
                }
                Err(e) => {
                    // Partial results beat no results; the previous snapshot is still served.
                    warn!(path, page, error = %e, "Pagination stopped early, returning partial results");
                    break;
                }
            }
        }

        if has_next && page >= MAX_PAGE_FOLLOW {
            warn!(path, pages = page, "Page limit reached with more pages declared");
        }
        debug!(path, pages = page, items = accumulated.len(), "Fetched all pages");

        Ok(serde_json::to_vec(&accumulated)?)
    }
}

/// Check response status and convert errors.
fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(CacheError::Unauthorized),
        StatusCode::NOT_FOUND => Err(CacheError::NotFound(response.url().path().to_string())),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
            if header_u64(&response, "x-ratelimit-remaining") == Some(0) =>
        {
            let reset_at = header_u64(&response, "x-ratelimit-reset")
                .and_then(|reset| chrono::DateTime::from_timestamp(reset as i64, 0))
                .map(|dt| dt.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(CacheError::RateLimited { reset_at })
        }
        status => Err(CacheError::Status {
            status: status.as_u16(),
            path: response.url().path().to_string(),
        }),
    }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn read_body(response: Response) -> Result<Vec<u8>> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| CacheError::Upstream(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::{
        Json, Router,
        extract::{Query, State},
        http::{HeaderMap as AxumHeaderMap, StatusCode as AxumStatus, header},
        response::{IntoResponse, Response as AxumResponse},
        routing::get,
    };
    use serde_json::json;

    #[derive(Clone, Default)]
    struct Upstream {
        requests: Arc<AtomicU32>,
    }

    fn requested_page(params: &HashMap<String, String>) -> u32 {
        params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1)
    }

    fn next_link(page: u32) -> AxumHeaderMap {
        let mut headers = AxumHeaderMap::new();
        let link = format!(
            r#"<http://localhost/next?per_page=100&page={}>; rel="next""#,
            page + 1
        );
        headers.insert(header::LINK, link.parse().unwrap());
        headers
    }

    // Three pages of one repo each.
    async fn repos(
        State(state): State<Upstream>,
        Query(params): Query<HashMap<String, String>>,
    ) -> AxumResponse {
        state.requests.fetch_add(1, Ordering::SeqCst);
        let page = requested_page(&params);
        let headers = if page < 3 { next_link(page) } else { AxumHeaderMap::new() };
        (headers, Json(json!([{ "full_name": format!("acme/repo-{}", page) }]))).into_response()
    }

    // Always claims there is another page.
    async fn endless(
        State(state): State<Upstream>,
        Query(params): Query<HashMap<String, String>>,
    ) -> AxumResponse {
        state.requests.fetch_add(1, Ordering::SeqCst);
        let page = requested_page(&params);
        (next_link(page), Json(json!([{ "page": page }]))).into_response()
    }

    async fn org(State(state): State<Upstream>) -> AxumResponse {
        state.requests.fetch_add(1, Ordering::SeqCst);
        (next_link(1), Json(json!({ "login": "acme" }))).into_response()
    }

    // Second page fails.
    async fn flaky(
        State(state): State<Upstream>,
        Query(params): Query<HashMap<String, String>>,
    ) -> AxumResponse {
        state.requests.fetch_add(1, Ordering::SeqCst);
        match requested_page(&params) {
            1 => (next_link(1), Json(json!([{ "page": 1 }]))).into_response(),
            _ => AxumStatus::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    // Second page decodes to an object instead of a list; a third page is still declared.
    async fn garbled(
        State(state): State<Upstream>,
        Query(params): Query<HashMap<String, String>>,
    ) -> AxumResponse {
        state.requests.fetch_add(1, Ordering::SeqCst);
        let page = requested_page(&params);
        match page {
            1 => (next_link(page), Json(json!([{ "page": 1 }]))).into_response(),
            2 => (next_link(page), Json(json!({ "message": "x" }))).into_response(),
            _ => (next_link(page), Json(json!([{ "page": page }]))).into_response(),
        }
    }

    // Second page is not JSON at all.
    async fn not_json(
        State(state): State<Upstream>,
        Query(params): Query<HashMap<String, String>>,
    ) -> AxumResponse {
        state.requests.fetch_add(1, Ordering::SeqCst);
        let page = requested_page(&params);
        match page {
            1 => (next_link(page), Json(json!([{ "page": 1 }]))).into_response(),
            _ => (next_link(page), "not json").into_response(),
        }
    }

    async fn empty(State(state): State<Upstream>) -> AxumResponse {
        state.requests.fetch_add(1, Ordering::SeqCst);
        AxumStatus::OK.into_response()
    }

    async fn echo_headers(headers: AxumHeaderMap) -> AxumResponse {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({ "authorization": auth, "user_agent": agent })).into_response()
    }

    async fn rate_limited() -> AxumResponse {
        let mut headers = AxumHeaderMap::new();
        headers.insert("x-ratelimit-remaining", "0".parse().unwrap());
        headers.insert("x-ratelimit-reset", "1700000000".parse().unwrap());
        (AxumStatus::FORBIDDEN, headers, "API rate limit exceeded").into_response()
    }

    async fn spawn_upstream() -> (String, Upstream) {
        let state = Upstream::default();
        let app = Router::new()
            .route("/orgs/acme/repos", get(repos))
            .route("/endless", get(endless))
            .route("/orgs/acme", get(org))
            .route("/flaky", get(flaky))
            .route("/garbled", get(garbled))
            .route("/not-json", get(not_json))
            .route("/empty", get(empty))
            .route("/echo", get(echo_headers))
            .route("/limited", get(rate_limited))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    fn client(base: &str, token: Option<&str>) -> GitHubClient {
        GitHubClient::with_base_url(base, token, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all_follows_pages() {
        let (base, state) = spawn_upstream().await;
        let body = client(&base, None).fetch_all("/orgs/acme/repos").await.unwrap();

        let repos: Vec<Value> = serde_json::from_slice(&body).unwrap();
        let names: Vec<&str> = repos
            .iter()
            .filter_map(|r| r["full_name"].as_str())
            .collect();
        assert_eq!(names, vec!["acme/repo-1", "acme/repo-2", "acme/repo-3"]);
        assert_eq!(state.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_stops_at_page_cap() {
        let (base, state) = spawn_upstream().await;
        let body = client(&base, None).fetch_all("/endless").await.unwrap();

        let items: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(items.len(), MAX_PAGE_FOLLOW as usize);
        assert_eq!(state.requests.load(Ordering::SeqCst), MAX_PAGE_FOLLOW);
    }

    #[tokio::test]
    async fn test_fetch_all_returns_objects_unchanged() {
        let (base, state) = spawn_upstream().await;
        let c = client(&base, None);

        let paged = c.fetch_all("/orgs/acme").await.unwrap();
        let single = c.fetch("/orgs/acme").await.unwrap();
        assert_eq!(single.status, StatusCode::OK);
        assert_eq!(paged, single.body);
        assert_eq!(state.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_partial_results_on_error() {
        let (base, _) = spawn_upstream().await;
        let body = client(&base, None).fetch_all("/flaky").await.unwrap();

        let items: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(items, vec![json!({ "page": 1 })]);
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_partial_results_on_undecodable_page() {
        let (base, state) = spawn_upstream().await;
        let body = client(&base, None).fetch_all("/garbled").await.unwrap();

        let items: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(items, vec![json!({ "page": 1 })]);
        // Pagination stops at the bad page even though more were declared.
        assert_eq!(state.requests.load(Ordering::SeqCst), 2);

        let body = client(&base, None).fetch_all("/not-json").await.unwrap();
        let items: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(items, vec![json!({ "page": 1 })]);
    }

    #[tokio::test]
    async fn test_fetch_all_returns_empty_body_unchanged() {
        let (base, state) = spawn_upstream().await;
        let body = client(&base, None).fetch_all("/empty").await.unwrap();

        assert!(body.is_empty());
        assert_eq!(state.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_sends_token_and_user_agent() {
        let (base, _) = spawn_upstream().await;

        let body = client(&base, Some("abc123")).fetch("/echo").await.unwrap().body;
        let echoed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(echoed["authorization"], "token abc123");
        assert_eq!(echoed["user_agent"], CLIENT_USER_AGENT);

        let body = client(&base, None).fetch("/echo").await.unwrap().body;
        let echoed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(echoed["authorization"], "");
    }

    #[tokio::test]
    async fn test_status_errors() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, None);

        assert!(matches!(
            c.fetch_all("/missing").await,
            Err(CacheError::NotFound(path)) if path == "/missing"
        ));
        assert!(matches!(
            c.fetch_all("/limited").await,
            Err(CacheError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_passes_error_statuses_through() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, None);

        let missing = c.fetch("/missing").await.unwrap();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let limited = c.fetch("/limited").await.unwrap();
        assert_eq!(limited.status, StatusCode::FORBIDDEN);
        assert_eq!(limited.body, b"API rate limit exceeded");
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr), None)
            .fetch("/orgs/acme")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }

    #[test]
    fn test_url_joins_paths() {
        let c = client("https://api.github.com/", None);
        assert_eq!(
            c.url("/orgs/Netflix").unwrap().as_str(),
            "https://api.github.com/orgs/Netflix"
        );
        assert_eq!(
            c.url("orgs/Netflix").unwrap().as_str(),
            "https://api.github.com/orgs/Netflix"
        );
        assert_eq!(c.url("/").unwrap().as_str(), "https://api.github.com/");
    }
}
