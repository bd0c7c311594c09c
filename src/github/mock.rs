// Scripted ApiClient for tests.
// Responses are queued per method and calls are counted.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, Result};

use super::client::ApiClient;
use super::types::ApiResponse;

#[derive(Default)]
pub struct MockClient {
    fetch_responses: Mutex<VecDeque<Result<ApiResponse>>>,
    fetch_all_responses: Mutex<VecDeque<Result<Vec<u8>>>>,
    /// Returned by `fetch_all` once the queue is drained.
    fetch_all_fallback: Mutex<Option<Vec<u8>>>,
    fetch_all_delay: Option<Duration>,
    fetch_calls: AtomicUsize,
    fetch_all_calls: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `fetch_all` sleeps this long before answering.
    pub fn with_fetch_all_delay(mut self, delay: Duration) -> Self {
        self.fetch_all_delay = Some(delay);
        self
    }

    /// Queue a `fetch` result; bodies are answered with `200 OK`.
    pub fn push_fetch(&self, response: Result<Vec<u8>>) {
        self.push_fetch_response(response.map(ApiResponse::ok));
    }

    pub fn push_fetch_response(&self, response: Result<ApiResponse>) {
        self.fetch_responses.lock().unwrap().push_back(response);
    }

    pub fn push_fetch_all(&self, response: Result<Vec<u8>>) {
        self.fetch_all_responses.lock().unwrap().push_back(response);
    }

    pub fn set_fetch_all_fallback(&self, body: &[u8]) {
        *self.fetch_all_fallback.lock().unwrap() = Some(body.to_vec());
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_all_calls(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiClient for MockClient {
    async fn fetch(&self, path: &str) -> Result<ApiResponse> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CacheError::NotFound(path.to_string())))
    }

    async fn fetch_all(&self, path: &str) -> Result<Vec<u8>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_all_delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.fetch_all_responses.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => self
                .fetch_all_fallback
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CacheError::NotFound(path.to_string())),
        }
    }
}
