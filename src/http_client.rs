//! HTTP executor seam. The core never opens connections itself; it hands a
//! prepared [`HttpRequest`] to an [`HttpExecutor`] and inspects the
//! [`HttpResponse`] it gets back.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

/// HTTP methods the OAuth flows use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sets a header, replacing every existing value of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
    }

    /// Adds a header without touching existing values.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value of the named header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of the named header, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, String)>> for Headers {
    fn from(headers: Vec<(String, String)>) -> Self {
        Self(headers)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// HTTP redirect policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Do not follow redirections.
    None,
    /// Follow up to `u32` redirections.
    Limit(u32),
}

/// HTTP request for executing a call.
///
/// The same shape is used for requests a resource server receives and hands
/// to a token type driver for validation.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, etc.).
    pub method: HttpMethod,
    /// Target URL.
    pub url: String,
    /// Request headers.
    pub headers: Headers,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Optional timeout duration.
    pub timeout: Option<Duration>,
    /// Redirect policy to use for this request.
    pub redirect_policy: RedirectPolicy,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            timeout: None,
            redirect_policy: RedirectPolicy::None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// HTTP response from executing a call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with a JSON body and matching `Content-Type`.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        HttpResponse {
            status,
            headers: Headers::from_iter([("Content-Type", "application/json")]),
            body: body.to_string().into_bytes(),
        }
    }
}

/// Error type for HTTP client operations.
pub type HttpClientError = Box<dyn Error + Send + Sync>;

/// Generic HTTP client interface used to reach the Token Endpoint.
///
/// Retries, caching, timeouts and cancellation are the implementation's
/// business; the core only sees the final outcome.
#[async_trait]
pub trait HttpExecutor: Send + Sync + 'static {
    /// Execute an HTTP request.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError>;
}

#[derive(Clone)]
enum CannedReply {
    Response(HttpResponse),
    Failure(String),
}

/// In-memory HTTP client stub for testing.
///
/// Replies are looked up by URL: queued one-shot replies first, then the
/// sticky reply for that URL, then the default. Every request is recorded.
#[derive(Clone, Default)]
pub struct InMemoryHttpClient {
    responses: Arc<DashMap<String, CannedReply>>,
    queued: Arc<DashMap<String, VecDeque<CannedReply>>>,
    default_response: Option<HttpResponse>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl InMemoryHttpClient {
    /// Creates a new in-memory HTTP client with no default response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory HTTP client with a default response on miss.
    pub fn with_default(response: HttpResponse) -> Self {
        Self {
            default_response: Some(response),
            ..Self::default()
        }
    }

    /// Register a mock response for a specific URL.
    pub fn insert_response(&self, url: impl Into<String>, response: HttpResponse) {
        self.responses.insert(url.into(), CannedReply::Response(response));
    }

    /// Queue a response that is served once, ahead of any sticky response.
    pub fn enqueue_response(&self, url: impl Into<String>, response: HttpResponse) {
        self.queued
            .entry(url.into())
            .or_default()
            .push_back(CannedReply::Response(response));
    }

    /// Make every request to `url` fail at the transport level.
    pub fn fail_with(&self, url: impl Into<String>, message: impl Into<String>) {
        self.responses.insert(url.into(), CannedReply::Failure(message.into()));
    }

    /// Requests executed so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }

    fn reply_for(&self, url: &str) -> Option<CannedReply> {
        if let Some(mut queue) = self.queued.get_mut(url) {
            if let Some(reply) = queue.pop_front() {
                return Some(reply);
            }
        }
        self.responses
            .get(url)
            .map(|entry| entry.value().clone())
            .or_else(|| self.default_response.clone().map(CannedReply::Response))
    }
}

#[async_trait]
impl HttpExecutor for InMemoryHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        match self.reply_for(&url) {
            Some(CannedReply::Response(response)) => Ok(response),
            Some(CannedReply::Failure(message)) => Err(message.into()),
            None => Err("no mock response for url".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        headers.set("content-type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        headers.append("Accept", "a");
        headers.append("accept", "b");
        assert_eq!(headers.get_all("ACCEPT").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_in_memory_queue_then_sticky() {
        let client = InMemoryHttpClient::new();
        let url = "https://auth.local/token";
        client.insert_response(url, HttpResponse::json(200, &serde_json::json!({"n": 2})));
        client.enqueue_response(url, HttpResponse::json(400, &serde_json::json!({"n": 1})));

        let first = client.execute(HttpRequest::new(HttpMethod::POST, url)).await.unwrap();
        let second = client.execute(HttpRequest::new(HttpMethod::POST, url)).await.unwrap();
        assert_eq!(first.status, 400);
        assert_eq!(second.status, 200);
        assert_eq!(client.requests().len(), 2);

        let miss = client.execute(HttpRequest::new(HttpMethod::GET, "https://other")).await;
        assert!(miss.is_err());
    }
}
