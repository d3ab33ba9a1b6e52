//! [`HttpExecutor`] backed by reqwest.

use async_trait::async_trait;
use tracing::debug;

use crate::http_client::{
    Headers, HttpClientError, HttpExecutor, HttpMethod, HttpRequest, HttpResponse, RedirectPolicy,
};
use crate::settings::HttpClientSettings;

/// Real transport for Token Endpoint requests.
///
/// Redirect handling is fixed when the client is built; the per-request
/// `redirect_policy` is not consulted.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    max_body_size: usize,
}

impl ReqwestHttpClient {
    pub fn new(settings: &HttpClientSettings) -> Result<Self, HttpClientError> {
        let redirect = match settings.redirect_policy() {
            RedirectPolicy::None => reqwest::redirect::Policy::none(),
            RedirectPolicy::Limit(n) => reqwest::redirect::Policy::limited(n as usize),
        };
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .redirect(redirect)
            .build()?;
        Ok(ReqwestHttpClient {
            client,
            max_body_size: settings.max_body_size,
        })
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::PATCH => reqwest::Method::PATCH,
    }
}

fn body_too_large(limit: usize) -> HttpClientError {
    format!("response body exceeds {limit} bytes").into()
}

#[async_trait]
impl HttpExecutor for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let mut response = builder.send().await?;
        let status = response.status().as_u16();
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_size as u64)
        {
            return Err(body_too_large(self.max_body_size));
        }
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string())))
            .collect();
        // Chunked replies carry no Content-Length, so the cap is enforced while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_size {
                return Err(body_too_large(self.max_body_size));
            }
            body.extend_from_slice(&chunk);
        }
        debug!(status, bytes = body.len(), "HTTP response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one chunked reply made of `chunks` chunks of `chunk_size` bytes.
    async fn chunked_server(chunks: usize, chunk_size: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let chunk = format!("{chunk_size:x}\r\n{}\r\n", "a".repeat(chunk_size));
            for _ in 0..chunks {
                if socket.write_all(chunk.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        format!("http://{addr}/token")
    }

    fn client(max_body_size: usize) -> ReqwestHttpClient {
        ReqwestHttpClient::new(&HttpClientSettings {
            max_body_size,
            ..HttpClientSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_chunked_body_over_cap_rejected() {
        let url = chunked_server(64, 1024).await;
        let err = client(4096)
            .execute(HttpRequest::new(HttpMethod::POST, url))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "response body exceeds 4096 bytes");
    }

    #[tokio::test]
    async fn test_chunked_body_under_cap_read() {
        let url = chunked_server(2, 16).await;
        let response = client(4096)
            .execute(HttpRequest::new(HttpMethod::POST, url))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), 32);
    }
}
