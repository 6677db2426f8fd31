//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Every request is bounded by `request_timeout`; transient failures
//! (connection errors, non-2xx statuses, timeouts) are retried with
//! exponential backoff. Node-side JSON-RPC errors are returned as-is.
//! A reply whose `id` differs from the request's is rejected.
//!
//! A caller that puts its own deadline around [`RpcTransport::send`] should
//! allow at least [`HttpClientConfig::call_budget`], or timeouts never retry.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::RpcTransport;

/// Public Ethereum mainnet endpoint used when none is configured.
pub const DEFAULT_ETHEREUM_RPC_URL: &str = "https://ethereum-rpc.publicnode.com";

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl HttpClientConfig {
    /// Worst-case duration of one `send`: every attempt timing out, plus
    /// every backoff sleep between them.
    pub fn call_budget(&self) -> Duration {
        self.request_timeout * (self.retry.max_retries + 1) + self.retry.total_backoff()
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let resp = resp
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| self.classify(e))?;
        if resp.id != req.id {
            return Err(TransportError::Other(format!(
                "response id {:?} does not match request id {:?} for {}",
                resp.id, req.id, req.method
            )));
        }
        Ok(resp)
    }

    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(&req).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    match self.retry.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                url = %self.url,
                                method = %req.method,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Endpoint that accepts connections and never answers.
    async fn stalled_endpoint() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });
        (url, accepted)
    }

    /// Endpoint that answers every request with `body`.
    async fn canned_endpoint(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                read_request(&mut stream).await;
                let reply = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        url
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    return;
                }
            }
        }
    }

    fn quick_retry(max_retries: u32) -> HttpClientConfig {
        HttpClientConfig {
            retry: RetryConfig {
                max_retries,
                initial_backoff: Duration::from_millis(10),
                max_backoff: Duration::from_millis(50),
                multiplier: 2.0,
            },
            request_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn default_config_matches_node_timeout() {
        let cfg = HttpClientConfig::default();
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.retry.max_retries, 2);
    }

    #[test]
    fn call_budget_covers_every_attempt_and_backoff() {
        assert_eq!(HttpClientConfig::default().call_budget(), Duration::from_millis(15_300));
        assert_eq!(quick_retry(2).call_budget(), Duration::from_millis(330));
        let single = HttpClientConfig {
            retry: RetryConfig::none(),
            request_timeout: Duration::from_millis(250),
        };
        assert_eq!(single.call_budget(), Duration::from_millis(250));
    }

    #[test]
    fn client_keeps_url() {
        let client = HttpRpcClient::default_for(DEFAULT_ETHEREUM_RPC_URL).unwrap();
        assert_eq!(client.url(), DEFAULT_ETHEREUM_RPC_URL);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_retryable_http_error() {
        // Port 9 (discard) on localhost is closed in CI sandboxes.
        let client = HttpRpcClient::new(
            "http://127.0.0.1:9",
            HttpClientConfig {
                retry: RetryConfig::none(),
                request_timeout: Duration::from_millis(500),
            },
        )
        .unwrap();
        let err = client
            .send(JsonRpcRequest::new(1, "eth_blockNumber", vec![]))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn stalled_endpoint_is_retried_until_exhausted() {
        let (url, accepted) = stalled_endpoint().await;
        let config = quick_retry(2);
        let budget = config.call_budget();
        let client = HttpRpcClient::new(url, config).unwrap();

        let err = tokio::time::timeout(
            budget + Duration::from_secs(2),
            client.send(JsonRpcRequest::new(1, "eth_blockNumber", vec![])),
        )
        .await
        .expect("send outlived its call budget")
        .unwrap_err();

        assert!(matches!(err, TransportError::Timeout { ms: 100 }), "got {err}");
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn matching_response_id_is_accepted() {
        let url = canned_endpoint(r#"{"jsonrpc":"2.0","id":7,"result":"0x10"}"#).await;
        let client = HttpRpcClient::new(url, quick_retry(0)).unwrap();
        let resp = client
            .send(JsonRpcRequest::new(7, "eth_blockNumber", vec![]))
            .await
            .unwrap();
        assert_eq!(resp.into_result().unwrap(), serde_json::json!("0x10"));
    }

    #[tokio::test]
    async fn mismatched_response_id_is_rejected() {
        let url = canned_endpoint(r#"{"jsonrpc":"2.0","id":8,"result":"0x10"}"#).await;
        let client = HttpRpcClient::new(url, quick_retry(2)).unwrap();
        let err = client
            .send(JsonRpcRequest::new(7, "eth_blockNumber", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Other(ref msg) if msg.contains("does not match")), "got {err}");
        assert!(!err.is_retryable());
    }
}
