//! HTTP client for the model-serving backend.
//!
//! Each call opens a fresh http1 connection, carries a hard timeout, and
//! translates every transport failure into [`BackendError`] before
//! returning. Health is re-probed on every call, never cached.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::BackendError;

/// Default hard cap on an invocation call.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default hard cap on a health probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Classification outcome reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Spam,
    Ham,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Spam => "spam",
            Label::Ham => "ham",
        }
    }
}

/// One classification result. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvocationResult {
    pub label: Label,
    pub confidence: f64,
}

/// Client for the serving endpoint's `/health` and `/invocations` routes.
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// `host:port` of the serving endpoint.
    authority: String,
    invoke_timeout: Duration,
    health_timeout: Duration,
}

impl BackendClient {
    /// Build a client from an `http://host[:port]` base URL.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_timeouts(base_url, DEFAULT_INVOKE_TIMEOUT, DEFAULT_HEALTH_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: &str,
        invoke_timeout: Duration,
        health_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let uri: http::Uri = base_url.parse()?;
        if let Some(scheme) = uri.scheme_str() {
            if scheme != "http" {
                anyhow::bail!("unsupported backend scheme: {scheme}");
            }
        }
        let authority = uri
            .authority()
            .ok_or_else(|| anyhow::anyhow!("backend url has no host: {base_url}"))?;
        let authority = if authority.port().is_some() {
            authority.to_string()
        } else {
            format!("{}:80", authority)
        };

        Ok(Self {
            authority,
            invoke_timeout,
            health_timeout,
        })
    }

    /// Probe the backend's `/health` route.
    ///
    /// Returns `true` only when the request completes with status 200
    /// and the JSON body's `status` field is `"healthy"`. Never errors;
    /// all failure modes log at debug and yield `false`.
    pub async fn check_health(&self) -> bool {
        let req = http::Request::builder()
            .method("GET")
            .uri(format!("http://{}/health", self.authority))
            .header("host", &self.authority)
            .header("user-agent", "spamgate/0.1")
            .body(Full::new(Bytes::new()))
            .unwrap();

        match self.request(req, self.health_timeout).await {
            Ok((200, body)) => {
                let healthy = serde_json::from_slice::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(String::from))
                    .is_some_and(|s| s == "healthy");
                if !healthy {
                    debug!("backend health body did not report healthy");
                }
                healthy
            }
            Ok((status, _)) => {
                debug!(status, "backend health probe non-200");
                false
            }
            Err(_) => false,
        }
    }

    /// Classify `text` by sending it as a single-element batch to the
    /// backend's `/invocations` route.
    pub async fn invoke(&self, text: &str) -> Result<InvocationResult, BackendError> {
        let payload = serde_json::json!({ "inputs": [text] });
        let req = http::Request::builder()
            .method("POST")
            .uri(format!("http://{}/invocations", self.authority))
            .header("host", &self.authority)
            .header("content-type", "application/json")
            .header("user-agent", "spamgate/0.1")
            .body(Full::new(Bytes::from(payload.to_string())))
            .unwrap();

        let (status, body) = self.request(req, self.invoke_timeout).await?;
        if status != 200 {
            debug!(status, "backend invocation non-200");
            return Err(BackendError::BadStatus(status));
        }
        parse_invocation(&body)
    }

    /// Send one request over a fresh connection, with `timeout` as a
    /// hard cap over connect, send, and body collection combined.
    async fn request(
        &self,
        req: http::Request<Full<Bytes>>,
        timeout: Duration,
    ) -> Result<(u16, Bytes), BackendError> {
        let authority = &self.authority;

        let outcome = tokio::time::timeout(timeout, async {
            let stream = TcpStream::connect(authority).await.map_err(|e| {
                debug!(error = %e, %authority, "backend connection failed");
                BackendError::Unreachable
            })?;

            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| {
                    debug!(error = %e, %authority, "backend handshake failed");
                    BackendError::Unreachable
                })?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let resp = sender.send_request(req).await.map_err(|e| {
                debug!(error = %e, %authority, "backend request failed");
                BackendError::Unreachable
            })?;

            let status = resp.status().as_u16();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| {
                    debug!(error = %e, %authority, "backend body read failed");
                    BackendError::Unreachable
                })?
                .to_bytes();
            Ok((status, body))
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                debug!(%authority, "backend call timed out");
                Err(BackendError::Unreachable)
            }
        }
    }
}

/// Extract `predictions[0]` from an invocation response body.
fn parse_invocation(body: &[u8]) -> Result<InvocationResult, BackendError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| BackendError::MalformedResponse)?;

    let first = value
        .get("predictions")
        .and_then(|p| p.get(0))
        .ok_or(BackendError::MalformedResponse)?;

    let label = match first.get("prediction").and_then(|p| p.as_str()) {
        Some("spam") => Label::Spam,
        Some("ham") => Label::Ham,
        _ => return Err(BackendError::MalformedResponse),
    };

    let confidence = first
        .get("confidence")
        .and_then(|c| c.as_f64())
        .ok_or(BackendError::MalformedResponse)?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(BackendError::MalformedResponse);
    }

    Ok(InvocationResult { label, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a fixed HTTP response to every connection.
    async fn stub_backend(body: &'static str, status_line: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = sock.read(&mut buf).await;
                    let resp = format!(
                        "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                });
            }
        });
        addr
    }

    fn client_for(addr: SocketAddr) -> BackendClient {
        BackendClient::with_timeouts(
            &format!("http://{addr}"),
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn invoke_parses_prediction() {
        let addr = stub_backend(
            r#"{"predictions":[{"prediction":"spam","confidence":0.97}]}"#,
            "HTTP/1.1 200 OK",
        )
        .await;

        let result = client_for(addr).invoke("FREE MONEY CLICK NOW").await.unwrap();
        assert_eq!(result.label, Label::Spam);
        assert_eq!(result.confidence, 0.97);
    }

    #[tokio::test]
    async fn invoke_maps_non_200_to_bad_status() {
        let addr = stub_backend(r#"{"error":"boom"}"#, "HTTP/1.1 503 Service Unavailable").await;

        let err = client_for(addr).invoke("hello").await.unwrap_err();
        assert_eq!(err, BackendError::BadStatus(503));
    }

    #[tokio::test]
    async fn invoke_rejects_empty_predictions() {
        let addr = stub_backend(r#"{"predictions":[]}"#, "HTTP/1.1 200 OK").await;

        let err = client_for(addr).invoke("hello").await.unwrap_err();
        assert_eq!(err, BackendError::MalformedResponse);
    }

    #[tokio::test]
    async fn invoke_rejects_missing_confidence() {
        let addr =
            stub_backend(r#"{"predictions":[{"prediction":"ham"}]}"#, "HTTP/1.1 200 OK").await;

        let err = client_for(addr).invoke("hello").await.unwrap_err();
        assert_eq!(err, BackendError::MalformedResponse);
    }

    #[tokio::test]
    async fn invoke_rejects_unknown_label() {
        let addr = stub_backend(
            r#"{"predictions":[{"prediction":"maybe","confidence":0.5}]}"#,
            "HTTP/1.1 200 OK",
        )
        .await;

        let err = client_for(addr).invoke("hello").await.unwrap_err();
        assert_eq!(err, BackendError::MalformedResponse);
    }

    #[tokio::test]
    async fn invoke_rejects_non_json_body() {
        let addr = stub_backend("not json at all", "HTTP/1.1 200 OK").await;

        let err = client_for(addr).invoke("hello").await.unwrap_err();
        assert_eq!(err, BackendError::MalformedResponse);
    }

    #[tokio::test]
    async fn invoke_unreachable_on_refused_connection() {
        // Bind then drop to reserve an address nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(addr).invoke("hello").await.unwrap_err();
        assert_eq!(err, BackendError::Unreachable);
    }

    #[tokio::test]
    async fn invoke_timeout_maps_to_unreachable() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    break;
                };
                // Hold the socket open without responding.
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    drop(sock);
                });
            }
        });

        let client = BackendClient::with_timeouts(
            &format!("http://{addr}"),
            Duration::from_millis(100),
            Duration::from_millis(100),
        )
        .unwrap();

        let err = client.invoke("hello").await.unwrap_err();
        assert_eq!(err, BackendError::Unreachable);
    }

    #[tokio::test]
    async fn health_true_only_for_healthy_status() {
        let addr = stub_backend(r#"{"status":"healthy"}"#, "HTTP/1.1 200 OK").await;
        assert!(client_for(addr).check_health().await);

        let addr = stub_backend(r#"{"status":"unhealthy"}"#, "HTTP/1.1 200 OK").await;
        assert!(!client_for(addr).check_health().await);
    }

    #[tokio::test]
    async fn health_false_on_non_200() {
        let addr = stub_backend(r#"{"status":"healthy"}"#, "HTTP/1.1 500 Internal Server Error").await;
        assert!(!client_for(addr).check_health().await);
    }

    #[tokio::test]
    async fn health_false_when_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(!client_for(addr).check_health().await);
    }

    #[test]
    fn new_rejects_url_without_host() {
        assert!(BackendClient::new("not a url").is_err());
        assert!(BackendClient::new("https://secure.example").is_err());
    }

    #[test]
    fn new_defaults_port_80() {
        let client = BackendClient::new("http://backend.internal").unwrap();
        assert_eq!(client.authority, "backend.internal:80");
    }

    #[test]
    fn parse_rejects_out_of_range_confidence() {
        let body = br#"{"predictions":[{"prediction":"spam","confidence":1.5}]}"#;
        assert_eq!(
            parse_invocation(body).unwrap_err(),
            BackendError::MalformedResponse
        );
    }
}
