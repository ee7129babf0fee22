use crate::error::PublishError;
use crate::events::StatusPayload;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Trait for downstream status API implementations
pub trait StatusSink: Send + Sync {
    fn send<'a>(
        &'a self,
        payload: &'a StatusPayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>>;
}

/// Client for the Kener status page API
///
/// Posts `{status, latency, tag}` to `/api/status` with a bearer token.
/// Requests are bounded by a short timeout; a slow status page is treated
/// as a failed publish.
pub struct KenerSink {
    client: Client,
    base_url: String,
    token: String,
}

impl KenerSink {
    /// Create a new Kener client
    ///
    /// # Arguments
    /// * `base_url` - Kener base URL (e.g., "https://status.example.com")
    /// * `token` - API token sent as a bearer token
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Format the status endpoint URL
    fn api_url(&self) -> String {
        format!("{}/api/status", self.base_url.trim_end_matches('/'))
    }
}

impl StatusSink for KenerSink {
    fn send<'a>(
        &'a self,
        payload: &'a StatusPayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.api_url())
                .bearer_auth(&self.token)
                .json(payload)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(PublishError::Status(status.as_u16(), error_text));
            }

            Ok(())
        })
    }
}

/// In-memory sink for tests and dry runs
///
/// Records every payload it is asked to send. Can be scripted to fail and to
/// delay its responses.
#[derive(Clone, Default)]
pub struct MockSink {
    sent: Arc<Mutex<Vec<StatusPayload>>>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl MockSink {
    /// A sink that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records every payload and then fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Add a delay to all responses
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Payloads received so far, in call order
    pub fn sent(&self) -> Vec<StatusPayload> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl StatusSink for MockSink {
    fn send<'a>(
        &'a self,
        payload: &'a StatusPayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(payload.clone());

            match &self.failure {
                Some(message) => Err(PublishError::Http(message.clone())),
                None => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ResolvedStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one request with a canned `response`, returning the raw request
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&buffer).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buffer.len() >= header_end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buffer).to_string()
    }

    fn body(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn payload() -> StatusPayload {
        StatusPayload {
            status: ResolvedStatus::Up,
            latency: 42.0,
            tag: "api".to_string(),
        }
    }

    #[test]
    fn test_kener_sink_url() {
        let sink = KenerSink::new(
            "https://status.example.com/".to_string(),
            "secret".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(sink.api_url(), "https://status.example.com/api/status");
        assert_eq!(sink.token, "secret");
    }

    #[tokio::test]
    async fn test_mock_sink_records_payloads() {
        let sink = MockSink::new();

        sink.send(&payload()).await.unwrap();
        sink.send(&payload()).await.unwrap();

        assert_eq!(sink.call_count(), 2);
        assert_eq!(sink.sent()[0], payload());
    }

    #[tokio::test]
    async fn test_mock_sink_failure() {
        let sink = MockSink::failing("connection refused");

        let result = sink.send(&payload()).await;
        match result {
            Err(PublishError::Http(message)) => assert_eq!(message, "connection refused"),
            other => panic!("Expected Http error, got {:?}", other),
        }
        assert_eq!(sink.call_count(), 1);
    }

    #[tokio::test]
    async fn test_kener_sink_unreachable_host_is_an_error() {
        // Nothing listens on port 9 on localhost; the request fails fast.
        let sink = KenerSink::new(
            "http://127.0.0.1:9".to_string(),
            "secret".to_string(),
            Duration::from_millis(500),
        )
        .unwrap();

        assert!(sink.send(&payload()).await.is_err());
    }

    #[tokio::test]
    async fn test_kener_sink_posts_status_with_bearer_token() {
        let (url, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok").await;
        let sink = KenerSink::new(url, "tok".to_string(), Duration::from_secs(2)).unwrap();

        let degraded = StatusPayload {
            status: ResolvedStatus::Degraded,
            latency: 12.0,
            tag: "api".to_string(),
        };
        sink.send(&degraded).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/status HTTP/1.1\r\n"));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: bearer tok\r\n"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/json"));
        assert_eq!(
            body(&request),
            serde_json::json!({"status": "DEGRADED", "latency": 12.0, "tag": "api"})
        );
    }

    #[tokio::test]
    async fn test_kener_sink_maps_error_status() {
        let (url, server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
        )
        .await;
        let sink = KenerSink::new(url, "tok".to_string(), Duration::from_secs(2)).unwrap();

        match sink.send(&payload()).await {
            Err(PublishError::Status(code, text)) => {
                assert_eq!(code, 503);
                assert_eq!(text, "busy");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_kener_sink_times_out_on_stalled_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            // Never answer
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let sink = KenerSink::new(url, "tok".to_string(), Duration::from_millis(200)).unwrap();

        assert!(matches!(
            sink.send(&payload()).await,
            Err(PublishError::Timeout)
        ));
    }
}
