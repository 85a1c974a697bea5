//! SSE client for the chat backend's streaming endpoint

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    event::{TransportEvent, TransportEventStream},
    transport::{ChatRequest, Transport},
};

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Endpoint configuration for the SSE transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Backend base URL, without a trailing slash
    pub base_url: String,
    /// Path of the streaming chat endpoint
    pub stream_path: String,
    /// Path of the health endpoint
    pub health_path: String,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_path: "/chat/send/stream".to_string(),
            health_path: "/health".to_string(),
        }
    }
}

impl SseConfig {
    /// Create a config pointing at `base_url` with the default paths
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    fn join(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Full URL of the streaming endpoint
    pub fn stream_url(&self) -> String {
        self.join(&self.stream_path)
    }

    /// Full URL of the health endpoint
    pub fn health_url(&self) -> String {
        self.join(&self.health_path)
    }

    /// Reject configurations that cannot produce a usable URL
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}

/// Streams chat responses over server-sent events
pub struct SseTransport {
    client: reqwest::Client,
    config: SseConfig,
}

impl SseTransport {
    /// Create a new transport with a fresh HTTP client
    pub fn new(config: SseConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a transport that reuses an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: SseConfig) -> Self {
        Self { client, config }
    }

    /// Get the endpoint configuration
    pub fn config(&self) -> &SseConfig {
        &self.config
    }

    /// Query the backend's health endpoint
    pub async fn check_health(&self) -> Result<serde_json::Value> {
        let response = self.client.get(self.config.health_url()).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status, body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TransportEventStream> {
        let url = self.config.stream_url();
        tracing::debug!(url = %url, chat_id = %request.chat_id, "opening chat stream");

        let request_builder = self
            .client
            .post(&url)
            .header("accept", "text/event-stream")
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source, cancel)))
    }
}

/// Map the event source onto transport events.
///
/// Each `data:` payload becomes one chunk, in delivery order. The event source
/// reconnects on its own after a dropped connection, so it is closed as soon as
/// the stream ends or fails.
fn create_stream(
    mut event_source: EventSource,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = TransportEvent> {
    stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = event_source.next() => Some(next),
            };

            let Some(next) = next else {
                tracing::debug!("chat stream aborted");
                event_source.close();
                return;
            };

            match next {
                None | Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                    event_source.close();
                    yield TransportEvent::Complete;
                    return;
                }
                Some(Ok(Event::Open)) => {
                    tracing::debug!("chat stream opened");
                }
                Some(Ok(Event::Message(msg))) => {
                    if msg.data.is_empty() {
                        continue;
                    }
                    yield TransportEvent::Chunk { delta: msg.data };
                }
                Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
                    event_source.close();
                    let body = response.text().await.unwrap_or_default();
                    let error = Error::status(status.as_u16(), body);
                    tracing::warn!("chat stream rejected: {}", error);
                    yield TransportEvent::error(error.to_string());
                    return;
                }
                Some(Err(e)) => {
                    event_source.close();
                    tracing::warn!("chat stream failed: {}", e);
                    yield TransportEvent::error(Error::Sse(e.to_string()).to_string());
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let config = SseConfig::default();
        assert_eq!(config.stream_url(), "http://localhost:8080/chat/send/stream");
        assert_eq!(config.health_url(), "http://localhost:8080/health");
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let config = SseConfig::with_base_url("https://chat.example.com/api/");
        assert_eq!(
            config.stream_url(),
            "https://chat.example.com/api/chat/send/stream"
        );
    }

    #[test]
    fn test_validate_rejects_non_http() {
        assert!(SseConfig::with_base_url("ftp://x").validate().is_err());
        assert!(SseConfig::with_base_url("localhost:8080").validate().is_err());
        assert!(SseConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_open_fails_fast_when_backend_unreachable() {
        // Port 9 (discard) is not expected to serve SSE; the error must arrive
        // as a single terminal event rather than an endless reconnect loop.
        let transport = SseTransport::new(SseConfig::with_base_url("http://127.0.0.1:9"));
        let stream = transport
            .open(ChatRequest::new("hi", "user_1"), CancellationToken::new())
            .await
            .unwrap();
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TransportEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_stream_ends_silently() {
        let transport = SseTransport::new(SseConfig::with_base_url("http://127.0.0.1:9"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream = transport
            .open(ChatRequest::new("hi", "user_1"), cancel)
            .await
            .unwrap();
        let events: Vec<_> = stream.collect().await;
        assert!(events.is_empty());
    }
}
