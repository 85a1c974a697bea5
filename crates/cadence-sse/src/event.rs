//! Transport event types and the per-request stream guard

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

/// Events delivered by a transport for one request.
///
/// A well-formed sequence is zero or more `Chunk`s followed by exactly one
/// `Complete` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    /// A consecutive substring of the raw response body
    Chunk { delta: String },
    /// Clean end of stream
    Complete,
    /// Abnormal termination
    Error { message: String },
}

impl TransportEvent {
    /// Create a chunk event
    pub fn chunk(delta: impl Into<String>) -> Self {
        Self::Chunk {
            delta: delta.into(),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this is a terminal event (Complete or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Complete | TransportEvent::Error { .. })
    }
}

/// A stream of transport events
pub type TransportEventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Wrap a raw transport stream so it honors the delivery contract:
///
/// - nothing is yielded after the first terminal event,
/// - a stream that ends without a terminal event yields `Complete`,
/// - once `cancel` fires the stream ends silently, with no terminal event.
pub fn settle(mut inner: TransportEventStream, cancel: CancellationToken) -> TransportEventStream {
    Box::pin(stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = inner.next() => Some(next),
            };

            let Some(next) = next else {
                tracing::debug!("transport stream cancelled");
                return;
            };

            match next {
                Some(event) => {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
                None => {
                    yield TransportEvent::Complete;
                    return;
                }
            }
        }
    })
}
