//! Transport abstraction for streaming chat requests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{error::Result, event::TransportEventStream};

/// Request body sent to the chat backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's prompt
    pub message: String,
    /// Conversation identifier used by the backend for memory
    pub chat_id: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            chat_id: chat_id.into(),
        }
    }
}

/// An event source for one streaming request.
///
/// Implementations deliver the response body as `Chunk` events in arrival
/// order, then exactly one `Complete` or `Error`. Cancelling `cancel` must
/// abort the underlying request; cancelling is idempotent and harmless after
/// the stream has finished.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a streaming request
    async fn open(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TransportEventStream>;
}
