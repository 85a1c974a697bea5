//! In-memory transport that replays scripted responses

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::VecDeque, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    event::{TransportEvent, TransportEventStream},
    transport::{ChatRequest, Transport},
};

/// One step of a scripted response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Deliver a chunk
    Chunk(String),
    /// Wait before the next step
    Pause(Duration),
    /// End the stream cleanly
    Complete,
    /// End the stream with an error
    Fail(String),
}

/// A canned response: a sequence of steps replayed for one request.
///
/// If the script runs out without `Complete` or `Fail`, the stream simply
/// ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(mut self, delta: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Chunk(delta.into()));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Pause(duration));
        self
    }

    pub fn complete(mut self) -> Self {
        self.steps.push(ScriptStep::Complete);
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Fail(message.into()));
        self
    }

    /// Cut a raw response body into chunks of at most `chunk_chars`
    /// characters, with `delay` between chunks, followed by `Complete`.
    pub fn from_body(body: &str, chunk_chars: usize, delay: Duration) -> Self {
        let chunk_chars = chunk_chars.max(1);
        let chars: Vec<char> = body.chars().collect();
        let mut script = Self::new();
        for (i, piece) in chars.chunks(chunk_chars).enumerate() {
            if i > 0 && !delay.is_zero() {
                script = script.pause(delay);
            }
            script = script.chunk(piece.iter().collect::<String>());
        }
        script.complete()
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

/// How many recent requests and cancel tokens are kept for inspection
pub const HISTORY_LIMIT: usize = 32;

/// Transport that answers each request with the next queued script.
///
/// When the queue is empty it answers with `fallback`, or with an immediately
/// completed empty stream. Only the last [`HISTORY_LIMIT`] requests are
/// recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Option<Script>,
    requests: Mutex<VecDeque<ChatRequest>>,
    cancel_tokens: Mutex<VecDeque<CancellationToken>>,
}

fn record<T>(history: &Mutex<VecDeque<T>>, item: T) {
    let mut history = history.lock();
    if history.len() == HISTORY_LIMIT {
        history.pop_front();
    }
    history.push_back(item);
}

impl ScriptedTransport {
    /// Create a transport that replays `scripts` in order
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Answer every request with the same script
    pub fn repeating(script: Script) -> Self {
        Self {
            fallback: Some(script),
            ..Default::default()
        }
    }

    /// Recent requests, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().iter().cloned().collect()
    }

    /// Cancellation tokens handed in with recent requests, oldest first
    pub fn cancel_tokens(&self) -> Vec<CancellationToken> {
        self.cancel_tokens.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TransportEventStream> {
        let script = self
            .scripts
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Script::new().complete());

        record(&self.requests, request);
        record(&self.cancel_tokens, cancel.clone());

        Ok(Box::pin(stream! {
            for step in script.steps {
                if cancel.is_cancelled() {
                    return;
                }
                match step {
                    ScriptStep::Chunk(delta) => yield TransportEvent::Chunk { delta },
                    ScriptStep::Pause(duration) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(duration) => {}
                        }
                    }
                    ScriptStep::Complete => {
                        yield TransportEvent::Complete;
                        return;
                    }
                    ScriptStep::Fail(message) => {
                        yield TransportEvent::Error { message };
                        return;
                    }
                }
            }
        }))
    }
}
