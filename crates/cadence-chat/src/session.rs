//! Per-request stream lifecycle: segmentation, pacing and bubble policy.

use tokio_util::sync::CancellationToken;

use crate::{
    buffer::StreamBuffer,
    config::ChatConfig,
    conversation::Conversation,
    driver::PacedDriver,
    events::{ChatEvent, SessionOutcome},
    message::Message,
    queue::SegmentQueue,
};

/// State of the live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {
    /// The bubble that receives the next content
    pub current_message_id: String,
    /// Content shown in the current bubble so far
    pub current_segment_content: String,
    /// The transport has reported completion or failure
    pub stream_ended: bool,
}

impl StreamState {
    fn new(initial_message_id: String) -> Self {
        Self {
            current_message_id: initial_message_id,
            current_segment_content: String::new(),
            stream_ended: false,
        }
    }
}

/// Drives one streaming request at a time.
///
/// Owns the buffer, the queue and the output driver, and is reused across
/// sessions. All methods are synchronous; the async owner calls `tick` to
/// wait for the driver and `on_tick` when it fires.
///
/// A session is live from `begin_session` until it is finalized, fails or is
/// cancelled. Events that arrive while no session is live are ignored, so a
/// late callback from a finished or superseded request cannot touch the
/// conversation.
pub struct SessionController {
    buffer: StreamBuffer,
    queue: SegmentQueue,
    driver: PacedDriver,
    state: Option<StreamState>,
    in_flight: Option<CancellationToken>,
    error_message: String,
    empty_response_message: String,
}

impl SessionController {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            buffer: StreamBuffer::new(config.delimiter.clone()),
            queue: SegmentQueue::new(),
            driver: PacedDriver::new(config.output_interval()),
            state: None,
            in_flight: None,
            error_message: config.error_message.clone(),
            empty_response_message: config.empty_response_message.clone(),
        }
    }

    /// The live session, if any
    pub fn state(&self) -> Option<&StreamState> {
        self.state.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_driving(&self) -> bool {
        self.driver.is_running()
    }

    /// Segments waiting for their tick
    pub fn pending_segments(&self) -> usize {
        self.queue.len()
    }

    /// Start a session whose first segment fills `initial_message_id`.
    ///
    /// Any previous session is cancelled first. Returns whether one was.
    pub fn begin_session(&mut self, initial_message_id: impl Into<String>) -> bool {
        let superseded = self.cancel();
        let state = StreamState::new(initial_message_id.into());
        tracing::info!(message_id = %state.current_message_id, "stream session started");
        self.state = Some(state);
        superseded
    }

    /// Attach the network handle of the live session so `cancel` can abort it
    pub fn attach_cancel(&mut self, token: CancellationToken) {
        if let Some(previous) = self.in_flight.replace(token) {
            previous.cancel();
        }
    }

    /// Feed a text delta. Returns the number of segments it completed.
    pub fn on_chunk(&mut self, delta: &str) -> usize {
        match &self.state {
            Some(state) if !state.stream_ended => {}
            _ => {
                tracing::warn!("ignoring chunk outside a live stream");
                return 0;
            }
        }

        let mut queued = 0;
        for segment in self.buffer.append_chunk(delta) {
            if self.queue.enqueue(segment) {
                queued += 1;
            }
        }

        if queued > 0 {
            tracing::debug!(queued, pending = self.queue.len(), "segments extracted");
            if self.driver.start() {
                tracing::debug!("output driver started");
            }
        }
        queued
    }

    /// Wait for the output driver's next tick. Pending forever while idle.
    pub async fn tick(&mut self) {
        self.driver.tick().await
    }

    /// Handle a driver tick. Returns whether the driver keeps running.
    pub fn on_tick(&mut self, conversation: &mut Conversation) -> bool {
        self.process_next_segment(conversation)
    }

    /// Deliver the oldest queued segment.
    ///
    /// The first segment of a session fills the placeholder; every later one
    /// opens a new bubble. With nothing queued the driver stops, and if the
    /// stream has already ended the session is finalized.
    pub fn process_next_segment(&mut self, conversation: &mut Conversation) -> bool {
        let Some(state) = self.state.as_mut() else {
            self.driver.stop();
            return false;
        };

        if let Some(segment) = self.queue.dequeue() {
            if state.current_segment_content.is_empty() {
                conversation.set_content(&state.current_message_id, segment.as_str());
            } else {
                let message = Message::assistant(segment.as_str());
                state.current_message_id = message.id.clone();
                conversation.push(message);
            }
            tracing::debug!(
                message_id = %state.current_message_id,
                remaining = self.queue.len(),
                "segment delivered"
            );
            state.current_segment_content = segment;
            return true;
        }

        let stream_ended = state.stream_ended;
        self.driver.stop();
        if stream_ended {
            self.finalize(conversation);
        }
        false
    }

    /// The transport finished cleanly
    pub fn on_complete(&mut self, conversation: &mut Conversation) {
        let Some(state) = self.state.as_mut() else {
            tracing::warn!("ignoring completion outside a live stream");
            return;
        };
        if state.stream_ended {
            return;
        }
        state.stream_ended = true;

        if self.driver.is_running() {
            // The driver finalizes once it drains the queue.
            return;
        }
        if !self.queue.is_empty() {
            self.driver.start();
            return;
        }
        self.finalize(conversation);
    }

    /// The transport failed. Pending output is dropped and the current bubble
    /// shows the error text.
    pub fn on_error(&mut self, conversation: &mut Conversation, error: &str) {
        let Some(state) = self.state.take() else {
            tracing::warn!("ignoring error outside a live stream: {}", error);
            return;
        };
        tracing::warn!(message_id = %state.current_message_id, "stream failed: {}", error);

        self.driver.stop();
        self.queue.clear();
        self.buffer.clear();
        self.in_flight = None;

        conversation.set_loading(false);
        conversation.mark_error(&state.current_message_id, self.error_message.as_str());
        conversation.emit(ChatEvent::SessionFinished {
            outcome: SessionOutcome::Failed,
        });
    }

    /// Abandon the live session: stop the driver, drop buffered and queued
    /// text, and abort the network request. Messages are left as they are.
    ///
    /// Returns whether a session was live.
    pub fn cancel(&mut self) -> bool {
        self.driver.stop();
        self.queue.clear();
        self.buffer.clear();
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        let was_live = self.state.take().is_some();
        if was_live {
            tracing::info!("stream session cancelled");
        }
        was_live
    }

    /// Deliver the unterminated tail, substitute the empty-response text if
    /// nothing was shown, and release the loading indicator.
    fn finalize(&mut self, conversation: &mut Conversation) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        self.driver.stop();
        self.in_flight = None;

        let remainder = self.buffer.flush();
        if !remainder.trim().is_empty() {
            state.current_segment_content.push_str(&remainder);
            conversation.set_content(
                &state.current_message_id,
                state.current_segment_content.as_str(),
            );
        }

        conversation.set_loading(false);

        if state.current_segment_content.trim().is_empty() {
            conversation.set_content(
                &state.current_message_id,
                self.empty_response_message.as_str(),
            );
        }

        tracing::info!(message_id = %state.current_message_id, "stream session completed");
        conversation.emit(ChatEvent::SessionFinished {
            outcome: SessionOutcome::Completed,
        });
    }
}
