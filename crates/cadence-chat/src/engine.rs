//! The chat engine actor.
//!
//! One task owns the conversation and the session controller. It multiplexes
//! commands from [`ChatHandle`]s, transport events from the request pump and
//! output driver ticks, so every mutation happens on a single logical thread.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use cadence_sse::{ChatRequest, Transport, TransportEvent, settle};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ChatConfig,
    conversation::Conversation,
    error::Result,
    events::{ChatEvent, SessionOutcome},
    handle::ChatHandle,
    message::{Message, validate_input},
    session::SessionController,
};

/// Capacity of the command channel
const COMMAND_CAPACITY: usize = 64;

/// Identifies one streaming request. Events tagged with an older id are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId(u64);

impl SessionId {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time copy of the visible state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub chat_id: String,
}

pub(crate) enum Command {
    Send {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SendInitial {
        reply: oneshot::Sender<Result<bool>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown,
}

/// A transport event tagged with the session that produced it
struct Envelope {
    session: SessionId,
    event: TransportEvent,
}

/// Loading flag shared with handles for `wait_for_idle`
pub(crate) struct IdleSignal {
    pub(crate) loading: AtomicBool,
    pub(crate) notify: Notify,
}

impl IdleSignal {
    pub(crate) fn new() -> Self {
        Self {
            loading: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn set(&self, loading: bool) {
        let was = self.loading.swap(loading, Ordering::AcqRel);
        if was && !loading {
            self.notify.notify_waiters();
        }
    }
}

pub struct ChatEngine {
    config: ChatConfig,
    chat_id: String,
    transport: Arc<dyn Transport>,
    conversation: Conversation,
    controller: SessionController,
    session: SessionId,
    initial_sent: bool,
    commands: mpsc::Receiver<Command>,
    envelope_tx: mpsc::UnboundedSender<Envelope>,
    envelopes: mpsc::UnboundedReceiver<Envelope>,
    idle: Arc<IdleSignal>,
}

impl ChatEngine {
    /// Build an engine and a handle to it. Call [`ChatEngine::run`] to start.
    pub fn new(config: ChatConfig, transport: Arc<dyn Transport>) -> Result<(Self, ChatHandle)> {
        config.validate()?;

        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (envelope_tx, envelopes) = mpsc::unbounded_channel();
        let idle = Arc::new(IdleSignal::new());

        let handle = ChatHandle::new(command_tx, event_tx.clone(), Arc::clone(&idle));
        let chat_id = config.resolve_chat_id();
        tracing::debug!(chat_id = %chat_id, "chat engine created");

        let engine = Self {
            controller: SessionController::new(&config),
            conversation: Conversation::with_sender(event_tx),
            config,
            chat_id,
            transport,
            session: SessionId::default(),
            initial_sent: false,
            commands,
            envelope_tx,
            envelopes,
            idle,
        };
        Ok((engine, handle))
    }

    /// Build an engine and run it on the current tokio runtime
    pub fn spawn(config: ChatConfig, transport: Arc<dyn Transport>) -> Result<ChatHandle> {
        let (engine, handle) = Self::new(config, transport)?;
        tokio::spawn(engine.run());
        Ok(handle)
    }

    /// Run until shut down or every handle is dropped
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(envelope) = self.envelopes.recv() => self.handle_envelope(envelope),
                _ = self.controller.tick() => {
                    self.controller.on_tick(&mut self.conversation);
                }
            }
            self.sync_idle();
        }

        self.cancel_session();
        self.conversation.set_loading(false);
        self.idle.set(false);
        tracing::debug!(chat_id = %self.chat_id, "chat engine stopped");
    }

    /// Replies go out after the idle signal is updated, so a caller that
    /// awaits `send` and then `wait_for_idle` observes the new session.
    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send { text, reply } => {
                let result = self.send(text);
                self.sync_idle();
                let _ = reply.send(result);
            }
            Command::SendInitial { reply } => {
                let result = self.send_initial_message();
                self.sync_idle();
                let _ = reply.send(result);
            }
            Command::Cancel { reply } => {
                let cancelled = self.cancel_session();
                if cancelled {
                    self.conversation.set_loading(false);
                }
                self.sync_idle();
                let _ = reply.send(cancelled);
            }
            Command::Clear { reply } => {
                self.clear();
                self.sync_idle();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn sync_idle(&self) {
        self.idle.set(self.conversation.is_loading());
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        if envelope.session != self.session || !self.controller.is_active() {
            tracing::warn!(session = %envelope.session, "dropping stale transport event");
            return;
        }

        match envelope.event {
            TransportEvent::Chunk { delta } => {
                self.controller.on_chunk(&delta);
            }
            TransportEvent::Complete => {
                self.controller.on_complete(&mut self.conversation);
            }
            TransportEvent::Error { message } => {
                self.controller.on_error(&mut self.conversation, &message);
            }
        }
    }

    fn send(&mut self, text: String) -> Result<()> {
        validate_input(&text, self.config.max_input_chars)?;

        if self.cancel_session() {
            tracing::info!("superseding the running stream");
        }

        self.conversation.push(Message::user(text.as_str()));
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id.clone();
        self.conversation.push(placeholder);
        self.conversation.set_loading(true);

        self.session = self.session.next();
        self.controller.begin_session(placeholder_id);

        let cancel = CancellationToken::new();
        self.controller.attach_cancel(cancel.clone());
        self.spawn_pump(ChatRequest::new(text, self.chat_id.clone()), cancel);
        Ok(())
    }

    fn send_initial_message(&mut self) -> Result<bool> {
        if self.initial_sent || !self.conversation.is_empty() || self.conversation.is_loading() {
            return Ok(false);
        }
        self.initial_sent = true;
        let greeting = self.config.initial_message.clone();
        self.send(greeting)?;
        Ok(true)
    }

    fn clear(&mut self) {
        self.cancel_session();
        self.conversation.clear();
        self.conversation.set_loading(false);
        self.initial_sent = false;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            messages: self.conversation.messages().to_vec(),
            is_loading: self.conversation.is_loading(),
            chat_id: self.chat_id.clone(),
        }
    }

    /// Cancel the live session, if any, and announce it
    fn cancel_session(&mut self) -> bool {
        if !self.controller.cancel() {
            return false;
        }
        self.conversation.emit(ChatEvent::SessionFinished {
            outcome: SessionOutcome::Cancelled,
        });
        true
    }

    /// Open the transport and forward its events, tagged with the current
    /// session, until the stream settles or `cancel` fires.
    fn spawn_pump(&self, request: ChatRequest, cancel: CancellationToken) {
        let session = self.session;
        let transport = Arc::clone(&self.transport);
        let tx = self.envelope_tx.clone();

        tokio::spawn(async move {
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                opened = transport.open(request, cancel.clone()) => opened,
            };

            let mut stream = match opened {
                Ok(stream) => settle(stream, cancel),
                Err(e) => {
                    tracing::warn!(session = %session, "failed to open stream: {}", e);
                    let _ = tx.send(Envelope {
                        session,
                        event: TransportEvent::error(e.to_string()),
                    });
                    return;
                }
            };

            while let Some(event) = stream.next().await {
                if tx.send(Envelope { session, event }).is_err() {
                    break;
                }
            }
            tracing::trace!(session = %session, "transport pump finished");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_EMPTY_RESPONSE_MESSAGE, DEFAULT_ERROR_MESSAGE};
    use crate::error::Error;
    use cadence_sse::{Script, ScriptedTransport};
    use std::time::Duration;
    use tokio::time::Instant;

    const T: Duration = Duration::from_millis(500);

    fn spawn_with(transport: Arc<ScriptedTransport>) -> ChatHandle {
        ChatEngine::spawn(ChatConfig::default().with_chat_id("user_test"), transport).unwrap()
    }

    /// Collect the instant each assistant bubble received text, until the
    /// session completes
    async fn delivery_times(events: &mut broadcast::Receiver<ChatEvent>) -> Vec<Instant> {
        let mut delivered = Vec::new();
        loop {
            match events.recv().await.unwrap() {
                ChatEvent::MessageAdded { message } | ChatEvent::MessageUpdated { message }
                    if message.is_assistant() && !message.content.is_empty() =>
                {
                    delivered.push(Instant::now());
                }
                ChatEvent::SessionFinished { outcome } => {
                    assert_eq!(outcome, SessionOutcome::Completed);
                    return delivered;
                }
                _ => {}
            }
        }
    }

    fn contents(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_segments_are_paced() {
        let transport = Arc::new(ScriptedTransport::new([Script::new()
            .chunk("one<chunk>two<chunk>three<chunk>")
            .complete()]));
        let handle = spawn_with(Arc::clone(&transport));
        let mut events = handle.subscribe();

        let begin = Instant::now();
        handle.send("hi").await.unwrap();
        let delivered = delivery_times(&mut events).await;

        assert_eq!(delivered.len(), 3);
        assert!(delivered[0] - begin < T);
        for pair in delivered.windows(2) {
            assert!(pair[1] - pair[0] >= T);
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(contents(&snapshot), vec!["hi", "one", "two", "three"]);
        assert!(!snapshot.is_loading);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "hi");
        assert_eq!(requests[0].chat_id, "user_test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_holds_across_driver_restart() {
        let transport = Arc::new(ScriptedTransport::new([Script::new()
            .chunk("a<chunk>")
            .pause(Duration::from_millis(510))
            .chunk("b<chunk>c<chunk>")
            .pause(Duration::from_millis(10))
            .chunk("d<chunk>")
            .complete()]));
        let handle = spawn_with(transport);
        let mut events = handle.subscribe();

        let begin = Instant::now();
        handle.send("hi").await.unwrap();
        let delivered = delivery_times(&mut events).await;

        // The driver idles after "a" and restarts when "b" arrives at 510ms.
        let expected = [0, 510, 1010, 1510].map(Duration::from_millis);
        assert_eq!(delivered.len(), expected.len());
        for (at, want) in delivered.iter().zip(expected) {
            let offset = *at - begin;
            assert!(
                offset >= want && offset <= want + Duration::from_millis(5),
                "expected ~{:?}, got {:?}",
                want,
                offset
            );
        }
        for pair in delivered.windows(2) {
            assert!(pair[1] - pair[0] >= T);
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(contents(&snapshot), vec!["hi", "a", "b", "c", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_split_across_delimiter() {
        let transport = Arc::new(ScriptedTransport::new([Script::new()
            .chunk("Hel")
            .chunk("lo<ch")
            .chunk("unk>Wor")
            .chunk("ld")
            .chunk("<chunk>")
            .complete()]));
        let handle = spawn_with(transport);
        handle.send("hi").await.unwrap();
        handle.wait_for_idle().await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(contents(&snapshot), vec!["hi", "Hello", "World"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unterminated_tail_joins_last_bubble() {
        let transport = Arc::new(ScriptedTransport::new([Script::new()
            .chunk("Hel")
            .chunk("lo<ch")
            .chunk("unk>Wor")
            .chunk("ld")
            .complete()]));
        let handle = spawn_with(transport);
        handle.send("hi").await.unwrap();
        handle.wait_for_idle().await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(contents(&snapshot), vec!["hi", "HelloWorld"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_mid_stream_marks_bubble() {
        let transport = Arc::new(ScriptedTransport::new([Script::new()
            .chunk("first<chunk>second<chunk>")
            .fail("connection reset")]));
        let handle = spawn_with(transport);
        let mut events = handle.subscribe();
        handle.send("hi").await.unwrap();

        loop {
            if let ChatEvent::SessionFinished { outcome } = events.recv().await.unwrap() {
                assert_eq!(outcome, SessionOutcome::Failed);
                break;
            }
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.is_loading);
        let last = snapshot.messages.last().unwrap();
        assert!(last.is_error);
        assert_eq!(last.content, DEFAULT_ERROR_MESSAGE);
        // Nothing after the error.
        tokio::time::sleep(T * 4).await;
        assert_eq!(handle.snapshot().await.unwrap(), snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response() {
        let transport = Arc::new(ScriptedTransport::new([Script::new().chunk("  ").complete()]));
        let handle = spawn_with(transport);
        handle.send("hi").await.unwrap();
        handle.wait_for_idle().await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(contents(&snapshot), vec!["hi", DEFAULT_EMPTY_RESPONSE_MESSAGE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_supersedes_running_stream() {
        let transport = Arc::new(ScriptedTransport::new([
            Script::new()
                .chunk("old one<chunk>old two<chunk>old three<chunk>")
                .pause(Duration::from_secs(60))
                .complete(),
            Script::new().chunk("new<chunk>").complete(),
        ]));
        let handle = spawn_with(Arc::clone(&transport));

        handle.send("first").await.unwrap();
        // Let the first segment land, but not the rest.
        tokio::time::sleep(T / 2).await;
        handle.send("second").await.unwrap();
        handle.wait_for_idle().await;
        tokio::time::sleep(T * 4).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(contents(&snapshot), vec!["first", "old one", "second", "new"]);
        assert!(transport.cancel_tokens()[0].is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_input_is_rejected() {
        let transport = Arc::new(ScriptedTransport::default());
        let handle = spawn_with(Arc::clone(&transport));

        assert!(matches!(handle.send("   ").await, Err(Error::InvalidInput(_))));
        assert!(matches!(
            handle.send("x".repeat(2001)).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(handle.snapshot().await.unwrap().messages.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_and_empties() {
        let transport = Arc::new(ScriptedTransport::new([Script::new()
            .chunk("a<chunk>b<chunk>")
            .pause(Duration::from_secs(60))
            .complete()]));
        let handle = spawn_with(Arc::clone(&transport));
        handle.send("hi").await.unwrap();
        tokio::time::sleep(T / 2).await;

        handle.clear().await.unwrap();
        tokio::time::sleep(T * 4).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.messages.is_empty());
        assert!(!snapshot.is_loading);
        assert!(transport.cancel_tokens()[0].is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_message_sent_once() {
        let transport = Arc::new(ScriptedTransport::repeating(
            Script::new().chunk("Hi there").complete(),
        ));
        let handle = spawn_with(Arc::clone(&transport));

        assert!(handle.send_initial_message().await.unwrap());
        handle.wait_for_idle().await;
        assert!(!handle.send_initial_message().await.unwrap());

        handle.clear().await.unwrap();
        assert!(handle.send_initial_message().await.unwrap());
        handle.wait_for_idle().await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.message == "Hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_messages() {
        let transport = Arc::new(ScriptedTransport::new([Script::new()
            .chunk("a<chunk>b<chunk>c<chunk>")
            .complete()]));
        let handle = spawn_with(transport);
        handle.send("hi").await.unwrap();
        tokio::time::sleep(T / 2).await;

        assert!(handle.cancel().await.unwrap());
        assert!(!handle.cancel().await.unwrap());
        tokio::time::sleep(T * 4).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(contents(&snapshot), vec!["hi", "a"]);
        assert!(!snapshot.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_handle() {
        let handle = spawn_with(Arc::new(ScriptedTransport::default()));
        handle.shutdown().await;
        tokio::task::yield_now().await;
        assert!(matches!(handle.snapshot().await, Err(Error::EngineClosed)));
    }
}
