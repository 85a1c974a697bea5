//! Conversation state: the message list and the loading indicator.

use tokio::sync::broadcast;

use crate::{events::ChatEvent, message::Message};

/// Default capacity of the event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// The visible conversation.
///
/// Every mutation is mirrored to subscribers as a [`ChatEvent`].
pub struct Conversation {
    messages: Vec<Message>,
    is_loading: bool,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl Conversation {
    /// Create an empty conversation with its own event channel
    pub fn new(event_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));
        Self::with_sender(event_tx)
    }

    /// Create an empty conversation that publishes on an existing channel
    pub fn with_sender(event_tx: broadcast::Sender<ChatEvent>) -> Self {
        Self {
            messages: Vec::new(),
            is_loading: false,
            event_tx,
        }
    }

    /// Subscribe to conversation events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message.clone());
        self.emit(ChatEvent::MessageAdded { message });
    }

    /// Replace a message's content. Returns `false` if no message has `id`.
    pub fn set_content(&mut self, id: &str, content: impl Into<String>) -> bool {
        self.update(id, content.into(), false)
    }

    /// Replace a message's content and flag it as an error
    pub fn mark_error(&mut self, id: &str, content: impl Into<String>) -> bool {
        self.update(id, content.into(), true)
    }

    fn update(&mut self, id: &str, content: String, is_error: bool) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            tracing::warn!(message_id = id, "update for unknown message");
            return false;
        };
        message.content = content;
        message.is_error = is_error;
        let message = message.clone();
        self.emit(ChatEvent::MessageUpdated { message });
        true
    }

    /// Raise or release the loading indicator
    pub fn set_loading(&mut self, loading: bool) {
        if self.is_loading == loading {
            return;
        }
        self.is_loading = loading;
        self.emit(ChatEvent::LoadingChanged { loading });
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
        self.emit(ChatEvent::Cleared);
    }

    /// Publish an event. Having no subscribers is fine.
    pub(crate) fn emit(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
