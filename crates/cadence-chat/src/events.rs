//! Chat event types

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Stream finished and every segment was shown
    Completed,
    /// Transport failed; the current bubble shows the error text
    Failed,
    /// Superseded by a new send, or the conversation was cleared
    Cancelled,
}

/// Events emitted as the visible conversation changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was appended to the conversation
    MessageAdded { message: Message },

    /// An existing message's content or error flag changed
    MessageUpdated { message: Message },

    /// The loading indicator was raised or released
    LoadingChanged { loading: bool },

    /// The conversation was emptied
    Cleared,

    /// A session reached its end state
    SessionFinished { outcome: SessionOutcome },
}
