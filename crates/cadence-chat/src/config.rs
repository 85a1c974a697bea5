//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    buffer::DEFAULT_DELIMITER,
    conversation::DEFAULT_EVENT_CAPACITY,
    error::{Error, Result},
};

/// Shown in place of the reply when the stream fails
pub const DEFAULT_ERROR_MESSAGE: &str = "Sorry, the message could not be sent. Please try again later.";

/// Shown when a stream completes without any visible text
pub const DEFAULT_EMPTY_RESPONSE_MESSAGE: &str = "Sorry, I can't answer that.";

/// Prompt sent by `send_initial_message`
pub const DEFAULT_INITIAL_MESSAGE: &str = "Hello";

/// Longest prompt accepted by `send`, in characters
pub const DEFAULT_MAX_INPUT_CHARS: usize = 2000;

/// Chat engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// In-band segment delimiter
    pub delimiter: String,
    /// Spacing between delivered segments, in milliseconds
    pub output_interval_ms: u64,
    /// Error placeholder text
    pub error_message: String,
    /// Empty-response placeholder text
    pub empty_response_message: String,
    /// Greeting prompt
    pub initial_message: String,
    /// Prompt length limit in characters
    pub max_input_chars: usize,
    /// Event channel capacity
    pub event_capacity: usize,
    /// Conversation id sent to the backend; generated when unset
    pub chat_id: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            output_interval_ms: 500,
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            empty_response_message: DEFAULT_EMPTY_RESPONSE_MESSAGE.to_string(),
            initial_message: DEFAULT_INITIAL_MESSAGE.to_string(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            chat_id: None,
        }
    }
}

impl ChatConfig {
    pub fn output_interval(&self) -> Duration {
        Duration::from_millis(self.output_interval_ms)
    }

    /// Set the output interval
    pub fn with_output_interval(mut self, interval: Duration) -> Self {
        self.output_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Set the conversation id
    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    /// The configured conversation id, or a new `user_<unix millis>` one
    pub fn resolve_chat_id(&self) -> String {
        self.chat_id
            .clone()
            .unwrap_or_else(|| format!("user_{}", chrono::Utc::now().timestamp_millis()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(Error::InvalidConfig("delimiter must not be empty".into()));
        }
        if self.output_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "output interval must be at least 1ms".into(),
            ));
        }
        if self.max_input_chars == 0 {
            return Err(Error::InvalidConfig(
                "max_input_chars must be positive".into(),
            ));
        }
        Ok(())
    }
}
