//! Chat messages as shown to the user

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn id_prefix(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One bubble in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique, never changes after creation
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Local wall-clock time of creation, `HH:MM:SS`
    pub timestamp: String,
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    /// Create a message with a freshly generated id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::with_id(new_message_id(role), role, content)
    }

    /// Create a message with an explicit id
    pub fn with_id(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            is_error: false,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An empty assistant message awaiting its first segment
    pub fn placeholder() -> Self {
        Self::assistant(String::new())
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Generate a unique message id such as `assistant_4f6c...`
pub fn new_message_id(role: Role) -> String {
    format!("{}_{}", role.id_prefix(), uuid::Uuid::new_v4().simple())
}

/// Check that a prompt is worth sending: non-blank and at most `max_chars`
/// characters long.
pub fn validate_input(text: &str, max_chars: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("message is empty".to_string()));
    }
    let len = text.chars().count();
    if len > max_chars {
        return Err(Error::InvalidInput(format!(
            "message is {} characters, limit is {}",
            len, max_chars
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_prefixed_and_unique() {
        let a = Message::assistant("x");
        let b = Message::assistant("x");
        assert!(a.id.starts_with("assistant_"));
        assert_ne!(a.id, b.id);
        assert!(Message::user("hi").id.starts_with("user_"));
    }

    #[test]
    fn test_placeholder_is_empty_assistant() {
        let m = Message::placeholder();
        assert!(m.is_assistant());
        assert!(m.content.is_empty());
        assert!(!m.is_error);
    }

    #[test]
    fn test_timestamp_format() {
        let m = Message::user("hi");
        assert_eq!(m.timestamp.len(), 8);
        assert_eq!(m.timestamp.matches(':').count(), 2);
    }

    #[test]
    fn test_serializes_camel_case() {
        let m = Message::with_id("assistant_1", Role::Assistant, "hello");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["isError"], false);
        assert_eq!(json["id"], "assistant_1");
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input("hello", 10).is_ok());
        assert!(validate_input("   \n", 10).is_err());
        assert!(validate_input("", 10).is_err());
        assert!(validate_input("abcdefghijk", 10).is_err());
        // Limit counts characters, not bytes
        assert!(validate_input("ééééé", 5).is_ok());
    }
}
