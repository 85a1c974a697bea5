//! Configuration file support

use cadence_chat::ChatConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for cadence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL
    pub base_url: Option<String>,
    /// Segment delimiter
    pub delimiter: Option<String>,
    /// Milliseconds between bubbles
    pub interval_ms: Option<u64>,
    /// Conversation id sent with every request
    pub chat_id: Option<String>,
    /// Send the greeting prompt on startup in interactive mode
    pub greeting: Option<bool>,
    /// Greeting prompt
    pub initial_message: Option<String>,
    /// Text shown when a request fails
    pub error_message: Option<String>,
    /// Text shown when the reply is empty
    pub empty_response_message: Option<String>,
    /// Longest accepted prompt, in characters
    pub max_input_chars: Option<usize>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cadence")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CADENCE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let defaults = ChatConfig::default();
        let config = Config {
            base_url: Some(cadence_sse::sse::DEFAULT_BASE_URL.to_string()),
            delimiter: Some(defaults.delimiter),
            interval_ms: Some(defaults.output_interval_ms),
            chat_id: None,
            greeting: Some(false),
            initial_message: Some(defaults.initial_message),
            error_message: None,
            empty_response_message: None,
            max_input_chars: None,
        };

        config.save_to(&path)?;
        Ok(path)
    }

    /// Overlay the file's settings on an engine configuration
    pub fn apply(&self, chat: &mut ChatConfig) {
        if let Some(delimiter) = &self.delimiter {
            chat.delimiter = delimiter.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            chat.output_interval_ms = interval_ms;
        }
        if let Some(chat_id) = &self.chat_id {
            chat.chat_id = Some(chat_id.clone());
        }
        if let Some(initial_message) = &self.initial_message {
            chat.initial_message = initial_message.clone();
        }
        if let Some(error_message) = &self.error_message {
            chat.error_message = error_message.clone();
        }
        if let Some(empty) = &self.empty_response_message {
            chat.empty_response_message = empty.clone();
        }
        if let Some(max) = self.max_input_chars {
            chat.max_input_chars = max;
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# cadence configuration file
# Place at ~/.config/cadence/config.toml (Linux) or set CADENCE_CONFIG_PATH

# Backend base URL
base_url = "http://localhost:8080"

# Delimiter the backend puts between bubbles
delimiter = "<chunk>"

# Milliseconds between bubbles
interval_ms = 500

# Fixed conversation id (generated per run when unset)
# chat_id = "user_1700000000000"

# Send the greeting prompt when interactive mode starts
greeting = false
initial_message = "Hello"

# Replacement texts
# error_message = "Sorry, the message could not be sent. Please try again later."
# empty_response_message = "Sorry, I can't answer that."
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.interval_ms, Some(500));
        assert_eq!(config.greeting, Some(false));
        assert!(config.chat_id.is_none());
    }

    #[test]
    fn test_apply_overrides_only_set_fields() {
        let config: Config = toml::from_str("delimiter = \"||\"\nchat_id = \"fixed\"").unwrap();
        let mut chat = ChatConfig::default();
        config.apply(&mut chat);
        assert_eq!(chat.delimiter, "||");
        assert_eq!(chat.chat_id.as_deref(), Some("fixed"));
        assert_eq!(chat.output_interval_ms, 500);
        assert_eq!(chat.initial_message, "Hello");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("cadence-does-not-exist.toml");
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("cadence-test-{}", uuid::Uuid::new_v4().simple()))
            .join("config.toml");
        let config = Config {
            base_url: Some("http://example.test".into()),
            interval_ms: Some(250),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
