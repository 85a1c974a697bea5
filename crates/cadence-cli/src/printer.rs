//! Renders chat events to a terminal or a JSON line stream

use cadence_chat::ChatEvent;
use std::io::Write;

/// The assistant bubble currently being written
struct OpenBubble {
    id: String,
    shown: String,
}

/// Writes each assistant bubble as its own paragraph.
///
/// Updates to the open bubble print only the appended suffix. A replacement
/// that is not an extension (an error or empty-response text) starts on a new
/// line.
pub struct Printer<W: Write> {
    out: W,
    json: bool,
    open: Option<OpenBubble>,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            open: None,
        }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, event: &ChatEvent) -> anyhow::Result<()> {
        if self.json {
            writeln!(self.out, "{}", serde_json::to_string(event)?)?;
            self.out.flush()?;
            return Ok(());
        }

        match event {
            ChatEvent::MessageAdded { message } if message.is_assistant() => {
                self.close()?;
                self.open = Some(OpenBubble {
                    id: message.id.clone(),
                    shown: String::new(),
                });
                self.show(&message.content)?;
            }
            ChatEvent::MessageUpdated { message } => {
                if self.open.as_ref().is_some_and(|b| b.id == message.id) {
                    self.show(&message.content)?;
                }
            }
            ChatEvent::SessionFinished { .. } | ChatEvent::Cleared => self.close()?,
            _ => {}
        }
        self.out.flush()?;
        Ok(())
    }

    fn show(&mut self, content: &str) -> std::io::Result<()> {
        let Some(bubble) = self.open.as_mut() else {
            return Ok(());
        };
        if content == bubble.shown {
            return Ok(());
        }

        match content.strip_prefix(bubble.shown.as_str()) {
            Some(suffix) => write!(self.out, "{}", suffix)?,
            None => {
                if !bubble.shown.is_empty() {
                    writeln!(self.out)?;
                }
                write!(self.out, "{}", content)?;
            }
        }
        bubble.shown = content.to_string();
        Ok(())
    }

    /// End the open bubble's paragraph
    fn close(&mut self) -> std::io::Result<()> {
        if let Some(bubble) = self.open.take() {
            if !bubble.shown.is_empty() {
                write!(self.out, "\n\n")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_chat::{Message, SessionOutcome};

    fn render(json: bool, events: &[ChatEvent]) -> String {
        let mut printer = Printer::new(Vec::new(), json);
        for event in events {
            printer.handle(event).unwrap();
        }
        String::from_utf8(printer.into_inner()).unwrap()
    }

    fn updated(message: &Message, content: &str) -> ChatEvent {
        let mut message = message.clone();
        message.content = content.to_string();
        ChatEvent::MessageUpdated { message }
    }

    #[test]
    fn test_bubbles_are_paragraphs() {
        let placeholder = Message::placeholder();
        let second = Message::assistant("World");
        let out = render(
            false,
            &[
                ChatEvent::MessageAdded {
                    message: Message::user("hi"),
                },
                ChatEvent::MessageAdded {
                    message: placeholder.clone(),
                },
                updated(&placeholder, "Hello"),
                ChatEvent::MessageAdded { message: second },
                ChatEvent::SessionFinished {
                    outcome: SessionOutcome::Completed,
                },
            ],
        );
        assert_eq!(out, "Hello\n\nWorld\n\n");
    }

    #[test]
    fn test_suffix_only_on_extension() {
        let bubble = Message::assistant("two");
        let out = render(
            false,
            &[
                ChatEvent::MessageAdded {
                    message: bubble.clone(),
                },
                updated(&bubble, "two and more"),
            ],
        );
        assert_eq!(out, "two and more");
    }

    #[test]
    fn test_replacement_starts_new_line() {
        let bubble = Message::assistant("partial");
        let out = render(
            false,
            &[
                ChatEvent::MessageAdded {
                    message: bubble.clone(),
                },
                updated(&bubble, "Sorry"),
            ],
        );
        assert_eq!(out, "partial\nSorry");
    }

    #[test]
    fn test_json_lines() {
        let out = render(
            true,
            &[
                ChatEvent::LoadingChanged { loading: true },
                ChatEvent::Cleared,
            ],
        );
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "loading_changed");
        assert_eq!(lines[0]["loading"], true);
        assert_eq!(lines[1]["type"], "cleared");
    }
}
