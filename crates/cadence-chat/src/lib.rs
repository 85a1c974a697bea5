//! cadence-chat: streaming segmentation and paced output for chat bubbles
//!
//! Splits a streamed reply on an in-band delimiter, releases the resulting
//! segments at a fixed cadence, and keeps the visible conversation in step
//! with the stream's lifecycle.

pub mod buffer;
pub mod config;
pub mod conversation;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod message;
pub mod queue;
pub mod session;

pub use buffer::{DEFAULT_DELIMITER, StreamBuffer};
pub use config::ChatConfig;
pub use conversation::Conversation;
pub use driver::{DriverState, PacedDriver};
pub use engine::{ChatEngine, SessionId, Snapshot};
pub use error::{Error, Result};
pub use events::{ChatEvent, SessionOutcome};
pub use handle::ChatHandle;
pub use message::{Message, Role, validate_input};
pub use queue::SegmentQueue;
pub use session::{SessionController, StreamState};
