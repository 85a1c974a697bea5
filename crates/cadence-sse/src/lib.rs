//! cadence-sse: transport layer for the cadence chat client
//!
//! Opens streaming chat requests against the backend and turns the
//! server-sent-events body into an ordered stream of text deltas.

pub mod error;
pub mod event;
pub mod scripted;
pub mod sse;
pub mod transport;

pub use error::{Error, Result};
pub use event::{TransportEvent, TransportEventStream, settle};
pub use scripted::{Script, ScriptStep, ScriptedTransport};
pub use sse::{SseConfig, SseTransport};
pub use transport::{ChatRequest, Transport};
