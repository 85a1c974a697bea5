//! A cloneable handle for driving the chat engine from external code.

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    engine::{Command, IdleSignal, Snapshot},
    error::{Error, Result},
    events::ChatEvent,
};

/// A cloneable handle for driving the chat engine.
///
/// All fields are channel ends or `Arc`s, so cloning is cheap.
#[derive(Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<ChatEvent>,
    idle: Arc<IdleSignal>,
}

impl ChatHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<ChatEvent>,
        idle: Arc<IdleSignal>,
    ) -> Self {
        Self {
            commands,
            event_tx,
            idle,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::EngineClosed)?;
        response.await.map_err(|_| Error::EngineClosed)
    }

    /// Send a prompt. A stream that is still running is superseded.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| Command::Send { text, reply }).await?
    }

    /// Send the configured greeting if this conversation has not had one yet.
    /// Returns whether it was sent.
    pub async fn send_initial_message(&self) -> Result<bool> {
        self.request(|reply| Command::SendInitial { reply }).await?
    }

    /// Stop the running stream, keeping what was already shown.
    /// Returns whether a stream was running.
    pub async fn cancel(&self) -> Result<bool> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    /// Cancel any running stream and empty the conversation
    pub async fn clear(&self) -> Result<()> {
        self.request(|reply| Command::Clear { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Subscribe to conversation events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the engine. Later requests fail with [`Error::EngineClosed`].
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Wait until no response is loading.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle.notify.notified();
        if !self.idle.loading.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Wait until no response is loading, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: Duration) -> bool {
        if !self.is_loading() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Whether a response is currently loading
    pub fn is_loading(&self) -> bool {
        self.idle.loading.load(Ordering::Acquire)
    }
}
