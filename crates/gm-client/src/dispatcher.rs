//! Command dispatcher
//!
//! Turns user intents into outbound frames. Commands are fire-and-forget:
//! a successful send means the frame was queued on the live connection, not
//! that the machine acted on it. The status store is the source of truth for
//! what the machine actually did.

use std::sync::Arc;

use serde_json::Value;

use gm_core::CommandError;
use gm_protocol::{BrewTarget, Command, Mode};

use crate::connection::Link;

/// Sends commands over the live connection
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    link: Arc<Link>,
}

impl CommandDispatcher {
    /// Dispatcher writing to whatever connection `link` has attached
    pub fn new(link: Arc<Link>) -> Self {
        Self { link }
    }

    /// Send a command.
    ///
    /// The command is encoded before the connection is looked at, so a
    /// malformed command fails the same way whether or not the machine is
    /// reachable. Without a live connection this returns
    /// [`CommandError::NotConnected`] immediately; nothing is queued.
    pub async fn send(&self, command: Command) -> Result<(), CommandError> {
        let frame = gm_protocol::encode(&command)?;
        tracing::debug!("Sending {}", command.tp());
        self.link.send(frame).await
    }

    /// Send an untyped JSON command, e.g. `{"tp":"req:change-mode","mode":1}`.
    /// Returns the command that was sent.
    pub async fn send_value(&self, value: Value) -> Result<Command, CommandError> {
        let (command, frame) = gm_protocol::encode_value(value)?;
        tracing::debug!("Sending {}", command.tp());
        self.link.send(frame).await?;
        Ok(command)
    }

    /// Switch the machine's operating mode
    pub async fn change_mode(&self, mode: Mode) -> Result<(), CommandError> {
        self.send(Command::ChangeMode { mode }).await
    }

    /// Choose whether a brew stops on time or on weight
    pub async fn change_brew_target(&self, target: BrewTarget) -> Result<(), CommandError> {
        self.send(Command::ChangeBrewTarget { target }).await
    }

    /// Start the process for the current mode
    pub async fn activate(&self) -> Result<(), CommandError> {
        self.send(Command::ProcessActivate).await
    }

    /// Stop the running process
    pub async fn deactivate(&self) -> Result<(), CommandError> {
        self.send(Command::ProcessDeactivate).await
    }

    /// Dismiss a finished process
    pub async fn clear(&self) -> Result<(), CommandError> {
        self.send(Command::ProcessClear).await
    }

    /// Zero the active scale
    pub async fn tare(&self) -> Result<(), CommandError> {
        self.send(Command::ScaleTare).await
    }
}
