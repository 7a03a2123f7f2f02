//! Core error types for the GaggiMate client

use gm_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the client crates
#[derive(Error, Debug)]
pub enum GmError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Command error
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-level errors. Any of these ends the current connection and
/// starts the reconnect loop.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Connection refused or handshake failed
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Connection attempt timed out
    #[error("Connection attempt timed out")]
    Timeout,

    /// Connection lost after it was established
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Device closed the connection
    #[error("Connection closed by device")]
    Closed,

    /// The connection loop died and took the status store with it
    #[error("Connection loop aborted, status store lost")]
    LoopAborted,
}

/// Errors surfaced to the caller of a command
#[derive(Error, Debug)]
pub enum CommandError {
    /// No live connection. The command was not queued.
    #[error("Not connected to the machine")]
    NotConnected,

    /// Command failed validation before any I/O
    #[error(transparent)]
    Malformed(#[from] ProtocolError),

    /// Transport failed while handing the frame over
    #[error("Send failed: {0}")]
    Transport(#[from] ConnectionError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
