//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the single device connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No connection and no reconnect scheduled
    #[default]
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Connection is up and frames are flowing
    Connected,
    /// Connection was lost; waiting out the backoff or retrying
    Reconnecting,
}

impl ConnectionStatus {
    /// Whether commands can be sent in this state
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_display() {
        assert_eq!(format!("{}", ConnectionStatus::Connected), "connected");
        assert_eq!(
            format!("{}", ConnectionStatus::Reconnecting),
            "reconnecting"
        );
    }

    #[test]
    fn test_only_connected_accepts_commands() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(!ConnectionStatus::Reconnecting.is_connected());
        assert!(!ConnectionStatus::Disconnected.is_connected());
    }
}
