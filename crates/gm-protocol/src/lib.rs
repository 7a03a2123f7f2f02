//! gm-protocol: Wire protocol for the GaggiMate dashboard
//!
//! This crate defines the JSON messages exchanged with the espresso-machine
//! controller over its WebSocket, and the codec that turns them into typed
//! commands and status updates.

pub mod codec;
pub mod error;
pub mod message;
pub mod serde_utils;

pub use codec::{decode, encode, encode_control, encode_value};
pub use error::{DecodeError, ProtocolError};
pub use message::{
    BrewTarget, Capabilities, CapabilitiesUpdate, Command, ControlFrame, InboundFrame, Mode,
    ProcessField, ProcessInfo, StatusUpdate, TargetType,
};
