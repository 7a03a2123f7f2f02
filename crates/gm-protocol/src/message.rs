//! Message types for the GaggiMate dashboard protocol
//!
//! Every frame exchanged over the WebSocket is a JSON object carrying a
//! string `tp` field identifying its type.
//!
//! # Message Flow
//!
//! 1. Client connects and sends `req:status` to ask for a full report
//! 2. Device pushes `evt:status` periodically (full report) and may push
//!    `evt:status:delta` frames carrying only changed keys
//! 3. Device sends `ping`, client answers `pong` with the same timestamp
//! 4. Client sends `req:*` commands; there is no acknowledgement, the next
//!    status frame shows whether the command took effect

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Frame type of a periodic full status report
pub const TP_STATUS: &str = "evt:status";
/// Frame type of an explicit full status snapshot
pub const TP_STATUS_FULL: &str = "evt:status:full";
/// Frame type of a partial status update
pub const TP_STATUS_DELTA: &str = "evt:status:delta";
/// Keepalive sent by the device
pub const TP_PING: &str = "ping";

/// Machine operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Mode {
    #[default]
    Standby = 0,
    Brew = 1,
    Steam = 2,
    Water = 3,
}

impl Mode {
    /// All modes in wire order
    pub const ALL: [Mode; 4] = [Mode::Standby, Mode::Brew, Mode::Steam, Mode::Water];

    /// Convert to the wire integer
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for Mode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Standby),
            1 => Ok(Self::Brew),
            2 => Ok(Self::Steam),
            3 => Ok(Self::Water),
            _ => Err(ProtocolError::OutOfRange {
                field: "mode",
                value,
            }),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        mode.as_u8()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Standby => write!(f, "standby"),
            Mode::Brew => write!(f, "brew"),
            Mode::Steam => write!(f, "steam"),
            Mode::Water => write!(f, "water"),
        }
    }
}

impl FromStr for Mode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standby" => Ok(Mode::Standby),
            "brew" => Ok(Mode::Brew),
            "steam" => Ok(Mode::Steam),
            "water" => Ok(Mode::Water),
            other => other
                .parse::<u8>()
                .map_err(|_| ProtocolError::MalformedCommand(format!("unknown mode '{}'", s)))
                .and_then(Mode::try_from),
        }
    }
}

/// Condition that ends a brew
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum BrewTarget {
    /// Stop after the profile's phase durations
    #[default]
    Time = 0,
    /// Stop on scale weight
    Weight = 1,
}

impl BrewTarget {
    /// Convert to the wire integer
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for BrewTarget {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Time),
            1 => Ok(Self::Weight),
            _ => Err(ProtocolError::OutOfRange {
                field: "brew target",
                value,
            }),
        }
    }
}

impl From<BrewTarget> for u8 {
    fn from(target: BrewTarget) -> Self {
        target.as_u8()
    }
}

impl fmt::Display for BrewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrewTarget::Time => write!(f, "time"),
            BrewTarget::Weight => write!(f, "weight"),
        }
    }
}

impl FromStr for BrewTarget {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "time" | "0" => Ok(BrewTarget::Time),
            "weight" | "volumetric" | "1" => Ok(BrewTarget::Weight),
            _ => Err(ProtocolError::MalformedCommand(format!(
                "unknown brew target '{}'",
                s
            ))),
        }
    }
}

/// Outbound commands (client → device)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tp")]
pub enum Command {
    /// Switch operating mode
    #[serde(rename = "req:change-mode")]
    ChangeMode { mode: Mode },

    /// Switch the brew stop condition
    #[serde(rename = "req:change-brew-target")]
    ChangeBrewTarget { target: BrewTarget },

    /// Start the current mode's process
    #[serde(rename = "req:process:activate")]
    ProcessActivate,

    /// Stop the running process
    #[serde(rename = "req:process:deactivate")]
    ProcessDeactivate,

    /// Dismiss a finished process and return to idle
    #[serde(rename = "req:process:clear")]
    ProcessClear,

    /// Zero the active scale
    #[serde(rename = "req:scale:tare")]
    ScaleTare,
}

impl Command {
    /// The `tp` discriminator this command is sent with
    pub fn tp(&self) -> &'static str {
        match self {
            Command::ChangeMode { .. } => "req:change-mode",
            Command::ChangeBrewTarget { .. } => "req:change-brew-target",
            Command::ProcessActivate => "req:process:activate",
            Command::ProcessDeactivate => "req:process:deactivate",
            Command::ProcessClear => "req:process:clear",
            Command::ScaleTare => "req:scale:tare",
        }
    }

    /// Build a command from an untyped JSON object.
    ///
    /// Unknown tags, missing required fields and out-of-range values are
    /// rejected with [`ProtocolError::MalformedCommand`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProtocolError> {
        match value.get("tp") {
            Some(serde_json::Value::String(_)) => {}
            Some(_) => {
                return Err(ProtocolError::MalformedCommand(
                    "`tp` must be a string".to_string(),
                ))
            }
            None => {
                return Err(ProtocolError::MalformedCommand(
                    "missing `tp` field".to_string(),
                ))
            }
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::MalformedCommand(e.to_string()))
    }
}

/// Connection-level frames the client sends on its own behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tp")]
pub enum ControlFrame {
    /// Ask the device for a full status report
    #[serde(rename = "req:status")]
    RequestStatus,

    /// Keepalive answer, echoing the ping timestamp
    #[serde(rename = "pong")]
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        ts: Option<u64>,
    },
}

/// What the progress fields of a process measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Milliseconds
    #[default]
    Time,
    /// Grams
    Volumetric,
    /// A target type this client does not know. The process is still
    /// shown, with the raw target value.
    #[serde(other)]
    Unknown,
}

/// The running or most recently finished brew/steam/water process.
///
/// Non-brew processes are reported with only the `a` flag, so every other
/// field falls back to its default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Whether the process is running
    #[serde(rename = "a", deserialize_with = "crate::serde_utils::flex_bool::deserialize")]
    pub active: bool,

    /// Progress so far (ms or g depending on `target_type`)
    #[serde(rename = "pp", default)]
    pub progress_current: f64,

    /// Progress target (ms or g depending on `target_type`)
    #[serde(rename = "pt", default)]
    pub progress_total: f64,

    /// Elapsed milliseconds since the process started
    #[serde(rename = "e", default)]
    pub elapsed_ms: u64,

    /// Stage tag, e.g. "brew" or "infusion"
    #[serde(rename = "s", default)]
    pub stage: String,

    /// Display label of the current phase
    #[serde(rename = "l", default)]
    pub label: String,

    /// Unit of the progress fields
    #[serde(rename = "tt", default)]
    pub target_type: TargetType,
}

/// Optional hardware advertised by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// A scale is wired to the controller
    pub hardware_scale: bool,
    /// A pressure sensor is fitted
    pub pressure: bool,
    /// Heater output can be dimmed
    pub dimming: bool,
    /// LED strip control is available
    pub led_control: bool,
}

/// Capability flags present in a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitiesUpdate {
    pub hardware_scale: Option<bool>,
    pub pressure: Option<bool>,
    pub dimming: Option<bool>,
    pub led_control: Option<bool>,
}

impl CapabilitiesUpdate {
    /// Apply the present flags onto `caps`
    pub fn apply_to(&self, caps: &mut Capabilities) {
        if let Some(v) = self.hardware_scale {
            caps.hardware_scale = v;
        }
        if let Some(v) = self.pressure {
            caps.pressure = v;
        }
        if let Some(v) = self.dimming {
            caps.dimming = v;
        }
        if let Some(v) = self.led_control {
            caps.led_control = v;
        }
    }

    /// True if the frame carried no capability flag at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// How a frame affects the `process` field
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProcessField {
    /// Key absent in a delta frame
    #[default]
    Unchanged,
    /// Device reports no process
    Cleared,
    /// Whole replacement process object
    Set(ProcessInfo),
}

/// Status fields carried by one inbound frame.
///
/// `None` means the key was absent: unknown or unchanged, never zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusUpdate {
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub current_pressure: Option<f64>,
    pub target_pressure: Option<f64>,
    pub current_flow: Option<f64>,
    pub current_weight: Option<f64>,
    pub selected_profile: Option<String>,
    pub mode: Option<Mode>,
    pub brew_target: Option<BrewTarget>,
    pub volumetric_available: Option<bool>,
    pub process: ProcessField,
    pub capabilities: CapabilitiesUpdate,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Full status report (`evt:status`, `evt:status:full`)
    Status(StatusUpdate),
    /// Partial status update (`evt:status:delta`)
    Delta(StatusUpdate),
    /// Keepalive request
    Ping { ts: Option<u64> },
    /// Any other frame type. Kept for listeners, ignored by the store.
    Other {
        tp: String,
        payload: serde_json::Value,
    },
}

impl InboundFrame {
    /// The `tp` discriminator of this frame
    pub fn tp(&self) -> &str {
        match self {
            InboundFrame::Status(_) => TP_STATUS,
            InboundFrame::Delta(_) => TP_STATUS_DELTA,
            InboundFrame::Ping { .. } => TP_PING,
            InboundFrame::Other { tp, .. } => tp,
        }
    }
}
