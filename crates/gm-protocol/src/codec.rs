//! JSON text-frame codec
//!
//! The WebSocket already delimits messages, so a frame is one JSON object.
//! `encode` validates before serializing; `decode` is tolerant of unknown
//! fields and unknown frame types so newer firmware does not break older
//! clients.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DecodeError, ProtocolError};
use crate::message::{
    BrewTarget, CapabilitiesUpdate, Command, ControlFrame, InboundFrame, Mode, ProcessField,
    ProcessInfo, StatusUpdate, TP_PING, TP_STATUS, TP_STATUS_DELTA, TP_STATUS_FULL,
};
use crate::serde_utils::{double_option, flex_bool_opt};

/// Encode an outbound command into a text frame
pub fn encode(command: &Command) -> Result<String, ProtocolError> {
    let frame = serde_json::to_string(command)?;
    Ok(frame)
}

/// Validate an untyped command and encode it.
///
/// Fails with [`ProtocolError::MalformedCommand`] before producing any
/// output if the tag is unknown or a required field is missing.
pub fn encode_value(value: Value) -> Result<(Command, String), ProtocolError> {
    let command = Command::from_value(value)?;
    let frame = encode(&command)?;
    Ok((command, frame))
}

/// Encode a connection-level control frame
pub fn encode_control(frame: &ControlFrame) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode an inbound text frame
pub fn decode(raw: &str) -> Result<InboundFrame, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::InvalidJson)?;
    decode_value(value)
}

/// Decode an already-parsed JSON value
pub fn decode_value(value: Value) -> Result<InboundFrame, DecodeError> {
    let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let tp = match obj.get("tp") {
        Some(Value::String(tp)) => tp.clone(),
        _ => return Err(DecodeError::MissingType),
    };

    match tp.as_str() {
        TP_STATUS | TP_STATUS_FULL => {
            let raw = parse_fields::<RawStatus>(&tp, value)?;
            Ok(InboundFrame::Status(raw.into_update(false)))
        }
        TP_STATUS_DELTA => {
            let raw = parse_fields::<RawStatus>(&tp, value)?;
            Ok(InboundFrame::Delta(raw.into_update(true)))
        }
        TP_PING => {
            let ping = parse_fields::<RawPing>(&tp, value)?;
            Ok(InboundFrame::Ping { ts: ping.ts })
        }
        _ => {
            tracing::trace!("Passing through frame type {}", tp);
            Ok(InboundFrame::Other { tp, payload: value })
        }
    }
}

fn parse_fields<T: for<'de> Deserialize<'de>>(tp: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidFields {
        tp: tp.to_string(),
        source,
    })
}

#[derive(Deserialize)]
struct RawPing {
    #[serde(default)]
    ts: Option<u64>,
}

/// Status frame as it appears on the wire. Compact keys are what the
/// firmware sends; the long names are accepted too.
#[derive(Deserialize)]
struct RawStatus {
    #[serde(default, rename = "ct", alias = "currentTemperature")]
    current_temperature: Option<f64>,
    #[serde(default, rename = "tt", alias = "targetTemperature")]
    target_temperature: Option<f64>,
    #[serde(default, rename = "pr", alias = "currentPressure")]
    current_pressure: Option<f64>,
    #[serde(default, rename = "pt", alias = "targetPressure")]
    target_pressure: Option<f64>,
    #[serde(default, rename = "fl", alias = "currentFlow")]
    current_flow: Option<f64>,
    #[serde(default, rename = "cw", alias = "currentWeight")]
    current_weight: Option<f64>,
    #[serde(default, rename = "p", alias = "selectedProfile")]
    selected_profile: Option<String>,
    #[serde(default, rename = "m", alias = "mode")]
    mode: Option<Mode>,
    #[serde(default, rename = "bt", alias = "brewTarget")]
    brew_target: Option<BrewTarget>,
    #[serde(
        default,
        rename = "bta",
        alias = "volumetricAvailable",
        deserialize_with = "flex_bool_opt::deserialize"
    )]
    volumetric_available: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    process: Option<Option<ProcessInfo>>,
    #[serde(default, rename = "cp", deserialize_with = "flex_bool_opt::deserialize")]
    cap_pressure: Option<bool>,
    #[serde(default, rename = "cd", deserialize_with = "flex_bool_opt::deserialize")]
    cap_dimming: Option<bool>,
    #[serde(default, rename = "led", deserialize_with = "flex_bool_opt::deserialize")]
    cap_led: Option<bool>,
    #[serde(default)]
    capabilities: Option<RawCapabilities>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCapabilities {
    #[serde(default, deserialize_with = "flex_bool_opt::deserialize")]
    hardware_scale: Option<bool>,
    #[serde(default, deserialize_with = "flex_bool_opt::deserialize")]
    pressure: Option<bool>,
    #[serde(default, deserialize_with = "flex_bool_opt::deserialize")]
    dimming: Option<bool>,
    #[serde(default, deserialize_with = "flex_bool_opt::deserialize")]
    led_control: Option<bool>,
}

impl RawStatus {
    /// In a delta frame an absent `process` key means "unchanged"; in a
    /// full report it means the device has no process to show.
    fn into_update(self, delta: bool) -> StatusUpdate {
        let process = match self.process {
            Some(Some(info)) => ProcessField::Set(info),
            Some(None) => ProcessField::Cleared,
            None if delta => ProcessField::Unchanged,
            None => ProcessField::Cleared,
        };

        let nested = self.capabilities.unwrap_or_default();
        let capabilities = CapabilitiesUpdate {
            hardware_scale: nested.hardware_scale,
            pressure: nested.pressure.or(self.cap_pressure),
            dimming: nested.dimming.or(self.cap_dimming),
            led_control: nested.led_control.or(self.cap_led),
        };

        StatusUpdate {
            current_temperature: self.current_temperature,
            target_temperature: self.target_temperature,
            current_pressure: self.current_pressure,
            target_pressure: self.target_pressure,
            current_flow: self.current_flow,
            current_weight: self.current_weight,
            selected_profile: self.selected_profile,
            mode: self.mode,
            brew_target: self.brew_target,
            volumetric_available: self.volumetric_available,
            process,
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TargetType;
    use serde_json::json;

    #[test]
    fn test_encode_carries_tp_and_fields() {
        let frame = encode(&Command::ChangeMode { mode: Mode::Steam }).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"tp": "req:change-mode", "mode": 2}));

        let frame = encode(&Command::ChangeBrewTarget {
            target: BrewTarget::Weight,
        })
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"tp": "req:change-brew-target", "target": 1}));
    }

    #[test]
    fn test_encode_fieldless_commands() {
        let frame = encode(&Command::ScaleTare).unwrap();
        assert_eq!(frame, r#"{"tp":"req:scale:tare"}"#);
        let frame = encode(&Command::ProcessClear).unwrap();
        assert_eq!(frame, r#"{"tp":"req:process:clear"}"#);
    }

    #[test]
    fn test_encode_value_rejects_before_output() {
        let err = encode_value(json!({"tp": "req:change-brew-target"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedCommand(_)));

        let (command, frame) = encode_value(json!({"tp": "req:process:activate"})).unwrap();
        assert_eq!(command, Command::ProcessActivate);
        assert_eq!(frame, r#"{"tp":"req:process:activate"}"#);
    }

    #[test]
    fn test_encode_control_frames() {
        assert_eq!(
            encode_control(&ControlFrame::RequestStatus).unwrap(),
            r#"{"tp":"req:status"}"#
        );
        assert_eq!(
            encode_control(&ControlFrame::Pong { ts: Some(42) }).unwrap(),
            r#"{"tp":"pong","ts":42}"#
        );
    }

    #[test]
    fn test_decode_full_status_compact_keys() {
        let raw = json!({
            "tp": "evt:status",
            "ct": 92.5, "tt": 93.0, "pr": 8.9, "pt": 9.0, "fl": 1.8,
            "m": 1, "p": "Classic", "bt": 1, "bta": 1,
            "cp": true, "cd": false, "led": true,
            "process": {"a": 1, "pp": 12000, "pt": 30000, "e": 15000,
                        "s": "brew", "l": "Extraction", "tt": "time"}
        })
        .to_string();

        let InboundFrame::Status(update) = decode(&raw).unwrap() else {
            panic!("Expected Status frame");
        };
        assert_eq!(update.current_temperature, Some(92.5));
        assert_eq!(update.target_pressure, Some(9.0));
        assert_eq!(update.mode, Some(Mode::Brew));
        assert_eq!(update.brew_target, Some(BrewTarget::Weight));
        assert_eq!(update.volumetric_available, Some(true));
        assert_eq!(update.selected_profile.as_deref(), Some("Classic"));
        assert_eq!(update.capabilities.pressure, Some(true));
        assert_eq!(update.capabilities.dimming, Some(false));
        assert_eq!(update.capabilities.hardware_scale, None);

        let ProcessField::Set(process) = update.process else {
            panic!("Expected process");
        };
        assert!(process.active);
        assert_eq!(process.elapsed_ms, 15000);
        assert_eq!(process.target_type, TargetType::Time);
        assert_eq!(process.label, "Extraction");
    }

    #[test]
    fn test_decode_long_names_and_nested_capabilities() {
        let raw = json!({
            "tp": "evt:status:full",
            "currentTemperature": 20.0,
            "currentWeight": 18.2,
            "mode": 3,
            "cp": true,
            "capabilities": {"hardwareScale": true, "pressure": false, "ledControl": false}
        })
        .to_string();

        let InboundFrame::Status(update) = decode(&raw).unwrap() else {
            panic!("Expected Status frame");
        };
        assert_eq!(update.current_temperature, Some(20.0));
        assert_eq!(update.current_weight, Some(18.2));
        assert_eq!(update.mode, Some(Mode::Water));
        assert_eq!(update.capabilities.hardware_scale, Some(true));
        // nested object wins over the flat key
        assert_eq!(update.capabilities.pressure, Some(false));
        assert_eq!(update.process, ProcessField::Cleared);
    }

    #[test]
    fn test_decode_delta_process_absent_is_unchanged() {
        let update = match decode(r#"{"tp":"evt:status:delta","ct":91.0}"#).unwrap() {
            InboundFrame::Delta(update) => update,
            other => panic!("Expected Delta frame, got {:?}", other),
        };
        assert_eq!(update.process, ProcessField::Unchanged);
        assert_eq!(update.current_temperature, Some(91.0));
        assert_eq!(update.selected_profile, None);
        assert_eq!(update.current_weight, None);
        assert!(update.capabilities.is_empty());
    }

    #[test]
    fn test_decode_delta_process_null_is_cleared() {
        let update = match decode(r#"{"tp":"evt:status:delta","process":null}"#).unwrap() {
            InboundFrame::Delta(update) => update,
            other => panic!("Expected Delta frame, got {:?}", other),
        };
        assert_eq!(update.process, ProcessField::Cleared);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let frame = decode(r#"{"tp":"evt:status:delta","m":2,"newSensor":{"x":1},"zz":[1,2]}"#);
        let InboundFrame::Delta(update) = frame.unwrap() else {
            panic!("Expected Delta frame");
        };
        assert_eq!(update.mode, Some(Mode::Steam));
    }

    #[test]
    fn test_decode_unknown_type_passes_through() {
        let frame = decode(r#"{"tp":"evt:ota-progress","phase":1,"progress":40}"#).unwrap();
        match frame {
            InboundFrame::Other { tp, payload } => {
                assert_eq!(tp, "evt:ota-progress");
                assert_eq!(payload["progress"], 40);
            }
            other => panic!("Expected Other frame, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ping() {
        assert_eq!(
            decode(r#"{"tp":"ping","ts":123456}"#).unwrap(),
            InboundFrame::Ping { ts: Some(123456) }
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode("{not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(decode("[1,2,3]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(
            decode(r#"{"ct": 90}"#),
            Err(DecodeError::MissingType)
        ));
        assert!(matches!(
            decode(r#"{"tp":"evt:status","m":9}"#),
            Err(DecodeError::InvalidFields { .. })
        ));
    }

    #[test]
    fn test_unknown_target_type_keeps_frame() {
        let raw = json!({
            "tp": "evt:status",
            "ct": 92.5,
            "process": {"a": true, "pt": 40, "tt": "distance"}
        })
        .to_string();

        let InboundFrame::Status(update) = decode(&raw).unwrap() else {
            panic!("Expected Status frame");
        };
        assert_eq!(update.current_temperature, Some(92.5));
        let ProcessField::Set(process) = update.process else {
            panic!("Expected process");
        };
        assert!(process.active);
        assert_eq!(process.target_type, TargetType::Unknown);
        assert_eq!(process.progress_total, 40.0);
    }
}
