//! Typed message schema and JSON (de)serializer.
//!
//! Frame payloads are UTF-8 JSON with a top-level `type` discriminator.
//! The serializer emits fields in declared order, so the same logical
//! message always produces byte-identical output — host-side tooling
//! round-trips against this. Validation happens at the schema boundary:
//! out-of-range volumes, oversize strings, and inconsistent snapshots
//! are rejected, never silently repaired.

use serde::{Deserialize, Serialize};

use crate::audio::types::{AudioSnapshot, MAX_SESSIONS};

/// Longest `deviceId` / `requestId` / process name accepted on the wire.
pub const MAX_ID_LEN: usize = 63;

/// Longest default-device friendly name accepted on the wire.
pub const MAX_DEVICE_NAME_LEN: usize = 127;

/// Longest asset error message accepted on the wire.
pub const MAX_ERROR_LEN: usize = 127;

// ── Message kinds ────────────────────────────────────────────

/// Every wire message type, in a fixed order usable as a table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum MessageKind {
    AudioStatus = 0,
    VolumeChange = 1,
    MuteToggle = 2,
    AssetRequest = 3,
    AssetResponse = 4,
    GetStatus = 5,
    SetVolume = 6,
    SetDefaultDevice = 7,
}

/// Number of message kinds (router table size).
pub const KIND_COUNT: usize = 8;

impl MessageKind {
    pub const ALL: [MessageKind; KIND_COUNT] = [
        MessageKind::AudioStatus,
        MessageKind::VolumeChange,
        MessageKind::MuteToggle,
        MessageKind::AssetRequest,
        MessageKind::AssetResponse,
        MessageKind::GetStatus,
        MessageKind::SetVolume,
        MessageKind::SetDefaultDevice,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::AudioStatus => "AUDIO_STATUS",
            Self::VolumeChange => "VOLUME_CHANGE",
            Self::MuteToggle => "MUTE_TOGGLE",
            Self::AssetRequest => "ASSET_REQUEST",
            Self::AssetResponse => "ASSET_RESPONSE",
            Self::GetStatus => "GET_STATUS",
            Self::SetVolume => "SET_VOLUME",
            Self::SetDefaultDevice => "SET_DEFAULT_DEVICE",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.wire_name() == name)
    }
}

// ── Payload variants ─────────────────────────────────────────

/// Variant payload; the `type` tag is part of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    #[serde(rename = "AUDIO_STATUS")]
    AudioStatus(AudioSnapshot),

    /// Host-side notification of a volume change (integer percent).
    #[serde(rename = "VOLUME_CHANGE")]
    VolumeChange {
        #[serde(rename = "processName")]
        process_name: String,
        volume: u8,
        target: String,
    },

    /// Toggle mute; empty `processName` targets the default device.
    #[serde(rename = "MUTE_TOGGLE")]
    MuteToggle {
        #[serde(rename = "processName", default)]
        process_name: String,
    },

    #[serde(rename = "ASSET_REQUEST")]
    AssetRequest {
        #[serde(rename = "processName")]
        process_name: String,
    },

    #[serde(rename = "ASSET_RESPONSE")]
    AssetResponse {
        #[serde(rename = "processName")]
        process_name: String,
        success: bool,
        #[serde(rename = "errorMessage", default)]
        error_message: String,
        #[serde(rename = "assetDataBase64", default)]
        asset_data_base64: Option<String>,
        #[serde(default)]
        width: u32,
        #[serde(default)]
        height: u32,
        #[serde(default)]
        format: String,
    },

    #[serde(rename = "GET_STATUS")]
    GetStatus,

    /// Device-originated volume command (integer percent).
    #[serde(rename = "SET_VOLUME")]
    SetVolume {
        #[serde(rename = "processName")]
        process_name: String,
        volume: u8,
        target: String,
    },

    #[serde(rename = "SET_DEFAULT_DEVICE")]
    SetDefaultDevice {
        #[serde(rename = "friendlyName")]
        friendly_name: String,
    },
}

impl Payload {
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::AudioStatus(_) => MessageKind::AudioStatus,
            Self::VolumeChange { .. } => MessageKind::VolumeChange,
            Self::MuteToggle { .. } => MessageKind::MuteToggle,
            Self::AssetRequest { .. } => MessageKind::AssetRequest,
            Self::AssetResponse { .. } => MessageKind::AssetResponse,
            Self::GetStatus => MessageKind::GetStatus,
            Self::SetVolume { .. } => MessageKind::SetVolume,
            Self::SetDefaultDevice { .. } => MessageKind::SetDefaultDevice,
        }
    }
}

// ── Message envelope ─────────────────────────────────────────

/// One wire (and in-process) message: variant payload plus the fields
/// every message carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "requestId", default)]
    pub request_id: String,
    /// Milliseconds since boot of the sender.
    pub timestamp: u32,
}

impl Message {
    pub fn new(payload: Payload, device_id: &str, timestamp: u32) -> Self {
        Self {
            payload,
            device_id: device_id.to_owned(),
            request_id: String::new(),
            timestamp,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = request_id.to_owned();
        self
    }

    pub const fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Serialize to the canonical wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, SchemaError> {
        serde_json::to_vec(self).map_err(|_| SchemaError::Serialize)
    }

    /// Parse and validate a frame payload.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SchemaError> {
        // Probe the discriminator first so an unknown `type` is
        // distinguishable from a malformed variant body.
        let probe: TypeProbe =
            serde_json::from_slice(bytes).map_err(|_| SchemaError::Parse)?;
        if MessageKind::from_wire(&probe.kind).is_none() {
            return Err(SchemaError::UnknownType);
        }

        let msg: Message = serde_json::from_slice(bytes).map_err(|_| SchemaError::Parse)?;
        msg.validate()?;
        Ok(msg)
    }

    /// Boundary validation; wire values outside the schema are rejected,
    /// not saturated.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.device_id.len() > MAX_ID_LEN {
            return Err(SchemaError::Invalid("deviceId too long"));
        }
        if self.request_id.len() > MAX_ID_LEN {
            return Err(SchemaError::Invalid("requestId too long"));
        }

        match &self.payload {
            Payload::AudioStatus(snapshot) => validate_snapshot(snapshot),
            Payload::VolumeChange {
                process_name,
                volume,
                ..
            }
            | Payload::SetVolume {
                process_name,
                volume,
                ..
            } => {
                check_name(process_name)?;
                if *volume > 100 {
                    return Err(SchemaError::Invalid("volume percent out of range"));
                }
                Ok(())
            }
            Payload::MuteToggle { process_name } | Payload::AssetRequest { process_name } => {
                check_name(process_name)
            }
            Payload::AssetResponse {
                process_name,
                success,
                error_message,
                asset_data_base64,
                ..
            } => {
                check_name(process_name)?;
                if error_message.len() > MAX_ERROR_LEN {
                    return Err(SchemaError::Invalid("errorMessage too long"));
                }
                let has_data = asset_data_base64.as_ref().is_some_and(|d| !d.is_empty());
                // Invariant: success with data and no error, or failure
                // with an error and no data. Never partial.
                if *success && (!has_data || !error_message.is_empty()) {
                    return Err(SchemaError::Invalid("partial asset response"));
                }
                if !*success && (has_data || error_message.is_empty()) {
                    return Err(SchemaError::Invalid("partial asset response"));
                }
                Ok(())
            }
            Payload::GetStatus => Ok(()),
            Payload::SetDefaultDevice { friendly_name } => {
                if friendly_name.is_empty() || friendly_name.len() > MAX_DEVICE_NAME_LEN {
                    return Err(SchemaError::Invalid("friendlyName length"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Deserialize)]
struct TypeProbe {
    #[serde(rename = "type")]
    kind: String,
}

fn check_name(name: &str) -> Result<(), SchemaError> {
    if name.len() > MAX_ID_LEN {
        return Err(SchemaError::Invalid("processName too long"));
    }
    Ok(())
}

fn validate_snapshot(snapshot: &AudioSnapshot) -> Result<(), SchemaError> {
    if snapshot.sessions.len() > MAX_SESSIONS {
        return Err(SchemaError::Invalid("too many sessions"));
    }
    for (i, s) in snapshot.sessions.iter().enumerate() {
        if s.process_name.len() > MAX_ID_LEN || s.display_name.len() > MAX_ID_LEN {
            return Err(SchemaError::Invalid("session name too long"));
        }
        if !(0.0..=1.0).contains(&s.volume) {
            return Err(SchemaError::Invalid("session volume out of range"));
        }
        if snapshot.sessions[..i].iter().any(|p| p.process_id == s.process_id) {
            return Err(SchemaError::Invalid("duplicate session processId"));
        }
    }
    if let Some(dev) = &snapshot.default_device {
        if dev.friendly_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(SchemaError::Invalid("device name too long"));
        }
        if !(0.0..=1.0).contains(&dev.volume) {
            return Err(SchemaError::Invalid("device volume out of range"));
        }
    }
    if snapshot.active_session_count != snapshot.count_active() {
        return Err(SchemaError::Invalid("activeSessionCount mismatch"));
    }
    if let Some(rid) = &snapshot.originating_request_id {
        if rid.len() > MAX_ID_LEN {
            return Err(SchemaError::Invalid("originatingRequestId too long"));
        }
    }
    Ok(())
}

// ── Errors ───────────────────────────────────────────────────

/// Schema-boundary failures. Messages that fail here are dropped and
/// counted; they never reach the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaError {
    /// Not valid JSON, or a known `type` with a malformed body.
    Parse,
    /// `type` is not one of the eight wire literals.
    UnknownType,
    /// A field failed range / length / consistency validation.
    Invalid(&'static str),
    /// Serialization failed (should not happen for validated messages).
    Serialize,
}

impl core::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Parse => write!(f, "malformed message"),
            Self::UnknownType => write!(f, "unknown message type"),
            Self::Invalid(what) => write!(f, "invalid field: {what}"),
            Self::Serialize => write!(f, "serialize failed"),
        }
    }
}
