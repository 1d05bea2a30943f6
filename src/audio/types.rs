//! Audio domain model.
//!
//! These types mirror the host PC's mixer state one-to-one and double as
//! the wire representation inside `AUDIO_STATUS` payloads, so serde
//! renames here are part of the protocol contract.

use serde::{Deserialize, Serialize};

/// Hard cap on sessions per snapshot.
pub const MAX_SESSIONS: usize = 16;

/// Playback state of a host-side audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Active,
    Inactive,
    Expired,
}

/// Direction of a default endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFlow {
    Render,
    Capture,
}

/// Windows-style endpoint role of a default device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRole {
    Console,
    Communications,
    Multimedia,
}

/// Why the host produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotReason {
    UpdateResponse,
    StatusBroadcast,
    DeviceChange,
}

/// One currently-open audio stream on the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "processId")]
    pub process_id: i32,
    #[serde(rename = "processName")]
    pub process_name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// 0.0 ..= 1.0 (validated at the schema boundary).
    pub volume: f32,
    #[serde(rename = "isMuted")]
    pub is_muted: bool,
    pub state: SessionState,
}

/// The host's current default output (or input) device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultDevice {
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    /// 0.0 ..= 1.0 (validated at the schema boundary).
    pub volume: f32,
    #[serde(rename = "isMuted")]
    pub is_muted: bool,
    #[serde(rename = "dataFlow")]
    pub data_flow: DataFlow,
    #[serde(rename = "deviceRole")]
    pub device_role: DeviceRole,
}

/// A complete audio state description produced by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSnapshot {
    pub sessions: Vec<Session>,
    #[serde(
        rename = "defaultDevice",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_device: Option<DefaultDevice>,
    #[serde(rename = "activeSessionCount")]
    pub active_session_count: u32,
    pub reason: SnapshotReason,
    #[serde(rename = "originatingRequestId", default)]
    pub originating_request_id: Option<String>,
    #[serde(rename = "originatingDeviceId", default)]
    pub originating_device_id: Option<String>,
}

impl AudioSnapshot {
    /// Number of sessions whose state is `Active`.
    pub fn count_active(&self) -> u32 {
        self.sessions
            .iter()
            .filter(|s| s.state == SessionState::Active)
            .count() as u32
    }
}

/// The three mixer tabs on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Master,
    Single,
    Balance,
}
