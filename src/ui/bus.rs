//! UI update bus — bounded intent queue into the UI task.
//!
//! Every task may post; only the UI task drains, once per GUI tick.
//! Intents carry logical widget ids and small inline values (strings
//! capped at 128 bytes) — raw widget handles never leave the UI task.
//!
//! Overflow policy: when the queue is full the oldest unobserved intent
//! is dropped and a counter bumped. A stale intent is always superseded
//! by the newer state that caused the overflow.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::audio::types::Tab;

/// Inline string payload for intents.
pub type UiText = heapless::String<128>;

/// Build a [`UiText`], truncating on a char boundary if needed.
pub fn ui_text(s: &str) -> UiText {
    let mut out = UiText::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Logical dropdown widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropdownId {
    Single,
    BalanceLeft,
    BalanceRight,
}

/// Logical screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenId {
    Main,
    Fault,
}

/// Logical status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Ok,
    Warn,
    Error,
}

/// One coarse UI update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiIntent {
    SetLabelText { label: LabelId, text: UiText },
    SetVolumeSlider { tab: Tab, percent: u8 },
    SetMuteIndicator { tab: Tab, muted: bool },
    /// Newline-separated option list, one dropdown's full contents.
    SetDropdownOptions { dropdown: DropdownId, options: UiText },
    /// `None` clears the highlight (nothing selected).
    SetDropdownSelection { dropdown: DropdownId, index: Option<u16> },
    SetStatusColor { color: StatusColor },
    SetLogoSource { path: UiText },
    ShowBootProgress { pct: u8, text: UiText },
    HideBootScreen,
    SwitchScreen { screen: ScreenId },
}

/// Logical labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelId {
    DeviceName,
    SelectionName,
    ConnectionStatus,
    FaultTitle,
    FaultMessage,
    FaultDetail,
    FaultBuild,
}

/// Queue depth. Sized for the worst observed burst (full snapshot
/// refresh across all three tabs).
pub const UI_QUEUE_DEPTH: usize = 32;

static UI_CHANNEL: Channel<CriticalSectionRawMutex, UiIntent, UI_QUEUE_DEPTH> = Channel::new();
static UI_DROPPED: AtomicU32 = AtomicU32::new(0);

/// Post an intent from any task. Never blocks; drops the oldest queued
/// intent when full.
pub fn post(intent: UiIntent) {
    let mut pending = intent;
    loop {
        match UI_CHANNEL.try_send(pending) {
            Ok(()) => return,
            Err(embassy_sync::channel::TrySendError::Full(rejected)) => {
                if UI_CHANNEL.try_receive().is_ok() {
                    UI_DROPPED.fetch_add(1, Ordering::Relaxed);
                }
                pending = rejected;
            }
        }
    }
}

/// Drain one intent; UI task only.
pub fn try_next() -> Option<UiIntent> {
    UI_CHANNEL.try_receive().ok()
}

/// Cumulative count of intents dropped to overflow.
pub fn dropped() -> u32 {
    UI_DROPPED.load(Ordering::Relaxed)
}

#[cfg(test)]
pub(crate) fn drain_for_test() {
    while UI_CHANNEL.try_receive().is_ok() {}
}

/// The bus is a process-wide static; tests that touch it serialize on
/// this lock.
#[cfg(test)]
pub(crate) static BUS_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
