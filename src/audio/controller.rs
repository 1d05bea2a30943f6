//! Audio controller — glue between UI gestures, the store, and the wire.
//!
//! Gesture entry points run on the UI task; inbound message handlers
//! run on the link task. Both sides funnel through the store, and store
//! change events are reconciled into coarse UI intents on the bus.
//! Widget handles never appear here.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::warn;

use crate::link::engine::CommandSink;
use crate::link::message::{Message, MessageKind, Payload};
use crate::link::router::MessageRouter;
use crate::ui::bus::{self, ui_text, DropdownId, LabelId, StatusColor, UiIntent};

use super::store::{AudioStore, ChangeEvent, MixerState};
use super::types::Tab;

/// Which balance dropdown a gesture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceSide {
    Left,
    Right,
}

pub struct AudioController {
    store: Arc<AudioStore>,
    sink: Arc<dyn CommandSink>,
    device_id: &'static str,
    request_seq: AtomicU32,
}

impl AudioController {
    pub fn new(
        store: Arc<AudioStore>,
        sink: Arc<dyn CommandSink>,
        device_id: &'static str,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            sink,
            device_id,
            request_seq: AtomicU32::new(1),
        })
    }

    pub fn store(&self) -> &Arc<AudioStore> {
        &self.store
    }

    fn next_request_id(&self) -> String {
        let n = self.request_seq.fetch_add(1, Ordering::Relaxed);
        format!("req-{n}")
    }

    fn send(&self, payload: Payload) {
        let msg = Message::new(payload, self.device_id, crate::drivers::time::uptime_ms())
            .with_request_id(&self.next_request_id());
        if let Err(e) = self.sink.send_command(&msg) {
            // Recoverable; the next snapshot resynchronises us.
            warn!("controller: dropped {}: {e}", msg.kind().wire_name());
        }
    }

    // ── Wiring ───────────────────────────────────────────────

    /// Subscribe inbound message handlers. Called once at init, before
    /// the link engine starts.
    pub fn attach(self: &Arc<Self>, router: &mut MessageRouter) {
        let me = self.clone();
        router.subscribe(MessageKind::AudioStatus, move |msg| {
            if let Payload::AudioStatus(snapshot) = &msg.payload {
                me.store.apply_snapshot(snapshot);
            }
        });

        let me = self.clone();
        router.subscribe(MessageKind::VolumeChange, move |msg| {
            if let Payload::VolumeChange {
                process_name,
                volume,
                ..
            } = &msg.payload
            {
                me.store
                    .update_session_volume(process_name, f32::from(*volume) / 100.0);
            }
        });
    }

    /// Subscribe the store-to-UI reconciler. Called once at init.
    pub fn install_store_listener(self: &Arc<Self>) {
        self.store.subscribe(|event, state| reconcile(event, state));
    }

    /// Ask the host for a full snapshot (boot and reconnect).
    pub fn request_status(&self) {
        self.send(Payload::GetStatus);
    }

    // ── UI gestures (called from the UI task) ────────────────

    /// Volume slider moved to `percent`. Ignored while a programmatic
    /// slider update is in flight.
    pub fn on_volume_gesture(&self, percent: u8) {
        if self.store.arc_suppressed() {
            return;
        }
        let percent = percent.min(100);
        self.store
            .set_volume_for_selected(f32::from(percent) / 100.0);
        for process_name in self.command_targets() {
            self.send(Payload::SetVolume {
                process_name,
                volume: percent,
                target: "default".to_owned(),
            });
        }
    }

    /// Mute button pressed: toggle the current target(s).
    pub fn on_mute_gesture(&self) {
        if self.currently_muted() {
            self.store.unmute_selected();
        } else {
            self.store.mute_selected();
        }
        for process_name in self.command_targets() {
            self.send(Payload::MuteToggle { process_name });
        }
    }

    /// Single-tab dropdown changed. Selection is panel-local state;
    /// nothing goes on the wire.
    pub fn on_session_selected(&self, process_name: &str) {
        if self.store.dropdown_suppressed() {
            return;
        }
        self.store.select_device(process_name);
    }

    /// Balance dropdown changed. Picking the partner's current session
    /// clears the partner first; no outbound message either way.
    pub fn on_balance_selected(&self, side: BalanceSide, process_name: &str) {
        if self.store.dropdown_suppressed() {
            return;
        }
        let (left, right) = self.store.balance();
        let (left, right) = match side {
            BalanceSide::Left => {
                let right = right.filter(|r| r.as_str() != process_name);
                (Some(process_name.to_owned()), right)
            }
            BalanceSide::Right => {
                let left = left.filter(|l| l.as_str() != process_name);
                (left, Some(process_name.to_owned()))
            }
        };
        if let Err(e) = self.store.select_balance(left.as_deref(), right.as_deref()) {
            // Unreachable given the filtering above; never masked.
            crate::fault::raise(e, file!(), line!());
        }
    }

    pub fn on_tab_selected(&self, tab: Tab) {
        self.store.set_tab(tab);
    }

    /// Default-device dropdown changed: ask the host to switch.
    pub fn on_default_device_selected(&self, friendly_name: &str) {
        if self.store.dropdown_suppressed() {
            return;
        }
        self.send(Payload::SetDefaultDevice {
            friendly_name: friendly_name.to_owned(),
        });
    }

    // ── Target resolution ────────────────────────────────────

    /// Wire targets for the current tab. Empty process name addresses
    /// the default device.
    fn command_targets(&self) -> Vec<String> {
        match self.store.tab() {
            Tab::Master => vec![String::new()],
            Tab::Single => match self.store.selected_single() {
                Some(name) => vec![name],
                None => Vec::new(),
            },
            Tab::Balance => {
                let (l, r) = self.store.balance();
                l.into_iter().chain(r).collect()
            }
        }
    }

    fn currently_muted(&self) -> bool {
        match self.store.tab() {
            Tab::Master => self.store.default_device().is_some_and(|d| d.is_muted),
            Tab::Single => self
                .store
                .selected_single()
                .and_then(|name| {
                    self.store
                        .sessions()
                        .into_iter()
                        .find(|s| s.process_name == name)
                })
                .is_some_and(|s| s.is_muted),
            Tab::Balance => {
                let (l, r) = self.store.balance();
                let sessions = self.store.sessions();
                [l, r].into_iter().flatten().all(|name| {
                    sessions
                        .iter()
                        .find(|s| s.process_name == name)
                        .is_some_and(|s| s.is_muted)
                })
            }
        }
    }
}

// ── Store → UI reconciliation ────────────────────────────────
//
// Runs on whichever task mutated the store, with the store lock held;
// it only reads the provided view and posts intents.

fn reconcile(event: ChangeEvent, state: &MixerState) {
    match event {
        ChangeEvent::DevicesUpdated => {
            let options = dropdown_options(state);
            for dropdown in [
                DropdownId::Single,
                DropdownId::BalanceLeft,
                DropdownId::BalanceRight,
            ] {
                bus::post(UiIntent::SetDropdownOptions {
                    dropdown,
                    options: options.clone(),
                });
            }
            let device = state
                .default_device
                .as_ref()
                .map_or("(no device)", |d| d.friendly_name.as_str());
            bus::post(UiIntent::SetLabelText {
                label: LabelId::DeviceName,
                text: ui_text(device),
            });
            bus::post(UiIntent::SetLabelText {
                label: LabelId::ConnectionStatus,
                text: ui_text("Connected"),
            });
            bus::post(UiIntent::SetStatusColor {
                color: StatusColor::Ok,
            });
        }
        ChangeEvent::SelectionChanged => {
            post_selection(DropdownId::Single, state, state.selected_single.as_deref());
            post_selection(
                DropdownId::BalanceLeft,
                state,
                state.balance_left.as_deref(),
            );
            post_selection(
                DropdownId::BalanceRight,
                state,
                state.balance_right.as_deref(),
            );
            let name = state
                .selected_single
                .as_deref()
                .and_then(|n| state.session(n))
                .map_or("(none)", |s| s.display_name.as_str());
            bus::post(UiIntent::SetLabelText {
                label: LabelId::SelectionName,
                text: ui_text(name),
            });
        }
        ChangeEvent::VolumeChanged | ChangeEvent::TabChanged => {
            bus::post(UiIntent::SetVolumeSlider {
                tab: state.tab,
                percent: tab_volume_percent(state),
            });
            if event == ChangeEvent::TabChanged {
                bus::post(UiIntent::SetMuteIndicator {
                    tab: state.tab,
                    muted: tab_muted(state),
                });
            }
        }
        ChangeEvent::MuteChanged => {
            bus::post(UiIntent::SetMuteIndicator {
                tab: state.tab,
                muted: tab_muted(state),
            });
        }
    }
}

fn dropdown_options(state: &MixerState) -> bus::UiText {
    let mut text = bus::UiText::new();
    for (i, session) in state.sessions.iter().enumerate() {
        if i > 0 && text.push('\n').is_err() {
            break;
        }
        for ch in session.display_name.chars() {
            if text.push(ch).is_err() {
                return text;
            }
        }
    }
    text
}

fn post_selection(dropdown: DropdownId, state: &MixerState, selected: Option<&str>) {
    let index = selected
        .and_then(|name| state.sessions.iter().position(|s| s.process_name == name))
        .map(|i| i as u16);
    bus::post(UiIntent::SetDropdownSelection { dropdown, index });
}

fn tab_volume_percent(state: &MixerState) -> u8 {
    let volume = match state.tab {
        Tab::Master => state.default_device.as_ref().map(|d| d.volume),
        Tab::Single => state
            .selected_single
            .as_deref()
            .and_then(|n| state.session(n))
            .map(|s| s.volume),
        Tab::Balance => state
            .balance_left
            .as_deref()
            .and_then(|n| state.session(n))
            .map(|s| s.volume),
    };
    (volume.unwrap_or(0.0) * 100.0).round() as u8
}

fn tab_muted(state: &MixerState) -> bool {
    match state.tab {
        Tab::Master => state.default_device.as_ref().is_some_and(|d| d.is_muted),
        Tab::Single => state
            .selected_single
            .as_deref()
            .and_then(|n| state.session(n))
            .is_some_and(|s| s.is_muted),
        Tab::Balance => {
            let sides = [state.balance_left.as_deref(), state.balance_right.as_deref()];
            sides
                .into_iter()
                .flatten()
                .all(|n| state.session(n).is_some_and(|s| s.is_muted))
        }
    }
}
