//! Audio state store — the authoritative local mirror.
//!
//! Holds the last host snapshot plus panel-side UI state (active tab,
//! selections, suppression counters) behind a single mutex. Mutation
//! and event dispatch are atomic: listeners run on the mutating task
//! while the lock is held and receive a read-only view of the state,
//! so they observe exactly the state "after this event".
//!
//! Listeners must not call back into store mutators; a reentrancy
//! assertion fires in debug builds if they do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::warn;

use super::types::{AudioSnapshot, DefaultDevice, Session, Tab};

/// One change dimension of the mirror.
///
/// Within a single `apply_snapshot` call, events fire in the order the
/// variants are declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    DevicesUpdated,
    SelectionChanged,
    VolumeChanged,
    MuteChanged,
    TabChanged,
}

/// Read-only view handed to change listeners and getters.
#[derive(Debug, Default)]
pub struct MixerState {
    pub sessions: Vec<Session>,
    pub default_device: Option<DefaultDevice>,
    pub tab: Tab,
    /// Selected session (by process name) on the Single tab.
    pub selected_single: Option<String>,
    pub balance_left: Option<String>,
    pub balance_right: Option<String>,
    suppress_arc: u32,
    suppress_dropdown: u32,
}

impl MixerState {
    pub fn session(&self, process_name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.process_name == process_name)
    }

    fn session_mut(&mut self, process_name: &str) -> Option<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.process_name == process_name)
    }
}

type Listener = Box<dyn FnMut(ChangeEvent, &MixerState) + Send>;

struct StoreInner {
    state: MixerState,
    listeners: Vec<Listener>,
}

/// The store proper. Cheap to share via `Arc`.
pub struct AudioStore {
    inner: Mutex<StoreInner>,
    /// True while listeners are being dispatched (reentrancy guard).
    dispatching: AtomicBool,
}

impl Default for AudioStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                state: MixerState::default(),
                listeners: Vec::new(),
            }),
            dispatching: AtomicBool::new(false),
        }
    }

    /// Install a change listener. Listeners fire on whichever task
    /// mutates the store and must complete quickly without blocking.
    pub fn subscribe(&self, listener: impl FnMut(ChangeEvent, &MixerState) + Send + 'static) {
        self.lock().listeners.push(Box::new(listener));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        debug_assert!(
            !self.dispatching.load(Ordering::Relaxed),
            "store mutated from a change listener"
        );
        match self.inner.lock() {
            Ok(guard) => guard,
            // A panicking listener leaves consistent state; keep going.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn dispatch(&self, inner: &mut StoreInner, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        self.dispatching.store(true, Ordering::Relaxed);
        let StoreInner { state, listeners } = inner;
        for &event in events {
            for listener in listeners.iter_mut() {
                listener(event, state);
            }
        }
        self.dispatching.store(false, Ordering::Relaxed);
    }

    // ── Snapshot application ─────────────────────────────────

    /// Replace the mirrored session list and default device, emitting
    /// one event per changed dimension in fixed order.
    pub fn apply_snapshot(&self, snapshot: &AudioSnapshot) {
        let mut inner = self.lock();
        let mut events: Vec<ChangeEvent> = Vec::with_capacity(4);

        let state = &mut inner.state;

        let devices_changed = session_names_differ(&state.sessions, &snapshot.sessions)
            || device_name_differs(&state.default_device, &snapshot.default_device);
        let volume_changed = any_volume_differs(state, snapshot);
        let mute_changed = any_mute_differs(state, snapshot);

        state.sessions = snapshot.sessions.clone();
        state.default_device = snapshot.default_device.clone();

        // Drop selections whose session disappeared.
        let mut selection_changed = false;
        if let Some(name) = &state.selected_single {
            if state.session(name).is_none() {
                state.selected_single = None;
                selection_changed = true;
            }
        }
        for side in [&mut state.balance_left, &mut state.balance_right] {
            if let Some(name) = side.clone() {
                if !snapshot.sessions.iter().any(|s| s.process_name == name) {
                    *side = None;
                    selection_changed = true;
                }
            }
        }

        if devices_changed {
            events.push(ChangeEvent::DevicesUpdated);
        }
        if selection_changed {
            events.push(ChangeEvent::SelectionChanged);
        }
        if volume_changed {
            events.push(ChangeEvent::VolumeChanged);
        }
        if mute_changed {
            events.push(ChangeEvent::MuteChanged);
        }

        self.dispatch(&mut inner, &events);
    }

    // ── Selection / tab ──────────────────────────────────────

    /// Select a session on the Single tab. Selecting the current
    /// selection is a no-op.
    pub fn select_device(&self, process_name: &str) {
        let mut inner = self.lock();
        if inner.state.selected_single.as_deref() == Some(process_name) {
            return;
        }
        inner.state.selected_single = Some(process_name.to_owned());
        self.dispatch(&mut inner, &[ChangeEvent::SelectionChanged]);
    }

    /// Set both balance selections. The pair must be distinct when both
    /// are present; a violation is fatal to the caller.
    pub fn select_balance(
        &self,
        left: Option<&str>,
        right: Option<&str>,
    ) -> Result<(), &'static str> {
        if let (Some(l), Some(r)) = (left, right) {
            if l == r {
                return Err("balance selections must be distinct");
            }
        }
        let mut inner = self.lock();
        let state = &mut inner.state;
        let new_left = left.map(str::to_owned);
        let new_right = right.map(str::to_owned);
        if state.balance_left == new_left && state.balance_right == new_right {
            return Ok(());
        }
        state.balance_left = new_left;
        state.balance_right = new_right;
        self.dispatch(&mut inner, &[ChangeEvent::SelectionChanged]);
        Ok(())
    }

    pub fn set_tab(&self, tab: Tab) {
        let mut inner = self.lock();
        if inner.state.tab == tab {
            return;
        }
        inner.state.tab = tab;
        self.dispatch(&mut inner, &[ChangeEvent::TabChanged]);
    }

    // ── Local mutation of the selected target ────────────────

    /// Update the mirrored volume for the current tab's target(s).
    /// `volume` is 0.0 ..= 1.0; the outbound command is the
    /// controller's job.
    pub fn set_volume_for_selected(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        let mut inner = self.lock();
        if self.apply_to_selected(&mut inner.state, |s| set_if_differs(s.volume, volume)) {
            self.dispatch(&mut inner, &[ChangeEvent::VolumeChanged]);
        }
    }

    pub fn mute_selected(&self) {
        self.set_mute_selected(true);
    }

    pub fn unmute_selected(&self) {
        self.set_mute_selected(false);
    }

    fn set_mute_selected(&self, muted: bool) {
        let mut inner = self.lock();
        let changed = self.apply_to_selected(&mut inner.state, |s| {
            let differs = *s.muted != muted;
            *s.muted = muted;
            differs
        });
        if changed {
            self.dispatch(&mut inner, &[ChangeEvent::MuteChanged]);
        }
    }

    /// Apply `f` to each target of the current tab; returns whether any
    /// target reported a change.
    fn apply_to_selected(
        &self,
        state: &mut MixerState,
        mut f: impl FnMut(SelectedTarget<'_>) -> bool,
    ) -> bool {
        match state.tab {
            Tab::Master => state
                .default_device
                .as_mut()
                .is_some_and(|d| f(SelectedTarget::device(d))),
            Tab::Single => {
                let Some(name) = state.selected_single.clone() else {
                    warn!("store: mutation with no Single selection");
                    return false;
                };
                state
                    .session_mut(&name)
                    .is_some_and(|s| f(SelectedTarget::session(s)))
            }
            Tab::Balance => {
                let mut changed = false;
                for name in [state.balance_left.clone(), state.balance_right.clone()]
                    .into_iter()
                    .flatten()
                {
                    if let Some(s) = state.session_mut(&name) {
                        changed |= f(SelectedTarget::session(s));
                    }
                }
                changed
            }
        }
    }

    /// Update one mirrored session's volume from a host notification.
    /// Unknown names are ignored (the next snapshot reconciles).
    pub fn update_session_volume(&self, process_name: &str, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        let mut inner = self.lock();
        let changed = inner
            .state
            .session_mut(process_name)
            .is_some_and(|s| set_if_differs(&mut s.volume, volume));
        if changed {
            self.dispatch(&mut inner, &[ChangeEvent::VolumeChanged]);
        }
    }

    // ── Suppression counters ─────────────────────────────────
    //
    // Programmatic UI refreshes overlap, so these are counters, not
    // booleans: an inner bracket must not clear the outer one.

    pub fn set_suppress_arc(&self, on: bool) {
        let mut inner = self.lock();
        adjust_counter(&mut inner.state.suppress_arc, on);
    }

    pub fn set_suppress_dropdown(&self, on: bool) {
        let mut inner = self.lock();
        adjust_counter(&mut inner.state.suppress_dropdown, on);
    }

    pub fn arc_suppressed(&self) -> bool {
        self.lock().state.suppress_arc > 0
    }

    pub fn dropdown_suppressed(&self) -> bool {
        self.lock().state.suppress_dropdown > 0
    }

    // ── Getters ──────────────────────────────────────────────

    pub fn tab(&self) -> Tab {
        self.lock().state.tab
    }

    pub fn selected_single(&self) -> Option<String> {
        self.lock().state.selected_single.clone()
    }

    pub fn balance(&self) -> (Option<String>, Option<String>) {
        let inner = self.lock();
        (
            inner.state.balance_left.clone(),
            inner.state.balance_right.clone(),
        )
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().state.sessions.clone()
    }

    pub fn default_device(&self) -> Option<DefaultDevice> {
        self.lock().state.default_device.clone()
    }

    pub fn session_volume(&self, process_name: &str) -> Option<f32> {
        self.lock().state.session(process_name).map(|s| s.volume)
    }
}

/// Either mutation target behind one accessor pair.
pub struct SelectedTarget<'a> {
    volume: &'a mut f32,
    muted: &'a mut bool,
}

impl<'a> SelectedTarget<'a> {
    fn session(s: &'a mut Session) -> Self {
        Self {
            volume: &mut s.volume,
            muted: &mut s.is_muted,
        }
    }

    fn device(d: &'a mut DefaultDevice) -> Self {
        Self {
            volume: &mut d.volume,
            muted: &mut d.is_muted,
        }
    }
}

fn set_if_differs(slot: &mut f32, value: f32) -> bool {
    if (*slot - value).abs() > f32::EPSILON {
        *slot = value;
        true
    } else {
        false
    }
}

fn adjust_counter(counter: &mut u32, on: bool) {
    if on {
        *counter += 1;
    } else {
        debug_assert!(*counter > 0, "suppression counter underflow");
        *counter = counter.saturating_sub(1);
    }
}

fn session_names_differ(old: &[Session], new: &[Session]) -> bool {
    old.len() != new.len()
        || old
            .iter()
            .zip(new)
            .any(|(a, b)| a.process_name != b.process_name || a.state != b.state)
}

fn device_name_differs(old: &Option<DefaultDevice>, new: &Option<DefaultDevice>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(a), Some(b)) => a.friendly_name != b.friendly_name,
        _ => true,
    }
}

fn any_volume_differs(state: &MixerState, snapshot: &AudioSnapshot) -> bool {
    let session_diff = snapshot.sessions.iter().any(|new| {
        state
            .session(&new.process_name)
            .is_some_and(|old| (old.volume - new.volume).abs() > f32::EPSILON)
    });
    let device_diff = matches!(
        (&state.default_device, &snapshot.default_device),
        (Some(a), Some(b)) if (a.volume - b.volume).abs() > f32::EPSILON
    );
    session_diff || device_diff
}

fn any_mute_differs(state: &MixerState, snapshot: &AudioSnapshot) -> bool {
    let session_diff = snapshot.sessions.iter().any(|new| {
        state
            .session(&new.process_name)
            .is_some_and(|old| old.is_muted != new.is_muted)
    });
    let device_diff = matches!(
        (&state.default_device, &snapshot.default_device),
        (Some(a), Some(b)) if a.is_muted != b.is_muted
    );
    session_diff || device_diff
}
