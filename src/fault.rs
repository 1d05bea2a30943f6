//! Fault surface: boot progress and the terminal fault screen.
//!
//! Both screens live outside the normal GUI graph. Boot progress is
//! driven through the UI bus like everything else; the terminal fault
//! takes over the toolkit directly — once it is up, nothing else will
//! ever touch the display again.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::error;

use crate::ui::bus::{self, ui_text, LabelId, ScreenId, UiIntent};
use crate::ui::toolkit::UiToolkit;

// ── Boot progress ────────────────────────────────────────────

/// Driver for the boot splash. Construct once in `main`, feed it
/// through startup, hide it when the main screen is ready.
pub struct BootScreen {
    pct: Cell<u8>,
}

impl BootScreen {
    pub fn new() -> Self {
        Self { pct: Cell::new(0) }
    }

    /// Update the status line without moving the bar.
    pub fn update_status(&self, text: &str) {
        bus::post(UiIntent::ShowBootProgress {
            pct: self.pct.get(),
            text: ui_text(text),
        });
    }

    pub fn update_progress(&self, pct: u8, text: &str) {
        let pct = pct.min(100);
        self.pct.set(pct);
        bus::post(UiIntent::ShowBootProgress {
            pct,
            text: ui_text(text),
        });
    }

    pub fn hide(self) {
        bus::post(UiIntent::SwitchScreen {
            screen: ScreenId::Main,
        });
        bus::post(UiIntent::HideBootScreen);
    }
}

impl Default for BootScreen {
    fn default() -> Self {
        Self::new()
    }
}

// ── Terminal fault ───────────────────────────────────────────

/// What the terminal screen displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRecord {
    pub message: heapless::String<96>,
    pub file: &'static str,
    pub line: u32,
}

static ACTIVE: AtomicBool = AtomicBool::new(false);
static RECORD: Mutex<Option<FaultRecord>> = Mutex::new(None);

/// Declare a terminal fault. The first call wins and is never masked;
/// later calls log and return (the screen is already owned by the
/// first fault). The UI task picks the record up on its next tick.
pub fn raise(message: &str, file: &'static str, line: u32) {
    let mut text = heapless::String::new();
    for ch in message.chars() {
        if text.push(ch).is_err() {
            break;
        }
    }
    error!("FAULT at {file}:{line}: {message}");

    if ACTIVE.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Ok(mut record) = RECORD.lock() {
        *record = Some(FaultRecord {
            message: text,
            file,
            line,
        });
    }
}

/// True once any fault has been raised.
pub fn is_active() -> bool {
    ACTIVE.load(Ordering::SeqCst)
}

/// Current record, if a fault has been raised.
pub fn record() -> Option<FaultRecord> {
    RECORD.lock().ok().and_then(|r| r.clone())
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    ACTIVE.store(false, Ordering::SeqCst);
    if let Ok(mut record) = RECORD.lock() {
        *record = None;
    }
}

/// Paint the terminal screen. Split out of [`run_terminal`] so tests
/// can assert on the rendered content.
pub fn render<T: UiToolkit>(toolkit: &mut T, record: &FaultRecord) {
    toolkit.switch_screen(ScreenId::Fault);
    toolkit.set_label_text(LabelId::FaultTitle, "SYSTEM FAULT");
    toolkit.set_label_text(LabelId::FaultMessage, &record.message);
    let detail = format!("{}:{}", record.file, record.line);
    toolkit.set_label_text(LabelId::FaultDetail, &detail);
    let build = format!(
        "mixdeck v{} — power-cycle the device to restart",
        env!("CARGO_PKG_VERSION")
    );
    toolkit.set_label_text(LabelId::FaultBuild, &build);
}

/// Take over the display forever. Disables the watchdog first so the
/// tick-only loop below cannot be rebooted out from under the user.
pub fn run_terminal<T: UiToolkit>(toolkit: &mut T, record: &FaultRecord) -> ! {
    crate::drivers::watchdog::disable();
    render(toolkit, record);
    loop {
        toolkit.tick();
        std::thread::sleep(core::time::Duration::from_millis(50));
    }
}
