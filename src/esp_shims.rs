//! Symbol providers required by third-party crates on the device.
//!
//! `embassy-sync`'s `CriticalSectionRawMutex` lowers to the
//! `critical-section` 1.x ABI, which ships no ESP-IDF std backend.
//! These exports back it with a process-wide pthread mutex plus a
//! per-thread nesting count, so re-acquiring inside a held section is
//! legal. Host builds enable `critical-section/std` and never link
//! these.

#![cfg(target_os = "espidf")]

use core::cell::RefCell;
use std::sync::{Mutex, MutexGuard};

static SECTION: Mutex<()> = Mutex::new(());

struct ThreadState {
    nesting: u8,
    held: Option<MutexGuard<'static, ()>>,
}

thread_local! {
    static STATE: RefCell<ThreadState> = const {
        RefCell::new(ThreadState { nesting: 0, held: None })
    };
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.nesting == 0 {
            // A poisoned section is still a held section; take it over.
            let guard = match SECTION.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.held = Some(guard);
        }
        state.nesting = state.nesting.saturating_add(1);
        state.nesting
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        match state.nesting {
            0 => {}
            1 => {
                state.nesting = 0;
                state.held = None;
            }
            n => state.nesting = n - 1,
        }
    })
}
