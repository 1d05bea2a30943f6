//! Task watchdog (TWDT) wrapper.
//!
//! The housekeeping loop subscribes once at boot and feeds at 1 Hz; a
//! stall longer than [`TIMEOUT_MS`] panics the chip into a reset. The
//! terminal fault path calls [`disable`] so the error screen survives
//! the stalled loop instead of being rebooted away.

/// TWDT expiry. Feeding happens every second, so this leaves a wide
/// margin for slow SD operations.
pub const TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

#[cfg(target_os = "espidf")]
impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new() -> Self {
        use esp_idf_svc::sys::*;
        let subscribed = unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms: TIMEOUT_MS,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            if esp_task_wdt_reconfigure(&cfg) != ESP_OK {
                // The IDF may have configured it already; subscribing
                // to the existing instance still works.
                log::warn!("watchdog: reconfigure rejected, reusing existing timeout");
            }
            esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK
        };
        if subscribed {
            log::info!("watchdog armed: {TIMEOUT_MS} ms, panic on expiry");
        } else {
            log::warn!("watchdog subscription failed; loop runs unprotected");
        }
        Self { subscribed }
    }

    pub fn feed(&self) {
        if self.subscribed {
            unsafe {
                esp_idf_svc::sys::esp_task_wdt_reset();
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Watchdog {
    pub fn new() -> Self {
        log::info!("watchdog: simulated, never fires");
        Self {}
    }

    pub fn feed(&self) {}
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribe the calling task and shut the TWDT down entirely. Only
/// the terminal fault path calls this.
pub fn disable() {
    #[cfg(target_os = "espidf")]
    unsafe {
        use esp_idf_svc::sys::*;
        let _ = esp_task_wdt_delete(core::ptr::null_mut());
        let _ = esp_task_wdt_deinit();
    }
    #[cfg(not(target_os = "espidf"))]
    log::warn!("watchdog: disabled (sim)");
}
