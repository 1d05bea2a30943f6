//! Thread placement on the two ESP32-S3 cores.
//!
//! ESP-IDF backs `std::thread` with FreeRTOS tasks through its pthread
//! layer. `esp_pthread_set_cfg()` stages attributes (core affinity,
//! priority, stack size) that apply to the *next* `pthread_create()`
//! from the calling thread, so each spawn stages its own config right
//! before creating the thread and must not interleave with other
//! thread creation.
//!
//! On the host there is no affinity; specs degrade to named threads
//! with the requested stack size.

/// The two cores and what this firmware runs on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core {
    /// PRO_CPU (core 0) — serial link I/O.
    LinkIo,
    /// APP_CPU (core 1) — GUI task.
    Gui,
}

impl Core {
    #[cfg(target_os = "espidf")]
    fn index(self) -> i32 {
        match self {
            Self::LinkIo => 0,
            Self::Gui => 1,
        }
    }
}

/// Placement and sizing for one firmware thread.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSpec {
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
    /// FreeRTOS task name; must carry a trailing NUL (e.g. `"ui\0"`).
    pub name: &'static str,
}

impl ThreadSpec {
    pub const fn new(core: Core, priority: u8, stack_kb: usize, name: &'static str) -> Self {
        Self {
            core,
            priority,
            stack_kb,
            name,
        }
    }

    /// Spawn `f` on the configured core. Thread creation failure at
    /// boot is unrecoverable, so this panics rather than propagating.
    pub fn spawn(self, f: impl FnOnce() + Send + 'static) -> std::thread::JoinHandle<()> {
        #[cfg(target_os = "espidf")]
        self.stage_pthread_cfg();

        let label = self.name.trim_end_matches('\0');
        log::info!(
            "thread '{label}': {:?}, prio {}, {} KiB stack",
            self.core,
            self.priority,
            self.stack_kb
        );

        let builder = std::thread::Builder::new().name(label.to_owned());
        #[cfg(not(target_os = "espidf"))]
        let builder = builder.stack_size(self.stack_kb * 1024);
        match builder.spawn(f) {
            Ok(handle) => handle,
            Err(e) => panic!("failed to spawn '{label}': {e}"),
        }
    }

    #[cfg(target_os = "espidf")]
    fn stage_pthread_cfg(&self) {
        use esp_idf_sys as sys;
        unsafe {
            let mut cfg = sys::esp_create_default_pthread_config();
            cfg.pin_to_core = self.core.index();
            cfg.prio = i32::from(self.priority);
            cfg.stack_size = (self.stack_kb * 1024) as i32;
            cfg.thread_name = self.name.as_ptr().cast();
            let ret = sys::esp_pthread_set_cfg(&cfg);
            assert!(ret == sys::ESP_OK as i32, "esp_pthread_set_cfg: {ret}");
        }
    }
}
