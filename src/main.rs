//! MixDeck Firmware — Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Core 0 (PRO)                    Core 1 (APP)                │
//! │  ┌──────────────────────┐        ┌────────────────────────┐  │
//! │  │ link-io task         │  UI    │ ui task                │  │
//! │  │ UART ⇄ frames ⇄ JSON │  bus   │ drains intents, ticks  │  │
//! │  │ router → store/cache │ ─────▶ │ the GUI toolkit        │  │
//! │  └──────────────────────┘        └────────────────────────┘  │
//! │            main thread: boot steps + housekeeping            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failed boot step raises a terminal fault naming the step; the
//! UI task renders it and the device stays up for inspection instead
//! of reboot-looping.

#![deny(unused_must_use)]

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::info;

use mixdeck::audio::controller::AudioController;
use mixdeck::audio::store::{AudioStore, ChangeEvent};
use mixdeck::config::SystemConfig;
use mixdeck::drivers::watchdog::Watchdog;
use mixdeck::fault::BootScreen;
use mixdeck::link::engine::{LinkCommandSink, SerialEngine};
use mixdeck::link::router::MessageRouter;
use mixdeck::ui::bus::{self, LabelId, StatusColor, UiIntent};
use mixdeck::ui::task::UiTask;
use mixdeck::{assets, diagnostics, drivers, fault, ui};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    esp_idf_svc::sys::link_patches();
    #[cfg(target_os = "espidf")]
    esp_idf_logger::init()?;
    #[cfg(not(target_os = "espidf"))]
    env_logger_fallback();

    info!("╔══════════════════════════════════════╗");
    info!("║  MixDeck v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();
    let watchdog = Watchdog::new();
    let config = SystemConfig::default();

    // ── 2. UI task first: boot progress needs a live display ──
    let store = Arc::new(AudioStore::new());
    let running = Arc::new(AtomicBool::new(true));
    // The vendor display binding implements `UiToolkit`; selected here
    // at the single seam the rest of the firmware sees.
    let toolkit = ui::toolkit::HeadlessToolkit::new();
    let _ui_handle = ui::task::spawn(
        UiTask::new(toolkit, store.clone()),
        running.clone(),
        config.ui_tick_ms,
    );

    let boot = BootScreen::new();
    boot.update_progress(10, "Mounting storage");

    // ── 3. SD card / logo directory ───────────────────────────
    let Ok(logo_fs) = drivers::sd::mount_logo_fs() else {
        halt_with_fault("boot step failed: sd mount");
    };
    boot.update_status("Storage ready");

    boot.update_progress(30, "Starting serial link");

    // ── 4. Serial transport ───────────────────────────────────
    #[cfg(target_os = "espidf")]
    let transport = {
        let Ok(peripherals) = esp_idf_hal::peripherals::Peripherals::take() else {
            halt_with_fault("boot step failed: peripherals");
        };
        match drivers::uart::UartTransport::new(
            peripherals.uart1,
            peripherals.pins.gpio17.into(),
            peripherals.pins.gpio18.into(),
            config.baud_rate,
            config.rx_ring_bytes,
            config.tx_buffer_bytes,
        ) {
            Ok(t) => t,
            Err(_) => halt_with_fault("boot step failed: uart init"),
        }
    };
    #[cfg(not(target_os = "espidf"))]
    let transport = mixdeck::link::transport::NullTransport;

    let mut engine = SerialEngine::new(transport, config.stop_drain_ms);
    let sink = Arc::new(LinkCommandSink::new(engine.tx(), config.tx_deadline_ms));
    let link_stats = engine.stats();

    boot.update_progress(50, "Wiring services");

    // ── 5. Services + router wiring ───────────────────────────
    let controller = AudioController::new(store.clone(), sink.clone(), config.device_id);
    let cache = assets::LogoCache::new(logo_fs, sink, config.device_id, config.asset_timeout_ms);

    let mut router = MessageRouter::new();
    controller.attach(&mut router);
    controller.install_store_listener();
    cache.attach(&mut router);

    // Note the selected session's logo whenever the selection moves.
    // Listeners run with the store lock held, so the actual fetch (SD
    // read or wire request) happens from the housekeeping loop below.
    {
        let cache = cache.clone();
        store.subscribe(move |event, state| {
            if event != ChangeEvent::SelectionChanged {
                return;
            }
            if let Some(name) = state.selected_single.as_deref() {
                cache.note_wanted(name);
            }
        });
    }

    boot.update_progress(70, "Opening link");

    // ── 6. Start the link and ask for state ───────────────────
    bus::post(UiIntent::SetLabelText {
        label: LabelId::ConnectionStatus,
        text: bus::ui_text("Connecting"),
    });
    bus::post(UiIntent::SetStatusColor {
        color: StatusColor::Warn,
    });
    engine.start(router);
    controller.request_status();

    boot.update_progress(100, "Ready");
    boot.hide();
    info!("System ready. Entering housekeeping loop.");

    // ── 7. Housekeeping loop ──────────────────────────────────
    let mut seconds: u64 = 0;
    let mut last_received: u32 = 0;
    loop {
        std::thread::sleep(Duration::from_secs(1));
        seconds += 1;

        if fault::is_active() {
            // The UI task owns the display now; keep this thread quiet.
            engine.stop();
            park_forever();
        }

        watchdog.feed();
        cache.tick(drivers::time::uptime_ms());
        cache.service_wanted(drivers::time::uptime_ms(), |path| {
            bus::post(UiIntent::SetLogoSource {
                path: bus::ui_text(&path),
            });
        });

        if seconds % 30 == 0 {
            diagnostics::RuntimeMetrics::collect(drivers::time::uptime_secs(), &link_stats).log();
            let assets = cache.stats();
            info!(
                "assets: hits={} misses={} timeouts={} pending={}",
                assets.hits.load(Ordering::Relaxed),
                assets.misses.load(Ordering::Relaxed),
                assets.timeouts.load(Ordering::Relaxed),
                cache.pending_count()
            );

            // A silent 30 s window means the host went away. Flag it
            // and re-probe; the next snapshot flips the status back.
            let received = link_stats.messages_received.load(Ordering::Relaxed);
            if received == last_received {
                bus::post(UiIntent::SetLabelText {
                    label: LabelId::ConnectionStatus,
                    text: bus::ui_text("No host traffic"),
                });
                bus::post(UiIntent::SetStatusColor {
                    color: StatusColor::Error,
                });
                controller.request_status();
            }
            last_received = received;
        }
    }
}

/// Raise a terminal fault and park; the UI task renders it.
fn halt_with_fault(step: &'static str) -> ! {
    fault::raise(step, file!(), line!());
    park_forever();
}

fn park_forever() -> ! {
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}

/// Minimal host-side logger so simulation runs show output.
#[cfg(not(target_os = "espidf"))]
fn env_logger_fallback() {
    struct Stdout;
    impl log::Log for Stdout {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            println!("[{}] {}", record.level(), record.args());
        }
        fn flush(&self) {}
    }
    static LOGGER: Stdout = Stdout;
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Info);
}
