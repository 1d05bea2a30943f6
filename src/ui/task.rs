//! UI task — drains the update bus into the toolkit every GUI tick.
//!
//! The only code in the firmware allowed to touch widgets. Programmatic
//! writes to input widgets (sliders, dropdowns) are bracketed with the
//! store's suppression counters so the resulting "value changed"
//! callbacks do not loop back into the controller as user gestures.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;

use crate::audio::store::AudioStore;

use super::bus::{self, UiIntent};
use super::toolkit::UiToolkit;

pub struct UiTask<T: UiToolkit> {
    toolkit: T,
    store: Arc<AudioStore>,
}

impl<T: UiToolkit> UiTask<T> {
    pub fn new(toolkit: T, store: Arc<AudioStore>) -> Self {
        Self { toolkit, store }
    }

    /// One GUI tick: apply pending intents (unless a render pass is in
    /// flight), then advance the toolkit.
    pub fn run_tick(&mut self) {
        if !self.toolkit.render_in_progress() {
            while let Some(intent) = bus::try_next() {
                self.apply(intent);
            }
        }
        self.toolkit.tick();
    }

    fn apply(&mut self, intent: UiIntent) {
        match intent {
            UiIntent::SetLabelText { label, text } => {
                self.toolkit.set_label_text(label, &text);
            }
            UiIntent::SetVolumeSlider { tab, percent } => {
                self.store.set_suppress_arc(true);
                self.toolkit.set_slider(tab, percent);
                self.store.set_suppress_arc(false);
            }
            UiIntent::SetMuteIndicator { tab, muted } => {
                self.toolkit.set_mute_indicator(tab, muted);
            }
            UiIntent::SetDropdownOptions { dropdown, options } => {
                self.store.set_suppress_dropdown(true);
                self.toolkit.set_dropdown_options(dropdown, &options);
                self.store.set_suppress_dropdown(false);
            }
            UiIntent::SetDropdownSelection { dropdown, index } => {
                self.store.set_suppress_dropdown(true);
                self.toolkit.set_dropdown_selection(dropdown, index);
                self.store.set_suppress_dropdown(false);
            }
            UiIntent::SetStatusColor { color } => {
                self.toolkit.set_status_color(color);
            }
            UiIntent::SetLogoSource { path } => {
                self.toolkit.set_logo_source(&path);
            }
            UiIntent::ShowBootProgress { pct, text } => {
                self.toolkit.show_boot_progress(pct, &text);
            }
            UiIntent::HideBootScreen => {
                self.toolkit.hide_boot_screen();
            }
            UiIntent::SwitchScreen { screen } => {
                self.toolkit.switch_screen(screen);
            }
        }
    }

    /// Access to the toolkit, for gesture wiring at startup.
    pub fn toolkit_mut(&mut self) -> &mut T {
        &mut self.toolkit
    }
}

/// Spawn the UI task on the application core.
pub fn spawn<T: UiToolkit + Send + 'static>(
    mut task: UiTask<T>,
    running: Arc<AtomicBool>,
    tick_ms: u32,
) -> std::thread::JoinHandle<()> {
    crate::drivers::task_pin::ThreadSpec::new(crate::drivers::task_pin::Core::Gui, 10, 16, "ui\0")
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                // A raised fault takes the display and never returns.
                if let Some(record) = crate::fault::record() {
                    crate::fault::run_terminal(task.toolkit_mut(), &record);
                }
                task.run_tick();
                std::thread::sleep(Duration::from_millis(u64::from(tick_ms)));
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::Tab;
    use crate::ui::bus::{ui_text, DropdownId, LabelId};
    use crate::ui::toolkit::{HeadlessToolkit, ToolkitOp};

    fn task() -> UiTask<HeadlessToolkit> {
        UiTask::new(HeadlessToolkit::new(), Arc::new(AudioStore::new()))
    }

    #[test]
    fn drains_intents_in_fifo_order() {
        let _guard = bus::BUS_LOCK.lock().unwrap();
        bus::drain_for_test();

        bus::post(UiIntent::SetLabelText {
            label: LabelId::DeviceName,
            text: ui_text("Headphones"),
        });
        bus::post(UiIntent::SetVolumeSlider {
            tab: Tab::Master,
            percent: 60,
        });

        let mut t = task();
        t.run_tick();
        assert_eq!(
            t.toolkit.ops,
            vec![
                ToolkitOp::LabelText(LabelId::DeviceName, "Headphones".into()),
                ToolkitOp::Slider(Tab::Master, 60),
            ]
        );
        assert_eq!(t.toolkit.ticks, 1);
    }

    #[test]
    fn render_in_progress_defers_intents() {
        let _guard = bus::BUS_LOCK.lock().unwrap();
        bus::drain_for_test();

        bus::post(UiIntent::HideBootScreen);
        let mut t = task();
        t.toolkit.rendering = true;
        t.run_tick();
        assert!(t.toolkit.ops.is_empty());

        t.toolkit.rendering = false;
        t.run_tick();
        assert_eq!(t.toolkit.ops, vec![ToolkitOp::HideBoot]);
    }

    #[test]
    fn programmatic_writes_release_suppression() {
        let _guard = bus::BUS_LOCK.lock().unwrap();
        bus::drain_for_test();

        bus::post(UiIntent::SetVolumeSlider {
            tab: Tab::Single,
            percent: 30,
        });
        bus::post(UiIntent::SetDropdownSelection {
            dropdown: DropdownId::Single,
            index: Some(2),
        });

        let mut t = task();
        t.run_tick();
        assert!(!t.store.arc_suppressed());
        assert!(!t.store.dropdown_suppressed());
    }
}
