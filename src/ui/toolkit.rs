//! GUI toolkit seam.
//!
//! The core never touches widgets directly; the UI task translates bus
//! intents into calls on this trait. Rendering itself is out of scope —
//! the production binding wraps the vendor GUI library on-device, and
//! [`HeadlessToolkit`] records operations for host-side tests.

use crate::audio::types::Tab;

use super::bus::{DropdownId, LabelId, ScreenId, StatusColor};

/// What the firmware requires from a GUI toolkit.
pub trait UiToolkit {
    fn set_label_text(&mut self, label: LabelId, text: &str);
    fn set_slider(&mut self, tab: Tab, percent: u8);
    fn set_mute_indicator(&mut self, tab: Tab, muted: bool);
    /// `options` is a newline-separated list replacing the dropdown's
    /// entire contents.
    fn set_dropdown_options(&mut self, dropdown: DropdownId, options: &str);
    /// `None` means nothing is selected; the binding clears the
    /// highlight rather than defaulting to row zero.
    fn set_dropdown_selection(&mut self, dropdown: DropdownId, index: Option<u16>);
    fn set_status_color(&mut self, color: StatusColor);
    /// Filesystem path of the logo image to display, toolkit syntax
    /// (e.g. `S:/logos/chrome.png`).
    fn set_logo_source(&mut self, path: &str);
    fn show_boot_progress(&mut self, pct: u8, text: &str);
    fn hide_boot_screen(&mut self);
    fn switch_screen(&mut self, screen: ScreenId);

    /// Advance the toolkit's internal timers / redraw machinery.
    fn tick(&mut self);

    /// True while a render pass is in flight; the UI task defers
    /// widget mutation until it clears.
    fn render_in_progress(&self) -> bool;
}

/// Recorded toolkit operation, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolkitOp {
    LabelText(LabelId, String),
    Slider(Tab, u8),
    MuteIndicator(Tab, bool),
    DropdownOptions(DropdownId, String),
    DropdownSelection(DropdownId, Option<u16>),
    StatusColor(StatusColor),
    LogoSource(String),
    BootProgress(u8, String),
    HideBoot,
    Screen(ScreenId),
}

/// In-memory toolkit: records every call, renders nothing.
#[derive(Debug, Default)]
pub struct HeadlessToolkit {
    pub ops: Vec<ToolkitOp>,
    pub ticks: u32,
    pub rendering: bool,
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UiToolkit for HeadlessToolkit {
    fn set_label_text(&mut self, label: LabelId, text: &str) {
        self.ops.push(ToolkitOp::LabelText(label, text.to_owned()));
    }

    fn set_slider(&mut self, tab: Tab, percent: u8) {
        self.ops.push(ToolkitOp::Slider(tab, percent));
    }

    fn set_mute_indicator(&mut self, tab: Tab, muted: bool) {
        self.ops.push(ToolkitOp::MuteIndicator(tab, muted));
    }

    fn set_dropdown_options(&mut self, dropdown: DropdownId, options: &str) {
        self.ops
            .push(ToolkitOp::DropdownOptions(dropdown, options.to_owned()));
    }

    fn set_dropdown_selection(&mut self, dropdown: DropdownId, index: Option<u16>) {
        self.ops.push(ToolkitOp::DropdownSelection(dropdown, index));
    }

    fn set_status_color(&mut self, color: StatusColor) {
        self.ops.push(ToolkitOp::StatusColor(color));
    }

    fn set_logo_source(&mut self, path: &str) {
        self.ops.push(ToolkitOp::LogoSource(path.to_owned()));
    }

    fn show_boot_progress(&mut self, pct: u8, text: &str) {
        self.ops.push(ToolkitOp::BootProgress(pct, text.to_owned()));
    }

    fn hide_boot_screen(&mut self) {
        self.ops.push(ToolkitOp::HideBoot);
    }

    fn switch_screen(&mut self, screen: ScreenId) {
        self.ops.push(ToolkitOp::Screen(screen));
    }

    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn render_in_progress(&self) -> bool {
        self.rendering
    }
}
