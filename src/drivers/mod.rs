//! Hardware drivers and platform shims.
//!
//! Everything ESP-IDF-specific is gated on `target_os = "espidf"`;
//! host builds get simulation fallbacks so the rest of the crate tests
//! without hardware.

pub mod sd;
pub mod task_pin;
pub mod time;
pub mod uart;
pub mod watchdog;
