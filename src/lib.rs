//! MixDeck firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod assets;
pub mod audio;
pub mod config;
pub mod diagnostics;
pub mod fault;
pub mod link;
pub mod ui;

pub mod error;

// Hardware-facing modules; the actual implementations are guarded by
// cfg attributes inside so the crate compiles on the host.
pub mod drivers;

mod esp_shims;
