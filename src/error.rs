//! Unified error types for the MixDeck firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! top-level error handling uniform. All variants are `Copy` so they can
//! be passed through boot and fault paths without allocation.

use core::fmt;

use crate::link::engine::LinkError;
use crate::link::frame::FrameError;
use crate::link::message::SchemaError;

/// Every fallible operation in the firmware funnels into this type.
///
/// Asset failures are absent deliberately: they are delivered to the
/// request callback and never propagate past the logo cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Frame encode failed.
    Frame(FrameError),
    /// A message failed parse or validation.
    Schema(SchemaError),
    /// The serial link rejected a send.
    Link(LinkError),
    /// Peripheral or subsystem initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Schema(e) => write!(f, "schema: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
