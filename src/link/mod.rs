//! Host serial link: framing, schema, routing, and the I/O engine.
//!
//! Layering, bottom up:
//! - [`frame`] — length-prefixed CRC-checked frame codec
//! - [`message`] — typed JSON schema with boundary validation
//! - [`router`] — kind-keyed dispatch to subscribers
//! - [`channels`] — static TX bridge between app threads and I/O
//! - [`engine`] — the async I/O task that ties it all together
//! - [`transport`] — byte-channel abstraction under the engine

pub mod channels;
pub mod engine;
pub mod frame;
pub mod message;
pub mod router;
pub mod transport;
