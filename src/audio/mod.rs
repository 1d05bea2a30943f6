//! Audio domain: the mirrored mixer state and its controller.

pub mod controller;
pub mod store;
pub mod types;
