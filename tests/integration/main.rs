//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a full pipeline
//! (wire bytes → frame codec → router → store → UI bus, and back)
//! against an in-memory transport. All tests run on the host with no
//! real hardware required.

#![cfg(not(target_os = "espidf"))]

mod asset_cache_tests;
mod end_to_end_tests;
mod mock_link;
