//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder and
//! asserts that it never panics, that every yielded payload is within
//! the length cap, and that a reset always returns it to a clean state.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use mixdeck::link::frame::{FrameDecoder, MAX_PAYLOAD_LEN};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();

    // Whole-buffer feed: garbage, partial headers, truncated bodies.
    decoder.feed(data, |payload| {
        assert!(payload.len() <= MAX_PAYLOAD_LEN, "payload exceeds length cap");
    });

    // Byte-at-a-time must behave identically after a reset.
    decoder.reset();
    let mut drip = Vec::new();
    for &b in data {
        decoder.feed(&[b], |payload| drip.push(payload.to_vec()));
    }

    let mut whole = FrameDecoder::new();
    let mut bulk = Vec::new();
    whole.feed(data, |payload| bulk.push(payload.to_vec()));
    assert_eq!(drip, bulk, "chunking changed decode results");
});
