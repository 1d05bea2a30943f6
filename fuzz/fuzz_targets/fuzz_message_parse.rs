//! Fuzz target: `Message::from_json`
//!
//! Arbitrary bytes must parse or fail with a typed schema error; any
//! message that parses must re-serialize and parse again to the same
//! value (round-trip stability for everything we accept).
//!
//! cargo fuzz run fuzz_message_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use mixdeck::link::message::Message;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = Message::from_json(data) {
        let bytes = msg.to_json().expect("accepted message must serialize");
        let again = Message::from_json(&bytes).expect("canonical form must parse");
        assert_eq!(again, msg, "round trip changed an accepted message");
    }
});
