#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate mongowire;

use mongowire::{BsonReader, VisitBson};

struct Discard;

impl VisitBson for Discard {}

fuzz_target!(|buf: &[u8]| {
    let mut reader = BsonReader::new(Discard);
    // feed in small chunks to exercise every suspension point
    for chunk in buf.chunks(3) {
        if reader.consume(chunk).is_err() {
            break;
        }
    }
});
