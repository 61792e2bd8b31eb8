#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate mongowire;

use mongowire::wire::OpResponseParser;

fuzz_target!(|buf: &[u8]| {
    let mut parser = OpResponseParser::new();
    for chunk in buf.chunks(7) {
        if parser.consume(chunk).is_err() {
            break;
        }
    }
    let _ = parser.result();
});
