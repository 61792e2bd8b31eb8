#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate mongowire;

use mongowire::RawValue;

fn exhaust(value: RawValue<'_>) {
    for (_key, child) in value.iter() {
        let _ = child.as_i32();
        let _ = child.as_i64();
        let _ = child.as_f64();
        let _ = child.as_str();
        let _ = child.as_binary();
        let _ = child.as_object_id();
        exhaust(child);
    }
}

fuzz_target!(|buf: &[u8]| {
    let doc = RawValue::document(buf);
    let _ = doc.get_field("field");
    exhaust(doc);
});
