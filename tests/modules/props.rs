use proptest::prelude::*;

use super::{decode_all, decode_chunked, walk};
use mongowire::{BinarySubtype, BsonReader, BsonWriter, ObjectId, RawValue, VisitBson};

#[derive(Debug, Clone)]
enum Val {
    Null,
    I32(i32),
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
    Datetime(i64),
    Timestamp(i64),
    Oid([u8; 12]),
    Bin(u8, Vec<u8>),
    Doc(Vec<(String, Val)>),
    Arr(Vec<Val>),
}

fn arbitrary_value() -> impl Strategy<Value = Val> {
    let leaf = prop_oneof![
        Just(Val::Null),
        any::<i32>().prop_map(Val::I32),
        any::<i64>().prop_map(Val::I64),
        any::<f64>()
            .prop_filter("NaN never compares equal", |f| !f.is_nan())
            .prop_map(Val::F64),
        any::<bool>().prop_map(Val::Bool),
        any::<String>().prop_map(Val::Str),
        any::<i64>().prop_map(Val::Datetime),
        any::<i64>().prop_map(Val::Timestamp),
        any::<[u8; 12]>().prop_map(Val::Oid),
        (any::<u8>(), prop::collection::vec(any::<u8>(), 0..24))
            .prop_map(|(subtype, bytes)| Val::Bin(subtype, bytes)),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(("[^\\x00]{0,8}", inner.clone()), 0..6).prop_map(Val::Doc),
            prop::collection::vec(inner, 0..6).prop_map(Val::Arr),
        ]
    })
}

fn arbitrary_document() -> impl Strategy<Value = Vec<(String, Val)>> {
    prop::collection::vec(("[^\\x00]{0,8}", arbitrary_value()), 0..8)
}

fn write_value<K: mongowire::FieldKey>(w: &mut BsonWriter, key: K, value: &Val) {
    match value {
        Val::Null => w.element_null(key),
        Val::I32(v) => w.element_i32(key, *v),
        Val::I64(v) => w.element_i64(key, *v),
        Val::F64(v) => w.element_f64(key, *v),
        Val::Bool(v) => w.element_bool(key, *v),
        Val::Str(v) => w.element_str(key, v),
        Val::Datetime(v) => w.element_datetime(key, *v),
        Val::Timestamp(v) => w.element_timestamp(key, *v),
        Val::Oid(v) => w.element_object_id(key, ObjectId::from_bytes(*v)),
        Val::Bin(subtype, bytes) => {
            w.element_binary(key, BinarySubtype::from(*subtype), bytes)
        }
        Val::Doc(fields) => {
            w.push_document(key);
            for (k, v) in fields {
                write_value(w, k.as_str(), v);
            }
            w.pop();
        }
        Val::Arr(items) => {
            w.push_array(key);
            for (i, v) in items.iter().enumerate() {
                write_value(w, i as i32, v);
            }
            w.pop();
        }
    }
}

fn encode(fields: &[(String, Val)]) -> Vec<u8> {
    let mut w = BsonWriter::new();
    w.document();
    for (key, value) in fields {
        write_value(&mut w, key.as_str(), value);
    }
    w.pop();
    w.to_vec()
}

struct Discard;

impl VisitBson for Discard {}

/// Visit every reachable value without asserting anything.
fn exhaust(value: RawValue<'_>) {
    for (_key, child) in value.iter() {
        let _ = child.as_i32();
        let _ = child.as_str();
        let _ = child.as_binary();
        exhaust(child);
    }
}

proptest! {
    #[test]
    fn written_documents_are_length_consistent(fields in arbitrary_document()) {
        let bytes = encode(&fields);
        prop_assert_eq!(
            i32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize,
            bytes.len()
        );
        prop_assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn chunking_does_not_change_the_event_stream(
        fields in arbitrary_document(),
        chunk in any::<prop::sample::Index>(),
    ) {
        let bytes = encode(&fields);
        let whole = decode_all(&bytes);
        let chunk = chunk.index(bytes.len()) + 1;
        prop_assert_eq!(decode_chunked(&bytes, chunk), whole);
    }

    #[test]
    fn streaming_matches_the_random_access_walk(fields in arbitrary_document()) {
        let bytes = encode(&fields);
        let mut walked = Vec::new();
        walk(RawValue::document(&bytes), &mut walked);
        prop_assert_eq!(walked, decode_all(&bytes));
    }

    #[test]
    fn byte_flips_fail_cleanly(
        fields in arbitrary_document(),
        index in any::<prop::sample::Index>(),
        byte in any::<u8>(),
    ) {
        let mut bytes = encode(&fields);
        let at = index.index(bytes.len());
        bytes[at] = byte;

        // streaming: consumes or errors, never panics or reads out of bounds
        let mut reader = BsonReader::new(Discard);
        let _ = reader.consume(&bytes);

        // random access: lookups degrade to empty values
        exhaust(RawValue::document(&bytes));
    }
}
