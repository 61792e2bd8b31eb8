use super::{decode_all, sample_document, walk};
use mongowire::{BsonWriter, ElementType, RawValue};
use pretty_assertions::assert_eq;

#[test]
fn streaming_and_random_access_agree() {
    let bytes = sample_document();
    let mut walked = Vec::new();
    walk(RawValue::document(&bytes), &mut walked);
    assert_eq!(walked, decode_all(&bytes));
}

#[test]
fn get_field_finds_every_written_key() {
    let bytes = sample_document();
    let doc = RawValue::document(&bytes);
    for (key, value) in doc.iter() {
        let found = doc.get_field(key);
        assert!(!found.is_empty(), "missing {}", key);
        assert_eq!(found.tag(), value.tag());
        assert_eq!(found.data(), value.data());
    }
    assert!(doc.get_field("no such key").is_empty());
}

#[test]
fn get_field_returns_the_first_match() {
    // field-name uniqueness is not enforced on write
    let mut w = BsonWriter::new();
    w.document();
    w.element_i32("dup", 1);
    w.element_i32("dup", 2);
    w.pop();

    let bytes = w.to_vec();
    let doc = RawValue::document(&bytes);
    assert_eq!(doc.get_field("dup").as_i32(), Some(1));
}

#[test]
fn iteration_preserves_insertion_order() {
    let mut w = BsonWriter::new();
    w.document();
    w.element_str("first", "1");
    w.element_i32("second", 2);
    w.element_bool("third", true);
    w.pop();

    let bytes = w.to_vec();
    let doc = RawValue::document(&bytes);
    let keys: Vec<_> = doc.iter().map(|(k, _)| k.to_owned()).collect();
    assert_eq!(keys, ["first", "second", "third"]);
    assert_eq!(doc.iter().count(), 3);
}

#[test]
fn array_iteration_yields_index_keys() {
    let mut w = BsonWriter::new();
    w.document();
    w.push_array("a");
    w.element_str(0, "x");
    w.element_str(1, "y");
    w.pop();
    w.pop();

    let bytes = w.to_vec();
    let arr = RawValue::document(&bytes).get_field("a");
    assert_eq!(arr.tag(), ElementType::Array);
    let items: Vec<_> = arr
        .iter()
        .map(|(k, v)| (k.to_owned(), v.as_str().unwrap().to_owned()))
        .collect();
    assert_eq!(
        items,
        [("0".to_owned(), "x".to_owned()), ("1".to_owned(), "y".to_owned())]
    );
}

#[test]
fn scalars_do_not_iterate() {
    let mut w = BsonWriter::new();
    w.document();
    w.element_i32("n", 1);
    w.pop();

    let bytes = w.to_vec();
    let n = RawValue::document(&bytes).get_field("n");
    assert_eq!(n.iter().count(), 0);
    assert!(n.get_field("x").is_empty());
}

#[test]
fn nested_lookup_borrows_without_copying() {
    let mut w = BsonWriter::new();
    w.document();
    w.push_document("outer");
    w.push_document("inner");
    w.element_str("leaf", "value");
    w.pop();
    w.pop();
    w.pop();

    let bytes = w.to_vec();
    let leaf = RawValue::document(&bytes)
        .get_field("outer")
        .get_field("inner")
        .get_field("leaf");
    assert_eq!(leaf.as_str(), Some("value"));
    // the view points into the original buffer
    let start = leaf.data().as_ptr() as usize - bytes.as_ptr() as usize;
    assert!(start > 0 && start + leaf.len() <= bytes.len());
}

#[test]
fn truncated_documents_are_empty() {
    let bytes = sample_document();
    for cut in [0, 3, 4, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            RawValue::document(&bytes[..cut]).is_empty(),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn value_lengths_exclude_tag_and_key() {
    let bytes = sample_document();
    let doc = RawValue::document(&bytes);
    assert_eq!(doc.get_field("int32").len(), 4);
    assert_eq!(doc.get_field("int64").len(), 8);
    assert_eq!(doc.get_field("double").len(), 8);
    assert_eq!(doc.get_field("null").len(), 0);
    assert_eq!(doc.get_field("bool").len(), 1);
    assert_eq!(doc.get_field("objectid").len(), 12);
    // string: length prefix + text + NUL
    let s = "Why hire programmers when you could have a million monkeys?";
    assert_eq!(doc.get_field("string").len(), 4 + s.len() + 1);
    // binary: length prefix + subtype + payload
    assert_eq!(doc.get_field("bin_data").len(), 4 + 1 + "Some bin data 123".len());
}
