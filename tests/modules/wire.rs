use mongowire::{
    wire::{self, Opcode, MSG_HEADER_LEN},
    BsonWriter, Error, RawValue, Result, WriteFields,
};
use pretty_assertions::assert_eq;

struct UserInfo {
    name: String,
    counter: i32,
}

impl WriteFields for UserInfo {
    fn write_fields(&self, w: &mut BsonWriter) -> Result<()> {
        w.element_str("name", &self.name);
        w.element_i32("counter", self.counter);
        Ok(())
    }
}

/// Matches every document.
struct All;

impl WriteFields for All {
    fn write_fields(&self, _w: &mut BsonWriter) -> Result<()> {
        Ok(())
    }
}

struct IncCounter(i32);

impl WriteFields for IncCounter {
    fn write_fields(&self, w: &mut BsonWriter) -> Result<()> {
        w.push_document("$inc");
        w.element_i32("counter", self.0);
        w.pop();
        Ok(())
    }
}

struct Unserializable;

impl WriteFields for Unserializable {
    fn write_fields(&self, _w: &mut BsonWriter) -> Result<()> {
        Err(Error::serialization("cannot represent this"))
    }
}

fn header_of(bytes: &[u8]) -> (i32, i32, i32, i32) {
    let at = |i: usize| i32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
    (at(0), at(4), at(8), at(12))
}

/// The command document of a `$cmd` query packet.
fn command_doc(bytes: &[u8]) -> RawValue<'_> {
    let mut pos = MSG_HEADER_LEN + 4; // header + flags
    while bytes[pos] != 0 {
        pos += 1;
    }
    pos += 1 + 4 + 4; // cstring NUL + skip + number-to-return
    RawValue::document(&bytes[pos..])
}

#[test]
fn is_master_bytes() {
    let mut w = BsonWriter::new();
    wire::is_master(&mut w, 7);

    let mut expected = Vec::new();
    expected.extend_from_slice(&58i32.to_le_bytes());
    expected.extend_from_slice(&7i32.to_le_bytes());
    expected.extend_from_slice(&0i32.to_le_bytes());
    expected.extend_from_slice(&2004i32.to_le_bytes());
    expected.extend_from_slice(&0i32.to_le_bytes());
    expected.extend_from_slice(b"admin.$cmd\x00");
    expected.extend_from_slice(&0i32.to_le_bytes());
    expected.extend_from_slice(&(-1i32).to_le_bytes());
    expected.extend_from_slice(b"\x13\x00\x00\x00\x10ismaster\x00\x01\x00\x00\x00\x00");
    assert_eq!(w.data(), &expected[..]);
}

#[test]
fn get_more_layout() {
    let mut w = BsonWriter::new();
    wire::get_more(&mut w, 3, "mydb", "users", 0x0102_0304_0506_0708);

    let bytes = w.data();
    let (len, request_id, response_to, op) = header_of(bytes);
    assert_eq!(len as usize, bytes.len());
    assert_eq!(request_id, 3);
    assert_eq!(response_to, 0);
    assert_eq!(op, Opcode::GetMore as i32);
    assert_eq!(&bytes[20..31], b"mydb.users\x00");
    assert_eq!(&bytes[31..35], &0i32.to_le_bytes());
    assert_eq!(&bytes[35..43], &0x0102_0304_0506_0708i64.to_le_bytes());
    assert_eq!(bytes.len(), 43);
}

#[test]
fn kill_cursors_layout() {
    let mut w = BsonWriter::new();
    wire::kill_cursors(&mut w, 4, 77);

    let bytes = w.data();
    let (len, request_id, _, op) = header_of(bytes);
    assert_eq!(len as usize, bytes.len());
    assert_eq!(request_id, 4);
    assert_eq!(op, Opcode::KillCursors as i32);
    assert_eq!(&bytes[16..20], &0i32.to_le_bytes());
    assert_eq!(&bytes[20..24], &1i32.to_le_bytes());
    assert_eq!(&bytes[24..32], &77i64.to_le_bytes());
    assert_eq!(bytes.len(), 32);
}

#[test]
fn insert_command_document() {
    let docs = vec![
        UserInfo {
            name: "mike".into(),
            counter: 0,
        },
        UserInfo {
            name: "till".into(),
            counter: 2,
        },
    ];
    let mut w = BsonWriter::new();
    wire::insert(&mut w, 5, "mydb", "users", &docs).unwrap();

    let bytes = w.to_vec();
    let (len, _, _, op) = header_of(&bytes);
    assert_eq!(len as usize, bytes.len());
    assert_eq!(op, Opcode::Query as i32);
    assert_eq!(&bytes[20..29], b"mydb.$cmd");

    let cmd = command_doc(&bytes);
    assert_eq!(cmd.get_field("insert").as_str(), Some("users"));

    let documents = cmd.get_field("documents");
    let entries: Vec<_> = documents.iter().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "0");
    assert_eq!(entries[0].1.get_field("name").as_str(), Some("mike"));
    assert_eq!(entries[1].1.get_field("counter").as_i32(), Some(2));

    let concern = cmd.get_field("WriteConcern");
    assert_eq!(concern.get_field("wtimeout").as_i32(), Some(100));
    assert_eq!(concern.get_field("w").as_i32(), Some(1));
}

#[test]
fn update_command_document() {
    let mut w = BsonWriter::new();
    wire::update(
        &mut w,
        6,
        "mydb",
        "users",
        &UserInfo {
            name: "till".into(),
            counter: 0,
        },
        &IncCounter(-2),
        true,
    )
    .unwrap();

    let bytes = w.to_vec();
    let cmd = command_doc(&bytes);
    assert_eq!(cmd.get_field("update").as_str(), Some("users"));

    let entry = cmd.get_field("updates").get_field("0");
    assert_eq!(entry.get_field("q").get_field("name").as_str(), Some("till"));
    assert_eq!(
        entry
            .get_field("u")
            .get_field("$inc")
            .get_field("counter")
            .as_i32(),
        Some(-2)
    );
    assert_eq!(entry.get_field("upsert").as_bool(), Some(true));
}

#[test]
fn update_without_upsert_omits_the_flag() {
    let mut w = BsonWriter::new();
    wire::update(&mut w, 6, "mydb", "users", &All, &IncCounter(5), false).unwrap();
    let bytes = w.to_vec();
    let entry = command_doc(&bytes).get_field("updates").get_field("0");
    assert!(entry.get_field("upsert").is_empty());
}

#[test]
fn delete_command_document() {
    let mut w = BsonWriter::new();
    wire::delete(
        &mut w,
        8,
        "mydb",
        "users",
        &UserInfo {
            name: "mike".into(),
            counter: 0,
        },
    )
    .unwrap();

    let bytes = w.to_vec();
    let cmd = command_doc(&bytes);
    assert_eq!(cmd.get_field("delete").as_str(), Some("users"));
    let entry = cmd.get_field("deletes").get_field("0");
    assert_eq!(entry.get_field("q").get_field("name").as_str(), Some("mike"));
    assert_eq!(entry.get_field("limit").as_i32(), Some(0));
}

#[test]
fn query_negates_positive_limits() {
    for (limit, sent) in [(0, 0), (5, -5), (-3, 0)] {
        let mut w = BsonWriter::new();
        wire::query(&mut w, 9, "mydb", "users", &All, limit).unwrap();
        let bytes = w.to_vec();
        let ns_end = 20 + "mydb.users".len() + 1;
        assert_eq!(
            i32::from_le_bytes(bytes[ns_end..ns_end + 4].try_into().unwrap()),
            0
        );
        assert_eq!(
            i32::from_le_bytes(bytes[ns_end + 4..ns_end + 8].try_into().unwrap()),
            sent,
            "limit {}",
            limit
        );
        // selector document follows
        assert!(!RawValue::document(&bytes[ns_end + 8..]).is_empty());
    }
}

#[test]
fn query_with_projection_appends_a_second_document() {
    let mut w = BsonWriter::new();
    wire::query_with_projection(
        &mut w,
        9,
        "mydb",
        "users",
        &UserInfo {
            name: "mike".into(),
            counter: 0,
        },
        &IncCounter(1),
        0,
    )
    .unwrap();

    let bytes = w.to_vec();
    let ns_end = 20 + "mydb.users".len() + 1;
    let selector_at = ns_end + 8;
    let selector = RawValue::document(&bytes[selector_at..]);
    assert!(!selector.is_empty());
    let projection = RawValue::document(&bytes[selector_at + selector.len()..]);
    assert!(!projection.is_empty());
    assert_eq!(selector_at + selector.len() + projection.len(), bytes.len());
}

#[test]
fn insert_range_batches_at_the_write_limit() {
    let docs: Vec<UserInfo> = (0..wire::MAX_WRITE_BATCH_SIZE + 500)
        .map(|i| UserInfo {
            name: format!("user{}", i),
            counter: i as i32,
        })
        .collect();

    let mut iter = docs.iter();
    let mut w = BsonWriter::new();
    let first = wire::insert_range(&mut w, 10, "mydb", "users", &mut iter).unwrap();
    assert_eq!(first, wire::MAX_WRITE_BATCH_SIZE);
    let bytes = w.to_vec();
    let sent = command_doc(&bytes).get_field("documents");
    assert_eq!(sent.iter().count(), wire::MAX_WRITE_BATCH_SIZE);

    // the iterator was left at the first unsent document
    w.clear();
    let second = wire::insert_range(&mut w, 11, "mydb", "users", &mut iter).unwrap();
    assert_eq!(second, 500);
    let bytes = w.to_vec();
    let resumed = command_doc(&bytes)
        .get_field("documents")
        .get_field("0")
        .get_field("counter");
    assert_eq!(resumed.as_i32(), Some(wire::MAX_WRITE_BATCH_SIZE as i32));

    w.clear();
    let third = wire::insert_range(&mut w, 12, "mydb", "users", &mut iter).unwrap();
    assert_eq!(third, 0);
}

#[test]
fn serialization_failure_aborts_the_builder() {
    let mut w = BsonWriter::new();
    let err = wire::insert(&mut w, 13, "mydb", "users", &[Unserializable]).unwrap_err();
    assert!(matches!(err, Error::Serialization { .. }));
    // the length was never flushed
    assert_eq!(&w.data()[0..4], &0i32.to_le_bytes());

    // the writer is reusable after clearing
    w.clear();
    wire::is_master(&mut w, 14);
    let (len, _, _, _) = header_of(w.data());
    assert_eq!(len as usize, w.data().len());
}
