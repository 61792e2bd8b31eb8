//! Building the request packets of the wire protocol.
//!
//! Every builder writes a 16-byte message header with a zero
//! `message_length` and back-patches it once the packet is complete. A
//! builder that takes user values serializes them through
//! [`WriteFields`]; when that fails, the builder returns the error without
//! flushing the length, and the caller must
//! [`clear`](BsonWriter::clear) the writer before reusing it.

use super::Opcode;
use crate::{
    error::Result,
    writer::{BsonWriter, WriteFields},
};

/// The maximum number of documents allowed in one write command.
///
/// Can be obtained from the db via `db.isMaster().maxWriteBatchSize`.
pub const MAX_WRITE_BATCH_SIZE: usize = 1000;

fn append_msg_header(w: &mut BsonWriter, request_id: i32, op: Opcode) {
    w.append_raw_i32(0); // message_length, patched by flush_len
    w.append_raw_i32(request_id);
    w.append_raw_i32(0); // response_to
    w.append_raw_i32(op as i32);
}

/// Header, flags, and addressing shared by every `$cmd` query.
fn append_command_header(w: &mut BsonWriter, request_id: i32, db: &str) {
    append_msg_header(w, request_id, Opcode::Query);
    w.append_raw_i32(0); // flags
    w.append_raw_bytes(db.as_bytes());
    w.append_cstring(".$cmd");
    w.append_raw_i32(0); // number to skip
    w.append_raw_i32(-1); // number to return
}

fn append_namespace(w: &mut BsonWriter, db: &str, collection: &str) {
    w.append_raw_bytes(db.as_bytes());
    w.append_raw_bytes(b".");
    w.append_cstring(collection);
}

fn append_write_concern(w: &mut BsonWriter) {
    w.push_document("WriteConcern");
    w.element_i32("wtimeout", 100);
    w.element_i32("w", 1);
    w.pop();
}

/// Build an `isMaster` handshake query against `admin.$cmd`.
pub fn is_master(w: &mut BsonWriter, request_id: i32) {
    append_command_header(w, request_id, "admin");
    w.document();
    w.element_i32("ismaster", 1);
    w.pop();
    w.flush_len();
}

/// Build a GETMORE packet requesting the next batch of `cursor_id`.
pub fn get_more(w: &mut BsonWriter, request_id: i32, db: &str, collection: &str, cursor_id: i64) {
    append_msg_header(w, request_id, Opcode::GetMore);
    w.append_raw_i32(0); // reserved
    append_namespace(w, db, collection);
    w.append_raw_i32(0); // number to return
    w.append_raw_i64(cursor_id);
    w.flush_len();
}

/// Build a KILLCURSORS packet releasing `cursor_id` on the server.
pub fn kill_cursors(w: &mut BsonWriter, request_id: i32, cursor_id: i64) {
    append_msg_header(w, request_id, Opcode::KillCursors);
    w.append_raw_i32(0); // reserved
    w.append_raw_i32(1); // number of cursors
    w.append_raw_i64(cursor_id);
    w.flush_len();
}

/// Build an `insert` write command carrying `documents`.
///
/// At most [`MAX_WRITE_BATCH_SIZE`] documents fit in one command; use
/// [`insert_range`] to send larger sets across several packets.
pub fn insert<T: WriteFields>(
    w: &mut BsonWriter,
    request_id: i32,
    db: &str,
    collection: &str,
    documents: &[T],
) -> Result<()> {
    insert_range(w, request_id, db, collection, &mut documents.iter()).map(|_| ())
}

/// Build an `insert` write command from a caller-advanced iterator.
///
/// At most [`MAX_WRITE_BATCH_SIZE`] documents go into one packet. Returns
/// the number written; the iterator is left at the first unsent document,
/// so the caller loops until a call writes zero (discarding that final
/// empty packet).
pub fn insert_range<I>(
    w: &mut BsonWriter,
    request_id: i32,
    db: &str,
    collection: &str,
    documents: &mut I,
) -> Result<usize>
where
    I: Iterator,
    I::Item: WriteFields,
{
    append_command_header(w, request_id, db);

    w.document();
    w.element_str("insert", collection);
    w.push_array("documents");
    let mut count = 0;
    while count < MAX_WRITE_BATCH_SIZE {
        let Some(doc) = documents.next() else {
            break;
        };
        w.push_document(count as i32);
        doc.write_fields(w)?;
        w.pop();
        count += 1;
    }
    w.pop();
    append_write_concern(w);
    w.pop();

    w.flush_len();
    Ok(count)
}

/// Build an `update` write command: apply `operation` to the documents
/// matching `selector`.
pub fn update<S, O>(
    w: &mut BsonWriter,
    request_id: i32,
    db: &str,
    collection: &str,
    selector: &S,
    operation: &O,
    upsert: bool,
) -> Result<()>
where
    S: WriteFields,
    O: WriteFields,
{
    append_command_header(w, request_id, db);

    w.document();
    w.element_str("update", collection);
    w.push_array("updates");
    {
        w.push_document(0);
        w.push_document("q");
        selector.write_fields(w)?;
        w.pop();
        w.push_document("u");
        operation.write_fields(w)?;
        w.pop();
        if upsert {
            w.element_bool("upsert", true);
        }
        w.pop();
    }
    w.pop();
    append_write_concern(w);
    w.pop();

    w.flush_len();
    Ok(())
}

/// Build a `delete` write command removing the documents matching
/// `selector`.
pub fn delete<S: WriteFields>(
    w: &mut BsonWriter,
    request_id: i32,
    db: &str,
    collection: &str,
    selector: &S,
) -> Result<()> {
    append_command_header(w, request_id, db);

    w.document();
    w.element_str("delete", collection);
    w.push_array("deletes");
    {
        w.push_document(0);
        w.push_document("q");
        selector.write_fields(w)?;
        w.pop();
        w.element_i32("limit", 0);
        w.pop();
    }
    w.pop();
    append_write_concern(w);
    w.pop();

    w.flush_len();
    Ok(())
}

/// Build a legacy QUERY packet over `db.collection`.
///
/// A positive `limit` is sent negated, telling the server to return at
/// most that many documents and close the cursor.
pub fn query<S: WriteFields>(
    w: &mut BsonWriter,
    request_id: i32,
    db: &str,
    collection: &str,
    selector: &S,
    limit: i32,
) -> Result<()> {
    append_query_prefix(w, request_id, db, collection, limit);

    w.document();
    selector.write_fields(w)?;
    w.pop();

    w.flush_len();
    Ok(())
}

/// Like [`query`], with a field-projection document restricting the
/// returned fields.
pub fn query_with_projection<S, P>(
    w: &mut BsonWriter,
    request_id: i32,
    db: &str,
    collection: &str,
    selector: &S,
    projection: &P,
    limit: i32,
) -> Result<()>
where
    S: WriteFields,
    P: WriteFields,
{
    append_query_prefix(w, request_id, db, collection, limit);

    w.document();
    selector.write_fields(w)?;
    w.pop();

    w.document();
    projection.write_fields(w)?;
    w.pop();

    w.flush_len();
    Ok(())
}

fn append_query_prefix(
    w: &mut BsonWriter,
    request_id: i32,
    db: &str,
    collection: &str,
    limit: i32,
) {
    append_msg_header(w, request_id, Opcode::Query);
    w.append_raw_i32(0); // flags
    append_namespace(w, db, collection);
    w.append_raw_i32(0); // number to skip
    w.append_raw_i32(if limit > 0 { -limit } else { 0 });
}
