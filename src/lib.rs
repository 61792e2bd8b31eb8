//! Low-level BSON codec and MongoDB wire-protocol encoding.
//!
//! This crate produces and consumes the exact byte sequences required to
//! talk to a MongoDB server, and nothing else: it opens no sockets, pools
//! no connections, and tracks no cursors. It is meant to sit inside an
//! application that owns its own I/O.
//!
//! ```text
//! // JSON equivalent
//! {"hello": "world"}
//!
//! // BSON encoding
//! \x16\x00\x00\x00                   // total document size
//! \x02                               // 0x02 = type String
//! hello\x00                          // field name
//! \x06\x00\x00\x00world\x00          // field value
//! \x00                               // 0x00 = type EOO ('end of object')
//! ```
//!
//! For more information about BSON itself, see [bsonspec.org](http://bsonspec.org).
//!
//! ## Writing
//!
//! [`BsonWriter`] builds documents in an internal buffer, back-patching
//! the length fields as nested documents close. The builders in [`wire`]
//! wrap it to produce complete request packets:
//!
//! ```
//! use mongowire::{wire, BsonWriter};
//!
//! let mut w = BsonWriter::new();
//! wire::is_master(&mut w, 1);
//! // hand w.data() to your transport
//! assert_eq!(w.data().len() as i32, w.len());
//! ```
//!
//! ## Reading
//!
//! Decoding is push-driven: feed bytes as they arrive — in chunks of any
//! size, down to one byte — and typed events fire on a visitor you
//! supply. [`BsonReader`] decodes one document; the readers in [`wire`]
//! add reply framing on top. Alternatively, [`RawValue`] navigates a
//! fully received document in place, without copying it first:
//!
//! ```
//! use mongowire::{BsonWriter, RawValue};
//!
//! let mut w = BsonWriter::new();
//! w.document();
//! w.element_str("greeting", "hello");
//! w.pop();
//!
//! let doc = RawValue::document(w.data());
//! assert_eq!(doc.get_field("greeting").as_str(), Some("hello"));
//! ```
//!
//! ## Concurrency
//!
//! Everything here is single-threaded by construction. Writers and
//! readers are plain values; use one per logical task and drive them from
//! your own scheduler.

pub use self::{
    error::{Error, Result},
    matcher::KeywordMatcher,
    oid::ObjectId,
    raw::{RawValue, RawValueIter},
    reader::{BsonReader, VisitBson},
    spec::{BinarySubtype, ElementType},
    writer::{BsonWriter, FieldKey, WriteFields},
};

pub mod error;
pub mod matcher;
pub mod oid;
pub mod raw;
pub mod reader;
pub mod spec;
pub mod wire;
pub mod writer;
