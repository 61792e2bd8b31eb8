//! The MongoDB wire protocol: request packets and reply decoding.
//!
//! See
//! <http://docs.mongodb.org/meta-driver/latest/legacy/mongodb-wire-protocol/>.

mod command;
mod request;
mod response;

pub use self::{
    command::{CmdError, CmdErrorKind, OpResponseParser, OperationResponse},
    request::{
        delete,
        get_more,
        insert,
        insert_range,
        is_master,
        kill_cursors,
        query,
        query_with_projection,
        update,
        MAX_WRITE_BATCH_SIZE,
    },
    response::{ResponseReader, ValueResponseReader, VisitResponse, VisitValues},
};

use bitflags::bitflags;

/// Request type, as carried in every message header.
#[repr(i32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Opcode {
    /// Reply to a client request. `response_to` is set.
    Reply = 1,
    /// Generic msg command followed by a string.
    Msg = 1000,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    /// Get more data from a query. See cursors.
    GetMore = 2005,
    Delete = 2006,
    /// Tell the database the client is done with a cursor.
    KillCursors = 2007,
}

/// Size in bytes of the header starting every message.
pub const MSG_HEADER_LEN: usize = 16;

bitflags! {
    /// The bit vector in a reply's `response_flags` field.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct ResponseFlags: i32 {
        /// The cursor id in a getMore was not valid at the server.
        const CURSOR_NOT_FOUND = 1;
        /// The query failed; the single returned document carries an
        /// `$err` field.
        const QUERY_FAILURE = 2;
        /// Only mongos sees this; drivers ignore it.
        const SHARD_CONFIG_STALE = 4;
        /// The server supports the AwaitData query option.
        const AWAIT_CAPABLE = 8;
    }
}

/// The fixed-size header starting every reply from the database: the
/// common message header plus cursor bookkeeping. All fields are
/// little-endian on the wire.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ResponseHeader {
    /// Total message size, header included.
    pub message_length: i32,
    pub request_id: i32,
    /// The `request_id` of the request this replies to.
    pub response_to: i32,
    pub op_code: i32,
    pub response_flags: i32,
    /// Cursor id to pass to getMore, or 0.
    pub cursor_id: i64,
    /// Offset of this reply in the cursor.
    pub starting_from: i32,
    /// Number of documents in this reply.
    pub number_returned: i32,
}

impl ResponseHeader {
    /// Size in bytes of the encoded header.
    pub const LEN: usize = 36;

    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> ResponseHeader {
        let i32_at = |at: usize| i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        ResponseHeader {
            message_length: i32_at(0),
            request_id: i32_at(4),
            response_to: i32_at(8),
            op_code: i32_at(12),
            response_flags: i32_at(16),
            cursor_id: i64::from_le_bytes(bytes[20..28].try_into().unwrap()),
            starting_from: i32_at(28),
            number_returned: i32_at(32),
        }
    }

    pub fn flags(&self) -> ResponseFlags {
        ResponseFlags::from_bits_truncate(self.response_flags)
    }
}
