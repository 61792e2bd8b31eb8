//! Building BSON documents and wire-protocol packets.

use crate::{
    error::Result,
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

const INLINE_CAP: usize = 240;

/// Writer storage. Small messages stay in the inline array; the first
/// overflow promotes to a heap buffer which then grows geometrically.
enum Buf {
    Inline([u8; INLINE_CAP]),
    Heap(Vec<u8>),
}

/// A key for a document or array element.
///
/// Implemented for `&str` (document field names; the writer appends the
/// NUL terminator) and `i32` (array indices, rendered as their decimal
/// ASCII representation).
pub trait FieldKey: Copy {
    /// Number of bytes the encoded key occupies, excluding the terminator.
    fn encoded_len(self) -> i32;
    /// Write exactly `encoded_len` bytes of key into `out`.
    fn encode(self, out: &mut [u8]);
}

impl FieldKey for &str {
    #[inline]
    fn encoded_len(self) -> i32 {
        self.len() as i32
    }

    #[inline]
    fn encode(self, out: &mut [u8]) {
        out.copy_from_slice(self.as_bytes());
    }
}

impl FieldKey for i32 {
    #[inline]
    fn encoded_len(self) -> i32 {
        debug_assert!(self >= 0);
        decimal_digits(self)
    }

    #[inline]
    fn encode(self, out: &mut [u8]) {
        let mut n = self;
        for slot in out.iter_mut().rev() {
            *slot = b'0' + (n % 10) as u8;
            n /= 10;
        }
    }
}

/// Count the digits in the decimal representation of a non-negative `n`.
fn decimal_digits(mut n: i32) -> i32 {
    let mut res = 1;
    loop {
        if n < 10 {
            return res;
        }
        if n < 100 {
            return res + 1;
        }
        if n < 1000 {
            return res + 2;
        }
        if n < 10_000 {
            return res + 3;
        }
        n /= 10_000;
        res += 4;
    }
}

/// Maps a user value to a sequence of element calls on a [`BsonWriter`].
///
/// This is the extension point the request builders use to turn
/// caller-owned types into document bodies. An implementation writes the
/// fields of one document (the surrounding `document`/`pop` calls are the
/// builder's job) and may fail with
/// [`Error::serialization`](crate::Error::serialization), in which case
/// the builder aborts without flushing the message length.
pub trait WriteFields {
    fn write_fields(&self, w: &mut BsonWriter) -> Result<()>;
}

impl<T: WriteFields + ?Sized> WriteFields for &T {
    fn write_fields(&self, w: &mut BsonWriter) -> Result<()> {
        (**self).write_fields(w)
    }
}

/// An append-only buffer builder for BSON documents and wire packets.
///
/// Nested documents and arrays are opened with
/// [`push_document`](BsonWriter::push_document) /
/// [`push_array`](BsonWriter::push_array) and closed with
/// [`pop`](BsonWriter::pop), which back-patches the length field reserved
/// at open time. The previous document's start offset is threaded through
/// the reserved length slot itself, so nesting costs no extra allocation.
///
/// The writer itself never fails; allocation failure follows the global
/// allocator's policy.
///
/// ```
/// use mongowire::BsonWriter;
///
/// let mut w = BsonWriter::new();
/// w.document();
/// w.element_str("hello", "world");
/// w.pop();
///
/// assert_eq!(
///     w.data(),
///     b"\x16\x00\x00\x00\x02hello\x00\x06\x00\x00\x00world\x00\x00",
/// );
/// ```
pub struct BsonWriter {
    buf: Buf,
    /// Next free offset.
    pos: i32,
    /// Offset of the current document's length slot. The slot holds the
    /// previous `doc_start` until `pop` overwrites it with the length.
    doc_start: i32,
}

impl Default for BsonWriter {
    fn default() -> BsonWriter {
        BsonWriter::new()
    }
}

impl BsonWriter {
    pub fn new() -> BsonWriter {
        BsonWriter {
            buf: Buf::Inline([0; INLINE_CAP]),
            pos: 0,
            doc_start: 0,
        }
    }

    /// Reset the writer. The heap buffer, if any, is kept for reuse.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.doc_start = 0;
    }

    /// The bytes written so far.
    ///
    /// The returned slice is invalidated by any mutating call; re-acquire
    /// it after every write.
    pub fn data(&self) -> &[u8] {
        &self.storage()[..self.pos as usize]
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> i32 {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Copy the written bytes into an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data().to_vec()
    }

    /// Start a top-level document. Must be closed with
    /// [`pop`](BsonWriter::pop).
    pub fn document(&mut self) {
        self.reserve(5);
        self.start_document();
    }

    /// Start a document-valued field. Must be closed with
    /// [`pop`](BsonWriter::pop).
    pub fn push_document<K: FieldKey>(&mut self, key: K) {
        self.start_field(ElementType::EmbeddedDocument, key, 10);
        self.start_document();
    }

    /// Start an array-valued field. Must be closed with
    /// [`pop`](BsonWriter::pop). Element keys inside an array should be
    /// ascending `i32` indices starting at 0.
    pub fn push_array<K: FieldKey>(&mut self, key: K) {
        self.start_field(ElementType::Array, key, 10);
        self.start_document();
    }

    /// Close the current document or array, writing the trailing NUL and
    /// back-patching the length reserved when it was opened.
    pub fn pop(&mut self) {
        self.reserve(1);
        self.put(&[0]);
        let doc_len = self.pos - self.doc_start;
        let start = self.doc_start as usize;
        let storage = self.storage_mut();
        let prev = i32::from_le_bytes(storage[start..start + 4].try_into().unwrap());
        storage[start..start + 4].copy_from_slice(&doc_len.to_le_bytes());
        self.doc_start = prev;
    }

    pub fn element_str<K: FieldKey>(&mut self, key: K, value: &str) {
        let vlen = value.len() as i32;
        self.start_field(ElementType::String, key, 4 + vlen + 1);
        // length prefix counts the trailing NUL
        self.put(&(vlen + 1).to_le_bytes());
        self.put(value.as_bytes());
        self.put(&[0]);
    }

    pub fn element_i32<K: FieldKey>(&mut self, key: K, value: i32) {
        self.start_field(ElementType::Int32, key, 4);
        self.put(&value.to_le_bytes());
    }

    pub fn element_i64<K: FieldKey>(&mut self, key: K, value: i64) {
        self.start_field(ElementType::Int64, key, 8);
        self.put(&value.to_le_bytes());
    }

    pub fn element_f64<K: FieldKey>(&mut self, key: K, value: f64) {
        self.start_field(ElementType::Double, key, 8);
        self.put(&value.to_le_bytes());
    }

    pub fn element_bool<K: FieldKey>(&mut self, key: K, value: bool) {
        self.start_field(ElementType::Boolean, key, 1);
        self.put(&[value as u8]);
    }

    pub fn element_null<K: FieldKey>(&mut self, key: K) {
        self.start_field(ElementType::Null, key, 0);
    }

    pub fn element_object_id<K: FieldKey>(&mut self, key: K, value: ObjectId) {
        self.start_field(ElementType::ObjectId, key, ObjectId::LEN as i32);
        self.put(&value.bytes());
    }

    /// Append a UTC datetime element (milliseconds since the epoch).
    pub fn element_datetime<K: FieldKey>(&mut self, key: K, millis: i64) {
        self.start_field(ElementType::DateTime, key, 8);
        self.put(&millis.to_le_bytes());
    }

    pub fn element_timestamp<K: FieldKey>(&mut self, key: K, value: i64) {
        self.start_field(ElementType::Timestamp, key, 8);
        self.put(&value.to_le_bytes());
    }

    /// Append a binary element. The payload is written as-is: no inner
    /// structure, no trailing NUL.
    pub fn element_binary<K: FieldKey>(&mut self, key: K, subtype: BinarySubtype, value: &[u8]) {
        let vlen = value.len() as i32;
        self.start_field(ElementType::Binary, key, 4 + 1 + vlen);
        self.put(&vlen.to_le_bytes());
        self.put(&[u8::from(subtype)]);
        self.put(value);
    }

    /// Write the current buffer length into the first four bytes.
    ///
    /// Wire packets start with a `message_length` placeholder that must be
    /// patched last; only use this when the buffer starts with an `i32`
    /// slot.
    pub fn flush_len(&mut self) {
        debug_assert!(self.pos >= 4);
        let len = self.pos;
        self.storage_mut()[0..4].copy_from_slice(&len.to_le_bytes());
    }

    /// Append a little-endian `i32` with no tag or key.
    pub fn append_raw_i32(&mut self, value: i32) {
        self.reserve(4);
        self.put(&value.to_le_bytes());
    }

    /// Append a little-endian `i64` with no tag or key.
    pub fn append_raw_i64(&mut self, value: i64) {
        self.reserve(8);
        self.put(&value.to_le_bytes());
    }

    /// Append raw bytes with no tag, key, or terminator.
    pub fn append_raw_bytes(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len() as i32);
        self.put(bytes);
    }

    /// Append bytes followed by a NUL terminator.
    pub fn append_cstring(&mut self, s: &str) {
        self.reserve(s.len() as i32 + 1);
        self.put(s.as_bytes());
        self.put(&[0]);
    }

    fn storage(&self) -> &[u8] {
        match &self.buf {
            Buf::Inline(arr) => arr,
            Buf::Heap(vec) => vec,
        }
    }

    fn storage_mut(&mut self) -> &mut [u8] {
        match &mut self.buf {
            Buf::Inline(arr) => arr,
            Buf::Heap(vec) => vec,
        }
    }

    fn capacity(&self) -> usize {
        self.storage().len()
    }

    /// Ensure `r` more bytes fit, growing (and promoting inline storage to
    /// the heap) if needed.
    fn reserve(&mut self, r: i32) {
        let needed = self.pos as usize + r as usize;
        let cap = self.capacity();
        if needed <= cap {
            return;
        }
        let new_cap = std::cmp::max(2 * cap, cap + r as usize + 2);
        match &mut self.buf {
            Buf::Inline(arr) => {
                let mut vec = vec![0u8; new_cap];
                vec[..self.pos as usize].copy_from_slice(&arr[..self.pos as usize]);
                self.buf = Buf::Heap(vec);
            }
            Buf::Heap(vec) => vec.resize(new_cap, 0),
        }
    }

    /// Copy `bytes` at the cursor and advance. Space must already be
    /// reserved.
    fn put(&mut self, bytes: &[u8]) {
        let start = self.pos as usize;
        let end = start + bytes.len();
        self.storage_mut()[start..end].copy_from_slice(bytes);
        self.pos = end as i32;
    }

    /// Write `tag`, the key, and its terminator, reserving room for
    /// `content_len` more bytes of value.
    fn start_field<K: FieldKey>(&mut self, tag: ElementType, key: K, content_len: i32) {
        let klen = key.encoded_len();
        self.reserve(1 + klen + 1 + content_len);
        let start = self.pos as usize;
        let storage = self.storage_mut();
        storage[start] = tag as u8;
        key.encode(&mut storage[start + 1..start + 1 + klen as usize]);
        storage[start + 1 + klen as usize] = 0;
        self.pos += klen + 2;
    }

    /// Reserve the length slot of a new document, saving the previous
    /// `doc_start` inside it.
    fn start_document(&mut self) {
        self.reserve(4);
        let prev = self.doc_start;
        self.doc_start = self.pos;
        self.put(&prev.to_le_bytes());
    }
}
