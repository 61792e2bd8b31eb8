//! Incremental, push-driven BSON decoding.
//!
//! [`BsonReader`] is a byte-at-a-time state machine: feed it chunks of any
//! size with [`consume`](BsonReader::consume) and it emits typed events on
//! a caller-supplied [`VisitBson`] implementation. It never reads past the
//! supplied slice and never allocates; partial primitives are carried in a
//! small scratch buffer across calls.

use crate::{
    error::{Error, Result},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

/// Nesting limit, matching the server's own document depth cap.
const MAX_DEPTH: i8 = 100;

/// The set of events a [`BsonReader`] emits.
///
/// Every method has a no-op default, so an implementation only handles the
/// events it cares about.
///
/// Variable-length payloads (field names, strings, javascript, binary) are
/// delivered as zero or more non-empty chunks followed by exactly one
/// terminal empty chunk; concatenating the chunks reconstructs the logical
/// value. Chunk slices borrow from the `consume` input and are only valid
/// for the duration of the callback.
pub trait VisitBson {
    fn open_doc(&mut self) {}
    fn open_array(&mut self) {}
    fn close(&mut self) {}
    fn field_name(&mut self, _chunk: &[u8]) {}
    fn int32(&mut self, _value: i32) {}
    fn int64(&mut self, _value: i64) {}
    fn double(&mut self, _value: f64) {}
    fn boolean(&mut self, _value: bool) {}
    fn null(&mut self) {}
    fn utf8(&mut self, _chunk: &[u8]) {}
    fn javascript(&mut self, _chunk: &[u8]) {}
    fn binary_subtype(&mut self, _subtype: BinarySubtype) {}
    fn binary(&mut self, _chunk: &[u8]) {}
    /// Milliseconds since the Unix epoch.
    fn datetime(&mut self, _millis: i64) {}
    fn timestamp(&mut self, _value: i64) {}
    fn object_id(&mut self, _oid: ObjectId) {}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    FieldType,
    FieldName,
    ReadInt32,
    ReadInt64,
    ReadDouble,
    ReadBool,
    ReadString,
    ReadStringTerm,
    ReadBinSubtype,
    ReadObjectId,
    Done,
    Error,
}

/// A reentrant streaming BSON decoder.
///
/// The reader decodes one top-level document and then reports
/// [`done`](BsonReader::done); [`clear`](BsonReader::clear) rearms it for
/// the next. Structural violations put the reader in a sticky error state:
/// the offending [`consume`](BsonReader::consume) returns the error and
/// every later call returns `Ok(0)`.
///
/// ```
/// use mongowire::{BsonReader, BsonWriter, VisitBson};
///
/// #[derive(Default)]
/// struct Sum(i64);
///
/// impl VisitBson for Sum {
///     fn int32(&mut self, v: i32) {
///         self.0 += v as i64;
///     }
/// }
///
/// let mut w = BsonWriter::new();
/// w.document();
/// w.element_i32("a", 1);
/// w.element_i32("b", 2);
/// w.pop();
///
/// let mut r = BsonReader::new(Sum::default());
/// let consumed = r.consume(w.data())?;
/// assert_eq!(consumed as i32, w.len());
/// assert!(r.done());
/// assert_eq!(r.visitor().0, 3);
/// # Ok::<(), mongowire::Error>(())
/// ```
pub struct BsonReader<V: VisitBson> {
    visitor: V,
    state: State,
    /// Tag of the element being decoded; `None` for an unrecognized tag
    /// byte (reported once the field name has been consumed).
    tag: Option<ElementType>,
    depth: i8,
    /// Fixed-width values are accumulated here across chunk boundaries.
    scratch: [u8; 12],
    /// Bytes accumulated so far (fixed-width reads) or payload bytes still
    /// owed (string reads).
    partial: i32,
    bytes_seen: i32,
}

impl<V: VisitBson> BsonReader<V> {
    pub fn new(visitor: V) -> BsonReader<V> {
        BsonReader {
            visitor,
            state: State::ReadInt32,
            tag: Some(ElementType::EmbeddedDocument),
            depth: 0,
            scratch: [0; 12],
            partial: 0,
            bytes_seen: 0,
        }
    }

    /// Reset the reader to its initial state so it can decode another
    /// document. The visitor is untouched.
    pub fn clear(&mut self) {
        self.restart();
        self.bytes_seen = 0;
    }

    /// Rearm for the next document without forgetting `bytes_seen`.
    pub(crate) fn restart(&mut self) {
        self.state = State::ReadInt32;
        self.tag = Some(ElementType::EmbeddedDocument);
        self.depth = 0;
        self.partial = 0;
    }

    /// Whether parsing has finished, successfully or not.
    pub fn done(&self) -> bool {
        matches!(self.state, State::Done | State::Error)
    }

    /// Whether parsing failed.
    pub fn failed(&self) -> bool {
        self.state == State::Error
    }

    /// Total number of bytes consumed so far.
    pub fn bytes_seen(&self) -> i32 {
        self.bytes_seen
    }

    pub fn visitor(&self) -> &V {
        &self.visitor
    }

    pub fn visitor_mut(&mut self) -> &mut V {
        &mut self.visitor
    }

    pub fn into_visitor(self) -> V {
        self.visitor
    }

    /// Decode as much of `input` as possible, returning the number of
    /// bytes consumed.
    ///
    /// Consumption stops early when the top-level document closes; any
    /// remaining bytes are left for the caller. Exhausting `input`
    /// mid-value is not an error: the reader suspends and the next call
    /// resumes where it left off.
    pub fn consume(&mut self, input: &[u8]) -> Result<usize> {
        if input.is_empty() || self.done() {
            return Ok(0);
        }
        let mut pos = 0;
        match self.run(input, &mut pos) {
            Ok(()) => {
                self.bytes_seen += pos as i32;
                Ok(pos)
            }
            Err(e) => {
                self.state = State::Error;
                Err(e)
            }
        }
    }

    fn run(&mut self, input: &[u8], pos: &mut usize) -> Result<()> {
        while *pos < input.len() {
            match self.state {
                State::FieldType => {
                    let byte = input[*pos];
                    *pos += 1;
                    if byte == 0 {
                        self.depth -= 1;
                        self.visitor.close();
                        if self.depth == 0 {
                            self.state = State::Done;
                            return Ok(());
                        }
                    } else {
                        self.tag = ElementType::from(byte);
                        self.state = State::FieldName;
                    }
                }
                State::FieldName => {
                    let start = *pos;
                    while *pos < input.len() && input[*pos] != 0 {
                        *pos += 1;
                    }
                    if *pos > start {
                        self.visitor.field_name(&input[start..*pos]);
                    }
                    if *pos == input.len() {
                        return Ok(());
                    }
                    *pos += 1;
                    self.visitor.field_name(&[]);
                    self.begin_value()?;
                }
                State::ReadInt32 => {
                    if !self.fill_scratch(input, pos, 4) {
                        return Ok(());
                    }
                    let value = i32::from_le_bytes(self.scratch[..4].try_into().unwrap());
                    self.end_int32(value)?;
                }
                State::ReadInt64 => {
                    if !self.fill_scratch(input, pos, 8) {
                        return Ok(());
                    }
                    let value = i64::from_le_bytes(self.scratch[..8].try_into().unwrap());
                    match self.tag {
                        Some(ElementType::Int64) => self.visitor.int64(value),
                        Some(ElementType::DateTime) => self.visitor.datetime(value),
                        Some(ElementType::Timestamp) => self.visitor.timestamp(value),
                        _ => return Err(Error::malformed("internal error")),
                    }
                    self.state = State::FieldType;
                }
                State::ReadDouble => {
                    if !self.fill_scratch(input, pos, 8) {
                        return Ok(());
                    }
                    let value = f64::from_le_bytes(self.scratch[..8].try_into().unwrap());
                    self.visitor.double(value);
                    self.state = State::FieldType;
                }
                State::ReadBool => {
                    let byte = input[*pos];
                    *pos += 1;
                    self.visitor.boolean(byte != 0);
                    self.state = State::FieldType;
                }
                State::ReadString => {
                    let avail = input.len() - *pos;
                    let owed = self.partial as usize;
                    if avail < owed {
                        self.dispatch_string(&input[*pos..]);
                        self.partial -= avail as i32;
                        *pos = input.len();
                        return Ok(());
                    }
                    if owed > 0 {
                        self.dispatch_string(&input[*pos..*pos + owed]);
                    }
                    self.dispatch_string(&[]);
                    *pos += owed;
                    self.partial = 0;
                    if self.tag == Some(ElementType::Binary) {
                        self.state = State::FieldType;
                    } else {
                        self.state = State::ReadStringTerm;
                    }
                }
                State::ReadStringTerm => {
                    let byte = input[*pos];
                    *pos += 1;
                    if byte != 0 {
                        return Err(Error::malformed("expected null byte"));
                    }
                    self.state = State::FieldType;
                }
                State::ReadBinSubtype => {
                    let byte = input[*pos];
                    *pos += 1;
                    self.visitor.binary_subtype(BinarySubtype::from(byte));
                    self.state = State::ReadString;
                }
                State::ReadObjectId => {
                    if !self.fill_scratch(input, pos, 12) {
                        return Ok(());
                    }
                    self.visitor.object_id(ObjectId::from_bytes(self.scratch));
                    self.state = State::FieldType;
                }
                State::Done | State::Error => unreachable!("consume checked done()"),
            }
        }
        Ok(())
    }

    /// Route to the value state for the current tag, once the field name
    /// has been fully consumed.
    fn begin_value(&mut self) -> Result<()> {
        use ElementType as T;
        match self.tag {
            Some(
                T::Int32 | T::EmbeddedDocument | T::Array | T::String | T::JavaScriptCode
                | T::Binary,
            ) => {
                self.state = State::ReadInt32;
            }
            Some(T::Int64 | T::DateTime | T::Timestamp) => {
                self.state = State::ReadInt64;
            }
            Some(T::Double) => {
                self.state = State::ReadDouble;
            }
            Some(T::Boolean) => {
                self.state = State::ReadBool;
            }
            Some(T::Null) => {
                self.visitor.null();
                self.state = State::FieldType;
            }
            Some(T::ObjectId) => {
                self.state = State::ReadObjectId;
            }
            Some(T::RegularExpression | T::JavaScriptCodeWithScope) => {
                return Err(Error::malformed("field type not handled"));
            }
            Some(T::MinKey | T::MaxKey) | None => {
                return Err(Error::malformed("invalid bson tag"));
            }
        }
        self.partial = 0;
        Ok(())
    }

    /// Finish a 4-byte read: an `i32` value, a container open, or the
    /// length prefix of a sized value.
    fn end_int32(&mut self, value: i32) -> Result<()> {
        match self.tag {
            Some(ElementType::EmbeddedDocument) => self.open_container(false)?,
            Some(ElementType::Array) => self.open_container(true)?,
            Some(ElementType::Int32) => {
                self.visitor.int32(value);
                self.state = State::FieldType;
            }
            Some(ElementType::String | ElementType::JavaScriptCode) => {
                if value < 1 {
                    return Err(Error::malformed("negative length!"));
                }
                // declared length counts the trailing NUL, streamed apart
                self.partial = value - 1;
                self.state = State::ReadString;
            }
            Some(ElementType::Binary) => {
                if value < 0 {
                    return Err(Error::malformed("negative length!"));
                }
                self.partial = value;
                self.state = State::ReadBinSubtype;
            }
            _ => return Err(Error::malformed("internal error")),
        }
        Ok(())
    }

    fn open_container(&mut self, array: bool) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::malformed("document nesting too deep"));
        }
        self.depth += 1;
        if array {
            self.visitor.open_array();
        } else {
            self.visitor.open_doc();
        }
        self.state = State::FieldType;
        Ok(())
    }

    fn dispatch_string(&mut self, chunk: &[u8]) {
        match self.tag {
            Some(ElementType::String) => self.visitor.utf8(chunk),
            Some(ElementType::JavaScriptCode) => self.visitor.javascript(chunk),
            Some(ElementType::Binary) => self.visitor.binary(chunk),
            _ => {}
        }
    }

    /// Accumulate input into `scratch` until `want` bytes are buffered.
    /// Returns false (leaving the state untouched) when the input runs out
    /// first.
    fn fill_scratch(&mut self, input: &[u8], pos: &mut usize, want: usize) -> bool {
        let have = self.partial as usize;
        let take = (want - have).min(input.len() - *pos);
        self.scratch[have..have + take].copy_from_slice(&input[*pos..*pos + take]);
        *pos += take;
        if have + take < want {
            self.partial = (have + take) as i32;
            false
        } else {
            self.partial = 0;
            true
        }
    }
}
