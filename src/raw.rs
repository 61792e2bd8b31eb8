//! Zero-copy navigation over complete BSON values.
//!
//! Where [`BsonReader`](crate::BsonReader) streams events out of byte
//! chunks, [`RawValue`] borrows a fully received buffer and walks it in
//! place: field lookup by name, iteration, and advisory typed accessors.
//! Nothing here allocates.

use crate::{
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

/// The number of bytes the value of type `tag` occupies at the start of
/// `data`, or `None` when the bytes cannot hold such a value.
///
/// Sized values are validated structurally: documents and arrays must
/// declare at least their 5-byte minimum and end in NUL; strings and
/// javascript declare at least the 1-byte terminator, which must be NUL
/// and is counted in the returned length along with the 4 prefix bytes;
/// binary values carry a subtype byte and are *not* NUL-terminated.
pub(crate) fn value_length(tag: ElementType, data: &[u8]) -> Option<usize> {
    use ElementType::*;
    let len = match tag {
        EmbeddedDocument | Array => {
            if data.len() < 5 {
                return None;
            }
            let declared = i32::from_le_bytes(data[..4].try_into().unwrap());
            if declared < 5 {
                return None;
            }
            let declared = declared as usize;
            if declared > data.len() || data[declared - 1] != 0 {
                return None;
            }
            declared
        }
        String | JavaScriptCode => {
            if data.len() < 5 {
                return None;
            }
            let declared = i32::from_le_bytes(data[..4].try_into().unwrap());
            if declared < 1 {
                return None;
            }
            let total = 4 + declared as usize;
            if total > data.len() || data[total - 1] != 0 {
                return None;
            }
            total
        }
        Binary => {
            if data.len() < 5 {
                return None;
            }
            let declared = i32::from_le_bytes(data[..4].try_into().unwrap());
            if declared < 0 {
                return None;
            }
            let total = 4 + 1 + declared as usize;
            if total > data.len() {
                return None;
            }
            total
        }
        Double | Int64 | DateTime | Timestamp => 8,
        ObjectId => 12,
        Int32 => 4,
        Boolean => 1,
        Null => 0,
        RegularExpression | JavaScriptCodeWithScope | MinKey | MaxKey => return None,
    };
    if len > data.len() {
        return None;
    }
    Some(len)
}

/// Parse the element at `pos`: its key bytes, tag, and the offset and
/// length of its value. `None` at the document terminator or on any
/// malformation.
fn parse_element(buf: &[u8], mut pos: usize) -> Option<(&[u8], ElementType, usize, usize)> {
    let tag = ElementType::from(*buf.get(pos)?)?;
    pos += 1;
    let key_start = pos;
    while *buf.get(pos)? != 0 {
        pos += 1;
    }
    let key = &buf[key_start..pos];
    pos += 1;
    let vlen = value_length(tag, &buf[pos..])?;
    Some((key, tag, pos, vlen))
}

/// A borrowed view of a single BSON value.
///
/// Construction validates only the value's encoded length; failure yields
/// the [`empty`](RawValue::empty) value rather than an error, and all
/// accessors are advisory: a type mismatch returns `None`, never a panic.
///
/// ```
/// use mongowire::{BsonWriter, RawValue};
///
/// let mut w = BsonWriter::new();
/// w.document();
/// w.element_i32("count", 7);
/// w.element_str("name", "till");
/// w.pop();
///
/// let doc = RawValue::document(w.data());
/// assert_eq!(doc.get_field("count").as_i32(), Some(7));
/// assert_eq!(doc.get_field("name").as_str(), Some("till"));
/// assert!(doc.get_field("missing").is_empty());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct RawValue<'a> {
    /// Exactly the value's bytes; empty for the empty value.
    data: &'a [u8],
    tag: ElementType,
}

impl<'a> RawValue<'a> {
    /// Validate and borrow the value of type `tag` at the start of `data`.
    pub fn new(data: &'a [u8], tag: ElementType) -> RawValue<'a> {
        match value_length(tag, data) {
            Some(len) => RawValue {
                data: &data[..len],
                tag,
            },
            None => RawValue::empty(),
        }
    }

    /// Validate and borrow a top-level document.
    pub fn document(data: &'a [u8]) -> RawValue<'a> {
        RawValue::new(data, ElementType::EmbeddedDocument)
    }

    /// The value no lookup returns: no bytes, `MinKey` tag.
    pub fn empty() -> RawValue<'a> {
        RawValue {
            data: &[],
            tag: ElementType::MinKey,
        }
    }

    /// Whether this is the empty value (failed validation or lookup).
    pub fn is_empty(&self) -> bool {
        self.tag == ElementType::MinKey
    }

    pub fn tag(&self) -> ElementType {
        self.tag
    }

    /// The raw bytes of the value (excluding its tag and key).
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The byte length of the value.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Find the first element named `name` in this document.
    ///
    /// Returns the empty value when this is not a document, the key is
    /// absent, or the document bytes are malformed. Lookup is a linear
    /// walk from the first element.
    pub fn get_field(&self, name: &str) -> RawValue<'a> {
        if self.tag != ElementType::EmbeddedDocument {
            return RawValue::empty();
        }
        let buf = self.data;
        let mut pos = 4;
        while let Some((key, tag, vstart, vlen)) = parse_element(buf, pos) {
            if key == name.as_bytes() {
                return RawValue {
                    data: &buf[vstart..vstart + vlen],
                    tag,
                };
            }
            pos = vstart + vlen;
        }
        RawValue::empty()
    }

    /// Iterate the elements of this document or array in encounter order.
    ///
    /// For any other type the iterator is immediately exhausted. Iteration
    /// ends cleanly at the first malformed element.
    pub fn iter(&self) -> RawValueIter<'a> {
        match self.tag {
            ElementType::EmbeddedDocument | ElementType::Array => RawValueIter {
                buf: self.data,
                pos: 4,
            },
            _ => RawValueIter { buf: &[], pos: 0 },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.tag {
            ElementType::Double => Some(f64::from_le_bytes(self.data.try_into().ok()?)),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.tag {
            ElementType::Int32 => Some(i32::from_le_bytes(self.data.try_into().ok()?)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.tag {
            ElementType::Int64 => Some(i64::from_le_bytes(self.data.try_into().ok()?)),
            _ => None,
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_datetime(&self) -> Option<i64> {
        match self.tag {
            ElementType::DateTime => Some(i64::from_le_bytes(self.data.try_into().ok()?)),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self.tag {
            ElementType::Timestamp => Some(i64::from_le_bytes(self.data.try_into().ok()?)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.tag {
            ElementType::Boolean => Some(self.data[0] != 0),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self.tag {
            ElementType::ObjectId => Some(ObjectId::from_bytes(self.data.try_into().ok()?)),
            _ => None,
        }
    }

    /// The text of a string or javascript value, when it is valid UTF-8.
    pub fn as_str(&self) -> Option<&'a str> {
        match self.tag {
            ElementType::String | ElementType::JavaScriptCode => {
                std::str::from_utf8(&self.data[4..self.data.len() - 1]).ok()
            }
            _ => None,
        }
    }

    /// The subtype and payload of a binary value. BinaryOld payloads are
    /// returned as-is, embedded length prefix included.
    pub fn as_binary(&self) -> Option<(BinarySubtype, &'a [u8])> {
        match self.tag {
            ElementType::Binary => Some((BinarySubtype::from(self.data[4]), &self.data[5..])),
            _ => None,
        }
    }

    pub fn binary_subtype(&self) -> Option<BinarySubtype> {
        self.as_binary().map(|(subtype, _)| subtype)
    }
}

impl<'a> IntoIterator for RawValue<'a> {
    type IntoIter = RawValueIter<'a>;
    type Item = (&'a str, RawValue<'a>);

    fn into_iter(self) -> RawValueIter<'a> {
        self.iter()
    }
}

/// An iterator over the `(key, value)` pairs of a document or array.
pub struct RawValueIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for RawValueIter<'a> {
    type Item = (&'a str, RawValue<'a>);

    fn next(&mut self) -> Option<(&'a str, RawValue<'a>)> {
        let (key, tag, vstart, vlen) = parse_element(self.buf, self.pos)?;
        let Ok(key) = std::str::from_utf8(key) else {
            self.buf = &[];
            self.pos = 0;
            return None;
        };
        self.pos = vstart + vlen;
        Some((
            key,
            RawValue {
                data: &self.buf[vstart..vstart + vlen],
                tag,
            },
        ))
    }
}
