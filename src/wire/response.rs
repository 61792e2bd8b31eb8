//! Decoding reply streams.
//!
//! A reply is the 36-byte [`ResponseHeader`] followed by
//! `number_returned` BSON documents. [`ResponseReader`] streams every
//! document through the BSON event interface; [`ValueResponseReader`]
//! instead buffers each document whole and surfaces it as a
//! [`RawValue`]. Both accept input in arbitrary chunks, like the
//! underlying [`BsonReader`].

use super::ResponseHeader;
use crate::{
    error::{Error, Result},
    raw::RawValue,
    reader::{BsonReader, VisitBson},
};

/// Events of a streamed reply: the BSON events of each document, plus
/// framing.
pub trait VisitResponse: VisitBson {
    /// The reply header has been read.
    fn start(&mut self, _header: &ResponseHeader) {}
    /// Document `index` is about to be streamed.
    fn document_start(&mut self, _index: i32) {}
    /// A document finished and another follows.
    fn document_done(&mut self) {}
    /// The whole reply has been consumed.
    fn stop(&mut self) {}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Header,
    /// Between documents: decide whether to frame another or stop.
    Begin,
    Document,
    Done,
    Failed,
}

/// A streaming reply decoder.
///
/// Event order: `start`, then for each document `document_start(i)`
/// followed by its BSON events (`document_done` separates consecutive
/// documents), then `stop`. Structural errors are sticky, as with
/// [`BsonReader`].
pub struct ResponseReader<V: VisitResponse> {
    reader: BsonReader<V>,
    header: ResponseHeader,
    header_buf: [u8; ResponseHeader::LEN],
    header_pos: usize,
    doc_count: i32,
    phase: Phase,
}

impl<V: VisitResponse> ResponseReader<V> {
    pub fn new(visitor: V) -> ResponseReader<V> {
        ResponseReader {
            reader: BsonReader::new(visitor),
            header: ResponseHeader::default(),
            header_buf: [0; ResponseHeader::LEN],
            header_pos: 0,
            doc_count: 0,
            phase: Phase::Header,
        }
    }

    /// Start directly on the document stream, with a header the caller
    /// already parsed. `start` is not emitted.
    pub fn with_header(header: ResponseHeader, visitor: V) -> ResponseReader<V> {
        ResponseReader {
            reader: BsonReader::new(visitor),
            header,
            header_buf: [0; ResponseHeader::LEN],
            header_pos: ResponseHeader::LEN,
            doc_count: 0,
            phase: Phase::Begin,
        }
    }

    /// The reply header. Meaningful once `start` has been emitted.
    pub fn header(&self) -> &ResponseHeader {
        &self.header
    }

    pub fn done(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Failed)
    }

    pub fn failed(&self) -> bool {
        self.phase == Phase::Failed
    }

    pub fn visitor(&self) -> &V {
        self.reader.visitor()
    }

    pub fn visitor_mut(&mut self) -> &mut V {
        self.reader.visitor_mut()
    }

    pub fn into_visitor(self) -> V {
        self.reader.into_visitor()
    }

    /// Reset to await a fresh reply. The visitor is untouched.
    pub fn clear(&mut self) {
        self.reader.clear();
        self.header = ResponseHeader::default();
        self.header_pos = 0;
        self.doc_count = 0;
        self.phase = Phase::Header;
    }

    /// Feed reply bytes, returning how many were consumed. Consumption
    /// stops once the reply is complete.
    pub fn consume(&mut self, input: &[u8]) -> Result<usize> {
        let mut pos = 0;
        loop {
            match self.phase {
                Phase::Header => {
                    if pos == input.len() {
                        return Ok(pos);
                    }
                    let take =
                        (ResponseHeader::LEN - self.header_pos).min(input.len() - pos);
                    self.header_buf[self.header_pos..self.header_pos + take]
                        .copy_from_slice(&input[pos..pos + take]);
                    self.header_pos += take;
                    pos += take;
                    if self.header_pos == ResponseHeader::LEN {
                        self.header = ResponseHeader::from_bytes(&self.header_buf);
                        self.reader.visitor_mut().start(&self.header);
                        self.phase = Phase::Begin;
                    }
                }
                Phase::Begin => self.next_document(),
                Phase::Document => {
                    if pos == input.len() {
                        return Ok(pos);
                    }
                    match self.reader.consume(&input[pos..]) {
                        Ok(n) => pos += n,
                        Err(e) => {
                            self.phase = Phase::Failed;
                            return Err(e);
                        }
                    }
                    if self.reader.done() {
                        self.phase = Phase::Begin;
                    }
                }
                Phase::Done | Phase::Failed => return Ok(pos),
            }
        }
    }

    fn next_document(&mut self) {
        if self.doc_count == self.header.number_returned {
            self.reader.visitor_mut().stop();
            self.phase = Phase::Done;
        } else {
            if self.doc_count > 0 {
                self.reader.visitor_mut().document_done();
            }
            self.reader.visitor_mut().document_start(self.doc_count);
            self.doc_count += 1;
            self.reader.restart();
            self.phase = Phase::Document;
        }
    }
}

/// Events of a materialized reply: one [`RawValue`] per document.
pub trait VisitValues {
    /// The reply header has been read.
    fn start(&mut self, _header: &ResponseHeader) {}
    /// Document `index` has been received whole. The value borrows the
    /// reader's buffer and is only valid for the duration of the call.
    fn value(&mut self, _index: i32, _value: RawValue<'_>) {}
    /// The whole reply has been consumed.
    fn stop(&mut self) {}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ValuePhase {
    Header,
    Begin,
    /// Reading the leading `i32` of the next document.
    DocLen,
    /// Accumulating the remainder of the document.
    DocBody,
    Done,
    Failed,
}

/// A reply decoder that hands each document over as one [`RawValue`].
///
/// Unlike the purely streaming readers this one allocates: each
/// document's declared length is buffered before its `value` callback
/// fires.
pub struct ValueResponseReader<V: VisitValues> {
    visitor: V,
    header: ResponseHeader,
    header_buf: [u8; ResponseHeader::LEN],
    header_pos: usize,
    len_buf: [u8; 4],
    len_pos: usize,
    buf: Vec<u8>,
    /// Document bytes still owed after the length prefix.
    need: usize,
    doc_count: i32,
    phase: ValuePhase,
}

impl<V: VisitValues> ValueResponseReader<V> {
    pub fn new(visitor: V) -> ValueResponseReader<V> {
        ValueResponseReader {
            visitor,
            header: ResponseHeader::default(),
            header_buf: [0; ResponseHeader::LEN],
            header_pos: 0,
            len_buf: [0; 4],
            len_pos: 0,
            buf: Vec::new(),
            need: 0,
            doc_count: 0,
            phase: ValuePhase::Header,
        }
    }

    pub fn header(&self) -> &ResponseHeader {
        &self.header
    }

    pub fn done(&self) -> bool {
        matches!(self.phase, ValuePhase::Done | ValuePhase::Failed)
    }

    pub fn failed(&self) -> bool {
        self.phase == ValuePhase::Failed
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

    pub fn clear(&mut self) {
        self.header = ResponseHeader::default();
        self.header_pos = 0;
        self.len_pos = 0;
        self.buf.clear();
        self.need = 0;
        self.doc_count = 0;
        self.phase = ValuePhase::Header;
    }

    pub fn consume(&mut self, input: &[u8]) -> Result<usize> {
        let mut pos = 0;
        loop {
            match self.phase {
                ValuePhase::Header => {
                    if pos == input.len() {
                        return Ok(pos);
                    }
                    let take =
                        (ResponseHeader::LEN - self.header_pos).min(input.len() - pos);
                    self.header_buf[self.header_pos..self.header_pos + take]
                        .copy_from_slice(&input[pos..pos + take]);
                    self.header_pos += take;
                    pos += take;
                    if self.header_pos == ResponseHeader::LEN {
                        self.header = ResponseHeader::from_bytes(&self.header_buf);
                        self.visitor.start(&self.header);
                        self.phase = ValuePhase::Begin;
                    }
                }
                ValuePhase::Begin => {
                    if self.doc_count == self.header.number_returned {
                        self.visitor.stop();
                        self.phase = ValuePhase::Done;
                    } else {
                        self.len_pos = 0;
                        self.buf.clear();
                        self.phase = ValuePhase::DocLen;
                    }
                }
                ValuePhase::DocLen => {
                    if pos == input.len() {
                        return Ok(pos);
                    }
                    let take = (4 - self.len_pos).min(input.len() - pos);
                    self.len_buf[self.len_pos..self.len_pos + take]
                        .copy_from_slice(&input[pos..pos + take]);
                    self.len_pos += take;
                    pos += take;
                    if self.len_pos == 4 {
                        let declared = i32::from_le_bytes(self.len_buf);
                        if declared < 5 {
                            self.phase = ValuePhase::Failed;
                            return Err(Error::malformed("document length too small"));
                        }
                        self.buf.reserve(declared as usize);
                        self.buf.extend_from_slice(&self.len_buf);
                        self.need = declared as usize - 4;
                        self.phase = ValuePhase::DocBody;
                    }
                }
                ValuePhase::DocBody => {
                    if pos == input.len() {
                        return Ok(pos);
                    }
                    let take = self.need.min(input.len() - pos);
                    self.buf.extend_from_slice(&input[pos..pos + take]);
                    self.need -= take;
                    pos += take;
                    if self.need == 0 {
                        if self.buf.last() != Some(&0) {
                            self.phase = ValuePhase::Failed;
                            return Err(Error::malformed("expected null byte"));
                        }
                        let value = RawValue::document(&self.buf);
                        self.visitor.value(self.doc_count, value);
                        self.doc_count += 1;
                        self.phase = ValuePhase::Begin;
                    }
                }
                ValuePhase::Done | ValuePhase::Failed => return Ok(pos),
            }
        }
    }
}
