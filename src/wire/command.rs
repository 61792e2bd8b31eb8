//! Parsing the envelope of write-command replies.
//!
//! Write commands (`insert`, `update`, `delete`) answer with a single
//! document carrying `ok`, `n`, `nModified`, and error arrays.
//! [`OpResponseParser`] consumes such a reply and materializes an
//! [`OperationResponse`], matching field names incrementally with
//! [`KeywordMatcher`]s so nothing is buffered or copied.

use super::{
    response::{ResponseReader, VisitResponse},
    ResponseHeader,
};
use crate::{error::Result, matcher::KeywordMatcher, reader::VisitBson};

/// What kind of error a [`CmdError`] describes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CmdErrorKind {
    WriteError,
    WriteConcernError,
    /// The reply itself could not be parsed. Not a server error.
    ParseError,
}

/// One entry of a reply's `writeErrors` or `writeConcernErrors` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdError {
    pub code: i32,
    /// Index of the failed document in the originating command.
    pub index: i32,
    pub msg: String,
    pub info: String,
    pub kind: CmdErrorKind,
}

impl Default for CmdError {
    fn default() -> CmdError {
        CmdError {
            code: 0,
            index: 0,
            msg: String::new(),
            info: String::new(),
            kind: CmdErrorKind::WriteError,
        }
    }
}

/// The decoded envelope of a write-command reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResponse {
    pub ok: i32,
    pub n: i32,
    pub n_modified: i32,
    pub errors: Vec<CmdError>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum BaseField {
    /// A name is still being matched.
    Field,
    Ok,
    NModified,
    N,
    WriteConcernErrors,
    WriteErrors,
    Unknown,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ErrorField {
    Field,
    Index,
    ErrMsg,
    ErrInfo,
    Code,
    Unknown,
}

static BASE_KEYWORDS: &[(&str, BaseField)] = &[
    ("n", BaseField::N),
    ("nModified", BaseField::NModified),
    ("ok", BaseField::Ok),
    ("writeConcernErrors", BaseField::WriteConcernErrors),
    ("writeErrors", BaseField::WriteErrors),
];

static ERROR_KEYWORDS: &[(&str, ErrorField)] = &[
    ("code", ErrorField::Code),
    ("errInfo", ErrorField::ErrInfo),
    ("errmsg", ErrorField::ErrMsg),
    ("index", ErrorField::Index),
];

/// Visitor accumulating an [`OperationResponse`] from reply events.
struct Envelope {
    res: OperationResponse,
    depth: u8,
    base_field: BaseField,
    error_field: ErrorField,
    base_matcher: KeywordMatcher<BaseField>,
    error_matcher: KeywordMatcher<ErrorField>,
    /// Bytes of an in-flight `errmsg`/`errInfo` value; converted whole at
    /// the terminal chunk so split multi-byte characters survive.
    text_buf: Vec<u8>,
}

impl Envelope {
    fn new() -> Envelope {
        Envelope {
            res: OperationResponse::default(),
            depth: 0,
            base_field: BaseField::Unknown,
            error_field: ErrorField::Unknown,
            base_matcher: KeywordMatcher::new(BASE_KEYWORDS, BaseField::Unknown),
            error_matcher: KeywordMatcher::new(ERROR_KEYWORDS, ErrorField::Unknown),
            text_buf: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.res = OperationResponse::default();
        self.depth = 0;
        self.base_field = BaseField::Unknown;
        self.error_field = ErrorField::Unknown;
        self.text_buf.clear();
    }

    /// Inside an element of `writeErrors` / `writeConcernErrors`:
    /// reply doc (1) → error array (2) → error entry (3).
    fn in_error_entry(&self) -> bool {
        self.depth == 3
            && matches!(
                self.base_field,
                BaseField::WriteErrors | BaseField::WriteConcernErrors
            )
    }
}

impl VisitBson for Envelope {
    fn field_name(&mut self, chunk: &[u8]) {
        if self.depth == 1 {
            if self.base_field != BaseField::Field {
                self.base_field = BaseField::Field;
                self.base_matcher.reset();
            }
            for &byte in chunk {
                self.base_matcher.push(byte);
            }
            if chunk.is_empty() {
                self.base_matcher.push(0);
                self.base_field = self.base_matcher.result();
            }
        } else if self.in_error_entry() {
            if self.error_field != ErrorField::Field {
                self.error_field = ErrorField::Field;
                self.error_matcher.reset();
            }
            for &byte in chunk {
                self.error_matcher.push(byte);
            }
            if chunk.is_empty() {
                self.error_matcher.push(0);
                self.error_field = self.error_matcher.result();
            }
        }
    }

    fn open_doc(&mut self) {
        self.depth += 1;
        if self.in_error_entry() {
            let mut err = CmdError::default();
            if self.base_field == BaseField::WriteConcernErrors {
                err.kind = CmdErrorKind::WriteConcernError;
            }
            self.res.errors.push(err);
        }
    }

    fn open_array(&mut self) {
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth -= 1;
    }

    fn int32(&mut self, value: i32) {
        if self.depth == 1 {
            match self.base_field {
                BaseField::Ok => self.res.ok = value,
                BaseField::N => self.res.n = value,
                BaseField::NModified => self.res.n_modified = value,
                _ => {}
            }
        } else if self.in_error_entry() {
            let Some(err) = self.res.errors.last_mut() else {
                return;
            };
            match self.error_field {
                ErrorField::Code => err.code = value,
                ErrorField::Index => err.index = value,
                _ => {}
            }
        }
    }

    fn utf8(&mut self, chunk: &[u8]) {
        if !self.in_error_entry()
            || !matches!(self.error_field, ErrorField::ErrMsg | ErrorField::ErrInfo)
        {
            return;
        }
        if !chunk.is_empty() {
            self.text_buf.extend_from_slice(chunk);
            return;
        }
        let text = String::from_utf8_lossy(&self.text_buf);
        if let Some(err) = self.res.errors.last_mut() {
            match self.error_field {
                ErrorField::ErrMsg => err.msg.push_str(&text),
                ErrorField::ErrInfo => err.info.push_str(&text),
                _ => {}
            }
        }
        self.text_buf.clear();
    }
}

impl VisitResponse for Envelope {}

/// Reads a write-command reply into an [`OperationResponse`].
///
/// A reply that cannot be decoded surfaces twice: `consume` returns the
/// error, and a synthetic [`CmdErrorKind::ParseError`] entry is appended
/// to [`result`](OpResponseParser::result)`().errors`.
pub struct OpResponseParser {
    inner: ResponseReader<Envelope>,
}

impl Default for OpResponseParser {
    fn default() -> OpResponseParser {
        OpResponseParser::new()
    }
}

impl OpResponseParser {
    pub fn new() -> OpResponseParser {
        OpResponseParser {
            inner: ResponseReader::new(Envelope::new()),
        }
    }

    /// Feed reply bytes, returning how many were consumed.
    pub fn consume(&mut self, input: &[u8]) -> Result<usize> {
        match self.inner.consume(input) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.inner.visitor_mut().res.errors.push(CmdError {
                    msg: e.to_string(),
                    kind: CmdErrorKind::ParseError,
                    ..CmdError::default()
                });
                Err(e)
            }
        }
    }

    pub fn done(&self) -> bool {
        self.inner.done()
    }

    pub fn failed(&self) -> bool {
        self.inner.failed()
    }

    pub fn header(&self) -> &ResponseHeader {
        self.inner.header()
    }

    /// The envelope decoded so far.
    pub fn result(&self) -> &OperationResponse {
        &self.inner.visitor().res
    }

    pub fn into_result(self) -> OperationResponse {
        self.inner.into_visitor().res
    }

    /// Reset to await a fresh reply, discarding the decoded envelope.
    pub fn clear(&mut self) {
        self.inner.clear();
        self.inner.visitor_mut().reset();
    }
}
