//! ObjectId

use std::{fmt, str::FromStr};

use hex::FromHexError;
use thiserror::Error;

/// Errors that can occur when parsing an [`ObjectId`] from a hex string.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The string was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] FromHexError),

    /// The string did not decode to exactly 12 bytes.
    #[error("object id must be {expected} hex characters, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// A MongoDB object id: 12 raw bytes, commonly used as a document primary
/// key.
///
/// This crate treats ids as opaque caller-supplied bytes; it does not
/// generate them. The canonical text form is 24 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash, Default)]
pub struct ObjectId {
    id: [u8; 12],
}

impl ObjectId {
    /// Size in bytes of an object id.
    pub const LEN: usize = 12;

    /// Construct an `ObjectId` from its raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> ObjectId {
        ObjectId { id: bytes }
    }

    /// The raw bytes of the id.
    pub const fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// Parse an id from its 24-character hex representation.
    pub fn parse_str(s: &str) -> Result<ObjectId, ParseError> {
        if s.len() != Self::LEN * 2 {
            return Err(ParseError::InvalidLength {
                expected: Self::LEN * 2,
                got: s.len(),
            });
        }
        let decoded = hex::decode(s)?;
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&decoded);
        Ok(ObjectId::from_bytes(bytes))
    }

    /// The 24-character hex representation of the id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }
}

impl FromStr for ObjectId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<ObjectId, ParseError> {
        ObjectId::parse_str(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}
