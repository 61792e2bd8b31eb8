use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while decoding BSON or building a request.
///
/// Decoders never fail on truncated input — they suspend and wait for more
/// bytes — so every `Malformed` error indicates structurally invalid data.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Structurally invalid BSON was encountered.
    #[error("malformed BSON: {message}")]
    Malformed { message: String },

    /// A user serialization callback failed while building a request.
    #[error("serialization failed: {message}")]
    Serialization { message: String },
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::Malformed {
            message: message.into(),
        }
    }

    /// Construct the error a [`WriteFields`](crate::WriteFields)
    /// implementation should return when a value cannot be serialized.
    pub fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization {
            message: message.into(),
        }
    }
}
