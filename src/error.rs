//! Crate-wide error type.
//!
//! Timeout is deliberately not a variant here: per the receive-family
//! contract, a timeout is always communicated by an empty return, never by
//! an error (see [`crate::deadline`]). `Error` only ever surfaces end of
//! stream, malformed arguments, a failed manual upload, or an operation a
//! transport declined to implement.

use std::fmt::Debug;

/// Errors produced by the tube core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport reached end of stream.
    ///
    /// Propagated by `recv`, `recv_n`, `recv_until`, `recv_all`; absorbed
    /// by `recv_repeat` and, conditionally, by `recv_line`.
    #[error("end of stream")]
    EndOfStream,

    /// A caller-supplied argument was invalid (mixing `drop`/`keepends`,
    /// an unknown compression mode, a zero-length delimiter, a negative
    /// length, ...).
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// [`crate::upload::upload_manually`] could not reach the configured
    /// prompt or marker.
    #[error("manual upload failed: {0}")]
    UploadFailed(String),

    /// An optional transport capability was not implemented.
    #[error("operation not implemented by this transport")]
    NotImplemented,

    /// A direction string did not match any entry in the alias map.
    #[error("unknown direction {given:?}, expected one of {legal}")]
    BadDirection {
        given: String,
        legal: &'static str,
    },

    /// A lower-level I/O failure from a concrete transport.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn bad_argument(msg: impl Into<String>) -> Self {
        Error::BadArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
