use std::io;

use thiserror::Error;

/// Main error type for nautex operations
#[derive(Error, Debug)]
pub enum NautexError {
    /// A structural invariant of the on-disk index was violated while
    /// reading (bad magic, VInt overflow, out-of-order terms, checksum
    /// mismatch). The operation that raised it must not be retried on the
    /// same reader.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// `write.lock` could not be acquired within the timeout
    #[error("could not obtain lock: {0}")]
    LockObtainFailed(String),

    /// The reader's underlying segment files have been deleted by a later
    /// commit
    #[error("stale reader: {0}")]
    StaleReader(String),

    /// Bad caller input: id out of range, unknown field, malformed query
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A query string did not parse (surfaced through query construction)
    #[error("query parse error: {0}")]
    QueryParse(String),

    /// I/O error from the directory (propagated)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for nautex operations
pub type Result<T> = std::result::Result<T, NautexError>;

impl NautexError {
    /// Create a new corrupt-index error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        NautexError::CorruptIndex(msg.into())
    }

    /// Create a new lock-obtain-failed error.
    pub fn lock_failed<S: Into<String>>(msg: S) -> Self {
        NautexError::LockObtainFailed(msg.into())
    }

    /// Create a new stale-reader error.
    pub fn stale_reader<S: Into<String>>(msg: S) -> Self {
        NautexError::StaleReader(msg.into())
    }

    /// Create a new invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        NautexError::InvalidArgument(msg.into())
    }

    /// Create a new query-parse error.
    pub fn query_parse<S: Into<String>>(msg: S) -> Self {
        NautexError::QueryParse(msg.into())
    }

    /// Unexpected end of file while decoding; reported as corruption.
    pub fn eof<S: Into<String>>(msg: S) -> Self {
        NautexError::CorruptIndex(format!("unexpected EOF: {}", msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NautexError::corrupt("bad magic");
        assert_eq!(err.to_string(), "corrupt index: bad magic");

        let err = NautexError::lock_failed("write.lock held");
        assert_eq!(err.to_string(), "could not obtain lock: write.lock held");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "missing file");
        let err = NautexError::from(io_error);

        match err {
            NautexError::Io(_) => {}
            _ => panic!("expected Io variant"),
        }
    }
}
