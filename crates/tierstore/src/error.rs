//! Error types for tierstore

use std::io;

use thiserror::Error;

/// Result type alias for tierstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for blob store operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Blob file exists but does not decode
    #[error("Corrupt blob: {0}")]
    Corrupt(String),

    /// Namespace or key is not usable as a file name
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Key not found
    #[error("Key not found")]
    NotFound,
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        let reason = match err {
            nom::Err::Incomplete(_) => "truncated header".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{:?} ({} bytes remaining)", e.code, e.input.len())
            }
        };
        Error::Corrupt(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::NotFound.to_string(), "Key not found");
        assert_eq!(
            Error::InvalidName("../x".to_string()).to_string(),
            "Invalid name: \"../x\""
        );
    }

    #[test]
    fn test_io_source() {
        use std::error::Error as _;

        let err = Error::from(io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk gone"));
    }
}
