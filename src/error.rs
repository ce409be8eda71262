//! Error types for the tslog metrics store.

use crate::schema::TableId;
use std::io;
use thiserror::Error;

/// The result type used throughout tslog.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for tslog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file contents are not a valid log.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A table with this name was already defined by this writer.
    #[error("Table already defined: {0}")]
    DuplicateTable(String),

    /// `write_row` was given an id this writer never handed out.
    #[error("Unknown table id: {0}")]
    UnknownTable(TableId),

    /// A row's value count does not match its table's column count.
    #[error("Schema mismatch for table '{table}': expected {expected} values, got {actual}")]
    SchemaMismatch {
        /// Name of the table the row was written to.
        table: String,
        /// Number of columns of the table.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// A data block referenced a table this reader has not seen defined.
    #[error("Data block references table id {0} with no preceding definition")]
    UnresolvedTable(TableId),

    /// The writer has been closed.
    #[error("Writer is closed")]
    WriterClosed,

    /// An earlier write or sync failed; the file was cut back to its last
    /// committed record and the writer accepts nothing more.
    #[error("Writer failed after an earlier I/O error")]
    WriterFailed,

    /// The reader has been closed.
    #[error("Reader is closed")]
    ReaderClosed,
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Returns a copy of errors that make a reader permanently unusable.
    ///
    /// Used to replay the same failure on every later `read` call.
    pub(crate) fn sticky_copy(&self) -> Option<Self> {
        match self {
            Error::UnresolvedTable(id) => Some(Error::UnresolvedTable(*id)),
            Error::Corruption(msg) => Some(Error::Corruption(msg.clone())),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad magic");
        assert_eq!(err.to_string(), "Data corruption: bad magic");

        let err = Error::SchemaMismatch { table: "gr1".to_string(), expected: 2, actual: 3 };
        assert_eq!(
            err.to_string(),
            "Schema mismatch for table 'gr1': expected 2 values, got 3"
        );

        let err = Error::UnresolvedTable(TableId(7));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_sticky_copy() {
        assert!(matches!(
            Error::UnresolvedTable(TableId(1)).sticky_copy(),
            Some(Error::UnresolvedTable(TableId(1)))
        ));
        assert!(Error::WriterClosed.sticky_copy().is_none());
        assert!(Error::WriterFailed.sticky_copy().is_none());
    }
}
