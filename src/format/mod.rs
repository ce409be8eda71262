//! On-disk layout of a metrics log.
//!
//! ```text
//! FILE        := FILE_HEADER RECORD*
//! FILE_HEADER := MAGIC("TSLG") VERSION(u16) BLOB_LEN(u32) BLOB CRC32(BLOB)
//! RECORD      := TYPE(u8) LENGTH(u32) PAYLOAD(LENGTH bytes)
//! ```
//!
//! All integers are little-endian. The header blob is opaque and chosen by
//! the embedding application. Record payloads are JSON objects keyed by field
//! name, so readers skip fields they do not know and default missing ones;
//! the explicit length lets a reader step over a record without decoding it
//! and detect a record that has not been completely written yet.
//!
//! Decoding functions return `Ok(None)` when the buffer ends before the
//! item does. That is how a torn or still-being-written tail is reported,
//! and it is never an error.

pub mod header;
pub mod record;

pub use header::FileHeader;
pub use record::{Frame, RecordType, FRAME_HEADER_SIZE};

/// Magic bytes at the start of every log file.
pub const MAGIC: [u8; 4] = *b"TSLG";

/// Current file format version.
pub const FORMAT_VERSION: u16 = 1;

/// Largest payload a single record may carry (64MB).
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Largest header blob accepted (1MB).
pub const MAX_HEADER_BLOB_SIZE: usize = 1024 * 1024;
