//! File header: magic, version and the caller's opaque blob.

use super::{FORMAT_VERSION, MAGIC, MAX_HEADER_BLOB_SIZE};
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;

/// Size of the fixed part before the blob (magic + version + length).
pub const HEADER_PREFIX_SIZE: usize = 10;

/// Size of the checksum after the blob.
pub const HEADER_CHECKSUM_SIZE: usize = 4;

/// Decoded file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version the file was written with.
    pub version: u16,
    /// Application-supplied blob.
    pub blob: Vec<u8>,
}

impl FileHeader {
    /// Create a header for the current format version.
    pub fn new(blob: Vec<u8>) -> Self {
        Self { version: FORMAT_VERSION, blob }
    }

    /// Total encoded size.
    pub fn encoded_size(&self) -> usize {
        HEADER_PREFIX_SIZE + self.blob.len() + HEADER_CHECKSUM_SIZE
    }

    /// Encode the header.
    ///
    /// Format: [magic: 4][version: u16][blob_len: u32][blob][crc32: u32]
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.blob.len() > MAX_HEADER_BLOB_SIZE {
            return Err(Error::invalid_argument(format!(
                "header blob too large: {} bytes (max {})",
                self.blob.len(),
                MAX_HEADER_BLOB_SIZE
            )));
        }

        let mut buf = BytesMut::with_capacity(self.encoded_size());
        buf.put_slice(&MAGIC);
        buf.put_u16_le(self.version);
        buf.put_u32_le(self.blob.len() as u32);
        buf.put_slice(&self.blob);
        buf.put_u32_le(checksum(&self.blob));
        Ok(buf.to_vec())
    }

    /// Decode a header from the start of `data`.
    ///
    /// Returns the header and the number of bytes it occupies, or `None` if
    /// `data` ends before the header does.
    pub fn decode(data: &[u8]) -> Result<Option<(Self, usize)>> {
        // Reject foreign files as soon as the bytes we have disagree.
        let seen = data.len().min(MAGIC.len());
        if data[..seen] != MAGIC[..seen] {
            return Err(Error::corruption(format!(
                "Invalid magic: expected {:?}, got {:?}",
                MAGIC,
                &data[..seen]
            )));
        }
        if data.len() < HEADER_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = &data[MAGIC.len()..HEADER_PREFIX_SIZE];
        let version = prefix.get_u16_le();
        let blob_len = prefix.get_u32_le() as usize;

        if version == 0 || version > FORMAT_VERSION {
            return Err(Error::corruption(format!("Unsupported format version: {}", version)));
        }
        if blob_len > MAX_HEADER_BLOB_SIZE {
            return Err(Error::corruption(format!("Header blob length {} too large", blob_len)));
        }

        let total = HEADER_PREFIX_SIZE + blob_len + HEADER_CHECKSUM_SIZE;
        if data.len() < total {
            return Ok(None);
        }

        let blob = &data[HEADER_PREFIX_SIZE..HEADER_PREFIX_SIZE + blob_len];
        let mut trailer = &data[HEADER_PREFIX_SIZE + blob_len..total];
        let stored = trailer.get_u32_le();
        let actual = checksum(blob);
        if stored != actual {
            return Err(Error::corruption(format!(
                "Header checksum mismatch: expected {:#x}, got {:#x}",
                stored, actual
            )));
        }

        Ok(Some((Self { version, blob: blob.to_vec() }, total)))
    }
}

fn checksum(blob: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(blob);
    hasher.finalize()
}
