//! Sequential log reader.
//!
//! A [`LogReader`] decodes a log file record by record, starting at byte 0.
//! It learns table definitions only from the records it has itself read, so
//! it can decode data blocks without any outside knowledge of the writer.
//!
//! The reader never treats the end of the file as an error. When the bytes
//! for the next record (or the header) are not all there yet, because the
//! writer is mid-flush or died mid-append, `read` returns `Ok(None)`. A later
//! call resumes from the same position and picks up whatever has been
//! appended since. The [`Tailer`] builds a polling loop on top of that.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tslog::{LogReader, Record};
//!
//! # fn main() -> Result<(), tslog::Error> {
//! let mut reader = LogReader::open("metrics.tslog")?;
//! while let Some(record) = reader.read()? {
//!     match record {
//!         Record::TableDef(table) => println!("table {}", table.name),
//!         Record::DataBlock(block) => println!("{} rows", block.len()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod tailer;

pub use tailer::{TailHandler, Tailer};

use crate::block::DataBlock;
use crate::config::ReaderOptions;
use crate::error::{Error, Result};
use crate::format::record::{decode_data_block, decode_frame, decode_table_def};
use crate::format::{FileHeader, RecordType};
use crate::schema::{SchemaCatalog, TableDef, TableId};
use bytes::{Buf, BytesMut};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A table definition, with the id this reader assigned to it.
    TableDef(Arc<TableDef>),
    /// A batch of rows for a previously defined table.
    DataBlock(DataBlock),
}

/// Lifecycle of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Opened, nothing decoded yet.
    Open,
    /// The last call produced a record.
    Scanning,
    /// The last call found no complete record; more may arrive later.
    Exhausted,
    /// Closed; every further read fails.
    Closed,
}

/// Log reader
pub struct LogReader {
    path: PathBuf,
    file: Option<File>,
    options: ReaderOptions,
    /// Bytes read from the file but not yet consumed
    buffer: BytesMut,
    /// Bytes consumed from the start of the file
    position: u64,
    header: Option<FileHeader>,
    catalog: SchemaCatalog,
    state: ReaderState,
    /// Fatal error replayed on every later read
    failed: Option<Error>,
}

impl LogReader {
    /// Open a log file for reading with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    /// Open a log file for reading.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        Ok(Self {
            path,
            file: Some(file),
            buffer: BytesMut::with_capacity(options.read_chunk_size),
            options,
            position: 0,
            header: None,
            catalog: SchemaCatalog::new(),
            state: ReaderState::Open,
            failed: None,
        })
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` if no complete record is available yet.
    pub fn read(&mut self) -> Result<Option<Record>> {
        if self.state == ReaderState::Closed {
            return Err(Error::ReaderClosed);
        }
        if let Some(err) = self.failed.as_ref().and_then(Error::sticky_copy) {
            return Err(err);
        }

        loop {
            match self.decode_next() {
                Ok(Some(record)) => {
                    self.state = ReaderState::Scanning;
                    return Ok(Some(record));
                }
                Ok(None) => {
                    if !self.fill()? {
                        self.state = ReaderState::Exhausted;
                        return Ok(None);
                    }
                }
                Err(err) => {
                    self.failed = err.sticky_copy();
                    return Err(err);
                }
            }
        }
    }

    /// Decode one record from the buffered bytes, if they hold a complete one.
    fn decode_next(&mut self) -> Result<Option<Record>> {
        if self.header.is_none() {
            match FileHeader::decode(&self.buffer)? {
                Some((header, size)) => {
                    self.consume(size);
                    self.header = Some(header);
                }
                None => return Ok(None),
            }
        }

        loop {
            let frame = match decode_frame(&self.buffer, self.options.max_record_size)? {
                Some(frame) => frame,
                None => return Ok(None),
            };
            let size = frame.encoded_size();

            let record = match RecordType::from_u8(frame.tag) {
                Some(RecordType::TableDef) => {
                    let table = decode_table_def(frame.payload)?;
                    let position = self.position;
                    let table = self.catalog.insert(table).map_err(|e| {
                        Error::corruption(format!(
                            "Invalid table definition at {}: {}",
                            position, e
                        ))
                    })?;
                    Record::TableDef(table)
                }
                Some(RecordType::DataBlock) => {
                    let block = decode_data_block(frame.payload)?;
                    self.check_block(&block)?;
                    Record::DataBlock(block)
                }
                None => {
                    log::warn!(
                        "Skipping record with unknown type {} ({} bytes) at position {} in {:?}",
                        frame.tag,
                        size,
                        self.position,
                        self.path
                    );
                    self.consume(size);
                    continue;
                }
            };

            self.consume(size);
            return Ok(Some(record));
        }
    }

    fn check_block(&self, block: &DataBlock) -> Result<()> {
        let table =
            self.catalog.get(block.table_id).ok_or(Error::UnresolvedTable(block.table_id))?;
        let expected = table.column_count();
        if let Some(row) = block.rows.iter().find(|row| row.values.len() != expected) {
            return Err(Error::corruption(format!(
                "Row in table '{}' at position {} has {} values, expected {}",
                table.name,
                self.position,
                row.values.len(),
                expected
            )));
        }
        Ok(())
    }

    fn consume(&mut self, size: usize) {
        self.buffer.advance(size);
        self.position += size as u64;
    }

    /// Pull more bytes from the file. Returns false at the current end of file.
    fn fill(&mut self) -> Result<bool> {
        let file = self.file.as_mut().ok_or(Error::ReaderClosed)?;
        let start = self.buffer.len();
        self.buffer.resize(start + self.options.read_chunk_size, 0);

        let read = loop {
            match file.read(&mut self.buffer[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(Error::Io(e));
                }
            }
        };

        self.buffer.truncate(start + read);
        Ok(read > 0)
    }

    /// The file header, once it has been decoded.
    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    /// The application blob from the file header, once it has been decoded.
    pub fn header_blob(&self) -> Option<&[u8]> {
        self.header.as_ref().map(|h| h.blob.as_slice())
    }

    /// Number of bytes consumed by decoded records, header included.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Table seen by this reader.
    pub fn table(&self, id: TableId) -> Option<&Arc<TableDef>> {
        self.catalog.get(id)
    }

    /// Tables seen so far, in definition order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDef>> {
        self.catalog.iter()
    }

    /// Path of the file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the file handle. Later reads fail with [`Error::ReaderClosed`].
    pub fn close(&mut self) {
        self.file = None;
        self.buffer.clear();
        self.state = ReaderState::Closed;
    }
}
