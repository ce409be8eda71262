//! Log writer.
//!
//! The writer owns the authoritative schema catalog of a file and a pending
//! row buffer per table. Rows become visible to readers only when their
//! table's buffer is flushed as one data block.
//!
//! ## Thread Safety
//!
//! `LogWriter` is `Send + Sync`. All state (catalog, pending buffers and the
//! file cursor) sits behind one mutex, so `write_row` from a sampling thread
//! and `flush` from a timer thread never interleave inside a flush.
//!
//! ## Failures
//!
//! If a write or sync fails, the file is cut back to the end of the last
//! committed record and the writer refuses all further work with
//! [`Error::WriterFailed`]. Reopening the file with [`LogWriter::open`]
//! resumes from that point.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tslog::{ColumnDef, LogWriter, Value, WriterOptions};
//!
//! # fn main() -> Result<(), tslog::Error> {
//! let writer = LogWriter::create("metrics.tslog", b"my-app/1", WriterOptions::default())?;
//! let heap = writer.define_table(
//!     "heap",
//!     "JVM heap usage",
//!     1000,
//!     vec![ColumnDef::new("used", "bytes in use", "bytes")],
//! )?;
//! writer.write_row(heap, 1_700_000_000_000, vec![Value::Int(1 << 20)])?;
//! writer.flush()?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

pub mod flusher;

pub use flusher::PeriodicFlusher;

use crate::block::{BlockBuilder, DataBlock, Value};
use crate::config::{SyncMode, WriterOptions};
use crate::error::{Error, Result};
use crate::format::record::{encode_data_blocks, encode_table_def, max_single_row_payload};
use crate::format::{FileHeader, FRAME_HEADER_SIZE};
use crate::reader::LogReader;
use crate::schema::{ColumnDef, SchemaCatalog, TableDef, TableId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Appends table definitions and data blocks to a log file.
pub struct LogWriter {
    /// Path to the log file
    path: PathBuf,
    /// Configuration options
    options: WriterOptions,
    /// Everything mutable, under one lock
    inner: Mutex<WriterInner>,
}

struct WriterInner {
    path: PathBuf,
    /// `None` once closed or failed
    file: Option<BufWriter<File>>,
    catalog: SchemaCatalog,
    /// Pending rows per table, flushed in table id order
    pending: BTreeMap<TableId, BlockBuilder>,
    /// Bytes handed to the file so far
    file_size: u64,
    /// End of the last record made visible by a commit
    committed: u64,
    failed: bool,
}

impl LogWriter {
    /// Create a new log file, replacing any existing file at `path`.
    ///
    /// `header` is an opaque blob stored once at the start of the file.
    pub fn create<P: AsRef<Path>>(
        path: P,
        header: &[u8],
        options: WriterOptions,
    ) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let header = FileHeader::new(header.to_vec()).encode()?;

        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;
        let mut inner = WriterInner {
            path: path.clone(),
            file: Some(BufWriter::with_capacity(options.write_buffer_size, file)),
            catalog: SchemaCatalog::new(),
            pending: BTreeMap::new(),
            file_size: 0,
            committed: 0,
            failed: false,
        };
        inner.append(&header)?;
        inner.commit(options.sync_mode)?;

        log::info!("Created metrics log {:?}", path);
        Ok(Self { path, options, inner: Mutex::new(inner) })
    }

    /// Reopen an existing log file for appending.
    ///
    /// The file is replayed to rebuild the catalog, so table ids continue
    /// where the previous writer stopped and names it defined stay taken. A
    /// torn record at the end (left by a writer that died mid-flush) is cut
    /// off before appending.
    pub fn open<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();

        let mut reader = LogReader::open(&path)?;
        while reader.read()?.is_some() {}
        if reader.header().is_none() {
            return Err(Error::corruption(format!("{:?} has no complete file header", path)));
        }

        let mut catalog = SchemaCatalog::new();
        for table in reader.tables() {
            catalog.insert(TableDef::clone(table))?;
        }
        let valid_len = reader.position();
        drop(reader);

        let file = OpenOptions::new().append(true).open(&path)?;
        let file_len = file.metadata()?.len();
        if file_len > valid_len {
            log::warn!(
                "Discarding {} bytes of incomplete record at end of {:?}",
                file_len - valid_len,
                path
            );
            file.set_len(valid_len)?;
        }

        log::info!("Opened metrics log {:?} with {} tables", path, catalog.len());
        let inner = WriterInner {
            path: path.clone(),
            file: Some(BufWriter::with_capacity(options.write_buffer_size, file)),
            catalog,
            pending: BTreeMap::new(),
            file_size: valid_len,
            committed: valid_len,
            failed: false,
        };
        Ok(Self { path, options, inner: Mutex::new(inner) })
    }

    /// Define a new table and append its definition to the file.
    ///
    /// The definition is visible to readers when this returns. Fails with
    /// [`Error::DuplicateTable`] if this writer already knows the name, and
    /// with [`Error::InvalidArgument`] if a single row of the table could
    /// not fit in one record. The file is left unchanged in both cases.
    pub fn define_table(
        &self,
        name: &str,
        description: &str,
        sample_interval_millis: u64,
        columns: Vec<ColumnDef>,
    ) -> Result<TableId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.ensure_open()?;

        let table = TableDef {
            id: TableId::default(),
            name: name.to_string(),
            description: description.to_string(),
            sample_interval_millis,
            columns,
        };
        inner.catalog.check(&table)?;

        let max_record_size = self.options.max_record_size;
        let row_size = max_single_row_payload(table.column_count())?;
        if row_size > max_record_size {
            return Err(Error::invalid_argument(format!(
                "a row of table '{}' may encode to {} bytes, above the {} byte record limit",
                table.name, row_size, max_record_size
            )));
        }

        let record = encode_table_def(&table)?;
        check_record_size(&record, "table definition", max_record_size)?;
        inner.append(&record)?;
        inner.commit(self.options.sync_mode)?;
        let table = inner.catalog.insert(table)?;

        log::debug!("Defined table '{}' as id {} in {:?}", table.name, table.id, self.path);
        Ok(table.id)
    }

    /// Buffer one row for a table.
    ///
    /// The row is not on disk until the table is flushed, either explicitly
    /// or because it reached `max_buffered_rows` pending rows.
    pub fn write_row(
        &self,
        table_id: TableId,
        timestamp_millis: i64,
        values: Vec<Value>,
    ) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.ensure_open()?;

        let table = inner.catalog.get(table_id).ok_or(Error::UnknownTable(table_id))?;
        if values.len() != table.column_count() {
            return Err(Error::SchemaMismatch {
                table: table.name.clone(),
                expected: table.column_count(),
                actual: values.len(),
            });
        }

        let builder =
            inner.pending.entry(table_id).or_insert_with(|| BlockBuilder::new(table_id));
        builder.add(timestamp_millis, values);

        if builder.len() >= self.options.max_buffered_rows {
            inner.flush_table(table_id, self.options.max_record_size)?;
            inner.commit(self.options.sync_mode)?;
        }
        Ok(())
    }

    /// Write every table's pending rows as data blocks.
    ///
    /// Each table's rows form one block, or several consecutive blocks when
    /// one would exceed `max_record_size`. Appends nothing when no rows are
    /// pending.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.flush_all(&self.options)
    }

    /// Flush and release the file. Closing twice is a no-op.
    ///
    /// Returns [`Error::WriterFailed`] if an earlier write failed.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.failed {
            return Err(Error::WriterFailed);
        }
        if inner.file.is_none() {
            return Ok(());
        }
        inner.close(&self.options)?;
        log::info!("Closed metrics log {:?} ({} bytes)", self.path, inner.file_size);
        Ok(())
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        let inner = self.inner.lock();
        inner.file.is_none() && !inner.failed
    }

    /// Whether a write or sync failed and the writer stopped accepting work.
    pub fn is_failed(&self) -> bool {
        self.inner.lock().failed
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the file so far, including bytes still buffered.
    ///
    /// After a failure this is the committed length the file was cut back to.
    pub fn file_size(&self) -> u64 {
        self.inner.lock().file_size
    }

    /// Rows buffered across all tables.
    pub fn pending_rows(&self) -> usize {
        self.inner.lock().pending.values().map(BlockBuilder::len).sum()
    }

    /// Definition of a table defined by this writer.
    pub fn table(&self, id: TableId) -> Option<Arc<TableDef>> {
        self.inner.lock().catalog.get(id).cloned()
    }

    /// Id of a table by name.
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.inner.lock().catalog.get_by_name(name).map(|t| t.id)
    }

    /// All tables known to this writer, in definition order.
    pub fn tables(&self) -> Vec<Arc<TableDef>> {
        self.inner.lock().catalog.iter().cloned().collect()
    }
}

impl WriterInner {
    fn ensure_open(&self) -> Result<()> {
        if self.failed {
            return Err(Error::WriterFailed);
        }
        if self.file.is_none() {
            return Err(Error::WriterClosed);
        }
        Ok(())
    }

    fn append(&mut self, record: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::WriterClosed)?;
        if let Err(e) = file.write_all(record) {
            return Err(self.fail(e));
        }
        self.file_size += record.len() as u64;
        Ok(())
    }

    /// Make appended bytes visible to readers, and durable under `Fsync`.
    fn commit(&mut self, sync_mode: SyncMode) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::WriterClosed)?;
        let result = file.flush().and_then(|()| match sync_mode {
            SyncMode::Fsync => file.get_ref().sync_data(),
            SyncMode::Flush => Ok(()),
        });
        if let Err(e) = result {
            return Err(self.fail(e));
        }
        self.committed = self.file_size;
        Ok(())
    }

    /// Drop everything after the last commit and stop accepting writes.
    fn fail(&mut self, err: io::Error) -> Error {
        if let Some(file) = self.file.take() {
            // Discard the buffer without writing it
            let (file, _) = file.into_parts();
            drop(file);
        }
        self.failed = true;

        let rollback = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|file| {
                file.set_len(self.committed)?;
                file.sync_all()
            });
        match rollback {
            Ok(()) => log::error!(
                "Write to {:?} failed, truncated to {} committed bytes: {}",
                self.path,
                self.committed,
                err
            ),
            Err(e) => log::error!(
                "Write to {:?} failed ({}) and truncating to {} bytes failed: {}",
                self.path,
                err,
                self.committed,
                e
            ),
        }
        self.file_size = self.committed;
        Error::Io(err)
    }

    /// Append the table's pending rows as one or more blocks. Returns false
    /// if none were pending.
    ///
    /// Every record is encoded before the first one is appended. Rows that
    /// were not appended are put back into the table's buffer.
    fn flush_table(&mut self, table_id: TableId, max_record_size: usize) -> Result<bool> {
        let block = match self.pending.get_mut(&table_id).and_then(BlockBuilder::take) {
            Some(block) => block,
            None => return Ok(false),
        };

        let records = match encode_data_blocks(&block, max_record_size) {
            Ok(records) => records,
            Err(e) => {
                self.restore(block);
                return Err(e);
            }
        };

        let start = self.file_size;
        for record in &records {
            if let Err(e) = self.append(record) {
                self.restore(block);
                return Err(e);
            }
        }

        log::debug!(
            "Flushed {} rows for table {} as {} blocks ({} bytes)",
            block.len(),
            table_id,
            records.len(),
            self.file_size - start
        );
        Ok(true)
    }

    fn restore(&mut self, block: DataBlock) {
        let table_id = block.table_id;
        self.pending
            .entry(table_id)
            .or_insert_with(|| BlockBuilder::new(table_id))
            .restore(block);
    }

    fn flush_all(&mut self, options: &WriterOptions) -> Result<()> {
        let ids: Vec<TableId> =
            self.pending.iter().filter(|(_, b)| !b.is_empty()).map(|(id, _)| *id).collect();
        if ids.is_empty() {
            return Ok(());
        }

        for id in ids {
            self.flush_table(id, options.max_record_size)?;
        }
        self.commit(options.sync_mode)
    }

    fn close(&mut self, options: &WriterOptions) -> Result<()> {
        self.flush_all(options)?;
        self.commit(options.sync_mode)?;
        self.file = None;
        self.pending.clear();
        Ok(())
    }
}

fn check_record_size(record: &[u8], what: &str, max_record_size: usize) -> Result<()> {
    let payload = record.len() - FRAME_HEADER_SIZE;
    if payload > max_record_size {
        return Err(Error::invalid_argument(format!(
            "{} payload of {} bytes exceeds the {} byte record limit",
            what, payload, max_record_size
        )));
    }
    Ok(())
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.file.is_some() {
            // Best effort close on drop
            if let Err(e) = inner.close(&self.options) {
                log::error!("Error closing metrics log {:?} during drop: {}", self.path, e);
            }
        }
    }
}
