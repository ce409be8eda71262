//! Configuration options for writers and readers.

use crate::format::MAX_RECORD_SIZE;

/// How far `flush` pushes committed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Flush the stream and fsync the file data (durable across power loss).
    #[default]
    Fsync,
    /// Flush the stream to the OS only (visible to readers, not fsynced).
    Flush,
}

/// Configuration options for a [`LogWriter`](crate::LogWriter).
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Pending rows per table before that table is flushed automatically.
    /// Default: 1024
    pub max_buffered_rows: usize,

    /// Durability level applied on every flush.
    /// Default: SyncMode::Fsync
    pub sync_mode: SyncMode,

    /// Capacity of the in-process write buffer (in bytes).
    /// Default: 64KB
    pub write_buffer_size: usize,

    /// Largest record payload the writer produces. Pending rows that encode
    /// larger are written as several consecutive blocks.
    /// Default: 64MB
    pub max_record_size: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            max_buffered_rows: 1024,
            sync_mode: SyncMode::default(),
            write_buffer_size: 64 * 1024, // 64KB
            max_record_size: MAX_RECORD_SIZE,
        }
    }
}

impl WriterOptions {
    /// Creates a new WriterOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-table pending row threshold.
    pub fn max_buffered_rows(mut self, rows: usize) -> Self {
        self.max_buffered_rows = rows;
        self
    }

    /// Sets the sync mode used by flush.
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    /// Sets the write buffer capacity.
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Sets the largest record payload the writer produces.
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_buffered_rows == 0 {
            return Err(crate::Error::invalid_argument("max_buffered_rows must be > 0"));
        }
        if self.write_buffer_size == 0 {
            return Err(crate::Error::invalid_argument("write_buffer_size must be > 0"));
        }
        // Readers reject anything above MAX_RECORD_SIZE by default
        if self.max_record_size == 0 || self.max_record_size > MAX_RECORD_SIZE {
            return Err(crate::Error::invalid_argument(format!(
                "max_record_size must be between 1 and {}",
                MAX_RECORD_SIZE
            )));
        }
        Ok(())
    }
}

/// Configuration options for a [`LogReader`](crate::LogReader).
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Largest record payload accepted before the file is declared corrupt.
    /// Default: 64MB
    pub max_record_size: usize,

    /// Bytes requested from the file per read call.
    /// Default: 64KB
    pub read_chunk_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { max_record_size: MAX_RECORD_SIZE, read_chunk_size: 64 * 1024 }
    }
}

impl ReaderOptions {
    /// Creates a new ReaderOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum accepted record payload size.
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Sets the read chunk size.
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_record_size == 0 || self.max_record_size > u32::MAX as usize {
            return Err(crate::Error::invalid_argument(
                "max_record_size must be between 1 and u32::MAX",
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(crate::Error::invalid_argument("read_chunk_size must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = WriterOptions::default();
        assert_eq!(opts.max_buffered_rows, 1024);
        assert_eq!(opts.sync_mode, SyncMode::Fsync);
        assert_eq!(opts.max_record_size, MAX_RECORD_SIZE);

        let opts = ReaderOptions::default();
        assert_eq!(opts.max_record_size, MAX_RECORD_SIZE);
    }

    #[test]
    fn test_options_builder() {
        let opts = WriterOptions::new()
            .max_buffered_rows(16)
            .sync_mode(SyncMode::Flush)
            .write_buffer_size(512)
            .max_record_size(4096);

        assert_eq!(opts.max_record_size, 4096);
        assert_eq!(opts.max_buffered_rows, 16);
        assert_eq!(opts.sync_mode, SyncMode::Flush);
        assert_eq!(opts.write_buffer_size, 512);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = WriterOptions::default();
        assert!(opts.validate().is_ok());

        opts.max_buffered_rows = 0;
        assert!(opts.validate().is_err());

        let mut opts = WriterOptions::default();
        opts.max_record_size = 0;
        assert!(opts.validate().is_err());
        opts.max_record_size = MAX_RECORD_SIZE + 1;
        assert!(opts.validate().is_err());

        let mut opts = ReaderOptions::default();
        assert!(opts.validate().is_ok());

        opts.max_record_size = 0;
        assert!(opts.validate().is_err());

        opts.max_record_size = 1024;
        opts.read_chunk_size = 0;
        assert!(opts.validate().is_err());
    }
}
