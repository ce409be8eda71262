//! # tslog - An Embedded Time-Series Metrics Log
//!
//! tslog records numeric samples into named tables inside a single
//! append-only file. One writer appends; any number of readers replay the
//! file for range queries or tail it live while the writer is still running.
//!
//! ## Architecture
//!
//! - **Format**: a small file header, then length-prefixed, type-tagged records
//! - **Schema Catalog**: table name → id → columns, rebuilt by every reader
//! - **Writer**: buffers rows per table and appends them as data blocks on flush
//! - **Reader**: decodes records in order; an incomplete tail means "no data yet"
//! - **Tailer**: polls a reader and hands new tables and rows to a handler
//! - **Query Engine**: full scans with time range filtering and multi-table merge
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tslog::{ColumnDef, LogWriter, Value, WriterOptions};
//!
//! # fn main() -> Result<(), tslog::Error> {
//! let writer = LogWriter::create("metrics.tslog", b"demo", WriterOptions::default())?;
//! let cpu = writer.define_table(
//!     "cpu",
//!     "process CPU usage",
//!     1000,
//!     vec![ColumnDef::new("user", "user time", "ms"), ColumnDef::new("sys", "system time", "ms")],
//! )?;
//!
//! writer.write_row(cpu, 1_700_000_000_000, vec![Value::Int(12), Value::Int(3)])?;
//! writer.write_row(cpu, 1_700_000_001_000, vec![Value::Int(15), Value::Int(4)])?;
//! writer.flush()?;
//!
//! for record in tslog::get_time_series_data("metrics.tslog", "cpu", 0, i64::MAX)? {
//!     let record = record?;
//!     println!("{} user={:?}", record.timestamp, record.get("user"));
//! }
//!
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod block;
pub mod config;
pub mod error;
pub mod format;
pub mod query;
pub mod reader;
pub mod schema;
pub mod writer;

// Re-exports
pub use block::{DataBlock, Row, TimedRow, Value};
pub use config::{ReaderOptions, SyncMode, WriterOptions};
pub use error::{Error, Result};
pub use query::{
    get_merged_time_series, get_table_defs, get_time_series_data, MergedTimeSeries, QueryEngine,
    TimeSeries, TimeSeriesRecord,
};
pub use reader::{LogReader, ReaderState, Record, TailHandler, Tailer};
pub use schema::{ColumnDef, SchemaCatalog, TableDef, TableId};
pub use writer::{LogWriter, PeriodicFlusher};
