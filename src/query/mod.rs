//! Range queries over a complete log file.
//!
//! Every query opens a fresh [`LogReader`] at byte 0 and replays the whole
//! file; there is no index. Results are lazy iterators that stop at the
//! first point where the reader has no complete record, so querying a file
//! that is still being written returns everything flushed so far.
//!
//! ```rust,no_run
//! # fn main() -> Result<(), tslog::Error> {
//! for record in tslog::get_time_series_data("metrics.tslog", "heap", 0, i64::MAX)? {
//!     let record = record?;
//!     println!("{} used={:?}", record.timestamp, record.get("used"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod merge;

pub use merge::MergedTimeSeries;

use crate::block::Value;
use crate::config::ReaderOptions;
use crate::error::{Error, Result};
use crate::reader::{LogReader, Record};
use crate::schema::TableDef;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

/// One row of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRecord {
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Table the row belongs to.
    pub table: Arc<TableDef>,
    /// One value per column, in column order.
    pub values: Vec<Value>,
}

impl TimeSeriesRecord {
    /// Name of the row's table.
    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    /// Value of the named column.
    pub fn get(&self, column: &str) -> Option<Value> {
        self.table.column_index(column).and_then(|i| self.values.get(i).copied())
    }

    /// `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        self.table.column_names().zip(self.values.iter().copied())
    }

    /// Column name → value map.
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.iter().map(|(name, value)| (name.to_string(), value)).collect()
    }
}

/// Rows of one table within `[from, to)`, in file order.
///
/// Finite and not restartable; run the query again to rescan.
pub struct TimeSeries {
    /// `None` once the scan has ended
    reader: Option<LogReader>,
    table_name: String,
    target: Option<Arc<TableDef>>,
    from: i64,
    to: i64,
    buffered: VecDeque<TimeSeriesRecord>,
}

impl TimeSeries {
    fn new(reader: LogReader, table_name: &str, from: i64, to: i64) -> Self {
        Self {
            reader: Some(reader),
            table_name: table_name.to_string(),
            target: None,
            from,
            to,
            buffered: VecDeque::new(),
        }
    }

    /// Name of the queried table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl Iterator for TimeSeries {
    type Item = Result<TimeSeriesRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Some(Ok(record));
            }

            let reader = self.reader.as_mut()?;
            match reader.read() {
                Ok(Some(Record::TableDef(table))) => {
                    if table.name == self.table_name {
                        self.target = Some(table);
                    }
                }
                Ok(Some(Record::DataBlock(block))) => {
                    let table = match &self.target {
                        Some(table) if table.id == block.table_id => Arc::clone(table),
                        _ => continue,
                    };
                    let (from, to) = (self.from, self.to);
                    self.buffered.extend(
                        block
                            .into_timed_rows()
                            .filter(|row| row.timestamp >= from && row.timestamp < to)
                            .map(|row| TimeSeriesRecord {
                                timestamp: row.timestamp,
                                table: Arc::clone(&table),
                                values: row.values,
                            }),
                    );
                }
                Ok(None) => {
                    self.reader = None;
                    return None;
                }
                Err(e) => {
                    self.reader = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Runs queries with a fixed set of reader options.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    options: ReaderOptions,
}

impl QueryEngine {
    /// Create an engine using the given reader options.
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    fn open<P: AsRef<Path>>(&self, path: P) -> Result<LogReader> {
        LogReader::open_with_options(path, self.options.clone())
    }

    /// Rows of `table_name` with `from <= timestamp < to`.
    pub fn get_time_series_data<P: AsRef<Path>>(
        &self,
        path: P,
        table_name: &str,
        from: i64,
        to: i64,
    ) -> Result<TimeSeries> {
        if from > to {
            return Err(Error::invalid_argument(format!("empty time range [{}, {})", from, to)));
        }
        Ok(TimeSeries::new(self.open(path)?, table_name, from, to))
    }

    /// Table definitions whose name satisfies `predicate`, in definition order.
    pub fn get_table_defs<P, F>(&self, path: P, mut predicate: F) -> Result<Vec<Arc<TableDef>>>
    where
        P: AsRef<Path>,
        F: FnMut(&str) -> bool,
    {
        let mut reader = self.open(path)?;
        let mut tables = Vec::new();
        while let Some(record) = reader.read()? {
            if let Record::TableDef(table) = record {
                if predicate(&table.name) {
                    tables.push(table);
                }
            }
        }
        Ok(tables)
    }

    /// Rows of several tables merged into one chronological stream.
    ///
    /// Rows with equal timestamps come out in the order their tables appear
    /// in `table_names`. Each table's own rows keep their write order.
    pub fn get_merged_time_series<P: AsRef<Path>, S: AsRef<str>>(
        &self,
        path: P,
        table_names: &[S],
        from: i64,
        to: i64,
    ) -> Result<MergedTimeSeries> {
        let sources = table_names
            .iter()
            .map(|name| self.get_time_series_data(path.as_ref(), name.as_ref(), from, to))
            .collect::<Result<Vec<_>>>()?;
        Ok(MergedTimeSeries::new(sources))
    }
}

/// [`QueryEngine::get_time_series_data`] with default options.
pub fn get_time_series_data<P: AsRef<Path>>(
    path: P,
    table_name: &str,
    from: i64,
    to: i64,
) -> Result<TimeSeries> {
    QueryEngine::default().get_time_series_data(path, table_name, from, to)
}

/// [`QueryEngine::get_table_defs`] with default options.
pub fn get_table_defs<P, F>(path: P, predicate: F) -> Result<Vec<Arc<TableDef>>>
where
    P: AsRef<Path>,
    F: FnMut(&str) -> bool,
{
    QueryEngine::default().get_table_defs(path, predicate)
}

/// [`QueryEngine::get_merged_time_series`] with default options.
pub fn get_merged_time_series<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    table_names: &[S],
    from: i64,
    to: i64,
) -> Result<MergedTimeSeries> {
    QueryEngine::default().get_merged_time_series(path, table_names, from, to)
}
