//! Live tailing of a log that is still being written.

use super::{LogReader, Record};
use crate::block::TimedRow;
use crate::error::{Error, Result};
use crate::schema::ColumnDef;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receives records observed by a [`Tailer`].
pub trait TailHandler {
    /// A table definition was read.
    fn new_table(&mut self, name: &str, columns: &[ColumnDef]);

    /// Rows at or after the tail's start timestamp were read.
    fn new_data(&mut self, table_name: &str, rows: &[TimedRow]);

    /// Asked after each idle poll; `true` ends the tail loop.
    fn finish(&mut self) -> bool;
}

impl<H: TailHandler + ?Sized> TailHandler for &mut H {
    fn new_table(&mut self, name: &str, columns: &[ColumnDef]) {
        (**self).new_table(name, columns)
    }

    fn new_data(&mut self, table_name: &str, rows: &[TimedRow]) {
        (**self).new_data(table_name, rows)
    }

    fn finish(&mut self) -> bool {
        (**self).finish()
    }
}

/// Polls a [`LogReader`] and forwards everything it decodes to a handler.
///
/// The loop is blocking and single threaded. When the reader has nothing new
/// it sleeps for the poll interval and then asks the handler whether to stop,
/// so shutdown takes at most one poll interval after `finish` would first
/// return `true`.
pub struct Tailer {
    reader: LogReader,
}

impl Tailer {
    /// Tail through an existing reader.
    pub fn new(reader: LogReader) -> Self {
        Self { reader }
    }

    /// Open a file for tailing from its first byte.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(LogReader::open(path)?))
    }

    /// Run the tail loop until `handler.finish()` returns true.
    ///
    /// Rows with a timestamp before `from_timestamp` are dropped. Read errors
    /// end the loop and are returned.
    pub fn tail<H: TailHandler + ?Sized>(
        &mut self,
        poll_interval: Duration,
        from_timestamp: i64,
        handler: &mut H,
    ) -> Result<()> {
        loop {
            match self.reader.read()? {
                Some(Record::TableDef(table)) => {
                    handler.new_table(&table.name, &table.columns);
                }
                Some(Record::DataBlock(block)) => {
                    let table_id = block.table_id;
                    let rows: Vec<TimedRow> = block
                        .into_timed_rows()
                        .filter(|row| row.timestamp >= from_timestamp)
                        .collect();
                    if !rows.is_empty() {
                        // read() only yields blocks whose table it has resolved
                        let table =
                            self.reader.table(table_id).ok_or(Error::UnresolvedTable(table_id))?;
                        handler.new_data(&table.name, &rows);
                    }
                }
                None => {
                    thread::sleep(poll_interval);
                    if handler.finish() {
                        log::debug!(
                            "Tail of {:?} finished at position {}",
                            self.reader.path(),
                            self.reader.position()
                        );
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run the tail loop on a new thread, handing the handler back on exit.
    pub fn spawn<H>(
        mut self,
        poll_interval: Duration,
        from_timestamp: i64,
        mut handler: H,
    ) -> JoinHandle<Result<H>>
    where
        H: TailHandler + Send + 'static,
    {
        thread::spawn(move || {
            self.tail(poll_interval, from_timestamp, &mut handler)?;
            Ok(handler)
        })
    }

    /// The underlying reader.
    pub fn reader(&self) -> &LogReader {
        &self.reader
    }

    /// Take back the underlying reader.
    pub fn into_reader(self) -> LogReader {
        self.reader
    }
}
