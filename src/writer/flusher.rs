//! Background flushing on a fixed interval.

use super::LogWriter;
use crate::error::{Error, Result};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Flushes a shared writer every `interval` on a dedicated thread.
///
/// The thread exits when [`stop`](Self::stop) is called, when the flusher is
/// dropped, when the writer is closed, or after the first flush error (which
/// is logged).
pub struct PeriodicFlusher {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicFlusher {
    /// Start flushing `writer` every `interval`.
    pub fn spawn(writer: Arc<LogWriter>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::invalid_argument("flush interval must be > 0"));
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let handle = thread::Builder::new().name("tslog-flusher".to_string()).spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match writer.flush() {
                        Ok(()) => {}
                        Err(Error::WriterClosed) => {
                            log::debug!("Writer for {:?} closed, stopping flusher", writer.path());
                            break;
                        }
                        Err(e) => {
                            log::error!("Periodic flush of {:?} failed: {}", writer.path(), e);
                            break;
                        }
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;

        Ok(Self { stop_tx: Some(stop_tx), handle: Some(handle) })
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Whether the background thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The thread may already be gone; a closed channel is fine.
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Flusher thread panicked");
            }
        }
    }
}

impl Drop for PeriodicFlusher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
