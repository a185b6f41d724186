//! Log capture for tests

use std::io;
use std::sync::{Arc, Mutex};
use tracing::Dispatch;

/// Collects formatted log output
#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// A dispatcher writing every event into the returned buffer
///
/// Install it with `tracing::dispatcher::with_default` on each thread whose
/// logs matter.
pub(crate) fn capture() -> (Dispatch, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    (Dispatch::new(subscriber), buffer)
}

/// Run `f` on this thread with its logs captured
pub(crate) fn with_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let (dispatch, buffer) = capture();
    let result = tracing::dispatcher::with_default(&dispatch, f);
    (result, buffer.contents())
}
