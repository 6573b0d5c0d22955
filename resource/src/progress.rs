//! Byte-count progress reporting.
//!
//! Progress is a side channel: transfers behave identically whether the sink
//! renders anything or discards every update.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives byte counts as transfers advance.
pub trait ProgressSink: Send + Sync {
    /// Record `bytes` more bytes transferred for `file`.
    fn advance(&self, file: &str, bytes: u64);
}

/// Discards every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn advance(&self, _file: &str, _bytes: u64) {}
}

/// Totals bytes across every file; safe to share between workers.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicU64,
}

impl ByteCounter {
    /// A counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ByteCounter {
    fn advance(&self, file: &str, bytes: u64) {
        let total = self.total.fetch_add(bytes, Ordering::Relaxed) + bytes;
        log::trace!("{file}: +{bytes} bytes ({total} total)");
    }
}

/// Wraps a reader and reports every successful read to a sink.
pub struct ProgressReader<'a, R> {
    inner: R,
    file: &'a str,
    sink: &'a dyn ProgressSink,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    /// Report reads of `inner` as progress on `file`.
    pub fn new(inner: R, file: &'a str, sink: &'a dyn ProgressSink) -> Self {
        Self { inner, file, sink }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read > 0 {
            self.sink
                .advance(self.file, u64::try_from(read).unwrap_or(u64::MAX));
        }
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_reader_reports_every_byte() {
        let counter = ByteCounter::new();
        let mut reader = ProgressReader::new(&b"a second file"[..], "a-second.txt", &counter);
        let mut sink = Vec::new();

        let copied = io::copy(&mut reader, &mut sink).expect("copies");
        assert_eq!(copied, 13);
        assert_eq!(counter.total(), 13);
        assert_eq!(sink, b"a second file");
    }

    #[test]
    fn counter_accumulates_across_files() {
        let counter = ByteCounter::new();
        counter.advance("a", 12);
        counter.advance("b", 25);
        assert_eq!(counter.total(), 37);
    }
}
