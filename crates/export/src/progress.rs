//! Byte-counting stream wrappers and the live export progress handle.
//!
//! A wrapper belongs to one export/import call and counts with plain
//! integers. [`ExportProgress`] is the shared view a caller polls while the
//! call runs.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Read buffer used for import sources.
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Units transferred so far against an optional known total.
pub trait ProgressCounter {
    fn count(&self) -> u64;

    /// Expected total, `<= 0` when unknown.
    fn total(&self) -> i64;

    /// `count * 100 / total`, clamped to `0..=100`; 0 when the total is unknown.
    fn percent(&self) -> u64 {
        let total = self.total();
        if total <= 0 {
            return 0;
        }
        let pct = u128::from(self.count()) * 100 / total as u128;
        pct.min(100) as u64
    }
}

// ---------------------------------------------------------------------------
// Shared progress
// ---------------------------------------------------------------------------

/// Live counters of the export currently running on an `Exporter`.
///
/// Clones share state. `count` is elements (or rows) written; `total` is the
/// element count when the caller supplied the elements up front, else 0.
#[derive(Debug, Clone, Default)]
pub struct ExportProgress {
    state: Arc<ProgressState>,
}

#[derive(Debug, Default)]
struct ProgressState {
    written: AtomicU64,
    bytes: AtomicU64,
    total: AtomicI64,
}

impl ExportProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uncompressed bytes handed to the output so far.
    pub fn bytes(&self) -> u64 {
        self.state.bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn start(&self, total: i64) {
        self.state.written.store(0, Ordering::Relaxed);
        self.state.bytes.store(0, Ordering::Relaxed);
        self.state.total.store(total, Ordering::Relaxed);
    }

    pub(crate) fn element_written(&self) {
        self.state.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes(&self, n: u64) {
        self.state.bytes.fetch_add(n, Ordering::Relaxed);
    }
}

impl ProgressCounter for ExportProgress {
    fn count(&self) -> u64 {
        self.state.written.load(Ordering::Relaxed)
    }

    fn total(&self) -> i64 {
        self.state.total.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Buffered reader that counts consumed bytes.
pub struct CountingReader<R: Read> {
    inner: BufReader<R>,
    count: u64,
    total: i64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(reader: R, total: i64) -> Self {
        Self {
            inner: BufReader::with_capacity(READ_BUFFER_SIZE, reader),
            count: 0,
            total,
        }
    }

    /// Discards up to `n` bytes. Only bytes actually skipped are counted.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        self.count += skipped;
        Ok(skipped)
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> ProgressCounter for CountingReader<R> {
    fn count(&self) -> u64 {
        self.count
    }

    fn total(&self) -> i64 {
        self.total
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

impl<R: Read> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.count += amt as u64;
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Writer that counts accepted bytes.
pub struct CountingWriter<W: Write> {
    inner: W,
    count: u64,
    total: i64,
    progress: Option<ExportProgress>,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_total(writer, 0)
    }

    pub fn with_total(writer: W, total: i64) -> Self {
        Self {
            inner: writer,
            count: 0,
            total,
            progress: None,
        }
    }

    /// Mirrors every counted byte into `progress`.
    pub fn with_progress(mut self, progress: ExportProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ProgressCounter for CountingWriter<W> {
    fn count(&self) -> u64 {
        self.count
    }

    fn total(&self) -> i64 {
        self.total
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        if let Some(progress) = &self.progress {
            progress.add_bytes(n as u64);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
