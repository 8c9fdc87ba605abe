//! Serializer contract.
//!
//! A serializer pulls elements one at a time from a lazy source and writes
//! them incrementally. [`WriteContext`] carries the per-call state every
//! serializer shares: the reporter, the cancellation token and batching.
//!
//! Graph dumps are driven in stages so the caller can hand over node and
//! relationship sequences that borrow the same read transaction in turn:
//!
//! ```ignore
//! serializer.begin_graph()?;
//! serializer.write_nodes(tx.nodes(), &mut ctx)?;
//! serializer.write_relationships(tx.relationships(), &mut ctx)?;
//! serializer.end_graph()?;
//! ```

pub mod json;

pub use json::JsonSerializer;

use crate::progress::{ExportProgress, ProgressCounter};
use crate::reporter::Reporter;
use portico_core::error::{GatewayError, GatewayResult};
use portico_core::{NodeView, RelationshipView, SerializationFormat};
use portico_source::{ElementIter, ResultRows};
use tokio_util::sync::CancellationToken;

pub trait Serializer {
    fn format(&self) -> SerializationFormat;

    fn begin_graph(&mut self) -> GatewayResult<()>;

    fn write_nodes(
        &mut self,
        nodes: ElementIter<'_, NodeView>,
        ctx: &mut WriteContext,
    ) -> GatewayResult<()>;

    fn write_relationships(
        &mut self,
        rels: ElementIter<'_, RelationshipView>,
        ctx: &mut WriteContext,
    ) -> GatewayResult<()>;

    fn end_graph(&mut self) -> GatewayResult<()>;

    /// Tabular output: one object per row, in column order.
    fn write_rows(&mut self, rows: ResultRows<'_>, ctx: &mut WriteContext) -> GatewayResult<()>;

    fn flush(&mut self) -> GatewayResult<()>;
}

/// Per-call streaming state.
pub struct WriteContext {
    reporter: Reporter,
    cancel: CancellationToken,
    batch_size: usize,
    written: u64,
    in_batch: usize,
    progress: Option<ExportProgress>,
}

impl WriteContext {
    pub fn new(reporter: Reporter, cancel: CancellationToken, batch_size: usize) -> Self {
        Self {
            reporter,
            cancel,
            batch_size: batch_size.max(1),
            written: 0,
            in_batch: 0,
            progress: None,
        }
    }

    /// Publishes the element count to a shared handle as it grows.
    pub fn with_progress(mut self, progress: ExportProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn reporter(&mut self) -> &mut Reporter {
        &mut self.reporter
    }

    /// Elements or rows written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Called before the next element is pulled from the source.
    pub fn checkpoint(&self) -> GatewayResult<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!(written = self.written, "export cancelled");
            return Err(GatewayError::Cancelled {
                written: self.written,
            });
        }
        Ok(())
    }

    /// Records one written element. Returns `true` when a batch just filled
    /// up and the serializer should flush.
    pub fn element_written(&mut self) -> bool {
        self.written += 1;
        self.in_batch += 1;
        if let Some(progress) = &self.progress {
            progress.element_written();
        }
        if self.in_batch >= self.batch_size {
            self.close_batch();
            true
        } else {
            false
        }
    }

    fn close_batch(&mut self) {
        self.in_batch = 0;
        self.reporter.next_batch();
        match &self.progress {
            Some(progress) => tracing::debug!(
                written = self.written,
                bytes = progress.bytes(),
                percent = progress.percent(),
                "batch flushed"
            ),
            None => tracing::debug!(written = self.written, "batch flushed"),
        }
    }

    /// Counts a trailing partial batch and returns the reporter.
    pub fn finish(mut self) -> Reporter {
        if self.in_batch > 0 {
            self.close_batch();
        }
        self.reporter
    }
}
