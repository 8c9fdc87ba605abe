//! Export pipeline.
//!
//! resolve + guard → open output → begin read → serialize → flush →
//! finish output → commit → summary.
//!
//! The read transaction is committed only after the output has been fully
//! written; any error or cancellation drops it uncommitted. A partially
//! written file is left on disk.

use crate::compression::CompressedWriter;
use crate::gateway::FileGateway;
use crate::progress::{CountingWriter, ExportProgress, ProgressCounter};
use crate::reporter::{Reporter, Summary};
use crate::sink::{JsonSerializer, Serializer, WriteContext};
use portico_core::error::{GatewayError, GatewayResult};
use portico_core::{Compression, ExportConfig, NodeView, RelationshipView, SubGraph};
use portico_source::{GraphSource, ReadTransaction};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tokio_util::sync::CancellationToken;

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Where serialized bytes end up.
enum Output {
    File(BufWriter<File>),
    Memory(Vec<u8>),
}

impl Output {
    /// Flushes a file target; returns the buffer of a memory target.
    fn finish(self) -> io::Result<Option<Vec<u8>>> {
        match self {
            Output::File(mut w) => {
                w.flush()?;
                Ok(None)
            }
            Output::Memory(buf) => Ok(Some(buf)),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::File(w) => w.write(buf),
            Output::Memory(v) => v.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::File(w) => w.flush(),
            Output::Memory(_) => Ok(()),
        }
    }
}

type ExportWriter = CountingWriter<CompressedWriter<Output>>;

/// Drives one export per call.
#[derive(Debug, Clone)]
pub struct Exporter {
    gateway: FileGateway,
    cancel: CancellationToken,
    progress: ExportProgress,
}

impl Exporter {
    pub fn new(gateway: FileGateway) -> Self {
        Self {
            gateway,
            cancel: CancellationToken::new(),
            progress: ExportProgress::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Live counters of the running export. Reset when an export starts.
    pub fn progress(&self) -> ExportProgress {
        self.progress.clone()
    }

    pub fn gateway(&self) -> &FileGateway {
        &self.gateway
    }

    /// Whole graph: every node, then every relationship.
    pub fn export_all(
        &self,
        source: &dyn GraphSource,
        file: &str,
        config: &ExportConfig,
    ) -> GatewayResult<Summary> {
        self.dump(source, file, config, "database".to_string(), 0, |tx, ser, ctx| {
            ser.begin_graph()?;
            ser.write_nodes(tx.nodes(), ctx)?;
            ser.write_relationships(tx.relationships(), ctx)?;
            ser.end_graph()
        })
    }

    /// Caller-supplied node and relationship lists.
    pub fn export_data(
        &self,
        source: &dyn GraphSource,
        nodes: &[NodeView],
        relationships: &[RelationshipView],
        file: &str,
        config: &ExportConfig,
    ) -> GatewayResult<Summary> {
        let description = format!(
            "data: nodes({}), rels({})",
            nodes.len(),
            relationships.len()
        );
        let total = element_total(nodes.len() + relationships.len());
        self.dump(source, file, config, description, total, |_tx, ser, ctx| {
            write_lists(ser, nodes, relationships, ctx)
        })
    }

    /// Virtual subgraph.
    pub fn export_graph(
        &self,
        source: &dyn GraphSource,
        graph: &SubGraph,
        file: &str,
        config: &ExportConfig,
    ) -> GatewayResult<Summary> {
        let description = format!(
            "graph: nodes({}), rels({})",
            graph.nodes.len(),
            graph.relationships.len()
        );
        let total = element_total(graph.nodes.len() + graph.relationships.len());
        self.dump(source, file, config, description, total, |_tx, ser, ctx| {
            write_lists(ser, &graph.nodes, &graph.relationships, ctx)
        })
    }

    /// Tabular result of `statement`, executed inside the read transaction.
    pub fn export_query(
        &self,
        source: &dyn GraphSource,
        statement: &str,
        file: &str,
        config: &ExportConfig,
    ) -> GatewayResult<Summary> {
        let description = format!("statement: {statement}");
        self.dump(source, file, config, description, 0, |tx, ser, ctx| {
            let rows = tx.execute(statement)?;
            ser.write_rows(rows, ctx)
        })
    }

    fn dump<F>(
        &self,
        source: &dyn GraphSource,
        file: &str,
        config: &ExportConfig,
        description: String,
        total: i64,
        body: F,
    ) -> GatewayResult<Summary>
    where
        F: FnOnce(
            &mut dyn ReadTransaction,
            &mut JsonSerializer<ExportWriter>,
            &mut WriteContext,
        ) -> GatewayResult<()>,
    {
        config.validate()?;

        // Access is decided before any transaction is opened.
        let (target, output) = if config.stream {
            tracing::debug!(file, "stream mode: output kept in memory");
            (None, Output::Memory(Vec::new()))
        } else {
            let (resolved, handle) = self.gateway.open_write(file)?;
            (
                Some(resolved.path.display().to_string()),
                Output::File(BufWriter::with_capacity(WRITE_BUFFER_SIZE, handle)),
            )
        };

        self.progress.start(total);
        let writer = CountingWriter::new(CompressedWriter::new(output, config.compression))
            .with_progress(self.progress.clone());
        let reporter = Reporter::new(
            target.clone(),
            description,
            config.format,
            config.batch_size,
        );
        let mut ctx = WriteContext::new(reporter, self.cancel.clone(), config.batch_size)
            .with_progress(self.progress.clone());
        let mut serializer = JsonSerializer::new(writer, config);

        let mut tx = source.begin_read()?;
        if let Err(e) = body(&mut *tx, &mut serializer, &mut ctx) {
            tracing::warn!(
                file = target.as_deref().unwrap_or("<stream>"),
                written = ctx.written(),
                error = %e,
                "export aborted"
            );
            return Err(e);
        }
        serializer.flush()?;

        let counting = serializer.into_inner()?;
        let bytes = counting.count();
        let buffer = counting.into_inner().finish()?.finish()?;
        tx.commit()?;

        let mut reporter = ctx.finish();
        if let Some(buffer) = buffer {
            reporter.set_data(encode_stream(buffer, config.compression)?);
        }
        reporter.done(Some(bytes));
        let summary = reporter.total();

        tracing::info!(
            file = summary.file.as_deref().unwrap_or("<stream>"),
            format = %config.format,
            nodes = summary.nodes,
            relationships = summary.relationships,
            properties = summary.properties,
            rows = summary.rows,
            bytes,
            elapsed_ms = summary.elapsed_ms,
            "export complete"
        );
        Ok(summary)
    }
}

fn element_total(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn write_lists(
    ser: &mut JsonSerializer<ExportWriter>,
    nodes: &[NodeView],
    relationships: &[RelationshipView],
    ctx: &mut WriteContext,
) -> GatewayResult<()> {
    ser.begin_graph()?;
    ser.write_nodes(Box::new(nodes.iter().cloned().map(Ok)), ctx)?;
    ser.write_relationships(Box::new(relationships.iter().cloned().map(Ok)), ctx)?;
    ser.end_graph()
}

/// Stream payload: text as-is, compressed bytes hex-encoded.
fn encode_stream(buffer: Vec<u8>, compression: Compression) -> GatewayResult<String> {
    match compression {
        Compression::None => String::from_utf8(buffer)
            .map_err(|e| GatewayError::serialization(format!("stream output is not UTF-8: {e}"))),
        _ => Ok(hex::encode(buffer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{AccessConfig, SerializationFormat, Value};
    use portico_source::InMemoryGraph;

    fn graph() -> InMemoryGraph {
        let mut g = InMemoryGraph::new();
        let a = g.add_node(["User"], [("name", Value::from("Alice"))]);
        let b = g.add_node(["User"], [("name", Value::from("Bob"))]);
        g.add_relationship(a, b, "KNOWS", [("since", Value::from(2020))])
            .unwrap();
        g
    }

    fn stream_exporter() -> Exporter {
        Exporter::new(FileGateway::new(AccessConfig::default()).unwrap())
    }

    #[test]
    fn stream_mode_needs_no_file_access() {
        let g = graph();
        let config = ExportConfig {
            stream: true,
            ..ExportConfig::default()
        };
        let summary = stream_exporter().export_all(&g, "", &config).unwrap();
        assert!(summary.done);
        assert_eq!(summary.file, None);
        let data = summary.data.unwrap();
        assert_eq!(data.lines().count(), 3);
        assert_eq!(summary.bytes, Some(data.len() as u64));
        assert_eq!(g.tx_stats().committed, 1);
    }

    #[test]
    fn compressed_stream_is_hex() {
        let g = graph();
        let config = ExportConfig {
            stream: true,
            compression: Compression::Gzip,
            ..ExportConfig::default()
        };
        let data = stream_exporter()
            .export_all(&g, "", &config)
            .unwrap()
            .data
            .unwrap();
        assert!(data.starts_with("1f8b"));
        assert!(data.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn disabled_export_opens_no_transaction() {
        let g = graph();
        let err = stream_exporter()
            .export_all(&g, "out.json", &ExportConfig::default())
            .unwrap_err();
        assert!(matches!(err, GatewayError::FeatureDisabled { .. }));
        assert_eq!(g.tx_stats().begun, 0);
    }

    #[test]
    fn invalid_batch_size_rejected_up_front() {
        let g = graph();
        let config = ExportConfig {
            stream: true,
            batch_size: 0,
            ..ExportConfig::default()
        };
        let err = stream_exporter().export_all(&g, "", &config).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidConfig(_)));
        assert_eq!(g.tx_stats().begun, 0);
    }

    #[test]
    fn unknown_statement_rolls_back() {
        let g = graph();
        let config = ExportConfig {
            stream: true,
            format: SerializationFormat::ArrayJson,
            ..ExportConfig::default()
        };
        let err = stream_exporter()
            .export_query(&g, "MATCH (n) RETURN n", "", &config)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Source(_)));
        let stats = g.tx_stats();
        assert_eq!((stats.committed, stats.rolled_back), (0, 1));
    }

    #[test]
    fn progress_reaches_full_for_known_totals() {
        let g = graph();
        let exporter = stream_exporter();
        let progress = exporter.progress();
        let nodes = vec![g.node(0).unwrap(), g.node(1).unwrap()];
        let config = ExportConfig {
            stream: true,
            ..ExportConfig::default()
        };
        let summary = exporter.export_data(&g, &nodes, &[], "", &config).unwrap();
        assert_eq!((progress.count(), progress.total(), progress.percent()), (2, 2, 100));
        assert_eq!(Some(progress.bytes()), summary.bytes);

        // A whole-graph dump has no known total and restarts the counters.
        exporter.export_all(&g, "", &config).unwrap();
        assert_eq!((progress.count(), progress.percent()), (3, 0));
    }
}
