//! End-to-end export/import through the guarded gateway.

use portico_core::{
    AccessConfig, Compression, ElementId, ExportConfig, GatewayError, GatewayResult,
    ImportConfig, NodeView, RelationshipView, SerializationFormat, Value,
};
use portico_export::{ExportProgress, Exporter, FileGateway, JsonImporter, ProgressCounter};
use portico_source::{
    clone_paths_to_virtual, ElementIter, GraphSource, InMemoryGraph, ReadTransaction, ResultRows,
    VirtualCloner,
};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn root() -> (TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = std::fs::canonicalize(tmp.path()).unwrap();
    (tmp, root)
}

fn exporter(root: &PathBuf) -> Exporter {
    Exporter::new(FileGateway::new(AccessConfig::with_root(root)).unwrap())
}

fn lines(path: &PathBuf) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// Three nodes carrying 2 + 2 + 1 properties, two relationships with one each.
fn fixture() -> InMemoryGraph {
    let mut g = InMemoryGraph::new();
    let alice = g.add_node(
        ["User"],
        [("name", Value::from("Alice")), ("age", Value::from(42))],
    );
    let bob = g.add_node(
        ["User", "Admin"],
        [("name", Value::from("Bob")), ("tags", Value::from(vec!["a", "b"]))],
    );
    let acme = g.add_node(["Company"], [("name", Value::from("Acme"))]);
    g.add_relationship(alice, bob, "KNOWS", [("since", Value::from(2020))])
        .unwrap();
    g.add_relationship(bob, acme, "WORKS_AT", [("score", Value::from(0.5))])
        .unwrap();
    g
}

#[test]
fn json_lines_round_trip() {
    let (_tmp, root) = root();
    let mut g = InMemoryGraph::new();
    let a = g.add_node(["A"], [("name", Value::from("a")), ("n", Value::from(1))]);
    let b = g.add_node(["B"], [("name", Value::from("b"))]);
    g.add_relationship(a, b, "R", [("w", Value::from(1.5))])
        .unwrap();

    let summary = exporter(&root)
        .export_all(&g, "all.json", &ExportConfig::default())
        .unwrap();
    assert_eq!(summary.file.as_deref(), Some(&*root.join("all.json").to_string_lossy()));

    let parsed = lines(&root.join("all.json"));
    assert_eq!(parsed.len(), 3);

    assert_eq!(parsed[0]["type"], "node");
    assert_eq!(parsed[0]["labels"], serde_json::json!(["A"]));
    assert_eq!(parsed[0]["properties"], serde_json::json!({"n": 1, "name": "a"}));
    assert_eq!(parsed[1]["labels"], serde_json::json!(["B"]));
    assert_eq!(parsed[1]["properties"], serde_json::json!({"name": "b"}));

    let rel = &parsed[2];
    assert_eq!(rel["type"], "relationship");
    assert_eq!(rel["label"], "R");
    assert_eq!(rel["properties"], serde_json::json!({"w": 1.5}));
    assert_eq!(rel["start"]["id"], parsed[0]["id"]);
    assert_eq!(rel["end"]["id"], parsed[1]["id"]);
    assert_eq!(rel["end"]["labels"], serde_json::json!(["B"]));
}

#[test]
fn reporter_counts_are_exact() {
    let (_tmp, root) = root();
    let g = fixture();
    let summary = exporter(&root)
        .export_all(&g, "counts.json", &ExportConfig::default())
        .unwrap();

    assert_eq!(
        (summary.nodes, summary.relationships, summary.properties),
        (3, 2, 7)
    );
    assert!(summary.done);
    assert_eq!(summary.batches, 1);
    let on_disk = std::fs::metadata(root.join("counts.json")).unwrap().len();
    assert_eq!(summary.bytes, Some(on_disk));
    assert_eq!(g.tx_stats().committed, 1);
}

#[test]
fn object_formats() {
    let (_tmp, root) = root();
    let g = fixture();
    let exp = exporter(&root);

    exp.export_all(&g, "array.json", &ExportConfig::with_format(SerializationFormat::ArrayJson))
        .unwrap();
    let array: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("array.json")).unwrap()).unwrap();
    assert_eq!(array.as_array().unwrap().len(), 5);

    exp.export_all(&g, "obj.json", &ExportConfig::with_format(SerializationFormat::Json))
        .unwrap();
    let obj: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("obj.json")).unwrap()).unwrap();
    assert_eq!(obj["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(obj["rels"].as_array().unwrap().len(), 2);

    exp.export_all(
        &g,
        "keyed.json",
        &ExportConfig::with_format(SerializationFormat::JsonIdAsKeys),
    )
    .unwrap();
    let keyed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("keyed.json")).unwrap()).unwrap();
    let nodes = keyed["nodes"].as_object().unwrap();
    assert_eq!(nodes.len(), 3);
    for (id, node) in nodes {
        assert_eq!(&node["id"], id.as_str());
    }
    assert_eq!(keyed["rels"]["1"]["label"], "WORKS_AT");
}

#[test]
fn query_rows_with_embedded_nodes() {
    let (_tmp, root) = root();
    let mut g = fixture();
    let alice = g.node(0).unwrap();
    let bob = g.node(1).unwrap();
    g.register_statement(
        "MATCH (n:User) RETURN n, n.name AS name",
        vec!["n".into(), "name".into()],
        vec![
            vec![Value::from(alice), Value::from("Alice")],
            vec![Value::from(bob), Value::from("Bob")],
        ],
    );

    let config = ExportConfig::with_format(SerializationFormat::ArrayJson);
    let summary = exporter(&root)
        .export_query(&g, "MATCH (n:User) RETURN n, n.name AS name", "users.json", &config)
        .unwrap();
    assert_eq!((summary.rows, summary.nodes), (2, 2));
    // 2 + 2 node properties, plus one scalar column per row.
    assert_eq!(summary.properties, 6);

    let rows: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("users.json")).unwrap()).unwrap();
    assert_eq!(rows[0]["name"], "Alice");
    assert_eq!(rows[1]["n"]["labels"], serde_json::json!(["User", "Admin"]));
}

#[test]
fn query_rows_with_paths() {
    let (_tmp, root) = root();
    let mut g = fixture();
    let path = g.path(0, &[0, 1]).unwrap();
    g.register_statement("MATCH p RETURN p", vec!["p".into()], vec![vec![path.into()]]);

    exporter(&root)
        .export_query(&g, "MATCH p RETURN p", "paths.json", &ExportConfig::default())
        .unwrap();
    let parsed = lines(&root.join("paths.json"));
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0]["p"]["length"], 2);
    assert_eq!(parsed[0]["p"]["rels"].as_array().unwrap().len(), 2);
    assert_eq!(parsed[0]["p"]["nodes"][2]["properties"]["name"], "Acme");
}

#[test]
fn export_data_and_virtual_graph() {
    let (_tmp, root) = root();
    let g = fixture();
    let exp = exporter(&root);

    let nodes = vec![g.node(0).unwrap(), g.node(1).unwrap()];
    let rels = vec![g.relationship(0).unwrap()];
    let summary = exp
        .export_data(&g, &nodes, &rels, "data.json", &ExportConfig::default())
        .unwrap();
    assert_eq!((summary.nodes, summary.relationships), (2, 1));
    assert_eq!(summary.source, "data: nodes(2), rels(1)");

    let first = g.path(0, &[0]).unwrap();
    let second = g.path(0, &[0, 1]).unwrap();
    let mut cloner = VirtualCloner::new();
    for p in [&first, &second] {
        cloner.clone_path(p);
    }
    let virtual_graph = cloner.into_subgraph();

    let config = ExportConfig::with_format(SerializationFormat::JsonIdAsKeys);
    let summary = exp
        .export_graph(&g, &virtual_graph, "virtual.json", &config)
        .unwrap();
    assert_eq!((summary.nodes, summary.relationships), (3, 2));

    let keyed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("virtual.json")).unwrap()).unwrap();
    assert!(keyed["nodes"]
        .as_object()
        .unwrap()
        .keys()
        .all(|k| k.starts_with('-')));

    // Virtual copies never reach back into the source.
    let copies = clone_paths_to_virtual(&[first, second]);
    assert!(copies.iter().all(|p| p.nodes.iter().all(|n| n.id < 0)));
    assert_eq!(g.node_count(), 3);
}

#[test]
fn batches_flush_and_are_counted() {
    let (_tmp, root) = root();
    let g = fixture();
    let config = ExportConfig {
        batch_size: 2,
        ..ExportConfig::default()
    };
    let summary = exporter(&root)
        .export_all(&g, "batched.json", &config)
        .unwrap();
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.batch_size, 2);
}

#[test]
fn gzip_output_counts_uncompressed_bytes() {
    let (_tmp, root) = root();
    let g = fixture();
    let config = ExportConfig {
        compression: Compression::Gzip,
        ..ExportConfig::default()
    };
    let summary = exporter(&root)
        .export_all(&g, "all.json.gz", &config)
        .unwrap();

    let mut text = String::new();
    flate2::read::GzDecoder::new(std::fs::File::open(root.join("all.json.gz")).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text.lines().count(), 5);
    assert_eq!(summary.bytes, Some(text.len() as u64));
}

#[test]
fn serialization_failure_aborts_without_commit() {
    let (_tmp, root) = root();
    let mut g = fixture();
    let mut nested = BTreeMap::new();
    nested.insert("k".to_string(), Value::from(1));
    g.set_node_property(2, "bad", Value::Map(nested));

    let err = exporter(&root)
        .export_all(&g, "broken.json", &ExportConfig::default())
        .unwrap_err();
    assert!(matches!(err, GatewayError::Serialization(_)));

    let stats = g.tx_stats();
    assert_eq!((stats.committed, stats.rolled_back), (0, 1));
    // Partial output stays where it was written.
    assert!(root.join("broken.json").exists());
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Wraps a graph and cancels `token` when the `after`-th element is pulled.
struct CancelAfter<'g> {
    graph: &'g InMemoryGraph,
    token: CancellationToken,
    after: usize,
    pulled: Arc<AtomicUsize>,
}

struct CancelTx<'a> {
    inner: Box<dyn ReadTransaction + 'a>,
    token: CancellationToken,
    after: usize,
    pulled: Arc<AtomicUsize>,
}

impl GraphSource for CancelAfter<'_> {
    fn begin_read(&self) -> GatewayResult<Box<dyn ReadTransaction + '_>> {
        Ok(Box::new(CancelTx {
            inner: self.graph.begin_read()?,
            token: self.token.clone(),
            after: self.after,
            pulled: self.pulled.clone(),
        }))
    }
}

impl ReadTransaction for CancelTx<'_> {
    fn nodes(&mut self) -> ElementIter<'_, NodeView> {
        let token = self.token.clone();
        let pulled = self.pulled.clone();
        let after = self.after;
        let iter = self.inner.nodes();
        Box::new(iter.inspect(move |_| {
            if pulled.fetch_add(1, Ordering::SeqCst) + 1 == after {
                token.cancel();
            }
        }))
    }

    fn relationships(&mut self) -> ElementIter<'_, RelationshipView> {
        let token = self.token.clone();
        let pulled = self.pulled.clone();
        let after = self.after;
        let iter = self.inner.relationships();
        Box::new(iter.inspect(move |_| {
            if pulled.fetch_add(1, Ordering::SeqCst) + 1 == after {
                token.cancel();
            }
        }))
    }

    fn execute(&mut self, statement: &str) -> GatewayResult<ResultRows<'_>> {
        self.inner.execute(statement)
    }

    fn commit(self: Box<Self>) -> GatewayResult<()> {
        self.inner.commit()
    }
}

fn many_nodes(n: usize) -> InMemoryGraph {
    let mut g = InMemoryGraph::new();
    let ids: Vec<ElementId> = (0..n)
        .map(|i| g.add_node(["N"], [("i", Value::from(i as i64))]))
        .collect();
    for pair in ids.windows(2) {
        g.add_relationship(pair[0], pair[1], "NEXT", Vec::<(String, Value)>::new())
            .unwrap();
    }
    g
}

#[test]
fn cancellation_stops_before_next_pull() {
    let (_tmp, root) = root();
    let graph = many_nodes(20);
    let token = CancellationToken::new();
    let source = CancelAfter {
        graph: &graph,
        token: token.clone(),
        after: 5,
        pulled: Arc::new(AtomicUsize::new(0)),
    };

    let err = exporter(&root)
        .with_cancellation(token)
        .export_all(&source, "cancelled.json", &ExportConfig::default())
        .unwrap_err();

    let written = match err {
        GatewayError::Cancelled { written } => written,
        other => panic!("expected Cancelled, got {other:?}"),
    };
    let pulled = source.pulled.load(Ordering::SeqCst) as u64;
    assert_eq!(written, 5);
    assert!(pulled <= written + 1);

    let stats = graph.tx_stats();
    assert_eq!((stats.committed, stats.rolled_back), (0, 1));
}

#[test]
fn cancelled_before_start_pulls_nothing() {
    let (_tmp, root) = root();
    let graph = many_nodes(3);
    let token = CancellationToken::new();
    token.cancel();
    let source = CancelAfter {
        graph: &graph,
        token: token.clone(),
        after: usize::MAX,
        pulled: Arc::new(AtomicUsize::new(0)),
    };

    let err = exporter(&root)
        .with_cancellation(token)
        .export_all(&source, "never.json", &ExportConfig::default())
        .unwrap_err();
    assert!(matches!(err, GatewayError::Cancelled { written: 0 }));
    assert_eq!(source.pulled.load(Ordering::SeqCst), 0);
    assert_eq!(graph.tx_stats().committed, 0);
}

/// Records the exporter's live progress each time a node is pulled.
struct Watched<'g> {
    graph: &'g InMemoryGraph,
    progress: ExportProgress,
    seen: Arc<Mutex<Vec<(u64, u64)>>>,
}

struct WatchedTx<'a> {
    inner: Box<dyn ReadTransaction + 'a>,
    progress: ExportProgress,
    seen: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl GraphSource for Watched<'_> {
    fn begin_read(&self) -> GatewayResult<Box<dyn ReadTransaction + '_>> {
        Ok(Box::new(WatchedTx {
            inner: self.graph.begin_read()?,
            progress: self.progress.clone(),
            seen: self.seen.clone(),
        }))
    }
}

impl ReadTransaction for WatchedTx<'_> {
    fn nodes(&mut self) -> ElementIter<'_, NodeView> {
        let progress = self.progress.clone();
        let seen = self.seen.clone();
        Box::new(self.inner.nodes().inspect(move |_| {
            seen.lock()
                .unwrap()
                .push((progress.count(), progress.bytes()));
        }))
    }

    fn relationships(&mut self) -> ElementIter<'_, RelationshipView> {
        self.inner.relationships()
    }

    fn execute(&mut self, statement: &str) -> GatewayResult<ResultRows<'_>> {
        self.inner.execute(statement)
    }

    fn commit(self: Box<Self>) -> GatewayResult<()> {
        self.inner.commit()
    }
}

#[test]
fn progress_is_readable_mid_export() {
    let (_tmp, root) = root();
    let graph = many_nodes(6);
    let exporter = exporter(&root);
    let source = Watched {
        graph: &graph,
        progress: exporter.progress(),
        seen: Arc::new(Mutex::new(Vec::new())),
    };

    let config = ExportConfig {
        batch_size: 2,
        ..ExportConfig::default()
    };
    let summary = exporter
        .export_all(&source, "watched.json", &config)
        .unwrap();

    let seen = source.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 6);
    for (pulled, (written, bytes)) in seen.iter().enumerate() {
        assert_eq!(*written, pulled as u64);
        assert_eq!(*bytes == 0, pulled == 0);
    }
    assert!(seen.windows(2).all(|w| w[1].1 > w[0].1));

    let progress = exporter.progress();
    assert_eq!(progress.count(), 11);
    assert_eq!(Some(progress.bytes()), summary.bytes);
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[test]
fn export_then_import_restores_graph() {
    let (_tmp, root) = root();
    let g = fixture();
    let gateway = FileGateway::new(AccessConfig::with_root(&root)).unwrap();

    let config = ExportConfig {
        compression: Compression::Deflate,
        ..ExportConfig::default()
    };
    let exported = Exporter::new(gateway.clone())
        .export_all(&g, "dump.jsonl.z", &config)
        .unwrap();

    let mut restored = InMemoryGraph::new();
    let import_config = ImportConfig {
        compression: Compression::Deflate,
        batch_size: 2,
    };
    let imported = JsonImporter::new(gateway)
        .import_json_lines(&mut restored, "dump.jsonl.z", &import_config)
        .unwrap();

    assert_eq!(
        (imported.nodes, imported.relationships, imported.properties),
        (exported.nodes, exported.relationships, exported.properties)
    );
    assert_eq!(imported.batches, 3);
    assert_eq!(restored.node_count(), 3);
    assert_eq!(restored.relationship_count(), 2);
    let rel = restored.relationship(1).unwrap();
    assert_eq!(rel.rel_type, "WORKS_AT");
    assert_eq!(rel.properties["score"], Value::from(0.5));
    assert_eq!(
        restored.node(1).unwrap().properties["tags"],
        Value::from(vec!["a", "b"])
    );
}

#[test]
fn import_obeys_read_policy() {
    let (_tmp, root) = root();
    let import_root = root.join("import");
    std::fs::create_dir(&import_root).unwrap();
    std::fs::write(root.join("outside.json"), "{\"id\":\"1\"}\n").unwrap();

    let gateway = FileGateway::new(AccessConfig::with_root(&import_root)).unwrap();
    let mut target = InMemoryGraph::new();
    let err = JsonImporter::new(gateway)
        .import_json_lines(&mut target, "../outside.json", &ImportConfig::default())
        .unwrap_err();
    assert!(matches!(err, GatewayError::ReadFromFilesystemNotAllowed { .. }));
    assert_eq!(target.node_count(), 0);

    let elevated = AccessConfig {
        allow_read_from_filesystem: true,
        ..AccessConfig::with_root(&import_root)
    };
    let summary = JsonImporter::new(FileGateway::new(elevated).unwrap())
        .import_json_lines(&mut target, "../outside.json", &ImportConfig::default())
        .unwrap();
    assert_eq!(summary.nodes, 1);
    assert_eq!(summary.bytes, Some(11));
}
