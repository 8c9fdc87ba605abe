use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use portico_core::{AccessConfig, ExportConfig, FileOperation, SerializationFormat, Value};
use portico_export::{Exporter, FileGateway, PathResolver};
use portico_source::InMemoryGraph;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TRAVERSALS: &[&str] = &[
    "test.txt",
    "./tests/test.txt",
    "../../test.txt",
    "%2e%2e%2f%2e%2e%2ftest.txt",
    "%252e%252e%252f%252e%252e%252ftest.txt",
    "file:///..//..//..//..//apoc//..//..//..//..//test.txt",
    "file://%2e%2e%2f%2e%2e%2f%2e%2e%2f%2e%2e%2f/apoc/test.txt",
    "..\\..\\tests\\test.txt",
];

fn make_graph(nodes: usize) -> InMemoryGraph {
    let mut g = InMemoryGraph::new();
    let mut prev = None;
    for i in 0..nodes {
        let id = g.add_node(
            ["Person"],
            [
                ("name", Value::from(format!("person-{i}"))),
                ("age", Value::from(i as i64 % 90)),
                ("score", Value::from(i as f64 / 7.0)),
            ],
        );
        if let Some(p) = prev {
            g.add_relationship(p, id, "KNOWS", [("weight", Value::from(1))])
                .unwrap();
        }
        prev = Some(id);
    }
    g
}

// ---------------------------------------------------------------------------
// Benchmark: path resolution
// ---------------------------------------------------------------------------

fn bench_resolve(c: &mut Criterion) {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("tests")).unwrap();
    let resolver = PathResolver::new(Some(tmp.path())).unwrap();

    let mut group = c.benchmark_group("resolve");
    for (i, raw) in TRAVERSALS.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(i), raw, |b, raw| {
            b.iter(|| black_box(resolver.resolve(black_box(raw)).unwrap()));
        });
    }
    group.finish();

    let gateway = FileGateway::new(AccessConfig::with_root(tmp.path())).unwrap();
    c.bench_function("authorize_corpus", |b| {
        b.iter(|| {
            for raw in TRAVERSALS {
                let _ = black_box(gateway.authorize(raw, FileOperation::Write));
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark: JSON serialization (stream mode)
// ---------------------------------------------------------------------------

fn bench_serialize(c: &mut Criterion) {
    let exporter = Exporter::new(FileGateway::new(AccessConfig::default()).unwrap());

    let mut group = c.benchmark_group("export_stream");
    for count in [1_000usize, 10_000] {
        let graph = make_graph(count);
        group.throughput(Throughput::Elements((count * 2 - 1) as u64));
        for format in [SerializationFormat::JsonLines, SerializationFormat::JsonIdAsKeys] {
            let config = ExportConfig {
                stream: true,
                ..ExportConfig::with_format(format)
            };
            group.bench_with_input(
                BenchmarkId::new(format.as_str(), count),
                &config,
                |b, config| {
                    b.iter(|| black_box(exporter.export_all(&graph, "", config).unwrap()));
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_resolve, bench_serialize);
criterion_main!(benches);
