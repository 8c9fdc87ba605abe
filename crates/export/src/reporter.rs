//! Progress accounting for one export/import call.
//!
//! `Reporter` accumulates counters while a dump runs; `done()` freezes them
//! and `total()` hands back the [`Summary`] returned to the caller.

use portico_core::SerializationFormat;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Final (or in-flight) tally of one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Resolved target path; `None` in stream mode.
    pub file: Option<String>,
    /// What was exported, e.g. `database: nodes(3), rels(2)`.
    pub source: String,
    pub format: String,
    pub nodes: u64,
    pub relationships: u64,
    pub properties: u64,
    pub rows: u64,
    pub batch_size: usize,
    pub batches: u64,
    /// Uncompressed bytes produced or consumed, when known.
    pub bytes: Option<u64>,
    pub elapsed_ms: u64,
    pub done: bool,
    /// Stream-mode payload: UTF-8 JSON, or hex when compressed.
    pub data: Option<String>,
}

impl Summary {
    /// Boxed human-readable report.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                       PORTICO SUMMARY                        ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!(
            "║  Target:             {:>39} ║\n",
            truncate_left(self.file.as_deref().unwrap_or("<stream>"), 39)
        ));
        out.push_str(&format!(
            "║  Source:             {:>39} ║\n",
            truncate_left(&self.source, 39)
        ));
        out.push_str(&format!("║  Format:             {:>39} ║\n", self.format));
        out.push_str(&format!("║  Nodes:              {:>39} ║\n", self.nodes));
        out.push_str(&format!("║  Relationships:      {:>39} ║\n", self.relationships));
        out.push_str(&format!("║  Properties:         {:>39} ║\n", self.properties));
        out.push_str(&format!("║  Rows:               {:>39} ║\n", self.rows));
        out.push_str(&format!(
            "║  Batches:            {:>39} ║\n",
            format!("{} x {}", self.batches, self.batch_size)
        ));
        if let Some(bytes) = self.bytes {
            out.push_str(&format!("║  Bytes:              {:>39} ║\n", bytes));
        }
        out.push_str(&format!(
            "║  Elapsed:            {:>36?} ║\n",
            Duration::from_millis(self.elapsed_ms)
        ));
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        if self.done {
            out.push_str("║  Completed.                                                  ║\n");
        } else {
            out.push_str("║  In progress.                                                ║\n");
        }
        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}

fn truncate_left(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len <= width {
        return s.to_string();
    }
    let tail: String = s.chars().skip(len - (width - 1)).collect();
    format!("…{tail}")
}

#[derive(Debug)]
pub struct Reporter {
    file: Option<String>,
    source: String,
    format: SerializationFormat,
    batch_size: usize,
    nodes: u64,
    relationships: u64,
    properties: u64,
    rows: u64,
    batches: u64,
    bytes: Option<u64>,
    data: Option<String>,
    started: Instant,
    finished: Option<Duration>,
}

impl Reporter {
    pub fn new(
        file: Option<String>,
        source: impl Into<String>,
        format: SerializationFormat,
        batch_size: usize,
    ) -> Self {
        Self {
            file,
            source: source.into(),
            format,
            batch_size,
            nodes: 0,
            relationships: 0,
            properties: 0,
            rows: 0,
            batches: 0,
            bytes: None,
            data: None,
            started: Instant::now(),
            finished: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.finished.is_some()
    }

    pub fn update(&mut self, nodes: u64, relationships: u64, properties: u64) {
        if self.is_done() {
            return;
        }
        self.nodes += nodes;
        self.relationships += relationships;
        self.properties += properties;
    }

    pub fn next_row(&mut self) {
        if !self.is_done() {
            self.rows += 1;
        }
    }

    pub fn next_batch(&mut self) {
        if !self.is_done() {
            self.batches += 1;
        }
    }

    /// Elements (nodes + relationships) or rows counted so far.
    pub fn processed(&self) -> u64 {
        self.nodes + self.relationships + self.rows
    }

    pub fn set_data(&mut self, data: String) {
        if !self.is_done() {
            self.data = Some(data);
        }
    }

    /// Freezes the counters. Later calls are no-ops.
    pub fn done(&mut self, bytes: Option<u64>) {
        if self.is_done() {
            return;
        }
        self.bytes = bytes;
        self.finished = Some(self.started.elapsed());
    }

    pub fn total(&self) -> Summary {
        let elapsed = self.finished.unwrap_or_else(|| self.started.elapsed());
        Summary {
            file: self.file.clone(),
            source: self.source.clone(),
            format: self.format.as_str().to_string(),
            nodes: self.nodes,
            relationships: self.relationships,
            properties: self.properties,
            rows: self.rows,
            batch_size: self.batch_size,
            batches: self.batches,
            bytes: self.bytes,
            elapsed_ms: elapsed.as_millis() as u64,
            done: self.finished.is_some(),
            data: self.data.clone(),
        }
    }
}
