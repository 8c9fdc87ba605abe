//! In-memory graph engine.
//!
//! Reference implementation of [`GraphSource`] / [`GraphWriter`] used by the
//! CLI and the test suites. Transactions are counted so callers can assert
//! that a dump committed exactly when it should.

use crate::{ElementIter, GraphSource, GraphWriter, ReadTransaction, ResultRows};
use portico_core::error::{GatewayError, GatewayResult};
use portico_core::{
    ElementId, Labels, NodeRef, NodeView, PathView, PropertyMap, RelationshipView, Value,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct StoredRelationship {
    rel_type: String,
    start: ElementId,
    end: ElementId,
    properties: PropertyMap,
}

#[derive(Debug, Clone)]
struct CannedResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Snapshot of transaction counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxStats {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

#[derive(Debug, Default)]
struct TxCounters {
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

/// Graph held entirely in memory.
///
/// ```ignore
/// let mut graph = InMemoryGraph::new();
/// let a = graph.add_node(["User"], [("name", "Alice".into())]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    nodes: BTreeMap<ElementId, NodeView>,
    relationships: BTreeMap<ElementId, StoredRelationship>,
    statements: HashMap<String, CannedResult>,
    next_node_id: ElementId,
    next_rel_id: ElementId,
    counters: TxCounters,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node<L, P, K>(&mut self, labels: L, properties: P) -> ElementId
    where
        L: IntoIterator,
        L::Item: Into<String>,
        P: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.insert(
            id,
            NodeView {
                id,
                labels: labels.into_iter().map(Into::into).collect(),
                properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            },
        );
        id
    }

    pub fn add_relationship<P, K>(
        &mut self,
        start: ElementId,
        end: ElementId,
        rel_type: &str,
        properties: P,
    ) -> GatewayResult<ElementId>
    where
        P: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for endpoint in [start, end] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(GatewayError::Source(format!(
                    "relationship endpoint {endpoint} does not exist"
                )));
            }
        }
        let id = self.next_rel_id;
        self.next_rel_id += 1;
        self.relationships.insert(
            id,
            StoredRelationship {
                rel_type: rel_type.to_string(),
                start,
                end,
                properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            },
        );
        Ok(id)
    }

    /// Registers the result returned by `execute(statement)`.
    pub fn register_statement(
        &mut self,
        statement: &str,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) {
        self.statements
            .insert(statement.to_string(), CannedResult { columns, rows });
    }

    pub fn node(&self, id: ElementId) -> Option<NodeView> {
        self.nodes.get(&id).cloned()
    }

    pub fn relationship(&self, id: ElementId) -> Option<RelationshipView> {
        self.relationships
            .get(&id)
            .and_then(|stored| self.view_of(id, stored).ok())
    }

    pub fn set_node_property(&mut self, id: ElementId, key: &str, value: Value) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.properties.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Walks `rels` from `start`, following each relationship in whichever
    /// direction connects it to the current node.
    pub fn path(&self, start: ElementId, rels: &[ElementId]) -> GatewayResult<PathView> {
        let first = self
            .node(start)
            .ok_or_else(|| GatewayError::Source(format!("node {start} does not exist")))?;
        let mut current = start;
        let mut path = PathView::single(first);

        for &rel_id in rels {
            let rel = self.relationship(rel_id).ok_or_else(|| {
                GatewayError::Source(format!("relationship {rel_id} does not exist"))
            })?;
            let next = if rel.start.id == current {
                rel.end.id
            } else if rel.end.id == current {
                rel.start.id
            } else {
                return Err(GatewayError::Source(format!(
                    "relationship {rel_id} is not attached to node {current}"
                )));
            };
            let node = self
                .node(next)
                .ok_or_else(|| GatewayError::Source(format!("node {next} does not exist")))?;
            path.push(rel, node);
            current = next;
        }
        Ok(path)
    }

    pub fn tx_stats(&self) -> TxStats {
        TxStats {
            begun: self.counters.begun.load(Ordering::Relaxed),
            committed: self.counters.committed.load(Ordering::Relaxed),
            rolled_back: self.counters.rolled_back.load(Ordering::Relaxed),
        }
    }

    fn endpoint(&self, id: ElementId) -> GatewayResult<NodeRef> {
        self.nodes
            .get(&id)
            .map(NodeView::to_ref)
            .ok_or_else(|| GatewayError::Source(format!("dangling endpoint {id}")))
    }

    fn view_of(&self, id: ElementId, stored: &StoredRelationship) -> GatewayResult<RelationshipView> {
        Ok(RelationshipView {
            id,
            rel_type: stored.rel_type.clone(),
            start: self.endpoint(stored.start)?,
            end: self.endpoint(stored.end)?,
            properties: stored.properties.clone(),
        })
    }
}

impl GraphSource for InMemoryGraph {
    fn begin_read(&self) -> GatewayResult<Box<dyn ReadTransaction + '_>> {
        self.counters.begun.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("read transaction opened");
        Ok(Box::new(MemoryReadTransaction {
            graph: self,
            committed: false,
        }))
    }
}

impl GraphWriter for InMemoryGraph {
    fn create_node(&mut self, labels: Labels, properties: PropertyMap) -> GatewayResult<ElementId> {
        Ok(self.add_node(labels, properties))
    }

    fn create_relationship(
        &mut self,
        start: ElementId,
        end: ElementId,
        rel_type: &str,
        properties: PropertyMap,
    ) -> GatewayResult<ElementId> {
        self.add_relationship(start, end, rel_type, properties)
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

struct MemoryReadTransaction<'g> {
    graph: &'g InMemoryGraph,
    committed: bool,
}

impl ReadTransaction for MemoryReadTransaction<'_> {
    fn nodes(&mut self) -> ElementIter<'_, NodeView> {
        Box::new(self.graph.nodes.values().cloned().map(Ok))
    }

    fn relationships(&mut self) -> ElementIter<'_, RelationshipView> {
        let graph = self.graph;
        Box::new(
            graph
                .relationships
                .iter()
                .map(move |(&id, stored)| graph.view_of(id, stored)),
        )
    }

    fn execute(&mut self, statement: &str) -> GatewayResult<ResultRows<'_>> {
        let canned = self.graph.statements.get(statement).ok_or_else(|| {
            GatewayError::Source(format!("statement not supported: {statement}"))
        })?;
        Ok(ResultRows::new(
            canned.columns.clone(),
            Box::new(canned.rows.iter().cloned().map(Ok)),
        ))
    }

    fn commit(mut self: Box<Self>) -> GatewayResult<()> {
        self.committed = true;
        self.graph.counters.committed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("read transaction committed");
        Ok(())
    }
}

impl Drop for MemoryReadTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.graph.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("read transaction rolled back");
        }
    }
}
