//! Graph data-source abstraction.
//!
//! The graph engine is an external collaborator; this crate is the seam the
//! export core consumes. Everything is pull-based: elements are produced one
//! at a time by a read transaction that stays open for the whole dump.

pub mod memory;
pub mod virtual_path;

use portico_core::error::GatewayResult;
use portico_core::{ElementId, Labels, NodeView, PropertyMap, RelationshipView, Value};

pub use memory::{InMemoryGraph, TxStats};
pub use virtual_path::{clone_path_to_virtual, clone_paths_to_virtual, VirtualCloner};

/// Lazy, finite, single-pass element sequence.
pub type ElementIter<'a, T> = Box<dyn Iterator<Item = GatewayResult<T>> + 'a>;

/// Tabular result of a statement: a fixed header plus lazily produced rows.
pub struct ResultRows<'a> {
    columns: Vec<String>,
    rows: ElementIter<'a, Vec<Value>>,
}

impl<'a> ResultRows<'a> {
    pub fn new(columns: Vec<String>, rows: ElementIter<'a, Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for ResultRows<'_> {
    type Item = GatewayResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// Read context held open for the duration of one dump.
///
/// Dropping a transaction without calling [`commit`](Self::commit) rolls it back.
pub trait ReadTransaction {
    fn nodes(&mut self) -> ElementIter<'_, NodeView>;

    fn relationships(&mut self) -> ElementIter<'_, RelationshipView>;

    /// Runs a statement and streams its rows.
    fn execute(&mut self, statement: &str) -> GatewayResult<ResultRows<'_>>;

    fn commit(self: Box<Self>) -> GatewayResult<()>;
}

/// Anything that can open read transactions.
pub trait GraphSource: Send + Sync {
    fn begin_read(&self) -> GatewayResult<Box<dyn ReadTransaction + '_>>;
}

/// Write side used by imports.
pub trait GraphWriter {
    fn create_node(&mut self, labels: Labels, properties: PropertyMap) -> GatewayResult<ElementId>;

    fn create_relationship(
        &mut self,
        start: ElementId,
        end: ElementId,
        rel_type: &str,
        properties: PropertyMap,
    ) -> GatewayResult<ElementId>;
}
