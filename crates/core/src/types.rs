//! Domain types for the Portico gateway.
//!
//! Element views are read-only, owned projections of graph data. The export
//! core iterates them but never holds references into a live graph.

use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Stable element identifier. Virtual (detached) elements use negative ids.
pub type ElementId = i64;

/// Label set of a node. Most nodes carry one or two labels.
pub type Labels = SmallVec<[String; 4]>;

/// Property map. Ordered so serialized output is deterministic.
pub type PropertyMap = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Closed value taxonomy consumed by the value codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(Box<NodeView>),
    Relationship(Box<RelationshipView>),
    Path(Box<PathView>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
            Value::Relationship(_) => "relationship",
            Value::Path(_) => "path",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<NodeView> for Value {
    fn from(v: NodeView) -> Self {
        Value::Node(Box::new(v))
    }
}

impl From<RelationshipView> for Value {
    fn from(v: RelationshipView) -> Self {
        Value::Relationship(Box::new(v))
    }
}

impl From<PathView> for Value {
    fn from(v: PathView) -> Self {
        Value::Path(Box::new(v))
    }
}

// ---------------------------------------------------------------------------
// Graph element views
// ---------------------------------------------------------------------------

/// A node: id, label set, properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeView {
    pub id: ElementId,
    pub labels: Labels,
    pub properties: PropertyMap,
}

impl NodeView {
    pub fn new(id: ElementId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Id + labels, as embedded in relationship endpoints.
    pub fn to_ref(&self) -> NodeRef {
        NodeRef {
            id: self.id,
            labels: self.labels.clone(),
        }
    }
}

/// Relationship endpoint summary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeRef {
    pub id: ElementId,
    pub labels: Labels,
}

/// A relationship: id, type, endpoints, properties.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipView {
    pub id: ElementId,
    pub rel_type: String,
    pub start: NodeRef,
    pub end: NodeRef,
    pub properties: PropertyMap,
}

impl RelationshipView {
    pub fn new(id: ElementId, rel_type: impl Into<String>, start: NodeRef, end: NodeRef) -> Self {
        Self {
            id,
            rel_type: rel_type.into(),
            start,
            end,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Alternating node/relationship sequence. `nodes.len() == relationships.len() + 1`
/// for any non-empty path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathView {
    pub nodes: Vec<NodeView>,
    pub relationships: Vec<RelationshipView>,
}

impl PathView {
    pub fn single(node: NodeView) -> Self {
        Self {
            nodes: vec![node],
            relationships: Vec::new(),
        }
    }

    /// Extends the path by one hop.
    pub fn push(&mut self, rel: RelationshipView, node: NodeView) {
        self.relationships.push(rel);
        self.nodes.push(node);
    }

    /// Number of relationships.
    pub fn length(&self) -> usize {
        self.relationships.len()
    }
}

/// Free-standing subgraph supplied by a caller (`export_data` / `export_graph`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubGraph {
    pub nodes: Vec<NodeView>,
    pub relationships: Vec<RelationshipView>,
}

impl SubGraph {
    pub fn new(nodes: Vec<NodeView>, relationships: Vec<RelationshipView>) -> Self {
        Self {
            nodes,
            relationships,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}
