//! Detached copies of paths.
//!
//! Clones are owned snapshots with fresh negative ids. Within one
//! [`VirtualCloner`] every source element is cloned at most once, so paths
//! that share nodes or relationships share the same virtual copy.

use portico_core::{ElementId, NodeView, PathView, RelationshipView, SubGraph};
use std::collections::HashMap;

/// Batch-scoped cloner. Ids count down from -1.
#[derive(Debug, Default)]
pub struct VirtualCloner {
    next_id: ElementId,
    node_ids: HashMap<ElementId, usize>,
    rel_ids: HashMap<ElementId, usize>,
    nodes: Vec<NodeView>,
    relationships: Vec<RelationshipView>,
}

impl VirtualCloner {
    pub fn new() -> Self {
        Self {
            next_id: -1,
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> ElementId {
        let id = self.next_id;
        self.next_id -= 1;
        id
    }

    pub fn clone_node(&mut self, node: &NodeView) -> NodeView {
        if let Some(&idx) = self.node_ids.get(&node.id) {
            return self.nodes[idx].clone();
        }
        let copy = NodeView {
            id: self.allocate(),
            labels: node.labels.clone(),
            properties: node.properties.clone(),
        };
        self.node_ids.insert(node.id, self.nodes.len());
        self.nodes.push(copy.clone());
        copy
    }

    /// Clones `rel` with endpoints remapped onto the virtual copies of
    /// `start` and `end`.
    pub fn clone_relationship(
        &mut self,
        rel: &RelationshipView,
        start: &NodeView,
        end: &NodeView,
    ) -> RelationshipView {
        if let Some(&idx) = self.rel_ids.get(&rel.id) {
            return self.relationships[idx].clone();
        }
        let start = self.clone_node(start).to_ref();
        let end = self.clone_node(end).to_ref();
        let copy = RelationshipView {
            id: self.allocate(),
            rel_type: rel.rel_type.clone(),
            start,
            end,
            properties: rel.properties.clone(),
        };
        self.rel_ids.insert(rel.id, self.relationships.len());
        self.relationships.push(copy.clone());
        copy
    }

    pub fn clone_path(&mut self, path: &PathView) -> PathView {
        let nodes_by_id: HashMap<ElementId, &NodeView> =
            path.nodes.iter().map(|n| (n.id, n)).collect();

        let nodes: Vec<NodeView> = path.nodes.iter().map(|n| self.clone_node(n)).collect();
        let relationships = path
            .relationships
            .iter()
            .map(|rel| {
                match (nodes_by_id.get(&rel.start.id), nodes_by_id.get(&rel.end.id)) {
                    (Some(start), Some(end)) => self.clone_relationship(rel, start, end),
                    // Endpoint not on the path; keep the endpoint summary as-is.
                    _ => self.clone_detached_relationship(rel),
                }
            })
            .collect();

        PathView {
            nodes,
            relationships,
        }
    }

    fn clone_detached_relationship(&mut self, rel: &RelationshipView) -> RelationshipView {
        if let Some(&idx) = self.rel_ids.get(&rel.id) {
            return self.relationships[idx].clone();
        }
        let copy = RelationshipView {
            id: self.allocate(),
            ..rel.clone()
        };
        self.rel_ids.insert(rel.id, self.relationships.len());
        self.relationships.push(copy.clone());
        copy
    }

    /// Every distinct element cloned so far, in first-seen order.
    pub fn into_subgraph(self) -> SubGraph {
        SubGraph::new(self.nodes, self.relationships)
    }
}

pub fn clone_path_to_virtual(path: &PathView) -> PathView {
    VirtualCloner::new().clone_path(path)
}

/// Clones a batch of paths, sharing copies of elements that appear on more
/// than one path.
pub fn clone_paths_to_virtual(paths: &[PathView]) -> Vec<PathView> {
    let mut cloner = VirtualCloner::new();
    paths.iter().map(|p| cloner.clone_path(p)).collect()
}
