//! Node Cache
//!
//! Per-function arena mapping node ids to nodes. The cache is append-only:
//! nodes are inserted with [`NodeCache::add`] and never mutated afterwards.
//!
//! # Duplicate Ids
//! A second node under an id that is already present does not replace the
//! first one. Both are recorded in a side table and surfaced through
//! [`NodeCache::format_duplicates`]; the first-inserted node stays the active
//! lookup result.

use crate::lifter::ast::{AstNode, NodeId};
use crate::lifter::error::{LiftError, LiftResult};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    nodes: HashMap<NodeId, AstNode>,
    duplicates: BTreeMap<NodeId, Vec<AstNode>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under its own id.
    ///
    /// # Returns
    /// `true` if the node became the active entry, `false` if the id was
    /// already taken and the node went to the duplicates table.
    pub fn add(&mut self, node: AstNode) -> bool {
        match self.nodes.get(&node.id) {
            Some(existing) => {
                log::warn!(
                    "duplicate node id {}: keeping '{}', recording '{}'",
                    node.id,
                    existing.tag,
                    node.tag
                );
                let entry: &mut Vec<AstNode> = self.duplicates.entry(node.id).or_default();
                if entry.is_empty() {
                    entry.push(existing.clone());
                }
                entry.push(node);
                false
            }
            None => {
                self.nodes.insert(node.id, node);
                true
            }
        }
    }

    #[inline] // Hot path: every accessor goes through here
    pub fn lookup(&self, id: NodeId) -> LiftResult<&AstNode> {
        self.nodes.get(&id).ok_or_else(|| LiftError::not_found(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// Largest id in the cache, if any.
    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.keys().copied().max()
    }

    /// All active nodes in id order.
    pub fn sorted_nodes(&self) -> Vec<&AstNode> {
        let mut nodes: Vec<&AstNode> = self.nodes.values().collect();
        nodes.sort_by_key(|node| node.id);
        nodes
    }

    /// Render every id collision: the id on its own line, then one indented
    /// line per node recorded under it, in insertion order.
    pub fn format_duplicates(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (id, nodes) in &self.duplicates {
            lines.push(format!("\n{}", id));
            for node in nodes {
                let args: Vec<String> = node.args.iter().map(|a| a.to_string()).collect();
                lines.push(format!("  {} [{}]", node.tag, args.join(", ")));
            }
        }
        lines.join("\n")
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.duplicates.clear();
    }
}
