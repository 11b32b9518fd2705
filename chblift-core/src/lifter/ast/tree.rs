//! Abstract Syntax Tree
//!
//! A function's AST as delivered on the wire: a flat node list, the id of the
//! root statement, span records and the available-expression table. Building
//! the tree populates a fresh [`NodeCache`]; the span map is built on first use.

use crate::config::ProvenanceMode;
use crate::lifter::ast::{
    AstNode, CRenderer, NodeCache, NodeFamily, NodeId, NodeKind, NodeRecord, SpanMap, SpanRecord,
};
use crate::lifter::error::{LiftError, LiftResult};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One available expression: node id, variable name, expression text.
pub type AvailableExpression = (NodeId, String, String);

/// Wire form of a function AST.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstRecord {
    pub nodes: Vec<NodeRecord>,
    pub startnode: NodeId,
    #[serde(default)]
    pub spans: Vec<SpanRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub available_expressions: BTreeMap<String, Vec<AvailableExpression>>,
}

pub struct AbstractSyntaxTree {
    cache: NodeCache,
    startnode: NodeId,
    spans: Vec<SpanRecord>,
    spanmap: OnceCell<SpanMap>,
    available_expressions: BTreeMap<String, Vec<AvailableExpression>>,
}

impl AbstractSyntaxTree {
    /// Build the tree from a wire record. Never fails: malformed nodes become
    /// generic nodes and duplicate ids are recorded in the cache.
    pub fn from_record(record: AstRecord) -> Self {
        let mut cache: NodeCache = NodeCache::new();
        for node in &record.nodes {
            cache.add(AstNode::from_record(node));
        }
        if cache.has_duplicates() {
            log::warn!("AST input contains duplicate node ids:{}", cache.format_duplicates());
        }
        Self {
            cache,
            startnode: record.startnode,
            spans: record.spans,
            spanmap: OnceCell::new(),
            available_expressions: record.available_expressions,
        }
    }

    pub fn from_json(text: &str) -> LiftResult<Self> {
        let record: AstRecord = serde_json::from_str(text)?;
        Ok(Self::from_record(record))
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    pub fn startnode(&self) -> NodeId {
        self.startnode
    }

    pub fn spans(&self) -> &[SpanRecord] {
        &self.spans
    }

    pub fn lookup(&self, id: NodeId) -> LiftResult<&AstNode> {
        self.cache.lookup(id)
    }

    /// Span map, built from the span records on first access.
    pub fn spanmap(&self) -> &SpanMap {
        self.spanmap.get_or_init(|| SpanMap::from_records(&self.spans))
    }

    pub fn format_duplicates(&self) -> String {
        self.cache.format_duplicates()
    }

    /// Render from the start node with the default provenance policy.
    pub fn to_c_like(&self) -> LiftResult<String> {
        self.to_c_like_with(ProvenanceMode::Optional)
    }

    pub fn to_c_like_with(&self, provenance: ProvenanceMode) -> LiftResult<String> {
        CRenderer::new(&self.cache)
            .with_spans(self.spanmap())
            .with_provenance(provenance)
            .render(self.startnode, 0)
    }

    /// Number of field/index links between an lval and the no-offset sentinel.
    ///
    /// # Errors
    /// [`LiftError::OffsetCycle`] if an offset id repeats along the chain.
    pub fn offset_chain_depth(&self, lval: NodeId) -> LiftResult<usize> {
        let node: &AstNode = self.cache.lookup(lval)?;
        if node.family() != NodeFamily::Lval {
            return Err(LiftError::wrong_variant(node.id, node.tag.clone(), "lval"));
        }
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut depth: usize = 0;
        let mut current: Option<&AstNode> = node.offset(&self.cache)?;
        while let Some(offset) = current {
            if offset.kind == NodeKind::NoOffset {
                break;
            }
            if !seen.insert(offset.id) {
                return Err(LiftError::OffsetCycle { id: lval });
            }
            depth += 1;
            current = offset.offset(&self.cache)?;
        }
        Ok(depth)
    }

    /// Wire records of all active nodes, sorted by id.
    pub fn serialize(&self) -> Vec<NodeRecord> {
        self.cache
            .sorted_nodes()
            .into_iter()
            .map(AstNode::to_record)
            .collect()
    }

    pub fn to_record(&self) -> AstRecord {
        AstRecord {
            nodes: self.serialize(),
            startnode: self.startnode,
            spans: self.spans.clone(),
            available_expressions: self.available_expressions.clone(),
        }
    }

    /// Available expressions for the named variables, grouped by address.
    pub fn var_available_expressions(&self, names: &[&str]) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (addr, entries) in &self.available_expressions {
            lines.push(addr.clone());
            for (id, vname, vexpr) in entries {
                if names.contains(&vname.as_str()) {
                    lines.push(format!("  {}: {} ({})", vname, vexpr, id));
                }
            }
        }
        lines.join("\n")
    }
}

impl fmt::Display for AbstractSyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let renderer: CRenderer<'_> = CRenderer::new(&self.cache).with_provenance(ProvenanceMode::Omit);
        for node in self.cache.sorted_nodes() {
            match renderer.render_node(node, 0) {
                Ok(text) => writeln!(f, "{}: {} {}", node.id, node.tag, text.replace('\n', " "))?,
                Err(err) => writeln!(f, "{}: {} <{}>", node.id, node.tag, err)?,
            }
        }
        Ok(())
    }
}
