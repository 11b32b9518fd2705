//! AST Module
//!
//! Arena-backed C-like abstract syntax tree shared by the low-level and the
//! high-level views of a lifted function.
//!
//! Nodes never own other nodes: every edge is an integer id resolved through
//! the [`NodeCache`]. The sentinel id `-1` marks an absent edge (no offset,
//! no call lhs).

pub mod cache;
pub mod node;
pub mod operators;
pub mod render;
pub mod span;
pub mod tree;

pub use cache::NodeCache;
pub use node::{AstNode, NodeFamily, NodeKind, NodeRecord, WireInt};
pub use operators::Operator;
pub use render::CRenderer;
pub use span::{SpanEntry, SpanMap, SpanRecord};
pub use tree::{AbstractSyntaxTree, AstRecord};

/// Arena key of an AST node.
pub type NodeId = i64;

/// Sentinel id for an absent edge.
pub const NO_NODE: NodeId = -1;

/// Indentation unit for nested statements.
pub const C_INDENT: usize = 3;
