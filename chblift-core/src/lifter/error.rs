//! Lifter Error Handling
//!
//! Error types for AST construction, rendering, and opcode lifting using `thiserror`.
//!
//! # Error Categories
//! - **Lookup errors**: a node id referenced by `args` is absent from the node cache.
//!   These are fatal for the function being lifted.
//! - **Variant errors**: a node was accessed through an accessor that its tag does not support.
//! - **Rendering errors**: unknown operators, required spans that are missing.
//! - **Lifting errors**: unsupported constructs and inconsistent wire data. Lifters log
//!   these and degrade; they only surface as values when a caller asks for them.
//! - **Wire format errors**: JSON input that cannot be decoded at all.

use crate::lifter::ast::NodeId;
use thiserror::Error;

/// Lifter error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiftError {
    /// Node lookup error.
    ///
    /// Occurs when an edge in the arena points at an id that was never added.
    #[error("Node lookup error: node {id} not found in node cache")]
    NodeNotFound { id: NodeId },

    /// Checked accessor applied to a node of the wrong family.
    #[error("Wrong variant: node {id} has tag '{tag}', expected {expected}")]
    WrongVariant {
        id: NodeId,
        tag: String,
        expected: &'static str,
    },

    /// A structural accessor asked for an edge the node does not carry.
    #[error("Missing argument {index} in node {id} ({tag})")]
    MissingArgument {
        id: NodeId,
        tag: String,
        index: usize,
    },

    /// Operator tag with no entry in the operator table.
    ///
    /// Raised when rendering, never when constructing.
    #[error("Unknown operator '{op}' in node {id}\nSuggestion: {suggestion}")]
    UnknownOperator {
        id: NodeId,
        op: String,
        suggestion: String,
    },

    /// Span required for a provenance comment but not present.
    #[error("Missing span for node {id}\nSuggestion: {suggestion}")]
    MissingSpan { id: NodeId, suggestion: String },

    /// Offset chain that never reaches the no-offset sentinel.
    #[error("Offset chain starting at node {id} does not terminate")]
    OffsetCycle { id: NodeId },

    /// Opcode or addressing mode with no lifting rule.
    #[error("Unsupported construct at {iaddr}: {message}")]
    Unsupported { iaddr: String, message: String },

    /// Wire data whose shape contradicts the documented layout.
    #[error("Inconsistent wire data at {iaddr}: {message}")]
    InconsistentWireData { iaddr: String, message: String },

    /// Input that cannot be decoded.
    #[error("Wire format error: {message}\nSuggestion: {suggestion}")]
    WireFormat { message: String, suggestion: String },
}

impl LiftError {
    /// Create a lookup error for a missing node.
    #[inline]
    pub fn not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    /// Create a wrong-variant error.
    pub fn wrong_variant(id: NodeId, tag: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongVariant {
            id,
            tag: tag.into(),
            expected,
        }
    }

    pub fn unknown_operator(id: NodeId, op: impl Into<String>) -> Self {
        Self::UnknownOperator {
            id,
            op: op.into(),
            suggestion: "Check that the analyzer and the lifter agree on the operator table."
                .to_string(),
        }
    }

    pub fn missing_span(id: NodeId) -> Self {
        Self::MissingSpan {
            id,
            suggestion: "Render with provenance set to 'optional' or 'omit', or supply spans."
                .to_string(),
        }
    }

    /// Create an unsupported-construct error.
    pub fn unsupported(iaddr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            iaddr: iaddr.into(),
            message: message.into(),
        }
    }

    /// Create an inconsistent-wire-data error.
    pub fn inconsistent(iaddr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InconsistentWireData {
            iaddr: iaddr.into(),
            message: message.into(),
        }
    }

    /// True for errors that abort the lift of the current function.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound { .. } | Self::MissingArgument { .. } | Self::OffsetCycle { .. }
        )
    }
}

impl From<serde_json::Error> for LiftError {
    #[cold]
    fn from(err: serde_json::Error) -> Self {
        Self::WireFormat {
            message: err.to_string(),
            suggestion: "Check that the input was produced by a compatible analyzer version."
                .to_string(),
        }
    }
}

pub type LiftResult<T> = std::result::Result<T, LiftError>;
