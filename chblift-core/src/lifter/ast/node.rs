//! AST Node Variants
//!
//! Every node carries its arena id, its wire tag and its ordered edge list.
//! Tag-specific payload lives in [`NodeKind`], a closed sum type; unknown tags
//! become [`NodeKind::Generic`] so that construction never fails.
//!
//! # Node Families
//! - **Statement**: `return`, `block`, `instrs`, `if`
//! - **Instruction**: `assign`, `call`
//! - **Lval**: `lval` (host + offset chain)
//! - **LHost**: `var`, `memref`
//! - **VarInfo**: `varinfo`
//! - **Offset**: `no-offset`, `field-offset`, `index-offset`
//! - **Expr**: constants, `lval-expr`, `substituted-expr`, `cast-expr`,
//!   `unary-op`, `binary-op`, `question`, `address-of`
//!
//! # Accessors
//! Structural accessors resolve `args[i]` through the [`NodeCache`] and check the
//! family of the target. A mismatch is a [`LiftError::WrongVariant`], a dangling
//! edge is a [`LiftError::NodeNotFound`]. Generic nodes are accepted wherever a
//! typed node is expected so that partially understood trees still render.

use crate::lifter::ast::{NodeCache, NodeId, NO_NODE};
use crate::lifter::error::{LiftError, LiftResult};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Wire tags.
pub mod tags {
    pub const RETURN: &str = "return";
    pub const BLOCK: &str = "block";
    pub const INSTRS: &str = "instrs";
    pub const BRANCH: &str = "if";
    pub const ASSIGN: &str = "assign";
    pub const CALL: &str = "call";
    pub const LVAL: &str = "lval";
    pub const VARINFO: &str = "varinfo";
    pub const VARIABLE: &str = "var";
    pub const MEMREF: &str = "memref";
    pub const NO_OFFSET: &str = "no-offset";
    pub const FIELD_OFFSET: &str = "field-offset";
    pub const INDEX_OFFSET: &str = "index-offset";
    pub const INTEGER_CONSTANT: &str = "integer-constant";
    pub const STRING_CONSTANT: &str = "string-constant";
    pub const LVAL_EXPR: &str = "lval-expr";
    pub const SUBSTITUTED_EXPR: &str = "substituted-expr";
    pub const CAST_EXPR: &str = "cast-expr";
    pub const UNARY_OP: &str = "unary-op";
    pub const BINARY_OP: &str = "binary-op";
    pub const QUESTION: &str = "question";
    pub const ADDRESS_OF: &str = "address-of";
}

/// Integer field that the analyzer emits either as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireInt {
    Number(i64),
    Text(String),
}

impl WireInt {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireInt::Number(n) => Some(*n),
            WireInt::Text(text) => parse_int(text),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            WireInt::Number(n) => n.to_string(),
            WireInt::Text(text) => text.clone(),
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer, with optional sign.
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value: i64 = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => body.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Flat wire record of one node, as produced by the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub tag: String,
    #[serde(default)]
    pub args: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<WireInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macroname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cstr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub va: Option<WireInt>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ctype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
}

impl NodeRecord {
    pub fn new(id: NodeId, tag: impl Into<String>, args: Vec<NodeId>) -> Self {
        Self {
            id,
            tag: tag.into(),
            args,
            ..Self::default()
        }
    }
}

/// Node family, the unit of accessor checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeFamily {
    Statement,
    Instruction,
    Lval,
    LHost,
    VarInfo,
    Offset,
    Expr,
    Generic,
}

/// Tag-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Return,
    Block,
    InstrSequence,
    Branch,
    Assign,
    Call,
    Lval,
    VarInfo {
        vname: String,
        altname: Option<String>,
    },
    Variable,
    MemRef,
    NoOffset,
    FieldOffset {
        fname: String,
    },
    IndexOffset,
    IntegerConstant {
        value: i64,
        macroname: Option<String>,
    },
    StringConstant {
        cstr: String,
        va: Option<String>,
    },
    LvalExpr,
    SubstitutedExpr,
    CastE {
        tgttype: String,
    },
    UnaryOp {
        op: String,
    },
    BinaryOp {
        op: String,
    },
    Question,
    AddressOf,
    Generic,
}

impl NodeKind {
    /// Wire tag of a known kind. Generic nodes keep the tag they arrived with.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Return => tags::RETURN,
            NodeKind::Block => tags::BLOCK,
            NodeKind::InstrSequence => tags::INSTRS,
            NodeKind::Branch => tags::BRANCH,
            NodeKind::Assign => tags::ASSIGN,
            NodeKind::Call => tags::CALL,
            NodeKind::Lval => tags::LVAL,
            NodeKind::VarInfo { .. } => tags::VARINFO,
            NodeKind::Variable => tags::VARIABLE,
            NodeKind::MemRef => tags::MEMREF,
            NodeKind::NoOffset => tags::NO_OFFSET,
            NodeKind::FieldOffset { .. } => tags::FIELD_OFFSET,
            NodeKind::IndexOffset => tags::INDEX_OFFSET,
            NodeKind::IntegerConstant { .. } => tags::INTEGER_CONSTANT,
            NodeKind::StringConstant { .. } => tags::STRING_CONSTANT,
            NodeKind::LvalExpr => tags::LVAL_EXPR,
            NodeKind::SubstitutedExpr => tags::SUBSTITUTED_EXPR,
            NodeKind::CastE { .. } => tags::CAST_EXPR,
            NodeKind::UnaryOp { .. } => tags::UNARY_OP,
            NodeKind::BinaryOp { .. } => tags::BINARY_OP,
            NodeKind::Question => tags::QUESTION,
            NodeKind::AddressOf => tags::ADDRESS_OF,
            NodeKind::Generic => "generic",
        }
    }

    pub fn family(&self) -> NodeFamily {
        match self {
            NodeKind::Return | NodeKind::Block | NodeKind::InstrSequence | NodeKind::Branch => {
                NodeFamily::Statement
            }
            NodeKind::Assign | NodeKind::Call => NodeFamily::Instruction,
            NodeKind::Lval => NodeFamily::Lval,
            NodeKind::Variable | NodeKind::MemRef => NodeFamily::LHost,
            NodeKind::VarInfo { .. } => NodeFamily::VarInfo,
            NodeKind::NoOffset | NodeKind::FieldOffset { .. } | NodeKind::IndexOffset => {
                NodeFamily::Offset
            }
            NodeKind::Generic => NodeFamily::Generic,
            _ => NodeFamily::Expr,
        }
    }
}

/// One arena node.
///
/// # Memory Optimization
/// Most nodes have at most four edges, so the edge list is a `SmallVec` that
/// stays inline for everything except blocks, sequences and wide calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub id: NodeId,
    pub tag: String,
    pub args: SmallVec<[NodeId; 4]>,
    pub kind: NodeKind,
}

impl AstNode {
    pub fn new(id: NodeId, kind: NodeKind, args: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            id,
            tag: kind.tag().to_string(),
            args: args.into_iter().collect(),
            kind,
        }
    }

    /// The no-offset sentinel node.
    pub fn no_offset() -> Self {
        Self::new(NO_NODE, NodeKind::NoOffset, [])
    }

    /// Build a node from its wire record.
    ///
    /// # Algorithm
    /// Dispatches on the tag. Known tags whose required payload is missing, and
    /// unknown tags, become generic nodes; the surprise is logged, never raised.
    pub fn from_record(record: &NodeRecord) -> Self {
        let kind: NodeKind = match record.tag.as_str() {
            tags::RETURN => NodeKind::Return,
            tags::BLOCK => NodeKind::Block,
            tags::INSTRS => NodeKind::InstrSequence,
            tags::BRANCH => NodeKind::Branch,
            tags::ASSIGN => NodeKind::Assign,
            tags::CALL => NodeKind::Call,
            tags::LVAL => NodeKind::Lval,
            tags::VARINFO => match &record.vname {
                Some(vname) => NodeKind::VarInfo {
                    vname: vname.clone(),
                    altname: record.altname.clone(),
                },
                None => missing_field(record, "vname"),
            },
            tags::VARIABLE => NodeKind::Variable,
            tags::MEMREF => NodeKind::MemRef,
            tags::NO_OFFSET => NodeKind::NoOffset,
            tags::FIELD_OFFSET => match &record.fname {
                Some(fname) => NodeKind::FieldOffset {
                    fname: fname.clone(),
                },
                None => missing_field(record, "fname"),
            },
            tags::INDEX_OFFSET => NodeKind::IndexOffset,
            tags::INTEGER_CONSTANT => {
                let value: i64 = match record.value.as_ref().and_then(WireInt::as_i64) {
                    Some(value) => value,
                    None => {
                        log::warn!(
                            "integer-constant node {} has no readable value ({:?}); using 0",
                            record.id,
                            record.value
                        );
                        0
                    }
                };
                NodeKind::IntegerConstant {
                    value,
                    macroname: record.macroname.clone(),
                }
            }
            tags::STRING_CONSTANT => match &record.cstr {
                Some(cstr) => NodeKind::StringConstant {
                    cstr: cstr.clone(),
                    va: record.va.as_ref().map(WireInt::to_text),
                },
                None => missing_field(record, "cstr"),
            },
            tags::LVAL_EXPR => NodeKind::LvalExpr,
            tags::SUBSTITUTED_EXPR => NodeKind::SubstitutedExpr,
            tags::CAST_EXPR => match &record.ctype {
                Some(tgttype) => NodeKind::CastE {
                    tgttype: tgttype.clone(),
                },
                None => missing_field(record, "type"),
            },
            tags::UNARY_OP => match &record.op {
                Some(op) => NodeKind::UnaryOp { op: op.clone() },
                None => missing_field(record, "op"),
            },
            tags::BINARY_OP => match &record.op {
                Some(op) => NodeKind::BinaryOp { op: op.clone() },
                None => missing_field(record, "op"),
            },
            tags::QUESTION => NodeKind::Question,
            tags::ADDRESS_OF => NodeKind::AddressOf,
            _ => NodeKind::Generic,
        };
        Self {
            id: record.id,
            tag: record.tag.clone(),
            args: record.args.iter().copied().collect(),
            kind,
        }
    }

    /// Convert back to the wire record.
    pub fn to_record(&self) -> NodeRecord {
        let mut record: NodeRecord = NodeRecord::new(self.id, self.tag.clone(), self.args.to_vec());
        match &self.kind {
            NodeKind::VarInfo { vname, altname } => {
                record.vname = Some(vname.clone());
                record.altname = altname.clone();
            }
            NodeKind::FieldOffset { fname } => record.fname = Some(fname.clone()),
            NodeKind::IntegerConstant { value, macroname } => {
                record.value = Some(WireInt::Number(*value));
                record.macroname = macroname.clone();
            }
            NodeKind::StringConstant { cstr, va } => {
                record.cstr = Some(cstr.clone());
                record.va = va.clone().map(WireInt::Text);
            }
            NodeKind::CastE { tgttype } => record.ctype = Some(tgttype.clone()),
            NodeKind::UnaryOp { op } | NodeKind::BinaryOp { op } => record.op = Some(op.clone()),
            _ => {}
        }
        record
    }

    #[inline]
    pub fn family(&self) -> NodeFamily {
        self.kind.family()
    }

    pub fn is_generic(&self) -> bool {
        self.kind == NodeKind::Generic
    }

    /// Edge at `index`, without resolving it.
    pub fn arg(&self, index: usize) -> LiftResult<NodeId> {
        match self.args.get(index) {
            Some(id) => Ok(*id),
            None => Err(LiftError::MissingArgument {
                id: self.id,
                tag: self.tag.clone(),
                index,
            }),
        }
    }

    fn wrong(&self, expected: &'static str) -> LiftError {
        LiftError::wrong_variant(self.id, self.tag.clone(), expected)
    }

    /// Resolve edge `index` and check the family of the target.
    fn resolve<'c>(
        &self,
        cache: &'c NodeCache,
        index: usize,
        family: NodeFamily,
        expected: &'static str,
    ) -> LiftResult<&'c AstNode> {
        let node: &AstNode = cache.lookup(self.arg(index)?)?;
        if node.family() == family || node.is_generic() {
            Ok(node)
        } else {
            Err(node.wrong(expected))
        }
    }

    /// Display name of a varinfo: the alias if present, else the logical name.
    pub fn display_name(&self) -> LiftResult<&str> {
        match &self.kind {
            NodeKind::VarInfo { vname, altname } => Ok(altname.as_deref().unwrap_or(vname)),
            _ => Err(self.wrong("varinfo")),
        }
    }

    /// Lhs of an assignment, or of a call when it has one.
    pub fn lhs<'c>(&self, cache: &'c NodeCache) -> LiftResult<Option<&'c AstNode>> {
        match self.kind {
            NodeKind::Assign => Ok(Some(self.resolve(cache, 0, NodeFamily::Lval, "lval")?)),
            NodeKind::Call => {
                if self.arg(0)? == NO_NODE {
                    Ok(None)
                } else {
                    Ok(Some(self.resolve(cache, 0, NodeFamily::Lval, "lval")?))
                }
            }
            _ => Err(self.wrong("assign or call")),
        }
    }

    pub fn rhs<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::Assign => self.resolve(cache, 1, NodeFamily::Expr, "expression"),
            _ => Err(self.wrong("assign")),
        }
    }

    pub fn call_target<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::Call => self.resolve(cache, 1, NodeFamily::Expr, "expression"),
            _ => Err(self.wrong("call")),
        }
    }

    pub fn call_arguments<'c>(&self, cache: &'c NodeCache) -> LiftResult<Vec<&'c AstNode>> {
        match self.kind {
            NodeKind::Call => (2..self.args.len())
                .map(|i| self.resolve(cache, i, NodeFamily::Expr, "expression"))
                .collect(),
            _ => Err(self.wrong("call")),
        }
    }

    pub fn lhost<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::Lval => self.resolve(cache, 0, NodeFamily::LHost, "variable or memref"),
            _ => Err(self.wrong("lval")),
        }
    }

    /// Offset edge of an lval or the nested offset of an offset node.
    ///
    /// Returns `None` for the `-1` sentinel.
    pub fn offset<'c>(&self, cache: &'c NodeCache) -> LiftResult<Option<&'c AstNode>> {
        let index: usize = match self.kind {
            NodeKind::Lval => 1,
            NodeKind::FieldOffset { .. } => 0,
            NodeKind::IndexOffset => 1,
            NodeKind::NoOffset => return Ok(None),
            _ => return Err(self.wrong("lval or offset")),
        };
        match self.args.get(index) {
            None | Some(&NO_NODE) => Ok(None),
            Some(_) => Ok(Some(self.resolve(cache, index, NodeFamily::Offset, "offset")?)),
        }
    }

    pub fn varinfo<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::Variable => self.resolve(cache, 0, NodeFamily::VarInfo, "varinfo"),
            _ => Err(self.wrong("var")),
        }
    }

    pub fn memexp<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::MemRef => self.resolve(cache, 0, NodeFamily::Expr, "expression"),
            _ => Err(self.wrong("memref")),
        }
    }

    pub fn index_expr<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::IndexOffset => self.resolve(cache, 0, NodeFamily::Expr, "expression"),
            _ => Err(self.wrong("index-offset")),
        }
    }

    /// Wrapped lval of an lval-expr, address-of or substituted-expr.
    pub fn lval<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::LvalExpr | NodeKind::AddressOf | NodeKind::SubstitutedExpr => {
                self.resolve(cache, 0, NodeFamily::Lval, "lval")
            }
            _ => Err(self.wrong("lval-expr, address-of or substituted-expr")),
        }
    }

    pub fn substituted_expr<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::SubstitutedExpr => self.resolve(cache, 1, NodeFamily::Expr, "expression"),
            _ => Err(self.wrong("substituted-expr")),
        }
    }

    /// Operand `index` of an operator, cast, question or return.
    pub fn operand<'c>(&self, cache: &'c NodeCache, index: usize) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::UnaryOp { .. }
            | NodeKind::BinaryOp { .. }
            | NodeKind::CastE { .. }
            | NodeKind::Question
            | NodeKind::Return => self.resolve(cache, index, NodeFamily::Expr, "expression"),
            _ => Err(self.wrong("operator, cast, question or return")),
        }
    }

    pub fn condition<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::Branch => self.resolve(cache, 0, NodeFamily::Expr, "expression"),
            _ => Err(self.wrong("if")),
        }
    }

    pub fn if_branch<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::Branch => self.resolve(cache, 1, NodeFamily::Statement, "statement"),
            _ => Err(self.wrong("if")),
        }
    }

    pub fn else_branch<'c>(&self, cache: &'c NodeCache) -> LiftResult<&'c AstNode> {
        match self.kind {
            NodeKind::Branch => self.resolve(cache, 2, NodeFamily::Statement, "statement"),
            _ => Err(self.wrong("if")),
        }
    }

    /// Children of a block or instruction sequence, in order.
    pub fn children<'c>(&self, cache: &'c NodeCache) -> LiftResult<Vec<&'c AstNode>> {
        match self.kind {
            NodeKind::Block | NodeKind::InstrSequence => self
                .args
                .iter()
                .filter(|id| **id != NO_NODE)
                .map(|id| cache.lookup(*id))
                .collect(),
            _ => Err(self.wrong("block or instrs")),
        }
    }
}

#[cold]
fn missing_field(record: &NodeRecord, field: &str) -> NodeKind {
    log::warn!(
        "node {} with tag '{}' has no '{}' field; keeping it as a generic node",
        record.id,
        record.tag,
        field
    );
    NodeKind::Generic
}
