//! Dual-Track AST Builder
//!
//! Construction API used by every opcode lifter. Mint operations allocate a
//! fresh id and insert one node into the builder's [`NodeCache`]; they touch
//! nothing else. Record operations populate the [`Provenance`] tables.
//!
//! One builder is created per function, so ids never collide across functions.
//!
//! # Examples
//! ```
//! use chblift_core::lifter::builder::AstBuilder;
//! use chblift_core::lifter::ast::Operator;
//!
//! let mut builder = AstBuilder::default();
//! let lhs = builder.mk_register_variable_lval("R0");
//! let r1 = builder.mk_register_variable_expr("R1");
//! let four = builder.mk_integer_constant(4);
//! let rhs = builder.mk_binary_op(Operator::Plus, r1, four);
//! let assign = builder.mk_assign(lhs, rhs);
//! assert_eq!(builder.render(assign).unwrap(), "R0 = (R1 + 4);");
//! ```

pub mod provenance;
pub mod symbols;

pub use provenance::{MemoryAccess, Provenance};
pub use symbols::{GlobalSymbolTable, TypeInfo};

use crate::config::ProvenanceMode;
use crate::lifter::ast::{
    AstNode, CRenderer, NodeCache, NodeId, NodeKind, Operator, SpanMap, SpanRecord, NO_NODE,
};
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::expr::stack_variable_name;
use crate::lifter::xdata::{DefUse, ReachingDef};
use std::collections::HashMap;
use std::sync::Arc;

pub struct AstBuilder {
    cache: NodeCache,
    next_id: NodeId,
    varinfos: HashMap<String, NodeId>,
    spans: Vec<SpanRecord>,
    provenance: Provenance,
    symbols: Arc<GlobalSymbolTable>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new(Arc::new(GlobalSymbolTable::new()))
    }
}

impl AstBuilder {
    pub fn new(symbols: Arc<GlobalSymbolTable>) -> Self {
        Self {
            cache: NodeCache::new(),
            next_id: 0,
            varinfos: HashMap::new(),
            spans: Vec::new(),
            provenance: Provenance::new(),
            symbols,
        }
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    pub fn lookup(&self, id: NodeId) -> LiftResult<&AstNode> {
        self.cache.lookup(id)
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn symbols(&self) -> &GlobalSymbolTable {
        &self.symbols
    }

    pub fn spans(&self) -> &[SpanRecord] {
        &self.spans
    }

    pub fn spanmap(&self) -> SpanMap {
        SpanMap::from_records(&self.spans)
    }

    /// Render a node without provenance comments.
    pub fn render(&self, id: NodeId) -> LiftResult<String> {
        CRenderer::new(&self.cache)
            .with_provenance(ProvenanceMode::Omit)
            .render(id, 0)
    }

    /// Consume the builder, keeping the arena, spans and cross-reference tables.
    pub fn into_parts(self) -> (NodeCache, Vec<SpanRecord>, Provenance) {
        (self.cache, self.spans, self.provenance)
    }

    #[inline] // Hot path: every mint goes through here
    fn add_node(&mut self, kind: NodeKind, args: impl IntoIterator<Item = NodeId>) -> NodeId {
        let id: NodeId = self.next_id;
        self.next_id += 1;
        self.cache.add(AstNode::new(id, kind, args));
        id
    }

    // ---------------------------------------------------------------------
    // Variables and lvals
    // ---------------------------------------------------------------------

    /// Varinfo for `name`, shared by every variable with that name.
    pub fn mk_varinfo(&mut self, name: &str, altname: Option<&str>) -> NodeId {
        if let Some(id) = self.varinfos.get(name) {
            return *id;
        }
        let id: NodeId = self.add_node(
            NodeKind::VarInfo {
                vname: name.to_string(),
                altname: altname.map(str::to_string),
            },
            [],
        );
        self.varinfos.insert(name.to_string(), id);
        id
    }

    pub fn mk_variable(&mut self, name: &str) -> NodeId {
        let varinfo: NodeId = self.mk_varinfo(name, None);
        self.add_node(NodeKind::Variable, [varinfo])
    }

    pub fn mk_lval(&mut self, lhost: NodeId, offset: NodeId) -> NodeId {
        self.add_node(NodeKind::Lval, [lhost, offset])
    }

    pub fn mk_named_lval(&mut self, name: &str) -> NodeId {
        let host: NodeId = self.mk_variable(name);
        self.mk_lval(host, NO_NODE)
    }

    pub fn mk_named_lval_expression(&mut self, name: &str) -> NodeId {
        let lval: NodeId = self.mk_named_lval(name);
        self.mk_lval_expr(lval)
    }

    pub fn mk_register_variable_lval(&mut self, register: &str) -> NodeId {
        self.mk_named_lval(register)
    }

    pub fn mk_register_variable_expr(&mut self, register: &str) -> NodeId {
        self.mk_named_lval_expression(register)
    }

    /// Expression for one of the N, Z, C, V condition flags.
    pub fn mk_flag_variable_expr(&mut self, flag: &str) -> NodeId {
        self.mk_named_lval_expression(flag)
    }

    pub fn mk_stack_variable_lval(&mut self, offset: i64) -> NodeId {
        let name: String = stack_variable_name(offset);
        self.mk_named_lval(&name)
    }

    pub fn mk_global_variable_lval(&mut self, name: &str) -> NodeId {
        self.mk_named_lval(name)
    }

    pub fn mk_global_variable_expr(&mut self, name: &str) -> NodeId {
        self.mk_named_lval_expression(name)
    }

    /// Placeholder for a value the analysis could not provide.
    pub fn mk_temp_lval(&mut self, iaddr: &str) -> NodeId {
        self.mk_named_lval(&format!("temp_{}", iaddr))
    }

    pub fn mk_temp_expr(&mut self, iaddr: &str) -> NodeId {
        let lval: NodeId = self.mk_temp_lval(iaddr);
        self.mk_lval_expr(lval)
    }

    pub fn mk_memref(&mut self, address: NodeId) -> NodeId {
        self.add_node(NodeKind::MemRef, [address])
    }

    pub fn mk_memref_lval(&mut self, address: NodeId, offset: NodeId) -> NodeId {
        let host: NodeId = self.mk_memref(address);
        self.mk_lval(host, offset)
    }

    pub fn mk_memref_expr(&mut self, address: NodeId) -> NodeId {
        let lval: NodeId = self.mk_memref_lval(address, NO_NODE);
        self.mk_lval_expr(lval)
    }

    // ---------------------------------------------------------------------
    // Offsets
    // ---------------------------------------------------------------------

    pub fn mk_field_offset(&mut self, fname: &str, nested: NodeId) -> NodeId {
        self.add_node(
            NodeKind::FieldOffset {
                fname: fname.to_string(),
            },
            [nested],
        )
    }

    pub fn mk_index_offset(&mut self, index: NodeId, nested: NodeId) -> NodeId {
        self.add_node(NodeKind::IndexOffset, [index, nested])
    }

    pub fn mk_scalar_index_offset(&mut self, index: i64) -> NodeId {
        let index: NodeId = self.mk_integer_constant(index);
        self.mk_index_offset(index, NO_NODE)
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    pub fn mk_lval_expr(&mut self, lval: NodeId) -> NodeId {
        self.add_node(NodeKind::LvalExpr, [lval])
    }

    pub fn mk_integer_constant(&mut self, value: i64) -> NodeId {
        self.add_node(
            NodeKind::IntegerConstant {
                value,
                macroname: None,
            },
            [],
        )
    }

    pub fn mk_named_integer_constant(&mut self, value: i64, macroname: &str) -> NodeId {
        self.add_node(
            NodeKind::IntegerConstant {
                value,
                macroname: Some(macroname.to_string()),
            },
            [],
        )
    }

    pub fn mk_string_constant(&mut self, cstr: &str, va: Option<&str>) -> NodeId {
        self.add_node(
            NodeKind::StringConstant {
                cstr: cstr.to_string(),
                va: va.map(str::to_string),
            },
            [],
        )
    }

    pub fn mk_address_of(&mut self, lval: NodeId) -> NodeId {
        self.add_node(NodeKind::AddressOf, [lval])
    }

    pub fn mk_cast_expr(&mut self, tgttype: &str, expr: NodeId) -> NodeId {
        self.add_node(
            NodeKind::CastE {
                tgttype: tgttype.to_string(),
            },
            [expr],
        )
    }

    pub fn mk_unary_op(&mut self, op: Operator, expr: NodeId) -> NodeId {
        self.mk_raw_unary_op(op.tag(), expr)
    }

    pub fn mk_binary_op(&mut self, op: Operator, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.mk_raw_binary_op(op.tag(), lhs, rhs)
    }

    /// Unary operator by wire tag. Unknown tags are accepted here and fail at render time.
    pub fn mk_raw_unary_op(&mut self, op: &str, expr: NodeId) -> NodeId {
        self.add_node(NodeKind::UnaryOp { op: op.to_string() }, [expr])
    }

    /// Binary operator by wire tag. Unknown tags are accepted here and fail at render time.
    pub fn mk_raw_binary_op(&mut self, op: &str, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(NodeKind::BinaryOp { op: op.to_string() }, [lhs, rhs])
    }

    pub fn mk_question(&mut self, condition: NodeId, then_expr: NodeId, else_expr: NodeId) -> NodeId {
        self.add_node(NodeKind::Question, [condition, then_expr, else_expr])
    }

    pub fn mk_substituted_expr(&mut self, lval: NodeId, expr: NodeId) -> NodeId {
        self.add_node(NodeKind::SubstitutedExpr, [lval, expr])
    }

    // ---------------------------------------------------------------------
    // Instructions and statements
    // ---------------------------------------------------------------------

    pub fn mk_assign(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(NodeKind::Assign, [lhs, rhs])
    }

    pub fn mk_call(&mut self, lhs: Option<NodeId>, target: NodeId, args: &[NodeId]) -> NodeId {
        let mut edges: Vec<NodeId> = Vec::with_capacity(args.len() + 2);
        edges.push(lhs.unwrap_or(NO_NODE));
        edges.push(target);
        edges.extend_from_slice(args);
        self.add_node(NodeKind::Call, edges)
    }

    /// Low-level stand-in for an instruction without a lifting rule: `__asm("text")`.
    pub fn mk_asm_stub(&mut self, text: &str) -> NodeId {
        let target: NodeId = self.mk_global_variable_expr("__asm");
        let arg: NodeId = self.mk_string_constant(text, None);
        self.mk_call(None, target, &[arg])
    }

    pub fn mk_instr_sequence(&mut self, instrs: &[NodeId]) -> NodeId {
        self.add_node(NodeKind::InstrSequence, instrs.iter().copied())
    }

    pub fn mk_block(&mut self, stmts: &[NodeId]) -> NodeId {
        self.add_node(NodeKind::Block, stmts.iter().copied())
    }

    pub fn mk_branch(&mut self, condition: NodeId, if_stmt: NodeId, else_stmt: NodeId) -> NodeId {
        self.add_node(NodeKind::Branch, [condition, if_stmt, else_stmt])
    }

    pub fn mk_return_stmt(&mut self, expr: Option<NodeId>) -> NodeId {
        self.add_node(NodeKind::Return, expr)
    }

    // ---------------------------------------------------------------------
    // Record operations
    // ---------------------------------------------------------------------

    pub fn add_instruction_span(&mut self, instr: NodeId, iaddr: &str, bytestring: &str) {
        if self.spans.iter().any(|s| s.id == instr) {
            return;
        }
        let size: Option<u32> = if bytestring.is_empty() {
            None
        } else {
            u32::try_from(bytestring.len() / 2).ok()
        };
        self.spans.push(SpanRecord::new(instr, iaddr, size));
    }

    pub fn add_instr_mapping(&mut self, high: NodeId, low: NodeId) {
        self.provenance.add_instr_mapping(high, low);
    }

    pub fn add_instr_address(&mut self, instr: NodeId, iaddrs: &[&str]) {
        self.provenance.add_instr_address(instr, iaddrs);
    }

    pub fn add_expr_mapping(&mut self, high: NodeId, low: NodeId) {
        self.provenance.add_expr_mapping(high, low);
    }

    pub fn add_lval_mapping(&mut self, high: NodeId, low: NodeId) {
        self.provenance.add_lval_mapping(high, low);
    }

    pub fn add_expr_reachingdefs(&mut self, expr: NodeId, rdefs: &[ReachingDef]) {
        self.provenance.add_expr_reachingdefs(expr, rdefs);
    }

    pub fn add_lval_defuses(&mut self, lval: NodeId, defuse: Option<&DefUse>) {
        if let Some(defuse) = defuse {
            self.provenance.add_lval_defuses(lval, defuse);
        }
    }

    pub fn add_lval_defuses_high(&mut self, lval: NodeId, defuse: Option<&DefUse>) {
        if let Some(defuse) = defuse {
            self.provenance.add_lval_defuses_high(lval, defuse);
        }
    }

    pub fn add_condition_address(&mut self, expr: NodeId, iaddrs: &[&str]) {
        self.provenance.add_condition_address(expr, iaddrs);
    }

    pub fn add_return_value_intro(&mut self, iaddr: &str, lval: NodeId) {
        self.provenance.add_return_value_intro(iaddr, lval);
    }

    pub fn add_condition_setter(&mut self, iaddr: &str, mnemonic: &str) {
        self.provenance.add_condition_setter(iaddr, mnemonic);
    }

    pub fn add_memory_access(&mut self, iaddr: &str, access: MemoryAccess) {
        self.provenance.add_memory_access(iaddr, access);
    }

    pub fn add_instruction_unsupported(&mut self, mnemonic: &str, description: &str) {
        self.provenance.add_instruction_unsupported(mnemonic, description);
    }

    pub fn add_diagnostic(&mut self, message: impl Into<String>) {
        self.provenance.add_diagnostic(message);
    }

    /// High-level instructions that have no low-level mapping.
    pub fn verify_coverage(&self, high: &[NodeId]) -> Vec<NodeId> {
        self.provenance.uncovered(high)
    }
}
