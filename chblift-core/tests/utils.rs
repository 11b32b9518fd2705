//! Test Utilities
//!
//! Builders for analyzed instructions, symbol tables and single-instruction lifts.

#![allow(dead_code)]

use chblift_core::config::LiftConfig;
use chblift_core::lifter::arm::{lift_instruction, InstrContext, InstrPair, InstructionRecord, OpcodeRecord, Operand};
use chblift_core::lifter::ast::NodeId;
use chblift_core::lifter::builder::{AstBuilder, GlobalSymbolTable};
use chblift_core::lifter::xdata::InstrXData;
use serde_json::{json, Value};
use std::sync::Arc;

/// Decode an xdata record from its wire JSON.
pub fn xdata(value: Value) -> InstrXData {
    serde_json::from_value(value).unwrap()
}

/// Analyzed instruction with a 4-byte encoding.
pub fn instr(iaddr: &str, mnemonic: &str, operands: Vec<Operand>, xd: Value) -> InstructionRecord {
    InstructionRecord::new(iaddr, "00000000", OpcodeRecord::new(mnemonic, operands)).with_xdata(xdata(xd))
}

/// Conditional variant of [`instr`]; `condition` is an analyzer tag such as `eq`.
pub fn conditional_instr(
    iaddr: &str,
    mnemonic: &str,
    condition: &str,
    operands: Vec<Operand>,
    xd: Value,
) -> InstructionRecord {
    let mut record = instr(iaddr, mnemonic, operands, xd);
    record.opcode.condition = Some(condition.to_string());
    record
}

pub fn symbols(value: Value) -> Arc<GlobalSymbolTable> {
    Arc::new(serde_json::from_value(value).unwrap())
}

/// Lift one instruction with the default configuration, outside any trampoline.
pub fn lift(builder: &mut AstBuilder, record: &InstructionRecord) -> InstrPair {
    lift_with(builder, record, &LiftConfig::default(), false)
}

pub fn lift_with(
    builder: &mut AstBuilder,
    record: &InstructionRecord,
    config: &LiftConfig,
    in_trampoline: bool,
) -> InstrPair {
    let ctx = InstrContext::new(record, config).with_trampoline(in_trampoline);
    lift_instruction(builder, &ctx, record).unwrap()
}

/// Render each node without provenance comments.
pub fn render_all(builder: &AstBuilder, ids: &[NodeId]) -> Vec<String> {
    ids.iter().map(|id| builder.render(*id).unwrap()).collect()
}

// Wire expressions

pub fn reg_var(name: &str) -> Value {
    json!({"kind": "register", "name": name})
}

pub fn stack_var(offset: i64) -> Value {
    json!({"kind": "stack", "offset": offset})
}

pub fn reg(name: &str) -> Value {
    json!({"kind": "var", "var": reg_var(name)})
}

pub fn constant(value: i64) -> Value {
    json!({"kind": "const", "value": value})
}

pub fn initial(register: &str) -> Value {
    json!({"kind": "initial-register", "register": register})
}

pub fn op(name: &str, args: Vec<Value>) -> Value {
    json!({"kind": "op", "op": name, "args": args})
}

pub fn int_type() -> Value {
    json!({"integer": {"signed": true, "size": 4}})
}

pub fn pointer_to(pointee: Value) -> Value {
    json!({"pointer": {"pointee": pointee}})
}

/// Register variable carrying a declared C type.
pub fn typed_reg(name: &str, ctype: Value) -> Value {
    json!({"kind": "var", "var": {"kind": "register", "name": name, "ctype": ctype}})
}
