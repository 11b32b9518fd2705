//! ARM Opcode Lifting
//!
//! Every supported opcode produces up to two instruction lists: the low-level
//! list built purely from the instruction's operands, and the high-level list
//! built from the analyzer's xdata. A lifter records spans for everything it
//! emits and maps each high-level instruction to the low-level ones it came from.
//!
//! # Dispatch
//! [`lift_instruction`] selects a lifter by mnemonic stem. Instructions folded
//! into a multi-instruction idiom are handled by [`idioms`] and driven from the
//! pipeline. Anything without a rule gets a low-level `__asm("...")` stub and an
//! entry in the unsupported table.

pub mod condition;
pub mod convert;
pub mod idioms;
pub mod memory_access;
pub mod opcodes;
pub mod operand;

pub use condition::ConditionCode;
pub use operand::Operand;

use crate::config::LiftConfig;
use crate::lifter::ast::NodeId;
use crate::lifter::builder::{AstBuilder, MemoryAccess};
use crate::lifter::error::{LiftError, LiftResult};
use crate::lifter::xdata::InstrXData;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Disassembled opcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeRecord {
    pub mnemonic: String,
    /// Condition as an analyzer tag (`eq`, `nuh`, ...) or a mnemonic extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub operands: SmallVec<[Operand; 4]>,
    /// Base register write-back (`!` on LDM/STM).
    #[serde(default)]
    pub writeback: bool,
    #[serde(default)]
    pub setflags: bool,
}

impl OpcodeRecord {
    pub fn new(mnemonic: impl Into<String>, operands: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            condition: None,
            operands: operands.into_iter().collect(),
            writeback: false,
            setflags: false,
        }
    }

    /// Upper-case mnemonic without Thumb width qualifier.
    pub fn stem(&self) -> String {
        let upper: String = self.mnemonic.trim().to_ascii_uppercase();
        match upper.split_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => upper,
        }
    }

    pub fn condition_code(&self) -> ConditionCode {
        match self.condition.as_deref() {
            Some(tag) => ConditionCode::from_tag(tag).unwrap_or_else(|| {
                log::warn!("unknown condition '{}' on {}; treated as always", tag, self.mnemonic);
                ConditionCode::Al
            }),
            None => ConditionCode::Al,
        }
    }
}

impl fmt::Display for OpcodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix: &str = self.condition_code().suffix();
        let setflags: &str = if self.setflags { "S" } else { "" };
        write!(f, "{}{}{}", self.stem(), setflags, suffix)?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep: &str = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand)?;
            if i == 0 && self.writeback && !operand.is_memory() {
                write!(f, "!")?;
            }
        }
        Ok(())
    }
}

/// One analyzed instruction as delivered on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    pub iaddr: String,
    /// Hex encoding of the instruction; its length gives the span size.
    #[serde(default)]
    pub bytestring: String,
    pub opcode: OpcodeRecord,
    #[serde(default)]
    pub xdata: InstrXData,
}

impl InstructionRecord {
    pub fn new(iaddr: impl Into<String>, bytestring: impl Into<String>, opcode: OpcodeRecord) -> Self {
        Self {
            iaddr: iaddr.into(),
            bytestring: bytestring.into(),
            opcode,
            xdata: InstrXData::default(),
        }
    }

    pub fn with_xdata(mut self, xdata: InstrXData) -> Self {
        self.xdata = xdata;
        self
    }

    pub fn operand(&self, index: usize) -> LiftResult<&Operand> {
        self.opcode.operands.get(index).ok_or_else(|| {
            LiftError::inconsistent(
                self.iaddr.as_str(),
                format!("{} has no operand {}", self.opcode.stem(), index),
            )
        })
    }
}

/// Per-instruction lifting context.
#[derive(Debug, Clone, Copy)]
pub struct InstrContext<'r> {
    pub iaddr: &'r str,
    pub bytestring: &'r str,
    pub in_trampoline: bool,
    pub config: &'r LiftConfig,
}

impl<'r> InstrContext<'r> {
    pub fn new(instr: &'r InstructionRecord, config: &'r LiftConfig) -> Self {
        Self {
            iaddr: &instr.iaddr,
            bytestring: &instr.bytestring,
            in_trampoline: false,
            config,
        }
    }

    pub fn with_trampoline(mut self, in_trampoline: bool) -> Self {
        self.in_trampoline = in_trampoline;
        self
    }

    /// Context for another instruction of the same function.
    pub fn for_member(&self, member: &'r InstructionRecord) -> Self {
        Self {
            iaddr: &member.iaddr,
            bytestring: &member.bytestring,
            in_trampoline: self.in_trampoline,
            config: self.config,
        }
    }

    /// Mint an assignment and record this instruction's span on it.
    pub fn emit_assign(&self, builder: &mut AstBuilder, lhs: NodeId, rhs: NodeId) -> NodeId {
        let assign: NodeId = builder.mk_assign(lhs, rhs);
        builder.add_instruction_span(assign, self.iaddr, self.bytestring);
        assign
    }

    pub fn emit_call(
        &self,
        builder: &mut AstBuilder,
        lhs: Option<NodeId>,
        target: NodeId,
        args: &[NodeId],
    ) -> NodeId {
        let call: NodeId = builder.mk_call(lhs, target, args);
        builder.add_instruction_span(call, self.iaddr, self.bytestring);
        call
    }

    /// Map `high` to `low` and tie both to this instruction's address.
    pub fn record_pair(&self, builder: &mut AstBuilder, high: NodeId, low: NodeId) {
        builder.add_instr_mapping(high, low);
        builder.add_instr_address(high, &[self.iaddr]);
        builder.add_instr_address(low, &[self.iaddr]);
    }

    pub fn record_low(&self, builder: &mut AstBuilder, low: NodeId) {
        builder.add_instr_address(low, &[self.iaddr]);
    }

    /// Spills and restores inside a trampoline are left out of the high-level view.
    pub fn skips_high_level(&self, access: &MemoryAccess) -> bool {
        self.in_trampoline
            && self.config.skip_trampoline_spills
            && (access.is_spill() || access.is_restore())
    }
}

/// High-level and low-level instructions produced for one machine instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrPair {
    pub high: SmallVec<[NodeId; 4]>,
    pub low: SmallVec<[NodeId; 4]>,
}

impl InstrPair {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(high: NodeId, low: NodeId) -> Self {
        let mut pair: InstrPair = Self::default();
        pair.high.push(high);
        pair.low.push(low);
        pair
    }

    pub fn low_only(low: NodeId) -> Self {
        let mut pair: InstrPair = Self::default();
        pair.low.push(low);
        pair
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }

    pub fn extend(&mut self, other: InstrPair) {
        self.high.extend(other.high);
        self.low.extend(other.low);
    }
}

/// Lift one instruction by mnemonic.
pub fn lift_instruction(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let stem: String = instr.opcode.stem();
    match stem.as_str() {
        "ADD" | "ADC" | "SUB" | "RSB" | "MUL" | "AND" | "ORR" | "EOR" | "BIC" | "LSL" | "LSR"
        | "ASR" | "VADD" | "VSUB" | "VMUL" | "VDIV" => {
            opcodes::data_processing::lift(builder, ctx, instr)
        }
        "MOV" | "MVN" | "VMOV" => opcodes::moves::lift(builder, ctx, instr),
        "CMP" | "CMN" | "TST" | "TEQ" | "VCMP" => opcodes::compare::lift(builder, ctx, instr),
        "LDR" | "LDRB" | "LDRH" | "LDRSH" | "LDRSB" | "VLDR" => {
            opcodes::load::lift(builder, ctx, instr)
        }
        "LDRD" => opcodes::load::lift_dual(builder, ctx, instr),
        "STR" | "STRB" | "STRH" | "VSTR" => opcodes::store::lift(builder, ctx, instr),
        "STRD" => opcodes::store::lift_dual(builder, ctx, instr),
        "LDM" | "LDMIA" | "LDMFD" | "LDMIB" | "LDMDB" | "STM" | "STMIA" | "STMEA" | "STMIB"
        | "STMDB" | "STMFD" | "PUSH" | "POP" => opcodes::multiple::lift(builder, ctx, instr),
        "B" => opcodes::branch::lift(builder, ctx, instr),
        "BX" if instr.xdata.has_call_target() => opcodes::call::lift(builder, ctx, instr),
        "BX" => opcodes::branch::lift_exchange(builder, ctx, instr),
        "BL" | "BLX" => opcodes::call::lift(builder, ctx, instr),
        it if it.starts_with("IT") && it.chars().skip(2).all(|c| c == 'T' || c == 'E') => {
            // Condition prefix only; its effect lives in the instructions it governs.
            log::debug!("{}: {} has no effect of its own", ctx.iaddr, instr.opcode);
            Ok(InstrPair::empty())
        }
        _ => Ok(lift_unsupported(builder, ctx, instr, "no lifting rule")),
    }
}

/// Record an instruction the lifter cannot express and emit its `__asm` stub.
pub fn lift_unsupported(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
    reason: &str,
) -> InstrPair {
    let text: String = instr.opcode.to_string();
    log::warn!("{}: {} for {}", ctx.iaddr, reason, text);
    builder.add_instruction_unsupported(&instr.opcode.stem(), &format!("{}: {}", ctx.iaddr, text));
    if !ctx.config.unsupported_stubs {
        return InstrPair::empty();
    }
    let stub: NodeId = builder.mk_asm_stub(&text);
    builder.add_instruction_span(stub, ctx.iaddr, ctx.bytestring);
    ctx.record_low(builder, stub);
    InstrPair::low_only(stub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_text() {
        let mut opcode = OpcodeRecord::new(
            "add.w",
            [Operand::register("R0"), Operand::register("R1"), Operand::immediate(4)],
        );
        opcode.condition = Some("ne".to_string());
        opcode.setflags = true;
        assert_eq!(opcode.to_string(), "ADDSNE R0, R1, #4");
    }

    #[test]
    fn test_writeback_marker() {
        let mut opcode = OpcodeRecord::new(
            "STMDB",
            [Operand::register("SP"), Operand::register_list(["R4", "LR"])],
        );
        opcode.writeback = true;
        assert_eq!(opcode.to_string(), "STMDB SP!, {R4, LR}");
    }

    #[test]
    fn test_unknown_opcode_gets_stub() {
        let mut builder = AstBuilder::default();
        let config = LiftConfig::default();
        let instr = InstructionRecord::new(
            "0x104",
            "b0fa80f0",
            OpcodeRecord::new("CLZ", [Operand::register("R0"), Operand::register("R1")]),
        );
        let ctx = InstrContext::new(&instr, &config);
        let pair = lift_instruction(&mut builder, &ctx, &instr).unwrap();
        assert!(pair.high.is_empty());
        assert_eq!(pair.low.len(), 1);
        assert_eq!(builder.render(pair.low[0]).unwrap(), "__asm(\"CLZ R0, R1\");");
        assert_eq!(builder.provenance().unsupported["CLZ"], vec!["0x104: CLZ R0, R1".to_string()]);
    }
}
