//! Block transfers: LDM, LDMIB, LDMDB, STM, STMIB, STMDB, PUSH, POP.
//!
//! PUSH is STMDB SP! and POP is LDMIA SP!; all of them go through one
//! offset computation. Register `i` of an `n`-register list is transferred at
//! `base + first_offset(n) + 4 * i`.

use crate::lifter::arm::convert::{xvariable_lval, xxpr_expr};
use crate::lifter::arm::memory_access::{classify_load, classify_store};
use crate::lifter::arm::{InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::{NodeId, Operator, NO_NODE};
use crate::lifter::builder::{AstBuilder, MemoryAccess};
use crate::lifter::error::{LiftError, LiftResult};
use crate::lifter::xdata::layouts::{MultipleItem, MultipleXData};
use std::slice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    IncrementAfter,
    IncrementBefore,
    DecrementAfter,
    DecrementBefore,
}

impl BlockMode {
    /// Offset of the first register relative to the base.
    pub fn first_offset(self, count: usize) -> i64 {
        let count: i64 = count as i64;
        match self {
            BlockMode::IncrementAfter => 0,
            BlockMode::IncrementBefore => 4,
            BlockMode::DecrementAfter => -4 * (count - 1),
            BlockMode::DecrementBefore => -4 * count,
        }
    }

    pub fn increments(self) -> bool {
        matches!(self, BlockMode::IncrementAfter | BlockMode::IncrementBefore)
    }
}

/// Decoded block transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTransfer {
    pub base: String,
    pub registers: Vec<String>,
    pub mode: BlockMode,
    pub load: bool,
    pub writeback: bool,
}

impl BlockTransfer {
    pub fn decode(instr: &InstructionRecord) -> LiftResult<Self> {
        let stem: String = instr.opcode.stem();
        let (mode, load) = match stem.as_str() {
            "LDM" | "LDMIA" | "LDMFD" | "POP" => (BlockMode::IncrementAfter, true),
            "LDMIB" => (BlockMode::IncrementBefore, true),
            "LDMDB" => (BlockMode::DecrementBefore, true),
            "STM" | "STMIA" | "STMEA" => (BlockMode::IncrementAfter, false),
            "STMIB" => (BlockMode::IncrementBefore, false),
            "STMDB" | "STMFD" | "PUSH" => (BlockMode::DecrementBefore, false),
            _ => {
                return Err(LiftError::unsupported(
                    instr.iaddr.as_str(),
                    format!("{} is not a block transfer", stem),
                ))
            }
        };
        let operands = instr.opcode.operands.as_slice();
        let (base, list, writeback) = match operands {
            [list] if stem == "PUSH" || stem == "POP" => ("SP".to_string(), list, true),
            [base, list] => {
                let base: String = base.register_name().ok_or_else(|| {
                    LiftError::inconsistent(instr.iaddr.as_str(), format!("{} base is not a register", stem))
                })?;
                (base, list, instr.opcode.writeback)
            }
            _ => {
                return Err(LiftError::inconsistent(
                    instr.iaddr.as_str(),
                    format!("{} has {} operands", stem, operands.len()),
                ))
            }
        };
        let registers: Vec<String> = list.registers().ok_or_else(|| {
            LiftError::inconsistent(instr.iaddr.as_str(), format!("{} has no register list", stem))
        })?;
        Ok(Self {
            base,
            registers,
            mode,
            load,
            writeback,
        })
    }

    pub fn offset_of(&self, index: usize) -> i64 {
        self.mode.first_offset(self.registers.len()) + 4 * index as i64
    }

    /// Net base adjustment of the write-back.
    pub fn base_delta(&self) -> i64 {
        let size: i64 = 4 * self.registers.len() as i64;
        if self.mode.increments() {
            size
        } else {
            -size
        }
    }

    /// `SP-16` style description of the slot of register `index`.
    pub fn location_of(&self, index: usize) -> String {
        format!("{}{:+}", self.base, self.offset_of(index))
    }
}

/// `base`, `(base + k)` or `(base - k)`.
fn base_offset_expr(builder: &mut AstBuilder, base: &str, offset: i64) -> NodeId {
    let base: NodeId = builder.mk_register_variable_expr(base);
    if offset == 0 {
        return base;
    }
    let (op, magnitude) = if offset < 0 {
        (Operator::Minus, -offset)
    } else {
        (Operator::Plus, offset)
    };
    let magnitude: NodeId = builder.mk_integer_constant(magnitude);
    builder.mk_binary_op(op, base, magnitude)
}

/// Low-level assignment with its lhs and rhs.
pub type LowAssign = (NodeId, NodeId, NodeId);

#[derive(Debug, Clone, Default)]
pub struct LowTransfer {
    pub items: Vec<LowAssign>,
    pub writeback: Option<LowAssign>,
}

impl LowTransfer {
    pub fn assigns(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.items
            .iter()
            .chain(self.writeback.iter())
            .map(|(assign, _, _)| *assign)
    }
}

/// Per-register transfers followed by the base write-back, from the operands only.
pub fn lift_low_level(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    transfer: &BlockTransfer,
) -> LowTransfer {
    let mut low: LowTransfer = LowTransfer::default();
    for (i, register) in transfer.registers.iter().enumerate() {
        let address: NodeId = base_offset_expr(builder, &transfer.base, transfer.offset_of(i));
        let slot: NodeId = builder.mk_memref_lval(address, NO_NODE);
        let (lhs, rhs) = if transfer.load {
            let lhs: NodeId = builder.mk_register_variable_lval(register);
            (lhs, builder.mk_lval_expr(slot))
        } else {
            (slot, builder.mk_register_variable_expr(register))
        };
        let assign: NodeId = ctx.emit_assign(builder, lhs, rhs);
        low.items.push((assign, lhs, rhs));
    }
    if transfer.writeback {
        let lhs: NodeId = builder.mk_register_variable_lval(&transfer.base);
        let rhs: NodeId = base_offset_expr(builder, &transfer.base, transfer.base_delta());
        let assign: NodeId = ctx.emit_assign(builder, lhs, rhs);
        low.writeback = Some((assign, lhs, rhs));
    }
    low
}

fn lift_item(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    transfer: &BlockTransfer,
    index: usize,
    item: Option<&MultipleItem>,
    (ll_assign, ll_lhs, ll_rhs): LowAssign,
) -> Option<NodeId> {
    let register: &str = &transfer.registers[index];
    if transfer.load && register == "PC" {
        log::debug!("{}: load into PC is a return; low-level only", ctx.iaddr);
        return None;
    }
    let value = item.and_then(|item| item.value);
    let location: String = transfer.location_of(index);
    let access: MemoryAccess = if transfer.load {
        classify_load(Some(register), value, &location)
    } else {
        classify_store(Some(register), value, &location)
    };
    let skip: bool = ctx.skips_high_level(&access);
    builder.add_memory_access(ctx.iaddr, access);
    if skip {
        log::debug!("{}: {} spill/restore inside trampoline; low-level only", ctx.iaddr, register);
        return None;
    }

    let var = item.and_then(|item| item.var);
    let hl_lhs: NodeId = match (var, transfer.load) {
        (Some(var), _) => xvariable_lval(builder, var, ctx.iaddr),
        (None, true) => {
            log::warn!("{}: no variable for {}; using the register", ctx.iaddr, register);
            builder.mk_register_variable_lval(register)
        }
        (None, false) => {
            log::error!("{}: location of {} is an error value; low-level only", ctx.iaddr, register);
            return None;
        }
    };
    let hl_rhs: NodeId = match (value, transfer.load) {
        (Some(value), _) => xxpr_expr(builder, value, ctx.iaddr),
        (None, false) => {
            log::warn!("{}: no rewritten value for {}; using the register", ctx.iaddr, register);
            builder.mk_register_variable_expr(register)
        }
        (None, true) => {
            log::error!("{}: no value for {}; using placeholder", ctx.iaddr, register);
            builder.mk_temp_expr(ctx.iaddr)
        }
    };
    let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);
    ctx.record_pair(builder, hl_assign, ll_assign);
    builder.add_expr_mapping(hl_rhs, ll_rhs);
    builder.add_lval_mapping(hl_lhs, ll_lhs);
    if let Some(item) = item {
        if let Some(rdef) = item.rdef {
            builder.add_expr_reachingdefs(hl_rhs, slice::from_ref(rdef));
        }
        builder.add_lval_defuses(hl_lhs, item.defuse);
        builder.add_lval_defuses_high(hl_lhs, item.defuse_high);
    }
    Some(hl_assign)
}

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let transfer: BlockTransfer = BlockTransfer::decode(instr)?;
    let low: LowTransfer = lift_low_level(builder, ctx, &transfer);
    let xd: MultipleXData = MultipleXData::from_xdata(&instr.xdata, transfer.registers.len());

    let mut pair: InstrPair = InstrPair::empty();
    for (i, low_item) in low.items.iter().enumerate() {
        pair.low.push(low_item.0);
        match lift_item(builder, ctx, &transfer, i, xd.items.get(i), *low_item) {
            Some(hl_assign) => pair.high.push(hl_assign),
            None => ctx.record_low(builder, low_item.0),
        }
    }

    if let Some((ll_assign, ll_lhs, ll_rhs)) = low.writeback {
        pair.low.push(ll_assign);
        match (xd.base_lhs, xd.base_updated) {
            (Some(base_lhs), Some(updated)) => {
                let hl_lhs: NodeId = xvariable_lval(builder, base_lhs, ctx.iaddr);
                let hl_rhs: NodeId = xxpr_expr(builder, updated, ctx.iaddr);
                let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);
                ctx.record_pair(builder, hl_assign, ll_assign);
                builder.add_lval_mapping(hl_lhs, ll_lhs);
                builder.add_expr_mapping(hl_rhs, ll_rhs);
                if let Some(rdef) = xd.base_rdef {
                    builder.add_expr_reachingdefs(hl_rhs, slice::from_ref(rdef));
                }
                builder.add_lval_defuses(hl_lhs, xd.base_defuse);
                builder.add_lval_defuses_high(hl_lhs, xd.base_defuse_high);
                pair.high.push(hl_assign);
            }
            _ => {
                log::warn!("{}: no base update in xdata for {}; low-level only", ctx.iaddr, transfer.base);
                ctx.record_low(builder, ll_assign);
            }
        }
    }
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifter::arm::{OpcodeRecord, Operand};

    #[test]
    fn test_block_offsets() {
        let instr = InstructionRecord::new(
            "0x100",
            "",
            OpcodeRecord::new("PUSH", [Operand::register_list(["R4", "R5", "R6", "LR"])]),
        );
        let transfer = BlockTransfer::decode(&instr).unwrap();
        assert_eq!(transfer.base, "SP");
        assert!(transfer.writeback);
        assert_eq!(transfer.offset_of(0), -16);
        assert_eq!(transfer.offset_of(3), -4);
        assert_eq!(transfer.base_delta(), -16);
        assert_eq!(transfer.location_of(0), "SP-16");
    }

    #[test]
    fn test_ldmib_offsets() {
        let instr = InstructionRecord::new(
            "0x100",
            "",
            OpcodeRecord::new(
                "LDMIB",
                [Operand::register("R0"), Operand::register_list(["R1", "R2"])],
            ),
        );
        let transfer = BlockTransfer::decode(&instr).unwrap();
        assert!(!transfer.writeback);
        assert_eq!(transfer.offset_of(0), 4);
        assert_eq!(transfer.offset_of(1), 8);
    }
}
