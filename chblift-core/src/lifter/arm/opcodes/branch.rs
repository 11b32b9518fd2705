//! Branches: B and BX without a call target.
//!
//! Control flow is reconstructed elsewhere, so branches emit no instructions.
//! A conditional branch still produces its condition in both views and records
//! it against the branch address.

use crate::lifter::arm::condition::{condition_expr, ConditionCode};
use crate::lifter::arm::convert::xxpr_expr;
use crate::lifter::arm::{InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::NodeId;
use crate::lifter::builder::AstBuilder;
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::layouts::BranchXData;

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let cc: ConditionCode = instr.opcode.condition_code();
    if cc.is_unconditional() {
        log::trace!("{}: unconditional branch", ctx.iaddr);
        return Ok(InstrPair::empty());
    }
    let ll_condition: NodeId = condition_expr(builder, cc);
    builder.add_condition_address(ll_condition, &[ctx.iaddr]);

    let xd: BranchXData = BranchXData::from_xdata(&instr.xdata);
    let hl_condition: NodeId = match xd.true_condition {
        Some(condition) if instr.xdata.has_branch_conditions() => {
            xxpr_expr(builder, condition, ctx.iaddr)
        }
        _ => {
            if instr.xdata.has_unknown_condition() {
                log::warn!("{}: branch condition unknown to the analyzer; using flag test", ctx.iaddr);
            } else {
                log::debug!("{}: no branch condition in xdata; using flag test", ctx.iaddr);
            }
            condition_expr(builder, cc)
        }
    };
    builder.add_condition_address(hl_condition, &[ctx.iaddr]);
    builder.add_expr_mapping(hl_condition, ll_condition);
    builder.add_expr_reachingdefs(hl_condition, &xd.rdefs);
    Ok(InstrPair::empty())
}

/// BX to a register: a return through LR, otherwise an indirect jump.
pub fn lift_exchange(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let target: Option<String> = instr.operand(0)?.register_name();
    match target.as_deref() {
        Some("LR") => log::trace!("{}: return", ctx.iaddr),
        _ => {
            log::warn!("{}: indirect jump {} not represented", ctx.iaddr, instr.opcode);
            builder.add_diagnostic(format!("{}: indirect jump {}", ctx.iaddr, instr.opcode));
        }
    }
    Ok(InstrPair::empty())
}
