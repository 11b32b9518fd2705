//! MOV, MVN, VMOV.

use crate::lifter::arm::convert::{select_rhs, xvariable_lval, xxpr_expr, RhsTier};
use crate::lifter::arm::{lift_unsupported, InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::{NodeId, Operator};
use crate::lifter::builder::AstBuilder;
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::layouts::MoveXData;

/// Low-level `Rd = op2`, inverted for MVN, with its span. `None` for a move into PC.
///
/// Returns the assignment, its lhs and its rhs.
pub fn lift_low_level(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<Option<(NodeId, NodeId, NodeId)>> {
    let rd = instr.operand(0)?;
    let source = instr.operand(1)?;
    if rd.register_name().as_deref() == Some("PC") {
        return Ok(None);
    }
    let ll_lhs: NodeId = rd.ast_lvalue(builder, ctx.iaddr)?.lval;
    let value: NodeId = source.ast_rvalue(builder, ctx.iaddr)?;
    let ll_rhs: NodeId = if instr.opcode.stem() == "MVN" {
        builder.mk_unary_op(Operator::Bnot, value)
    } else {
        value
    };
    let ll_assign: NodeId = ctx.emit_assign(builder, ll_lhs, ll_rhs);
    Ok(Some((ll_assign, ll_lhs, ll_rhs)))
}

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    if instr.opcode.operands.len() != 2 {
        return Ok(lift_unsupported(builder, ctx, instr, "unexpected operand count"));
    }
    let Some((ll_assign, ll_lhs, ll_rhs)) = lift_low_level(builder, ctx, instr)? else {
        // MOV PC, LR style return: control flow is not represented here.
        log::debug!("{}: {} writes PC; treated as return", ctx.iaddr, instr.opcode);
        return Ok(InstrPair::empty());
    };
    if instr.opcode.setflags {
        builder.add_condition_setter(ctx.iaddr, &instr.opcode.stem());
    }

    let xd: MoveXData = MoveXData::from_xdata(&instr.xdata);
    let Some(vrd) = xd.vrd else {
        log::error!("{}: move destination is an error value; no high-level assignment", ctx.iaddr);
        ctx.record_low(builder, ll_assign);
        return Ok(InstrPair::low_only(ll_assign));
    };
    let hl_lhs: NodeId = xvariable_lval(builder, vrd, ctx.iaddr);
    let hl_rhs: NodeId = match select_rhs(ctx.iaddr, "move source", xd.cxrm, xd.rxrm, xd.xrm) {
        // The raw slot is the operand before inversion.
        (RhsTier::Raw, Some(raw)) if instr.opcode.stem() == "MVN" => {
            let value: NodeId = xxpr_expr(builder, raw, ctx.iaddr);
            builder.mk_unary_op(Operator::Bnot, value)
        }
        (_, Some(expr)) => xxpr_expr(builder, expr, ctx.iaddr),
        (_, None) => builder.mk_temp_expr(ctx.iaddr),
    };
    let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);

    ctx.record_pair(builder, hl_assign, ll_assign);
    builder.add_expr_mapping(hl_rhs, ll_rhs);
    builder.add_lval_mapping(hl_lhs, ll_lhs);
    builder.add_expr_reachingdefs(ll_rhs, &xd.rdefs);
    builder.add_expr_reachingdefs(hl_rhs, &xd.rdefs);
    builder.add_lval_defuses(hl_lhs, xd.defuse);
    builder.add_lval_defuses_high(hl_lhs, xd.defuse_high);
    Ok(InstrPair::single(hl_assign, ll_assign))
}
