//! Data-processing opcodes: ADD, ADC, SUB, RSB, MUL, AND, ORR, EOR, BIC, LSL,
//! LSR, ASR and the VFP arithmetic VADD, VSUB, VMUL, VDIV.

use crate::lifter::arm::convert::{rhs_expr, xvariable_lval, xxpr_expr, RhsTier};
use crate::lifter::arm::operand::Operand;
use crate::lifter::arm::{lift_unsupported, InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::{NodeId, Operator, NO_NODE};
use crate::lifter::builder::{AstBuilder, TypeInfo};
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::layouts::DataProcXData;
use crate::lifter::xdata::XXpr;

fn operator_for(stem: &str) -> Option<Operator> {
    let op = match stem {
        "ADD" | "ADC" | "VADD" => Operator::Plus,
        "SUB" | "RSB" | "VSUB" => Operator::Minus,
        "MUL" | "VMUL" => Operator::Mult,
        "VDIV" => Operator::Div,
        "AND" | "BIC" => Operator::Band,
        "ORR" => Operator::Bor,
        "EOR" => Operator::Bxor,
        "LSL" => Operator::Lsl,
        "LSR" => Operator::Lsr,
        "ASR" => Operator::Asr,
        _ => return None,
    };
    Some(op)
}

/// Low-level right-hand side from the literal operands.
fn low_level_rhs(builder: &mut AstBuilder, stem: &str, op: Operator, rn: NodeId, rm: NodeId) -> NodeId {
    match stem {
        "RSB" => builder.mk_binary_op(Operator::Minus, rm, rn),
        "BIC" => {
            let inverted: NodeId = builder.mk_unary_op(Operator::Bnot, rm);
            builder.mk_binary_op(Operator::Band, rn, inverted)
        }
        "ADC" => {
            let sum: NodeId = builder.mk_binary_op(Operator::Plus, rn, rm);
            let carry: NodeId = builder.mk_flag_variable_expr("C");
            builder.mk_binary_op(Operator::Plus, sum, carry)
        }
        _ => builder.mk_binary_op(op, rn, rm),
    }
}

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let stem: String = instr.opcode.stem();
    let Some(op) = operator_for(&stem) else {
        return Ok(lift_unsupported(builder, ctx, instr, "not a data-processing opcode"));
    };
    let (rd, rn, rm): (&Operand, &Operand, &Operand) = match instr.opcode.operands.as_slice() {
        [rd, rn, rm] => (rd, rn, rm),
        // Thumb two-operand form: Rd = Rd op Rm
        [rd, rm] => (rd, rd, rm),
        _ => {
            return Ok(lift_unsupported(builder, ctx, instr, "unexpected operand count"));
        }
    };

    let ll_lhs: NodeId = rd.ast_lvalue(builder, ctx.iaddr)?.lval;
    let ll_rn: NodeId = rn.ast_rvalue(builder, ctx.iaddr)?;
    let ll_rm: NodeId = rm.ast_rvalue(builder, ctx.iaddr)?;
    let ll_rhs: NodeId = low_level_rhs(builder, &stem, op, ll_rn, ll_rm);
    let ll_assign: NodeId = ctx.emit_assign(builder, ll_lhs, ll_rhs);
    if instr.opcode.setflags {
        builder.add_condition_setter(ctx.iaddr, &stem);
    }

    let xd: DataProcXData = DataProcXData::from_xdata(&instr.xdata);
    builder.add_expr_reachingdefs(ll_rhs, &xd.operand_rdefs);

    let Some(vrd) = xd.vrd else {
        log::error!(
            "{}: destination of {} is an error value; no high-level assignment",
            ctx.iaddr,
            stem
        );
        ctx.record_low(builder, ll_assign);
        return Ok(InstrPair::low_only(ll_assign));
    };
    let hl_lhs: NodeId = xvariable_lval(builder, vrd, ctx.iaddr);
    let (hl_rhs, tier) = if stem == "ADD" {
        add_result(builder, ctx, &xd)
    } else {
        let what: String = format!("{} result", stem);
        rhs_expr(builder, ctx.iaddr, &what, xd.cresult, xd.rresult, xd.result)
    };
    if tier == RhsTier::Placeholder {
        builder.add_diagnostic(format!("{}: {} result replaced by placeholder", ctx.iaddr, stem));
    }
    let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);

    ctx.record_pair(builder, hl_assign, ll_assign);
    builder.add_expr_mapping(hl_rhs, ll_rhs);
    builder.add_lval_mapping(hl_lhs, ll_lhs);
    builder.add_expr_reachingdefs(hl_rhs, &xd.result_rdefs);
    builder.add_lval_defuses(hl_lhs, xd.defuse);
    builder.add_lval_defuses_high(hl_lhs, xd.defuse_high);
    Ok(InstrPair::single(hl_assign, ll_assign))
}

/// ADD result: address results as addresses, pointer sums scaled by the
/// pointee size, everything else through the fallback chain.
fn add_result(builder: &mut AstBuilder, ctx: &InstrContext, xd: &DataProcXData) -> (NodeId, RhsTier) {
    if let Some(rresult) = xd.rresult {
        if rresult.is_stack_address() || rresult.is_global_address() || rresult.is_string_ref() {
            return (xxpr_expr(builder, rresult, ctx.iaddr), RhsTier::Rewritten);
        }
    }
    if xd.cresult.is_none() {
        if let (Some(xxrn), Some(xxrm)) = (xd.xxrn, xd.xxrm) {
            let scaled: Option<NodeId> = pointer_sum(builder, ctx, xxrn, xxrm)
                .or_else(|| pointer_sum(builder, ctx, xxrm, xxrn));
            if let Some(expr) = scaled {
                return (expr, RhsTier::Rewritten);
            }
        }
    }
    rhs_expr(builder, ctx.iaddr, "ADD result", xd.cresult, xd.rresult, xd.result)
}

/// `&p->f`, `p + k/size` or `p + x/size` for a typed pointer `p`.
///
/// Returns `None` when `pointer` is not a typed pointer, the pointee is a byte,
/// or a constant addend is not a multiple of the pointee size; the caller then
/// uses the unscaled sum.
pub fn pointer_sum(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    pointer: &XXpr,
    addend: &XXpr,
) -> Option<NodeId> {
    let pointee: TypeInfo = pointer.ctype()?.pointee()?.clone();
    let constant: Option<i64> = addend.const_value();
    if let Some(field) = constant
        .filter(|k| *k > 0)
        .and_then(|k| u32::try_from(k).ok())
        .and_then(|k| pointee.field_at(k))
    {
        let base: NodeId = xxpr_expr(builder, pointer, ctx.iaddr);
        let offset: NodeId = builder.mk_field_offset(&field.name, NO_NODE);
        let lval: NodeId = builder.mk_memref_lval(base, offset);
        return Some(builder.mk_address_of(lval));
    }
    let size: i64 = i64::from(pointee.size_in_bytes()?);
    if size <= 1 {
        return None;
    }
    let scaled: NodeId = match constant {
        Some(k) if k % size == 0 => builder.mk_integer_constant(k / size),
        Some(k) => {
            log::warn!(
                "{}: offset {} is not a multiple of pointee size {}; left unscaled",
                ctx.iaddr,
                k,
                size
            );
            return None;
        }
        None => {
            let addend: NodeId = xxpr_expr(builder, addend, ctx.iaddr);
            let size: NodeId = builder.mk_integer_constant(size);
            builder.mk_binary_op(Operator::Div, addend, size)
        }
    };
    let base: NodeId = xxpr_expr(builder, pointer, ctx.iaddr);
    Some(builder.mk_binary_op(Operator::Plus, base, scaled))
}
