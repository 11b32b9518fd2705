//! Loads: LDR, LDRB, LDRH, LDRSH, LDRSB, VLDR and the dual LDRD.

use crate::lifter::arm::convert::{address_lval, select_rhs, xvariable_expr, xvariable_lval, xxpr_expr};
use crate::lifter::arm::memory_access::classify_load;
use crate::lifter::arm::opcodes::emit_writeback;
use crate::lifter::arm::operand::{AstLvalue, Operand, Writeback};
use crate::lifter::arm::{lift_unsupported, InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::{NodeId, Operator, NO_NODE};
use crate::lifter::builder::{AstBuilder, MemoryAccess};
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::layouts::{DualHalf, LoadDualXData, LoadXData};
use crate::lifter::xdata::{ReachingDef, XXpr};

fn location_text(xd: &LoadXData, mem: &Operand) -> String {
    match (xd.vmem, xd.xaddr) {
        (Some(vmem), _) if !vmem.is_temp() => vmem.name(),
        (_, Some(xaddr)) => xaddr.to_string(),
        _ => mem.to_string(),
    }
}

/// High-level loaded value.
///
/// A rewritten value that is only an unresolved memory cell is replaced by the
/// typed dereference of the address, so struct fields and array elements show.
fn loaded_value(builder: &mut AstBuilder, ctx: &InstrContext, xd: &LoadXData) -> NodeId {
    if xd.cxmem.is_none() {
        if let (Some(XXpr::Var { var }), Some(xaddr)) = (xd.rxmem, xd.xaddr) {
            if var.has_unknown_memory_base() {
                let lval: NodeId = address_lval(builder, xaddr, ctx.iaddr);
                return builder.mk_lval_expr(lval);
            }
        }
    }
    match select_rhs(ctx.iaddr, "loaded value", xd.cxmem, xd.rxmem, xd.xmem) {
        (_, Some(expr)) => xxpr_expr(builder, expr, ctx.iaddr),
        (_, None) => {
            if let Some(vmem) = xd.vmem.filter(|v| !v.is_temp()) {
                log::info!("{}: using memory location {} as loaded value", ctx.iaddr, vmem);
                return xvariable_expr(builder, vmem, ctx.iaddr);
            }
            if let Some(xaddr) = xd.xaddr {
                log::info!("{}: dereferencing address {} as loaded value", ctx.iaddr, xaddr);
                let lval: NodeId = address_lval(builder, xaddr, ctx.iaddr);
                return builder.mk_lval_expr(lval);
            }
            builder.mk_temp_expr(ctx.iaddr)
        }
    }
}

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let (rt, mem): (&Operand, &Operand) = match instr.opcode.operands.as_slice() {
        [rt, mem] if mem.is_memory() => (rt, mem),
        _ => return Ok(lift_unsupported(builder, ctx, instr, "unexpected load operands")),
    };
    let ll_lhs: NodeId = rt.ast_lvalue(builder, ctx.iaddr)?.lval;
    let source: AstLvalue = mem.ast_lvalue(builder, ctx.iaddr)?;
    let ll_rhs: NodeId = builder.mk_lval_expr(source.lval);
    let ll_assign: NodeId = ctx.emit_assign(builder, ll_lhs, ll_rhs);

    let xd: LoadXData = LoadXData::from_xdata(&instr.xdata);
    builder.add_expr_reachingdefs(ll_rhs, &xd.address_rdefs);
    let mut pair: InstrPair = InstrPair::low_only(ll_assign);

    let access: MemoryAccess = classify_load(
        rt.register_name().as_deref(),
        xd.rxmem.or(xd.xmem),
        &location_text(&xd, mem),
    );
    let skip: bool = ctx.skips_high_level(&access);
    builder.add_memory_access(ctx.iaddr, access);

    match xd.vrt {
        _ if skip => {
            log::debug!("{}: register restore inside trampoline; low-level only", ctx.iaddr);
            ctx.record_low(builder, ll_assign);
        }
        None => {
            log::error!("{}: load destination is an error value; low-level only", ctx.iaddr);
            ctx.record_low(builder, ll_assign);
        }
        Some(vrt) => {
            let hl_lhs: NodeId = xvariable_lval(builder, vrt, ctx.iaddr);
            let hl_rhs: NodeId = loaded_value(builder, ctx, &xd);
            let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);
            ctx.record_pair(builder, hl_assign, ll_assign);
            builder.add_expr_mapping(hl_rhs, ll_rhs);
            builder.add_lval_mapping(hl_lhs, ll_lhs);
            builder.add_expr_reachingdefs(hl_rhs, &xd.memory_rdefs);
            builder.add_lval_defuses(hl_lhs, xd.defuse);
            builder.add_lval_defuses_high(hl_lhs, xd.defuse_high);
            pair.high.push(hl_assign);
        }
    }

    if let Some(writeback) = source.writeback {
        emit_writeback(builder, ctx, writeback, xd.base_update, &mut pair);
    }
    Ok(pair)
}

/// One half of LDRD; the high-level side is skipped when its slots failed or
/// when the half is a register restore inside a trampoline.
fn lift_dual_half(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    (register, mem): (&Operand, &Operand),
    half: &DualHalf,
    (ll_assign, ll_lhs, ll_rhs): (NodeId, NodeId, NodeId),
    rdefs: &[ReachingDef],
    pair: &mut InstrPair,
) {
    pair.low.push(ll_assign);
    let location: String = match half.address {
        Some(address) => address.to_string(),
        None => mem.to_string(),
    };
    let access: MemoryAccess = classify_load(
        register.register_name().as_deref(),
        half.rvalue.or(half.value),
        &location,
    );
    let skip: bool = ctx.skips_high_level(&access);
    builder.add_memory_access(ctx.iaddr, access);
    if skip {
        log::debug!("{}: LDRD register restore inside trampoline; low-level only", ctx.iaddr);
        ctx.record_low(builder, ll_assign);
        return;
    }
    let Some(var) = half.var else {
        log::error!("{}: LDRD destination is an error value; low-level only", ctx.iaddr);
        ctx.record_low(builder, ll_assign);
        return;
    };
    let hl_lhs: NodeId = xvariable_lval(builder, var, ctx.iaddr);
    let hl_rhs: NodeId = match select_rhs(ctx.iaddr, "LDRD value", None, half.rvalue, half.value) {
        (_, Some(expr)) => xxpr_expr(builder, expr, ctx.iaddr),
        (_, None) => match half.address {
            Some(address) => {
                let lval: NodeId = address_lval(builder, address, ctx.iaddr);
                builder.mk_lval_expr(lval)
            }
            None => builder.mk_temp_expr(ctx.iaddr),
        },
    };
    let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);
    ctx.record_pair(builder, hl_assign, ll_assign);
    builder.add_expr_mapping(hl_rhs, ll_rhs);
    builder.add_lval_mapping(hl_lhs, ll_lhs);
    builder.add_expr_reachingdefs(hl_rhs, rdefs);
    builder.add_lval_defuses(hl_lhs, half.defuse);
    builder.add_lval_defuses_high(hl_lhs, half.defuse_high);
    pair.high.push(hl_assign);
}

/// LDRD Rt, Rt2, [Rn, #k]: `Rt = *(a)`, `Rt2 = *((a + 4))`.
pub fn lift_dual(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let (rt, rt2, mem): (&Operand, &Operand, &Operand) = match instr.opcode.operands.as_slice() {
        [rt, rt2, mem] if mem.is_memory() => (rt, rt2, mem),
        _ => return Ok(lift_unsupported(builder, ctx, instr, "unexpected LDRD operands")),
    };
    let mut low_halves: Vec<(NodeId, NodeId, NodeId)> = Vec::with_capacity(2);
    for (i, register) in [rt, rt2].into_iter().enumerate() {
        let ll_lhs: NodeId = register.ast_lvalue(builder, ctx.iaddr)?.lval;
        let mut address: NodeId = mem.access_address(builder, ctx.iaddr)?;
        if i == 1 {
            let four: NodeId = builder.mk_integer_constant(4);
            address = builder.mk_binary_op(Operator::Plus, address, four);
        }
        let lval: NodeId = builder.mk_memref_lval(address, NO_NODE);
        let ll_rhs: NodeId = builder.mk_lval_expr(lval);
        let ll_assign: NodeId = ctx.emit_assign(builder, ll_lhs, ll_rhs);
        low_halves.push((ll_assign, ll_lhs, ll_rhs));
    }

    let xd: LoadDualXData = LoadDualXData::from_xdata(&instr.xdata);
    let mut pair: InstrPair = InstrPair::empty();
    let first_rdefs: Vec<ReachingDef> = xd.memory_rdefs.iter().take(1).cloned().collect();
    let second_rdefs: Vec<ReachingDef> = xd.memory_rdefs.iter().skip(1).cloned().collect();
    lift_dual_half(builder, ctx, (rt, mem), &xd.first, low_halves[0], &first_rdefs, &mut pair);
    lift_dual_half(builder, ctx, (rt2, mem), &xd.second, low_halves[1], &second_rdefs, &mut pair);
    builder.add_expr_reachingdefs(low_halves[0].2, &xd.address_rdefs);

    let writeback: Option<Writeback> = mem.writeback(builder, ctx.iaddr)?;
    if let Some(writeback) = writeback {
        // The dual layout has no base-update slots.
        emit_writeback(builder, ctx, writeback, None, &mut pair);
    }
    Ok(pair)
}
