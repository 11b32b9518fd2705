//! Stores: STR, STRB, STRH, VSTR and the dual STRD.

use crate::lifter::arm::convert::{address_lval, rhs_expr, xvariable_lval};
use crate::lifter::arm::memory_access::classify_store;
use crate::lifter::arm::opcodes::emit_writeback;
use crate::lifter::arm::operand::{AstLvalue, Operand, Writeback};
use crate::lifter::arm::{lift_unsupported, InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::{NodeId, Operator, NO_NODE};
use crate::lifter::builder::{AstBuilder, MemoryAccess};
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::layouts::{DualHalf, StoreDualXData, StoreXData};
use crate::lifter::xdata::{ReachingDef, XVariable, XXpr};

/// High-level store target: the memory variable when it is a real location,
/// else the typed dereference of the address, else whatever variable there is.
fn store_target(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    vmem: Option<&XVariable>,
    address: Option<&XXpr>,
) -> Option<NodeId> {
    match (vmem, address) {
        (Some(vmem), _) if !vmem.is_temp() && !vmem.has_unknown_memory_base() => {
            Some(xvariable_lval(builder, vmem, ctx.iaddr))
        }
        (_, Some(address)) => Some(address_lval(builder, address, ctx.iaddr)),
        (Some(vmem), None) => {
            log::warn!("{}: storing to unresolved location {}", ctx.iaddr, vmem);
            Some(xvariable_lval(builder, vmem, ctx.iaddr))
        }
        (None, None) => None,
    }
}

fn location_text(vmem: Option<&XVariable>, address: Option<&XXpr>, mem: &Operand) -> String {
    match (vmem, address) {
        (Some(vmem), _) if !vmem.is_temp() => vmem.name(),
        (_, Some(address)) => address.to_string(),
        _ => mem.to_string(),
    }
}

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let (rt, mem): (&Operand, &Operand) = match instr.opcode.operands.as_slice() {
        [rt, mem] if mem.is_memory() => (rt, mem),
        _ => return Ok(lift_unsupported(builder, ctx, instr, "unexpected store operands")),
    };
    let target: AstLvalue = mem.ast_lvalue(builder, ctx.iaddr)?;
    let ll_lhs: NodeId = target.lval;
    let ll_rhs: NodeId = rt.ast_rvalue(builder, ctx.iaddr)?;
    let ll_assign: NodeId = ctx.emit_assign(builder, ll_lhs, ll_rhs);

    let xd: StoreXData = StoreXData::from_xdata(&instr.xdata);
    builder.add_expr_reachingdefs(ll_rhs, &xd.value_rdefs);
    let mut pair: InstrPair = InstrPair::low_only(ll_assign);

    let access: MemoryAccess = classify_store(
        rt.register_name().as_deref(),
        xd.rxrt.or(xd.xrt),
        &location_text(xd.vmem, xd.xaddr, mem),
    );
    let skip: bool = ctx.skips_high_level(&access);
    builder.add_memory_access(ctx.iaddr, access);

    if skip {
        log::debug!("{}: register spill inside trampoline; low-level only", ctx.iaddr);
        ctx.record_low(builder, ll_assign);
    } else {
        match store_target(builder, ctx, xd.vmem, xd.xaddr) {
            None => {
                log::error!("{}: store location is an error value; low-level only", ctx.iaddr);
                ctx.record_low(builder, ll_assign);
            }
            Some(hl_lhs) => {
                let (hl_rhs, _) =
                    rhs_expr(builder, ctx.iaddr, "stored value", xd.cxrt, xd.rxrt, xd.xrt);
                let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);
                ctx.record_pair(builder, hl_assign, ll_assign);
                builder.add_expr_mapping(hl_rhs, ll_rhs);
                builder.add_lval_mapping(hl_lhs, ll_lhs);
                builder.add_expr_reachingdefs(hl_rhs, &xd.value_rdefs);
                builder.add_lval_defuses(hl_lhs, xd.defuse);
                builder.add_lval_defuses_high(hl_lhs, xd.defuse_high);
                pair.high.push(hl_assign);
            }
        }
    }

    if let Some(writeback) = target.writeback {
        emit_writeback(builder, ctx, writeback, xd.base_update, &mut pair);
    }
    Ok(pair)
}

/// One half of STRD; the high-level side is skipped when its slots failed or
/// when the half is a register spill inside a trampoline.
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
    let access: MemoryAccess = classify_store(
        register.register_name().as_deref(),
        half.rvalue.or(half.value),
        &location_text(half.var, half.address, mem),
    );
    let skip: bool = ctx.skips_high_level(&access);
    builder.add_memory_access(ctx.iaddr, access);
    if skip {
        log::debug!("{}: STRD register spill inside trampoline; low-level only", ctx.iaddr);
        ctx.record_low(builder, ll_assign);
        return;
    }
    let Some(hl_lhs) = store_target(builder, ctx, half.var, half.address) else {
        log::error!("{}: STRD location is an error value; low-level only", ctx.iaddr);
        ctx.record_low(builder, ll_assign);
        return;
    };
    let (hl_rhs, _) = rhs_expr(builder, ctx.iaddr, "STRD value", None, half.rvalue, half.value);
    let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);
    ctx.record_pair(builder, hl_assign, ll_assign);
    builder.add_expr_mapping(hl_rhs, ll_rhs);
    builder.add_lval_mapping(hl_lhs, ll_lhs);
    builder.add_expr_reachingdefs(hl_rhs, rdefs);
    builder.add_lval_defuses(hl_lhs, half.defuse);
    builder.add_lval_defuses_high(hl_lhs, half.defuse_high);
    pair.high.push(hl_assign);
}

/// STRD Rt, Rt2, [Rn, #k]: `*(a) = Rt`, `*((a + 4)) = Rt2`.
pub fn lift_dual(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let (rt, rt2, mem): (&Operand, &Operand, &Operand) = match instr.opcode.operands.as_slice() {
        [rt, rt2, mem] if mem.is_memory() => (rt, rt2, mem),
        _ => return Ok(lift_unsupported(builder, ctx, instr, "unexpected STRD operands")),
    };
    let mut low_halves: Vec<(NodeId, NodeId, NodeId)> = Vec::with_capacity(2);
    for (i, register) in [rt, rt2].into_iter().enumerate() {
        let mut address: NodeId = mem.access_address(builder, ctx.iaddr)?;
        if i == 1 {
            let four: NodeId = builder.mk_integer_constant(4);
            address = builder.mk_binary_op(Operator::Plus, address, four);
        }
        let ll_lhs: NodeId = builder.mk_memref_lval(address, NO_NODE);
        let ll_rhs: NodeId = register.ast_rvalue(builder, ctx.iaddr)?;
        let ll_assign: NodeId = ctx.emit_assign(builder, ll_lhs, ll_rhs);
        low_halves.push((ll_assign, ll_lhs, ll_rhs));
    }

    let xd: StoreDualXData = StoreDualXData::from_xdata(&instr.xdata);
    let mut pair: InstrPair = InstrPair::empty();
    lift_dual_half(builder, ctx, (rt, mem), &xd.first, low_halves[0], &xd.first_rdefs, &mut pair);
    lift_dual_half(builder, ctx, (rt2, mem), &xd.second, low_halves[1], &xd.second_rdefs, &mut pair);
    builder.add_expr_reachingdefs(low_halves[0].1, &xd.address_rdefs);

    let writeback: Option<Writeback> = mem.writeback(builder, ctx.iaddr)?;
    if let Some(writeback) = writeback {
        // The dual layout has no base-update slots.
        emit_writeback(builder, ctx, writeback, None, &mut pair);
    }
    Ok(pair)
}
