//! Multi-instruction idioms.
//!
//! The analyzer folds some instruction groups into a single high-level
//! statement and tags the head of the group:
//!
//! - an LDM/STM aggregate (`is_ldmstm_aggregate`) copies a block of memory and
//!   becomes `memcpy(dst, src, n)`, or `strcpy(dst, src)` for a string source;
//! - an IT block with two moves into the same register (`subsumes`) becomes
//!   `rd = (cond ? a : b)`.
//!
//! Each member keeps its own low-level instructions. The single high-level
//! statement maps to all of them.

use crate::lifter::arm::condition::condition_expr;
use crate::lifter::arm::convert::{xvariable_lval, xxpr_expr};
use crate::lifter::arm::opcodes::{moves, multiple};
use crate::lifter::arm::{lift_instruction, InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::NodeId;
use crate::lifter::builder::AstBuilder;
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::layouts::{AggregateXData, ConditionalMoveXData};
use crate::lifter::xdata::XXpr;
use std::slice;

/// Low-level instructions of one block-copy member, each tied to its address.
fn block_member_low_level(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<Vec<NodeId>> {
    let low: Vec<NodeId> = match multiple::BlockTransfer::decode(instr) {
        Ok(transfer) => multiple::lift_low_level(builder, ctx, &transfer).assigns().collect(),
        Err(_) => {
            log::debug!("{}: aggregate member {} is not a block transfer", ctx.iaddr, instr.opcode);
            lift_instruction(builder, ctx, instr)?.low.into_vec()
        }
    };
    for id in &low {
        ctx.record_low(builder, *id);
    }
    Ok(low)
}

fn low_only(low: Vec<NodeId>) -> InstrPair {
    InstrPair {
        high: Default::default(),
        low: low.into_iter().collect(),
    }
}

/// Fuse an LDM/STM aggregate into one `memcpy`/`strcpy` call.
///
/// A missing endpoint or size is logged and leaves only the low-level
/// instructions; the rest of the function is unaffected.
pub fn lift_block_copy(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    head: &InstructionRecord,
    members: &[&InstructionRecord],
) -> LiftResult<InstrPair> {
    let mut low: Vec<NodeId> = block_member_low_level(builder, ctx, head)?;
    for member in members {
        let member_ctx: InstrContext = ctx.for_member(member);
        low.extend(block_member_low_level(builder, &member_ctx, member)?);
    }

    let xd: AggregateXData = AggregateXData::from_xdata(&head.xdata);
    let (Some(dst), Some(src)) = (xd.dst, xd.src) else {
        log::error!(
            "{}: block copy endpoint unresolved (dst: {}, src: {}); low-level only",
            ctx.iaddr,
            xd.dst.is_some(),
            xd.src.is_some()
        );
        builder.add_diagnostic(format!("{}: unresolved block copy", ctx.iaddr));
        return Ok(low_only(low));
    };
    let dst_expr: NodeId = xxpr_expr(builder, dst, ctx.iaddr);
    let src_expr: NodeId = xxpr_expr(builder, src, ctx.iaddr);
    let (name, args): (&str, Vec<NodeId>) = if src.is_string_ref() {
        ("strcpy", vec![dst_expr, src_expr])
    } else {
        let Some(size) = xd.size else {
            log::error!("{}: block copy without size; low-level only", ctx.iaddr);
            builder.add_diagnostic(format!("{}: block copy without size", ctx.iaddr));
            return Ok(low_only(low));
        };
        let size: NodeId = builder.mk_integer_constant(size);
        ("memcpy", vec![dst_expr, src_expr, size])
    };
    let target: NodeId = builder.mk_global_variable_expr(name);
    let call: NodeId = ctx.emit_call(builder, None, target, &args);

    if let Some(rdef) = xd.rdefs.first() {
        builder.add_expr_reachingdefs(src_expr, slice::from_ref(rdef));
    }
    if let Some(rdef) = xd.rdefs.get(1) {
        builder.add_expr_reachingdefs(dst_expr, slice::from_ref(rdef));
    }
    for id in &low {
        builder.add_instr_mapping(call, *id);
    }
    let mut iaddrs: Vec<&str> = vec![ctx.iaddr];
    iaddrs.extend(members.iter().map(|m| m.iaddr.as_str()));
    builder.add_instr_address(call, &iaddrs);
    log::debug!("{}: block copy of {} instructions fused into {}", ctx.iaddr, iaddrs.len(), name);

    let mut pair: InstrPair = low_only(low);
    pair.high.push(call);
    Ok(pair)
}

/// Fuse an IT block of complementary moves into `rd = (cond ? a : b)`.
pub fn lift_conditional_move(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    head: &InstructionRecord,
    members: &[&InstructionRecord],
) -> LiftResult<InstrPair> {
    let mut low: Vec<NodeId> = Vec::with_capacity(members.len());
    for member in members {
        let member_ctx: InstrContext = ctx.for_member(member);
        match moves::lift_low_level(builder, &member_ctx, member)? {
            Some((assign, _, _)) => {
                member_ctx.record_low(builder, assign);
                low.push(assign);
            }
            None => log::warn!("{}: conditional move into PC ignored", member.iaddr),
        }
    }

    let xd: ConditionalMoveXData = ConditionalMoveXData::from_xdata(&head.xdata);
    let Some(vrd) = xd.vrd else {
        log::error!("{}: conditional move destination is an error value; low-level only", ctx.iaddr);
        return Ok(low_only(low));
    };
    let condition: NodeId = match xd.condition {
        Some(condition) => xxpr_expr(builder, condition, ctx.iaddr),
        None => {
            let cc = members
                .first()
                .map(|m| m.opcode.condition_code())
                .unwrap_or_else(|| head.opcode.condition_code());
            log::warn!("{}: no condition in xdata; using flag test for {:?}", ctx.iaddr, cc);
            condition_expr(builder, cc)
        }
    };
    let value = |builder: &mut AstBuilder, slot: Option<&XXpr>, which: &str| match slot {
        Some(expr) => xxpr_expr(builder, expr, ctx.iaddr),
        None => {
            log::error!("{}: {} value of conditional move is an error value; using placeholder", ctx.iaddr, which);
            builder.mk_temp_expr(ctx.iaddr)
        }
    };
    let then_expr: NodeId = value(builder, xd.then_value, "true");
    let else_expr: NodeId = value(builder, xd.else_value, "false");
    let hl_rhs: NodeId = builder.mk_question(condition, then_expr, else_expr);
    let hl_lhs: NodeId = xvariable_lval(builder, vrd, ctx.iaddr);
    let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);

    builder.add_condition_address(condition, &[ctx.iaddr]);
    for id in &low {
        builder.add_instr_mapping(hl_assign, *id);
    }
    let mut iaddrs: Vec<&str> = vec![ctx.iaddr];
    iaddrs.extend(members.iter().map(|m| m.iaddr.as_str()));
    builder.add_instr_address(hl_assign, &iaddrs);
    builder.add_lval_defuses(hl_lhs, xd.defuse);
    builder.add_lval_defuses_high(hl_lhs, xd.defuse_high);

    let mut pair: InstrPair = low_only(low);
    pair.high.push(hl_assign);
    Ok(pair)
}
