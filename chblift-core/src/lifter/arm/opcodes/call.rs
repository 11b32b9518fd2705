//! Calls: BL, BLX, and BX with a call target.
//!
//! The low-level call passes `R0..R3` (then stack slots) and assigns `R0`, or
//! `S0` for a float return. The high-level call names its target from the
//! symbol table, converts each argument, and always introduces a return value
//! variable; the variable is only kept on the call when the callee returns
//! something that is used.

use crate::lifter::arm::convert::{call_argument_expr, xxpr_expr};
use crate::lifter::arm::operand::{Operand, ARGUMENT_REGISTERS};
use crate::lifter::arm::{InstrContext, InstrPair, InstructionRecord};
use crate::lifter::ast::{NodeId, Operator, NO_NODE};
use crate::lifter::builder::symbols::FunctionSymbol;
use crate::lifter::builder::{AstBuilder, TypeInfo};
use crate::lifter::error::LiftResult;
use crate::lifter::xdata::layouts::CallXData;
use crate::lifter::xdata::CallTarget;
use std::slice;

/// Declared signature of the callee, if the symbol table knows it.
fn callee_signature(builder: &AstBuilder, instr: &InstructionRecord) -> Option<FunctionSymbol> {
    let symbols = builder.symbols();
    let target: Option<&CallTarget> = instr.xdata.call_target.as_ref();
    target
        .and_then(CallTarget::address)
        .or_else(|| instr.opcode.operands.first().and_then(|op| op.absolute_address()))
        .and_then(|address| symbols.function_at(address))
        .or_else(|| target.and_then(CallTarget::name).and_then(|name| symbols.function_named(name)))
        .cloned()
}

/// `*(SP + 4 * (index - 4))` for arguments passed on the stack.
fn stack_argument(builder: &mut AstBuilder, index: usize) -> NodeId {
    let sp: NodeId = builder.mk_register_variable_expr("SP");
    let offset: i64 = 4 * (index as i64 - 4);
    let address: NodeId = if offset == 0 {
        sp
    } else {
        let offset: NodeId = builder.mk_integer_constant(offset);
        builder.mk_binary_op(Operator::Plus, sp, offset)
    };
    let lval: NodeId = builder.mk_memref_lval(address, NO_NODE);
    builder.mk_lval_expr(lval)
}

fn low_level_argument(builder: &mut AstBuilder, index: usize) -> NodeId {
    match ARGUMENT_REGISTERS.get(index) {
        Some(register) => builder.mk_register_variable_expr(register),
        None => stack_argument(builder, index),
    }
}

/// High-level call target: symbol name, `sub_<addr>`, or the indirect expression.
fn high_level_target(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
    signature: Option<&FunctionSymbol>,
    xd: &CallXData,
) -> NodeId {
    if let Some(symbol) = signature {
        return builder.mk_global_variable_expr(&symbol.name);
    }
    if let Some(name) = xd.target.and_then(CallTarget::name) {
        return builder.mk_global_variable_expr(name);
    }
    let address: Option<i64> = xd
        .target
        .and_then(CallTarget::address)
        .or_else(|| instr.opcode.operands.first().and_then(|op| op.absolute_address()));
    if let Some(address) = address {
        return builder.mk_global_variable_expr(&format!("sub_{:x}", address));
    }
    if let Some(indirect) = xd.indirect_target {
        return xxpr_expr(builder, indirect, ctx.iaddr);
    }
    log::warn!("{}: call target unresolved; using the low-level target", ctx.iaddr);
    builder.add_diagnostic(format!("{}: unresolved call target", ctx.iaddr));
    // Fresh copy so the two views do not share nodes.
    match instr.opcode.operands.first().map(|op| op.ast_rvalue(builder, ctx.iaddr)) {
        Some(Ok(target)) => target,
        _ => builder.mk_temp_expr(ctx.iaddr),
    }
}

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let signature: Option<FunctionSymbol> = callee_signature(builder, instr);
    let declared: Option<usize> = signature
        .as_ref()
        .filter(|s| !s.varargs)
        .map(|s| s.parameters.len());
    let has_absolute_target: bool = instr
        .opcode
        .operands
        .first()
        .and_then(Operand::absolute_address)
        .is_some();
    let xd: CallXData = CallXData::from_xdata(&instr.xdata, declared, has_absolute_target);
    let returns_void: bool = signature.as_ref().map_or(false, FunctionSymbol::returns_void);
    let returns_float: bool = matches!(
        signature.as_ref().and_then(|s| s.return_type.as_ref()),
        Some(TypeInfo::Float { .. })
    );

    // Low-level view
    let ll_target: NodeId = instr.operand(0)?.ast_rvalue(builder, ctx.iaddr)?;
    let ll_args: Vec<NodeId> = (0..xd.arguments.len())
        .map(|i| low_level_argument(builder, i))
        .collect();
    let ll_lhs: Option<NodeId> = if returns_void {
        None
    } else {
        let register: &str = if returns_float { "S0" } else { "R0" };
        Some(builder.mk_register_variable_lval(register))
    };
    let ll_call: NodeId = ctx.emit_call(builder, ll_lhs, ll_target, &ll_args);

    // High-level view
    let hl_target: NodeId = high_level_target(builder, ctx, instr, signature.as_ref(), &xd);
    let mut hl_args: Vec<NodeId> = Vec::with_capacity(xd.arguments.len());
    for (i, argument) in xd.arguments.iter().enumerate() {
        let parameter: Option<&TypeInfo> = signature
            .as_ref()
            .and_then(|s| s.parameters.get(i))
            .map(|p| &p.type_info);
        let hl_arg: NodeId = match argument.value {
            Some(value) => call_argument_expr(builder, value, parameter, ctx.iaddr),
            None => {
                log::warn!("{}: argument {} is an error value; using the argument register", ctx.iaddr, i);
                low_level_argument(builder, i)
            }
        };
        builder.add_expr_mapping(hl_arg, ll_args[i]);
        if let Some(rdef) = argument.rdef {
            builder.add_expr_reachingdefs(hl_arg, slice::from_ref(rdef));
            builder.add_expr_reachingdefs(ll_args[i], slice::from_ref(rdef));
        }
        hl_args.push(hl_arg);
    }

    let return_name: String = match xd.return_var {
        Some(var) if var.register_name().is_none() => var.name(),
        _ => format!("rtn_{}", ctx.iaddr),
    };
    let hl_lhs: NodeId = builder.mk_named_lval(&return_name);
    builder.add_return_value_intro(ctx.iaddr, hl_lhs);
    let used: Option<bool> = xd.defuse_high.or(xd.defuse).map(|d| d.use_count() > 0);
    let keep_lhs: bool = !returns_void && used != Some(false);
    if !keep_lhs {
        log::debug!("{}: return value of call dropped (void: {}, used: {:?})", ctx.iaddr, returns_void, used);
    }
    let hl_call: NodeId = ctx.emit_call(builder, keep_lhs.then_some(hl_lhs), hl_target, &hl_args);

    ctx.record_pair(builder, hl_call, ll_call);
    builder.add_expr_mapping(hl_target, ll_target);
    if let (true, Some(ll_lhs)) = (keep_lhs, ll_lhs) {
        builder.add_lval_mapping(hl_lhs, ll_lhs);
        builder.add_lval_defuses(hl_lhs, xd.defuse);
        builder.add_lval_defuses_high(hl_lhs, xd.defuse_high);
    }
    Ok(InstrPair::single(hl_call, ll_call))
}
