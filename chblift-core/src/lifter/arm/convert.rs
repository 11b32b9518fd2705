//! Symbolic Expression Conversion
//!
//! Turns the analyzer's variables and expressions into high-level AST nodes,
//! using the symbol table for global names, array elements and struct fields.
//!
//! [`select_rhs`] implements the fallback chain shared by all opcode lifters:
//! C-level expression, then rewritten expression, then raw expression, then a
//! `temp_<iaddr>` placeholder. Each step down is logged.

use crate::lifter::ast::node::WireInt;
use crate::lifter::ast::{NodeId, Operator, NO_NODE};
use crate::lifter::builder::{AstBuilder, TypeInfo};
use crate::lifter::xdata::{XVariable, XXpr};

/// Fallback tier a high-level right-hand side was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RhsTier {
    CLevel,
    Rewritten,
    Raw,
    Placeholder,
}

/// Pick the first available expression of the fallback chain.
///
/// Taking the rewritten expression is the normal case when no C-level typing
/// was run and is only logged at debug level.
pub fn select_rhs<'x>(
    iaddr: &str,
    what: &str,
    clevel: Option<&'x XXpr>,
    rewritten: Option<&'x XXpr>,
    raw: Option<&'x XXpr>,
) -> (RhsTier, Option<&'x XXpr>) {
    if let Some(expr) = clevel {
        return (RhsTier::CLevel, Some(expr));
    }
    if let Some(expr) = rewritten {
        log::debug!("{}: no C-level {}; using rewritten expression", iaddr, what);
        return (RhsTier::Rewritten, Some(expr));
    }
    if let Some(expr) = raw {
        log::warn!("{}: no rewritten {}; using raw expression {}", iaddr, what, expr);
        return (RhsTier::Raw, Some(expr));
    }
    log::error!("{}: no expression available for {}; using placeholder", iaddr, what);
    (RhsTier::Placeholder, None)
}

/// [`select_rhs`] followed by conversion; the placeholder tier yields `temp_<iaddr>`.
pub fn rhs_expr(
    builder: &mut AstBuilder,
    iaddr: &str,
    what: &str,
    clevel: Option<&XXpr>,
    rewritten: Option<&XXpr>,
    raw: Option<&XXpr>,
) -> (NodeId, RhsTier) {
    match select_rhs(iaddr, what, clevel, rewritten, raw) {
        (tier, Some(expr)) => (xxpr_expr(builder, expr, iaddr), tier),
        (tier, None) => (builder.mk_temp_expr(iaddr), tier),
    }
}

/// Analyzer operator names that differ from the operator table.
fn operator_tag(op: &str) -> &str {
    match op {
        "shiftlt" => "lsl",
        "shiftrt" => "lsr",
        "xor" => "bxor",
        "mul" => "mult",
        other => other,
    }
}

pub fn xvariable_lval(builder: &mut AstBuilder, var: &XVariable, iaddr: &str) -> NodeId {
    match var {
        XVariable::Register { name, .. } => builder.mk_register_variable_lval(name),
        XVariable::Stack { offset, .. } => builder.mk_stack_variable_lval(*offset),
        XVariable::Global { address, name, .. } => {
            let name: String = match (name, address.as_i64()) {
                (Some(name), _) => name.clone(),
                (None, Some(addr)) => match builder.symbols().global_at(addr) {
                    Some(global) => global.name.clone(),
                    None => var.name(),
                },
                (None, None) => var.name(),
            };
            builder.mk_global_variable_lval(&name)
        }
        XVariable::Memory { base, offset, .. } => {
            log::debug!("{}: memory variable {} has no resolved base", iaddr, var);
            let base: NodeId = builder.mk_named_lval_expression(base);
            let address: NodeId = plus_constant(builder, base, *offset);
            builder.mk_memref_lval(address, NO_NODE)
        }
        XVariable::Named { .. } | XVariable::Temp { .. } | XVariable::ReturnValue { .. } => {
            builder.mk_named_lval(&var.name())
        }
    }
}

pub fn xvariable_expr(builder: &mut AstBuilder, var: &XVariable, iaddr: &str) -> NodeId {
    let lval: NodeId = xvariable_lval(builder, var, iaddr);
    builder.mk_lval_expr(lval)
}

fn plus_constant(builder: &mut AstBuilder, base: NodeId, k: i64) -> NodeId {
    if k == 0 {
        return base;
    }
    let (op, magnitude) = match k.checked_neg() {
        Some(magnitude) if k < 0 => (Operator::Minus, magnitude),
        _ => (Operator::Plus, k),
    };
    let k: NodeId = builder.mk_integer_constant(magnitude);
    builder.mk_binary_op(op, base, k)
}

/// High-level expression for an analyzer expression.
pub fn xxpr_expr(builder: &mut AstBuilder, xpr: &XXpr, iaddr: &str) -> NodeId {
    match xpr {
        XXpr::Const { value } => builder.mk_integer_constant(*value),
        XXpr::Var { var } => xvariable_expr(builder, var, iaddr),
        XXpr::InitialRegister { register } => {
            builder.mk_named_lval_expression(&format!("{}_in", register))
        }
        XXpr::StackAddress { offset } => {
            let lval: NodeId = builder.mk_stack_variable_lval(*offset);
            builder.mk_address_of(lval)
        }
        XXpr::GlobalAddress { address } => global_address_expr(builder, address, iaddr),
        XXpr::StringRef { address, value } => {
            builder.mk_string_constant(value, Some(&address.to_text()))
        }
        XXpr::ReturnValue { callsite, .. } => {
            builder.mk_named_lval_expression(&format!("rtn_{}", callsite))
        }
        XXpr::Op { op, args } => match args.as_slice() {
            [operand] => {
                let operand: NodeId = xxpr_expr(builder, operand, iaddr);
                builder.mk_raw_unary_op(operator_tag(op), operand)
            }
            [lhs, rhs] => {
                let lhs: NodeId = xxpr_expr(builder, lhs, iaddr);
                let rhs: NodeId = xxpr_expr(builder, rhs, iaddr);
                builder.mk_raw_binary_op(operator_tag(op), lhs, rhs)
            }
            _ => {
                log::warn!(
                    "{}: operator {} with {} operands cannot be expressed; using placeholder",
                    iaddr,
                    op,
                    args.len()
                );
                builder.mk_temp_expr(iaddr)
            }
        },
    }
}

/// `&name` for a known global, the address constant otherwise.
pub fn global_address_expr(builder: &mut AstBuilder, address: &WireInt, iaddr: &str) -> NodeId {
    let Some(addr) = address.as_i64() else {
        log::warn!("{}: global address '{}' is not an integer", iaddr, address.to_text());
        return builder.mk_temp_expr(iaddr);
    };
    match builder.symbols().global_at(addr).map(|g| g.name.clone()) {
        Some(name) => {
            let lval: NodeId = builder.mk_global_variable_lval(&name);
            builder.mk_address_of(lval)
        }
        None => builder.mk_integer_constant(addr),
    }
}

/// High-level lval for the memory at `address`.
///
/// Stack and global addresses become variables; `base + k` becomes an array
/// element or struct field when the base has a usable type. Anything else is
/// dereferenced as is.
pub fn address_lval(builder: &mut AstBuilder, address: &XXpr, iaddr: &str) -> NodeId {
    match address {
        XXpr::StackAddress { offset } => return builder.mk_stack_variable_lval(*offset),
        XXpr::GlobalAddress { address: addr } => {
            if let Some(name) = addr
                .as_i64()
                .and_then(|a| builder.symbols().global_at(a))
                .map(|g| g.name.clone())
            {
                return builder.mk_global_variable_lval(&name);
            }
        }
        _ => {
            if let Some((base, k)) = address.as_base_plus_const() {
                if let Some(lval) = typed_element_lval(builder, base, k, iaddr) {
                    return lval;
                }
            }
        }
    }
    let address: NodeId = xxpr_expr(builder, address, iaddr);
    builder.mk_memref_lval(address, NO_NODE)
}

/// `g[i]`, `g.f`, `p->f` or `*(p + i)` for `base + k`, given the type of `base`.
fn typed_element_lval(builder: &mut AstBuilder, base: &XXpr, k: i64, iaddr: &str) -> Option<NodeId> {
    if k < 0 {
        return None;
    }
    if let XXpr::GlobalAddress { address } = base {
        let global = builder.symbols().global_at(address.as_i64()?)?.clone();
        let global_type: &TypeInfo = global.type_info.as_ref()?;
        return match global_type {
            TypeInfo::Array { element, .. } => {
                let size: i64 = i64::from(element.size_in_bytes()?);
                if size == 0 || k % size != 0 {
                    return None;
                }
                let offset: NodeId = builder.mk_scalar_index_offset(k / size);
                let host: NodeId = builder.mk_variable(&global.name);
                Some(builder.mk_lval(host, offset))
            }
            TypeInfo::Struct { .. } => {
                let field = global_type.field_at(u32::try_from(k).ok()?)?;
                let offset: NodeId = builder.mk_field_offset(&field.name, NO_NODE);
                let host: NodeId = builder.mk_variable(&global.name);
                Some(builder.mk_lval(host, offset))
            }
            _ => None,
        };
    }
    let pointee: TypeInfo = base.ctype()?.pointee()?.clone();
    if let Some(field) = u32::try_from(k).ok().and_then(|k| pointee.field_at(k)) {
        let pointer: NodeId = xxpr_expr(builder, base, iaddr);
        let offset: NodeId = builder.mk_field_offset(&field.name, NO_NODE);
        return Some(builder.mk_memref_lval(pointer, offset));
    }
    let size: i64 = i64::from(pointee.size_in_bytes()?);
    if size <= 1 || k % size != 0 {
        return None;
    }
    let pointer: NodeId = xxpr_expr(builder, base, iaddr);
    let scaled: NodeId = plus_constant(builder, pointer, k / size);
    Some(builder.mk_memref_lval(scaled, NO_NODE))
}

/// Kind of a call argument, deciding how it is converted and typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    StringRef,
    StackAddress,
    GlobalAddress,
    Value,
}

pub fn classify_argument(xpr: &XXpr) -> ArgumentKind {
    match xpr {
        XXpr::StringRef { .. } => ArgumentKind::StringRef,
        XXpr::StackAddress { .. } => ArgumentKind::StackAddress,
        XXpr::GlobalAddress { .. } => ArgumentKind::GlobalAddress,
        _ => ArgumentKind::Value,
    }
}

/// Call argument, cast to the declared parameter type when the types disagree.
pub fn call_argument_expr(
    builder: &mut AstBuilder,
    xpr: &XXpr,
    parameter: Option<&TypeInfo>,
    iaddr: &str,
) -> NodeId {
    let argument_type: Option<TypeInfo> = match classify_argument(xpr) {
        ArgumentKind::StringRef => Some(TypeInfo::pointer_to(TypeInfo::char())),
        ArgumentKind::StackAddress | ArgumentKind::GlobalAddress => None,
        ArgumentKind::Value => xpr.ctype().cloned(),
    };
    let expr: NodeId = xxpr_expr(builder, xpr, iaddr);
    match (argument_type, parameter) {
        (Some(actual), Some(declared)) if !actual.is_compatible_with(declared) => {
            log::debug!(
                "{}: casting argument {} from {} to {}",
                iaddr,
                xpr,
                actual.c_name(),
                declared.c_name()
            );
            builder.mk_cast_expr(&declared.c_name(), expr)
        }
        _ => expr,
    }
}
