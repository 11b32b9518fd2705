//! Symbolic Variables and Expressions
//!
//! The analyzer describes every operand, memory location and result as a symbolic
//! expression over registers, stack slots, globals and initial register values.

use crate::lifter::ast::node::WireInt;
use crate::lifter::builder::symbols::TypeInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the stack slot at `offset` from the initial stack pointer.
pub fn stack_variable_name(offset: i64) -> String {
    if offset < 0 {
        format!("var_{:04}", -offset)
    } else {
        format!("arg_{:04}", offset)
    }
}

/// Name of a global without a symbol.
pub fn global_variable_name(address: i64) -> String {
    format!("gv_{:x}", address)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum XVariable {
    Register {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ctype: Option<TypeInfo>,
    },
    Stack {
        offset: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ctype: Option<TypeInfo>,
    },
    Global {
        address: WireInt,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ctype: Option<TypeInfo>,
    },
    /// Memory location relative to a base the analyzer could not resolve.
    Memory {
        base: String,
        offset: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ctype: Option<TypeInfo>,
    },
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ctype: Option<TypeInfo>,
    },
    Temp {
        name: String,
    },
    ReturnValue {
        callsite: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ctype: Option<TypeInfo>,
    },
}

impl XVariable {
    pub fn register(name: impl Into<String>) -> Self {
        XVariable::Register {
            name: name.into(),
            ctype: None,
        }
    }

    pub fn stack(offset: i64) -> Self {
        XVariable::Stack {
            offset,
            ctype: None,
        }
    }

    /// Source-level name of the variable.
    pub fn name(&self) -> String {
        match self {
            XVariable::Register { name, .. } | XVariable::Named { name, .. } => name.clone(),
            XVariable::Temp { name } => name.clone(),
            XVariable::Stack { offset, .. } => stack_variable_name(*offset),
            XVariable::Global { address, name, .. } => match name {
                Some(name) => name.clone(),
                None => match address.as_i64() {
                    Some(addr) => global_variable_name(addr),
                    None => format!("gv_{}", address.to_text()),
                },
            },
            XVariable::Memory { base, offset, .. } => format!("{}[{}]", base, offset),
            XVariable::ReturnValue { callsite, .. } => format!("rtn_{}", callsite),
        }
    }

    pub fn ctype(&self) -> Option<&TypeInfo> {
        match self {
            XVariable::Register { ctype, .. }
            | XVariable::Stack { ctype, .. }
            | XVariable::Global { ctype, .. }
            | XVariable::Memory { ctype, .. }
            | XVariable::Named { ctype, .. }
            | XVariable::ReturnValue { ctype, .. } => ctype.as_ref(),
            XVariable::Temp { .. } => None,
        }
    }

    pub fn register_name(&self) -> Option<&str> {
        match self {
            XVariable::Register { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, XVariable::Temp { .. })
    }

    pub fn has_unknown_memory_base(&self) -> bool {
        matches!(self, XVariable::Memory { .. })
    }

    pub fn stack_offset(&self) -> Option<i64> {
        match self {
            XVariable::Stack { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

impl fmt::Display for XVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum XXpr {
    Const {
        value: i64,
    },
    Var {
        var: XVariable,
    },
    /// Value a register held on function entry.
    InitialRegister {
        register: String,
    },
    /// Address of the stack slot at `offset` from the initial stack pointer.
    StackAddress {
        offset: i64,
    },
    GlobalAddress {
        address: WireInt,
    },
    StringRef {
        address: WireInt,
        value: String,
    },
    ReturnValue {
        callsite: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callee: Option<String>,
    },
    Op {
        op: String,
        args: Vec<XXpr>,
    },
}

impl XXpr {
    pub fn constant(value: i64) -> Self {
        XXpr::Const { value }
    }

    pub fn var(var: XVariable) -> Self {
        XXpr::Var { var }
    }

    pub fn op(op: impl Into<String>, args: Vec<XXpr>) -> Self {
        XXpr::Op {
            op: op.into(),
            args,
        }
    }

    pub fn const_value(&self) -> Option<i64> {
        match self {
            XXpr::Const { value } => Some(*value),
            _ => None,
        }
    }

    pub fn is_string_ref(&self) -> bool {
        matches!(self, XXpr::StringRef { .. })
    }

    pub fn is_stack_address(&self) -> bool {
        matches!(self, XXpr::StackAddress { .. })
    }

    pub fn is_global_address(&self) -> bool {
        matches!(self, XXpr::GlobalAddress { .. })
    }

    /// Register whose entry value this expression is.
    pub fn initial_register(&self) -> Option<&str> {
        match self {
            XXpr::InitialRegister { register } => Some(register),
            _ => None,
        }
    }

    /// Declared C type, where the analyzer attached one.
    pub fn ctype(&self) -> Option<&TypeInfo> {
        match self {
            XXpr::Var { var } => var.ctype(),
            _ => None,
        }
    }

    /// `(base, k)` for an expression of the shape `base + k` with constant `k`.
    pub fn as_base_plus_const(&self) -> Option<(&XXpr, i64)> {
        match self {
            XXpr::Op { op, args } if op == "plus" && args.len() == 2 => {
                args[1].const_value().map(|k| (&args[0], k))
            }
            XXpr::Op { op, args } if op == "minus" && args.len() == 2 => {
                args[1].const_value().and_then(i64::checked_neg).map(|k| (&args[0], k))
            }
            _ => None,
        }
    }
}

impl fmt::Display for XXpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XXpr::Const { value } => write!(f, "{}", value),
            XXpr::Var { var } => write!(f, "{}", var),
            XXpr::InitialRegister { register } => write!(f, "{}_in", register),
            XXpr::StackAddress { offset } => write!(f, "&{}", stack_variable_name(*offset)),
            XXpr::GlobalAddress { address } => write!(f, "{}", address.to_text()),
            XXpr::StringRef { value, .. } => write!(f, "\"{}\"", value),
            XXpr::ReturnValue { callsite, .. } => write!(f, "rtn_{}", callsite),
            XXpr::Op { op, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                if parts.len() == 2 {
                    write!(f, "({} {} {})", parts[0], op, parts[1])
                } else {
                    write!(f, "{}({})", op, parts.join(", "))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(op: &str, k: i64) -> XXpr {
        XXpr::Op {
            op: op.to_string(),
            args: vec![
                XXpr::InitialRegister {
                    register: "R0".to_string(),
                },
                XXpr::Const { value: k },
            ],
        }
    }

    #[test]
    fn test_base_plus_const() {
        assert_eq!(offset("plus", 8).as_base_plus_const().map(|(_, k)| k), Some(8));
        assert_eq!(offset("minus", 8).as_base_plus_const().map(|(_, k)| k), Some(-8));
    }

    #[test]
    fn test_minus_of_minimum_constant_has_no_offset() {
        assert!(offset("minus", i64::MIN).as_base_plus_const().is_none());
    }
}
