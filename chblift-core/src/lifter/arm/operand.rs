//! ARM Operands
//!
//! Operand model of a disassembled ARM/Thumb instruction and its conversion to
//! low-level AST nodes. The low-level view only ever uses the literal registers,
//! immediates and addressing modes of the instruction; nothing here consults
//! the analyzer's facts.

use crate::lifter::ast::node::WireInt;
use crate::lifter::ast::{NodeId, Operator, NO_NODE};
use crate::lifter::builder::AstBuilder;
use crate::lifter::error::{LiftError, LiftResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registers preserved across calls by the ARM procedure call standard.
pub const CALLEE_SAVED: [&str; 9] = ["R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "LR"];

/// Registers carrying the first four integer arguments.
pub const ARGUMENT_REGISTERS: [&str; 4] = ["R0", "R1", "R2", "R3"];

/// Canonical register name: upper case, with the usual aliases resolved.
pub fn normalize_register(name: &str) -> String {
    let upper: String = name.trim().to_ascii_uppercase();
    match upper.as_str() {
        "R13" => "SP".to_string(),
        "R14" => "LR".to_string(),
        "R15" => "PC".to_string(),
        "FP" => "R11".to_string(),
        "IP" => "R12".to_string(),
        "SB" => "R9".to_string(),
        _ => upper,
    }
}

pub fn is_callee_saved(name: &str) -> bool {
    let name: String = normalize_register(name);
    CALLEE_SAVED.contains(&name.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl ShiftKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ShiftKind::Lsl => "LSL",
            ShiftKind::Lsr => "LSR",
            ShiftKind::Asr => "ASR",
            ShiftKind::Ror => "ROR",
        }
    }
}

/// Indexing mode of a memory operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexMode {
    /// `[Rn, #k]`: no base update.
    #[default]
    Offset,
    /// `[Rn, #k]!`: access at `Rn + k`, then `Rn = Rn + k`.
    PreIndex,
    /// `[Rn], #k`: access at `Rn`, then `Rn = Rn + k`.
    PostIndex,
}

fn default_add() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Operand {
    Register {
        name: String,
    },
    Immediate {
        value: i64,
    },
    ShiftedRegister {
        name: String,
        shift: ShiftKind,
        amount: u8,
    },
    RegisterList {
        registers: Vec<String>,
    },
    Memory {
        base: String,
        #[serde(default)]
        offset: i64,
        /// Index register; takes precedence over `offset`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        /// `false` when the offset or index is subtracted.
        #[serde(default = "default_add")]
        add: bool,
        #[serde(default)]
        mode: IndexMode,
    },
    /// Branch or call target.
    Absolute {
        address: WireInt,
    },
}

/// Base-register update implied by a pre- or post-indexed memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Writeback {
    pub lhs: NodeId,
    pub rhs: NodeId,
}

/// Low-level lval of an operand plus the base update it implies, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstLvalue {
    pub lval: NodeId,
    pub writeback: Option<Writeback>,
}

impl Operand {
    pub fn register(name: impl Into<String>) -> Self {
        Operand::Register { name: name.into() }
    }

    pub fn immediate(value: i64) -> Self {
        Operand::Immediate { value }
    }

    /// `[base, #offset]` without base update.
    pub fn memory(base: impl Into<String>, offset: i64) -> Self {
        Operand::Memory {
            base: base.into(),
            offset,
            index: None,
            add: true,
            mode: IndexMode::Offset,
        }
    }

    pub fn register_list<S: Into<String>>(registers: impl IntoIterator<Item = S>) -> Self {
        Operand::RegisterList {
            registers: registers.into_iter().map(Into::into).collect(),
        }
    }

    /// Register name of a plain or shifted register operand, normalized.
    pub fn register_name(&self) -> Option<String> {
        match self {
            Operand::Register { name } | Operand::ShiftedRegister { name, .. } => {
                Some(normalize_register(name))
            }
            _ => None,
        }
    }

    pub fn registers(&self) -> Option<Vec<String>> {
        match self {
            Operand::RegisterList { registers } => {
                Some(registers.iter().map(|r| normalize_register(r)).collect())
            }
            _ => None,
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory { .. })
    }

    pub fn absolute_address(&self) -> Option<i64> {
        match self {
            Operand::Absolute { address } => address.as_i64(),
            _ => None,
        }
    }

    pub fn base_register(&self) -> Option<String> {
        match self {
            Operand::Memory { base, .. } => Some(normalize_register(base)),
            _ => None,
        }
    }

    /// Low-level expression for the operand's value.
    pub fn ast_rvalue(&self, builder: &mut AstBuilder, iaddr: &str) -> LiftResult<NodeId> {
        match self {
            Operand::Register { name } => {
                Ok(builder.mk_register_variable_expr(&normalize_register(name)))
            }
            Operand::Immediate { value } => Ok(builder.mk_integer_constant(*value)),
            Operand::ShiftedRegister {
                name,
                shift,
                amount,
            } => Ok(shifted_register_expr(
                builder,
                &normalize_register(name),
                *shift,
                *amount,
            )),
            Operand::Memory { .. } => {
                let lval: NodeId = self.ast_lvalue(builder, iaddr)?.lval;
                Ok(builder.mk_lval_expr(lval))
            }
            Operand::Absolute { address } => match address.as_i64() {
                Some(addr) => Ok(builder.mk_integer_constant(addr)),
                None => Err(LiftError::inconsistent(
                    iaddr,
                    format!("target address '{}' is not an integer", address.to_text()),
                )),
            },
            Operand::RegisterList { .. } => Err(LiftError::unsupported(
                iaddr,
                format!("register list {} used as a value", self),
            )),
        }
    }

    /// Low-level lval for a register or memory operand.
    pub fn ast_lvalue(&self, builder: &mut AstBuilder, iaddr: &str) -> LiftResult<AstLvalue> {
        match self {
            Operand::Register { name } => Ok(AstLvalue {
                lval: builder.mk_register_variable_lval(&normalize_register(name)),
                writeback: None,
            }),
            Operand::Memory { .. } => {
                let address: NodeId = self.access_address(builder, iaddr)?;
                let lval: NodeId = builder.mk_memref_lval(address, NO_NODE);
                let writeback: Option<Writeback> = self.writeback(builder, iaddr)?;
                Ok(AstLvalue { lval, writeback })
            }
            _ => Err(LiftError::unsupported(
                iaddr,
                format!("operand {} is not assignable", self),
            )),
        }
    }

    /// `Rn = Rn +/- offset` for a pre- or post-indexed memory operand.
    pub fn writeback(&self, builder: &mut AstBuilder, iaddr: &str) -> LiftResult<Option<Writeback>> {
        match self {
            Operand::Memory {
                mode: IndexMode::Offset,
                ..
            } => Ok(None),
            Operand::Memory { base, .. } => {
                let lhs: NodeId = builder.mk_register_variable_lval(&normalize_register(base));
                let rhs: NodeId = self.offset_address(builder, iaddr)?;
                Ok(Some(Writeback { lhs, rhs }))
            }
            _ => Ok(None),
        }
    }

    /// Address accessed by a memory operand: the base for post-indexing,
    /// base plus offset otherwise.
    pub fn access_address(&self, builder: &mut AstBuilder, iaddr: &str) -> LiftResult<NodeId> {
        match self {
            Operand::Memory {
                base,
                mode: IndexMode::PostIndex,
                ..
            } => Ok(builder.mk_register_variable_expr(&normalize_register(base))),
            Operand::Memory { .. } => self.offset_address(builder, iaddr),
            _ => Err(LiftError::unsupported(
                iaddr,
                format!("operand {} is not a memory operand", self),
            )),
        }
    }

    /// `base`, `base + k`, `base - k` or `base +/- index` of a memory operand.
    fn offset_address(&self, builder: &mut AstBuilder, iaddr: &str) -> LiftResult<NodeId> {
        let Operand::Memory {
            base,
            offset,
            index,
            add,
            ..
        } = self
        else {
            return Err(LiftError::unsupported(
                iaddr,
                format!("operand {} is not a memory operand", self),
            ));
        };
        let base: NodeId = builder.mk_register_variable_expr(&normalize_register(base));
        let displacement: NodeId = match index {
            Some(index) => builder.mk_register_variable_expr(&normalize_register(index)),
            None if *offset == 0 => return Ok(base),
            None => builder.mk_integer_constant(offset.abs()),
        };
        let subtract: bool = !*add || (index.is_none() && *offset < 0);
        let op: Operator = if subtract {
            Operator::Minus
        } else {
            Operator::Plus
        };
        Ok(builder.mk_binary_op(op, base, displacement))
    }
}

/// `(x << n)`, `(x >> n)`, or for rotation `((x >> n) | (x << (32 - n)))`.
fn shifted_register_expr(
    builder: &mut AstBuilder,
    register: &str,
    shift: ShiftKind,
    amount: u8,
) -> NodeId {
    let value: NodeId = builder.mk_register_variable_expr(register);
    if amount == 0 {
        return value;
    }
    let count: NodeId = builder.mk_integer_constant(i64::from(amount));
    match shift {
        ShiftKind::Lsl => builder.mk_binary_op(Operator::Lsl, value, count),
        ShiftKind::Lsr => builder.mk_binary_op(Operator::Lsr, value, count),
        ShiftKind::Asr => builder.mk_binary_op(Operator::Asr, value, count),
        ShiftKind::Ror => {
            let right: NodeId = builder.mk_binary_op(Operator::Lsr, value, count);
            let value_again: NodeId = builder.mk_register_variable_expr(register);
            let complement: NodeId = builder.mk_integer_constant(32 - i64::from(amount));
            let left: NodeId = builder.mk_binary_op(Operator::Lsl, value_again, complement);
            builder.mk_binary_op(Operator::Bor, right, left)
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register { name } => write!(f, "{}", name),
            Operand::Immediate { value } => write!(f, "#{}", value),
            Operand::ShiftedRegister {
                name,
                shift,
                amount,
            } => write!(f, "{}, {} #{}", name, shift.mnemonic(), amount),
            Operand::RegisterList { registers } => write!(f, "{{{}}}", registers.join(", ")),
            Operand::Memory {
                base,
                offset,
                index,
                add,
                mode,
            } => {
                let sign: &str = if *add { "" } else { "-" };
                let displacement: Option<String> = match index {
                    Some(index) => Some(format!("{}{}", sign, index)),
                    None if *offset != 0 => Some(format!("#{}{}", sign, offset)),
                    None => None,
                };
                match (mode, displacement) {
                    (_, None) => write!(f, "[{}]", base),
                    (IndexMode::Offset, Some(d)) => write!(f, "[{}, {}]", base, d),
                    (IndexMode::PreIndex, Some(d)) => write!(f, "[{}, {}]!", base, d),
                    (IndexMode::PostIndex, Some(d)) => write!(f, "[{}], {}", base, d),
                }
            }
            Operand::Absolute { address } => write!(f, "{}", address.to_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_aliases() {
        assert_eq!(normalize_register("r13"), "SP");
        assert_eq!(normalize_register("fp"), "R11");
        assert!(is_callee_saved("r14"));
        assert!(!is_callee_saved("R0"));
    }

    #[test]
    fn test_pre_indexed_memory_lval() {
        let mut builder = AstBuilder::default();
        let operand = Operand::Memory {
            base: "R1".to_string(),
            offset: 8,
            index: None,
            add: true,
            mode: IndexMode::PreIndex,
        };
        let lvalue = operand.ast_lvalue(&mut builder, "0x100").unwrap();
        assert_eq!(builder.render(lvalue.lval).unwrap(), "*((R1 + 8))");
        let writeback = lvalue.writeback.unwrap();
        assert_eq!(builder.render(writeback.lhs).unwrap(), "R1");
        assert_eq!(builder.render(writeback.rhs).unwrap(), "(R1 + 8)");
    }

    #[test]
    fn test_post_indexed_accesses_base() {
        let mut builder = AstBuilder::default();
        let operand = Operand::Memory {
            base: "R2".to_string(),
            offset: -4,
            index: None,
            add: true,
            mode: IndexMode::PostIndex,
        };
        let lvalue = operand.ast_lvalue(&mut builder, "0x100").unwrap();
        assert_eq!(builder.render(lvalue.lval).unwrap(), "*(R2)");
        assert_eq!(
            builder.render(lvalue.writeback.unwrap().rhs).unwrap(),
            "(R2 - 4)"
        );
    }

    #[test]
    fn test_rotate_expands_to_shifts() {
        let mut builder = AstBuilder::default();
        let operand = Operand::ShiftedRegister {
            name: "R3".to_string(),
            shift: ShiftKind::Ror,
            amount: 8,
        };
        let expr = operand.ast_rvalue(&mut builder, "0x100").unwrap();
        assert_eq!(
            builder.render(expr).unwrap(),
            "((R3 >> 8) | (R3 << 24))"
        );
    }

    #[test]
    fn test_register_list_is_not_a_value() {
        let mut builder = AstBuilder::default();
        let operand = Operand::register_list(["R4", "LR"]);
        assert_eq!(operand.to_string(), "{R4, LR}");
        assert!(matches!(
            operand.ast_rvalue(&mut builder, "0x100"),
            Err(LiftError::Unsupported { .. })
        ));
    }
}
