//! Per-Opcode Xdata Layouts
//!
//! Each struct below is the fixed slot schema of one opcode family. Building a
//! layout never fails: a slot the analyzer marked as an error, or that is
//! missing, becomes `None` and the lifter falls back.
//!
//! Changing the slot order in any of these is a breaking wire-format change.

use crate::lifter::xdata::{CallTarget, DefUse, InstrXData, ReachingDef, XVariable, XXpr};

/// Base-register write-back carried by loads and stores tagged `bu`.
#[derive(Debug, Clone, Copy)]
pub struct BaseUpdate<'a> {
    pub vrn: Option<&'a XVariable>,
    pub xrn_updated: Option<&'a XXpr>,
}

/// Data-processing layout (ADD, ADC, SUB, RSB, MUL, AND, ORR, EOR, BIC, shifts,
/// VADD, VSUB, VMUL, VDIV).
///
/// - `vars[0]`: destination
/// - `xprs[0..2]`: operands; `xprs[2]`: raw result; `xprs[3]`: rewritten result;
///   `xprs[4..6]`: rewritten operands
/// - `cxprs[0]`: C-level result
/// - `rdefs[0..2]`: operand reaching defs; `rdefs[2..]`: result reaching defs
/// - `uses[0]`, `useshigh[0]`: destination def-use
#[derive(Debug, Clone)]
pub struct DataProcXData<'a> {
    pub vrd: Option<&'a XVariable>,
    pub xrn: Option<&'a XXpr>,
    pub xrm: Option<&'a XXpr>,
    pub result: Option<&'a XXpr>,
    pub rresult: Option<&'a XXpr>,
    pub xxrn: Option<&'a XXpr>,
    pub xxrm: Option<&'a XXpr>,
    pub cresult: Option<&'a XXpr>,
    pub operand_rdefs: Vec<ReachingDef>,
    pub result_rdefs: Vec<ReachingDef>,
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
}

impl<'a> DataProcXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        Self {
            vrd: xdata.var(0),
            xrn: xdata.xpr(0),
            xrm: xdata.xpr(1),
            result: xdata.xpr(2),
            rresult: xdata.xpr(3),
            xxrn: xdata.xpr(4),
            xxrm: xdata.xpr(5),
            cresult: xdata.cxpr(0),
            operand_rdefs: xdata.rdefs(0, 2),
            result_rdefs: xdata.rdefs(2, usize::MAX),
            defuse: xdata.defuse(0),
            defuse_high: xdata.defuse_high(0),
        }
    }
}

/// Move layout (MOV, MVN, VMOV).
///
/// - `vars[0]`: destination
/// - `xprs[0]`: source; `xprs[1]`: rewritten source
/// - `cxprs[0]`: C-level source
/// - `rdefs[0..]`: source reaching defs
#[derive(Debug, Clone)]
pub struct MoveXData<'a> {
    pub vrd: Option<&'a XVariable>,
    pub xrm: Option<&'a XXpr>,
    pub rxrm: Option<&'a XXpr>,
    pub cxrm: Option<&'a XXpr>,
    pub rdefs: Vec<ReachingDef>,
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
}

impl<'a> MoveXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        Self {
            vrd: xdata.var(0),
            xrm: xdata.xpr(0),
            rxrm: xdata.xpr(1),
            cxrm: xdata.cxpr(0),
            rdefs: xdata.rdefs(0, usize::MAX),
            defuse: xdata.defuse(0),
            defuse_high: xdata.defuse_high(0),
        }
    }
}

/// Single load layout (LDR, LDRB, LDRH, LDRSH, VLDR).
///
/// - `vars[0]`: destination register; `vars[1]`: memory location;
///   `vars[2]`: base register if `bu`
/// - `xprs[0]`: loaded value; `xprs[1]`: rewritten value; `xprs[2]`: address;
///   `xprs[3]`: updated base if `bu`
/// - `cxprs[0]`: C-level value
/// - `rdefs[0]`: base; `rdefs[1]`: index; `rdefs[2..]`: memory
#[derive(Debug, Clone)]
pub struct LoadXData<'a> {
    pub vrt: Option<&'a XVariable>,
    pub vmem: Option<&'a XVariable>,
    pub xmem: Option<&'a XXpr>,
    pub rxmem: Option<&'a XXpr>,
    pub xaddr: Option<&'a XXpr>,
    pub cxmem: Option<&'a XXpr>,
    pub base_update: Option<BaseUpdate<'a>>,
    pub address_rdefs: Vec<ReachingDef>,
    pub memory_rdefs: Vec<ReachingDef>,
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
    pub conditional: bool,
}

impl<'a> LoadXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        let base_update: Option<BaseUpdate<'a>> = if xdata.has_base_update() {
            Some(BaseUpdate {
                vrn: xdata.var(2),
                xrn_updated: xdata.xpr(3),
            })
        } else {
            None
        };
        Self {
            vrt: xdata.var(0),
            vmem: xdata.var(1),
            xmem: xdata.xpr(0),
            rxmem: xdata.xpr(1),
            xaddr: xdata.xpr(2),
            cxmem: xdata.cxpr(0),
            base_update,
            address_rdefs: xdata.rdefs(0, 2),
            memory_rdefs: xdata.rdefs(2, usize::MAX),
            defuse: xdata.defuse(0),
            defuse_high: xdata.defuse_high(0),
            conditional: xdata.has_instruction_condition(),
        }
    }
}

/// Single store layout (STR, STRB, STRH, VSTR).
///
/// - `vars[0]`: memory location; `vars[1]`: base register if `bu`
/// - `xprs[0]`: base; `xprs[1]`: index; `xprs[2]`: stored value;
///   `xprs[3]`: rewritten stored value; `xprs[4]`: address;
///   `xprs[5]`: updated base if `bu`
/// - `cxprs[0]`: C-level stored value
/// - `rdefs[0]`: base; `rdefs[1]`: index; `rdefs[2]`: stored register
#[derive(Debug, Clone)]
pub struct StoreXData<'a> {
    pub vmem: Option<&'a XVariable>,
    pub xrn: Option<&'a XXpr>,
    pub xrm: Option<&'a XXpr>,
    pub xrt: Option<&'a XXpr>,
    pub rxrt: Option<&'a XXpr>,
    pub xaddr: Option<&'a XXpr>,
    pub cxrt: Option<&'a XXpr>,
    pub base_update: Option<BaseUpdate<'a>>,
    pub address_rdefs: Vec<ReachingDef>,
    pub value_rdefs: Vec<ReachingDef>,
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
    pub conditional: bool,
}

impl<'a> StoreXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        let base_update: Option<BaseUpdate<'a>> = if xdata.has_base_update() {
            Some(BaseUpdate {
                vrn: xdata.var(1),
                xrn_updated: xdata.xpr(5),
            })
        } else {
            None
        };
        Self {
            vmem: xdata.var(0),
            xrn: xdata.xpr(0),
            xrm: xdata.xpr(1),
            xrt: xdata.xpr(2),
            rxrt: xdata.xpr(3),
            xaddr: xdata.xpr(4),
            cxrt: xdata.cxpr(0),
            base_update,
            address_rdefs: xdata.rdefs(0, 2),
            value_rdefs: xdata.rdefs(2, 3),
            defuse: xdata.defuse(0),
            defuse_high: xdata.defuse_high(0),
            conditional: xdata.has_instruction_condition(),
        }
    }
}

/// One half of a dual transfer.
#[derive(Debug, Clone)]
pub struct DualHalf<'a> {
    pub var: Option<&'a XVariable>,
    pub value: Option<&'a XXpr>,
    pub rvalue: Option<&'a XXpr>,
    pub address: Option<&'a XXpr>,
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
}

/// Dual load layout (LDRD).
///
/// - `vars[0..2]`: destination registers
/// - `xprs[0..2]`: first value, rewritten; `xprs[2..4]`: second value, rewritten;
///   `xprs[4..6]`: addresses
/// - `rdefs[0]`: base; `rdefs[1]`: index; `rdefs[2..4]`: memory
/// - `uses[0..2]`, `useshigh[0..2]`: destination def-use
#[derive(Debug, Clone)]
pub struct LoadDualXData<'a> {
    pub first: DualHalf<'a>,
    pub second: DualHalf<'a>,
    pub address_rdefs: Vec<ReachingDef>,
    pub memory_rdefs: Vec<ReachingDef>,
}

impl<'a> LoadDualXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        Self {
            first: DualHalf {
                var: xdata.var(0),
                value: xdata.xpr(0),
                rvalue: xdata.xpr(1),
                address: xdata.xpr(4),
                defuse: xdata.defuse(0),
                defuse_high: xdata.defuse_high(0),
            },
            second: DualHalf {
                var: xdata.var(1),
                value: xdata.xpr(2),
                rvalue: xdata.xpr(3),
                address: xdata.xpr(5),
                defuse: xdata.defuse(1),
                defuse_high: xdata.defuse_high(1),
            },
            address_rdefs: xdata.rdefs(0, 2),
            memory_rdefs: xdata.rdefs(2, 4),
        }
    }
}

/// Dual store layout (STRD).
///
/// - `vars[0..2]`: memory locations
/// - `xprs[0..2]`: first value, rewritten; `xprs[2..4]`: second value, rewritten;
///   `xprs[4..6]`: addresses
/// - `rdefs[0]`: base; `rdefs[1]`: index; `rdefs[2]`: first register; `rdefs[3]`: second
/// - `uses[0..2]`, `useshigh[0..2]`: memory def-use
#[derive(Debug, Clone)]
pub struct StoreDualXData<'a> {
    pub first: DualHalf<'a>,
    pub second: DualHalf<'a>,
    pub address_rdefs: Vec<ReachingDef>,
    pub first_rdefs: Vec<ReachingDef>,
    pub second_rdefs: Vec<ReachingDef>,
}

impl<'a> StoreDualXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        Self {
            first: DualHalf {
                var: xdata.var(0),
                value: xdata.xpr(0),
                rvalue: xdata.xpr(1),
                address: xdata.xpr(4),
                defuse: xdata.defuse(0),
                defuse_high: xdata.defuse_high(0),
            },
            second: DualHalf {
                var: xdata.var(1),
                value: xdata.xpr(2),
                rvalue: xdata.xpr(3),
                address: xdata.xpr(5),
                defuse: xdata.defuse(1),
                defuse_high: xdata.defuse_high(1),
            },
            address_rdefs: xdata.rdefs(0, 2),
            first_rdefs: xdata.rdefs(2, 3),
            second_rdefs: xdata.rdefs(3, 4),
        }
    }
}

/// One register slot of a multiple transfer.
#[derive(Debug, Clone)]
pub struct MultipleItem<'a> {
    /// Memory location for stores, destination register for loads.
    pub var: Option<&'a XVariable>,
    /// Rewritten register value for stores, rewritten memory value for loads.
    pub value: Option<&'a XXpr>,
    pub rdef: Option<&'a ReachingDef>,
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
}

/// Multiple transfer layout (LDM, LDMIB, LDMDB, STM, STMIB, STMDB, PUSH, POP)
/// for `n` registers.
///
/// - `vars[0]`: base register (SP for PUSH/POP); `vars[1..=n]`: per-register slot
/// - `xprs[0]`: base value; `xprs[1..=n]`: per-register value; `xprs[n+1]`: updated base
/// - `rdefs[0]`: base; `rdefs[1..=n]`: per-register
/// - `uses[0]`, `useshigh[0]`: base; `uses[1..=n]`, `useshigh[1..=n]`: per-register
#[derive(Debug, Clone)]
pub struct MultipleXData<'a> {
    pub base_lhs: Option<&'a XVariable>,
    pub base_rhs: Option<&'a XXpr>,
    pub base_updated: Option<&'a XXpr>,
    pub base_rdef: Option<&'a ReachingDef>,
    pub base_defuse: Option<&'a DefUse>,
    pub base_defuse_high: Option<&'a DefUse>,
    pub items: Vec<MultipleItem<'a>>,
    pub conditional: bool,
}

impl<'a> MultipleXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData, count: usize) -> Self {
        let items: Vec<MultipleItem<'a>> = (1..=count)
            .map(|i| MultipleItem {
                var: xdata.var(i),
                value: xdata.xpr(i),
                rdef: xdata.rdef(i),
                defuse: xdata.defuse(i),
                defuse_high: xdata.defuse_high(i),
            })
            .collect();
        Self {
            base_lhs: xdata.var(0),
            base_rhs: xdata.xpr(0),
            base_updated: xdata.xpr(count + 1),
            base_rdef: xdata.rdef(0),
            base_defuse: xdata.defuse(0),
            base_defuse_high: xdata.defuse_high(0),
            items,
            conditional: xdata.has_instruction_condition(),
        }
    }
}

/// One argument slot of a call.
#[derive(Debug, Clone, Copy)]
pub struct CallArgument<'a> {
    pub value: Option<&'a XXpr>,
    pub rdef: Option<&'a ReachingDef>,
}

/// Call layout (BL, BLX, BX with a call target) for `n` arguments.
///
/// - `vars[0]`: return value
/// - `xprs[0..n]`: rewritten arguments; `xprs[n]`: rewritten target of an indirect call
/// - `rdefs[0..n]`: argument reaching defs
/// - `uses[0]`, `useshigh[0]`: return value def-use
#[derive(Debug, Clone)]
pub struct CallXData<'a> {
    pub target: Option<&'a CallTarget>,
    pub return_var: Option<&'a XVariable>,
    pub arguments: Vec<CallArgument<'a>>,
    pub indirect_target: Option<&'a XXpr>,
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
}

impl<'a> CallXData<'a> {
    /// Argument count is taken from the declared signature when known; otherwise
    /// every expression slot except the indirect target is an argument.
    ///
    /// Without a call target record the call is indirect only when the
    /// instruction has no absolute target operand.
    pub fn from_xdata(
        xdata: &'a InstrXData,
        declared_arguments: Option<usize>,
        has_absolute_target: bool,
    ) -> Self {
        let indirect: bool = match xdata.call_target {
            Some(CallTarget::Indirect) => true,
            Some(_) => false,
            None => !has_absolute_target,
        };
        let available: usize = if indirect {
            xdata.xprs.len().saturating_sub(1)
        } else {
            xdata.xprs.len()
        };
        let count: usize = declared_arguments.unwrap_or(available);
        Self {
            target: xdata.call_target.as_ref(),
            return_var: xdata.var(0),
            arguments: (0..count)
                .map(|i| CallArgument {
                    value: xdata.xpr(i),
                    rdef: xdata.rdef(i),
                })
                .collect(),
            indirect_target: if indirect { xdata.xpr(available) } else { None },
            defuse: xdata.defuse(0),
            defuse_high: xdata.defuse_high(0),
        }
    }
}

/// Conditional branch layout (B with `TF`).
///
/// - `xprs[0]`: condition when taken; `xprs[1]`: condition when not taken
/// - `rdefs[0..]`: reaching defs of the flag operands
#[derive(Debug, Clone)]
pub struct BranchXData<'a> {
    pub true_condition: Option<&'a XXpr>,
    pub false_condition: Option<&'a XXpr>,
    pub rdefs: Vec<ReachingDef>,
}

impl<'a> BranchXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        Self {
            true_condition: xdata.xpr(0),
            false_condition: xdata.xpr(1),
            rdefs: xdata.rdefs(0, usize::MAX),
        }
    }
}

/// Block-copy aggregate layout (head LDM tagged `is_ldmstm_aggregate`).
///
/// - `xprs[0]`: rewritten destination address; `xprs[1]`: rewritten source address;
///   `xprs[2]`: copy size in bytes (also accepted as `args[0]`)
/// - `rdefs[0]`: source base; `rdefs[1]`: destination base
#[derive(Debug, Clone)]
pub struct AggregateXData<'a> {
    pub dst: Option<&'a XXpr>,
    pub src: Option<&'a XXpr>,
    pub size: Option<i64>,
    pub members: &'a [String],
    pub rdefs: Vec<ReachingDef>,
}

impl<'a> AggregateXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        let size: Option<i64> = xdata
            .xpr(2)
            .and_then(XXpr::const_value)
            .or_else(|| xdata.args.first().copied());
        Self {
            dst: xdata.xpr(0),
            src: xdata.xpr(1),
            size,
            members: &xdata.subsumes,
            rdefs: xdata.rdefs(0, 2),
        }
    }
}

/// Conditional-move layout (IT head tagged `subsumes`).
///
/// - `vars[0]`: destination
/// - `xprs[0]`: condition; `xprs[1]`: value if true; `xprs[2]`: value if false
/// - `uses[0]`, `useshigh[0]`: destination def-use
#[derive(Debug, Clone)]
pub struct ConditionalMoveXData<'a> {
    pub vrd: Option<&'a XVariable>,
    pub condition: Option<&'a XXpr>,
    pub then_value: Option<&'a XXpr>,
    pub else_value: Option<&'a XXpr>,
    pub members: &'a [String],
    pub defuse: Option<&'a DefUse>,
    pub defuse_high: Option<&'a DefUse>,
}

impl<'a> ConditionalMoveXData<'a> {
    pub fn from_xdata(xdata: &'a InstrXData) -> Self {
        Self {
            vrd: xdata.var(0),
            condition: xdata.xpr(0),
            then_value: xdata.xpr(1),
            else_value: xdata.xpr(2),
            members: &xdata.subsumes,
            defuse: xdata.defuse(0),
            defuse_high: xdata.defuse_high(0),
        }
    }
}
