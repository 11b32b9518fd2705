//! Instruction Xdata
//!
//! Per-instruction analysis record produced by the analyzer. The record is
//! positional: what `vars[i]` or `xprs[i]` means depends on the opcode, and the
//! typed views in [`layouts`] pin that down for every supported opcode family.
//!
//! A slot that the analyzer could not fill arrives as JSON `null` and reads as
//! `None`. Out-of-range slots read as `None` as well.

pub mod expr;
pub mod layouts;

pub use expr::{XVariable, XXpr};

use crate::lifter::ast::node::WireInt;
use serde::{Deserialize, Serialize};

/// Xdata tags.
pub mod tags {
    /// Instruction executes under a condition.
    pub const INSTR_CONDITION: &str = "ic";
    /// Instruction executes under a condition the analyzer could not express.
    pub const UNKNOWN_CONDITION: &str = "uc";
    /// Base register is updated.
    pub const BASE_UPDATE: &str = "bu";
    /// Branch with true/false conditions in `xprs[0..2]`.
    pub const BRANCH_CONDITIONS: &str = "TF";
    pub const CALL: &str = "call";
    pub const LDMSTM_AGGREGATE: &str = "is_ldmstm_aggregate";
    pub const SUBSUMES: &str = "subsumes";
    pub const SUBSUMED: &str = "subsumed";
}

/// Definitions of a variable that reach an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachingDef {
    pub var: String,
    #[serde(default)]
    pub addrs: Vec<String>,
}

/// Uses of a variable defined at an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefUse {
    pub var: String,
    #[serde(default)]
    pub uses: Vec<String>,
}

impl DefUse {
    pub fn use_count(&self) -> usize {
        self.uses.len()
    }
}

/// Resolved target of a call instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CallTarget {
    /// Function inside the application.
    App {
        address: WireInt,
        #[serde(default)]
        name: Option<String>,
    },
    /// Library function reached through a stub.
    Stub { name: String },
    /// Call through a register the analyzer could not resolve.
    Indirect,
    Unknown,
}

impl CallTarget {
    pub fn name(&self) -> Option<&str> {
        match self {
            CallTarget::App { name, .. } => name.as_deref(),
            CallTarget::Stub { name } => Some(name),
            _ => None,
        }
    }

    pub fn address(&self) -> Option<i64> {
        match self {
            CallTarget::App { address, .. } => address.as_i64(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrXData {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub args: Vec<i64>,
    #[serde(default)]
    pub vars: Vec<Option<XVariable>>,
    #[serde(default)]
    pub xprs: Vec<Option<XXpr>>,
    /// C-level typed expressions.
    #[serde(default)]
    pub cxprs: Vec<Option<XXpr>>,
    #[serde(default)]
    pub reachingdefs: Vec<Option<ReachingDef>>,
    #[serde(default)]
    pub defuses: Vec<Option<DefUse>>,
    #[serde(default)]
    pub defuseshigh: Vec<Option<DefUse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_target: Option<CallTarget>,
    /// Addresses of the instructions folded into this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsumes: Vec<String>,
}

impl InstrXData {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    #[inline]
    pub fn var(&self, index: usize) -> Option<&XVariable> {
        self.vars.get(index).and_then(Option::as_ref)
    }

    #[inline]
    pub fn xpr(&self, index: usize) -> Option<&XXpr> {
        self.xprs.get(index).and_then(Option::as_ref)
    }

    #[inline]
    pub fn cxpr(&self, index: usize) -> Option<&XXpr> {
        self.cxprs.get(index).and_then(Option::as_ref)
    }

    pub fn rdef(&self, index: usize) -> Option<&ReachingDef> {
        self.reachingdefs.get(index).and_then(Option::as_ref)
    }

    /// Valid reaching definitions in `start..end`; `end` is clamped.
    pub fn rdefs(&self, start: usize, end: usize) -> Vec<ReachingDef> {
        let end: usize = end.min(self.reachingdefs.len());
        if start >= end {
            return Vec::new();
        }
        self.reachingdefs[start..end]
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn defuse(&self, index: usize) -> Option<&DefUse> {
        self.defuses.get(index).and_then(Option::as_ref)
    }

    pub fn defuse_high(&self, index: usize) -> Option<&DefUse> {
        self.defuseshigh.get(index).and_then(Option::as_ref)
    }

    pub fn has_instruction_condition(&self) -> bool {
        self.has_tag(tags::INSTR_CONDITION)
    }

    pub fn has_unknown_condition(&self) -> bool {
        self.has_tag(tags::UNKNOWN_CONDITION)
    }

    pub fn has_base_update(&self) -> bool {
        self.has_tag(tags::BASE_UPDATE)
    }

    pub fn has_branch_conditions(&self) -> bool {
        self.has_tag(tags::BRANCH_CONDITIONS)
    }

    pub fn has_call_target(&self) -> bool {
        self.has_tag(tags::CALL) || self.call_target.is_some()
    }

    pub fn is_aggregate_head(&self) -> bool {
        self.has_tag(tags::LDMSTM_AGGREGATE)
    }

    pub fn is_subsumed(&self) -> bool {
        self.has_tag(tags::SUBSUMED)
    }

    pub fn subsumes_members(&self) -> bool {
        self.has_tag(tags::SUBSUMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_slots_read_as_none() {
        let xdata: InstrXData = serde_json::from_str(
            r#"{"tags": ["ic"], "vars": [null, {"kind": "register", "name": "R0"}],
                "xprs": [{"kind": "const", "value": 4}, null]}"#,
        )
        .unwrap();
        assert!(xdata.var(0).is_none());
        assert_eq!(xdata.var(1).and_then(XVariable::register_name), Some("R0"));
        assert_eq!(xdata.xpr(0).and_then(XXpr::const_value), Some(4));
        assert!(xdata.xpr(1).is_none());
        assert!(xdata.xpr(9).is_none());
        assert!(xdata.has_instruction_condition());
    }

    #[test]
    fn test_rdefs_skip_error_values() {
        let xdata: InstrXData = serde_json::from_str(
            r#"{"reachingdefs": [{"var": "R0", "addrs": ["0x100"]}, null, {"var": "R1"}]}"#,
        )
        .unwrap();
        let rdefs = xdata.rdefs(0, 10);
        assert_eq!(rdefs.len(), 2);
        assert_eq!(rdefs[1].var, "R1");
        assert!(xdata.rdefs(5, 2).is_empty());
    }
}
