//! Cross-Reference Tables
//!
//! Multimaps that tie the high-level AST to the low-level AST and to the
//! analyzer's data-flow facts. Every insertion is idempotent: recording the
//! same pair twice leaves a single entry.

use crate::lifter::ast::NodeId;
use crate::lifter::xdata::{DefUse, ReachingDef};
use serde::Serialize;
use std::collections::BTreeMap;

/// Classified memory access of a load or store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MemoryAccess {
    /// Store of a callee-saved register's entry value.
    RegisterSpill { register: String, location: String },
    /// Load of a callee-saved register's entry value back into that register.
    RegisterRestore { register: String, location: String },
    Generic { location: String, write: bool },
}

impl MemoryAccess {
    pub fn is_spill(&self) -> bool {
        matches!(self, MemoryAccess::RegisterSpill { .. })
    }

    pub fn is_restore(&self) -> bool {
        matches!(self, MemoryAccess::RegisterRestore { .. })
    }
}

fn push_unique<K: Ord, V: PartialEq>(map: &mut BTreeMap<K, Vec<V>>, key: K, value: V) {
    let entry: &mut Vec<V> = map.entry(key).or_default();
    if !entry.contains(&value) {
        entry.push(value);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Provenance {
    /// High-level instruction -> low-level instructions it was lowered from.
    pub instr_mapping: BTreeMap<NodeId, Vec<NodeId>>,
    /// Instruction -> machine addresses.
    pub instr_addresses: BTreeMap<NodeId, Vec<String>>,
    /// Machine address -> instructions.
    pub address_instrs: BTreeMap<String, Vec<NodeId>>,
    pub expr_mapping: BTreeMap<NodeId, Vec<NodeId>>,
    pub lval_mapping: BTreeMap<NodeId, Vec<NodeId>>,
    pub expr_reachingdefs: BTreeMap<NodeId, Vec<ReachingDef>>,
    pub lval_defuses: BTreeMap<NodeId, Vec<DefUse>>,
    pub lval_defuses_high: BTreeMap<NodeId, Vec<DefUse>>,
    /// Branch condition expression -> branch addresses.
    pub condition_addresses: BTreeMap<NodeId, Vec<String>>,
    /// Call address -> high-level return-value lval, whether or not it was kept.
    pub return_value_intros: BTreeMap<String, NodeId>,
    /// Address of a flag-setting instruction -> mnemonic.
    pub condition_setters: BTreeMap<String, String>,
    pub memory_accesses: BTreeMap<String, Vec<MemoryAccess>>,
    /// Mnemonic -> descriptions of unsupported occurrences.
    pub unsupported: BTreeMap<String, Vec<String>>,
    pub diagnostics: Vec<String>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instr_mapping(&mut self, high: NodeId, low: NodeId) {
        push_unique(&mut self.instr_mapping, high, low);
    }

    pub fn add_instr_address(&mut self, instr: NodeId, iaddrs: &[&str]) {
        for iaddr in iaddrs {
            push_unique(&mut self.instr_addresses, instr, iaddr.to_string());
            push_unique(&mut self.address_instrs, iaddr.to_string(), instr);
        }
    }

    pub fn add_expr_mapping(&mut self, high: NodeId, low: NodeId) {
        push_unique(&mut self.expr_mapping, high, low);
    }

    pub fn add_lval_mapping(&mut self, high: NodeId, low: NodeId) {
        push_unique(&mut self.lval_mapping, high, low);
    }

    pub fn add_expr_reachingdefs(&mut self, expr: NodeId, rdefs: &[ReachingDef]) {
        for rdef in rdefs {
            push_unique(&mut self.expr_reachingdefs, expr, rdef.clone());
        }
    }

    pub fn add_lval_defuses(&mut self, lval: NodeId, defuse: &DefUse) {
        push_unique(&mut self.lval_defuses, lval, defuse.clone());
    }

    pub fn add_lval_defuses_high(&mut self, lval: NodeId, defuse: &DefUse) {
        push_unique(&mut self.lval_defuses_high, lval, defuse.clone());
    }

    pub fn add_condition_address(&mut self, expr: NodeId, iaddrs: &[&str]) {
        for iaddr in iaddrs {
            push_unique(&mut self.condition_addresses, expr, iaddr.to_string());
        }
    }

    pub fn add_return_value_intro(&mut self, iaddr: &str, lval: NodeId) {
        self.return_value_intros.entry(iaddr.to_string()).or_insert(lval);
    }

    pub fn add_condition_setter(&mut self, iaddr: &str, mnemonic: &str) {
        self.condition_setters
            .insert(iaddr.to_string(), mnemonic.to_string());
    }

    pub fn add_memory_access(&mut self, iaddr: &str, access: MemoryAccess) {
        push_unique(&mut self.memory_accesses, iaddr.to_string(), access);
    }

    pub fn add_instruction_unsupported(&mut self, mnemonic: &str, description: &str) {
        push_unique(
            &mut self.unsupported,
            mnemonic.to_string(),
            description.to_string(),
        );
    }

    pub fn add_diagnostic(&mut self, message: impl Into<String>) {
        let message: String = message.into();
        if !self.diagnostics.contains(&message) {
            self.diagnostics.push(message);
        }
    }

    pub fn low_level_of(&self, high: NodeId) -> &[NodeId] {
        self.instr_mapping.get(&high).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn memory_accesses_at(&self, iaddr: &str) -> &[MemoryAccess] {
        self.memory_accesses
            .get(iaddr)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// High-level instructions without a low-level counterpart.
    pub fn uncovered(&self, high: &[NodeId]) -> Vec<NodeId> {
        high.iter()
            .copied()
            .filter(|id| self.low_level_of(*id).is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_calls_are_idempotent() {
        let mut provenance = Provenance::new();
        provenance.add_instr_mapping(10, 3);
        provenance.add_instr_mapping(10, 3);
        provenance.add_instr_mapping(10, 4);
        assert_eq!(provenance.low_level_of(10), &[3, 4]);
        provenance.add_instr_address(10, &["0x100", "0x100"]);
        assert_eq!(provenance.instr_addresses[&10], vec!["0x100".to_string()]);
        assert_eq!(provenance.address_instrs["0x100"], vec![10]);
    }

    #[test]
    fn test_uncovered() {
        let mut provenance = Provenance::new();
        provenance.add_instr_mapping(10, 3);
        assert_eq!(provenance.uncovered(&[10, 11]), vec![11]);
    }
}
