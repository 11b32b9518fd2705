//! Lifting Pipeline
//!
//! Drives the opcode lifters over whole functions and programs.
//!
//! # Per-function stages
//! 1. **Order**: sort instructions by address.
//! 2. **Claim**: collect the members of block-copy aggregates and conditional
//!    moves; their heads lift them.
//! 3. **Lift**: dispatch each remaining instruction to its idiom or opcode
//!    lifter. Non-fatal errors become unsupported stubs; a fatal error aborts
//!    the function.
//! 4. **Assemble**: wrap both instruction lists in sequence roots.
//! 5. **Verify**: report high-level instructions with no low-level mapping.
//!
//! Every function gets a fresh [`AstBuilder`], so node ids of different
//! functions never share a cache.

use crate::config::{LiftConfig, ProvenanceMode};
use crate::lifter::arm::{
    idioms, lift_instruction, lift_unsupported, InstrContext, InstrPair, InstructionRecord,
};
use crate::lifter::ast::node::{parse_int, WireInt};
use crate::lifter::ast::{AstNode, AstRecord, CRenderer, NodeId};
use crate::lifter::builder::symbols::SymbolTableRecord;
use crate::lifter::builder::{AstBuilder, GlobalSymbolTable};
use crate::lifter::error::{LiftError, LiftResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Half-open address range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: WireInt,
    pub end: WireInt,
}

impl AddressRange {
    pub fn contains(&self, address: i64) -> bool {
        match (self.start.as_i64(), self.end.as_i64()) {
            (Some(start), Some(end)) => start <= address && address < end,
            _ => false,
        }
    }
}

/// One analyzed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub address: WireInt,
    #[serde(default)]
    pub instructions: Vec<InstructionRecord>,
    /// Wrapper region whose register spills stay out of the high-level view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trampoline: Option<AddressRange>,
}

/// Analyzer output for a whole program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramRecord {
    #[serde(default)]
    pub functions: Vec<FunctionRecord>,
    #[serde(default)]
    pub symbols: SymbolTableRecord,
}

impl ProgramRecord {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse program record")
    }
}

/// Which of the two views to render or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AstLevel {
    #[default]
    High,
    Low,
}

impl FromStr for AstLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(AstLevel::High),
            "low" => Ok(AstLevel::Low),
            other => Err(format!("unknown AST level '{}' (expected 'high' or 'low')", other)),
        }
    }
}

impl fmt::Display for AstLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstLevel::High => write!(f, "high"),
            AstLevel::Low => write!(f, "low"),
        }
    }
}

/// Result of lifting one function.
pub struct LiftedFunction {
    pub name: String,
    pub address: String,
    pub high: Vec<NodeId>,
    pub low: Vec<NodeId>,
    pub high_root: NodeId,
    pub low_root: NodeId,
    /// High-level instructions without a low-level mapping.
    pub coverage_gaps: Vec<NodeId>,
    /// Instructions whose lift failed and were replaced by a stub.
    pub failed_instructions: Vec<String>,
    pub builder: AstBuilder,
}

impl LiftedFunction {
    pub fn root(&self, level: AstLevel) -> NodeId {
        match level {
            AstLevel::High => self.high_root,
            AstLevel::Low => self.low_root,
        }
    }

    pub fn instructions(&self, level: AstLevel) -> &[NodeId] {
        match level {
            AstLevel::High => &self.high,
            AstLevel::Low => &self.low,
        }
    }

    pub fn to_c_like(&self, level: AstLevel, provenance: ProvenanceMode) -> LiftResult<String> {
        let spans = self.builder.spanmap();
        CRenderer::new(self.builder.cache())
            .with_spans(&spans)
            .with_provenance(provenance)
            .render(self.root(level), 0)
    }

    /// Wire record of one view, loadable by [`AbstractSyntaxTree::from_record`].
    ///
    /// [`AbstractSyntaxTree::from_record`]: crate::lifter::ast::AbstractSyntaxTree::from_record
    pub fn to_ast_record(&self, level: AstLevel) -> AstRecord {
        AstRecord {
            nodes: self
                .builder
                .cache()
                .sorted_nodes()
                .into_iter()
                .map(AstNode::to_record)
                .collect(),
            startnode: self.root(level),
            spans: self.builder.spans().to_vec(),
            available_expressions: Default::default(),
        }
    }
}

impl fmt::Debug for LiftedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiftedFunction")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("high", &self.high.len())
            .field("low", &self.low.len())
            .field("coverage_gaps", &self.coverage_gaps)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFailure {
    pub name: String,
    pub error: String,
}

/// Statistics collected while lifting a program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiftStats {
    pub total_functions: usize,
    pub successful_functions: usize,
    pub failed_functions: usize,
    pub total_instructions: usize,
    pub unsupported_instructions: usize,
    pub coverage_gaps: usize,
    pub failures: Vec<FunctionFailure>,
}

impl LiftStats {
    pub fn record(&mut self, function: &FunctionRecord, result: &LiftResult<LiftedFunction>) {
        self.total_functions += 1;
        self.total_instructions += function.instructions.len();
        match result {
            Ok(lifted) => {
                self.successful_functions += 1;
                self.unsupported_instructions += lifted
                    .builder
                    .provenance()
                    .unsupported
                    .values()
                    .map(Vec::len)
                    .sum::<usize>();
                self.coverage_gaps += lifted.coverage_gaps.len();
            }
            Err(err) => {
                self.failed_functions += 1;
                self.failures.push(FunctionFailure {
                    name: function.name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }
}

impl fmt::Display for LiftStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} successful, {} failed out of {} functions ({} instructions, {} unsupported, {} unmapped)",
            self.successful_functions,
            self.failed_functions,
            self.total_functions,
            self.total_instructions,
            self.unsupported_instructions,
            self.coverage_gaps
        )
    }
}

/// Function lifter shared across the functions of one program.
pub struct FunctionLifter {
    config: LiftConfig,
    symbols: Arc<GlobalSymbolTable>,
}

fn address_key(instr: &InstructionRecord) -> i64 {
    parse_int(&instr.iaddr).unwrap_or_else(|| {
        log::warn!("{}: unreadable instruction address; ordered last", instr.iaddr);
        i64::MAX
    })
}

/// Instructions lifted by a head, keyed by member address.
fn claimed_members(instructions: &[&InstructionRecord]) -> HashSet<String> {
    instructions
        .iter()
        .filter(|instr| instr.xdata.is_aggregate_head() || instr.xdata.subsumes_members())
        .flat_map(|instr| instr.xdata.subsumes.iter().cloned())
        .collect()
}

impl FunctionLifter {
    pub fn new(config: LiftConfig, symbols: Arc<GlobalSymbolTable>) -> Self {
        Self { config, symbols }
    }

    pub fn for_program(config: LiftConfig, program: &ProgramRecord) -> Self {
        let symbols: GlobalSymbolTable = GlobalSymbolTable::from(program.symbols.clone());
        Self::new(config, Arc::new(symbols))
    }

    pub fn config(&self) -> &LiftConfig {
        &self.config
    }

    /// Lift one function into its two views.
    ///
    /// # Errors
    /// Only fatal errors ([`LiftError::is_fatal`]) are returned; everything
    /// else is logged and degraded locally.
    pub fn lift_function(&self, function: &FunctionRecord) -> LiftResult<LiftedFunction> {
        log::info!("Lifting {} at {}", function.name, function.address.to_text());
        let mut builder: AstBuilder = AstBuilder::new(Arc::clone(&self.symbols));

        let mut ordered: Vec<&InstructionRecord> = function.instructions.iter().collect();
        ordered.sort_by_key(|instr| address_key(instr));
        let by_address: HashMap<&str, &InstructionRecord> =
            ordered.iter().map(|instr| (instr.iaddr.as_str(), *instr)).collect();
        let claimed: HashSet<String> = claimed_members(&ordered);

        let mut high: Vec<NodeId> = Vec::with_capacity(ordered.len());
        let mut low: Vec<NodeId> = Vec::with_capacity(ordered.len());
        let mut failed_instructions: Vec<String> = Vec::new();

        for instr in &ordered {
            if claimed.contains(&instr.iaddr) {
                continue;
            }
            if instr.xdata.is_subsumed() {
                log::warn!("{}: subsumed instruction without a head; lifted on its own", instr.iaddr);
            }
            let in_trampoline: bool = match (&function.trampoline, parse_int(&instr.iaddr)) {
                (Some(range), Some(address)) => range.contains(address),
                _ => false,
            };
            let ctx: InstrContext = InstrContext::new(instr, &self.config).with_trampoline(in_trampoline);

            let pair: InstrPair = match self.lift_one(&mut builder, &ctx, instr, &by_address) {
                Ok(pair) => pair,
                Err(err) if err.is_fatal() => {
                    log::error!("{}: aborting {}: {}", instr.iaddr, function.name, err);
                    return Err(err);
                }
                Err(err) => {
                    log::warn!("{}: {}", instr.iaddr, err);
                    builder.add_diagnostic(format!("{}: {}", instr.iaddr, err));
                    failed_instructions.push(instr.iaddr.clone());
                    lift_unsupported(&mut builder, &ctx, instr, &err.to_string())
                }
            };
            high.extend(pair.high);
            low.extend(pair.low);
        }

        let high_root: NodeId = builder.mk_instr_sequence(&high);
        let low_root: NodeId = builder.mk_instr_sequence(&low);

        let coverage_gaps: Vec<NodeId> = if self.config.verify_coverage {
            builder.verify_coverage(&high)
        } else {
            Vec::new()
        };
        for id in &coverage_gaps {
            log::warn!("{}: high-level instruction {} has no low-level mapping", function.name, id);
            builder.add_diagnostic(format!("instruction {} has no low-level mapping", id));
        }

        log::debug!(
            "{}: {} high-level, {} low-level instructions",
            function.name,
            high.len(),
            low.len()
        );
        Ok(LiftedFunction {
            name: function.name.clone(),
            address: function.address.to_text(),
            high,
            low,
            high_root,
            low_root,
            coverage_gaps,
            failed_instructions,
            builder,
        })
    }

    fn lift_one(
        &self,
        builder: &mut AstBuilder,
        ctx: &InstrContext,
        instr: &InstructionRecord,
        by_address: &HashMap<&str, &InstructionRecord>,
    ) -> LiftResult<InstrPair> {
        let is_it: bool = instr.opcode.stem().starts_with("IT");
        if !instr.xdata.is_aggregate_head() && !(is_it && instr.xdata.subsumes_members()) {
            return lift_instruction(builder, ctx, instr);
        }
        let mut members: Vec<&InstructionRecord> = Vec::with_capacity(instr.xdata.subsumes.len());
        for iaddr in &instr.xdata.subsumes {
            match by_address.get(iaddr.as_str()) {
                Some(member) => members.push(*member),
                None => {
                    return Err(LiftError::inconsistent(
                        ctx.iaddr,
                        format!("subsumed instruction {} not in function", iaddr),
                    ))
                }
            }
        }
        if instr.xdata.is_aggregate_head() {
            idioms::lift_block_copy(builder, ctx, instr, &members)
        } else {
            idioms::lift_conditional_move(builder, ctx, instr, &members)
        }
    }

    /// Lift every function, continuing past fatal failures.
    pub fn lift_program(&self, functions: &[FunctionRecord]) -> (Vec<LiftedFunction>, LiftStats) {
        let mut stats: LiftStats = LiftStats::default();
        let mut lifted: Vec<LiftedFunction> = Vec::with_capacity(functions.len());
        for function in functions {
            let result: LiftResult<LiftedFunction> = self.lift_function(function);
            stats.record(function, &result);
            match result {
                Ok(function) => lifted.push(function),
                Err(err) => log::warn!("Failed to lift {}: {}", function.name, err),
            }
        }
        log::info!("Lifting complete: {}", stats);
        (lifted, stats)
    }
}

/// Parse a program record from JSON and lift all of its functions.
pub fn lift_program_json(text: &str, config: LiftConfig) -> Result<(Vec<LiftedFunction>, LiftStats)> {
    let program: ProgramRecord = ProgramRecord::from_json(text)?;
    let lifter: FunctionLifter = FunctionLifter::for_program(config, &program);
    Ok(lifter.lift_program(&program.functions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trampoline_range_is_half_open() {
        let range = AddressRange {
            start: WireInt::Text("0x100".to_string()),
            end: WireInt::Number(0x108),
        };
        assert!(range.contains(0x100));
        assert!(range.contains(0x104));
        assert!(!range.contains(0x108));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("HIGH".parse::<AstLevel>().unwrap(), AstLevel::High);
        assert_eq!("low".parse::<AstLevel>().unwrap(), AstLevel::Low);
        assert!("mid".parse::<AstLevel>().is_err());
    }

    #[test]
    fn test_empty_function_lifts_to_empty_sequences() {
        let lifter = FunctionLifter::new(LiftConfig::default(), Arc::new(GlobalSymbolTable::new()));
        let function = FunctionRecord {
            name: "empty".to_string(),
            address: WireInt::Number(0x100),
            instructions: Vec::new(),
            trampoline: None,
        };
        let lifted = lifter.lift_function(&function).unwrap();
        assert!(lifted.high.is_empty());
        assert_eq!(lifted.to_c_like(AstLevel::Low, ProvenanceMode::Omit).unwrap(), "");
    }
}
