//! Function and program lifting tests

mod utils;

use chblift_core::config::{LiftConfig, ProvenanceMode};
use chblift_core::lifter::arm::{InstructionRecord, Operand};
use chblift_core::lifter::ast::{AbstractSyntaxTree, WireInt};
use chblift_core::lifter::builder::GlobalSymbolTable;
use chblift_core::lifter::pipeline::{lift_program_json, AddressRange, AstLevel};
use chblift_core::lifter::{FunctionLifter, FunctionRecord, LiftError, LiftStats};
use serde_json::{json, Value};
use std::sync::Arc;
use utils::*;

fn function(name: &str, instructions: Vec<InstructionRecord>) -> FunctionRecord {
    FunctionRecord {
        name: name.to_string(),
        address: WireInt::Text("0x400".to_string()),
        instructions,
        trampoline: None,
    }
}

fn lifter() -> FunctionLifter {
    FunctionLifter::new(LiftConfig::default(), Arc::new(GlobalSymbolTable::new()))
}

fn block_copy(src: Value) -> FunctionRecord {
    function(
        "copy",
        vec![
            instr(
                "0x404",
                "STM",
                vec![Operand::register("R0"), Operand::register_list(["R2", "R3"])],
                json!({"tags": ["subsumed"]}),
            ),
            instr(
                "0x400",
                "LDM",
                vec![Operand::register("R1"), Operand::register_list(["R2", "R3"])],
                json!({
                    "tags": ["is_ldmstm_aggregate"],
                    "xprs": [{"kind": "stack-address", "offset": -16}, src, constant(8)],
                    "subsumes": ["0x404"]
                }),
            ),
        ],
    )
}

#[test]
fn test_block_copy_becomes_memcpy() {
    let lifted = lifter()
        .lift_function(&block_copy(json!({"kind": "global-address", "address": 20480})))
        .unwrap();
    assert_eq!(lifted.high.len(), 1);
    assert_eq!(lifted.low.len(), 4);
    assert_eq!(
        lifted.to_c_like(AstLevel::High, ProvenanceMode::Omit).unwrap(),
        "memcpy(&var_0016, 0x5000, 8);"
    );
    assert_eq!(
        lifted.to_c_like(AstLevel::Low, ProvenanceMode::Omit).unwrap(),
        "R2 = *(R1);\nR3 = *((R1 + 4));\n*(R0) = R2;\n*((R0 + 4)) = R3;"
    );

    let provenance = lifted.builder.provenance();
    assert_eq!(provenance.instr_mapping.len(), 1);
    assert_eq!(provenance.low_level_of(lifted.high[0]), lifted.low.as_slice());
    assert_eq!(
        provenance.instr_addresses[&lifted.high[0]],
        vec!["0x400".to_string(), "0x404".to_string()]
    );
    assert!(lifted.coverage_gaps.is_empty());
}

#[test]
fn test_block_copy_of_string_becomes_strcpy() {
    let lifted = lifter()
        .lift_function(&block_copy(json!({"kind": "string-ref", "address": 24576, "value": "abcdefg"})))
        .unwrap();
    assert_eq!(
        lifted.to_c_like(AstLevel::High, ProvenanceMode::Omit).unwrap(),
        "strcpy(&var_0016, \"abcdefg\");"
    );
}

#[test]
fn test_block_copy_without_source_keeps_low_level() {
    let lifted = lifter().lift_function(&block_copy(Value::Null)).unwrap();
    assert!(lifted.high.is_empty());
    assert_eq!(lifted.low.len(), 4);
    assert!(lifted
        .builder
        .provenance()
        .diagnostics
        .contains(&"0x400: unresolved block copy".to_string()));
}

#[test]
fn test_it_block_becomes_conditional_expression() {
    let record = function(
        "select",
        vec![
            instr(
                "0x500",
                "ITE",
                Vec::new(),
                json!({
                    "tags": ["subsumes"],
                    "vars": [reg_var("R0")],
                    "xprs": [op("eq", vec![reg("R1"), constant(0)]), constant(1), constant(2)],
                    "subsumes": ["0x502", "0x504"]
                }),
            ),
            conditional_instr(
                "0x502",
                "MOV",
                "eq",
                vec![Operand::register("R0"), Operand::immediate(1)],
                json!({"tags": ["subsumed"]}),
            ),
            conditional_instr(
                "0x504",
                "MOV",
                "ne",
                vec![Operand::register("R0"), Operand::immediate(2)],
                json!({"tags": ["subsumed"]}),
            ),
        ],
    );
    let lifted = lifter().lift_function(&record).unwrap();
    assert_eq!(
        lifted.to_c_like(AstLevel::High, ProvenanceMode::Omit).unwrap(),
        "R0 = ((R1 == 0) ? 1 : 2);"
    );
    assert_eq!(
        lifted.to_c_like(AstLevel::Low, ProvenanceMode::Omit).unwrap(),
        "R0 = 1;\nR0 = 2;"
    );
    assert_eq!(lifted.builder.provenance().low_level_of(lifted.high[0]).len(), 2);
}

#[test]
fn test_instructions_are_lifted_in_address_order() {
    let record = function(
        "ordered",
        vec![
            instr(
                "0x408",
                "MOV",
                vec![Operand::register("R1"), Operand::immediate(2)],
                json!({"vars": [reg_var("R1")], "xprs": [constant(2), constant(2)]}),
            ),
            instr(
                "0x400",
                "MOV",
                vec![Operand::register("R0"), Operand::immediate(1)],
                json!({"vars": [reg_var("R0")], "xprs": [constant(1), constant(1)]}),
            ),
        ],
    );
    let lifted = lifter().lift_function(&record).unwrap();
    assert_eq!(
        lifted.to_c_like(AstLevel::High, ProvenanceMode::Omit).unwrap(),
        "R0 = 1;\nR1 = 2;"
    );
    let text = lifted.to_c_like(AstLevel::High, ProvenanceMode::Required).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("R0 = 1; // ") && lines[0].ends_with(" (0x400)"));
    assert!(lines[1].ends_with(" (0x408)"));
}

#[test]
fn test_trampoline_range_applies_per_instruction() {
    let mut record = function(
        "trampoline",
        vec![instr(
            "0x400",
            "PUSH",
            vec![Operand::register_list(["R4"])],
            json!({
                "vars": [reg_var("SP"), stack_var(-4)],
                "xprs": [reg("SP"), initial("R4"), op("minus", vec![initial("SP"), constant(4)])]
            }),
        )],
    );
    record.trampoline = Some(AddressRange {
        start: WireInt::Number(0x400),
        end: WireInt::Number(0x404),
    });
    let lifted = lifter().lift_function(&record).unwrap();
    assert_eq!(
        lifted.to_c_like(AstLevel::High, ProvenanceMode::Omit).unwrap(),
        "SP = (SP_in - 4);"
    );
}

#[test]
fn test_failed_instruction_becomes_stub() {
    let record = function(
        "broken",
        vec![
            instr("0x400", "BL", Vec::new(), json!({})),
            instr(
                "0x404",
                "MOV",
                vec![Operand::register("R0"), Operand::immediate(1)],
                json!({"vars": [reg_var("R0")], "xprs": [constant(1), constant(1)]}),
            ),
        ],
    );
    let lifted = lifter().lift_function(&record).unwrap();
    assert_eq!(lifted.failed_instructions, vec!["0x400".to_string()]);
    assert_eq!(
        lifted.to_c_like(AstLevel::Low, ProvenanceMode::Omit).unwrap(),
        "__asm(\"BL\");\nR0 = 1;"
    );
    assert_eq!(lifted.high.len(), 1);
}

#[test]
fn test_ast_export() {
    let record = function(
        "single",
        vec![instr(
            "0x400",
            "MOV",
            vec![Operand::register("R0"), Operand::immediate(1)],
            json!({"vars": [reg_var("R0")], "xprs": [constant(1), constant(1)]}),
        )],
    );
    let lifted = lifter().lift_function(&record).unwrap();
    let ast = lifted.to_ast_record(AstLevel::High);
    assert_eq!(ast.startnode, lifted.high_root);
    assert!(ast.spans.iter().any(|s| s.id == lifted.high[0]));
    let text = serde_json::to_string(&ast).unwrap();
    let reparsed = AbstractSyntaxTree::from_json(&text).unwrap();
    assert_eq!(
        reparsed.to_c_like().unwrap(),
        lifted.to_c_like(AstLevel::High, ProvenanceMode::Optional).unwrap()
    );
}

#[test]
fn test_program_continues_past_failures() {
    let program = json!({
        "functions": [
            {
                "name": "first",
                "address": "0x400",
                "instructions": [
                    {"iaddr": "0x400", "bytestring": "b0fa80f0", "opcode": {"mnemonic": "CLZ", "operands": [
                        {"kind": "register", "name": "R0"}, {"kind": "register", "name": "R1"}
                    ]}}
                ]
            },
            {
                "name": "second",
                "address": 2048,
                "instructions": [
                    {"iaddr": "0x800", "bytestring": "0120", "opcode": {"mnemonic": "mov", "operands": [
                        {"kind": "register", "name": "r0"}, {"kind": "immediate", "value": 1}
                    ]}, "xdata": {"vars": [reg_var("R0")], "xprs": [constant(1), constant(1)]}}
                ]
            }
        ],
        "symbols": {"functions": [], "globals": []}
    });
    let (lifted, stats) = lift_program_json(&program.to_string(), LiftConfig::default()).unwrap();
    assert_eq!(lifted.len(), 2);
    assert_eq!(stats.successful_functions, 2);
    assert_eq!(stats.total_instructions, 2);
    assert_eq!(stats.unsupported_instructions, 1);
    assert_eq!(
        lifted[1].to_c_like(AstLevel::High, ProvenanceMode::Omit).unwrap(),
        "R0 = 1;"
    );
}

#[test]
fn test_stats_record_fatal_failures() {
    let ok = function("ok", Vec::new());
    let bad = function("bad", Vec::new());
    let mut stats = LiftStats::default();
    stats.record(&ok, &lifter().lift_function(&ok));
    stats.record(&bad, &Err(LiftError::not_found(42)));
    assert_eq!(stats.total_functions, 2);
    assert_eq!(stats.failed_functions, 1);
    assert_eq!(stats.failures[0].name, "bad");
    assert!(stats.failures[0].error.contains("node 42"));
    assert_eq!(
        stats.to_string(),
        "1 successful, 1 failed out of 2 functions (0 instructions, 0 unsupported, 0 unmapped)"
    );
}

#[test]
fn test_invalid_program_json() {
    assert!(lift_program_json("{\"functions\": 1}", LiftConfig::default()).is_err());
}
