//! Opcode lifting tests

mod utils;

use chblift_core::config::LiftConfig;
use chblift_core::lifter::arm::condition::{condition_expr, condition_expr_for_tag};
use chblift_core::lifter::arm::{ConditionCode, InstructionRecord, Operand};
use chblift_core::lifter::ast::WireInt;
use chblift_core::lifter::builder::{AstBuilder, MemoryAccess};
use serde_json::{json, Value};
use utils::*;

fn absolute(address: i64) -> Operand {
    Operand::Absolute {
        address: WireInt::Number(address),
    }
}

#[test]
fn test_condition_code_table() {
    let mut builder = AstBuilder::default();
    let cases = [
        (ConditionCode::Eq, "(Z == 1)"),
        (ConditionCode::Ne, "(Z == 0)"),
        (ConditionCode::Ge, "(N == V)"),
        (ConditionCode::Lt, "(N != V)"),
        (ConditionCode::Gt, "((Z == 0) == (N == V))"),
        (ConditionCode::Le, "((Z == 1) || (N != V))"),
        (ConditionCode::Hi, "((C == 1) && (Z == 0))"),
        (ConditionCode::Al, "1"),
    ];
    for (cc, expected) in cases {
        let expr = condition_expr(&mut builder, cc);
        assert_eq!(builder.render(expr).unwrap(), expected, "{:?}", cc);
    }
}

#[test]
fn test_condition_tags() {
    let mut builder = AstBuilder::default();
    let ls = condition_expr_for_tag(&mut builder, "nuh").unwrap();
    assert_eq!(builder.render(ls).unwrap(), "((C == 0) || (Z == 1))");
    let always = condition_expr_for_tag(&mut builder, "unc").unwrap();
    assert_eq!(builder.render(always).unwrap(), "1");
    assert!(condition_expr_for_tag(&mut builder, "sometimes").is_none());
}

fn add_instr(addend: Operand, xxrn: Value, xxrm: Value, sum: Value) -> InstructionRecord {
    instr(
        "0x100",
        "ADD",
        vec![Operand::register("R0"), Operand::register("R1"), addend],
        json!({
            "vars": [reg_var("R0")],
            "xprs": [reg("R1"), xxrm.clone(), sum.clone(), sum, xxrn, xxrm]
        }),
    )
}

#[test]
fn test_add_scales_constant_by_pointee_size() {
    let mut builder = AstBuilder::default();
    let record = add_instr(
        Operand::immediate(8),
        typed_reg("R1", pointer_to(int_type())),
        constant(8),
        op("plus", vec![reg("R1"), constant(8)]),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.low), vec!["R0 = (R1 + 8);"]);
    assert_eq!(render_all(&builder, &pair.high), vec!["R0 = (R1 + 2);"]);
    assert_eq!(builder.provenance().low_level_of(pair.high[0]), &pair.low[..]);
}

#[test]
fn test_add_divides_runtime_addend() {
    let mut builder = AstBuilder::default();
    let record = add_instr(
        Operand::register("R2"),
        typed_reg("R1", pointer_to(int_type())),
        reg("R2"),
        op("plus", vec![reg("R1"), reg("R2")]),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["R0 = (R1 + (R2 / 4));"]);
}

#[test]
fn test_add_byte_pointer_is_unscaled() {
    let mut builder = AstBuilder::default();
    let byte = json!({"integer": {"signed": false, "size": 1}});
    let record = add_instr(
        Operand::immediate(8),
        typed_reg("R1", pointer_to(byte)),
        constant(8),
        op("plus", vec![reg("R1"), constant(8)]),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["R0 = (R1 + 8);"]);
}

#[test]
fn test_add_struct_field_address() {
    let mut builder = AstBuilder::default();
    let node = json!({"struct": {"name": "node", "size": 8, "fields": [
        {"name": "next", "type_info": pointer_to(int_type()), "offset": 0},
        {"name": "count", "type_info": int_type(), "offset": 4}
    ]}});
    let record = add_instr(
        Operand::immediate(4),
        typed_reg("R1", pointer_to(node)),
        constant(4),
        op("plus", vec![reg("R1"), constant(4)]),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["R0 = &R1->count;"]);
}

#[test]
fn test_add_of_stack_address() {
    let mut builder = AstBuilder::default();
    let record = add_instr(
        Operand::immediate(8),
        reg("SP"),
        constant(8),
        json!({"kind": "stack-address", "offset": -24}),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["R0 = &var_0024;"]);
}

fn sub_instr(xd: Value) -> InstructionRecord {
    instr(
        "0x104",
        "SUB",
        vec![Operand::register("R0"), Operand::register("R1"), Operand::register("R2")],
        xd,
    )
}

#[test]
fn test_fallback_tiers() {
    let cases = [
        (json!({"vars": [reg_var("R0")], "xprs": [reg("R1"), reg("R2"), constant(7), constant(6)], "cxprs": [constant(5)]}), "R0 = 5;"),
        (json!({"vars": [reg_var("R0")], "xprs": [reg("R1"), reg("R2"), constant(7), constant(6)]}), "R0 = 6;"),
        (json!({"vars": [reg_var("R0")], "xprs": [reg("R1"), reg("R2"), constant(7), null]}), "R0 = 7;"),
        (json!({"vars": [reg_var("R0")], "xprs": [null, null, null, null]}), "R0 = temp_0x104;"),
    ];
    for (xd, expected) in cases {
        let mut builder = AstBuilder::default();
        let pair = lift(&mut builder, &sub_instr(xd));
        assert_eq!(render_all(&builder, &pair.low), vec!["R0 = (R1 - R2);"]);
        assert_eq!(render_all(&builder, &pair.high), vec![expected]);
    }
}

#[test]
fn test_placeholder_is_reported() {
    let mut builder = AstBuilder::default();
    lift(&mut builder, &sub_instr(json!({"vars": [reg_var("R0")]})));
    assert!(builder
        .provenance()
        .diagnostics
        .iter()
        .any(|d| d == "0x104: SUB result replaced by placeholder"));
}

#[test]
fn test_missing_destination_is_low_level_only() {
    let mut builder = AstBuilder::default();
    let pair = lift(&mut builder, &sub_instr(json!({"vars": [null], "xprs": [reg("R1"), reg("R2"), constant(7)]})));
    assert!(pair.high.is_empty());
    assert_eq!(pair.low.len(), 1);
}

#[test]
fn test_move_and_its_span() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x108",
        "MOV",
        vec![Operand::register("R0"), Operand::immediate(5000)],
        json!({"vars": [reg_var("R0")], "xprs": [constant(5000), constant(5000)]}),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["R0 = 0x1388;"]);
    assert_eq!(builder.spanmap().get(pair.high[0]), Some("0x108"));
    assert_eq!(builder.spanmap().get(pair.low[0]), Some("0x108"));
    assert_eq!(builder.provenance().instr_addresses[&pair.high[0]], vec!["0x108".to_string()]);
}

#[test]
fn test_move_into_pc_is_a_return() {
    let mut builder = AstBuilder::default();
    let record = instr("0x10a", "MOV", vec![Operand::register("PC"), Operand::register("LR")], json!({}));
    assert!(lift(&mut builder, &record).is_empty());
}

fn push_r11_lr() -> InstructionRecord {
    instr(
        "0x200",
        "PUSH",
        vec![Operand::register_list(["R11", "LR"])],
        json!({
            "vars": [reg_var("SP"), stack_var(-8), stack_var(-4)],
            "xprs": [reg("SP"), initial("R11"), initial("LR"), op("minus", vec![initial("SP"), constant(8)])]
        }),
    )
}

#[test]
fn test_push_spills_callee_saved_registers() {
    let mut builder = AstBuilder::default();
    let pair = lift(&mut builder, &push_r11_lr());
    assert_eq!(
        render_all(&builder, &pair.low),
        vec!["*((SP - 8)) = R11;", "*((SP - 4)) = LR;", "SP = (SP - 8);"]
    );
    assert_eq!(
        render_all(&builder, &pair.high),
        vec!["var_0008 = R11_in;", "var_0004 = LR_in;", "SP = (SP_in - 8);"]
    );
    assert_eq!(
        builder.provenance().memory_accesses_at("0x200"),
        &[
            MemoryAccess::RegisterSpill {
                register: "R11".to_string(),
                location: "SP-8".to_string()
            },
            MemoryAccess::RegisterSpill {
                register: "LR".to_string(),
                location: "SP-4".to_string()
            },
        ]
    );
}

#[test]
fn test_trampoline_spills_are_low_level_only() {
    let mut builder = AstBuilder::default();
    let pair = lift_with(&mut builder, &push_r11_lr(), &LiftConfig::default(), true);
    assert_eq!(pair.low.len(), 3);
    assert_eq!(render_all(&builder, &pair.high), vec!["SP = (SP_in - 8);"]);
    assert!(builder.provenance().memory_accesses_at("0x200").iter().all(MemoryAccess::is_spill));

    let keep = LiftConfig {
        skip_trampoline_spills: false,
        ..LiftConfig::default()
    };
    let mut builder = AstBuilder::default();
    let pair = lift_with(&mut builder, &push_r11_lr(), &keep, true);
    assert_eq!(pair.high.len(), 3);
}

#[test]
fn test_store_of_other_value_is_generic() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x204",
        "PUSH",
        vec![Operand::register_list(["R11"])],
        json!({
            "vars": [reg_var("SP"), stack_var(-4)],
            "xprs": [reg("SP"), constant(0), op("minus", vec![initial("SP"), constant(4)])]
        }),
    );
    lift(&mut builder, &record);
    assert_eq!(
        builder.provenance().memory_accesses_at("0x204"),
        &[MemoryAccess::Generic {
            location: "SP-4".to_string(),
            write: true
        }]
    );
}

#[test]
fn test_pop_restores_and_returns() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x220",
        "POP",
        vec![Operand::register_list(["R11", "PC"])],
        json!({
            "vars": [reg_var("SP"), reg_var("R11"), reg_var("PC")],
            "xprs": [reg("SP"), initial("R11"), initial("LR"), null]
        }),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(
        render_all(&builder, &pair.low),
        vec!["R11 = *(SP);", "PC = *((SP + 4));", "SP = (SP + 8);"]
    );
    assert_eq!(render_all(&builder, &pair.high), vec!["R11 = R11_in;"]);
    let accesses = builder.provenance().memory_accesses_at("0x220");
    assert_eq!(accesses.len(), 1);
    assert!(accesses[0].is_restore());
}

#[test]
fn test_store_dual_with_missing_half() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x300",
        "STRD",
        vec![Operand::register("R2"), Operand::register("R3"), Operand::memory("R0", 8)],
        json!({
            "vars": [stack_var(-16), null],
            "xprs": [reg("R2"), null, reg("R3"), null, null, null]
        }),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(
        render_all(&builder, &pair.low),
        vec!["*((R0 + 8)) = R2;", "*(((R0 + 8) + 4)) = R3;"]
    );
    assert_eq!(render_all(&builder, &pair.high), vec!["var_0016 = R2;"]);
    assert_eq!(builder.provenance().instr_mapping.len(), 1);
}

fn strd_r4_r5() -> InstructionRecord {
    instr(
        "0x400",
        "STRD",
        vec![Operand::register("R4"), Operand::register("R5"), Operand::memory("SP", 0)],
        json!({
            "vars": [stack_var(-8), stack_var(-4)],
            "xprs": [reg("R4"), initial("R4"), reg("R5"), initial("R5"), null, null]
        }),
    )
}

#[test]
fn test_store_dual_spills_callee_saved_pair() {
    let mut builder = AstBuilder::default();
    let pair = lift(&mut builder, &strd_r4_r5());
    assert_eq!(render_all(&builder, &pair.low), vec!["*(SP) = R4;", "*((SP + 4)) = R5;"]);
    assert_eq!(
        render_all(&builder, &pair.high),
        vec!["var_0008 = R4_in;", "var_0004 = R5_in;"]
    );
    let accesses = builder.provenance().memory_accesses_at("0x400");
    assert_eq!(accesses.len(), 2, "one access per half");
    assert!(accesses.iter().all(MemoryAccess::is_spill));
}

#[test]
fn test_store_dual_spills_are_low_level_only_in_trampoline() {
    let mut builder = AstBuilder::default();
    let pair = lift_with(&mut builder, &strd_r4_r5(), &LiftConfig::default(), true);
    assert_eq!(pair.low.len(), 2);
    assert!(pair.high.is_empty());
    assert!(builder.provenance().instr_mapping.is_empty());
    assert!(builder.provenance().memory_accesses_at("0x400").iter().all(MemoryAccess::is_spill));
}

fn ldrd_r4_r5() -> InstructionRecord {
    instr(
        "0x480",
        "LDRD",
        vec![Operand::register("R4"), Operand::register("R5"), Operand::memory("SP", 0)],
        json!({
            "vars": [reg_var("R4"), reg_var("R5")],
            "xprs": [
                {"kind": "var", "var": stack_var(-8)}, initial("R4"),
                {"kind": "var", "var": stack_var(-4)}, initial("R5"),
                null, null
            ]
        }),
    )
}

#[test]
fn test_load_dual_restores_callee_saved_pair() {
    let mut builder = AstBuilder::default();
    let pair = lift(&mut builder, &ldrd_r4_r5());
    assert_eq!(render_all(&builder, &pair.low), vec!["R4 = *(SP);", "R5 = *((SP + 4));"]);
    assert_eq!(render_all(&builder, &pair.high), vec!["R4 = R4_in;", "R5 = R5_in;"]);
    let accesses = builder.provenance().memory_accesses_at("0x480");
    assert_eq!(accesses.len(), 2, "one access per half");
    assert!(accesses.iter().all(MemoryAccess::is_restore));

    let mut builder = AstBuilder::default();
    let pair = lift_with(&mut builder, &ldrd_r4_r5(), &LiftConfig::default(), true);
    assert_eq!(pair.low.len(), 2);
    assert!(pair.high.is_empty());
}

#[test]
fn test_load_dual_of_other_value_is_generic() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x4c0",
        "LDRD",
        vec![Operand::register("R4"), Operand::register("R5"), Operand::memory("R0", 0)],
        json!({
            "vars": [reg_var("R4"), reg_var("R5")],
            "xprs": [constant(1), constant(1), constant(2), constant(2), null, null]
        }),
    );
    let pair = lift_with(&mut builder, &record, &LiftConfig::default(), true);
    assert_eq!(render_all(&builder, &pair.high), vec!["R4 = 1;", "R5 = 2;"]);
    assert!(!builder
        .provenance()
        .memory_accesses_at("0x4c0")
        .iter()
        .any(|a| a.is_restore()));
}

#[test]
fn test_pop_with_lowercase_registers() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x240",
        "pop",
        vec![Operand::register_list(["r4", "pc"])],
        json!({
            "vars": [reg_var("SP"), reg_var("R4"), reg_var("PC")],
            "xprs": [reg("SP"), initial("R4"), initial("LR"), null]
        }),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(
        render_all(&builder, &pair.low),
        vec!["R4 = *(SP);", "PC = *((SP + 4));", "SP = (SP + 8);"]
    );
    assert_eq!(render_all(&builder, &pair.high), vec!["R4 = R4_in;"]);
}

fn call_symbols() -> AstBuilder {
    AstBuilder::new(symbols(json!({
        "functions": [
            {
                "address": 4096,
                "name": "compute",
                "return_type": int_type(),
                "parameters": [{"name": "a", "type_info": int_type()}]
            },
            {"address": 8192, "name": "reset", "return_type": "void"}
        ]
    })))
}

#[test]
fn test_call_with_used_return_value() {
    let mut builder = call_symbols();
    let record = instr(
        "0x108",
        "BL",
        vec![absolute(0x1000)],
        json!({
            "tags": ["call"],
            "vars": [reg_var("R0")],
            "xprs": [constant(3)],
            "defuses": [{"var": "R0", "uses": ["0x10c"]}],
            "call_target": {"kind": "app", "address": 4096}
        }),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.low), vec!["R0 = 0x1000(R0);"]);
    assert_eq!(render_all(&builder, &pair.high), vec!["rtn_0x108 = compute(3);"]);
    assert!(builder.provenance().return_value_intros.contains_key("0x108"));
}

#[test]
fn test_call_with_unused_return_value() {
    let mut builder = call_symbols();
    let record = instr(
        "0x108",
        "BL",
        vec![absolute(0x1000)],
        json!({
            "vars": [reg_var("R0")],
            "xprs": [constant(3)],
            "defuses": [{"var": "R0", "uses": []}],
            "call_target": {"kind": "app", "address": 4096}
        }),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["compute(3);"]);
    assert!(builder.provenance().return_value_intros.contains_key("0x108"));
}

#[test]
fn test_void_call() {
    let mut builder = call_symbols();
    let record = instr(
        "0x10c",
        "BL",
        vec![absolute(0x2000)],
        json!({"call_target": {"kind": "app", "address": "0x2000"}}),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.low), vec!["0x2000();"]);
    assert_eq!(render_all(&builder, &pair.high), vec!["reset();"]);
}

#[test]
fn test_call_through_library_stub() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x110",
        "BLX",
        vec![absolute(0x3000)],
        json!({
            "xprs": [{"kind": "string-ref", "address": 24576, "value": "hi"}],
            "call_target": {"kind": "stub", "name": "puts"}
        }),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["rtn_0x110 = puts(\"hi\");"]);
}

#[test]
fn test_direct_call_without_target_record_keeps_all_arguments() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x500",
        "BL",
        vec![absolute(0x3000)],
        json!({"vars": [reg_var("R0")], "xprs": [constant(1), constant(2)]}),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["rtn_0x500 = sub_3000(1, 2);"]);
}

#[test]
fn test_register_call_without_target_record_is_indirect() {
    let mut builder = AstBuilder::default();
    let record = instr(
        "0x504",
        "BLX",
        vec![Operand::register("R3")],
        json!({"vars": [reg_var("R0")], "xprs": [constant(1), reg("R3")]}),
    );
    let pair = lift(&mut builder, &record);
    assert_eq!(render_all(&builder, &pair.high), vec!["rtn_0x504 = R3(1);"]);
}
