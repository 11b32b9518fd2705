//! Rendering of analyzer AST records

use chblift_core::config::ProvenanceMode;
use chblift_core::lifter::ast::operators::operator_text;
use chblift_core::lifter::ast::AbstractSyntaxTree;
use chblift_core::lifter::LiftError;
use serde_json::{json, Value};

fn tree(nodes: Value, startnode: i64, spans: Value) -> AbstractSyntaxTree {
    let record = json!({"nodes": nodes, "startnode": startnode, "spans": spans});
    AbstractSyntaxTree::from_json(&record.to_string()).unwrap()
}

/// `x` as lval 0, variable 1, varinfo 2.
fn x_lval() -> Vec<Value> {
    vec![
        json!({"id": 1, "tag": "var", "args": [2]}),
        json!({"id": 2, "tag": "varinfo", "args": [], "vname": "x"}),
        json!({"id": 0, "tag": "lval", "args": [1, -1]}),
    ]
}

fn assign_x(rhs: Vec<Value>, rhs_id: i64) -> AbstractSyntaxTree {
    let mut nodes = x_lval();
    nodes.extend(rhs);
    nodes.push(json!({"id": 3, "tag": "assign", "args": [0, rhs_id]}));
    tree(
        Value::Array(nodes),
        3,
        json!([{"id": 3, "spans": [{"base_va": "0x401000"}]}]),
    )
}

#[test]
fn test_assignment_with_span() {
    let ast = assign_x(vec![json!({"id": 4, "tag": "integer-constant", "args": [], "value": 7})], 4);
    assert_eq!(ast.to_c_like().unwrap(), "x = 7; // 3 (0x401000)");
    assert_eq!(ast.to_c_like_with(ProvenanceMode::Omit).unwrap(), "x = 7;");
}

#[test]
fn test_missing_span_policies() {
    let nodes = {
        let mut nodes = x_lval();
        nodes.push(json!({"id": 4, "tag": "integer-constant", "args": [], "value": 1}));
        nodes.push(json!({"id": 3, "tag": "assign", "args": [0, 4]}));
        Value::Array(nodes)
    };
    let ast = tree(nodes, 3, json!([]));
    assert_eq!(ast.to_c_like().unwrap(), "x = 1; // 3 (no span found)");
    match ast.to_c_like_with(ProvenanceMode::Required) {
        Err(LiftError::MissingSpan { id, .. }) => assert_eq!(id, 3),
        other => panic!("expected a missing span error, got {:?}", other),
    }
}

#[test]
fn test_integer_constants() {
    let cases = [(500, None, "500"), (5000, None, "0x1388"), (5000, Some("FOO"), "FOO"), (1000, None, "1000")];
    for (value, macroname, expected) in cases {
        let mut constant = json!({"id": 4, "tag": "integer-constant", "args": [], "value": value});
        if let Some(name) = macroname {
            constant["macroname"] = json!(name);
        }
        let ast = assign_x(vec![constant], 4);
        assert_eq!(ast.to_c_like_with(ProvenanceMode::Omit).unwrap(), format!("x = {};", expected));
    }
}

#[test]
fn test_textual_constant_value() {
    let ast = assign_x(vec![json!({"id": 4, "tag": "integer-constant", "args": [], "value": "0x10"})], 4);
    assert_eq!(ast.to_c_like_with(ProvenanceMode::Omit).unwrap(), "x = 16;");
}

#[test]
fn test_operator_table() {
    let expected = [
        ("and", " && "),
        ("bor", " | "),
        ("bxor", " ^ "),
        ("asr", " >> "),
        ("band", " & "),
        ("div", " / "),
        ("eq", " == "),
        ("ge", " >= "),
        ("gt", " > "),
        ("le", " <= "),
        ("lnot", " ! "),
        ("lor", " || "),
        ("lsl", " << "),
        ("lsr", " >> "),
        ("lt", " < "),
        ("mod", " % "),
        ("shiftlt", " << "),
        ("shiftrt", " >> "),
        ("minus", " - "),
        ("mult", " * "),
        ("ne", " != "),
        ("neq", " != "),
        ("plus", " + "),
        ("bnot", "~"),
        ("land", " && "),
        ("neg", "-"),
    ];
    for (tag, text) in expected {
        assert_eq!(operator_text(tag), Some(text), "operator {}", tag);
    }
}

#[test]
fn test_binary_and_unary_ops() {
    let ast = assign_x(
        vec![
            json!({"id": 4, "tag": "integer-constant", "args": [], "value": 2}),
            json!({"id": 5, "tag": "integer-constant", "args": [], "value": 3}),
            json!({"id": 6, "tag": "binary-op", "args": [4, 5], "op": "plus"}),
            json!({"id": 7, "tag": "unary-op", "args": [6], "op": "lnot"}),
        ],
        7,
    );
    assert_eq!(ast.to_c_like_with(ProvenanceMode::Omit).unwrap(), "x =  ! (2 + 3);");
}

#[test]
fn test_bitwise_not_and_negation() {
    let ast = assign_x(
        vec![
            json!({"id": 4, "tag": "integer-constant", "args": [], "value": 5}),
            json!({"id": 5, "tag": "unary-op", "args": [4], "op": "bnot"}),
            json!({"id": 6, "tag": "unary-op", "args": [5], "op": "neg"}),
        ],
        6,
    );
    assert_eq!(ast.to_c_like_with(ProvenanceMode::Omit).unwrap(), "x = -~5;");
}

#[test]
fn test_unknown_operator_fails_at_render_time() {
    let ast = assign_x(
        vec![
            json!({"id": 4, "tag": "integer-constant", "args": [], "value": 2}),
            json!({"id": 5, "tag": "binary-op", "args": [4, 4], "op": "pow"}),
        ],
        5,
    );
    match ast.to_c_like() {
        Err(LiftError::UnknownOperator { id, op, .. }) => {
            assert_eq!(id, 5);
            assert_eq!(op, "pow");
        }
        other => panic!("expected an unknown operator error, got {:?}", other),
    }
}

#[test]
fn test_missing_node_is_fatal() {
    let ast = assign_x(Vec::new(), 99);
    let err = ast.to_c_like().unwrap_err();
    assert_eq!(err, LiftError::NodeNotFound { id: 99 });
    assert!(err.is_fatal());
}

#[test]
fn test_unknown_tag_renders_generically() {
    let ast = tree(json!([{"id": 8, "tag": "goto", "args": [1, 2]}]), 8, json!([]));
    assert_eq!(ast.to_c_like().unwrap(), "8: goto[1, 2]");
}

#[test]
fn test_offset_chain() {
    let nodes = json!([
        {"id": 1, "tag": "var", "args": [2]},
        {"id": 2, "tag": "varinfo", "args": [], "vname": "s"},
        {"id": 5, "tag": "integer-constant", "args": [], "value": 3},
        {"id": 6, "tag": "index-offset", "args": [5, -1]},
        {"id": 7, "tag": "field-offset", "args": [6], "fname": "items"},
        {"id": 0, "tag": "lval", "args": [1, 7]},
        {"id": 8, "tag": "lval-expr", "args": [0]},
        {"id": 9, "tag": "assign", "args": [0, 8]}
    ]);
    let ast = tree(nodes, 9, json!([]));
    assert_eq!(ast.offset_chain_depth(0).unwrap(), 2);
    assert_eq!(ast.to_c_like_with(ProvenanceMode::Omit).unwrap(), "s.items[3] = s.items[3];");
}

#[test]
fn test_offset_cycle_is_detected() {
    let nodes = json!([
        {"id": 1, "tag": "var", "args": [2]},
        {"id": 2, "tag": "varinfo", "args": [], "vname": "s"},
        {"id": 5, "tag": "field-offset", "args": [6], "fname": "a"},
        {"id": 6, "tag": "field-offset", "args": [5], "fname": "b"},
        {"id": 0, "tag": "lval", "args": [1, 5]}
    ]);
    let ast = tree(nodes, 0, json!([]));
    assert!(matches!(ast.offset_chain_depth(0), Err(LiftError::OffsetCycle { .. })));
    assert!(matches!(ast.to_c_like(), Err(LiftError::OffsetCycle { .. })));
}

#[test]
fn test_memref_forms() {
    let nodes = json!([
        {"id": 1, "tag": "var", "args": [2]},
        {"id": 2, "tag": "varinfo", "args": [], "vname": "p"},
        {"id": 3, "tag": "lval", "args": [1, -1]},
        {"id": 4, "tag": "lval-expr", "args": [3]},
        {"id": 5, "tag": "memref", "args": [4]},
        {"id": 6, "tag": "field-offset", "args": [-1], "fname": "next"},
        {"id": 7, "tag": "lval", "args": [5, 6]},
        {"id": 8, "tag": "lval", "args": [5, -1]},
        {"id": 9, "tag": "lval-expr", "args": [8]},
        {"id": 10, "tag": "assign", "args": [7, 9]}
    ]);
    let ast = tree(nodes, 10, json!([]));
    assert_eq!(ast.to_c_like_with(ProvenanceMode::Omit).unwrap(), "p->next = *(p);");
}

#[test]
fn test_call_cast_and_address_of() {
    let nodes = json!([
        {"id": 1, "tag": "var", "args": [2]},
        {"id": 2, "tag": "varinfo", "args": [], "vname": "puts"},
        {"id": 3, "tag": "lval", "args": [1, -1]},
        {"id": 4, "tag": "lval-expr", "args": [3]},
        {"id": 5, "tag": "string-constant", "args": [], "cstr": "hi", "va": "0x8000"},
        {"id": 6, "tag": "cast-expr", "args": [5], "type": "int"},
        {"id": 7, "tag": "var", "args": [8]},
        {"id": 8, "tag": "varinfo", "args": [], "vname": "buf"},
        {"id": 9, "tag": "lval", "args": [7, -1]},
        {"id": 10, "tag": "address-of", "args": [9]},
        {"id": 11, "tag": "call", "args": [-1, 4, 6, 10]},
        {"id": 12, "tag": "instrs", "args": [11]}
    ]);
    let ast = tree(nodes, 12, json!([{"id": 11, "spans": [{"base_va": "0x100"}]}]));
    assert_eq!(ast.to_c_like().unwrap(), "puts((int)\"hi\", &buf); // 11 (0x100)");
}

#[test]
fn test_branch_indents_nested_statements() {
    let mut nodes = x_lval();
    nodes.extend([
        json!({"id": 4, "tag": "integer-constant", "args": [], "value": 1}),
        json!({"id": 5, "tag": "integer-constant", "args": [], "value": 2}),
        json!({"id": 6, "tag": "assign", "args": [0, 4]}),
        json!({"id": 7, "tag": "assign", "args": [0, 5]}),
        json!({"id": 8, "tag": "block", "args": [6]}),
        json!({"id": 9, "tag": "block", "args": [7]}),
        json!({"id": 10, "tag": "lval-expr", "args": [0]}),
        json!({"id": 11, "tag": "if", "args": [10, 8, 9]}),
    ]);
    let ast = tree(Value::Array(nodes), 11, json!([]));
    assert_eq!(
        ast.to_c_like_with(ProvenanceMode::Omit).unwrap(),
        "if (x){\n   x = 1;\n} else {\n   x = 2;\n}"
    );
}

#[test]
fn test_duplicate_ids_keep_first() {
    let nodes = json!([
        {"id": 1, "tag": "var", "args": [2]},
        {"id": 2, "tag": "varinfo", "args": [], "vname": "x"},
        {"id": 2, "tag": "varinfo", "args": [], "vname": "y"},
        {"id": 0, "tag": "lval", "args": [1, -1]}
    ]);
    let ast = tree(nodes, 0, json!([]));
    assert!(ast.cache().has_duplicates());
    assert_eq!(ast.to_c_like().unwrap(), "x");
    assert_eq!(ast.format_duplicates(), "\n2\n  varinfo []\n  varinfo []");
}

#[test]
fn test_record_round_trip() {
    let ast = assign_x(vec![json!({"id": 4, "tag": "integer-constant", "args": [], "value": 7})], 4);
    let text = serde_json::to_string(&ast.to_record()).unwrap();
    let reparsed = AbstractSyntaxTree::from_json(&text).unwrap();
    assert_eq!(reparsed.to_c_like().unwrap(), "x = 7; // 3 (0x401000)");
    assert_eq!(reparsed.cache().len(), 5);
}

#[test]
fn test_malformed_json_is_a_wire_error() {
    assert!(matches!(
        AbstractSyntaxTree::from_json("{\"nodes\": 3}"),
        Err(LiftError::WireFormat { .. })
    ));
}
