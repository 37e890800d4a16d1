//! Integration tests for match inference: pattern typing, coverage,
//! binding merges, and effect-row discharge.

use rill_ast::{AstBuilder, TopLevel};
use rill_typeck::stub::Stub;
use rill_typeck::{check, Reason, SolverResult};

fn summary(layer2: &SolverResult, name: &str) -> String {
    layer2.summaries[name].to_string()
}

/// Test 1: covering both boolean cases is exhaustive.
#[test]
fn test_bool_exhaustive() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("flag");
    let pt = b.pat_bool(true);
    let one = b.int(1);
    let arm1 = b.arm1(pt, one);
    let pf = b.pat_bool(false);
    let two = b.int(2);
    let arm2 = b.arm1(pf, two);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let param = b.param_var("flag");
    let decl = b.let_decl("pick", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert_eq!(summary(&layer2, "pick"), "Bool -> Int");
}

/// Test 2: a missing boolean case is diagnosed, not fatal.
#[test]
fn test_bool_non_exhaustive() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("flag");
    let pt = b.pat_bool(true);
    let one = b.int(1);
    let arm1 = b.arm1(pt, one);
    let m = b.match_(vec![scrutinee], vec![arm1]);
    let param = b.param_var("flag");
    let decl = b.let_decl("pick", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    let diag = layer1
        .layer1_diagnostics
        .iter()
        .find(|d| d.reason == Reason::NonExhaustiveMatch)
        .expect("non-exhaustive diagnostic");
    assert_eq!(
        diag.detail("missing").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
    // Still typed.
    assert_eq!(summary(&layer2, "pick"), "Bool -> Int");
}

/// Test 3: constructor coverage over the prelude list.
#[test]
fn test_list_exhaustive() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("xs");
    let nil = b.pat_ctor("Nil", vec![]);
    let zero = b.int(0);
    let arm1 = b.arm1(nil, zero);
    let head = b.pat_wild();
    let tail = b.pat_var("rest");
    let cons = b.pat_ctor("Cons", vec![head, tail]);
    let one = b.int(1);
    let arm2 = b.arm1(cons, one);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let param = b.param_var("xs");
    let decl = b.let_decl("peek", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(
        layer1.layer1_diagnostics.is_empty(),
        "diagnostics: {:?}",
        layer1.layer1_diagnostics
    );
    assert_eq!(summary(&layer2, "peek"), "forall a. List<a> -> Int");
}

/// Test 4: a wildcard arm suppresses the exhaustiveness complaint.
#[test]
fn test_wildcard_suppresses() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("xs");
    let nil = b.pat_ctor("Nil", vec![]);
    let zero = b.int(0);
    let arm1 = b.arm1(nil, zero);
    let wild = b.pat_wild();
    let one = b.int(1);
    let arm2 = b.arm1(wild, one);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let param = b.param_var("xs");
    let decl = b.let_decl("peek", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
}

/// Test 5: a variable bound twice in one arm marks the inner pattern
/// and keeps the first binding.
#[test]
fn test_duplicate_binding() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("xs");
    let first = b.pat_var("x");
    let second = b.pat_var("x");
    let cons = b.pat_ctor("Cons", vec![first, second]);
    let x_ref = b.ident("x");
    let arm1 = b.arm1(cons, x_ref);
    let wild = b.pat_wild();
    let nil = b.ctor("Nil", vec![]);
    let arm2 = b.arm1(wild, nil);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let param = b.param_var("xs");
    let decl = b.let_decl("dup", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::DuplicateBinding));
    assert!(!layer1.pattern_marks.is_empty() || !layer1.marks.is_empty());
}

/// Test 6: arm bodies that disagree mark the offending arm.
#[test]
fn test_branch_mismatch() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("flag");
    let pt = b.pat_bool(true);
    let one = b.int(1);
    let arm1 = b.arm1(pt, one);
    let pf = b.pat_bool(false);
    let t = b.bool(true);
    let bad_body_id = t.id;
    let arm2 = b.arm1(pf, t);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let param = b.param_var("flag");
    let decl = b.let_decl("pick", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1.marks.contains_key(&bad_body_id));
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::BranchMismatch && d.origin == bad_body_id));
}

/// Test 7: matching every label of a closed effect row without a
/// wildcard discharges the row.
#[test]
fn test_effect_row_discharge() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("e");
    let io = b.pat_ctor("io", vec![]);
    let zero = b.int(0);
    let arm1 = b.arm1(io, zero);
    let msg = b.pat_var("msg");
    let raise = b.pat_ctor("raise", vec![msg]);
    let one = b.int(1);
    let arm2 = b.arm1(raise, one);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let match_id = m.id;
    let string_te = b.te_name("String");
    let row = b.te_row(vec![("io", None), ("raise", Some(string_te))], None);
    let param = b.param_ann("e", row);
    let decl = b.let_decl("handle", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(
        layer1.layer1_diagnostics.is_empty(),
        "diagnostics: {:?}",
        layer1.layer1_diagnostics
    );
    let join = layer1
        .constraint_stubs
        .iter()
        .find_map(|s| match s {
            Stub::BranchJoin {
                origin,
                discharges_result,
                ..
            } if *origin == match_id => Some(*discharges_result),
            _ => None,
        })
        .expect("branch join stub for the match");
    assert!(join, "the match discharges the row");
    // The discharged result is not an effect carrier (it is plain Int).
    assert_eq!(
        layer2.resolved_node_types[&match_id].to_string(),
        "Int"
    );
    assert_eq!(
        summary(&layer2, "handle"),
        "{io, raise(String)} -> Int"
    );
}

/// Test 8: an open-tailed row cannot be discharged even with full
/// label coverage.
#[test]
fn test_open_row_no_discharge() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("e");
    let io = b.pat_ctor("io", vec![]);
    let zero = b.int(0);
    let arm1 = b.arm1(io, zero);
    let wild = b.pat_wild();
    let one = b.int(1);
    let arm2 = b.arm1(wild, one);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let match_id = m.id;
    let row = b.te_row(vec![("io", None)], Some("r"));
    let param = b.param_ann("e", row);
    let decl = b.let_decl("handle", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    let join = layer1
        .constraint_stubs
        .iter()
        .find_map(|s| match s {
            Stub::BranchJoin {
                origin,
                discharges_result,
                row_coverage,
                ..
            } if *origin == match_id => Some((*discharges_result, row_coverage.clone())),
            _ => None,
        })
        .expect("branch join stub for the match");
    assert!(!join.0, "open rows never discharge");
    assert!(join.1.expect("row coverage recorded").open_tail);
}

/// Test 9: uncovered row labels are diagnosed with the missing set.
#[test]
fn test_row_missing_label() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("e");
    let io = b.pat_ctor("io", vec![]);
    let zero = b.int(0);
    let arm1 = b.arm1(io, zero);
    let m = b.match_(vec![scrutinee], vec![arm1]);
    let string_te = b.te_name("String");
    let row = b.te_row(vec![("io", None), ("raise", Some(string_te))], None);
    let param = b.param_ann("e", row);
    let decl = b.let_decl("handle", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    let diag = layer1
        .layer1_diagnostics
        .iter()
        .find(|d| d.reason == Reason::NonExhaustiveMatch)
        .expect("missing-label diagnostic");
    let missing = diag.detail("missing").and_then(|v| v.as_array()).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].as_str(), Some("raise"));
}

/// Test 10: row label payloads bind in the arm body.
#[test]
fn test_row_payload_binding() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("e");
    let msg = b.pat_var("msg");
    let raise = b.pat_ctor("raise", vec![msg]);
    let msg_ref = b.ident("msg");
    let arm1 = b.arm1(raise, msg_ref);
    let wild = b.pat_wild();
    let fallback = b.string("ok");
    let arm2 = b.arm1(wild, fallback);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let string_te = b.te_name("String");
    let row = b.te_row(vec![("raise", Some(string_te))], None);
    let param = b.param_ann("e", row);
    let decl = b.let_decl("message", vec![param], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(
        layer1.layer1_diagnostics.is_empty(),
        "diagnostics: {:?}",
        layer1.layer1_diagnostics
    );
    assert_eq!(
        summary(&layer2, "message"),
        "{raise(String)} -> String"
    );
}
