//! Integration tests for the deferred-constraint solver phases: field
//! projection, numeric/boolean with carrier splitting, and branch joins.

use rill_ast::{AstBuilder, TopLevel};
use rill_typeck::{check, Reason, SolverResult};

fn summary(layer2: &SolverResult, name: &str) -> String {
    layer2.summaries[name].to_string()
}

/// Test 1: projecting a declared record field resolves the deferred
/// projection type.
#[test]
fn test_projection_resolves() {
    let mut b = AstBuilder::new();
    let p = b.ident("p");
    let proj = b.project(p, "x");
    let body = b.body(proj);
    let int_te = b.te_name("Int");
    let rec = b.te_record(vec![("x", int_te)]);
    let param = b.param_ann("p", rec);
    let decl = b.let_decl("getx", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert!(layer2.diagnostics.is_empty());
    assert_eq!(summary(&layer2, "getx"), "{x: Int} -> Int");
}

/// Test 2: a missing field is a solver diagnostic.
#[test]
fn test_projection_missing_field() {
    let mut b = AstBuilder::new();
    let p = b.ident("p");
    let proj = b.project(p, "y");
    let proj_id = proj.id;
    let body = b.body(proj);
    let int_te = b.te_name("Int");
    let rec = b.te_record(vec![("x", int_te)]);
    let param = b.param_ann("p", rec);
    let decl = b.let_decl("gety", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (_layer1, layer2) = check(&program);
    assert!(layer2
        .diagnostics
        .iter()
        .any(|d| d.reason == Reason::MissingField && d.origin == proj_id));
}

/// Test 3: projecting a non-record is diagnosed as not-a-record.
#[test]
fn test_projection_not_record() {
    let mut b = AstBuilder::new();
    let p = b.ident("p");
    let proj = b.project(p, "x");
    let body = b.body(proj);
    let int_te = b.te_name("Int");
    let param = b.param_ann("p", int_te);
    let decl = b.let_decl("bad", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (_layer1, layer2) = check(&program);
    assert!(layer2
        .diagnostics
        .iter()
        .any(|d| d.reason == Reason::NotRecord));
}

/// Test 4: projecting off an unannotated parameter synthesises a
/// singleton record shape.
#[test]
fn test_projection_learns_record_shape() {
    let mut b = AstBuilder::new();
    let p = b.ident("p");
    let proj = b.project(p, "x");
    let body = b.body(proj);
    let param = b.param_var("p");
    let decl = b.let_decl("pull", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (_layer1, layer2) = check(&program);
    assert!(layer2.diagnostics.is_empty());
    assert_eq!(summary(&layer2, "pull"), "forall a. {x: a} -> a");
}

/// Test 5: record literals type structurally and project back out.
#[test]
fn test_record_literal_projection() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let lit = b.record(vec![("x", one), ("y", two)]);
    let proj = b.project(lit, "y");
    let decl = b.let_decl("v", vec![], proj);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert!(layer2.diagnostics.is_empty());
    assert_eq!(summary(&layer2, "v"), "Int");
}

/// Test 6: duplicate record fields are diagnosed.
#[test]
fn test_duplicate_record_field() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let lit = b.record(vec![("x", one), ("x", two)]);
    let decl = b.let_decl("v", vec![], lit);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::DuplicateRecordField));
}

/// Test 7: a carrier operand splits for arithmetic and the result is
/// rewrapped with the accumulated state.
#[test]
fn test_numeric_through_carrier() {
    let mut b = AstBuilder::new();
    let e = b.ident("e");
    let one = b.int(1);
    let plus = b.binary("+", e, one);
    let plus_id = plus.id;
    let body = b.body(plus);
    let int_te = b.te_name("Int");
    let row = b.te_row(vec![("io", None)], None);
    let carrier = b.te_apply("Eff", vec![int_te, row]);
    let param = b.param_ann("e", carrier);
    let decl = b.let_decl("bump", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(
        layer1.layer1_diagnostics.is_empty(),
        "carrier operands are not layer-1 errors: {:?}",
        layer1.layer1_diagnostics
    );
    assert_eq!(
        layer2.resolved_node_types[&plus_id].to_string(),
        "Eff<Int, {io}>"
    );
}

/// Test 8: comparisons stay Bool even over carrier operands.
#[test]
fn test_comparison_over_carrier() {
    let mut b = AstBuilder::new();
    let e = b.ident("e");
    let one = b.int(1);
    let cmp = b.binary("<", e, one);
    let cmp_id = cmp.id;
    let body = b.body(cmp);
    let int_te = b.te_name("Int");
    let row = b.te_row(vec![("io", None)], None);
    let carrier = b.te_apply("Eff", vec![int_te, row]);
    let param = b.param_ann("e", carrier);
    let decl = b.let_decl("check", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (_layer1, layer2) = check(&program);
    assert_eq!(layer2.resolved_node_types[&cmp_id], rill_typeck::Ty::Bool);
}

/// Test 9: a boolean operand that is not Bool is diagnosed by phase 3.
#[test]
fn test_not_boolean_operand() {
    let mut b = AstBuilder::new();
    let x = b.ident("x");
    let t = b.bool(true);
    let and = b.binary("&&", x, t);
    let body = b.body(and);
    let int_te = b.te_name("Int");
    let param = b.param_ann("x", int_te);
    let decl = b.let_decl("bad", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    // Layer 1 already marks the operand against the implementation's
    // parameter type.
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeMismatch));
}

/// Test 10: branch join unions carrier states across match arms.
#[test]
fn test_branch_join_unions_carrier_states() {
    let mut b = AstBuilder::new();
    let scrutinee = b.ident("flag");
    let pt = b.pat_bool(true);
    let a_ref = b.ident("a");
    let arm1 = b.arm1(pt, a_ref);
    let pf = b.pat_bool(false);
    let b_ref = b.ident("bb");
    let arm2 = b.arm1(pf, b_ref);
    let m = b.match_(vec![scrutinee], vec![arm1, arm2]);
    let match_id = m.id;

    let int1 = b.te_name("Int");
    let io_row = b.te_row(vec![("io", None)], None);
    let a_te = b.te_apply("Eff", vec![int1, io_row]);
    let pa = b.param_ann("a", a_te);

    let int2 = b.te_name("Int");
    let raise_row = b.te_row(vec![("raise", None)], None);
    let b_te = b.te_apply("Eff", vec![int2, raise_row]);
    let pb = b.param_ann("bb", b_te);

    let pflag = b.param_var("flag");
    let decl = b.let_decl("choose", vec![pa, pb, pflag], m);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(
        layer1.layer1_diagnostics.is_empty(),
        "carrier arms join by union: {:?}",
        layer1.layer1_diagnostics
    );
    assert_eq!(
        layer2.resolved_node_types[&match_id].to_string(),
        "Eff<Int, {io, raise}>"
    );
    assert_eq!(
        summary(&layer2, "choose"),
        "Eff<Int, {io}> -> Eff<Int, {raise}> -> Bool -> Eff<Int, {io, raise}>"
    );
}
