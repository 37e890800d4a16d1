//! Integration tests for ADT declaration and constructor typing.
//!
//! These exercise:
//! - Two-pass registration (forward references, recursion)
//! - Constructor application at every arity
//! - Generic ADTs and instantiation at use sites
//! - Aliases (including record aliases and field projection)
//! - Declaration failures: duplicate names, duplicate constructors,
//!   invalid members -- all with staged rollback

use rill_ast::{AstBuilder, TopLevel, TypeMember};
use rill_typeck::{check, Reason, SolverResult};

fn summary(layer2: &SolverResult, name: &str) -> String {
    layer2.summaries[name].to_string()
}

/// Test 1: nullary constructors type at their ADT.
#[test]
fn test_nullary_constructor() {
    let mut b = AstBuilder::new();
    let red = b.ctor_decl("Red", vec![]);
    let green = b.ctor_decl("Green", vec![]);
    let blue = b.ctor_decl("Blue", vec![]);
    let color = b.type_sum("Color", vec![], vec![red, green, blue]);
    let use_red = b.ctor("Red", vec![]);
    let decl = b.let_decl("c", vec![], use_red);
    let program = b.program(vec![TopLevel::Type(color), TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert_eq!(summary(&layer2, "c"), "Color");
}

/// Test 2: positional constructor arguments unify with declared types.
#[test]
fn test_positional_constructor() {
    let mut b = AstBuilder::new();
    let int_te = b.te_name("Int");
    let circle = b.ctor_decl("Circle", vec![int_te]);
    let square_te = b.te_name("Int");
    let square = b.ctor_decl("Square", vec![square_te]);
    let shape = b.type_sum("Shape", vec![], vec![circle, square]);
    let five = b.int(5);
    let use_circle = b.ctor("Circle", vec![five]);
    let decl = b.let_decl("s", vec![], use_circle);
    let program = b.program(vec![TopLevel::Type(shape), TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert_eq!(summary(&layer2, "s"), "Shape");
}

/// Test 3: generic ADT constructors instantiate at the argument type.
#[test]
fn test_generic_constructor() {
    let mut b = AstBuilder::new();
    let none = b.ctor_decl("Nothing", vec![]);
    let a_te = b.te_var("a");
    let just = b.ctor_decl("Just", vec![a_te]);
    let opt = b.type_sum("Opt", vec!["a"], vec![none, just]);
    let n = b.int(42);
    let use_just = b.ctor("Just", vec![n]);
    let decl = b.let_decl("o", vec![], use_just);
    let program = b.program(vec![TopLevel::Type(opt), TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert_eq!(summary(&layer2, "o"), "Opt<Int>");
}

/// Test 4: the prelude list is a recursive generic ADT.
#[test]
fn test_prelude_list() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let nil = b.ctor("Nil", vec![]);
    let cons = b.ctor("Cons", vec![one, nil]);
    let decl = b.let_decl("xs", vec![], cons);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert_eq!(summary(&layer2, "xs"), "List<Int>");
}

/// Test 5: constructor argument mismatch marks the argument.
#[test]
fn test_constructor_arg_mismatch() {
    let mut b = AstBuilder::new();
    let int_te = b.te_name("Int");
    let circle = b.ctor_decl("Circle", vec![int_te]);
    let shape = b.type_sum("Shape", vec![], vec![circle]);
    let not_int = b.bool(true);
    let arg_id = not_int.id;
    let use_circle = b.ctor("Circle", vec![not_int]);
    let decl = b.let_decl("s", vec![], use_circle);
    let program = b.program(vec![TopLevel::Type(shape), TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1.marks.contains_key(&arg_id));
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeMismatch && d.origin == arg_id));
}

/// Test 6: under-application of a constructor is not-a-function.
#[test]
fn test_constructor_under_application() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let partial = b.ctor("Cons", vec![one]);
    let decl = b.let_decl("p", vec![], partial);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::NotFunction));
}

/// Test 7: over-application of a nullary constructor is not-a-function.
#[test]
fn test_constructor_over_application() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let over = b.ctor("Nil", vec![one]);
    let decl = b.let_decl("p", vec![], over);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::NotFunction));
}

/// Test 8: an unknown constructor marks as a free variable.
#[test]
fn test_unknown_constructor() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let unknown = b.ctor("Wat", vec![one]);
    let decl = b.let_decl("u", vec![], unknown);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::FreeVariable));
}

/// Test 9: a duplicate type name marks the second declaration and keeps
/// the first.
#[test]
fn test_duplicate_type_decl() {
    let mut b = AstBuilder::new();
    let a = b.ctor_decl("A", vec![]);
    let first = b.type_sum("Foo", vec![], vec![a]);
    let z = b.ctor_decl("Z", vec![]);
    let second = b.type_sum("Foo", vec![], vec![z]);
    let program = b.program(vec![TopLevel::Type(first), TopLevel::Type(second)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeDeclDuplicate));
    let foo = layer1.adt_env.get("Foo").expect("first Foo survives");
    assert_eq!(foo.ctors.len(), 1);
    assert_eq!(foo.ctors[0].name, "A");
}

/// Test 10: a constructor name clash across types rolls the whole
/// second declaration back.
#[test]
fn test_duplicate_constructor_rolls_back() {
    let mut b = AstBuilder::new();
    let x1 = b.ctor_decl("X", vec![]);
    let t1 = b.type_sum("T1", vec![], vec![x1]);
    let x2 = b.ctor_decl("X", vec![]);
    let y = b.ctor_decl("Y", vec![]);
    let t2 = b.type_sum("T2", vec![], vec![x2, y]);
    let program = b.program(vec![TopLevel::Type(t1), TopLevel::Type(t2)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeDeclInvalidMember));
    assert!(layer1.adt_env.get("T1").is_some());
    assert!(layer1.adt_env.get("T2").is_none(), "T2 was rolled back");
    assert!(layer1.adt_env.ctor("Y").is_none(), "staged Y was released");
}

/// Test 11: a field member inside a sum declaration is invalid.
#[test]
fn test_field_member_in_sum_is_invalid() {
    let mut b = AstBuilder::new();
    let a = b.ctor_decl("A", vec![]);
    let int_te = b.te_name("Int");
    let field = b.field_decl("x", int_te);
    let bad = b.type_decl_raw(
        "Bad",
        vec![],
        vec![TypeMember::Ctor(a), TypeMember::Field(field)],
        None,
    );
    let program = b.program(vec![TopLevel::Type(bad)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeDeclInvalidMember));
    assert!(layer1.adt_env.get("Bad").is_none());
}

/// Test 12: aliases expand in annotations.
#[test]
fn test_alias_expands() {
    let mut b = AstBuilder::new();
    let int1 = b.te_name("Int");
    let int2 = b.te_name("Int");
    let pair_body = b.te_tuple(vec![int1, int2]);
    let alias = b.type_alias("IntPair", vec![], pair_body);
    let p = b.ident("p");
    let body = b.body(p);
    let ann = b.te_name("IntPair");
    let param = b.param_ann("p", ann);
    let decl = b.let_decl("through", vec![param], body);
    let program = b.program(vec![TopLevel::Type(alias), TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert_eq!(summary(&layer2, "through"), "(Int, Int) -> (Int, Int)");
}

/// Test 13: a record alias declares fields and a record-form
/// constructor named after the type.
#[test]
fn test_record_alias() {
    let mut b = AstBuilder::new();
    let xt = b.te_name("Int");
    let yt = b.te_name("Int");
    let body = b.te_record(vec![("x", xt), ("y", yt)]);
    let point = b.type_alias("Point", vec![], body);

    let one = b.int(1);
    let two = b.int(2);
    let mk = b.ctor("Point", vec![one, two]);
    let decl = b.let_decl("origin", vec![], mk);

    let program = b.program(vec![TopLevel::Type(point), TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    assert!(
        layer1.layer1_diagnostics.is_empty(),
        "diagnostics: {:?}",
        layer1.layer1_diagnostics
    );
    assert_eq!(summary(&layer2, "origin"), "Point");
    let info = layer1.adt_env.get("Point").unwrap();
    assert_eq!(
        info.record_fields.as_ref().map(|f| f.len()),
        Some(2),
        "record fields registered"
    );
}

/// Test 13b: a cyclic alias is rejected at registration instead of
/// looping in unification.
#[test]
fn test_cyclic_alias_rejected() {
    let mut b = AstBuilder::new();
    let self_ref = b.te_name("Loop");
    let decl = b.type_alias("Loop", vec![], self_ref);
    let program = b.program(vec![TopLevel::Type(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeDeclInvalidMember));
    assert!(layer1.adt_env.get("Loop").is_none());
}

/// Test 14: applying a type name at the wrong arity marks the type
/// expression.
#[test]
fn test_type_expr_arity() {
    let mut b = AstBuilder::new();
    let a_te = b.te_var("a");
    let just = b.ctor_decl("Just2", vec![a_te]);
    let opt = b.type_sum("Opt2", vec!["a"], vec![just]);
    let x = b.ident("x");
    let body = b.body(x);
    let bare = b.te_name("Opt2");
    let param = b.param_ann("x", bare);
    let decl = b.let_decl("f", vec![param], body);
    let program = b.program(vec![TopLevel::Type(opt), TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeExprArity));
    assert!(!layer1.type_expr_marks.is_empty());
}

/// Test 15: an unknown type name marks the type expression.
#[test]
fn test_type_expr_unknown() {
    let mut b = AstBuilder::new();
    let x = b.ident("x");
    let body = b.body(x);
    let ann = b.te_name("Wat");
    let param = b.param_ann("x", ann);
    let decl = b.let_decl("f", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, _layer2) = check(&program);
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::TypeExprUnknown));
}
