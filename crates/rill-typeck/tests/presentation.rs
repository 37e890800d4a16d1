//! Tests for the presentation layer: node views, the span index,
//! span-attached diagnostics, and ariadne rendering.

use rill_ast::{AstBuilder, TopLevel};
use rill_common::Span;
use rill_typeck::present::{present_program, render_diagnostic, RenderOptions};
use rill_typeck::{check, Reason};

/// Test 1: every node of the remarked program has a view and a span
/// index entry.
#[test]
fn test_node_views_cover_program() {
    let mut b = AstBuilder::new();
    let x = b.ident("x");
    let body = b.body(x);
    let param = b.param_var("x");
    let decl = b.let_decl("id", vec![param], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    let presentation = present_program(&layer1, &layer2);
    assert!(!presentation.node_views.is_empty());
    assert_eq!(
        presentation.node_views.len(),
        presentation.span_index.len()
    );
}

/// Test 2: diagnostics pick up the span of their origin node.
#[test]
fn test_diagnostic_gets_span() {
    let source = "let main = () => { y }";
    let mut b = AstBuilder::new();
    let mut y = b.ident("y");
    y.span = Span::new(19, 20);
    let body = b.body(y);
    let arrow = b.arrow(vec![], body);
    let decl = b.let_decl("main", vec![], arrow);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    let presentation = present_program(&layer1, &layer2);
    let diag = presentation
        .diagnostics
        .iter()
        .find(|d| d.reason == Reason::FreeVariable)
        .expect("free variable diagnostic");
    assert_eq!(diag.span, Some(Span::new(19, 20)));

    let rendered = render_diagnostic(diag, source, "main.rl", &RenderOptions::colorless());
    assert!(rendered.contains("undefined variable: y"), "{}", rendered);
    assert!(rendered.contains("free_variable"), "{}", rendered);
}

/// Test 3: marked nodes carry their mark tag in the view.
#[test]
fn test_mark_tags_in_views() {
    let mut b = AstBuilder::new();
    let y = b.ident("y");
    let y_id = y.id;
    let body = b.body(y);
    let decl = b.let_decl("w", vec![], body);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (layer1, layer2) = check(&program);
    let presentation = present_program(&layer1, &layer2);
    let view = &presentation.node_views[&y_id];
    assert_eq!(view.mark.as_deref(), Some("free_var"));
    assert!(view.ty.starts_with('?'), "hole-typed view: {}", view.ty);
}

/// Test 4: display forms are stable.
#[test]
fn test_display_forms() {
    use rill_typeck::{Scheme, Ty, TyVar};

    let scheme = Scheme {
        vars: vec![TyVar(3), TyVar(9)],
        ty: Ty::func(
            Ty::Var(TyVar(3)),
            Ty::func(Ty::Var(TyVar(9)), Ty::Var(TyVar(3))),
        ),
    };
    insta::assert_snapshot!(scheme.to_string(), @"forall a b. a -> b -> a");

    let list = Ty::list(Ty::func(Ty::Int, Ty::Bool));
    insta::assert_snapshot!(list.to_string(), @"List<Int -> Bool>");

    let diag = rill_typeck::Diagnostic::new(rill_common::NodeId(7), Reason::TypeMismatch)
        .with("expected", "Int")
        .with("actual", "Bool");
    insta::assert_snapshot!(diag.to_string(), @r#"type_mismatch at #7 {actual: "Bool", expected: "Int"}"#);
}
