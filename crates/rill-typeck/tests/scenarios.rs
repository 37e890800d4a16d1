//! End-to-end scenarios and cross-cutting properties of the two-layer
//! pipeline.

use rill_ast::{AstBuilder, Program, TopLevel};
use rill_typeck::mark::for_each_node;
use rill_typeck::{check, HoleSolution, Reason, SolverResult};

fn summary(layer2: &SolverResult, name: &str) -> String {
    layer2.summaries[name].to_string()
}

/// Scenario 1: identity applied to a user constructor.
///
/// `type Bool2 = True2 | False2; let id = (x) => { x };
/// let main = () => { id(True2) }`
#[test]
fn test_scenario_identity_over_adt() {
    let mut b = AstBuilder::new();
    let t = b.ctor_decl("True2", vec![]);
    let f = b.ctor_decl("False2", vec![]);
    let bool2 = b.type_sum("Bool2", vec![], vec![t, f]);

    let x = b.ident("x");
    let id_body = b.body(x);
    let px = b.param_var("x");
    let id = b.let_decl("id", vec![px], id_body);

    let id_ref = b.ident("id");
    let true2 = b.ctor("True2", vec![]);
    let call = b.call(id_ref, vec![true2]);
    let main_body = b.body(call);
    let arrow = b.arrow(vec![], main_body);
    let main = b.let_decl("main", vec![], arrow);

    let program = b.program(vec![
        TopLevel::Type(bool2),
        TopLevel::Let(id),
        TopLevel::Let(main),
    ]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert!(layer2.diagnostics.is_empty());
    assert_eq!(summary(&layer2, "id"), "forall a. a -> a");
    assert_eq!(summary(&layer2, "main"), "Unit -> Bool2");
}

/// Scenario 2: calling an Int function with a Bool marks the argument.
///
/// `let f = (x) => { x + 1 }; let bad = () => { f(true) }`
#[test]
fn test_scenario_bad_argument() {
    let mut b = AstBuilder::new();
    let x = b.ident("x");
    let one = b.int(1);
    let plus = b.binary("+", x, one);
    let f_body = b.body(plus);
    let px = b.param_var("x");
    let f = b.let_decl("f", vec![px], f_body);

    let f_ref = b.ident("f");
    let t = b.bool(true);
    let arg_id = t.id;
    let call = b.call(f_ref, vec![t]);
    let bad_body = b.body(call);
    let arrow = b.arrow(vec![], bad_body);
    let bad = b.let_decl("bad", vec![], arrow);

    let program = b.program(vec![TopLevel::Let(f), TopLevel::Let(bad)]);
    let (layer1, layer2) = check(&program);

    assert_eq!(summary(&layer2, "f"), "Int -> Int");
    let mark = layer1.marks.get(&arg_id).expect("the argument is marked");
    assert!(mark.ty.is_hole());
    let diag = layer1
        .layer1_diagnostics
        .iter()
        .find(|d| d.reason == Reason::TypeMismatch && d.origin == arg_id)
        .expect("type_mismatch at the argument");
    assert_eq!(diag.detail("expected").and_then(|v| v.as_str()), Some("Int"));
    assert_eq!(diag.detail("actual").and_then(|v| v.as_str()), Some("Bool"));
}

/// Scenario 3: recursive list length over the prelude list.
///
/// `let rec len = (xs) => match xs { Nil => 0, Cons(_, r) => 1 + len(r) }`
#[test]
fn test_scenario_list_length() {
    let mut b = AstBuilder::new();
    let xs = b.ident("xs");
    let nil = b.pat_ctor("Nil", vec![]);
    let zero = b.int(0);
    let arm1 = b.arm1(nil, zero);
    let head = b.pat_wild();
    let rest = b.pat_var("r");
    let cons = b.pat_ctor("Cons", vec![head, rest]);
    let one = b.int(1);
    let len_ref = b.ident("len");
    let r_ref = b.ident("r");
    let rec_call = b.call(len_ref, vec![r_ref]);
    let plus = b.binary("+", one, rec_call);
    let arm2 = b.arm1(cons, plus);
    let m = b.match_(vec![xs], vec![arm1, arm2]);
    let pxs = b.param_var("xs");
    let len = b.let_rec("len", vec![pxs], m);

    let program = b.program(vec![TopLevel::Let(len)]);
    let (layer1, layer2) = check(&program);
    assert!(
        layer1.layer1_diagnostics.is_empty(),
        "diagnostics: {:?}",
        layer1.layer1_diagnostics
    );
    assert!(layer2.diagnostics.is_empty());
    assert_eq!(summary(&layer2, "len"), "forall a. List<a> -> Int");
}

/// Scenario 4: a missing constructor case is reported with its name.
///
/// `type Shape = Circle(Int) | Square(Int);
/// let area = (s) => match s { Circle(r) => r }`
#[test]
fn test_scenario_non_exhaustive_shape() {
    let mut b = AstBuilder::new();
    let c_arg = b.te_name("Int");
    let circle = b.ctor_decl("Circle", vec![c_arg]);
    let s_arg = b.te_name("Int");
    let square = b.ctor_decl("Square", vec![s_arg]);
    let shape = b.type_sum("Shape", vec![], vec![circle, square]);

    let s = b.ident("s");
    let r = b.pat_var("r");
    let circle_pat = b.pat_ctor("Circle", vec![r]);
    let r_ref = b.ident("r");
    let arm = b.arm1(circle_pat, r_ref);
    let m = b.match_(vec![s], vec![arm]);
    let match_id = m.id;
    let ps = b.param_var("s");
    let area = b.let_decl("area", vec![ps], m);

    let program = b.program(vec![TopLevel::Type(shape), TopLevel::Let(area)]);
    let (layer1, layer2) = check(&program);

    let diag = layer1
        .layer1_diagnostics
        .iter()
        .find(|d| d.reason == Reason::NonExhaustiveMatch && d.origin == match_id)
        .expect("non-exhaustive diagnostic at the match");
    let missing = diag.detail("missing").and_then(|v| v.as_array()).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].as_str(), Some("Square"));
    // The match is annotated, not replaced: it still types.
    assert_eq!(summary(&layer2, "area"), "Shape -> Int");
}

/// Scenario 5: monomorphic self-application trips the occurs check and
/// leaves the enclosing function typed by a hole.
///
/// `let g = (f) => { f(f) }`
#[test]
fn test_scenario_self_application() {
    let mut b = AstBuilder::new();
    let callee = b.ident("f");
    let arg = b.ident("f");
    let call = b.call(callee, vec![arg]);
    let call_id = call.id;
    let body = b.body(call);
    let pf = b.param_var("f");
    let g = b.let_decl("g", vec![pf], body);
    let program = b.program(vec![TopLevel::Let(g)]);
    let (layer1, layer2) = check(&program);

    assert!(layer1.marks.contains_key(&call_id));
    assert!(layer1
        .layer1_diagnostics
        .iter()
        .any(|d| d.reason == Reason::OccursCycle));
    // g's result is a hole.
    assert!(layer1.node_types[&call_id].is_hole());
    assert!(layer2.summaries.contains_key("g"));
}

/// Scenario 6: destructuring parameters lower to a fresh variable plus
/// a single-arm match, and the function types as if written directly.
///
/// `let p = ((x, y)) => x + y; let r = () => { p((1, 2)) }`
#[test]
fn test_scenario_param_lowering() {
    let mut b = AstBuilder::new();
    let x_pat = b.pat_var("x");
    let y_pat = b.pat_var("y");
    let tuple_pat = b.pat_tuple(vec![x_pat, y_pat]);
    let param = b.param(tuple_pat);
    let x_ref = b.ident("x");
    let y_ref = b.ident("y");
    let sum = b.binary("+", x_ref, y_ref);
    let p = b.let_decl("p", vec![param], sum);

    let p_ref = b.ident("p");
    let one = b.int(1);
    let two = b.int(2);
    let pair = b.tuple(vec![one, two]);
    let call = b.call(p_ref, vec![pair]);
    let r_body = b.body(call);
    let arrow = b.arrow(vec![], r_body);
    let r = b.let_decl("r", vec![], arrow);

    let program = b.program(vec![TopLevel::Let(p), TopLevel::Let(r)]);
    let (layer1, layer2) = check(&program);
    assert!(layer1.layer1_diagnostics.is_empty());
    assert_eq!(summary(&layer2, "p"), "(Int, Int) -> Int");
    assert_eq!(summary(&layer2, "r"), "Unit -> Int");
}

// ── Properties ─────────────────────────────────────────────────────────

fn weird_programs() -> Vec<Program> {
    let mut programs = Vec::new();

    // Empty program.
    let mut b = AstBuilder::new();
    programs.push(b.program(vec![]));

    // Free variables everywhere.
    let mut b = AstBuilder::new();
    let a = b.ident("nope");
    let c = b.ident("nada");
    let call = b.call(a, vec![c]);
    let decl = b.let_decl("w", vec![], call);
    programs.push(b.program(vec![TopLevel::Let(decl)]));

    // Self-application plus unknown constructors plus bad arithmetic.
    let mut b = AstBuilder::new();
    let f1 = b.ident("f");
    let f2 = b.ident("f");
    let call = b.call(f1, vec![f2]);
    let wat = b.ctor("Wat", vec![call]);
    let t = b.bool(true);
    let plus = b.binary("+", wat, t);
    let pf = b.param_var("f");
    let decl = b.let_decl("w", vec![pf], plus);
    programs.push(b.program(vec![TopLevel::Let(decl)]));

    programs
}

/// P1: the pipeline is total -- it returns for every input.
#[test]
fn test_p1_never_throws() {
    for program in weird_programs() {
        let (layer1, layer2) = check(&program);
        // Both layers produced full results.
        let _ = layer1.marked_program;
        let _ = layer2.remarked_program;
    }
}

/// P2: hole-free resolved types are fixed points of the final
/// substitution.
#[test]
fn test_p2_resolved_types_are_fixed_points() {
    for program in weird_programs() {
        let (_layer1, layer2) = check(&program);
        for ty in layer2.resolved_node_types.values() {
            if !ty.contains_hole() {
                assert_eq!(&layer2.substitution.apply(ty), ty);
            }
        }
    }
}

/// P3: solved holes are hole-free transitively.
#[test]
fn test_p3_solved_holes_are_concrete() {
    let mut b = AstBuilder::new();
    let hole = b.hole();
    let int_te = b.te_name("Int");
    let decl = b.let_ann("h", vec![], int_te, hole);
    let program = b.program(vec![TopLevel::Let(decl)]);
    let (_layer1, layer2) = check(&program);
    for solution in layer2.solutions.values() {
        if let HoleSolution::Solved { ty, .. } = solution {
            assert!(!ty.contains_hole());
        }
    }
}

/// P7: marks emitted by layer 1 survive solving.
#[test]
fn test_p7_marks_survive_solving() {
    for program in weird_programs() {
        let (layer1, layer2) = check(&program);
        let mut still_marked = std::collections::HashSet::new();
        for_each_node(&layer2.remarked_program, &mut |meta| {
            if meta.mark.is_some() {
                still_marked.insert(meta.id);
            }
        });
        for id in layer1.marks.keys() {
            assert!(
                still_marked.contains(id),
                "mark at {} was dropped by the solver",
                id
            );
        }
    }
}

/// Counters are per-context: typing the same unit twice in one process
/// gives identical results.
#[test]
fn test_unit_independence() {
    let build = || {
        let mut b = AstBuilder::new();
        let x = b.ident("x");
        let body = b.body(x);
        let px = b.param_var("x");
        let decl = b.let_decl("id", vec![px], body);
        b.program(vec![TopLevel::Let(decl)])
    };
    let (_l1a, l2a) = check(&build());
    let (_l1b, l2b) = check(&build());
    assert_eq!(
        l2a.summaries["id"].to_string(),
        l2b.summaries["id"].to_string()
    );
    assert_eq!(l2a.summaries["id"], l2b.summaries["id"]);
}

/// Exported summaries are normalized: quantifiers are dense from zero,
/// independent of how many variables inference allocated.
#[test]
fn test_summaries_are_normalized() {
    let mut b = AstBuilder::new();
    // Pad the variable counter with a few unrelated declarations first.
    let n1 = b.int(1);
    let d1 = b.let_decl("a", vec![], n1);
    let n2 = b.int(2);
    let d2 = b.let_decl("c", vec![], n2);
    let x = b.ident("x");
    let body = b.body(x);
    let px = b.param_var("x");
    let id = b.let_decl("id", vec![px], body);
    let program = b.program(vec![
        TopLevel::Let(d1),
        TopLevel::Let(d2),
        TopLevel::Let(id),
    ]);
    let (_layer1, layer2) = check(&program);
    let scheme = &layer2.summaries["id"];
    assert_eq!(scheme.vars, vec![rill_typeck::TyVar(0)]);
}
