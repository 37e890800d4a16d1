//! The Rill AST.
//!
//! This crate defines the tree the parser hands to the type checker. Every
//! node carries a stable `NodeId` and a source `Span`; all downstream
//! tables (inferred types, marks, holes, constraint stubs) key on the id.
//!
//! The parser itself lives elsewhere. `AstBuilder` is the construction
//! surface it uses, and doubles as the way tests write programs directly.

pub mod build;
pub mod expr;
pub mod item;
pub mod pat;
pub mod ty_expr;

pub use build::AstBuilder;
pub use expr::{Expr, ExprKind, Literal, MatchArm, Stmt};
pub use item::{
    AnnotateDecl, CtorDecl, DomainDecl, FieldDecl, LetDecl, OpClass, OpDecl, OpRuleDecl, Param,
    PolicyDecl, PolicyKind, Program, TopLevel, TypeDecl, TypeMember,
};
pub use pat::{Pattern, PatternKind};
pub use ty_expr::{TypeExpr, TypeExprKind};

use rill_common::NodeId;

/// Largest node id occurring anywhere in the program, or `None` for an
/// empty tree.
///
/// The type checker synthesises a handful of nodes of its own (parameter
/// lowering introduces fresh variables and wrapper matches); it seeds its
/// allocator past this value so synthesised ids never collide with parsed
/// ones.
pub fn max_node_id(program: &Program) -> Option<NodeId> {
    let mut max: Option<NodeId> = None;
    let mut note = |id: NodeId| {
        max = Some(match max {
            Some(m) if m >= id => m,
            _ => id,
        });
    };
    for decl in &program.declarations {
        walk_top_level(decl, &mut note);
    }
    max
}

fn walk_top_level(decl: &TopLevel, note: &mut dyn FnMut(NodeId)) {
    match decl {
        TopLevel::Let(l) => walk_let(l, note),
        TopLevel::Type(t) => {
            note(t.id);
            for member in &t.members {
                match member {
                    TypeMember::Ctor(c) => {
                        note(c.id);
                        for arg in &c.args {
                            walk_type_expr(arg, note);
                        }
                    }
                    TypeMember::Field(f) => {
                        note(f.id);
                        walk_type_expr(&f.ty, note);
                    }
                }
            }
            if let Some(alias) = &t.alias {
                walk_type_expr(alias, note);
            }
        }
        TopLevel::Infix(o) | TopLevel::Prefix(o) => note(o.id),
        TopLevel::Domain(d) => note(d.id),
        TopLevel::OpRule(r) => note(r.id),
        TopLevel::Policy(p) => note(p.id),
        TopLevel::Annotate(a) => note(a.id),
    }
}

fn walk_let(decl: &LetDecl, note: &mut dyn FnMut(NodeId)) {
    note(decl.id);
    for param in &decl.params {
        note(param.id);
        walk_pattern(&param.pattern, note);
        if let Some(ann) = &param.annotation {
            walk_type_expr(ann, note);
        }
    }
    if let Some(ann) = &decl.return_annotation {
        walk_type_expr(ann, note);
    }
    walk_expr(&decl.body, note);
}

fn walk_expr(expr: &Expr, note: &mut dyn FnMut(NodeId)) {
    note(expr.id);
    match &expr.kind {
        ExprKind::Ident(_) | ExprKind::Literal(_) | ExprKind::Hole => {}
        ExprKind::Ctor { args, .. } | ExprKind::Tuple(args) => {
            for a in args {
                walk_expr(a, note);
            }
        }
        ExprKind::RecordLit(fields) => {
            for (_, value) in fields {
                walk_expr(value, note);
            }
        }
        ExprKind::Projection { target, .. } => walk_expr(target, note),
        ExprKind::Call { callee, args } => {
            walk_expr(callee, note);
            for a in args {
                walk_expr(a, note);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, note);
            walk_expr(rhs, note);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, note),
        ExprKind::Arrow {
            params,
            return_annotation,
            body,
        } => {
            for param in params {
                note(param.id);
                walk_pattern(&param.pattern, note);
                if let Some(ann) = &param.annotation {
                    walk_type_expr(ann, note);
                }
            }
            if let Some(ann) = return_annotation {
                walk_type_expr(ann, note);
            }
            walk_expr(body, note);
        }
        ExprKind::Block { stmts, result } => {
            for stmt in stmts {
                match stmt {
                    Stmt::Let(l) => walk_let(l, note),
                    Stmt::Expr(e) => walk_expr(e, note),
                }
            }
            if let Some(result) = result {
                walk_expr(result, note);
            }
        }
        ExprKind::Match { scrutinees, arms } => {
            for s in scrutinees {
                walk_expr(s, note);
            }
            for arm in arms {
                note(arm.id);
                for p in &arm.patterns {
                    walk_pattern(p, note);
                }
                walk_expr(&arm.body, note);
            }
        }
        ExprKind::MatchFn { arms, .. } => {
            for arm in arms {
                note(arm.id);
                for p in &arm.patterns {
                    walk_pattern(p, note);
                }
                walk_expr(&arm.body, note);
            }
        }
        ExprKind::Annotated { value, annotation } => {
            walk_expr(value, note);
            walk_type_expr(annotation, note);
        }
    }
}

fn walk_pattern(pat: &Pattern, note: &mut dyn FnMut(NodeId)) {
    note(pat.id);
    match &pat.kind {
        PatternKind::Wildcard | PatternKind::Var(_) | PatternKind::Literal(_) => {}
        PatternKind::Tuple(elems) => {
            for p in elems {
                walk_pattern(p, note);
            }
        }
        PatternKind::Ctor { args, .. } => {
            for p in args {
                walk_pattern(p, note);
            }
        }
    }
}

fn walk_type_expr(te: &TypeExpr, note: &mut dyn FnMut(NodeId)) {
    note(te.id);
    match &te.kind {
        TypeExprKind::Name(_) | TypeExprKind::Var(_) | TypeExprKind::Hole => {}
        TypeExprKind::Apply { args, .. } | TypeExprKind::Tuple(args) => {
            for a in args {
                walk_type_expr(a, note);
            }
        }
        TypeExprKind::Func { from, to } => {
            walk_type_expr(from, note);
            walk_type_expr(to, note);
        }
        TypeExprKind::Record(fields) => {
            for (_, ty) in fields {
                walk_type_expr(ty, note);
            }
        }
        TypeExprKind::Row { cases, .. } => {
            for (_, payload) in cases {
                if let Some(p) = payload {
                    walk_type_expr(p, note);
                }
            }
        }
    }
}
