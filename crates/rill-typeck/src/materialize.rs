//! Materialisation: lower the raw AST plus inference results into the
//! marked AST.
//!
//! Rules, in order: a recorded mark wins verbatim; otherwise children are
//! materialised recursively and the node gets its recorded type, falling
//! back to an `Incomplete` hole naming the node kind when inference never
//! recorded one. Match bundles consume (and delete) their entry in the
//! per-bundle match results so coverage metadata survives on the tree.

use rill_ast::{Expr, ExprKind, LetDecl, Param, Pattern, PatternKind, Program, Stmt, TopLevel, TypeExpr};
use rill_common::NodeId;

use crate::ctx::InferCtx;
use crate::mark::{
    MDecl, MExpr, MExprKind, MLetDecl, MMatchArm, MOpDecl, MParam, MPattern, MPatternKind,
    MProgram, MStmt, MTypeDecl, MTypeExpr, MTypeExprKind,
};
use crate::ty::{Provenance, Ty};

pub fn materialize_program(ctx: &mut InferCtx, program: &Program) -> MProgram {
    let mut declarations = Vec::new();
    for decl in &program.declarations {
        match decl {
            TopLevel::Let(l) => declarations.push(MDecl::Let(materialize_let(ctx, l))),
            TopLevel::Type(t) => {
                if let Some(mark) = ctx.decl_marks.get(&t.id) {
                    declarations.push(mark.clone());
                } else {
                    let ty = match ctx.adt.get(&t.name) {
                        Some(info) => Ty::ctor(
                            t.name.clone(),
                            info.params.iter().map(|v| Ty::Var(*v)).collect(),
                        ),
                        None => fallback_hole(ctx, t.id, "type_decl"),
                    };
                    declarations.push(MDecl::Type(MTypeDecl {
                        id: t.id,
                        span: t.span,
                        name: t.name.clone(),
                        ty,
                    }));
                }
            }
            TopLevel::Infix(o) | TopLevel::Prefix(o) => {
                declarations.push(MDecl::Op(MOpDecl {
                    id: o.id,
                    span: o.span,
                    op: o.op.clone(),
                    impl_name: o.impl_name.clone(),
                }));
            }
            // Label-rule declarations carry no types; the registry is
            // their materialised form.
            TopLevel::Domain(_)
            | TopLevel::OpRule(_)
            | TopLevel::Policy(_)
            | TopLevel::Annotate(_) => {}
        }
    }
    MProgram { declarations }
}

fn fallback_hole(ctx: &mut InferCtx, id: NodeId, reason: &str) -> Ty {
    let provenance = Provenance::Incomplete {
        reason: reason.to_string(),
    };
    ctx.register_hole(id, provenance.clone(), Vec::new());
    Ty::Hole(provenance)
}

fn node_ty(ctx: &mut InferCtx, id: NodeId, reason: &str) -> Ty {
    match ctx.node_types.get(&id) {
        Some(ty) => ty.clone(),
        None => fallback_hole(ctx, id, reason),
    }
}

fn materialize_let(ctx: &mut InferCtx, decl: &LetDecl) -> MLetDecl {
    let params = decl
        .params
        .iter()
        .map(|p| materialize_param(ctx, p))
        .collect();
    let body = materialize_expr(ctx, &decl.body);
    let ty = node_ty(ctx, decl.id, "let");
    let scheme = ctx.all_bindings.get(&decl.name).cloned();
    MLetDecl {
        id: decl.id,
        span: decl.span,
        name: decl.name.clone(),
        recursive: decl.recursive,
        params,
        body,
        ty,
        scheme,
    }
}

fn materialize_param(ctx: &mut InferCtx, param: &Param) -> MParam {
    let name = match param.pattern.as_var() {
        Some(name) => name.to_string(),
        None => "_".to_string(),
    };
    MParam {
        id: param.id,
        span: param.span,
        name,
        ty: node_ty(ctx, param.id, "param"),
    }
}

fn materialize_type_expr(ctx: &mut InferCtx, te: &TypeExpr) -> MTypeExpr {
    if let Some(mark) = ctx.type_expr_marks.get(&te.id) {
        return mark.clone();
    }
    MTypeExpr {
        id: te.id,
        span: te.span,
        ty: node_ty(ctx, te.id, "type_expr"),
        kind: MTypeExprKind::Resolved,
    }
}

fn materialize_pattern(ctx: &mut InferCtx, pat: &Pattern) -> MPattern {
    if let Some(mark) = ctx.pattern_marks.get(&pat.id) {
        return mark.clone();
    }
    let kind = match &pat.kind {
        PatternKind::Wildcard => MPatternKind::Wildcard,
        PatternKind::Var(name) => MPatternKind::Var(name.clone()),
        PatternKind::Literal(lit) => MPatternKind::Literal(lit.clone()),
        PatternKind::Tuple(elems) => MPatternKind::Tuple(
            elems
                .iter()
                .map(|p| materialize_pattern(ctx, p))
                .collect(),
        ),
        PatternKind::Ctor { name, args } => MPatternKind::Ctor {
            name: name.clone(),
            args: args.iter().map(|p| materialize_pattern(ctx, p)).collect(),
        },
    };
    MPattern {
        id: pat.id,
        span: pat.span,
        ty: node_ty(ctx, pat.id, "pattern"),
        kind,
    }
}

pub fn materialize_expr(ctx: &mut InferCtx, expr: &Expr) -> MExpr {
    if let Some(mark) = ctx.marks.get(&expr.id) {
        return mark.clone();
    }
    let kind = match &expr.kind {
        ExprKind::Ident(name) => MExprKind::Ident(name.clone()),
        ExprKind::Literal(lit) => MExprKind::Literal(lit.clone()),
        ExprKind::Ctor { name, args } => MExprKind::Ctor {
            name: name.clone(),
            args: args.iter().map(|a| materialize_expr(ctx, a)).collect(),
        },
        ExprKind::Tuple(elems) => {
            MExprKind::Tuple(elems.iter().map(|e| materialize_expr(ctx, e)).collect())
        }
        ExprKind::RecordLit(fields) => MExprKind::RecordLit(
            fields
                .iter()
                .map(|(n, e)| (n.clone(), materialize_expr(ctx, e)))
                .collect(),
        ),
        ExprKind::Projection { target, field } => MExprKind::Projection {
            target: Box::new(materialize_expr(ctx, target)),
            field: field.clone(),
        },
        ExprKind::Call { callee, args } => MExprKind::Call {
            callee: Box::new(materialize_expr(ctx, callee)),
            args: args.iter().map(|a| materialize_expr(ctx, a)).collect(),
        },
        ExprKind::Binary { op, lhs, rhs } => MExprKind::Binary {
            op: op.clone(),
            lhs: Box::new(materialize_expr(ctx, lhs)),
            rhs: Box::new(materialize_expr(ctx, rhs)),
        },
        ExprKind::Unary { op, operand } => MExprKind::Unary {
            op: op.clone(),
            operand: Box::new(materialize_expr(ctx, operand)),
        },
        ExprKind::Arrow { params, body, .. } => MExprKind::Arrow {
            params: params.iter().map(|p| materialize_param(ctx, p)).collect(),
            body: Box::new(materialize_expr(ctx, body)),
        },
        ExprKind::Block { stmts, result } => MExprKind::Block {
            stmts: stmts
                .iter()
                .map(|stmt| match stmt {
                    Stmt::Let(l) => MStmt::Let(materialize_let(ctx, l)),
                    Stmt::Expr(e) => MStmt::Expr(materialize_expr(ctx, e)),
                })
                .collect(),
            result: result
                .as_ref()
                .map(|r| Box::new(materialize_expr(ctx, r))),
        },
        ExprKind::Match { scrutinees, arms } => {
            let scrutinees = scrutinees
                .iter()
                .map(|s| materialize_expr(ctx, s))
                .collect();
            let arms = arms
                .iter()
                .map(|arm| MMatchArm {
                    id: arm.id,
                    span: arm.span,
                    patterns: arm
                        .patterns
                        .iter()
                        .map(|p| materialize_pattern(ctx, p))
                        .collect(),
                    body: materialize_expr(ctx, &arm.body),
                })
                .collect();
            // Consume the per-bundle entry; it lives on the tree now.
            let coverage = ctx.match_results.remove(&expr.id);
            MExprKind::Match {
                scrutinees,
                arms,
                coverage,
            }
        }
        ExprKind::MatchFn { .. } => MExprKind::MarkUnsupportedExpr {
            expr_kind: "match_fn".to_string(),
        },
        ExprKind::Annotated { value, annotation } => MExprKind::Annotated {
            value: Box::new(materialize_expr(ctx, value)),
            annotation: materialize_type_expr(ctx, annotation),
        },
        ExprKind::Hole => MExprKind::Hole,
    };
    MExpr {
        id: expr.id,
        span: expr.span,
        ty: node_ty(ctx, expr.id, &format!("expr.{}", expr.kind_name())),
        kind,
    }
}
