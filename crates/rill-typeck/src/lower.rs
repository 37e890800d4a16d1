//! Parameter lowering.
//!
//! Runs before inference and normalises every function so that each
//! parameter's pattern is a bare variable. A tuple or constructor
//! parameter becomes a fresh `__paramN` variable, and the body is wrapped
//! in a single-arm match on that variable against the original pattern.
//! `match_fn` bodies normalise to an arrow over fresh parameters matching
//! on them. Inference relies on this shape and never sees destructuring
//! parameters.
//!
//! Span discipline: the wrapper match inherits the body's span; the
//! temporary variable inherits the original pattern's span. The pass is
//! idempotent -- bare-variable parameters are left untouched.

use rill_ast::{
    Expr, ExprKind, LetDecl, MatchArm, Param, Pattern, PatternKind, Program, Stmt, TopLevel,
};
use rill_common::NodeAlloc;

/// Lower every function in the program.
pub fn lower_program(program: &Program, nodes: &mut NodeAlloc) -> Program {
    Program {
        imports: program.imports.clone(),
        reexports: program.reexports.clone(),
        declarations: program
            .declarations
            .iter()
            .map(|decl| match decl {
                TopLevel::Let(l) => TopLevel::Let(lower_let(l, nodes)),
                other => other.clone(),
            })
            .collect(),
    }
}

fn lower_let(decl: &LetDecl, nodes: &mut NodeAlloc) -> LetDecl {
    let body = lower_expr(&decl.body, nodes);
    let (params, body) = lower_params(&decl.params, body, nodes);
    LetDecl {
        id: decl.id,
        span: decl.span,
        name: decl.name.clone(),
        recursive: decl.recursive,
        params,
        return_annotation: decl.return_annotation.clone(),
        body,
    }
}

/// Rewrite a parameter list over an already-lowered body. Wrapping folds
/// right-to-left so the first parameter's match ends up outermost,
/// mirroring evaluation order.
fn lower_params(params: &[Param], body: Expr, nodes: &mut NodeAlloc) -> (Vec<Param>, Expr) {
    let mut lowered: Vec<Param> = Vec::with_capacity(params.len());
    let mut wraps: Vec<(String, Pattern)> = Vec::new();

    for (index, param) in params.iter().enumerate() {
        if param.pattern.as_var().is_some() || matches!(param.pattern.kind, PatternKind::Wildcard)
        {
            lowered.push(param.clone());
            continue;
        }
        let fresh_name = format!("__param{}", index);
        let var_pattern = Pattern {
            id: nodes.fresh(),
            span: param.pattern.span,
            kind: PatternKind::Var(fresh_name.clone()),
        };
        lowered.push(Param {
            id: param.id,
            span: param.span,
            pattern: var_pattern,
            annotation: param.annotation.clone(),
        });
        wraps.push((fresh_name, param.pattern.clone()));
    }

    let mut body = body;
    for (name, pattern) in wraps.into_iter().rev() {
        let pattern_span = pattern.span;
        let body_span = body.span;
        let scrutinee = Expr {
            id: nodes.fresh(),
            span: pattern_span,
            kind: ExprKind::Ident(name),
        };
        let arm = MatchArm {
            id: nodes.fresh(),
            span: body_span,
            patterns: vec![pattern],
            body,
        };
        body = Expr {
            id: nodes.fresh(),
            span: body_span,
            kind: ExprKind::Match {
                scrutinees: vec![scrutinee],
                arms: vec![arm],
            },
        };
    }

    (lowered, body)
}

fn lower_expr(expr: &Expr, nodes: &mut NodeAlloc) -> Expr {
    let kind = match &expr.kind {
        ExprKind::Ident(_) | ExprKind::Literal(_) | ExprKind::Hole => expr.kind.clone(),
        ExprKind::Ctor { name, args } => ExprKind::Ctor {
            name: name.clone(),
            args: args.iter().map(|a| lower_expr(a, nodes)).collect(),
        },
        ExprKind::Tuple(elems) => {
            ExprKind::Tuple(elems.iter().map(|e| lower_expr(e, nodes)).collect())
        }
        ExprKind::RecordLit(fields) => ExprKind::RecordLit(
            fields
                .iter()
                .map(|(n, e)| (n.clone(), lower_expr(e, nodes)))
                .collect(),
        ),
        ExprKind::Projection { target, field } => ExprKind::Projection {
            target: Box::new(lower_expr(target, nodes)),
            field: field.clone(),
        },
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee: Box::new(lower_expr(callee, nodes)),
            args: args.iter().map(|a| lower_expr(a, nodes)).collect(),
        },
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op: op.clone(),
            lhs: Box::new(lower_expr(lhs, nodes)),
            rhs: Box::new(lower_expr(rhs, nodes)),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: op.clone(),
            operand: Box::new(lower_expr(operand, nodes)),
        },
        ExprKind::Arrow {
            params,
            return_annotation,
            body,
        } => {
            let body = lower_expr(body, nodes);
            let (params, body) = lower_params(params, body, nodes);
            ExprKind::Arrow {
                params,
                return_annotation: return_annotation.clone(),
                body: Box::new(body),
            }
        }
        ExprKind::Block { stmts, result } => ExprKind::Block {
            stmts: stmts
                .iter()
                .map(|stmt| match stmt {
                    Stmt::Let(l) => Stmt::Let(lower_let(l, nodes)),
                    Stmt::Expr(e) => Stmt::Expr(lower_expr(e, nodes)),
                })
                .collect(),
            result: result.as_ref().map(|r| Box::new(lower_expr(r, nodes))),
        },
        ExprKind::Match { scrutinees, arms } => ExprKind::Match {
            scrutinees: scrutinees.iter().map(|s| lower_expr(s, nodes)).collect(),
            arms: arms.iter().map(|arm| lower_arm(arm, nodes)).collect(),
        },
        ExprKind::MatchFn { arity, arms } => {
            // `match_fn { arms }` becomes `(p0, ..) => match (p0, ..) { arms }`.
            // The arrow keeps the original node's id so stub origins and
            // recorded types stay attached to the source node.
            let arms: Vec<MatchArm> = arms.iter().map(|arm| lower_arm(arm, nodes)).collect();
            let mut params = Vec::with_capacity(*arity);
            let mut scrutinees = Vec::with_capacity(*arity);
            for index in 0..*arity {
                let name = format!("__param{}", index);
                let pattern = Pattern {
                    id: nodes.fresh(),
                    span: expr.span,
                    kind: PatternKind::Var(name.clone()),
                };
                params.push(Param {
                    id: nodes.fresh(),
                    span: expr.span,
                    pattern,
                    annotation: None,
                });
                scrutinees.push(Expr {
                    id: nodes.fresh(),
                    span: expr.span,
                    kind: ExprKind::Ident(name),
                });
            }
            let inner = Expr {
                id: nodes.fresh(),
                span: expr.span,
                kind: ExprKind::Match { scrutinees, arms },
            };
            ExprKind::Arrow {
                params,
                return_annotation: None,
                body: Box::new(inner),
            }
        }
        ExprKind::Annotated { value, annotation } => ExprKind::Annotated {
            value: Box::new(lower_expr(value, nodes)),
            annotation: annotation.clone(),
        },
    };
    Expr {
        id: expr.id,
        span: expr.span,
        kind,
    }
}

fn lower_arm(arm: &MatchArm, nodes: &mut NodeAlloc) -> MatchArm {
    MatchArm {
        id: arm.id,
        span: arm.span,
        patterns: arm.patterns.clone(),
        body: lower_expr(&arm.body, nodes),
    }
}
