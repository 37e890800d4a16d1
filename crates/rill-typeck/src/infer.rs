//! Layer 1: inference and marking.
//!
//! Walks the lowered AST, synthesises types, and never fails: every local
//! contradiction replaces the offending node with a mark whose type is a
//! provenance-tagged hole, appends a diagnostic, and keeps going. Deferred
//! obligations (calls, projections, branch joins, numeric/boolean
//! operators, constraint labels) are emitted as stubs for Layer 2.

use std::collections::BTreeSet;

use rill_ast::{
    Expr, ExprKind, LetDecl, Literal, MatchArm, Pattern, PatternKind, Program, Stmt, TopLevel,
};
use rill_common::{NodeId, Span};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::builtins;
use crate::ctx::{InferCtx, OperatorInfo};
use crate::decl::{self, translate_type_expr, TypeVarScope};
use crate::domain::{AnnotationRule, OpRule, PolicyRule};
use crate::error::{Diagnostic, Reason};
use crate::flow::union_rows;
use crate::lower::lower_program;
use crate::mark::{MExpr, MExprKind, MPattern, MPatternKind, MProgram, MTypeExpr, MatchCoverage};
use crate::materialize;
use crate::stub::{Label, RowCoverage, Stub};
use crate::ty::{HoleId, Provenance, Scheme, Ty, UnknownInfo};
use crate::unify::{Subst, UnifyError};
use rill_ast::PolicyKind;

/// Options for one `infer_program` run.
#[derive(Clone, Debug, Default)]
pub struct InferOptions {
    /// Extra bindings installed before the program is typed (module
    /// imports resolve to these).
    pub initial_env: Vec<(String, Scheme)>,
    /// Pre-registered ADT environment (imported types).
    pub initial_adt_env: Option<crate::adt::AdtEnv>,
    /// Start from a bare context without the prelude. Off by default.
    pub skip_prelude: bool,
    /// Source text, carried through for the presentation layer.
    pub source: Option<String>,
}

/// Everything Layer 1 produces.
#[derive(Clone, Debug)]
pub struct InferResult {
    /// Final top-level environment.
    pub env: FxHashMap<String, Scheme>,
    pub adt_env: crate::adt::AdtEnv,
    /// Exported top-level schemes.
    pub summaries: FxHashMap<String, Scheme>,
    /// Every binding ever introduced (for the LSP).
    pub all_bindings: FxHashMap<String, Scheme>,
    pub marked_program: MProgram,
    pub marks: FxHashMap<NodeId, MExpr>,
    pub pattern_marks: FxHashMap<NodeId, MPattern>,
    pub type_expr_marks: FxHashMap<NodeId, MTypeExpr>,
    pub holes: FxHashMap<HoleId, UnknownInfo>,
    pub constraint_stubs: Vec<Stub>,
    /// Raw recorded type per node, pre-solver.
    pub node_types: FxHashMap<NodeId, Ty>,
    pub layer1_diagnostics: Vec<Diagnostic>,
    /// The substitution as it stood when inference finished; the solver
    /// continues extending it.
    pub substitution: Subst,
    /// Type variables allocated so far; the solver resumes after this.
    pub var_counter: u32,
    pub source: Option<String>,
}

/// Infer a whole compilation unit. Total: returns for every input.
pub fn infer_program(program: &Program, options: InferOptions) -> InferResult {
    let seed = rill_ast::max_node_id(program)
        .map(|id| id.0 + 1)
        .unwrap_or(0);
    let mut ctx = InferCtx::new(seed);

    if let Some(adt) = options.initial_adt_env {
        ctx.adt = adt;
    }
    if !options.skip_prelude {
        builtins::register_prelude(&mut ctx);
    }
    for (name, scheme) in options.initial_env {
        ctx.bind(name, scheme);
    }

    collect_label_rules(&mut ctx, program);
    collect_operators(&mut ctx, program);
    decl::register_type_decls(&mut ctx, program);

    let lowered = lower_program(program, &mut ctx.nodes);
    infer_declarations(&mut ctx, &lowered);

    let marked_program = materialize::materialize_program(&mut ctx, &lowered);

    InferResult {
        env: ctx.top_env(),
        summaries: ctx.summaries.clone(),
        all_bindings: ctx.all_bindings.clone(),
        marked_program,
        marks: ctx.marks.clone(),
        pattern_marks: ctx.pattern_marks.clone(),
        type_expr_marks: ctx.type_expr_marks.clone(),
        holes: ctx.holes.clone(),
        constraint_stubs: ctx.stubs.clone(),
        node_types: ctx.node_types.clone(),
        layer1_diagnostics: ctx.diagnostics.clone(),
        substitution: ctx.subst.clone(),
        var_counter: ctx.vars.allocated(),
        adt_env: ctx.adt,
        source: options.source,
    }
}

// ── Declaration-level setup ────────────────────────────────────────────

fn collect_label_rules(ctx: &mut InferCtx, program: &Program) {
    for decl in &program.declarations {
        match decl {
            TopLevel::Domain(d) => {
                if let Some(carrier) = &d.carrier {
                    ctx.adt.register_carrier(carrier, &d.name);
                }
                if d.boundary.is_some() {
                    ctx.boundary_domains.push(d.name.clone());
                }
            }
            TopLevel::OpRule(r) => {
                ctx.op_rules
                    .entry(r.function.clone())
                    .or_default()
                    .push(OpRule {
                        function: r.function.clone(),
                        domain: r.domain.clone(),
                        adds: r.adds.clone(),
                        removes: r.removes.clone(),
                    });
            }
            TopLevel::Policy(p) => {
                ctx.policy_rules
                    .entry(p.function.clone())
                    .or_default()
                    .push(PolicyRule {
                        function: p.function.clone(),
                        domain: p.domain.clone(),
                        kind: p.policy,
                        tags: p.tags.clone(),
                        domains: p.domains.clone(),
                    });
            }
            TopLevel::Annotate(a) => {
                ctx.annotation_rules
                    .entry(a.function.clone())
                    .or_default()
                    .push(AnnotationRule {
                        function: a.function.clone(),
                        domain: a.domain.clone(),
                        tags: a.tags.clone(),
                        at_return: a.at_return,
                    });
            }
            _ => {}
        }
    }
}

fn collect_operators(ctx: &mut InferCtx, program: &Program) {
    for decl in &program.declarations {
        match decl {
            TopLevel::Infix(o) => {
                ctx.infix_ops.insert(
                    o.op.clone(),
                    OperatorInfo {
                        impl_name: o.impl_name.clone(),
                        class: o.class,
                    },
                );
            }
            TopLevel::Prefix(o) => {
                ctx.prefix_ops.insert(
                    o.op.clone(),
                    OperatorInfo {
                        impl_name: o.impl_name.clone(),
                        class: o.class,
                    },
                );
            }
            _ => {}
        }
    }
}

/// Walk top-level declarations in order, grouping maximal runs of
/// consecutive recursive lets into one mutual group.
fn infer_declarations(ctx: &mut InferCtx, program: &Program) {
    let mut pending: Vec<&LetDecl> = Vec::new();
    for decl in &program.declarations {
        match decl {
            TopLevel::Let(l) if l.recursive => pending.push(l),
            TopLevel::Let(l) => {
                flush_group(ctx, &mut pending, true);
                infer_let_single(ctx, l, true);
            }
            _ => flush_group(ctx, &mut pending, true),
        }
    }
    flush_group(ctx, &mut pending, true);
}

fn flush_group(ctx: &mut InferCtx, pending: &mut Vec<&LetDecl>, top_level: bool) {
    if pending.is_empty() {
        return;
    }
    let group: Vec<&LetDecl> = pending.drain(..).collect();
    infer_let_group(ctx, &group, top_level);
}

// ── Let declarations ───────────────────────────────────────────────────

/// Infer the function value of a let: parameters into scope, body,
/// return annotation, boundary stubs. Runs inside its own scope.
fn infer_let_body(ctx: &mut InferCtx, decl: &LetDecl) -> Ty {
    ctx.push_scope();
    let mut tv_scope = TypeVarScope::open();
    let mut param_tys = Vec::new();
    for param in &decl.params {
        let ty = match &param.annotation {
            Some(te) => translate_type_expr(ctx, te, &mut tv_scope),
            None => ctx.fresh_var(),
        };
        match param.pattern.as_var() {
            Some(name) => ctx.bind(name, Scheme::mono(ty.clone())),
            // Post-lowering every parameter is a variable or wildcard.
            None if matches!(param.pattern.kind, PatternKind::Wildcard) => {}
            None => {
                ctx.mark_internal(param.id, param.span, "unlowered parameter pattern");
            }
        }
        ctx.record_type(param.id, &ty);
        ctx.record_type(param.pattern.id, &ty);
        param_tys.push(ty);
    }

    let body_ty = infer_expr(ctx, &decl.body);

    if let Some(ann) = &decl.return_annotation {
        let ann_ty = translate_type_expr(ctx, ann, &mut tv_scope);
        let annotation_ty = ctx.apply(&ann_ty);
        ctx.emit(Stub::Annotation {
            origin: decl.id,
            annotation: ann.id,
            annotation_ty: Some(annotation_ty),
            value: decl.body.id,
            subject: Some(decl.name.clone()),
        });
        if !ctx.unify(&body_ty, &ann_ty) {
            diag_unify_failure(ctx, decl.body.id, Reason::TypeMismatch);
        }
    }

    emit_return_stubs(ctx, decl.id, decl.body.id, Some(&decl.name));
    ctx.pop_scope();

    if decl.params.is_empty() {
        body_ty
    } else {
        let applied: Vec<Ty> = param_tys.iter().map(|t| ctx.apply(t)).collect();
        Ty::func_chain(applied, ctx.apply(&body_ty))
    }
}

/// Boundary and annotation-rule stubs for a function's return position.
fn emit_return_stubs(ctx: &mut InferCtx, fn_node: NodeId, body: NodeId, name: Option<&str>) {
    if let Some(name) = name {
        if let Some(rules) = ctx.annotation_rules.get(name).cloned() {
            for rule in rules {
                ctx.emit(Stub::AddStateTags {
                    node: body,
                    label: Label::from_tags(rule.domain.clone(), rule.tags.clone()),
                });
                if rule.at_return {
                    ctx.emit(Stub::RequireAtReturn {
                        node: body,
                        fn_node,
                        domain: rule.domain,
                    });
                }
            }
        }
    }
    for domain in ctx.boundary_domains.clone() {
        ctx.emit(Stub::RequireAtReturn {
            node: body,
            fn_node,
            domain,
        });
    }
}

fn infer_let_single(ctx: &mut InferCtx, decl: &LetDecl, top_level: bool) -> Ty {
    if decl.recursive {
        let group = [decl];
        return infer_let_group(ctx, &group, top_level);
    }
    let fn_ty = infer_let_body(ctx, decl);
    let applied = ctx.record_type(decl.id, &fn_ty);
    let scheme = ctx.generalize(&fn_ty);
    ctx.bind(&decl.name, scheme.clone());
    if top_level {
        ctx.summaries.insert(decl.name.clone(), scheme);
    }
    applied
}

/// Recursive / mutually recursive group: pre-bind every name with a
/// fresh monomorphic variable, infer the bodies, unify, strip the
/// pre-bindings before generalisation, then rebind generalised.
fn infer_let_group(ctx: &mut InferCtx, group: &[&LetDecl], top_level: bool) -> Ty {
    let pre: Vec<(String, Ty)> = group
        .iter()
        .map(|decl| (decl.name.clone(), ctx.fresh_var()))
        .collect();
    for (name, var) in &pre {
        ctx.bind(name, Scheme::mono(var.clone()));
    }

    for (decl, (_, var)) in group.iter().zip(pre.iter()) {
        let fn_ty = infer_let_body(ctx, decl);
        if !ctx.unify(var, &fn_ty) {
            diag_unify_failure(ctx, decl.id, Reason::TypeMismatch);
        }
    }

    for (name, _) in &pre {
        ctx.unbind(name);
    }

    let mut last = Ty::Unit;
    for (decl, (name, var)) in group.iter().zip(pre.iter()) {
        let applied = ctx.record_type(decl.id, var);
        let scheme = ctx.generalize(var);
        ctx.bind(name, scheme.clone());
        if top_level {
            ctx.summaries.insert(name.clone(), scheme);
        }
        last = applied;
    }
    last
}

/// Append a diagnostic for the context's last unification failure, with
/// the reason adjusted for occurs-check failures.
fn diag_unify_failure(ctx: &mut InferCtx, origin: NodeId, reason: Reason) {
    let Some(err) = ctx.last_failure.clone() else {
        return;
    };
    let diagnostic = match &err {
        UnifyError::TypeMismatch { expected, found } => {
            if expected.is_hole() && found.is_hole() {
                return; // pure gradual-typing event
            }
            Diagnostic::new(origin, reason)
                .with("expected", expected.to_string())
                .with("actual", found.to_string())
        }
        UnifyError::ArityMismatch {
            expected,
            found,
            left,
            right,
        } => Diagnostic::new(origin, Reason::ArityMismatch)
            .with("expected", *expected as u64)
            .with("actual", *found as u64)
            .with("left", left.to_string())
            .with("right", right.to_string()),
        UnifyError::OccursCheck { left, right } => Diagnostic::new(origin, Reason::OccursCycle)
            .with("left", left.to_string())
            .with("right", right.to_string()),
    };
    ctx.diag(diagnostic);
}

/// Replace a node with the mark matching the last unification failure.
fn mark_unify_failure(ctx: &mut InferCtx, id: NodeId, span: Span, reason: Reason) -> Ty {
    let Some(err) = ctx.last_failure.clone() else {
        return ctx.mark_internal(id, span, "mark requested without failure");
    };
    match err {
        UnifyError::TypeMismatch { expected, found } => {
            let gradual = expected.is_hole() && found.is_hole();
            let diagnostic = (!gradual).then(|| {
                Diagnostic::new(id, reason)
                    .with("expected", expected.to_string())
                    .with("actual", found.to_string())
            });
            ctx.mark_expr(
                id,
                span,
                MExprKind::MarkInconsistent {
                    expected: expected.clone(),
                    actual: found.clone(),
                },
                Provenance::Inconsistent {
                    expected: Box::new(expected),
                    actual: Box::new(found),
                },
                diagnostic,
            )
        }
        UnifyError::ArityMismatch {
            expected: e,
            found: a,
            left,
            right,
        } => {
            let diagnostic = Diagnostic::new(id, Reason::ArityMismatch)
                .with("expected", e as u64)
                .with("actual", a as u64)
                .with("left", left.to_string())
                .with("right", right.to_string());
            ctx.mark_expr(
                id,
                span,
                MExprKind::MarkInconsistent {
                    expected: left.clone(),
                    actual: right.clone(),
                },
                Provenance::Inconsistent {
                    expected: Box::new(left),
                    actual: Box::new(right),
                },
                Some(diagnostic),
            )
        }
        UnifyError::OccursCheck { left, right } => {
            let diagnostic = Diagnostic::new(id, Reason::OccursCycle)
                .with("left", left.to_string())
                .with("right", right.to_string());
            ctx.mark_expr(
                id,
                span,
                MExprKind::MarkOccursCheck {
                    left: left.clone(),
                    right: right.clone(),
                },
                Provenance::OccursCheck {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Some(diagnostic),
            )
        }
    }
}

// ── Expressions ────────────────────────────────────────────────────────

fn literal_ty(lit: &Literal) -> Ty {
    match lit {
        Literal::Int(_) => Ty::Int,
        Literal::Bool(_) => Ty::Bool,
        Literal::Char(_) => Ty::Char,
        Literal::Str(_) => Ty::String,
        Literal::Unit => Ty::Unit,
    }
}

/// Infer one expression. Never fails; the returned type is a hole when
/// the node was marked.
pub fn infer_expr(ctx: &mut InferCtx, expr: &Expr) -> Ty {
    let ty = match &expr.kind {
        ExprKind::Ident(name) => match ctx.lookup(name).cloned() {
            Some(scheme) => {
                let instantiated = ctx.instantiate(&scheme);
                ctx.apply(&instantiated)
            }
            None => {
                return ctx.mark_expr(
                    expr.id,
                    expr.span,
                    MExprKind::MarkFreeVar { name: name.clone() },
                    Provenance::FreeVar { name: name.clone() },
                    Some(
                        Diagnostic::new(expr.id, Reason::FreeVariable)
                            .with("name", name.clone()),
                    ),
                );
            }
        },

        ExprKind::Literal(lit) => literal_ty(lit),

        ExprKind::Ctor { name, args } => return infer_ctor(ctx, expr, name, args),

        ExprKind::Tuple(elems) => {
            let tys: Vec<Ty> = elems.iter().map(|e| infer_expr(ctx, e)).collect();
            for e in elems {
                ctx.emit(Stub::ConstraintFlow {
                    from: e.id,
                    to: expr.id,
                });
            }
            Ty::Tuple(tys)
        }

        ExprKind::RecordLit(fields) => {
            let mut map = std::collections::BTreeMap::new();
            for (name, value) in fields {
                let ty = infer_expr(ctx, value);
                if map.insert(name.clone(), ty).is_some() {
                    ctx.diag(
                        Diagnostic::new(expr.id, Reason::DuplicateRecordField)
                            .with("field", name.clone()),
                    );
                }
                ctx.emit(Stub::ConstraintFlow {
                    from: value.id,
                    to: expr.id,
                });
            }
            Ty::Record(map)
        }

        ExprKind::Projection { target, field } => {
            let _target_ty = infer_expr(ctx, target);
            // The projection's type is deferred to Layer 2: a fresh
            // variable stands for it, and the node is registered as a
            // hole so the solver classifies it with the others.
            let result = ctx.fresh_var();
            ctx.register_hole(expr.id, Provenance::ExprHole, vec![target.id]);
            ctx.emit(Stub::HasField {
                origin: expr.id,
                target: target.id,
                field: field.clone(),
                result: expr.id,
                projected_ty: Some(result.clone()),
            });
            ctx.emit(Stub::ConstraintFlow {
                from: target.id,
                to: expr.id,
            });
            result
        }

        ExprKind::Call { callee, args } => return infer_call(ctx, expr, callee, args),

        ExprKind::Binary { op, lhs, rhs } => return infer_binary(ctx, expr, op, lhs, rhs),

        ExprKind::Unary { op, operand } => return infer_unary(ctx, expr, op, operand),

        ExprKind::Arrow {
            params,
            return_annotation,
            body,
        } => {
            ctx.push_scope();
            let mut tv_scope = TypeVarScope::open();
            let mut param_tys = Vec::new();
            for param in params {
                let ty = match &param.annotation {
                    Some(te) => translate_type_expr(ctx, te, &mut tv_scope),
                    None => ctx.fresh_var(),
                };
                match param.pattern.as_var() {
                    Some(name) => ctx.bind(name, Scheme::mono(ty.clone())),
                    None if matches!(param.pattern.kind, PatternKind::Wildcard) => {}
                    None => {
                        ctx.mark_internal(param.id, param.span, "unlowered parameter pattern");
                    }
                }
                ctx.record_type(param.id, &ty);
                ctx.record_type(param.pattern.id, &ty);
                param_tys.push(ty);
            }
            let body_ty = infer_expr(ctx, body);
            if let Some(ann) = return_annotation {
                let ann_ty = translate_type_expr(ctx, ann, &mut tv_scope);
                let annotation_ty = ctx.apply(&ann_ty);
                ctx.emit(Stub::Annotation {
                    origin: expr.id,
                    annotation: ann.id,
                    annotation_ty: Some(annotation_ty),
                    value: body.id,
                    subject: None,
                });
                if !ctx.unify(&body_ty, &ann_ty) {
                    diag_unify_failure(ctx, body.id, Reason::TypeMismatch);
                }
            }
            emit_return_stubs(ctx, expr.id, body.id, None);
            ctx.pop_scope();
            let applied: Vec<Ty> = param_tys.iter().map(|t| ctx.apply(t)).collect();
            Ty::func_chain(applied, ctx.apply(&body_ty))
        }

        ExprKind::Block { stmts, result } => {
            ctx.push_scope();
            let mut pending: Vec<&LetDecl> = Vec::new();
            for stmt in stmts {
                match stmt {
                    Stmt::Let(l) if l.recursive => pending.push(l),
                    Stmt::Let(l) => {
                        flush_group(ctx, &mut pending, false);
                        infer_let_single(ctx, l, false);
                    }
                    Stmt::Expr(e) => {
                        flush_group(ctx, &mut pending, false);
                        infer_expr(ctx, e);
                        ctx.emit(Stub::ConstraintFlow {
                            from: e.id,
                            to: expr.id,
                        });
                    }
                }
            }
            flush_group(ctx, &mut pending, false);
            let ty = match result {
                Some(result) => {
                    let ty = infer_expr(ctx, result);
                    ctx.emit(Stub::ConstraintFlow {
                        from: result.id,
                        to: expr.id,
                    });
                    ty
                }
                None => Ty::Unit,
            };
            ctx.pop_scope();
            ty
        }

        ExprKind::Match { scrutinees, arms } => {
            return infer_match(ctx, expr.id, expr.span, scrutinees, arms)
        }

        // Lowering rewrites match_fn into an arrow; reaching one here
        // means inference ran on an unlowered tree.
        ExprKind::MatchFn { .. } => {
            return ctx.mark_expr(
                expr.id,
                expr.span,
                MExprKind::MarkUnsupportedExpr {
                    expr_kind: "match_fn".to_string(),
                },
                Provenance::Incomplete {
                    reason: "expr.match_fn".to_string(),
                },
                Some(
                    Diagnostic::new(expr.id, Reason::UnsupportedExpr)
                        .with("kind", "match_fn"),
                ),
            );
        }

        ExprKind::Annotated { value, annotation } => {
            let value_ty = infer_expr(ctx, value);
            let mut tv_scope = TypeVarScope::open();
            let ann_ty = translate_type_expr(ctx, annotation, &mut tv_scope);
            let annotation_ty = ctx.apply(&ann_ty);
            ctx.emit(Stub::Annotation {
                origin: expr.id,
                annotation: annotation.id,
                annotation_ty: Some(annotation_ty),
                value: value.id,
                subject: None,
            });
            ctx.emit(Stub::ConstraintFlow {
                from: value.id,
                to: expr.id,
            });
            if !ctx.unify(&value_ty, &ann_ty) {
                mark_unify_failure(ctx, value.id, value.span, Reason::TypeMismatch);
            }
            ctx.apply(&ann_ty)
        }

        ExprKind::Hole => ctx.mint_hole(expr.id, Provenance::UserHole),
    };
    ctx.record_type(expr.id, &ty)
}

/// Constructor application: instantiate the constructor scheme and
/// thread the arguments through it.
fn infer_ctor(ctx: &mut InferCtx, expr: &Expr, name: &str, args: &[Expr]) -> Ty {
    let scheme = ctx.adt.ctor(name).map(|(_, ctor)| ctor.scheme.clone());
    let Some(scheme) = scheme else {
        return ctx.mark_expr(
            expr.id,
            expr.span,
            MExprKind::MarkFreeVar {
                name: name.to_string(),
            },
            Provenance::FreeVar {
                name: name.to_string(),
            },
            Some(
                Diagnostic::new(expr.id, Reason::FreeVariable)
                    .with("name", name.to_string())
                    .with("constructor", true),
            ),
        );
    };
    let mut fn_ty = ctx.instantiate(&scheme);
    for arg in args {
        let arg_ty = infer_expr(ctx, arg);
        ctx.emit(Stub::ConstraintFlow {
            from: arg.id,
            to: expr.id,
        });
        match ctx.apply(&fn_ty) {
            Ty::Func(from, to) => {
                if !ctx.unify(&arg_ty, &from) {
                    mark_unify_failure(ctx, arg.id, arg.span, Reason::TypeMismatch);
                }
                fn_ty = *to;
            }
            other => {
                // Over-application of the constructor.
                return ctx.mark_expr(
                    expr.id,
                    expr.span,
                    MExprKind::MarkNotFunction {
                        callee: other.clone(),
                    },
                    Provenance::NotFunction {
                        callee: Box::new(other.clone()),
                    },
                    Some(
                        Diagnostic::new(expr.id, Reason::NotFunction)
                            .with("callee", other.to_string()),
                    ),
                );
            }
        }
    }
    let resolved = ctx.apply(&fn_ty);
    if matches!(resolved, Ty::Func(..)) {
        // Under-application.
        return ctx.mark_expr(
            expr.id,
            expr.span,
            MExprKind::MarkNotFunction {
                callee: resolved.clone(),
            },
            Provenance::NotFunction {
                callee: Box::new(resolved.clone()),
            },
            Some(
                Diagnostic::new(expr.id, Reason::NotFunction)
                    .with("callee", resolved.to_string())
                    .with("under_applied", true),
            ),
        );
    }
    ctx.record_type(expr.id, &resolved)
}

fn infer_call(ctx: &mut InferCtx, expr: &Expr, callee: &Expr, args: &[Expr]) -> Ty {
    let mut fn_ty = infer_expr(ctx, callee);
    ctx.emit(Stub::ConstraintFlow {
        from: callee.id,
        to: expr.id,
    });

    for (index, arg) in args.iter().enumerate() {
        let arg_ty = infer_expr(ctx, arg);
        ctx.emit(Stub::ConstraintFlow {
            from: arg.id,
            to: expr.id,
        });
        let result = ctx.fresh_var();
        ctx.emit(Stub::Call {
            origin: expr.id,
            callee: callee.id,
            argument: arg.id,
            result: expr.id,
            result_ty: result.clone(),
            index,
            argument_ty: ctx.apply(&arg_ty),
        });
        let wanted = Ty::func(arg_ty.clone(), result.clone());
        if !ctx.unify(&fn_ty, &wanted) {
            let resolved = ctx.apply(&fn_ty);
            match resolved {
                Ty::Func(from, _) => {
                    ctx.last_failure = Some(UnifyError::TypeMismatch {
                        expected: (*from).clone(),
                        found: ctx.apply(&arg_ty),
                    });
                    mark_unify_failure(ctx, arg.id, arg.span, Reason::TypeMismatch);
                }
                other if other.is_var() || other.is_hole() => {
                    // Occurs check or row failure against a variable.
                    return mark_unify_failure(ctx, expr.id, expr.span, Reason::TypeMismatch);
                }
                other => {
                    return ctx.mark_expr(
                        expr.id,
                        expr.span,
                        MExprKind::MarkNotFunction {
                            callee: other.clone(),
                        },
                        Provenance::NotFunction {
                            callee: Box::new(other.clone()),
                        },
                        Some(
                            Diagnostic::new(expr.id, Reason::NotFunction)
                                .with("callee", other.to_string()),
                        ),
                    );
                }
            }
        }
        fn_ty = result;
    }

    emit_call_label_stubs(ctx, expr, callee, args);

    let resolved = ctx.apply(&fn_ty);
    // Calling an effectful primitive introduces its effects at the call
    // node.
    if let Some(parts) = ctx.adt.split_carrier(&resolved) {
        if let Ty::Row(row) = &parts.state {
            if !row.cases.is_empty() {
                ctx.emit(Stub::ConstraintSource {
                    node: expr.id,
                    label: Label::new(parts.domain.clone(), row.clone()),
                });
            }
        }
    }
    ctx.record_type(expr.id, &resolved)
}

/// Raw label stubs driven by declaration-level op/policy rules on the
/// callee.
fn emit_call_label_stubs(ctx: &mut InferCtx, expr: &Expr, callee: &Expr, args: &[Expr]) {
    let ExprKind::Ident(name) = &callee.kind else {
        return;
    };
    if let Some(rules) = ctx.op_rules.get(name).cloned() {
        for rule in rules {
            if !rule.adds.is_empty() {
                ctx.emit(Stub::ConstraintSource {
                    node: expr.id,
                    label: Label::from_tags(rule.domain.clone(), rule.adds.clone()),
                });
            }
            if !rule.removes.is_empty() {
                ctx.emit(Stub::ConstraintRewrite {
                    node: expr.id,
                    domain: rule.domain.clone(),
                    remove: rule.removes.clone(),
                    add: Vec::new(),
                });
            }
        }
    }
    if let Some(rules) = ctx.policy_rules.get(name).cloned() {
        for rule in rules {
            for arg in args {
                match rule.kind {
                    PolicyKind::RequireExact => ctx.emit(Stub::RequireExact {
                        node: arg.id,
                        domain: rule.domain.clone(),
                        tags: rule.tags.clone(),
                    }),
                    PolicyKind::RequireAny => ctx.emit(Stub::RequireAny {
                        node: arg.id,
                        domain: rule.domain.clone(),
                    }),
                    PolicyKind::RequireNot => ctx.emit(Stub::RequireNot {
                        node: arg.id,
                        domain: rule.domain.clone(),
                        tags: rule.tags.clone(),
                    }),
                    PolicyKind::RejectsInfection => ctx.emit(Stub::CallRejectsInfection {
                        origin: expr.id,
                        argument: arg.id,
                    }),
                    PolicyKind::RejectsDomains => ctx.emit(Stub::CallRejectsDomains {
                        origin: expr.id,
                        argument: arg.id,
                        domains: rule.domains.clone(),
                    }),
                }
            }
        }
    }
}

/// An operand as the operator implementation sees it: carriers are
/// split off here and reassembled by the solver's numeric/boolean phase.
fn bare_operand(ctx: &InferCtx, ty: &Ty) -> Ty {
    let applied = ctx.apply(ty);
    match ctx.adt.split_carrier(&applied) {
        Some(parts) => parts.value,
        None => applied,
    }
}

/// Binary operators resolve through the `infix` table to an
/// implementation function applied as a curried call.
fn infer_binary(ctx: &mut InferCtx, expr: &Expr, op: &str, lhs: &Expr, rhs: &Expr) -> Ty {
    let lhs_ty = infer_expr(ctx, lhs);
    let rhs_ty = infer_expr(ctx, rhs);
    let lhs_ty = bare_operand(ctx, &lhs_ty);
    let rhs_ty = bare_operand(ctx, &rhs_ty);
    ctx.emit(Stub::ConstraintFlow {
        from: lhs.id,
        to: expr.id,
    });
    ctx.emit(Stub::ConstraintFlow {
        from: rhs.id,
        to: expr.id,
    });

    let Some(info) = ctx.infix_ops.get(op).cloned() else {
        return ctx.mark_expr(
            expr.id,
            expr.span,
            MExprKind::MarkFreeVar {
                name: format!("__op_{}", op),
            },
            Provenance::FreeVar {
                name: format!("__op_{}", op),
            },
            Some(Diagnostic::new(expr.id, Reason::FreeVariable).with("operator", op.to_string())),
        );
    };

    match info.class {
        Some(rill_ast::OpClass::Boolean) => ctx.emit(Stub::Boolean {
            origin: expr.id,
            operands: vec![lhs.id, rhs.id],
            operator: op.to_string(),
            result: expr.id,
        }),
        Some(_) => ctx.emit(Stub::Numeric {
            origin: expr.id,
            operands: vec![lhs.id, rhs.id],
            operator: op.to_string(),
            result: expr.id,
        }),
        None => {}
    }

    let Some(scheme) = ctx.lookup(&info.impl_name).cloned() else {
        return ctx.mark_expr(
            expr.id,
            expr.span,
            MExprKind::MarkFreeVar {
                name: info.impl_name.clone(),
            },
            Provenance::FreeVar {
                name: info.impl_name.clone(),
            },
            Some(
                Diagnostic::new(expr.id, Reason::FreeVariable)
                    .with("name", info.impl_name.clone()),
            ),
        );
    };
    let mut fn_ty = ctx.instantiate(&scheme);

    for (operand, operand_ty) in [(lhs, &lhs_ty), (rhs, &rhs_ty)] {
        let result = ctx.fresh_var();
        let wanted = Ty::func(operand_ty.clone(), result.clone());
        if !ctx.unify(&fn_ty, &wanted) {
            let resolved = ctx.apply(&fn_ty);
            if let Ty::Func(from, _) = resolved {
                ctx.last_failure = Some(UnifyError::TypeMismatch {
                    expected: (*from).clone(),
                    found: ctx.apply(operand_ty),
                });
                mark_unify_failure(ctx, operand.id, operand.span, Reason::TypeMismatch);
            } else {
                return ctx.mark_expr(
                    expr.id,
                    expr.span,
                    MExprKind::MarkNotFunction {
                        callee: resolved.clone(),
                    },
                    Provenance::NotFunction {
                        callee: Box::new(resolved.clone()),
                    },
                    Some(
                        Diagnostic::new(expr.id, Reason::NotFunction)
                            .with("callee", resolved.to_string()),
                    ),
                );
            }
        }
        fn_ty = result;
    }

    let resolved = ctx.apply(&fn_ty);
    ctx.record_type(expr.id, &resolved)
}

fn infer_unary(ctx: &mut InferCtx, expr: &Expr, op: &str, operand: &Expr) -> Ty {
    let operand_ty = infer_expr(ctx, operand);
    let operand_ty = bare_operand(ctx, &operand_ty);
    ctx.emit(Stub::ConstraintFlow {
        from: operand.id,
        to: expr.id,
    });

    let Some(info) = ctx.prefix_ops.get(op).cloned() else {
        return ctx.mark_expr(
            expr.id,
            expr.span,
            MExprKind::MarkFreeVar {
                name: format!("__prefix_{}", op),
            },
            Provenance::FreeVar {
                name: format!("__prefix_{}", op),
            },
            Some(Diagnostic::new(expr.id, Reason::FreeVariable).with("operator", op.to_string())),
        );
    };

    match info.class {
        Some(rill_ast::OpClass::Boolean) => ctx.emit(Stub::Boolean {
            origin: expr.id,
            operands: vec![operand.id],
            operator: op.to_string(),
            result: expr.id,
        }),
        Some(_) => ctx.emit(Stub::Numeric {
            origin: expr.id,
            operands: vec![operand.id],
            operator: op.to_string(),
            result: expr.id,
        }),
        None => {}
    }

    let Some(scheme) = ctx.lookup(&info.impl_name).cloned() else {
        return ctx.mark_expr(
            expr.id,
            expr.span,
            MExprKind::MarkFreeVar {
                name: info.impl_name.clone(),
            },
            Provenance::FreeVar {
                name: info.impl_name.clone(),
            },
            Some(
                Diagnostic::new(expr.id, Reason::FreeVariable)
                    .with("name", info.impl_name.clone()),
            ),
        );
    };
    let fn_ty = ctx.instantiate(&scheme);
    let result = ctx.fresh_var();
    let wanted = Ty::func(operand_ty.clone(), result.clone());
    if !ctx.unify(&fn_ty, &wanted) {
        let resolved = ctx.apply(&fn_ty);
        if let Ty::Func(from, _) = resolved {
            ctx.last_failure = Some(UnifyError::TypeMismatch {
                expected: (*from).clone(),
                found: ctx.apply(&operand_ty),
            });
            mark_unify_failure(ctx, operand.id, operand.span, Reason::TypeMismatch);
        } else {
            return ctx.mark_expr(
                expr.id,
                expr.span,
                MExprKind::MarkNotFunction {
                    callee: resolved.clone(),
                },
                Provenance::NotFunction {
                    callee: Box::new(resolved.clone()),
                },
                Some(
                    Diagnostic::new(expr.id, Reason::NotFunction)
                        .with("callee", resolved.to_string()),
                ),
            );
        }
    }
    let resolved = ctx.apply(&result);
    ctx.record_type(expr.id, &resolved)
}

// ── Patterns & matches ─────────────────────────────────────────────────

/// What one pattern contributes to coverage tracking.
enum PatCoverage {
    Wild,
    Bool(bool),
    Ctor(String),
    RowLabel(String),
    Other,
}

fn mark_pattern(
    ctx: &mut InferCtx,
    pat: &Pattern,
    kind: MPatternKind,
    provenance: Provenance,
    diagnostic: Option<Diagnostic>,
) -> Ty {
    let ty = ctx.mint_hole(pat.id, provenance);
    ctx.pattern_marks.insert(
        pat.id,
        MPattern {
            id: pat.id,
            span: pat.span,
            ty: ty.clone(),
            kind,
        },
    );
    ctx.node_types.insert(pat.id, ty.clone());
    if let Some(d) = diagnostic {
        ctx.diag(d);
    }
    ty
}

fn mark_pattern_unify_failure(ctx: &mut InferCtx, pat: &Pattern) -> Ty {
    let Some(err) = ctx.last_failure.clone() else {
        return mark_pattern(
            ctx,
            pat,
            MPatternKind::MarkInconsistent {
                expected: Ty::Unit,
                actual: Ty::Unit,
            },
            Provenance::Internal {
                reason: "pattern mark requested without failure".to_string(),
            },
            None,
        );
    };
    let (expected, actual) = match &err {
        UnifyError::TypeMismatch { expected, found } => (expected.clone(), found.clone()),
        UnifyError::ArityMismatch { left, right, .. } => (left.clone(), right.clone()),
        UnifyError::OccursCheck { left, right } => (left.clone(), right.clone()),
    };
    let gradual = expected.is_hole() && actual.is_hole();
    let diagnostic = (!gradual).then(|| {
        Diagnostic::new(pat.id, Reason::TypeMismatch)
            .with("expected", expected.to_string())
            .with("actual", actual.to_string())
    });
    mark_pattern(
        ctx,
        pat,
        MPatternKind::MarkInconsistent {
            expected: expected.clone(),
            actual: actual.clone(),
        },
        Provenance::Inconsistent {
            expected: Box::new(expected),
            actual: Box::new(actual),
        },
        diagnostic,
    )
}

/// Infer one pattern against the expected type. Bindings accumulate into
/// `bindings` as `(name, type, pattern id)`; duplicates are resolved by
/// the caller, which sees the whole arm.
fn infer_pattern(
    ctx: &mut InferCtx,
    pat: &Pattern,
    expected: &Ty,
    bindings: &mut Vec<(String, Ty, NodeId)>,
) -> PatCoverage {
    match &pat.kind {
        PatternKind::Wildcard => {
            ctx.record_type(pat.id, expected);
            PatCoverage::Wild
        }
        PatternKind::Var(name) => {
            ctx.record_type(pat.id, expected);
            bindings.push((name.clone(), expected.clone(), pat.id));
            PatCoverage::Wild
        }
        PatternKind::Literal(lit) => {
            let lit_ty = literal_ty(lit);
            if !ctx.unify(&lit_ty, expected) {
                mark_pattern_unify_failure(ctx, pat);
            } else {
                ctx.record_type(pat.id, &lit_ty);
            }
            match lit {
                Literal::Bool(b) => PatCoverage::Bool(*b),
                _ => PatCoverage::Other,
            }
        }
        PatternKind::Tuple(elems) => {
            let fresh: Vec<Ty> = elems.iter().map(|_| ctx.fresh_var()).collect();
            let tuple = Ty::Tuple(fresh.clone());
            if !ctx.unify(expected, &tuple) {
                mark_pattern_unify_failure(ctx, pat);
            } else {
                ctx.record_type(pat.id, &tuple);
            }
            // The outer pattern continues even when it was marked.
            for (elem, elem_ty) in elems.iter().zip(fresh.iter()) {
                infer_pattern(ctx, elem, elem_ty, bindings);
            }
            PatCoverage::Other
        }
        PatternKind::Ctor { name, args } => infer_ctor_pattern(ctx, pat, name, args, expected, bindings),
    }
}

fn infer_ctor_pattern(
    ctx: &mut InferCtx,
    pat: &Pattern,
    name: &str,
    args: &[Pattern],
    expected: &Ty,
    bindings: &mut Vec<(String, Ty, NodeId)>,
) -> PatCoverage {
    let found = ctx
        .adt
        .ctor(name)
        .map(|(_, ctor)| (ctor.scheme.clone(), ctor.arity));
    if let Some((scheme, arity)) = found {
        let mut fn_ty = ctx.instantiate(&scheme);
        if args.len() != arity {
            let diagnostic = Diagnostic::new(pat.id, Reason::ArityMismatch)
                .with("constructor", name.to_string())
                .with("expected", arity as u64)
                .with("actual", args.len() as u64);
            let ctor_ty = ctx.apply(&fn_ty);
            mark_pattern(
                ctx,
                pat,
                MPatternKind::MarkInconsistent {
                    expected: ctor_ty.clone(),
                    actual: Ty::Hole(Provenance::ExprHole),
                },
                Provenance::Inconsistent {
                    expected: Box::new(ctor_ty),
                    actual: Box::new(Ty::Hole(Provenance::ExprHole)),
                },
                Some(diagnostic),
            );
            // Still type the sub-patterns so their bindings exist.
            for arg in args {
                let fresh = ctx.fresh_var();
                infer_pattern(ctx, arg, &fresh, bindings);
            }
            return PatCoverage::Ctor(name.to_string());
        }
        for arg in args {
            match ctx.apply(&fn_ty) {
                Ty::Func(from, to) => {
                    infer_pattern(ctx, arg, &from, bindings);
                    fn_ty = *to;
                }
                _ => {
                    let fresh = ctx.fresh_var();
                    infer_pattern(ctx, arg, &fresh, bindings);
                }
            }
        }
        if !ctx.unify(&fn_ty, expected) {
            mark_pattern_unify_failure(ctx, pat);
        } else {
            ctx.record_type(pat.id, &fn_ty);
        }
        return PatCoverage::Ctor(name.to_string());
    }

    // Not a known constructor: an effect-row label pattern when the
    // scrutinee is a row, a free constructor otherwise.
    let resolved = ctx.apply(expected);
    if matches!(resolved, Ty::Row(_)) {
        let payload_var = if args.len() == 1 {
            Some(ctx.fresh_var())
        } else {
            None
        };
        let mut cases = std::collections::BTreeMap::new();
        cases.insert(name.to_string(), payload_var.clone());
        let tail = ctx.vars.fresh();
        let label_row = Ty::Row(crate::ty::EffectRow {
            cases,
            tail: Some(tail),
        });
        if !ctx.unify(expected, &label_row) {
            mark_pattern_unify_failure(ctx, pat);
        } else {
            ctx.record_type(pat.id, expected);
        }
        match (payload_var, args.first()) {
            (Some(payload_ty), Some(arg)) => {
                infer_pattern(ctx, arg, &payload_ty, bindings);
            }
            (None, None) => {}
            _ => {
                let diagnostic = Diagnostic::new(pat.id, Reason::ArityMismatch)
                    .with("label", name.to_string())
                    .with("actual", args.len() as u64);
                ctx.diag(diagnostic);
            }
        }
        return PatCoverage::RowLabel(name.to_string());
    }

    mark_pattern(
        ctx,
        pat,
        MPatternKind::MarkFreeCtor {
            name: name.to_string(),
        },
        Provenance::FreeVar {
            name: name.to_string(),
        },
        Some(Diagnostic::new(pat.id, Reason::FreeVariable).with("name", name.to_string())),
    );
    for arg in args {
        let fresh = ctx.fresh_var();
        infer_pattern(ctx, arg, &fresh, bindings);
    }
    PatCoverage::Other
}

fn infer_match(
    ctx: &mut InferCtx,
    id: NodeId,
    span: Span,
    scrutinees: &[Expr],
    arms: &[MatchArm],
) -> Ty {
    let scrut_tys: Vec<Ty> = scrutinees.iter().map(|s| infer_expr(ctx, s)).collect();
    for s in scrutinees {
        ctx.emit(Stub::ConstraintFlow { from: s.id, to: id });
    }

    let mut result: Option<Ty> = None;
    let mut wildcard = false;
    let mut covered_bools: BTreeSet<bool> = BTreeSet::new();
    let mut covered_ctors: BTreeSet<String> = BTreeSet::new();
    let mut covered_labels: BTreeSet<String> = BTreeSet::new();
    let mut branch_ids = Vec::with_capacity(arms.len());

    for arm in arms {
        ctx.push_scope();
        let mut bindings: Vec<(String, Ty, NodeId)> = Vec::new();
        for (index, pat) in arm.patterns.iter().enumerate() {
            let expected = match scrut_tys.get(index) {
                Some(ty) => ty.clone(),
                None => ctx.fresh_var(),
            };
            let coverage = infer_pattern(ctx, pat, &expected, &mut bindings);
            if index == 0 {
                match coverage {
                    PatCoverage::Wild => wildcard = true,
                    PatCoverage::Bool(b) => {
                        covered_bools.insert(b);
                    }
                    PatCoverage::Ctor(name) => {
                        covered_ctors.insert(name);
                    }
                    PatCoverage::RowLabel(label) => {
                        covered_labels.insert(label);
                    }
                    PatCoverage::Other => {}
                }
            }
        }

        let mut seen: FxHashSet<String> = FxHashSet::default();
        for (name, ty, pat_id) in bindings {
            if !seen.insert(name.clone()) {
                // Duplicate variable inside one arm: mark the inner
                // sub-pattern, keep the first binding.
                let hole = ctx.mint_hole(pat_id, Provenance::Incomplete {
                    reason: format!("pattern.duplicate.{}", name),
                });
                ctx.pattern_marks.insert(
                    pat_id,
                    MPattern {
                        id: pat_id,
                        span,
                        ty: hole,
                        kind: MPatternKind::MarkDuplicateBinding { name: name.clone() },
                    },
                );
                ctx.diag(
                    Diagnostic::new(pat_id, Reason::DuplicateBinding).with("name", name.clone()),
                );
                continue;
            }
            let applied = ctx.apply(&ty);
            ctx.bind(name, Scheme::mono(applied));
        }

        let body_ty = infer_expr(ctx, &arm.body);
        branch_ids.push(arm.body.id);
        match result.clone() {
            None => result = Some(body_ty),
            Some(prev) => {
                // Carriers of the same domain join value-wise with state
                // union; anything else unifies structurally.
                let prev_applied = ctx.apply(&prev);
                let body_applied = ctx.apply(&body_ty);
                let carriers = match (
                    ctx.adt.split_carrier(&prev_applied),
                    ctx.adt.split_carrier(&body_applied),
                ) {
                    (Some(a), Some(b)) if a.domain == b.domain => Some((a, b)),
                    _ => None,
                };
                if let Some((a, b)) = carriers {
                    if !ctx.unify(&a.value, &b.value) {
                        mark_unify_failure(
                            ctx,
                            arm.body.id,
                            arm.body.span,
                            Reason::BranchMismatch,
                        );
                    }
                    let state = match (&a.state, &b.state) {
                        (Ty::Row(x), Ty::Row(y)) => Ty::Row(union_rows(x, y)),
                        _ => {
                            ctx.unify(&a.state, &b.state);
                            ctx.apply(&a.state)
                        }
                    };
                    let value = ctx.apply(&a.value);
                    if let Some(joined) = ctx.adt.join_carrier(&a.domain, value, state) {
                        result = Some(joined);
                    }
                } else if !ctx.unify(&prev, &body_ty) {
                    mark_unify_failure(ctx, arm.body.id, arm.body.span, Reason::BranchMismatch);
                }
            }
        }
        ctx.pop_scope();
    }

    // ── Coverage ────────────────────────────────────────────────────────
    let resolved_scrutinee = scrut_tys.first().map(|t| ctx.apply(t));
    let mut covered: Vec<String> = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    let mut row_coverage: Option<RowCoverage> = None;
    let mut discharges = false;
    let mut scrutinee_display = String::new();

    match &resolved_scrutinee {
        Some(Ty::Bool) => {
            scrutinee_display = "Bool".to_string();
            for (value, name) in [(true, "true"), (false, "false")] {
                if covered_bools.contains(&value) {
                    covered.push(name.to_string());
                } else {
                    missing.push(name.to_string());
                }
            }
        }
        Some(Ty::Ctor { name, .. }) => {
            scrutinee_display = name.clone();
            if let Some(info) = ctx.adt.get(name) {
                for ctor in &info.ctors {
                    if covered_ctors.contains(&ctor.name) {
                        covered.push(ctor.name.clone());
                    } else {
                        missing.push(ctor.name.clone());
                    }
                }
            }
        }
        Some(Ty::Row(row)) => {
            scrutinee_display = Ty::Row(row.clone()).to_string();
            for label in row.cases.keys() {
                if covered_labels.contains(label) {
                    covered.push(label.clone());
                } else {
                    missing.push(label.clone());
                }
            }
            let open_tail = row.tail.is_some();
            discharges = !wildcard && missing.is_empty() && !open_tail && !covered.is_empty();
            row_coverage = Some(RowCoverage {
                covered: covered.clone(),
                missing: missing.clone(),
                open_tail,
            });
        }
        _ => {}
    }

    if !wildcard && !missing.is_empty() {
        let mut diagnostic = Diagnostic::new(id, Reason::NonExhaustiveMatch)
            .with("scrutinee", scrutinee_display)
            .with("missing", missing.clone());
        if let Some(rc) = &row_coverage {
            diagnostic = diagnostic.with("effect_row_open_tail", rc.open_tail);
        }
        ctx.diag(diagnostic);
    }

    ctx.match_results.insert(
        id,
        MatchCoverage {
            wildcard,
            covered: covered.clone(),
            missing: missing.clone(),
            discharges,
            row: row_coverage.clone(),
        },
    );
    ctx.emit(Stub::BranchJoin {
        origin: id,
        scrutinee: scrutinees.first().map(|s| s.id),
        branches: branch_ids,
        discharges_result: discharges,
        row_coverage,
    });
    if discharges {
        ctx.emit(Stub::ConstraintRewrite {
            node: id,
            domain: "effect".to_string(),
            remove: covered,
            add: Vec::new(),
        });
    }

    let mut out = ctx.apply(&result.unwrap_or(Ty::Unit));
    if discharges {
        if let Some(parts) = ctx.adt.split_carrier(&out) {
            if parts.domain == "effect" {
                out = parts.value;
            }
        }
    }
    ctx.record_type(id, &out)
}
