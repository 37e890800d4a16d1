//! The marked AST.
//!
//! A parallel tree to the input AST in which every expression, pattern,
//! parameter, and declaration carries a resolved (or hole) type. Ill-typed
//! subterms appear as `Mark*` variants typed by a provenance-tagged hole;
//! nothing is ever dropped. The solver mutates marked nodes only during
//! remarking, when holes that gained a resolution are overwritten.

use rill_common::{NodeId, Span};
use rill_ast::Literal;
use serde::Serialize;

use crate::stub::RowCoverage;
use crate::ty::{Scheme, Ty};

#[derive(Clone, Debug, Default, Serialize)]
pub struct MProgram {
    pub declarations: Vec<MDecl>,
}

#[derive(Clone, Debug, Serialize)]
pub enum MDecl {
    Let(MLetDecl),
    Type(MTypeDecl),
    Op(MOpDecl),
    /// A type declaration whose name collided with an earlier one.
    MarkTypeDeclDuplicate {
        id: NodeId,
        span: Span,
        name: String,
        ty: Ty,
    },
    /// A type declaration with an invalid member (duplicate constructor,
    /// field member outside an alias, constructor with a bad return
    /// shape). The whole declaration was rolled back.
    MarkTypeDeclInvalidMember {
        id: NodeId,
        span: Span,
        name: String,
        member: Option<String>,
        ty: Ty,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct MLetDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub recursive: bool,
    pub params: Vec<MParam>,
    pub body: MExpr,
    pub ty: Ty,
    /// Generalised scheme, present on bindings that were generalised
    /// (top-level and block-level lets).
    pub scheme: Option<Scheme>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MTypeDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub ty: Ty,
}

#[derive(Clone, Debug, Serialize)]
pub struct MOpDecl {
    pub id: NodeId,
    pub span: Span,
    pub op: String,
    pub impl_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MParam {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub ty: Ty,
}

#[derive(Clone, Debug, Serialize)]
pub struct MExpr {
    pub id: NodeId,
    pub span: Span,
    pub ty: Ty,
    pub kind: MExprKind,
}

#[derive(Clone, Debug, Serialize)]
pub enum MExprKind {
    Ident(String),
    Literal(Literal),
    Ctor {
        name: String,
        args: Vec<MExpr>,
    },
    Tuple(Vec<MExpr>),
    RecordLit(Vec<(String, MExpr)>),
    Projection {
        target: Box<MExpr>,
        field: String,
    },
    Call {
        callee: Box<MExpr>,
        args: Vec<MExpr>,
    },
    Binary {
        op: String,
        lhs: Box<MExpr>,
        rhs: Box<MExpr>,
    },
    Unary {
        op: String,
        operand: Box<MExpr>,
    },
    Arrow {
        params: Vec<MParam>,
        body: Box<MExpr>,
    },
    Block {
        stmts: Vec<MStmt>,
        result: Option<Box<MExpr>>,
    },
    Match {
        scrutinees: Vec<MExpr>,
        arms: Vec<MMatchArm>,
        coverage: Option<MatchCoverage>,
    },
    Annotated {
        value: Box<MExpr>,
        annotation: MTypeExpr,
    },
    Hole,

    // ── Marks ───────────────────────────────────────────────────────────
    MarkFreeVar {
        name: String,
    },
    MarkNotFunction {
        callee: Ty,
    },
    MarkOccursCheck {
        left: Ty,
        right: Ty,
    },
    MarkInconsistent {
        expected: Ty,
        actual: Ty,
    },
    MarkUnsupportedExpr {
        expr_kind: String,
    },
    MarkInternal {
        reason: String,
    },
}

impl MExprKind {
    /// Short tag for marked variants; `None` for ordinary nodes.
    pub fn mark_tag(&self) -> Option<&'static str> {
        match self {
            MExprKind::MarkFreeVar { .. } => Some("free_var"),
            MExprKind::MarkNotFunction { .. } => Some("not_function"),
            MExprKind::MarkOccursCheck { .. } => Some("occurs_check"),
            MExprKind::MarkInconsistent { .. } => Some("inconsistent"),
            MExprKind::MarkUnsupportedExpr { .. } => Some("unsupported_expr"),
            MExprKind::MarkInternal { .. } => Some("internal"),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum MStmt {
    Let(MLetDecl),
    Expr(MExpr),
}

#[derive(Clone, Debug, Serialize)]
pub struct MMatchArm {
    pub id: NodeId,
    pub span: Span,
    pub patterns: Vec<MPattern>,
    pub body: MExpr,
}

#[derive(Clone, Debug, Serialize)]
pub struct MPattern {
    pub id: NodeId,
    pub span: Span,
    pub ty: Ty,
    pub kind: MPatternKind,
}

#[derive(Clone, Debug, Serialize)]
pub enum MPatternKind {
    Wildcard,
    Var(String),
    Literal(Literal),
    Tuple(Vec<MPattern>),
    Ctor {
        name: String,
        args: Vec<MPattern>,
    },
    /// A variable bound twice within one pattern.
    MarkDuplicateBinding {
        name: String,
    },
    /// A constructor pattern naming an unknown constructor.
    MarkFreeCtor {
        name: String,
    },
    /// A pattern that contradicted the scrutinee type.
    MarkInconsistent {
        expected: Ty,
        actual: Ty,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct MTypeExpr {
    pub id: NodeId,
    pub span: Span,
    pub ty: Ty,
    pub kind: MTypeExprKind,
}

#[derive(Clone, Debug, Serialize)]
pub enum MTypeExprKind {
    Resolved,
    MarkUnknown {
        name: String,
    },
    MarkArity {
        name: String,
        expected: usize,
        actual: usize,
    },
    MarkUnsupported {
        reason: String,
    },
}

/// Coverage metadata a match bundle retains from inference.
#[derive(Clone, Debug, Serialize)]
pub struct MatchCoverage {
    /// An arm had a wildcard or variable pattern.
    pub wildcard: bool,
    pub covered: Vec<String>,
    pub missing: Vec<String>,
    /// The match discharges an effect row (covers every label of a
    /// closed row without a wildcard).
    pub discharges: bool,
    pub row: Option<RowCoverage>,
}

// ── Visitors ───────────────────────────────────────────────────────────

/// Visit every typed node of the program mutably. Used by remarking to
/// apply the final substitution and fill resolved holes in place.
pub fn for_each_type_mut(program: &mut MProgram, f: &mut impl FnMut(NodeId, &mut Ty)) {
    for decl in &mut program.declarations {
        match decl {
            MDecl::Let(l) => let_types_mut(l, f),
            MDecl::Type(t) => f(t.id, &mut t.ty),
            MDecl::Op(_) => {}
            MDecl::MarkTypeDeclDuplicate { id, ty, .. }
            | MDecl::MarkTypeDeclInvalidMember { id, ty, .. } => f(*id, ty),
        }
    }
}

fn let_types_mut(decl: &mut MLetDecl, f: &mut impl FnMut(NodeId, &mut Ty)) {
    f(decl.id, &mut decl.ty);
    for param in &mut decl.params {
        f(param.id, &mut param.ty);
    }
    expr_types_mut(&mut decl.body, f);
}

fn pattern_types_mut(pat: &mut MPattern, f: &mut impl FnMut(NodeId, &mut Ty)) {
    f(pat.id, &mut pat.ty);
    match &mut pat.kind {
        MPatternKind::Tuple(elems) => {
            for p in elems {
                pattern_types_mut(p, f);
            }
        }
        MPatternKind::Ctor { args, .. } => {
            for p in args {
                pattern_types_mut(p, f);
            }
        }
        _ => {}
    }
}

fn expr_types_mut(expr: &mut MExpr, f: &mut impl FnMut(NodeId, &mut Ty)) {
    f(expr.id, &mut expr.ty);
    match &mut expr.kind {
        MExprKind::Ctor { args, .. } | MExprKind::Tuple(args) => {
            for a in args {
                expr_types_mut(a, f);
            }
        }
        MExprKind::RecordLit(fields) => {
            for (_, value) in fields {
                expr_types_mut(value, f);
            }
        }
        MExprKind::Projection { target, .. } => expr_types_mut(target, f),
        MExprKind::Call { callee, args } => {
            expr_types_mut(callee, f);
            for a in args {
                expr_types_mut(a, f);
            }
        }
        MExprKind::Binary { lhs, rhs, .. } => {
            expr_types_mut(lhs, f);
            expr_types_mut(rhs, f);
        }
        MExprKind::Unary { operand, .. } => expr_types_mut(operand, f),
        MExprKind::Arrow { params, body } => {
            for param in params {
                f(param.id, &mut param.ty);
            }
            expr_types_mut(body, f);
        }
        MExprKind::Block { stmts, result } => {
            for stmt in stmts {
                match stmt {
                    MStmt::Let(l) => let_types_mut(l, f),
                    MStmt::Expr(e) => expr_types_mut(e, f),
                }
            }
            if let Some(result) = result {
                expr_types_mut(result, f);
            }
        }
        MExprKind::Match {
            scrutinees, arms, ..
        } => {
            for s in scrutinees {
                expr_types_mut(s, f);
            }
            for arm in arms {
                for p in &mut arm.patterns {
                    pattern_types_mut(p, f);
                }
                expr_types_mut(&mut arm.body, f);
            }
        }
        MExprKind::Annotated { value, annotation } => {
            expr_types_mut(value, f);
            f(annotation.id, &mut annotation.ty);
        }
        _ => {}
    }
}

/// Metadata handed to read-only whole-program visitors.
pub struct NodeMeta<'a> {
    pub id: NodeId,
    pub span: Span,
    pub ty: &'a Ty,
    /// Node kind tag, e.g. `"call"`, `"pattern"`, `"param"`.
    pub kind: &'static str,
    /// Mark tag for marked nodes.
    pub mark: Option<&'static str>,
}

/// Visit every typed node of the program read-only, in pre-order.
pub fn for_each_node(program: &MProgram, f: &mut impl FnMut(NodeMeta<'_>)) {
    for decl in &program.declarations {
        match decl {
            MDecl::Let(l) => let_nodes(l, f),
            MDecl::Type(t) => f(NodeMeta {
                id: t.id,
                span: t.span,
                ty: &t.ty,
                kind: "type_decl",
                mark: None,
            }),
            MDecl::Op(_) => {}
            MDecl::MarkTypeDeclDuplicate { id, span, ty, .. } => f(NodeMeta {
                id: *id,
                span: *span,
                ty,
                kind: "type_decl",
                mark: Some("type_decl_duplicate"),
            }),
            MDecl::MarkTypeDeclInvalidMember { id, span, ty, .. } => f(NodeMeta {
                id: *id,
                span: *span,
                ty,
                kind: "type_decl",
                mark: Some("type_decl_invalid_member"),
            }),
        }
    }
}

fn let_nodes(decl: &MLetDecl, f: &mut impl FnMut(NodeMeta<'_>)) {
    f(NodeMeta {
        id: decl.id,
        span: decl.span,
        ty: &decl.ty,
        kind: "let",
        mark: None,
    });
    for param in &decl.params {
        f(NodeMeta {
            id: param.id,
            span: param.span,
            ty: &param.ty,
            kind: "param",
            mark: None,
        });
    }
    expr_nodes(&decl.body, f);
}

fn pattern_nodes(pat: &MPattern, f: &mut impl FnMut(NodeMeta<'_>)) {
    let mark = match &pat.kind {
        MPatternKind::MarkDuplicateBinding { .. } => Some("duplicate_binding"),
        MPatternKind::MarkFreeCtor { .. } => Some("free_ctor"),
        MPatternKind::MarkInconsistent { .. } => Some("inconsistent"),
        _ => None,
    };
    f(NodeMeta {
        id: pat.id,
        span: pat.span,
        ty: &pat.ty,
        kind: "pattern",
        mark,
    });
    match &pat.kind {
        MPatternKind::Tuple(elems) => {
            for p in elems {
                pattern_nodes(p, f);
            }
        }
        MPatternKind::Ctor { args, .. } => {
            for p in args {
                pattern_nodes(p, f);
            }
        }
        _ => {}
    }
}

fn expr_nodes(expr: &MExpr, f: &mut impl FnMut(NodeMeta<'_>)) {
    f(NodeMeta {
        id: expr.id,
        span: expr.span,
        ty: &expr.ty,
        kind: "expr",
        mark: expr.kind.mark_tag(),
    });
    match &expr.kind {
        MExprKind::Ctor { args, .. } | MExprKind::Tuple(args) => {
            for a in args {
                expr_nodes(a, f);
            }
        }
        MExprKind::RecordLit(fields) => {
            for (_, value) in fields {
                expr_nodes(value, f);
            }
        }
        MExprKind::Projection { target, .. } => expr_nodes(target, f),
        MExprKind::Call { callee, args } => {
            expr_nodes(callee, f);
            for a in args {
                expr_nodes(a, f);
            }
        }
        MExprKind::Binary { lhs, rhs, .. } => {
            expr_nodes(lhs, f);
            expr_nodes(rhs, f);
        }
        MExprKind::Unary { operand, .. } => expr_nodes(operand, f),
        MExprKind::Arrow { params, body } => {
            for param in params {
                f(NodeMeta {
                    id: param.id,
                    span: param.span,
                    ty: &param.ty,
                    kind: "param",
                    mark: None,
                });
            }
            expr_nodes(body, f);
        }
        MExprKind::Block { stmts, result } => {
            for stmt in stmts {
                match stmt {
                    MStmt::Let(l) => let_nodes(l, f),
                    MStmt::Expr(e) => expr_nodes(e, f),
                }
            }
            if let Some(result) = result {
                expr_nodes(result, f);
            }
        }
        MExprKind::Match {
            scrutinees, arms, ..
        } => {
            for s in scrutinees {
                expr_nodes(s, f);
            }
            for arm in arms {
                for p in &arm.patterns {
                    pattern_nodes(p, f);
                }
                expr_nodes(&arm.body, f);
            }
        }
        MExprKind::Annotated { value, annotation } => {
            expr_nodes(value, f);
            f(NodeMeta {
                id: annotation.id,
                span: annotation.span,
                ty: &annotation.ty,
                kind: "type_expr",
                mark: match &annotation.kind {
                    MTypeExprKind::Resolved => None,
                    MTypeExprKind::MarkUnknown { .. } => Some("type_expr_unknown"),
                    MTypeExprKind::MarkArity { .. } => Some("type_expr_arity"),
                    MTypeExprKind::MarkUnsupported { .. } => Some("type_expr_unsupported"),
                },
            });
        }
        _ => {}
    }
}
