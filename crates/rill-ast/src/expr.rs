//! Expression nodes.

use rill_common::{NodeId, Span};
use serde::Serialize;

use crate::item::{LetDecl, Param};
use crate::pat::Pattern;
use crate::ty_expr::TypeExpr;

/// An expression. Every expression owns a stable id and a source span.
#[derive(Clone, Debug, Serialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

/// The expression grammar the parser produces.
///
/// Multi-argument functions are curried during inference; the surface
/// syntax keeps argument lists flat.
#[derive(Clone, Debug, Serialize)]
pub enum ExprKind {
    /// A variable reference.
    Ident(String),
    /// A literal value.
    Literal(Literal),
    /// A constructor application: `Cons(x, rest)` or a bare `Nil`.
    Ctor { name: String, args: Vec<Expr> },
    /// A tuple literal: `(a, b, c)`.
    Tuple(Vec<Expr>),
    /// A record literal: `{x: 1, y: 2}`. Field order is source order;
    /// duplicate names are diagnosed by the type checker, not the parser.
    RecordLit(Vec<(String, Expr)>),
    /// A record projection: `point.x`.
    Projection { target: Box<Expr>, field: String },
    /// A call: `f(a, b)`.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// A binary operator application: `a + b`. Operators resolve through
    /// `infix` declarations to an implementation function.
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A prefix operator application: `!b`.
    Unary { op: String, operand: Box<Expr> },
    /// An arrow function: `(x, y) => { body }`.
    Arrow {
        params: Vec<Param>,
        return_annotation: Option<TypeExpr>,
        body: Box<Expr>,
    },
    /// A block: statements followed by an optional result expression.
    Block {
        stmts: Vec<Stmt>,
        result: Option<Box<Expr>>,
    },
    /// A match over one or more scrutinees.
    Match {
        scrutinees: Vec<Expr>,
        arms: Vec<MatchArm>,
    },
    /// A function defined directly by match arms (`match_fn` and
    /// first-class match bundle literals both parse to this; a bundle
    /// literal is a `MatchFn` of arity 1).
    MatchFn { arity: usize, arms: Vec<MatchArm> },
    /// An explicitly annotated expression: `e : T`.
    Annotated {
        value: Box<Expr>,
        annotation: TypeExpr,
    },
    /// A user-written typed hole: `?`.
    Hole,
}

/// A statement inside a block.
#[derive(Clone, Debug, Serialize)]
pub enum Stmt {
    Let(LetDecl),
    Expr(Expr),
}

/// One arm of a match: one pattern per scrutinee, then a body.
#[derive(Clone, Debug, Serialize)]
pub struct MatchArm {
    pub id: NodeId,
    pub span: Span,
    pub patterns: Vec<Pattern>,
    pub body: Expr,
}

/// Literal values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Char(char),
    Str(String),
    Unit,
}

impl Literal {
    /// Short kind name used in diagnostics and hole reasons.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Int(_) => "int",
            Literal::Bool(_) => "bool",
            Literal::Char(_) => "char",
            Literal::Str(_) => "string",
            Literal::Unit => "unit",
        }
    }
}

impl Expr {
    /// Short kind name used in diagnostics and hole reasons.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Ident(_) => "identifier",
            ExprKind::Literal(_) => "literal",
            ExprKind::Ctor { .. } => "constructor",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::RecordLit(_) => "record_literal",
            ExprKind::Projection { .. } => "record_projection",
            ExprKind::Call { .. } => "call",
            ExprKind::Binary { .. } => "binary",
            ExprKind::Unary { .. } => "unary",
            ExprKind::Arrow { .. } => "arrow",
            ExprKind::Block { .. } => "block",
            ExprKind::Match { .. } => "match",
            ExprKind::MatchFn { .. } => "match_fn",
            ExprKind::Annotated { .. } => "annotated",
            ExprKind::Hole => "hole",
        }
    }
}
