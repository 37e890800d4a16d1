//! Type expression nodes (surface syntax for types).

use rill_common::{NodeId, Span};
use serde::Serialize;

/// A type expression as written in the source: annotations, constructor
/// argument types, alias bodies.
#[derive(Clone, Debug, Serialize)]
pub struct TypeExpr {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Clone, Debug, Serialize)]
pub enum TypeExprKind {
    /// A bare name: `Int`, `Bool`, or a nullary ADT.
    Name(String),
    /// An applied name: `List<Int>`, `Eff<a, {io}>`.
    Apply { name: String, args: Vec<TypeExpr> },
    /// A function type: `Int -> Bool`. Right-associative in the source.
    Func {
        from: Box<TypeExpr>,
        to: Box<TypeExpr>,
    },
    /// A tuple type: `(Int, Char)`.
    Tuple(Vec<TypeExpr>),
    /// A record type: `{x: Int, y: Int}`.
    Record(Vec<(String, TypeExpr)>),
    /// An effect row: `{io, raise(String) | r}`. Cases map label names to
    /// optional payload types; the tail names an open row variable.
    Row {
        cases: Vec<(String, Option<TypeExpr>)>,
        tail: Option<String>,
    },
    /// A lowercase type variable: `a`.
    Var(String),
    /// A user-written hole in type position: `?`.
    Hole,
}

impl TypeExpr {
    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TypeExprKind::Name(_) => "name",
            TypeExprKind::Apply { .. } => "apply",
            TypeExprKind::Func { .. } => "func",
            TypeExprKind::Tuple(_) => "tuple",
            TypeExprKind::Record(_) => "record",
            TypeExprKind::Row { .. } => "row",
            TypeExprKind::Var(_) => "var",
            TypeExprKind::Hole => "hole",
        }
    }
}
