//! Pattern nodes.

use rill_common::{NodeId, Span};
use serde::Serialize;

use crate::expr::Literal;

/// A pattern. Patterns appear in match arms and (before parameter
/// lowering) in function parameters.
#[derive(Clone, Debug, Serialize)]
pub struct Pattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: PatternKind,
}

#[derive(Clone, Debug, Serialize)]
pub enum PatternKind {
    /// `_` -- matches anything, binds nothing.
    Wildcard,
    /// `x` -- matches anything, binds the scrutinee.
    Var(String),
    /// A literal pattern: `0`, `'a'`, `true`.
    Literal(Literal),
    /// A tuple pattern: `(a, b)`.
    Tuple(Vec<Pattern>),
    /// A constructor pattern: `Cons(head, tail)`. Also covers effect-row
    /// label patterns, which are distinguished by the scrutinee type.
    Ctor { name: String, args: Vec<Pattern> },
}

impl Pattern {
    /// Whether this pattern matches every value of the scrutinee type.
    pub fn is_irrefutable(&self) -> bool {
        matches!(self.kind, PatternKind::Wildcard | PatternKind::Var(_))
    }

    /// Variable introduced by a bare variable pattern, if any.
    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            PatternKind::Var(name) => Some(name),
            _ => None,
        }
    }
}
