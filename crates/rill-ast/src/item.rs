//! Top-level declarations and the program root.

use rill_common::{NodeId, Span};
use serde::Serialize;

use crate::expr::Expr;
use crate::pat::Pattern;
use crate::ty_expr::TypeExpr;

/// A whole compilation unit as produced by the parser.
///
/// `imports` and `reexports` are resolved by the module loader before the
/// type checker runs; the checker sees their effect only through
/// `initial_env` / `initial_adt_env` options.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Program {
    pub imports: Vec<String>,
    pub reexports: Vec<String>,
    pub declarations: Vec<TopLevel>,
}

#[derive(Clone, Debug, Serialize)]
pub enum TopLevel {
    Let(LetDecl),
    Type(TypeDecl),
    Infix(OpDecl),
    Prefix(OpDecl),
    Domain(DomainDecl),
    OpRule(OpRuleDecl),
    Policy(PolicyDecl),
    Annotate(AnnotateDecl),
}

/// A `let` binding, top-level or nested in a block.
///
/// `let f = (x) => { ... }` parses with the arrow as the body and no
/// params here; `let f(x) = ...` sugar parses with params directly on the
/// declaration. Inference treats both the same after parameter lowering.
#[derive(Clone, Debug, Serialize)]
pub struct LetDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    /// `let rec`. Consecutive recursive declarations form one mutual
    /// group.
    pub recursive: bool,
    pub params: Vec<Param>,
    pub return_annotation: Option<TypeExpr>,
    pub body: Expr,
}

/// A function parameter. Before parameter lowering the pattern may be a
/// tuple or constructor pattern; after lowering it is always a bare
/// variable.
#[derive(Clone, Debug, Serialize)]
pub struct Param {
    pub id: NodeId,
    pub span: Span,
    pub pattern: Pattern,
    pub annotation: Option<TypeExpr>,
}

/// A `type` declaration: a sum type, a record type, or an alias.
#[derive(Clone, Debug, Serialize)]
pub struct TypeDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    /// Declared type parameter names, e.g. `["a"]` for `List<a>`.
    pub params: Vec<String>,
    /// Constructor (and, in malformed programs, field) members. Empty for
    /// aliases.
    pub members: Vec<TypeMember>,
    /// `type Foo = Bar<Int>` alias body. Record aliases declare the
    /// ADT's record fields.
    pub alias: Option<TypeExpr>,
}

#[derive(Clone, Debug, Serialize)]
pub enum TypeMember {
    Ctor(CtorDecl),
    /// A field member. Only valid through a record alias; a field member
    /// directly inside a sum declaration is an invalid member.
    Field(FieldDecl),
}

/// One constructor of a sum type.
#[derive(Clone, Debug, Serialize)]
pub struct CtorDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub args: Vec<TypeExpr>,
}

/// A field member inside a type declaration.
#[derive(Clone, Debug, Serialize)]
pub struct FieldDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub ty: TypeExpr,
}

/// Operator class, declared alongside the fixity. Drives which deferred
/// stub (numeric or boolean) the inferencer emits at operator uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OpClass {
    Numeric,
    Comparison,
    Boolean,
}

/// An `infix` or `prefix` declaration binding an operator symbol to an
/// implementation function already in scope.
#[derive(Clone, Debug, Serialize)]
pub struct OpDecl {
    pub id: NodeId,
    pub span: Span,
    pub op: String,
    pub impl_name: String,
    pub class: Option<OpClass>,
}

/// A `domain` declaration: registers a constraint-label domain with its
/// merge policy, conflict pairs, and optional return-boundary policy.
/// String fields are raw parser output; the solver's registry parses and
/// validates them.
#[derive(Clone, Debug, Serialize)]
pub struct DomainDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    /// `"plain"` or `"rowbag"`.
    pub state_kind: String,
    /// `"union"`, `"keep_left"`, or `"keep_right"`.
    pub merge: String,
    pub conflict_pairs: Vec<(String, String)>,
    /// `"must_be_carrier"` or `"must_be_empty"`, when present.
    pub boundary: Option<String>,
    /// Carrier constructor name for this domain, when one exists.
    pub carrier: Option<String>,
}

/// An `op` declaration: calling `function` adds or removes tags in
/// `domain` at the call site.
#[derive(Clone, Debug, Serialize)]
pub struct OpRuleDecl {
    pub id: NodeId,
    pub span: Span,
    pub function: String,
    pub domain: String,
    pub adds: Vec<String>,
    pub removes: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PolicyKind {
    RequireExact,
    RequireAny,
    RequireNot,
    RejectsInfection,
    RejectsDomains,
}

/// A `policy` declaration: arguments passed to `function` must satisfy
/// the given state requirement in `domain`.
#[derive(Clone, Debug, Serialize)]
pub struct PolicyDecl {
    pub id: NodeId,
    pub span: Span,
    pub function: String,
    pub domain: String,
    pub policy: PolicyKind,
    /// Tags for `RequireExact` / `RequireNot`.
    pub tags: Vec<String>,
    /// Domain names for `RejectsDomains`.
    pub domains: Vec<String>,
}

/// An `annotate` declaration: the body of `function` carries the given
/// tags, optionally checked against the boundary policy at its return.
#[derive(Clone, Debug, Serialize)]
pub struct AnnotateDecl {
    pub id: NodeId,
    pub span: Span,
    pub function: String,
    pub domain: String,
    pub tags: Vec<String>,
    pub at_return: bool,
}
