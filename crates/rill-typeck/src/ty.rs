//! Type representation for the Rill type system.
//!
//! Defines the core `Ty` enum, type variables (`TyVar`), polymorphic type
//! schemes (`Scheme`), and -- the distinctive part -- provenance-tagged
//! holes. A hole is a first-class type standing for "unknown", and its
//! provenance records *why* it is unknown. Two holes with different
//! provenance are different types.

use std::collections::BTreeMap;
use std::fmt;

use rill_common::NodeId;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// A unification variable, identified by a `u32` allocated per context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TyVar(pub u32);

impl fmt::Display for TyVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// Per-context type-variable allocator.
///
/// Deliberately not process-global; independent compilation units each own
/// one, which makes typing units in parallel trivial.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VarAlloc {
    next: u32,
}

impl VarAlloc {
    pub fn new() -> Self {
        VarAlloc { next: 0 }
    }

    /// Resume allocation after `count` variables have already been handed
    /// out (the solver continues where inference stopped).
    pub fn starting_at(count: u32) -> Self {
        VarAlloc { next: count }
    }

    pub fn fresh(&mut self) -> TyVar {
        let v = TyVar(self.next);
        self.next += 1;
        v
    }

    pub fn allocated(&self) -> u32 {
        self.next
    }
}

/// Identity of a hole. Equal to the id of the AST node that originated it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HoleId(pub NodeId);

impl fmt::Display for HoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hole{}", self.0)
    }
}

/// A row-polymorphic effect row: a mapping from label names to optional
/// payload types, with an optional row-variable tail for open rows.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EffectRow {
    pub cases: BTreeMap<String, Option<Ty>>,
    pub tail: Option<TyVar>,
}

impl EffectRow {
    pub fn closed(cases: BTreeMap<String, Option<Ty>>) -> Self {
        EffectRow { cases, tail: None }
    }

    pub fn empty() -> Self {
        EffectRow {
            cases: BTreeMap::new(),
            tail: None,
        }
    }

    /// Row of bare tags with no payloads. The common shape for
    /// constraint labels.
    pub fn from_tags<I: IntoIterator<Item = S>, S: Into<String>>(tags: I) -> Self {
        EffectRow {
            cases: tags.into_iter().map(|t| (t.into(), None)).collect(),
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty() && self.tail.is_none()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.cases.keys().map(String::as_str)
    }
}

/// A Rill type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Ty {
    /// An inference variable, resolved through the substitution.
    Var(TyVar),
    Int,
    Bool,
    Char,
    String,
    Unit,
    /// A unary function type. Multi-argument functions are curried.
    Func(Box<Ty>, Box<Ty>),
    /// A tuple type, fixed arity.
    Tuple(Vec<Ty>),
    /// A record type. Semantically unordered; stored sorted by field name.
    Record(BTreeMap<String, Ty>),
    /// An applied named ADT: `List<Int>`, `Ordering`.
    Ctor { name: String, args: Vec<Ty> },
    /// A row-polymorphic effect row.
    Row(EffectRow),
    /// A hole: an unknown type whose provenance says why it is unknown.
    Hole(Provenance),
}

/// Why a hole is a hole.
///
/// Provenance is part of the type: holes with different provenances do not
/// compare equal, and unification treats every hole as compatible with
/// everything without learning anything from it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Provenance {
    /// The user wrote `?`.
    UserHole,
    /// Allocated for an expression whose type is deferred to the solver
    /// (e.g. a record projection result).
    ExprHole,
    /// Inference could not finish this node; the reason names what was
    /// missing, e.g. `expr.call`.
    Incomplete { reason: String },
    /// An unbound identifier.
    FreeVar { name: String },
    /// Something that is not a function was applied.
    NotFunction { callee: Box<Ty> },
    /// Unification would have built an infinite type.
    OccursCheck { left: Box<Ty>, right: Box<Ty> },
    /// A local contradiction between two concrete types.
    Inconsistent { expected: Box<Ty>, actual: Box<Ty> },
    /// A type expression referenced an unknown name.
    TypeExprUnknown { name: String },
    /// A type expression applied a name at the wrong arity.
    TypeExprArity {
        name: String,
        expected: usize,
        actual: usize,
    },
    /// A type expression shape the translator does not support.
    TypeExprUnsupported { reason: String },
    /// An internal invariant failed; the pipeline kept going.
    Internal { reason: String },
    /// The solver found mutually incompatible requirements on this hole.
    Unfillable {
        hole: HoleId,
        conflicts: Vec<Conflict>,
    },
}

impl Provenance {
    /// Short tag used in display output and node views.
    pub fn tag(&self) -> &'static str {
        match self {
            Provenance::UserHole => "user",
            Provenance::ExprHole => "expr",
            Provenance::Incomplete { .. } => "incomplete",
            Provenance::FreeVar { .. } => "free",
            Provenance::NotFunction { .. } => "not_function",
            Provenance::OccursCheck { .. } => "occurs",
            Provenance::Inconsistent { .. } => "inconsistent",
            Provenance::TypeExprUnknown { .. } => "type_expr_unknown",
            Provenance::TypeExprArity { .. } => "type_expr_arity",
            Provenance::TypeExprUnsupported { .. } => "type_expr_unsupported",
            Provenance::Internal { .. } => "internal",
            Provenance::Unfillable { .. } => "unfillable",
        }
    }

    /// The hole-registry category this provenance falls into.
    pub fn category(&self) -> HoleCategory {
        match self {
            Provenance::UserHole | Provenance::ExprHole | Provenance::Incomplete { .. } => {
                HoleCategory::Incomplete
            }
            Provenance::FreeVar { .. } => HoleCategory::Free,
            Provenance::Internal { .. } => HoleCategory::Internal,
            _ => HoleCategory::LocalConflict,
        }
    }
}

/// A pair of types the solver could not reconcile on one hole.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Conflict {
    pub left: Ty,
    pub right: Ty,
}

/// Classification of a hole in the hole registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HoleCategory {
    Free,
    LocalConflict,
    Incomplete,
    Internal,
}

/// Registry entry for one hole.
#[derive(Clone, Debug, Serialize)]
pub struct UnknownInfo {
    pub provenance: Provenance,
    pub category: HoleCategory,
    /// The node the hole was minted at. Equals the hole id.
    pub origin: NodeId,
    /// Other nodes implicated in the failure (e.g. both sides of a
    /// mismatched call).
    pub related: Vec<NodeId>,
}

impl Ty {
    pub fn func(from: Ty, to: Ty) -> Ty {
        Ty::Func(Box::new(from), Box::new(to))
    }

    /// Right-associated curried function over a parameter list. An empty
    /// list gives `Unit -> ret`.
    pub fn func_chain(params: Vec<Ty>, ret: Ty) -> Ty {
        if params.is_empty() {
            return Ty::func(Ty::Unit, ret);
        }
        params
            .into_iter()
            .rev()
            .fold(ret, |acc, p| Ty::func(p, acc))
    }

    pub fn ctor(name: impl Into<String>, args: Vec<Ty>) -> Ty {
        Ty::Ctor {
            name: name.into(),
            args,
        }
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::ctor("List", vec![elem])
    }

    pub fn ordering() -> Ty {
        Ty::ctor("Ordering", vec![])
    }

    pub fn record(fields: Vec<(&str, Ty)>) -> Ty {
        Ty::Record(fields.into_iter().map(|(n, t)| (n.to_string(), t)).collect())
    }

    pub fn hole(provenance: Provenance) -> Ty {
        Ty::Hole(provenance)
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Ty::Hole(_))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Ty::Var(_))
    }

    /// Whether any hole occurs anywhere in the type. Provenance payloads
    /// are opaque: a hole is a hole, regardless of what its provenance
    /// embeds.
    pub fn contains_hole(&self) -> bool {
        match self {
            Ty::Hole(_) => true,
            Ty::Var(_) | Ty::Int | Ty::Bool | Ty::Char | Ty::String | Ty::Unit => false,
            Ty::Func(from, to) => from.contains_hole() || to.contains_hole(),
            Ty::Tuple(elems) => elems.iter().any(Ty::contains_hole),
            Ty::Record(fields) => fields.values().any(Ty::contains_hole),
            Ty::Ctor { args, .. } => args.iter().any(Ty::contains_hole),
            Ty::Row(row) => row
                .cases
                .values()
                .any(|p| p.as_ref().is_some_and(Ty::contains_hole)),
        }
    }

    /// Whether any unbound variable occurs in the type.
    pub fn contains_var(&self) -> bool {
        let mut vars = Vec::new();
        collect_vars(self, &mut vars);
        !vars.is_empty()
    }

    /// All variables occurring in the type (including row tails), in
    /// order of first appearance, with duplicates.
    pub fn vars(&self) -> Vec<TyVar> {
        let mut vars = Vec::new();
        collect_vars(self, &mut vars);
        vars
    }
}

/// Collect variable occurrences in first-appearance order. Hole
/// provenances are not descended into: their payloads are diagnostics,
/// not live structure.
pub fn collect_vars(ty: &Ty, out: &mut Vec<TyVar>) {
    match ty {
        Ty::Var(v) => out.push(*v),
        Ty::Int | Ty::Bool | Ty::Char | Ty::String | Ty::Unit | Ty::Hole(_) => {}
        Ty::Func(from, to) => {
            collect_vars(from, out);
            collect_vars(to, out);
        }
        Ty::Tuple(elems) => {
            for e in elems {
                collect_vars(e, out);
            }
        }
        Ty::Record(fields) => {
            for t in fields.values() {
                collect_vars(t, out);
            }
        }
        Ty::Ctor { args, .. } => {
            for a in args {
                collect_vars(a, out);
            }
        }
        Ty::Row(row) => {
            for payload in row.cases.values() {
                if let Some(p) = payload {
                    collect_vars(p, out);
                }
            }
            if let Some(tail) = row.tail {
                out.push(tail);
            }
        }
    }
}

/// Remap variable ids in a type according to the given mapping. Unmapped
/// variables are left alone.
pub fn remap_vars(ty: &Ty, mapping: &FxHashMap<TyVar, TyVar>) -> Ty {
    match ty {
        Ty::Var(v) => Ty::Var(mapping.get(v).copied().unwrap_or(*v)),
        Ty::Int | Ty::Bool | Ty::Char | Ty::String | Ty::Unit | Ty::Hole(_) => ty.clone(),
        Ty::Func(from, to) => Ty::func(remap_vars(from, mapping), remap_vars(to, mapping)),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| remap_vars(e, mapping)).collect()),
        Ty::Record(fields) => Ty::Record(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), remap_vars(t, mapping)))
                .collect(),
        ),
        Ty::Ctor { name, args } => Ty::Ctor {
            name: name.clone(),
            args: args.iter().map(|a| remap_vars(a, mapping)).collect(),
        },
        Ty::Row(row) => Ty::Row(EffectRow {
            cases: row
                .cases
                .iter()
                .map(|(l, p)| (l.clone(), p.as_ref().map(|t| remap_vars(t, mapping))))
                .collect(),
            tail: row.tail.map(|t| mapping.get(&t).copied().unwrap_or(t)),
        }),
    }
}

/// Attach a resolved tail to an effect row's cases.
///
/// When a row variable turns out to be another row, the two case maps are
/// merged (left-biased on shared labels) and the inner tail is adopted.
/// A hole in tail position closes the row: gradual typing learns nothing
/// from holes, so there is no remainder left to track.
pub fn graft_row(cases: BTreeMap<String, Option<Ty>>, tail_ty: Ty) -> Ty {
    match tail_ty {
        Ty::Row(inner) => {
            let mut merged = cases;
            for (label, payload) in inner.cases {
                merged.entry(label).or_insert(payload);
            }
            Ty::Row(EffectRow {
                cases: merged,
                tail: inner.tail,
            })
        }
        Ty::Var(v) => Ty::Row(EffectRow {
            cases,
            tail: Some(v),
        }),
        _ => Ty::Row(EffectRow { cases, tail: None }),
    }
}

/// Replace variables by whole types according to the mapping. Used for
/// alias expansion and scheme instantiation; unmapped variables stay.
pub fn subst_vars(ty: &Ty, mapping: &FxHashMap<TyVar, Ty>) -> Ty {
    match ty {
        Ty::Var(v) => mapping.get(v).cloned().unwrap_or_else(|| ty.clone()),
        Ty::Int | Ty::Bool | Ty::Char | Ty::String | Ty::Unit | Ty::Hole(_) => ty.clone(),
        Ty::Func(from, to) => Ty::func(subst_vars(from, mapping), subst_vars(to, mapping)),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| subst_vars(e, mapping)).collect()),
        Ty::Record(fields) => Ty::Record(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), subst_vars(t, mapping)))
                .collect(),
        ),
        Ty::Ctor { name, args } => Ty::Ctor {
            name: name.clone(),
            args: args.iter().map(|a| subst_vars(a, mapping)).collect(),
        },
        Ty::Row(row) => {
            let cases: BTreeMap<String, Option<Ty>> = row
                .cases
                .iter()
                .map(|(l, p)| (l.clone(), p.as_ref().map(|t| subst_vars(t, mapping))))
                .collect();
            match row.tail {
                Some(tail) => match mapping.get(&tail) {
                    Some(tail_ty) => graft_row(cases, tail_ty.clone()),
                    None => Ty::Row(EffectRow {
                        cases,
                        tail: Some(tail),
                    }),
                },
                None => Ty::Row(EffectRow { cases, tail: None }),
            }
        }
    }
}

/// A polymorphic type scheme: a type with universally quantified
/// variables. `identity` is `Scheme { vars: [a], ty: a -> a }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Scheme {
    pub vars: Vec<TyVar>,
    pub ty: Ty,
}

impl Scheme {
    /// A monomorphic scheme (no quantified variables).
    pub fn mono(ty: Ty) -> Self {
        Scheme {
            vars: Vec::new(),
            ty,
        }
    }

    /// Create a self-contained scheme from a resolved type by collecting
    /// all free variables and remapping them to sequential ids from 0.
    ///
    /// Exported summaries go through this so they are independent of the
    /// originating context's variable counter; without it, ids from one
    /// unit would collide with another unit's allocator.
    pub fn normalize_from_ty(ty: Ty) -> Self {
        let seen = ty.vars();
        if seen.is_empty() {
            return Scheme::mono(ty);
        }
        let mut mapping: FxHashMap<TyVar, TyVar> = FxHashMap::default();
        let mut next: u32 = 0;
        for var in &seen {
            mapping.entry(*var).or_insert_with(|| {
                let v = TyVar(next);
                next += 1;
                v
            });
        }
        let mut vars: Vec<TyVar> = Vec::new();
        for var in &seen {
            let mapped = mapping[var];
            if !vars.contains(&mapped) {
                vars.push(mapped);
            }
        }
        Scheme {
            vars,
            ty: remap_vars(&ty, &mapping),
        }
    }

    /// Normalize an existing scheme (quantifiers become dense 0-based).
    pub fn normalized(&self) -> Scheme {
        Scheme::normalize_from_ty(self.ty.clone())
    }
}

// ── Display ────────────────────────────────────────────────────────────

/// Quantifier display names: a, b, ..., z, a1, b1, ...
fn quantifier_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    let round = index / 26;
    if round == 0 {
        letter.to_string()
    } else {
        format!("{}{}", letter, round)
    }
}

fn fmt_ty(ty: &Ty, names: &FxHashMap<TyVar, String>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match ty {
        Ty::Var(v) => match names.get(v) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", v),
        },
        Ty::Int => write!(f, "Int"),
        Ty::Bool => write!(f, "Bool"),
        Ty::Char => write!(f, "Char"),
        Ty::String => write!(f, "String"),
        Ty::Unit => write!(f, "Unit"),
        Ty::Func(from, to) => {
            // Parenthesise a function in argument position.
            if matches!(from.as_ref(), Ty::Func(..)) {
                write!(f, "(")?;
                fmt_ty(from, names, f)?;
                write!(f, ")")?;
            } else {
                fmt_ty(from, names, f)?;
            }
            write!(f, " -> ")?;
            fmt_ty(to, names, f)
        }
        Ty::Tuple(elems) => {
            write!(f, "(")?;
            for (i, e) in elems.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_ty(e, names, f)?;
            }
            write!(f, ")")
        }
        Ty::Record(fields) => {
            write!(f, "{{")?;
            for (i, (name, t)) in fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: ", name)?;
                fmt_ty(t, names, f)?;
            }
            write!(f, "}}")
        }
        Ty::Ctor { name, args } => {
            write!(f, "{}", name)?;
            if !args.is_empty() {
                write!(f, "<")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    fmt_ty(a, names, f)?;
                }
                write!(f, ">")?;
            }
            Ok(())
        }
        Ty::Row(row) => {
            write!(f, "{{")?;
            for (i, (label, payload)) in row.cases.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", label)?;
                if let Some(p) = payload {
                    write!(f, "(")?;
                    fmt_ty(p, names, f)?;
                    write!(f, ")")?;
                }
            }
            if let Some(tail) = row.tail {
                if !row.cases.is_empty() {
                    write!(f, " ")?;
                }
                write!(f, "| ")?;
                match names.get(&tail) {
                    Some(name) => write!(f, "{}", name)?,
                    None => write!(f, "{}", tail)?,
                }
            }
            write!(f, "}}")
        }
        Ty::Hole(prov) => match prov {
            Provenance::UserHole => write!(f, "?"),
            Provenance::FreeVar { name } => write!(f, "?[free {}]", name),
            other => write!(f, "?[{}]", other.tag()),
        },
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_ty(self, &FxHashMap::default(), f)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vars.is_empty() {
            return fmt_ty(&self.ty, &FxHashMap::default(), f);
        }
        let names: FxHashMap<TyVar, String> = self
            .vars
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, quantifier_name(i)))
            .collect();
        write!(f, "forall")?;
        for i in 0..self.vars.len() {
            write!(f, " {}", quantifier_name(i))?;
        }
        write!(f, ". ")?;
        fmt_ty(&self.ty, &names, f)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ty_display() {
        assert_eq!(Ty::Int.to_string(), "Int");
        assert_eq!(
            Ty::func(Ty::Int, Ty::func(Ty::Int, Ty::Bool)).to_string(),
            "Int -> Int -> Bool"
        );
        assert_eq!(
            Ty::func(Ty::func(Ty::Int, Ty::Int), Ty::Int).to_string(),
            "(Int -> Int) -> Int"
        );
        assert_eq!(Ty::list(Ty::Int).to_string(), "List<Int>");
        assert_eq!(
            Ty::Tuple(vec![Ty::Int, Ty::String]).to_string(),
            "(Int, String)"
        );
        assert_eq!(
            Ty::record(vec![("x", Ty::Int), ("y", Ty::Int)]).to_string(),
            "{x: Int, y: Int}"
        );
    }

    #[test]
    fn row_display() {
        let mut cases = BTreeMap::new();
        cases.insert("io".to_string(), None);
        cases.insert("raise".to_string(), Some(Ty::String));
        let closed = Ty::Row(EffectRow::closed(cases.clone()));
        assert_eq!(closed.to_string(), "{io, raise(String)}");
        let open = Ty::Row(EffectRow {
            cases,
            tail: Some(TyVar(3)),
        });
        assert_eq!(open.to_string(), "{io, raise(String) | ?3}");
    }

    #[test]
    fn hole_display_carries_tag() {
        assert_eq!(Ty::Hole(Provenance::UserHole).to_string(), "?");
        assert_eq!(
            Ty::Hole(Provenance::FreeVar {
                name: "x".to_string()
            })
            .to_string(),
            "?[free x]"
        );
    }

    #[test]
    fn holes_with_different_provenance_are_distinct() {
        let a = Ty::Hole(Provenance::UserHole);
        let b = Ty::Hole(Provenance::ExprHole);
        assert_ne!(a, b);
        assert_eq!(a, Ty::Hole(Provenance::UserHole));
    }

    #[test]
    fn scheme_display_uses_letters() {
        let scheme = Scheme {
            vars: vec![TyVar(7)],
            ty: Ty::func(Ty::Var(TyVar(7)), Ty::Var(TyVar(7))),
        };
        assert_eq!(scheme.to_string(), "forall a. a -> a");
    }

    #[test]
    fn normalize_remaps_to_dense_ids() {
        let ty = Ty::func(Ty::Var(TyVar(42)), Ty::Var(TyVar(7)));
        let scheme = Scheme::normalize_from_ty(ty);
        assert_eq!(scheme.vars, vec![TyVar(0), TyVar(1)]);
        assert_eq!(scheme.ty, Ty::func(Ty::Var(TyVar(0)), Ty::Var(TyVar(1))));
    }

    #[test]
    fn vars_include_row_tails() {
        let row = Ty::Row(EffectRow {
            cases: BTreeMap::new(),
            tail: Some(TyVar(9)),
        });
        assert_eq!(row.vars(), vec![TyVar(9)]);
    }
}
