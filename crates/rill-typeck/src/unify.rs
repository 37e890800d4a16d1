//! Unification over an explicit substitution.
//!
//! The substitution is a plain `VarId -> Type` map rather than an
//! in-place union-find table: it crosses the inference/solver boundary as
//! data, and both layers keep extending the same mapping. `apply` resolves
//! transitively, so the observable substitution is always idempotent --
//! applying twice equals applying once.
//!
//! Unification is *tolerant*: a hole on either side succeeds without
//! binding anything. Failures never unwind the caller; they return a
//! `UnifyError` that the marking layer turns into a mark + diagnostic.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::adt::AdtEnv;
use crate::ty::{graft_row, subst_vars, EffectRow, Provenance, Scheme, Ty, TyVar, VarAlloc};

/// Target-size numeric compatibility: the only cross-name constructor
/// unifications permitted. Symmetric.
const NUMERIC_COMPAT: &[(&str, &str)] = &[
    ("U32", "CUInt"),
    ("U64", "CULongLong"),
    ("Usize", "CULongLong"),
    ("I32", "CInt"),
    ("I64", "CLongLong"),
];

fn numeric_compatible(a: &str, b: &str) -> bool {
    NUMERIC_COMPAT
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

/// An explicit substitution: a mapping from variables to types.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Subst {
    map: FxHashMap<TyVar, Ty>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, v: TyVar) -> Option<&Ty> {
        self.map.get(&v)
    }

    /// Bind a variable. Callers are responsible for the occurs check;
    /// the unifier is the only writer.
    fn insert(&mut self, v: TyVar, ty: Ty) {
        debug_assert!(!self.map.contains_key(&v), "rebinding {}", v);
        self.map.insert(v, ty);
    }

    /// Apply the substitution, resolving bound variables transitively.
    ///
    /// After one application no bound variable remains in the result, so
    /// `apply(apply(t)) == apply(t)` at any point in time. Hole
    /// provenances are opaque: their embedded types are diagnostics
    /// frozen at failure time, not live structure.
    pub fn apply(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.map.get(v) {
                Some(bound) => self.apply(bound),
                None => ty.clone(),
            },
            Ty::Int | Ty::Bool | Ty::Char | Ty::String | Ty::Unit | Ty::Hole(_) => ty.clone(),
            Ty::Func(from, to) => Ty::func(self.apply(from), self.apply(to)),
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| self.apply(e)).collect()),
            Ty::Record(fields) => Ty::Record(
                fields
                    .iter()
                    .map(|(n, t)| (n.clone(), self.apply(t)))
                    .collect(),
            ),
            Ty::Ctor { name, args } => Ty::Ctor {
                name: name.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            Ty::Row(row) => {
                let cases: BTreeMap<String, Option<Ty>> = row
                    .cases
                    .iter()
                    .map(|(l, p)| (l.clone(), p.as_ref().map(|t| self.apply(t))))
                    .collect();
                match row.tail {
                    Some(tail) if self.map.contains_key(&tail) => {
                        let tail_ty = self.apply(&Ty::Var(tail));
                        graft_row(cases, tail_ty)
                    }
                    tail => Ty::Row(EffectRow { cases, tail }),
                }
            }
        }
    }
}

/// Why two types failed to unify. Every variant carries the offending
/// types so marks and diagnostics can show both sides.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum UnifyError {
    TypeMismatch {
        expected: Ty,
        found: Ty,
    },
    ArityMismatch {
        expected: usize,
        found: usize,
        left: Ty,
        right: Ty,
    },
    OccursCheck {
        left: Ty,
        right: Ty,
    },
}

impl UnifyError {
    /// The hole provenance a mark minted from this failure carries.
    pub fn provenance(&self) -> Provenance {
        match self {
            UnifyError::TypeMismatch { expected, found } => Provenance::Inconsistent {
                expected: Box::new(expected.clone()),
                actual: Box::new(found.clone()),
            },
            UnifyError::ArityMismatch { left, right, .. } => Provenance::Inconsistent {
                expected: Box::new(left.clone()),
                actual: Box::new(right.clone()),
            },
            UnifyError::OccursCheck { left, right } => Provenance::OccursCheck {
                left: Box::new(left.clone()),
                right: Box::new(right.clone()),
            },
        }
    }
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnifyError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            UnifyError::ArityMismatch {
                expected, found, ..
            } => write!(
                f,
                "arity mismatch: expected {} components, found {}",
                expected, found
            ),
            UnifyError::OccursCheck { left, right } => {
                write!(f, "infinite type: `{}` occurs in `{}`", left, right)
            }
        }
    }
}

/// The unification engine: a substitution, a variable allocator (row
/// unification mints fresh remainder variables), and the ADT environment
/// for aliases, carriers, and record-form sugar.
pub struct Unifier<'a> {
    pub subst: &'a mut Subst,
    pub vars: &'a mut VarAlloc,
    pub adt: &'a AdtEnv,
}

impl<'a> Unifier<'a> {
    pub fn new(subst: &'a mut Subst, vars: &'a mut VarAlloc, adt: &'a AdtEnv) -> Self {
        Unifier { subst, vars, adt }
    }

    /// Unify two types, extending the substitution.
    ///
    /// Both sides are fully resolved against the current substitution on
    /// entry, so the match below only ever sees unbound variables.
    pub fn unify(&mut self, a: &Ty, b: &Ty) -> Result<(), UnifyError> {
        let a = self.subst.apply(a);
        let b = self.subst.apply(b);

        match (&a, &b) {
            // Gradual typing: holes are compatible with everything and
            // teach the substitution nothing.
            (Ty::Hole(_), _) | (_, Ty::Hole(_)) => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),

            (Ty::Var(v), other) | (other, Ty::Var(v)) => self.bind(*v, other),

            (Ty::Int, Ty::Int)
            | (Ty::Bool, Ty::Bool)
            | (Ty::Char, Ty::Char)
            | (Ty::String, Ty::String)
            | (Ty::Unit, Ty::Unit) => Ok(()),

            (Ty::Func(f1, t1), Ty::Func(f2, t2)) => {
                self.unify(f1, f2)?;
                self.unify(t1, t2)
            }

            (Ty::Tuple(e1), Ty::Tuple(e2)) => {
                if e1.len() != e2.len() {
                    return Err(UnifyError::ArityMismatch {
                        expected: e1.len(),
                        found: e2.len(),
                        left: a.clone(),
                        right: b.clone(),
                    });
                }
                for (x, y) in e1.iter().zip(e2.iter()) {
                    self.unify(x, y)?;
                }
                Ok(())
            }

            (Ty::Record(f1), Ty::Record(f2)) => {
                if f1.keys().ne(f2.keys()) {
                    return Err(UnifyError::TypeMismatch {
                        expected: a.clone(),
                        found: b.clone(),
                    });
                }
                for (name, x) in f1 {
                    self.unify(x, &f2[name])?;
                }
                Ok(())
            }

            (Ty::Ctor { name: n1, args: a1 }, Ty::Ctor { name: n2, args: a2 }) => {
                self.unify_ctors(&a, &b, n1, a1, n2, a2)
            }

            // An alias constructor may stand for a non-constructor shape
            // (record aliases in particular).
            (Ty::Ctor { name, args }, _) if self.adt.expand_alias(name, args).is_some() => {
                let expanded = self.adt.expand_alias(name, args).expect("checked above");
                self.unify(&expanded, &b)
            }
            (_, Ty::Ctor { name, args }) if self.adt.expand_alias(name, args).is_some() => {
                let expanded = self.adt.expand_alias(name, args).expect("checked above");
                self.unify(&a, &expanded)
            }

            (Ty::Row(r1), Ty::Row(r2)) => self.unify_rows(&a, &b, r1, r2),

            _ => Err(UnifyError::TypeMismatch {
                expected: a.clone(),
                found: b.clone(),
            }),
        }
    }

    /// Bind a variable to a resolved type after the occurs check.
    fn bind(&mut self, v: TyVar, ty: &Ty) -> Result<(), UnifyError> {
        // Degenerate row-polymorphic case: a row whose own tail is `v`
        // and where `v` occurs nowhere else binds `v` to the closed row.
        if let Ty::Row(row) = ty {
            if row.tail == Some(v) {
                let mut payload_vars = Vec::new();
                for payload in row.cases.values().flatten() {
                    crate::ty::collect_vars(payload, &mut payload_vars);
                }
                if !payload_vars.contains(&v) {
                    let closed = Ty::Row(EffectRow {
                        cases: row.cases.clone(),
                        tail: None,
                    });
                    self.subst.insert(v, closed);
                    return Ok(());
                }
            }
        }
        if ty.vars().contains(&v) {
            return Err(UnifyError::OccursCheck {
                left: Ty::Var(v),
                right: ty.clone(),
            });
        }
        self.subst.insert(v, ty.clone());
        Ok(())
    }

    fn unify_ctors(
        &mut self,
        a: &Ty,
        b: &Ty,
        n1: &str,
        a1: &[Ty],
        n2: &str,
        a2: &[Ty],
    ) -> Result<(), UnifyError> {
        // Aliases expand before every other rule.
        if let Some(expanded) = self.adt.expand_alias(n1, a1) {
            return self.unify(&expanded, b);
        }
        if let Some(expanded) = self.adt.expand_alias(n2, a2) {
            return self.unify(a, &expanded);
        }

        // Carriers of the same domain unify componentwise even when their
        // constructor names differ.
        if let (Some(c1), Some(c2)) = (self.adt.split_carrier(a), self.adt.split_carrier(b)) {
            if c1.domain == c2.domain {
                self.unify(&c1.value, &c2.value)?;
                return self.unify(&c1.state, &c2.state);
            }
        }

        if n1 == n2 {
            if a1.len() == a2.len() {
                for (x, y) in a1.iter().zip(a2.iter()) {
                    self.unify(x, y)?;
                }
                return Ok(());
            }
            // Bare vs. record constructor form: `Foo<a>` against
            // `Foo(field tys)` when the ADT declares record fields.
            if let Some(info) = self.adt.get(n1) {
                if let Some(fields) = &info.record_fields {
                    let (bare, record) = if a1.len() == info.params.len()
                        && a2.len() == fields.len()
                    {
                        (a1, a2)
                    } else if a2.len() == info.params.len() && a1.len() == fields.len() {
                        (a2, a1)
                    } else {
                        return Err(UnifyError::ArityMismatch {
                            expected: a1.len(),
                            found: a2.len(),
                            left: a.clone(),
                            right: b.clone(),
                        });
                    };
                    let declared = self
                        .adt
                        .record_fields_at(n1, bare)
                        .expect("record_fields checked above");
                    for ((_, declared_ty), actual) in declared.iter().zip(record.iter()) {
                        self.unify(declared_ty, actual)?;
                    }
                    return Ok(());
                }
            }
            return Err(UnifyError::ArityMismatch {
                expected: a1.len(),
                found: a2.len(),
                left: a.clone(),
                right: b.clone(),
            });
        }

        // The fixed target-size compatibility table is the only
        // cross-name exception left.
        if numeric_compatible(n1, n2) {
            return Ok(());
        }

        Err(UnifyError::TypeMismatch {
            expected: a.clone(),
            found: b.clone(),
        })
    }

    /// Row union. Shared labels unify payload-wise; each side's leftover
    /// labels are pushed into the other side's tail as a fresh remainder.
    fn unify_rows(
        &mut self,
        a: &Ty,
        b: &Ty,
        r1: &EffectRow,
        r2: &EffectRow,
    ) -> Result<(), UnifyError> {
        for (label, p1) in &r1.cases {
            if let Some(p2) = r2.cases.get(label) {
                match (p1, p2) {
                    (Some(x), Some(y)) => self.unify(x, y)?,
                    (None, None) => {}
                    _ => {
                        return Err(UnifyError::TypeMismatch {
                            expected: a.clone(),
                            found: b.clone(),
                        })
                    }
                }
            }
        }

        let only1: BTreeMap<String, Option<Ty>> = r1
            .cases
            .iter()
            .filter(|(l, _)| !r2.cases.contains_key(*l))
            .map(|(l, p)| (l.clone(), p.clone()))
            .collect();
        let only2: BTreeMap<String, Option<Ty>> = r2
            .cases
            .iter()
            .filter(|(l, _)| !r1.cases.contains_key(*l))
            .map(|(l, p)| (l.clone(), p.clone()))
            .collect();

        match (r1.tail, r2.tail) {
            (None, None) => {
                if only1.is_empty() && only2.is_empty() {
                    Ok(())
                } else {
                    Err(UnifyError::TypeMismatch {
                        expected: a.clone(),
                        found: b.clone(),
                    })
                }
            }
            (Some(v1), None) => {
                if !only1.is_empty() {
                    return Err(UnifyError::TypeMismatch {
                        expected: a.clone(),
                        found: b.clone(),
                    });
                }
                self.bind(
                    v1,
                    &Ty::Row(EffectRow {
                        cases: only2,
                        tail: None,
                    }),
                )
            }
            (None, Some(v2)) => {
                if !only2.is_empty() {
                    return Err(UnifyError::TypeMismatch {
                        expected: a.clone(),
                        found: b.clone(),
                    });
                }
                self.bind(
                    v2,
                    &Ty::Row(EffectRow {
                        cases: only1,
                        tail: None,
                    }),
                )
            }
            (Some(v1), Some(v2)) => {
                if v1 == v2 {
                    return if only1.is_empty() && only2.is_empty() {
                        Ok(())
                    } else {
                        Err(UnifyError::TypeMismatch {
                            expected: a.clone(),
                            found: b.clone(),
                        })
                    };
                }
                if only1.is_empty() && only2.is_empty() {
                    return self.bind(v1, &Ty::Var(v2));
                }
                let remainder = self.vars.fresh();
                self.bind(
                    v1,
                    &Ty::Row(EffectRow {
                        cases: only2,
                        tail: Some(remainder),
                    }),
                )?;
                self.bind(
                    v2,
                    &Ty::Row(EffectRow {
                        cases: only1,
                        tail: Some(remainder),
                    }),
                )
            }
        }
    }
}

// ── Generalization & instantiation ─────────────────────────────────────

/// Generalize a type against the variables free in the (substitution-
/// applied) environment: quantify exactly the free variables of the
/// resolved type that the environment does not mention.
pub fn generalize(ty: &Ty, subst: &Subst, env_vars: &FxHashSet<TyVar>) -> Scheme {
    let resolved = subst.apply(ty);
    let mut vars = Vec::new();
    let mut seen = FxHashSet::default();
    for v in resolved.vars() {
        if !env_vars.contains(&v) && seen.insert(v) {
            vars.push(v);
        }
    }
    Scheme { vars, ty: resolved }
}

/// Instantiate a scheme: replace each quantifier with a fresh variable.
pub fn instantiate(scheme: &Scheme, vars: &mut VarAlloc) -> Ty {
    if scheme.vars.is_empty() {
        return scheme.ty.clone();
    }
    let mapping: FxHashMap<TyVar, Ty> = scheme
        .vars
        .iter()
        .map(|v| (*v, Ty::Var(vars.fresh())))
        .collect();
    subst_vars(&scheme.ty, &mapping)
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Subst, VarAlloc, AdtEnv) {
        (Subst::new(), VarAlloc::new(), AdtEnv::new())
    }

    #[test]
    fn unify_two_fresh_vars() {
        let (mut subst, mut vars, adt) = setup();
        let a = Ty::Var(vars.fresh());
        let b = Ty::Var(vars.fresh());
        {
            let mut u = Unifier::new(&mut subst, &mut vars, &adt);
            u.unify(&a, &b).unwrap();
            u.unify(&a, &Ty::Int).unwrap();
        }
        assert_eq!(subst.apply(&a), Ty::Int);
        assert_eq!(subst.apply(&b), Ty::Int);
    }

    #[test]
    fn unify_mismatch_keeps_both_types() {
        let (mut subst, mut vars, adt) = setup();
        let err = Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&Ty::Int, &Ty::String)
            .unwrap_err();
        assert_eq!(
            err,
            UnifyError::TypeMismatch {
                expected: Ty::Int,
                found: Ty::String,
            }
        );
    }

    #[test]
    fn unify_function_return_mismatch() {
        let (mut subst, mut vars, adt) = setup();
        let f1 = Ty::func(Ty::Int, Ty::String);
        let f2 = Ty::func(Ty::Int, Ty::Bool);
        let err = Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&f1, &f2)
            .unwrap_err();
        match err {
            UnifyError::TypeMismatch { expected, found } => {
                assert_eq!(expected, Ty::String);
                assert_eq!(found, Ty::Bool);
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let (mut subst, mut vars, adt) = setup();
        let a = Ty::Var(vars.fresh());
        let fun = Ty::func(a.clone(), Ty::Int);
        let err = Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&a, &fun)
            .unwrap_err();
        assert!(matches!(err, UnifyError::OccursCheck { .. }));
    }

    #[test]
    fn holes_unify_with_everything_without_binding() {
        let (mut subst, mut vars, adt) = setup();
        let v = Ty::Var(vars.fresh());
        let hole = Ty::Hole(Provenance::UserHole);
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&v, &hole)
            .unwrap();
        // The variable stays free: holes teach nothing.
        assert_eq!(subst.apply(&v), v);
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&hole, &Ty::Int)
            .unwrap();
    }

    #[test]
    fn tuple_arity_mismatch() {
        let (mut subst, mut vars, adt) = setup();
        let t1 = Ty::Tuple(vec![Ty::Int]);
        let t2 = Ty::Tuple(vec![Ty::Int, Ty::Int]);
        let err = Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&t1, &t2)
            .unwrap_err();
        assert!(matches!(
            err,
            UnifyError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn record_field_sets_must_match() {
        let (mut subst, mut vars, adt) = setup();
        let r1 = Ty::record(vec![("x", Ty::Int)]);
        let r2 = Ty::record(vec![("x", Ty::Int), ("y", Ty::Int)]);
        assert!(Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&r1, &r2)
            .is_err());
        assert!(Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&r1, &r1)
            .is_ok());
    }

    #[test]
    fn numeric_compat_table_is_symmetric() {
        let (mut subst, mut vars, adt) = setup();
        let u32_ty = Ty::ctor("U32", vec![]);
        let cuint = Ty::ctor("CUInt", vec![]);
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&u32_ty, &cuint)
            .unwrap();
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&cuint, &u32_ty)
            .unwrap();
        assert!(Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&u32_ty, &Ty::ctor("CInt", vec![]))
            .is_err());
    }

    #[test]
    fn distinct_ctor_names_do_not_unify() {
        let (mut subst, mut vars, adt) = setup();
        assert!(Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&Ty::ctor("Shape", vec![]), &Ty::ctor("Color", vec![]))
            .is_err());
    }

    #[test]
    fn row_union_pushes_leftovers_into_tails() {
        let (mut subst, mut vars, adt) = setup();
        let t1 = vars.fresh();
        let t2 = vars.fresh();
        let mut c1 = BTreeMap::new();
        c1.insert("io".to_string(), None);
        let mut c2 = BTreeMap::new();
        c2.insert("raise".to_string(), Some(Ty::String));
        let r1 = Ty::Row(EffectRow {
            cases: c1,
            tail: Some(t1),
        });
        let r2 = Ty::Row(EffectRow {
            cases: c2,
            tail: Some(t2),
        });
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&r1, &r2)
            .unwrap();
        // Both sides now resolve to the same union row.
        let u1 = subst.apply(&r1);
        let u2 = subst.apply(&r2);
        assert_eq!(u1, u2);
        match u1 {
            Ty::Row(row) => {
                assert!(row.cases.contains_key("io"));
                assert!(row.cases.contains_key("raise"));
                assert!(row.tail.is_some(), "union of two open rows stays open");
            }
            other => panic!("expected row, got {}", other),
        }
    }

    #[test]
    fn open_row_against_closed_row_closes_the_tail() {
        let (mut subst, mut vars, adt) = setup();
        let t1 = vars.fresh();
        let mut c1 = BTreeMap::new();
        c1.insert("io".to_string(), None);
        let open = Ty::Row(EffectRow {
            cases: c1.clone(),
            tail: Some(t1),
        });
        let mut c2 = c1.clone();
        c2.insert("state".to_string(), None);
        let closed = Ty::Row(EffectRow::closed(c2));
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&open, &closed)
            .unwrap();
        assert_eq!(subst.apply(&open), closed);
    }

    #[test]
    fn self_tail_row_binds_to_closed_row() {
        let (mut subst, mut vars, adt) = setup();
        let v = vars.fresh();
        let mut cases = BTreeMap::new();
        cases.insert("io".to_string(), None);
        let row = Ty::Row(EffectRow {
            cases: cases.clone(),
            tail: Some(v),
        });
        // v ~ {io | v} must not be an occurs failure: it closes the row.
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&Ty::Var(v), &row)
            .unwrap();
        assert_eq!(subst.apply(&Ty::Var(v)), Ty::Row(EffectRow::closed(cases)));
    }

    #[test]
    fn apply_is_idempotent() {
        let (mut subst, mut vars, adt) = setup();
        let a = Ty::Var(vars.fresh());
        let b = Ty::Var(vars.fresh());
        {
            let mut u = Unifier::new(&mut subst, &mut vars, &adt);
            u.unify(&a, &Ty::func(b.clone(), Ty::Int)).unwrap();
            u.unify(&b, &Ty::Bool).unwrap();
        }
        let once = subst.apply(&a);
        let twice = subst.apply(&once);
        assert_eq!(once, twice);
        assert_eq!(once, Ty::func(Ty::Bool, Ty::Int));
    }

    #[test]
    fn unify_is_commutative_on_outcome() {
        let pairs = [
            (Ty::Int, Ty::Int),
            (Ty::Int, Ty::Bool),
            (Ty::func(Ty::Int, Ty::Int), Ty::func(Ty::Int, Ty::Bool)),
            (Ty::Hole(Provenance::UserHole), Ty::Int),
        ];
        for (x, y) in pairs {
            let (mut s1, mut v1, adt1) = setup();
            let (mut s2, mut v2, adt2) = setup();
            let fwd = Unifier::new(&mut s1, &mut v1, &adt1).unify(&x, &y).is_ok();
            let bwd = Unifier::new(&mut s2, &mut v2, &adt2).unify(&y, &x).is_ok();
            assert_eq!(fwd, bwd, "commutativity broke on {} ~ {}", x, y);
        }
    }

    #[test]
    fn generalize_then_instantiate_round_trips() {
        let (subst, mut vars, _adt) = setup();
        let a = Ty::Var(vars.fresh());
        let identity = Ty::func(a.clone(), a);
        let scheme = generalize(&identity, &subst, &FxHashSet::default());
        assert_eq!(scheme.vars.len(), 1);

        let inst1 = instantiate(&scheme, &mut vars);
        let inst2 = instantiate(&scheme, &mut vars);
        assert_ne!(inst1, inst2, "instantiations must be fresh");

        // Round-trip up to alpha-renaming (P5): regeneralizing an
        // instantiation gives the same normalized scheme.
        let again = generalize(&inst1, &subst, &FxHashSet::default());
        assert_eq!(scheme.normalized(), again.normalized());
    }

    #[test]
    fn env_vars_are_not_generalized() {
        let (subst, mut vars, _adt) = setup();
        let a = vars.fresh();
        let b = vars.fresh();
        let ty = Ty::func(Ty::Var(a), Ty::Var(b));
        let mut env_vars = FxHashSet::default();
        env_vars.insert(a);
        let scheme = generalize(&ty, &subst, &env_vars);
        assert_eq!(scheme.vars, vec![b]);
    }

    #[test]
    fn bare_and_record_constructor_forms_unify() {
        use crate::adt::{AdtInfo, CtorInfo};

        let (mut subst, mut vars, mut adt) = setup();
        let a = vars.fresh();
        adt.insert(AdtInfo {
            name: "Pair".to_string(),
            params: vec![a],
            ctors: vec![CtorInfo {
                name: "Pair".to_string(),
                arity: 2,
                scheme: Scheme {
                    vars: vec![a],
                    ty: Ty::func(
                        Ty::Var(a),
                        Ty::func(Ty::Int, Ty::ctor("Pair", vec![Ty::Var(a)])),
                    ),
                },
            }],
            alias: None,
            record_fields: Some(vec![
                ("x".to_string(), Ty::Var(a)),
                ("y".to_string(), Ty::Int),
            ]),
        });

        // Bare form `Pair<Bool>` against record form `Pair(Bool, Int)`.
        let bare = Ty::ctor("Pair", vec![Ty::Bool]);
        let record = Ty::ctor("Pair", vec![Ty::Bool, Ty::Int]);
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&bare, &record)
            .unwrap();

        // A record form contradicting the declared field types fails.
        let wrong = Ty::ctor("Pair", vec![Ty::Int, Ty::Int]);
        assert!(Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&bare, &wrong)
            .is_err());
    }

    #[test]
    fn carrier_unification_goes_componentwise() {
        let (mut subst, mut vars, mut adt) = setup();
        adt.register_carrier("Eff", "effect");
        let state1 = Ty::Row(EffectRow::from_tags(["io"]));
        let state2 = Ty::Var(vars.fresh());
        let c1 = Ty::ctor("Eff", vec![Ty::Int, state1.clone()]);
        let c2 = Ty::ctor("Eff", vec![Ty::Var(vars.fresh()), state2.clone()]);
        Unifier::new(&mut subst, &mut vars, &adt)
            .unify(&c1, &c2)
            .unwrap();
        assert_eq!(subst.apply(&state2), state1);
    }
}
