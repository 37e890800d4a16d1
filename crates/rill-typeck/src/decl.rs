//! Declaration processing: two-pass ADT registration and translation of
//! surface type expressions into `Ty`.
//!
//! Pass 1 claims every declared type *name* with fresh parameter
//! variables, which is what lets constructors reference forward and
//! mutually recursive types. Pass 2 translates constructor argument
//! types and builds the constructor schemes. A declaration that turns out
//! invalid is rolled back atomically: its ADT entry and any constructor
//! names it had already claimed are removed before the mark is recorded.

use rill_ast::{Program, TopLevel, TypeDecl, TypeExpr, TypeExprKind, TypeMember};
use rustc_hash::FxHashMap;

use crate::adt::{AdtInfo, CtorInfo};
use crate::ctx::InferCtx;
use crate::error::{Diagnostic, Reason};
use crate::mark::{MDecl, MTypeExpr, MTypeExprKind};
use crate::ty::{EffectRow, Provenance, Scheme, Ty, TyVar};

/// Scope of surface type variables during one translation: the mapping
/// from written names (`a`) to allocated variables, and whether unknown
/// names may be freshly allocated (annotations) or must be marked
/// (declaration bodies, where every variable is a declared parameter).
pub struct TypeVarScope {
    pub vars: FxHashMap<String, TyVar>,
    pub allow_fresh: bool,
}

impl TypeVarScope {
    pub fn declared(vars: FxHashMap<String, TyVar>) -> Self {
        TypeVarScope {
            vars,
            allow_fresh: false,
        }
    }

    pub fn open() -> Self {
        TypeVarScope {
            vars: FxHashMap::default(),
            allow_fresh: true,
        }
    }
}

fn primitive(name: &str) -> Option<Ty> {
    match name {
        "Int" => Some(Ty::Int),
        "Bool" => Some(Ty::Bool),
        "Char" => Some(Ty::Char),
        "String" => Some(Ty::String),
        "Unit" => Some(Ty::Unit),
        _ => None,
    }
}

fn mark_type_expr(
    ctx: &mut InferCtx,
    te: &TypeExpr,
    kind: MTypeExprKind,
    provenance: Provenance,
    diagnostic: Diagnostic,
) -> Ty {
    let ty = ctx.mint_hole(te.id, provenance);
    ctx.type_expr_marks.insert(
        te.id,
        MTypeExpr {
            id: te.id,
            span: te.span,
            ty: ty.clone(),
            kind,
        },
    );
    ctx.node_types.insert(te.id, ty.clone());
    ctx.diag(diagnostic);
    ty
}

/// Translate a surface type expression.
///
/// Resolution order for names: surface type variables in scope, then the
/// primitive table, then the ADT environment (expanding aliases).
/// Failures become type-expression marks; the returned type is then a
/// hole, and translation of the surrounding expression continues.
pub fn translate_type_expr(ctx: &mut InferCtx, te: &TypeExpr, scope: &mut TypeVarScope) -> Ty {
    let ty = translate_inner(ctx, te, scope);
    ctx.node_types.entry(te.id).or_insert_with(|| ty.clone());
    ty
}

fn translate_inner(ctx: &mut InferCtx, te: &TypeExpr, scope: &mut TypeVarScope) -> Ty {
    match &te.kind {
        TypeExprKind::Name(name) => {
            if let Some(v) = scope.vars.get(name) {
                return Ty::Var(*v);
            }
            if let Some(prim) = primitive(name) {
                return prim;
            }
            translate_named(ctx, te, name, &[], scope)
        }
        TypeExprKind::Apply { name, args } => {
            if primitive(name).is_some() {
                return mark_type_expr(
                    ctx,
                    te,
                    MTypeExprKind::MarkArity {
                        name: name.clone(),
                        expected: 0,
                        actual: args.len(),
                    },
                    Provenance::TypeExprArity {
                        name: name.clone(),
                        expected: 0,
                        actual: args.len(),
                    },
                    Diagnostic::new(te.id, Reason::TypeExprArity)
                        .with("name", name.clone())
                        .with("expected", 0)
                        .with("actual", args.len() as u64),
                );
            }
            let translated: Vec<Ty> = args
                .iter()
                .map(|a| translate_type_expr(ctx, a, scope))
                .collect();
            translate_named(ctx, te, name, &translated, scope)
        }
        TypeExprKind::Func { from, to } => {
            let from = translate_type_expr(ctx, from, scope);
            let to = translate_type_expr(ctx, to, scope);
            Ty::func(from, to)
        }
        TypeExprKind::Tuple(elems) => Ty::Tuple(
            elems
                .iter()
                .map(|e| translate_type_expr(ctx, e, scope))
                .collect(),
        ),
        TypeExprKind::Record(fields) => Ty::Record(
            fields
                .iter()
                .map(|(n, t)| (n.clone(), translate_type_expr(ctx, t, scope)))
                .collect(),
        ),
        TypeExprKind::Row { cases, tail } => {
            let cases = cases
                .iter()
                .map(|(label, payload)| {
                    (
                        label.clone(),
                        payload.as_ref().map(|p| translate_type_expr(ctx, p, scope)),
                    )
                })
                .collect();
            let tail = match tail {
                None => None,
                Some(name) => match scope.vars.get(name) {
                    Some(v) => Some(*v),
                    None if scope.allow_fresh => {
                        let v = ctx.vars.fresh();
                        scope.vars.insert(name.clone(), v);
                        Some(v)
                    }
                    None => {
                        return mark_type_expr(
                            ctx,
                            te,
                            MTypeExprKind::MarkUnknown { name: name.clone() },
                            Provenance::TypeExprUnknown { name: name.clone() },
                            Diagnostic::new(te.id, Reason::TypeExprUnknown)
                                .with("name", name.clone()),
                        );
                    }
                },
            };
            Ty::Row(EffectRow { cases, tail })
        }
        TypeExprKind::Var(name) => match scope.vars.get(name) {
            Some(v) => Ty::Var(*v),
            None if scope.allow_fresh => {
                let v = ctx.vars.fresh();
                scope.vars.insert(name.clone(), v);
                Ty::Var(v)
            }
            None => mark_type_expr(
                ctx,
                te,
                MTypeExprKind::MarkUnknown { name: name.clone() },
                Provenance::TypeExprUnknown { name: name.clone() },
                Diagnostic::new(te.id, Reason::TypeExprUnknown).with("name", name.clone()),
            ),
        },
        TypeExprKind::Hole => ctx.mint_hole(te.id, Provenance::UserHole),
    }
}

fn translate_named(
    ctx: &mut InferCtx,
    te: &TypeExpr,
    name: &str,
    args: &[Ty],
    _scope: &mut TypeVarScope,
) -> Ty {
    let Some(info) = ctx.adt.get(name) else {
        return mark_type_expr(
            ctx,
            te,
            MTypeExprKind::MarkUnknown {
                name: name.to_string(),
            },
            Provenance::TypeExprUnknown {
                name: name.to_string(),
            },
            Diagnostic::new(te.id, Reason::TypeExprUnknown).with("name", name.to_string()),
        );
    };
    let expected = info.params.len();
    if expected != args.len() {
        return mark_type_expr(
            ctx,
            te,
            MTypeExprKind::MarkArity {
                name: name.to_string(),
                expected,
                actual: args.len(),
            },
            Provenance::TypeExprArity {
                name: name.to_string(),
                expected,
                actual: args.len(),
            },
            Diagnostic::new(te.id, Reason::TypeExprArity)
                .with("name", name.to_string())
                .with("expected", expected as u64)
                .with("actual", args.len() as u64),
        );
    }
    if let Some(expanded) = ctx.adt.expand_alias(name, args) {
        return expanded;
    }
    Ty::ctor(name, args.to_vec())
}

/// Register every `type` declaration in the program, two-pass.
pub fn register_type_decls(ctx: &mut InferCtx, program: &Program) {
    let decls: Vec<&TypeDecl> = program
        .declarations
        .iter()
        .filter_map(|d| match d {
            TopLevel::Type(t) => Some(t),
            _ => None,
        })
        .collect();

    // ── Pass 1: claim names ─────────────────────────────────────────────
    let mut registered: Vec<(&TypeDecl, FxHashMap<String, TyVar>)> = Vec::new();
    for decl in decls {
        if ctx.adt.contains(&decl.name) {
            let ty = ctx.mint_hole(
                decl.id,
                Provenance::Internal {
                    reason: format!("duplicate type `{}`", decl.name),
                },
            );
            ctx.decl_marks.insert(
                decl.id,
                MDecl::MarkTypeDeclDuplicate {
                    id: decl.id,
                    span: decl.span,
                    name: decl.name.clone(),
                    ty,
                },
            );
            ctx.diag(
                Diagnostic::new(decl.id, Reason::TypeDeclDuplicate)
                    .with("name", decl.name.clone()),
            );
            continue;
        }
        let mut param_map = FxHashMap::default();
        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let v = ctx.vars.fresh();
            param_map.insert(param.clone(), v);
            params.push(v);
        }
        ctx.adt.insert(AdtInfo {
            name: decl.name.clone(),
            params,
            ctors: Vec::new(),
            alias: None,
            record_fields: None,
        });
        registered.push((decl, param_map));
    }

    // ── Pass 2: translate members ───────────────────────────────────────
    for (decl, param_map) in registered {
        register_members(ctx, decl, param_map);
    }
}

fn invalid_member(ctx: &mut InferCtx, decl: &TypeDecl, member: Option<String>, claimed: &[String]) {
    for name in claimed {
        ctx.adt.release_ctor(name);
    }
    let _ = ctx.adt.remove(&decl.name);
    let ty = ctx.mint_hole(
        decl.id,
        Provenance::Internal {
            reason: format!("invalid member in type `{}`", decl.name),
        },
    );
    ctx.decl_marks.insert(
        decl.id,
        MDecl::MarkTypeDeclInvalidMember {
            id: decl.id,
            span: decl.span,
            name: decl.name.clone(),
            member: member.clone(),
            ty,
        },
    );
    let mut diagnostic =
        Diagnostic::new(decl.id, Reason::TypeDeclInvalidMember).with("name", decl.name.clone());
    if let Some(member) = member {
        diagnostic = diagnostic.with("member", member);
    }
    ctx.diag(diagnostic);
}

/// Constructor scheme body: `arg1 -> ... -> argk -> result`, or bare
/// `result` for nullary constructors.
fn ctor_chain(args: Vec<Ty>, result: Ty) -> Ty {
    args.into_iter().rev().fold(result, |acc, a| Ty::func(a, acc))
}

/// Whether an alias body leads back to the type being declared.
///
/// Unification expands aliases eagerly, so a cyclic alias would never
/// terminate there; such declarations are rejected at registration. The
/// depth bound catches chains through aliases not yet registered.
fn alias_cycles(ctx: &InferCtx, name: &str, body: &Ty) -> bool {
    let mut current = body.clone();
    for _ in 0..32 {
        match &current {
            Ty::Ctor { name: n, args } => {
                if n == name {
                    return true;
                }
                match ctx.adt.expand_alias(n, args) {
                    Some(next) => current = next,
                    None => return false,
                }
            }
            _ => return false,
        }
    }
    true
}

fn register_members(ctx: &mut InferCtx, decl: &TypeDecl, param_map: FxHashMap<String, TyVar>) {
    let params: Vec<TyVar> = decl
        .params
        .iter()
        .map(|p| param_map[p])
        .collect();
    let result_ty = Ty::ctor(
        decl.name.clone(),
        params.iter().map(|v| Ty::Var(*v)).collect(),
    );
    let mut scope = TypeVarScope::declared(param_map);

    if let Some(alias_body) = &decl.alias {
        if !decl.members.is_empty() {
            invalid_member(ctx, decl, None, &[]);
            return;
        }
        let body = translate_type_expr(ctx, alias_body, &mut scope);
        if alias_cycles(ctx, &decl.name, &body) {
            invalid_member(ctx, decl, None, &[]);
            return;
        }
        // A record alias declares the ADT's record fields and a
        // synthetic record-form constructor named after the type.
        let record_fields: Option<Vec<(String, Ty)>> = match (&alias_body.kind, &body) {
            (TypeExprKind::Record(surface), Ty::Record(fields)) => Some(
                surface
                    .iter()
                    .map(|(n, _)| (n.clone(), fields[n].clone()))
                    .collect(),
            ),
            _ => None,
        };
        let mut info = ctx
            .adt
            .remove(&decl.name)
            .expect("pass 1 registered this type");
        info.alias = Some(body);
        if let Some(fields) = record_fields {
            if ctx.adt.claim_ctor(&decl.name, &decl.name).is_err() {
                invalid_member(ctx, decl, Some(decl.name.clone()), &[]);
                return;
            }
            let ctor_ty = ctor_chain(
                fields.iter().map(|(_, t)| t.clone()).collect(),
                result_ty.clone(),
            );
            info.ctors.push(CtorInfo {
                name: decl.name.clone(),
                arity: fields.len(),
                scheme: Scheme {
                    vars: params.clone(),
                    ty: ctor_ty,
                },
            });
            info.record_fields = Some(fields);
        }
        ctx.adt.insert(info);
        return;
    }

    let mut claimed: Vec<String> = Vec::new();
    let mut ctors: Vec<CtorInfo> = Vec::new();
    for member in &decl.members {
        match member {
            TypeMember::Field(field) => {
                invalid_member(ctx, decl, Some(field.name.clone()), &claimed);
                return;
            }
            TypeMember::Ctor(ctor) => {
                if ctx.adt.claim_ctor(&ctor.name, &decl.name).is_err() {
                    invalid_member(ctx, decl, Some(ctor.name.clone()), &claimed);
                    return;
                }
                claimed.push(ctor.name.clone());
                let args: Vec<Ty> = ctor
                    .args
                    .iter()
                    .map(|a| translate_type_expr(ctx, a, &mut scope))
                    .collect();
                let scheme_ty = ctor_chain(args.clone(), result_ty.clone());
                ctors.push(CtorInfo {
                    name: ctor.name.clone(),
                    arity: args.len(),
                    scheme: Scheme {
                        vars: params.clone(),
                        ty: scheme_ty,
                    },
                });
            }
        }
    }

    let mut info = ctx
        .adt
        .remove(&decl.name)
        .expect("pass 1 registered this type");
    // `remove` drops the ctor index for this type; re-claim.
    for name in &claimed {
        let _ = ctx.adt.claim_ctor(name, &decl.name);
    }
    info.ctors = ctors;
    ctx.adt.insert(info);
}
