//! Layer 2: the deferred-constraint solver.
//!
//! Consumes the stub stream and the marked program, replays the deferred
//! obligations in a fixed phase order (annotations, calls and field
//! projections, numeric/boolean, branch joins), runs constraint-label
//! propagation, detects multi-constraint conflicts on each hole, and
//! finally re-annotates the marked AST with resolved types. Like Layer 1,
//! it never fails: every cross-constraint contradiction becomes a
//! diagnostic keyed to its origin node.

use rill_common::NodeId;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::adt::AdtEnv;
use crate::domain::DomainRegistry;
use crate::error::{Diagnostic, Reason};
use crate::flow::{run_flow, union_rows, FlowReport};
use crate::infer::InferResult;
use crate::mark::{for_each_type_mut, MProgram};
use crate::stub::Stub;
use crate::ty::{Conflict, HoleId, Provenance, Scheme, Ty, UnknownInfo, VarAlloc};
use crate::unify::{Subst, Unifier, UnifyError};

/// Everything the solver consumes.
#[derive(Clone, Debug)]
pub struct SolveInput {
    pub marked_program: MProgram,
    pub constraint_stubs: Vec<Stub>,
    pub holes: FxHashMap<HoleId, UnknownInfo>,
    pub node_types: FxHashMap<NodeId, Ty>,
    pub layer1_diagnostics: Vec<Diagnostic>,
    pub summaries: FxHashMap<String, Scheme>,
    pub adt_env: AdtEnv,
    pub substitution: Subst,
    pub var_counter: u32,
    /// Externally supplied infection registry; defaults to the
    /// hard-coded `effect` rules when absent.
    pub infection_registry: Option<DomainRegistry>,
}

impl SolveInput {
    /// Assemble the solver input from a Layer 1 result.
    pub fn from_infer(result: &InferResult, registry: Option<DomainRegistry>) -> Self {
        SolveInput {
            marked_program: result.marked_program.clone(),
            constraint_stubs: result.constraint_stubs.clone(),
            holes: result.holes.clone(),
            node_types: result.node_types.clone(),
            layer1_diagnostics: result.layer1_diagnostics.clone(),
            summaries: result.summaries.clone(),
            adt_env: result.adt_env.clone(),
            substitution: result.substitution.clone(),
            var_counter: result.var_counter,
            infection_registry: registry,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SolveOptions {
    /// Union each node's label row into its carrier state so displayed
    /// types surface the constraints. On by default.
    pub reify_carriers: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            reify_carriers: true,
        }
    }
}

/// State of one hole after solving.
#[derive(Clone, Debug, Serialize)]
pub enum HoleSolution {
    Solved {
        ty: Ty,
        info: UnknownInfo,
    },
    Partial {
        known: Option<Ty>,
        constraints: Vec<Ty>,
        possibilities: Vec<Ty>,
        info: UnknownInfo,
    },
    Unsolved {
        info: UnknownInfo,
    },
    Conflicted {
        conflicts: Vec<Conflict>,
        info: UnknownInfo,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct HoleConflict {
    pub hole: HoleId,
    pub conflicts: Vec<Conflict>,
}

#[derive(Clone, Debug)]
pub struct SolverResult {
    pub solutions: FxHashMap<HoleId, HoleSolution>,
    pub diagnostics: Vec<Diagnostic>,
    pub substitution: Subst,
    pub resolved_node_types: FxHashMap<NodeId, Ty>,
    pub remarked_program: MProgram,
    pub conflicts: Vec<HoleConflict>,
    pub summaries: FxHashMap<String, Scheme>,
    pub constraint_flow: Option<FlowReport>,
}

pub fn solve_constraints(input: SolveInput) -> SolverResult {
    solve_with_options(input, SolveOptions::default())
}

pub fn solve_with_options(input: SolveInput, options: SolveOptions) -> SolverResult {
    let registry = input
        .infection_registry
        .clone()
        .unwrap_or_else(DomainRegistry::default_effect);
    let adt = input.adt_env.clone();
    let mut subst = input.substitution.clone();
    let mut vars = VarAlloc::starting_at(input.var_counter);
    let mut resolved: FxHashMap<NodeId, Ty> = input.node_types.clone();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    // ── Phase 1: annotations ────────────────────────────────────────────
    for stub in &input.constraint_stubs {
        let Stub::Annotation {
            origin,
            annotation,
            annotation_ty,
            value,
            ..
        } = stub
        else {
            continue;
        };
        let ann = annotation_ty
            .clone()
            .or_else(|| resolved.get(annotation).cloned());
        let val = resolved.get(value).cloned();
        if let (Some(ann), Some(val)) = (ann, val) {
            if let Err(err) = Unifier::new(&mut subst, &mut vars, &adt).unify(&ann, &val) {
                diagnostics.push(mismatch_diag(*origin, Reason::TypeMismatch, &err));
            }
        }
    }

    // ── Phase 2: calls and field projection ─────────────────────────────
    for stub in &input.constraint_stubs {
        match stub {
            Stub::Call {
                origin,
                callee,
                argument,
                result_ty,
                index,
                argument_ty,
                ..
            } => {
                let Some(callee_ty) = resolved.get(callee) else {
                    continue;
                };
                let mut peeled = subst.apply(callee_ty);
                for _ in 0..*index {
                    match peeled {
                        Ty::Func(_, to) => peeled = *to,
                        other => {
                            peeled = other;
                            break;
                        }
                    }
                }
                let arg = resolved
                    .get(argument)
                    .cloned()
                    .unwrap_or_else(|| argument_ty.clone());
                let wanted = Ty::func(subst.apply(&arg), result_ty.clone());
                if let Err(err) = Unifier::new(&mut subst, &mut vars, &adt).unify(&peeled, &wanted)
                {
                    let resolved_callee = subst.apply(&peeled);
                    if matches!(
                        resolved_callee,
                        Ty::Func(..) | Ty::Var(_) | Ty::Hole(_)
                    ) {
                        diagnostics.push(mismatch_diag(*origin, Reason::TypeMismatch, &err));
                    } else {
                        diagnostics.push(
                            Diagnostic::new(*origin, Reason::NotFunction)
                                .with("callee", resolved_callee.to_string()),
                        );
                    }
                }
            }
            Stub::HasField {
                origin,
                target,
                field,
                result,
                projected_ty,
            } => {
                let Some(target_ty) = resolved.get(target).cloned() else {
                    continue;
                };
                let target_ty = subst.apply(&target_ty);
                if let Some(projected) = project_field(
                    &mut subst,
                    &mut vars,
                    &adt,
                    &registry,
                    &target_ty,
                    field,
                    *origin,
                    &mut diagnostics,
                ) {
                    if let Some(expected) = projected_ty {
                        let _ = Unifier::new(&mut subst, &mut vars, &adt)
                            .unify(expected, &projected);
                    }
                    resolved.insert(*result, projected);
                }
            }
            _ => {}
        }
    }

    // ── Phase 3: numeric / boolean ──────────────────────────────────────
    for stub in &input.constraint_stubs {
        let (origin, operands, operator, boolean) = match stub {
            Stub::Numeric {
                origin,
                operands,
                operator,
                ..
            } => (*origin, operands, operator.as_str(), false),
            Stub::Boolean {
                origin,
                operands,
                operator,
                ..
            } => (*origin, operands, operator.as_str(), true),
            _ => continue,
        };
        let operand_base = if boolean { Ty::Bool } else { Ty::Int };
        let comparison = matches!(operator, "<" | ">" | "<=" | ">=" | "==" | "!=");
        let result_base = if boolean || comparison {
            Ty::Bool
        } else {
            Ty::Int
        };
        let operand_reason = if boolean {
            Reason::NotBoolean
        } else {
            Reason::NotNumeric
        };

        // Split carriers off the operands; bare values must be numeric
        // (resp. boolean) and carrier states accumulate per domain.
        let mut states: Vec<(String, Ty)> = Vec::new();
        for operand in operands {
            let Some(ty) = resolved.get(operand) else {
                continue;
            };
            let ty = subst.apply(ty);
            let (bare, carrier) = match adt.split_carrier(&ty) {
                Some(parts) => (parts.value.clone(), Some((parts.domain, parts.state))),
                None => (ty.clone(), None),
            };
            if let Err(_err) = Unifier::new(&mut subst, &mut vars, &adt).unify(&bare, &operand_base)
            {
                diagnostics.push(
                    Diagnostic::new(*operand, operand_reason)
                        .with("operator", operator.to_string())
                        .with("actual", subst.apply(&bare).to_string()),
                );
            }
            if let Some((domain, state)) = carrier {
                match states.iter_mut().find(|(d, _)| *d == domain) {
                    Some((_, accumulated)) => {
                        // Domain-specific merge; the effect domain (and
                        // any union-policy domain) unions rows.
                        if let (Ty::Row(a), Ty::Row(b)) = (&*accumulated, &state) {
                            let (merged, _) = registry.merge_rows(&domain, a, b);
                            *accumulated = Ty::Row(merged);
                        }
                    }
                    None => states.push((domain, state)),
                }
            }
        }

        let mut wrapped = result_base;
        if !comparison {
            for (domain, state) in &states {
                if let Some(rebuilt) = adt.join_carrier(domain, wrapped.clone(), state.clone()) {
                    wrapped = rebuilt;
                }
            }
        }
        let current = resolved.get(&origin).cloned();
        match current {
            // Layer 1 typed the operator application bare; a carrier-
            // wrapped result supersedes it rather than contradicting it.
            Some(current) if !current.is_hole() && states.is_empty() => {
                if let Err(err) =
                    Unifier::new(&mut subst, &mut vars, &adt).unify(&current, &wrapped)
                {
                    diagnostics.push(mismatch_diag(origin, Reason::TypeMismatch, &err));
                }
            }
            _ => {
                resolved.insert(origin, wrapped);
            }
        }
    }

    // ── Phase 4: branch joins ───────────────────────────────────────────
    for stub in &input.constraint_stubs {
        let Stub::BranchJoin {
            origin,
            branches,
            discharges_result,
            ..
        } = stub
        else {
            continue;
        };
        let mut joined: Option<Ty> = None;
        for branch in branches {
            let Some(ty) = resolved.get(branch) else {
                continue;
            };
            let mut ty = subst.apply(ty);
            if *discharges_result {
                if let Some(parts) = adt.split_carrier(&ty) {
                    if parts.domain == "effect" {
                        ty = parts.value;
                    }
                }
            }
            joined = Some(match joined {
                None => ty,
                Some(prev) => join_branch(
                    &mut subst,
                    &mut vars,
                    &adt,
                    &registry,
                    prev,
                    ty,
                    *origin,
                    &mut diagnostics,
                ),
            });
        }
        if let Some(ty) = joined {
            resolved.insert(*origin, subst.apply(&ty));
        }
    }

    // ── Constraint-label propagation ────────────────────────────────────
    let flow = run_flow(
        &input.constraint_stubs,
        &registry,
        &adt,
        &subst,
        &mut resolved,
        options.reify_carriers,
    );
    diagnostics.extend(flow.diagnostics);

    // ── Hole conflict detection & classification ────────────────────────
    let mut solutions: FxHashMap<HoleId, HoleSolution> = FxHashMap::default();
    let mut conflicts_out: Vec<HoleConflict> = Vec::new();
    for (hole_id, info) in &input.holes {
        let constraints = hole_constraints(&input.constraint_stubs, &resolved, &subst, *hole_id);
        let mut conflicts: Vec<Conflict> = Vec::new();
        for i in 0..constraints.len() {
            for j in (i + 1)..constraints.len() {
                let mut scratch_subst = subst.clone();
                let mut scratch_vars = vars.clone();
                if Unifier::new(&mut scratch_subst, &mut scratch_vars, &adt)
                    .unify(&constraints[i], &constraints[j])
                    .is_err()
                {
                    conflicts.push(Conflict {
                        left: constraints[i].clone(),
                        right: constraints[j].clone(),
                    });
                }
            }
        }
        if !conflicts.is_empty() {
            diagnostics.push(
                Diagnostic::new(hole_id.0, Reason::UnfillableHole).with(
                    "conflicts",
                    conflicts
                        .iter()
                        .map(|c| format!("{} vs {}", c.left, c.right))
                        .collect::<Vec<String>>(),
                ),
            );
            conflicts_out.push(HoleConflict {
                hole: *hole_id,
                conflicts: conflicts.clone(),
            });
            solutions.insert(
                *hole_id,
                HoleSolution::Conflicted {
                    conflicts,
                    info: info.clone(),
                },
            );
            continue;
        }
        if constraints.is_empty() {
            // No stub constrained this hole directly; it may still have
            // been resolved positionally (field projection, branch join).
            let current = resolved.get(&hole_id.0).map(|t| subst.apply(t));
            let solution = match current {
                Some(t) if !t.contains_hole() && t.vars().is_empty() => HoleSolution::Solved {
                    ty: t,
                    info: info.clone(),
                },
                Some(t) if !t.is_hole() && !t.is_var() => HoleSolution::Partial {
                    known: Some(t),
                    constraints: Vec::new(),
                    possibilities: Vec::new(),
                    info: info.clone(),
                },
                _ => HoleSolution::Unsolved { info: info.clone() },
            };
            solutions.insert(*hole_id, solution);
            continue;
        }
        // All constraints agree: fold them into one representative.
        let witness = Ty::Var(vars.fresh());
        for constraint in &constraints {
            let _ = Unifier::new(&mut subst, &mut vars, &adt).unify(&witness, constraint);
        }
        let solved = subst.apply(&witness);
        if !solved.contains_hole() && solved.vars().is_empty() {
            resolved.insert(hole_id.0, solved.clone());
            solutions.insert(
                *hole_id,
                HoleSolution::Solved {
                    ty: solved,
                    info: info.clone(),
                },
            );
        } else {
            let known = (!solved.is_var()).then(|| solved.clone());
            if known.is_some() {
                resolved.insert(hole_id.0, solved);
            }
            solutions.insert(
                *hole_id,
                HoleSolution::Partial {
                    known,
                    constraints,
                    possibilities: Vec::new(),
                    info: info.clone(),
                },
            );
        }
    }

    // ── Remarking (apply results back onto the marked AST) ──────────────
    let mut remarked = input.marked_program.clone();
    let conflicted: FxHashMap<NodeId, Vec<Conflict>> = conflicts_out
        .iter()
        .map(|c| (c.hole.0, c.conflicts.clone()))
        .collect();
    for_each_type_mut(&mut remarked, &mut |id, ty| {
        if let Some(conflicts) = conflicted.get(&id) {
            *ty = Ty::Hole(Provenance::Unfillable {
                hole: HoleId(id),
                conflicts: conflicts.clone(),
            });
            return;
        }
        if ty.is_hole() {
            if let Some(replacement) = resolved.get(&id) {
                let applied = subst.apply(replacement);
                if !applied.is_hole() && !applied.is_var() {
                    *ty = applied;
                }
            }
        } else {
            *ty = subst.apply(ty);
        }
    });

    // ── Exported summaries ──────────────────────────────────────────────
    let summaries: FxHashMap<String, Scheme> = input
        .summaries
        .iter()
        .map(|(name, scheme)| {
            let applied = subst.apply(&scheme.ty);
            (name.clone(), Scheme::normalize_from_ty(applied))
        })
        .collect();

    // Final resolved types: substitution-applied fixpoints.
    let resolved_node_types: FxHashMap<NodeId, Ty> = resolved
        .iter()
        .map(|(id, ty)| (*id, subst.apply(ty)))
        .collect();

    SolverResult {
        solutions,
        diagnostics,
        substitution: subst,
        resolved_node_types,
        remarked_program: remarked,
        conflicts: conflicts_out,
        summaries,
        constraint_flow: Some(flow.report),
    }
}

fn mismatch_diag(origin: NodeId, reason: Reason, err: &UnifyError) -> Diagnostic {
    match err {
        UnifyError::TypeMismatch { expected, found } => Diagnostic::new(origin, reason)
            .with("expected", expected.to_string())
            .with("actual", found.to_string()),
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
    }
}

/// Resolve a `HasField` projection. Returns the projected type to store
/// at the origin, or `None` when nothing could be learned.
#[allow(clippy::too_many_arguments)]
fn project_field(
    subst: &mut Subst,
    vars: &mut VarAlloc,
    adt: &AdtEnv,
    registry: &DomainRegistry,
    target: &Ty,
    field: &str,
    origin: NodeId,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Ty> {
    match target {
        Ty::Record(fields) => match fields.get(field) {
            Some(ty) => Some(subst.apply(ty)),
            None => {
                diagnostics.push(
                    Diagnostic::new(origin, Reason::MissingField)
                        .with("field", field.to_string())
                        .with("target", target.to_string()),
                );
                None
            }
        },
        Ty::Ctor { name, args } => {
            if let Some(expanded) = adt.expand_alias(name, args) {
                return project_field(
                    subst,
                    vars,
                    adt,
                    registry,
                    &expanded,
                    field,
                    origin,
                    diagnostics,
                );
            }
            if let Some(fields) = adt.record_fields_at(name, args) {
                return match fields.iter().find(|(n, _)| n == field) {
                    Some((_, ty)) => Some(subst.apply(ty)),
                    None => {
                        diagnostics.push(
                            Diagnostic::new(origin, Reason::MissingField)
                                .with("field", field.to_string())
                                .with("target", target.to_string()),
                        );
                        None
                    }
                };
            }
            if let Some(parts) = adt.split_carrier(target) {
                // Project through the carrier, preserving it around the
                // projected field value. Projecting a carrier field out
                // of a carrier target combines the two states.
                let value = subst.apply(&parts.value);
                let projected = project_field(
                    subst,
                    vars,
                    adt,
                    registry,
                    &value,
                    field,
                    origin,
                    diagnostics,
                )?;
                if let Some(inner) = adt.split_carrier(&projected) {
                    if inner.domain == parts.domain {
                        if let (Ty::Row(outer_row), Ty::Row(inner_row)) =
                            (&parts.state, &inner.state)
                        {
                            let combined = if parts.domain == "effect" {
                                union_rows(outer_row, inner_row)
                            } else {
                                let (merged, _) =
                                    registry.merge_rows(&parts.domain, outer_row, inner_row);
                                merged
                            };
                            return adt.join_carrier(
                                &parts.domain,
                                inner.value,
                                Ty::Row(combined),
                            );
                        }
                    }
                }
                return adt.join_carrier(&parts.domain, projected, parts.state);
            }
            diagnostics.push(
                Diagnostic::new(origin, Reason::NotRecord)
                    .with("field", field.to_string())
                    .with("target", target.to_string()),
            );
            None
        }
        Ty::Var(_) => {
            // Learn a singleton record shape from the projection.
            let result = Ty::Var(vars.fresh());
            let mut fields = std::collections::BTreeMap::new();
            fields.insert(field.to_string(), result.clone());
            let record = Ty::Record(fields);
            match Unifier::new(subst, vars, adt).unify(target, &record) {
                Ok(()) => Some(subst.apply(&result)),
                Err(err) => {
                    diagnostics.push(mismatch_diag(origin, Reason::NotRecord, &err));
                    None
                }
            }
        }
        Ty::Hole(_) => None,
        other => {
            diagnostics.push(
                Diagnostic::new(origin, Reason::NotRecord)
                    .with("field", field.to_string())
                    .with("target", other.to_string()),
            );
            None
        }
    }
}

/// Join two branch types: carriers of the same domain join value-wise
/// with state union; everything else unifies structurally.
#[allow(clippy::too_many_arguments)]
fn join_branch(
    subst: &mut Subst,
    vars: &mut VarAlloc,
    adt: &AdtEnv,
    registry: &DomainRegistry,
    prev: Ty,
    next: Ty,
    origin: NodeId,
    diagnostics: &mut Vec<Diagnostic>,
) -> Ty {
    if let (Some(a), Some(b)) = (adt.split_carrier(&prev), adt.split_carrier(&next)) {
        if a.domain == b.domain {
            if let Err(err) = Unifier::new(subst, vars, adt).unify(&a.value, &b.value) {
                diagnostics.push(mismatch_diag(origin, Reason::BranchMismatch, &err));
            }
            let state = match (&a.state, &b.state) {
                (Ty::Row(x), Ty::Row(y)) => {
                    let (merged, _) = registry.merge_rows(&a.domain, x, y);
                    Ty::Row(merged)
                }
                (Ty::Row(_), _) => a.state.clone(),
                _ => b.state.clone(),
            };
            if let Some(joined) =
                adt.join_carrier(&a.domain, subst.apply(&a.value), state)
            {
                return joined;
            }
        }
    }
    if let Err(err) = Unifier::new(subst, vars, adt).unify(&prev, &next) {
        diagnostics.push(mismatch_diag(origin, Reason::BranchMismatch, &err));
    }
    subst.apply(&prev)
}

/// Every type a hole has been constrained against, via call, annotation,
/// numeric, and boolean stubs.
fn hole_constraints(
    stubs: &[Stub],
    resolved: &FxHashMap<NodeId, Ty>,
    subst: &Subst,
    hole: HoleId,
) -> Vec<Ty> {
    let node = hole.0;
    let mut constraints = Vec::new();
    for stub in stubs {
        match stub {
            Stub::Call {
                argument, callee, index, ..
            } if *argument == node => {
                let Some(callee_ty) = resolved.get(callee) else {
                    continue;
                };
                let mut peeled = subst.apply(callee_ty);
                for _ in 0..*index {
                    match peeled {
                        Ty::Func(_, to) => peeled = *to,
                        other => {
                            peeled = other;
                            break;
                        }
                    }
                }
                if let Ty::Func(from, _) = peeled {
                    let expected = subst.apply(&from);
                    if !expected.is_hole() && !expected.is_var() {
                        constraints.push(expected);
                    }
                }
            }
            Stub::Annotation {
                value,
                annotation_ty,
                annotation,
                ..
            } if *value == node => {
                let ann = annotation_ty
                    .clone()
                    .or_else(|| resolved.get(annotation).cloned());
                if let Some(ann) = ann {
                    let applied = subst.apply(&ann);
                    if !applied.is_hole() && !applied.is_var() {
                        constraints.push(applied);
                    }
                }
            }
            Stub::Numeric { operands, .. } if operands.contains(&node) => {
                constraints.push(Ty::Int);
            }
            Stub::Boolean { operands, .. } if operands.contains(&node) => {
                constraints.push(Ty::Bool);
            }
            // A hole in one branch is constrained by its siblings.
            Stub::BranchJoin { branches, .. } if branches.contains(&node) => {
                for branch in branches {
                    if *branch == node {
                        continue;
                    }
                    let Some(ty) = resolved.get(branch) else {
                        continue;
                    };
                    let applied = subst.apply(ty);
                    if !applied.is_hole() && !applied.is_var() {
                        constraints.push(applied);
                    }
                }
            }
            _ => {}
        }
    }
    constraints
}
