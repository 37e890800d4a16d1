//! Constraint-label propagation.
//!
//! Labels are `(domain, row)` pairs attached to nodes by Layer 1's raw
//! stubs. This pass replays the flow family in emission order -- sources,
//! flows, rewrites, state tags, and branch joins -- merging rows under
//! each domain's declared policy. Processing in emission order rather
//! than topologically is load-bearing: an inner match's rewrite lands
//! before the outer match's propagation, which is what makes nested
//! discharge behave.
//!
//! After propagation: conflict-pair detection, row-bag duplicate
//! reporting, boundary checking at function returns, the domain stubs
//! (`require_*`, `call_rejects_*`), and finally carrier reification into
//! the displayed types.

use rill_common::NodeId;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::adt::AdtEnv;
use crate::domain::{BoundaryPolicy, DomainRegistry};
use crate::error::{Diagnostic, Reason};
use crate::stub::Stub;
use crate::ty::{EffectRow, Ty};
use crate::unify::Subst;

/// Final per-node label state, exported for IDE consumers.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FlowReport {
    /// node -> domain -> row. Per-domain singleton labels.
    pub node_labels: FxHashMap<NodeId, FxHashMap<String, EffectRow>>,
}

impl FlowReport {
    pub fn label(&self, node: NodeId, domain: &str) -> Option<&EffectRow> {
        self.node_labels.get(&node).and_then(|m| m.get(domain))
    }
}

/// Left-biased plain row union (used for carrier state merging).
pub fn union_rows(left: &EffectRow, right: &EffectRow) -> EffectRow {
    let mut merged = left.clone();
    for (tag, payload) in &right.cases {
        merged
            .cases
            .entry(tag.clone())
            .or_insert_with(|| payload.clone());
    }
    if merged.tail.is_none() {
        merged.tail = right.tail;
    }
    merged
}

pub struct FlowOutcome {
    pub report: FlowReport,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn run_flow(
    stubs: &[Stub],
    registry: &DomainRegistry,
    adt: &AdtEnv,
    subst: &Subst,
    node_types: &mut FxHashMap<NodeId, Ty>,
    reify_carriers: bool,
) -> FlowOutcome {
    let mut labels: FxHashMap<NodeId, FxHashMap<String, EffectRow>> = FxHashMap::default();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    let merge_into = |labels: &mut FxHashMap<NodeId, FxHashMap<String, EffectRow>>,
                          diagnostics: &mut Vec<Diagnostic>,
                          node: NodeId,
                          domain: &str,
                          row: &EffectRow| {
        let entry = labels.entry(node).or_default();
        match entry.get(domain) {
            Some(existing) => {
                let (merged, duplicates) = registry.merge_rows(domain, existing, row);
                if !duplicates.is_empty() {
                    diagnostics.push(
                        Diagnostic::new(node, Reason::IncompatibleConstraints)
                            .with("domain", domain.to_string())
                            .with("duplicate_tags", duplicates),
                    );
                }
                entry.insert(domain.to_string(), merged);
            }
            None => {
                entry.insert(domain.to_string(), row.clone());
            }
        }
    };

    // ── Sweep 1: propagation, in emission order ─────────────────────────
    for stub in stubs {
        match stub {
            Stub::ConstraintSource { node, label } => {
                merge_into(&mut labels, &mut diagnostics, *node, &label.domain, &label.row);
            }
            Stub::AddStateTags { node, label } => {
                merge_into(&mut labels, &mut diagnostics, *node, &label.domain, &label.row);
            }
            Stub::ConstraintFlow { from, to } => {
                let sources: Vec<(String, EffectRow)> = labels
                    .get(from)
                    .map(|m| m.iter().map(|(d, r)| (d.clone(), r.clone())).collect())
                    .unwrap_or_default();
                for (domain, row) in sources {
                    merge_into(&mut labels, &mut diagnostics, *to, &domain, &row);
                }
            }
            Stub::ConstraintRewrite {
                node,
                domain,
                remove,
                add,
            } => {
                let entry = labels.entry(*node).or_default();
                let mut row = entry.get(domain).cloned().unwrap_or_else(EffectRow::empty);
                for tag in remove {
                    row.cases.remove(tag);
                }
                for tag in add {
                    row.cases.entry(tag.clone()).or_insert(None);
                }
                if row.is_empty() {
                    entry.remove(domain);
                } else {
                    entry.insert(domain.clone(), row);
                }
            }
            Stub::BranchJoin {
                origin, branches, ..
            } => {
                for branch in branches {
                    let sources: Vec<(String, EffectRow)> = labels
                        .get(branch)
                        .map(|m| m.iter().map(|(d, r)| (d.clone(), r.clone())).collect())
                        .unwrap_or_default();
                    for (domain, row) in sources {
                        merge_into(&mut labels, &mut diagnostics, *origin, &domain, &row);
                    }
                }
            }
            _ => {}
        }
    }

    // ── Sweep 2: conflict detection ─────────────────────────────────────
    for (node, domains) in &labels {
        for (domain, row) in domains {
            for (left, right) in registry.conflicts_in(domain, row) {
                diagnostics.push(
                    Diagnostic::new(*node, Reason::IncompatibleConstraints)
                        .with("domain", domain.clone())
                        .with("left", left)
                        .with("right", right),
                );
            }
        }
    }

    // ── Sweep 3: domain stubs and boundary checks ───────────────────────
    let label_of = |labels: &FxHashMap<NodeId, FxHashMap<String, EffectRow>>,
                    node: NodeId,
                    domain: &str|
     -> EffectRow {
        labels
            .get(&node)
            .and_then(|m| m.get(domain))
            .cloned()
            .unwrap_or_else(EffectRow::empty)
    };

    for stub in stubs {
        match stub {
            Stub::RequireExact { node, domain, tags } => {
                let row = label_of(&labels, *node, domain);
                let have: Vec<&String> = row.cases.keys().collect();
                let want: Vec<&String> = tags.iter().collect();
                let matches = have.len() == want.len()
                    && tags.iter().all(|t| row.cases.contains_key(t));
                if !matches {
                    diagnostics.push(
                        Diagnostic::new(*node, Reason::RequireExactState)
                            .with("domain", domain.clone())
                            .with("expected", tags.clone())
                            .with(
                                "actual",
                                row.cases.keys().cloned().collect::<Vec<String>>(),
                            ),
                    );
                }
            }
            Stub::RequireAny { node, domain } => {
                let row = label_of(&labels, *node, domain);
                if row.cases.is_empty() {
                    diagnostics.push(
                        Diagnostic::new(*node, Reason::RequireAnyState)
                            .with("domain", domain.clone()),
                    );
                }
            }
            Stub::RequireNot { node, domain, tags } => {
                let row = label_of(&labels, *node, domain);
                let present: Vec<String> = tags
                    .iter()
                    .filter(|t| row.cases.contains_key(*t))
                    .cloned()
                    .collect();
                if !present.is_empty() {
                    diagnostics.push(
                        Diagnostic::new(*node, Reason::RequireNotState)
                            .with("domain", domain.clone())
                            .with("forbidden", present),
                    );
                }
            }
            Stub::RequireAtReturn {
                node,
                fn_node,
                domain,
            } => {
                let row = label_of(&labels, *node, domain);
                match registry.boundary(domain) {
                    Some(BoundaryPolicy::MustBeEmpty) => {
                        if !row.cases.is_empty() {
                            diagnostics.push(
                                Diagnostic::new(*node, Reason::BoundaryViolation)
                                    .with("domain", domain.clone())
                                    .with("fn", fn_node.0)
                                    .with("policy", "must_be_empty")
                                    .with(
                                        "tags",
                                        row.cases.keys().cloned().collect::<Vec<String>>(),
                                    ),
                            );
                        }
                    }
                    Some(BoundaryPolicy::MustBeCarrier) => {
                        if !row.cases.is_empty() {
                            let carried = node_types
                                .get(node)
                                .map(|t| subst.apply(t))
                                .and_then(|t| adt.split_carrier(&t))
                                .is_some_and(|parts| parts.domain == *domain);
                            if !carried {
                                diagnostics.push(
                                    Diagnostic::new(*node, Reason::BoundaryViolation)
                                        .with("domain", domain.clone())
                                        .with("fn", fn_node.0)
                                        .with("policy", "must_be_carrier")
                                        .with(
                                            "tags",
                                            row.cases.keys().cloned().collect::<Vec<String>>(),
                                        ),
                                );
                            }
                        }
                    }
                    None => {
                        // No boundary policy: the annotation demanded a
                        // state at return; an empty row fails it.
                        if row.cases.is_empty() {
                            diagnostics.push(
                                Diagnostic::new(*node, Reason::RequireAtReturn)
                                    .with("domain", domain.clone())
                                    .with("fn", fn_node.0),
                            );
                        }
                    }
                }
            }
            Stub::CallRejectsInfection { origin, argument } => {
                if let Some(domains) = labels.get(argument) {
                    let infected: Vec<String> = domains
                        .iter()
                        .filter(|(_, row)| !row.cases.is_empty())
                        .map(|(d, _)| d.clone())
                        .collect();
                    if !infected.is_empty() {
                        diagnostics.push(
                            Diagnostic::new(*origin, Reason::CallRejectsInfection)
                                .with("argument", argument.0)
                                .with("domains", infected),
                        );
                    }
                }
            }
            Stub::CallRejectsDomains {
                origin,
                argument,
                domains,
            } => {
                if let Some(present) = labels.get(argument) {
                    let rejected: Vec<String> = domains
                        .iter()
                        .filter(|d| {
                            present
                                .get(*d)
                                .is_some_and(|row| !row.cases.is_empty())
                        })
                        .cloned()
                        .collect();
                    if !rejected.is_empty() {
                        diagnostics.push(
                            Diagnostic::new(*origin, Reason::CallRejectsDomains)
                                .with("argument", argument.0)
                                .with("domains", rejected),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    // ── Sweep 4: carrier reification ────────────────────────────────────
    if reify_carriers {
        for (node, domains) in &labels {
            for (domain, row) in domains {
                if row.cases.is_empty() {
                    continue;
                }
                let Some(current) = node_types.get(node) else {
                    continue;
                };
                let applied = subst.apply(current);
                let Some(parts) = adt.split_carrier(&applied) else {
                    continue;
                };
                if parts.domain != *domain {
                    continue;
                }
                if let Ty::Row(state) = &parts.state {
                    let merged = union_rows(state, row);
                    if let Some(rebuilt) =
                        adt.join_carrier(domain, parts.value.clone(), Ty::Row(merged))
                    {
                        node_types.insert(*node, rebuilt);
                    }
                }
            }
        }
    }

    FlowOutcome {
        report: FlowReport {
            node_labels: labels,
        },
        diagnostics,
    }
}
