//! The infection registry: declarative rules for constraint-label
//! domains.
//!
//! A domain names one label subsystem (the built-in `effect` row tracking,
//! or user-declared ones like a lock-state domain). Each domain declares
//! how two labels merge, which tag pairs conflict, and what its function
//! return boundary requires. The registry is assembled from declaration
//! nodes or handed in by the caller; when absent, the solver falls back to
//! the hard-coded `effect` defaults.

use rill_ast::{PolicyKind, Program, TopLevel};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::ty::EffectRow;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum StateKind {
    /// Labels are tag sets; merging is set-like.
    Plain,
    /// Labels are tag bags; the same base tag arriving twice under one
    /// identity is an error, not a merge.
    RowBag,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MergePolicy {
    Union,
    KeepLeft,
    KeepRight,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum BoundaryPolicy {
    /// A labelled return value must be wrapped in the domain's carrier.
    MustBeCarrier,
    /// Returns must carry no labels in this domain.
    MustBeEmpty,
}

/// One domain's declared behaviour.
#[derive(Clone, Debug, Serialize)]
pub struct DomainRule {
    pub name: String,
    pub state_kind: StateKind,
    pub merge: MergePolicy,
    pub conflict_pairs: Vec<(String, String)>,
    pub boundary: Option<BoundaryPolicy>,
    pub carrier: Option<String>,
}

/// Calling `function` adds/removes tags at the call site.
#[derive(Clone, Debug, Serialize)]
pub struct OpRule {
    pub function: String,
    pub domain: String,
    pub adds: Vec<String>,
    pub removes: Vec<String>,
}

/// Arguments of `function` must satisfy a state requirement.
#[derive(Clone, Debug, Serialize)]
pub struct PolicyRule {
    pub function: String,
    pub domain: String,
    pub kind: PolicyKind,
    pub tags: Vec<String>,
    pub domains: Vec<String>,
}

/// `function`'s body carries tags, optionally boundary-checked at its
/// return.
#[derive(Clone, Debug, Serialize)]
pub struct AnnotationRule {
    pub function: String,
    pub domain: String,
    pub tags: Vec<String>,
    pub at_return: bool,
}

/// An extra cross-tag incompatibility, pluggable beyond the per-domain
/// conflict pairs.
#[derive(Clone, Debug, Serialize)]
pub struct ConflictRule {
    pub domain: String,
    pub left: String,
    pub right: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DomainRegistry {
    pub domains: FxHashMap<String, DomainRule>,
    pub op_rules: Vec<OpRule>,
    pub policy_rules: Vec<PolicyRule>,
    pub annotation_rules: Vec<AnnotationRule>,
    pub conflict_rules: Vec<ConflictRule>,
}

impl DomainRegistry {
    /// The hard-coded fallback: the `effect` domain with carrier `Eff`,
    /// row-union merging, no conflicts, no boundary policy.
    pub fn default_effect() -> Self {
        let mut registry = DomainRegistry::default();
        registry.domains.insert(
            "effect".to_string(),
            DomainRule {
                name: "effect".to_string(),
                state_kind: StateKind::Plain,
                merge: MergePolicy::Union,
                conflict_pairs: Vec::new(),
                boundary: None,
                carrier: Some("Eff".to_string()),
            },
        );
        registry
    }

    /// Build a registry from declaration-level `domain`/`op`/`policy`/
    /// `annotate` nodes, on top of the `effect` defaults.
    pub fn from_program(program: &Program) -> Self {
        let mut registry = Self::default_effect();
        for decl in &program.declarations {
            match decl {
                TopLevel::Domain(d) => {
                    let rule = DomainRule {
                        name: d.name.clone(),
                        state_kind: match d.state_kind.as_str() {
                            "rowbag" => StateKind::RowBag,
                            _ => StateKind::Plain,
                        },
                        merge: match d.merge.as_str() {
                            "keep_left" => MergePolicy::KeepLeft,
                            "keep_right" => MergePolicy::KeepRight,
                            _ => MergePolicy::Union,
                        },
                        conflict_pairs: d.conflict_pairs.clone(),
                        boundary: match d.boundary.as_deref() {
                            Some("must_be_carrier") => Some(BoundaryPolicy::MustBeCarrier),
                            Some("must_be_empty") => Some(BoundaryPolicy::MustBeEmpty),
                            _ => None,
                        },
                        carrier: d.carrier.clone(),
                    };
                    registry.domains.insert(rule.name.clone(), rule);
                }
                TopLevel::OpRule(r) => registry.op_rules.push(OpRule {
                    function: r.function.clone(),
                    domain: r.domain.clone(),
                    adds: r.adds.clone(),
                    removes: r.removes.clone(),
                }),
                TopLevel::Policy(p) => registry.policy_rules.push(PolicyRule {
                    function: p.function.clone(),
                    domain: p.domain.clone(),
                    kind: p.policy,
                    tags: p.tags.clone(),
                    domains: p.domains.clone(),
                }),
                TopLevel::Annotate(a) => registry.annotation_rules.push(AnnotationRule {
                    function: a.function.clone(),
                    domain: a.domain.clone(),
                    tags: a.tags.clone(),
                    at_return: a.at_return,
                }),
                _ => {}
            }
        }
        registry
    }

    pub fn rule(&self, domain: &str) -> Option<&DomainRule> {
        self.domains.get(domain)
    }

    /// Merge policy for a domain. Unknown domains default to union for
    /// `effect` and keep-left otherwise.
    pub fn merge_policy(&self, domain: &str) -> MergePolicy {
        match self.domains.get(domain) {
            Some(rule) => rule.merge,
            None if domain == "effect" => MergePolicy::Union,
            None => MergePolicy::KeepLeft,
        }
    }

    pub fn state_kind(&self, domain: &str) -> StateKind {
        self.domains
            .get(domain)
            .map(|r| r.state_kind)
            .unwrap_or(StateKind::Plain)
    }

    pub fn boundary(&self, domain: &str) -> Option<BoundaryPolicy> {
        self.domains.get(domain).and_then(|r| r.boundary)
    }

    pub fn carrier_name(&self, domain: &str) -> Option<&str> {
        self.domains
            .get(domain)
            .and_then(|r| r.carrier.as_deref())
    }

    /// Merge two label rows under a domain's policy. Returns the merged
    /// row and, for row-bag domains, the tags that arrived on both sides
    /// (duplicates are reported, not silently deduplicated).
    pub fn merge_rows(
        &self,
        domain: &str,
        left: &EffectRow,
        right: &EffectRow,
    ) -> (EffectRow, Vec<String>) {
        match self.merge_policy(domain) {
            MergePolicy::KeepLeft => (left.clone(), Vec::new()),
            MergePolicy::KeepRight => (right.clone(), Vec::new()),
            MergePolicy::Union => {
                let mut duplicates = Vec::new();
                if self.state_kind(domain) == StateKind::RowBag {
                    for tag in right.cases.keys() {
                        if left.cases.contains_key(tag) {
                            duplicates.push(tag.clone());
                        }
                    }
                }
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
                (merged, duplicates)
            }
        }
    }

    /// Conflicting tag pairs present in a row, from the domain's
    /// declared pairs and the pluggable conflict-rules table.
    pub fn conflicts_in(&self, domain: &str, row: &EffectRow) -> Vec<(String, String)> {
        let mut found = Vec::new();
        if let Some(rule) = self.domains.get(domain) {
            for (a, b) in &rule.conflict_pairs {
                if row.cases.contains_key(a) && row.cases.contains_key(b) {
                    found.push((a.clone(), b.clone()));
                }
            }
        }
        for rule in &self.conflict_rules {
            if rule.domain == domain
                && row.cases.contains_key(&rule.left)
                && row.cases.contains_key(&rule.right)
            {
                found.push((rule.left.clone(), rule.right.clone()));
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_effect_domain() {
        let registry = DomainRegistry::default_effect();
        assert_eq!(registry.merge_policy("effect"), MergePolicy::Union);
        assert_eq!(registry.carrier_name("effect"), Some("Eff"));
        // Unknown domains default to keep-left.
        assert_eq!(registry.merge_policy("lockstate"), MergePolicy::KeepLeft);
    }

    #[test]
    fn union_merge_reports_rowbag_duplicates() {
        let mut registry = DomainRegistry::default_effect();
        registry.domains.insert(
            "resource".to_string(),
            DomainRule {
                name: "resource".to_string(),
                state_kind: StateKind::RowBag,
                merge: MergePolicy::Union,
                conflict_pairs: Vec::new(),
                boundary: None,
                carrier: None,
            },
        );
        let left = EffectRow::from_tags(["file@a"]);
        let right = EffectRow::from_tags(["file@a", "sock@b"]);
        let (merged, duplicates) = registry.merge_rows("resource", &left, &right);
        assert_eq!(duplicates, vec!["file@a".to_string()]);
        assert_eq!(merged.cases.len(), 2);
    }

    #[test]
    fn conflict_pairs_are_detected() {
        let mut registry = DomainRegistry::default_effect();
        registry.domains.insert(
            "lock".to_string(),
            DomainRule {
                name: "lock".to_string(),
                state_kind: StateKind::Plain,
                merge: MergePolicy::Union,
                conflict_pairs: vec![("locked".to_string(), "unlocked".to_string())],
                boundary: None,
                carrier: None,
            },
        );
        let row = EffectRow::from_tags(["locked", "unlocked"]);
        let conflicts = registry.conflicts_in("lock", &row);
        assert_eq!(conflicts.len(), 1);
        let clean = EffectRow::from_tags(["locked"]);
        assert!(registry.conflicts_in("lock", &clean).is_empty());
    }
}
