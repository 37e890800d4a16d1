//! Diagnostics.
//!
//! Both layers report failures through the same shape: an origin node id,
//! a reason drawn from a fixed taxonomy, and a free-form detail map.
//! Spans are *not* attached here -- the presentation layer joins
//! diagnostics against the span index so the core stays independent of
//! source text.

use std::collections::BTreeMap;
use std::fmt;

use rill_common::NodeId;
use serde::Serialize;
use serde_json::Value;

/// The fixed diagnostic taxonomy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NotFunction,
    TypeMismatch,
    ArityMismatch,
    OccursCycle,
    MissingField,
    NotRecord,
    NotNumeric,
    NotBoolean,
    BranchMismatch,
    NonExhaustiveMatch,
    FreeVariable,
    DuplicateRecordField,
    DuplicateBinding,
    IncompatibleConstraints,
    BoundaryViolation,
    RequireExactState,
    RequireAnyState,
    RequireNotState,
    RequireAtReturn,
    CallRejectsInfection,
    CallRejectsDomains,
    TypeExprUnknown,
    TypeExprArity,
    TypeExprUnsupported,
    TypeDeclDuplicate,
    TypeDeclInvalidMember,
    UnsupportedExpr,
    UnfillableHole,
    InternalError,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::NotFunction => "not_function",
            Reason::TypeMismatch => "type_mismatch",
            Reason::ArityMismatch => "arity_mismatch",
            Reason::OccursCycle => "occurs_cycle",
            Reason::MissingField => "missing_field",
            Reason::NotRecord => "not_record",
            Reason::NotNumeric => "not_numeric",
            Reason::NotBoolean => "not_boolean",
            Reason::BranchMismatch => "branch_mismatch",
            Reason::NonExhaustiveMatch => "non_exhaustive_match",
            Reason::FreeVariable => "free_variable",
            Reason::DuplicateRecordField => "duplicate_record_field",
            Reason::DuplicateBinding => "duplicate_binding",
            Reason::IncompatibleConstraints => "incompatible_constraints",
            Reason::BoundaryViolation => "boundary_violation",
            Reason::RequireExactState => "require_exact_state",
            Reason::RequireAnyState => "require_any_state",
            Reason::RequireNotState => "require_not_state",
            Reason::RequireAtReturn => "require_at_return",
            Reason::CallRejectsInfection => "call_rejects_infection",
            Reason::CallRejectsDomains => "call_rejects_domains",
            Reason::TypeExprUnknown => "type_expr_unknown",
            Reason::TypeExprArity => "type_expr_arity",
            Reason::TypeExprUnsupported => "type_expr_unsupported",
            Reason::TypeDeclDuplicate => "type_decl_duplicate",
            Reason::TypeDeclInvalidMember => "type_decl_invalid_member",
            Reason::UnsupportedExpr => "unsupported_expr",
            Reason::UnfillableHole => "unfillable_hole",
            Reason::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported failure, keyed to the node it happened at.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub origin: NodeId,
    pub reason: Reason,
    /// Structured payload: expected/actual types rendered as strings,
    /// missing case names, conflicting tags, and so on.
    pub details: BTreeMap<String, Value>,
}

impl Diagnostic {
    pub fn new(origin: NodeId, reason: Reason) -> Self {
        Diagnostic {
            origin,
            reason,
            details: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.reason, self.origin)?;
        if !self.details.is_empty() {
            write!(f, " {{")?;
            for (i, (key, value)) in self.details.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", key, value)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_is_compact() {
        let d = Diagnostic::new(NodeId(4), Reason::TypeMismatch)
            .with("expected", "Int")
            .with("actual", "Bool");
        assert_eq!(
            d.to_string(),
            "type_mismatch at #4 {actual: \"Bool\", expected: \"Int\"}"
        );
    }

    #[test]
    fn reason_names_are_snake_case() {
        assert_eq!(Reason::NonExhaustiveMatch.as_str(), "non_exhaustive_match");
        assert_eq!(
            serde_json::to_string(&Reason::CallRejectsInfection).unwrap(),
            "\"call_rejects_infection\""
        );
    }
}
