//! Constraint stubs: deferred typing obligations.
//!
//! Layer 1 appends stubs while it walks the AST; Layer 2 replays them in
//! a fixed phase order. The log is append-only and emission order is
//! significant: the flow subsystem processes its stubs in exactly the
//! order they were emitted, which is how inner-match rewrites land before
//! outer propagation.

use rill_common::NodeId;
use serde::Serialize;

use crate::ty::{EffectRow, Ty};

/// A constraint label: a domain name paired with a row of tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Label {
    pub domain: String,
    pub row: EffectRow,
}

impl Label {
    pub fn new(domain: impl Into<String>, row: EffectRow) -> Self {
        Label {
            domain: domain.into(),
            row,
        }
    }

    pub fn from_tags<I: IntoIterator<Item = S>, S: Into<String>>(
        domain: impl Into<String>,
        tags: I,
    ) -> Self {
        Label {
            domain: domain.into(),
            row: EffectRow::from_tags(tags),
        }
    }
}

/// How much of an effect row a match covered.
#[derive(Clone, Debug, Serialize)]
pub struct RowCoverage {
    pub covered: Vec<String>,
    pub missing: Vec<String>,
    /// The scrutinee row had an open tail, so full coverage is
    /// unknowable.
    pub open_tail: bool,
}

/// One deferred obligation.
#[derive(Clone, Debug, Serialize)]
pub enum Stub {
    /// One argument step of a call: after peeling `index` function
    /// layers off the callee, the next parameter must accept
    /// `argument_ty` and the application yields `result_ty`.
    Call {
        origin: NodeId,
        callee: NodeId,
        argument: NodeId,
        result: NodeId,
        result_ty: Ty,
        index: usize,
        argument_ty: Ty,
    },
    /// All arms of a match must join to one result type.
    BranchJoin {
        origin: NodeId,
        scrutinee: Option<NodeId>,
        branches: Vec<NodeId>,
        /// The match discharges an effect row: its joined result drops
        /// the effect carrier.
        discharges_result: bool,
        row_coverage: Option<RowCoverage>,
    },
    /// An explicit annotation must equal the annotated value's type.
    Annotation {
        origin: NodeId,
        annotation: NodeId,
        annotation_ty: Option<Ty>,
        value: NodeId,
        /// Binding name, when the annotation sits on a declaration.
        subject: Option<String>,
    },
    /// A record projection: `target.field` has type `result`.
    HasField {
        origin: NodeId,
        target: NodeId,
        field: String,
        result: NodeId,
        projected_ty: Option<Ty>,
    },
    /// Operands of a numeric operator. Comparison operators produce
    /// `Bool`; all others produce `Int`.
    Numeric {
        origin: NodeId,
        operands: Vec<NodeId>,
        operator: String,
        result: NodeId,
    },
    /// Operands of a boolean operator.
    Boolean {
        origin: NodeId,
        operands: Vec<NodeId>,
        operator: String,
        result: NodeId,
    },

    // ── Constraint-label flow ───────────────────────────────────────────
    /// `node` introduces `label`.
    ConstraintSource { node: NodeId, label: Label },
    /// Labels at `from` propagate to `to`.
    ConstraintFlow { from: NodeId, to: NodeId },
    /// Rewrite `node`'s row in `domain`: drop `remove`, then add `add`.
    /// Applied inline, in emission order.
    ConstraintRewrite {
        node: NodeId,
        domain: String,
        remove: Vec<String>,
        add: Vec<String>,
    },
    /// Merge a label payload into `node`'s state.
    AddStateTags { node: NodeId, label: Label },
    /// `node`'s row in `domain` must equal exactly this tag set.
    RequireExact {
        node: NodeId,
        domain: String,
        tags: Vec<String>,
    },
    /// `node` must carry at least one tag in `domain`.
    RequireAny { node: NodeId, domain: String },
    /// `node` must carry none of these tags in `domain`.
    RequireNot {
        node: NodeId,
        domain: String,
        tags: Vec<String>,
    },
    /// `node` is a function return position for `domain`; the boundary
    /// policy of the domain is checked against its label row there.
    RequireAtReturn {
        node: NodeId,
        fn_node: NodeId,
        domain: String,
    },
    /// The call at `origin` rejects any labelled argument.
    CallRejectsInfection { origin: NodeId, argument: NodeId },
    /// The call at `origin` rejects arguments labelled in these domains.
    CallRejectsDomains {
        origin: NodeId,
        argument: NodeId,
        domains: Vec<String>,
    },
}

impl Stub {
    /// Whether this stub belongs to the constraint-label flow family.
    pub fn is_flow_stub(&self) -> bool {
        matches!(
            self,
            Stub::ConstraintSource { .. }
                | Stub::ConstraintFlow { .. }
                | Stub::ConstraintRewrite { .. }
                | Stub::AddStateTags { .. }
                | Stub::RequireExact { .. }
                | Stub::RequireAny { .. }
                | Stub::RequireNot { .. }
                | Stub::RequireAtReturn { .. }
                | Stub::CallRejectsInfection { .. }
                | Stub::CallRejectsDomains { .. }
        )
    }
}
