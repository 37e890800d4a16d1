//! The inference context: the single mutable state bundle Layer 1
//! threads through the whole walk.
//!
//! Owns the scope stack, the ADT environment, the substitution, the marks
//! and hole tables, the constraint-stub buffer, and the per-unit counters.
//! Nothing here is process-global; two contexts never share state, which
//! is what makes typing units in parallel safe.

use rill_ast::OpClass;
use rill_common::{NodeAlloc, NodeId, Span};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::adt::AdtEnv;
use crate::domain::{AnnotationRule, OpRule, PolicyRule};
use crate::error::{Diagnostic, Reason};
use crate::mark::{MDecl, MExpr, MExprKind, MPattern, MTypeExpr, MatchCoverage};
use crate::stub::Stub;
use crate::ty::{HoleId, Provenance, Scheme, Ty, UnknownInfo, VarAlloc};
use crate::unify::{generalize, instantiate, Subst, Unifier, UnifyError};

/// A user operator: the implementation function it resolves to and its
/// declared class (drives numeric/boolean stub emission).
#[derive(Clone, Debug)]
pub struct OperatorInfo {
    pub impl_name: String,
    pub class: Option<OpClass>,
}

pub struct InferCtx {
    /// Scope stack. Entering a scope snapshots the top map by copy, so
    /// lookups only ever consult the top.
    env: Vec<FxHashMap<String, Scheme>>,
    pub adt: AdtEnv,
    pub subst: Subst,
    pub vars: VarAlloc,
    /// Node allocator for synthesised nodes (parameter lowering), seeded
    /// past the parser's largest id.
    pub nodes: NodeAlloc,
    /// Flat record of every binding ever introduced, for the LSP layer.
    pub all_bindings: FxHashMap<String, Scheme>,
    /// Exported top-level schemes.
    pub summaries: FxHashMap<String, Scheme>,
    pub marks: FxHashMap<NodeId, MExpr>,
    pub pattern_marks: FxHashMap<NodeId, MPattern>,
    pub type_expr_marks: FxHashMap<NodeId, MTypeExpr>,
    pub decl_marks: FxHashMap<NodeId, MDecl>,
    /// Raw, pre-solver recorded type per node.
    pub node_types: FxHashMap<NodeId, Ty>,
    pub holes: FxHashMap<HoleId, UnknownInfo>,
    /// Append-only; emission order is significant.
    pub stubs: Vec<Stub>,
    pub diagnostics: Vec<Diagnostic>,
    /// Per-match coverage metadata, consumed by materialisation.
    pub match_results: FxHashMap<NodeId, MatchCoverage>,
    pub infix_ops: FxHashMap<String, OperatorInfo>,
    pub prefix_ops: FxHashMap<String, OperatorInfo>,
    /// Declaration-level label rules, keyed by function name. Inference
    /// emits raw stubs from these; interpreting them is the solver's job.
    pub op_rules: FxHashMap<String, Vec<OpRule>>,
    pub policy_rules: FxHashMap<String, Vec<PolicyRule>>,
    pub annotation_rules: FxHashMap<String, Vec<AnnotationRule>>,
    /// Domains that declared a return-boundary policy; functions emit
    /// `RequireAtReturn` stubs for each.
    pub boundary_domains: Vec<String>,
    /// Last unification failure, for callers that decide how to mark.
    pub last_failure: Option<UnifyError>,
}

impl InferCtx {
    pub fn new(node_seed: u32) -> Self {
        let mut nodes = NodeAlloc::new();
        for _ in 0..node_seed {
            nodes.fresh();
        }
        InferCtx {
            env: vec![FxHashMap::default()],
            adt: AdtEnv::new(),
            subst: Subst::new(),
            vars: VarAlloc::new(),
            nodes,
            all_bindings: FxHashMap::default(),
            summaries: FxHashMap::default(),
            marks: FxHashMap::default(),
            pattern_marks: FxHashMap::default(),
            type_expr_marks: FxHashMap::default(),
            decl_marks: FxHashMap::default(),
            node_types: FxHashMap::default(),
            holes: FxHashMap::default(),
            stubs: Vec::new(),
            diagnostics: Vec::new(),
            match_results: FxHashMap::default(),
            infix_ops: FxHashMap::default(),
            prefix_ops: FxHashMap::default(),
            op_rules: FxHashMap::default(),
            policy_rules: FxHashMap::default(),
            annotation_rules: FxHashMap::default(),
            boundary_domains: Vec::new(),
            last_failure: None,
        }
    }

    // ── Scopes ──────────────────────────────────────────────────────────

    pub fn push_scope(&mut self) {
        let snapshot = self.env.last().cloned().unwrap_or_default();
        self.env.push(snapshot);
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.env.len() > 1, "cannot pop the root scope");
        if self.env.len() > 1 {
            self.env.pop();
        }
    }

    /// Run `f` inside a fresh scope. The previous environment snapshot is
    /// restored on every exit path; since inference never unwinds, a
    /// plain pop suffices.
    pub fn with_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_scope();
        let out = f(self);
        self.pop_scope();
        out
    }

    pub fn bind(&mut self, name: impl Into<String>, scheme: Scheme) {
        let name = name.into();
        self.all_bindings.insert(name.clone(), scheme.clone());
        self.env
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name, scheme);
    }

    /// Remove a binding from the current scope (recursive pre-bindings
    /// are stripped before generalisation).
    pub fn unbind(&mut self, name: &str) {
        self.env
            .last_mut()
            .expect("scope stack is never empty")
            .remove(name);
    }

    pub fn lookup(&self, name: &str) -> Option<&Scheme> {
        self.env.last().and_then(|scope| scope.get(name))
    }

    pub fn bindings_in_scope(&self) -> impl Iterator<Item = (&String, &Scheme)> {
        self.env.last().into_iter().flat_map(|scope| scope.iter())
    }

    pub fn top_env(&self) -> FxHashMap<String, Scheme> {
        self.env.last().cloned().unwrap_or_default()
    }

    // ── Variables & unification ─────────────────────────────────────────

    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.vars.fresh())
    }

    /// Unify, storing the failure for the caller to inspect. Callers
    /// decide whether and where to mark; unification itself never marks.
    pub fn unify(&mut self, a: &Ty, b: &Ty) -> bool {
        let result = Unifier::new(&mut self.subst, &mut self.vars, &self.adt).unify(a, b);
        match result {
            Ok(()) => {
                self.last_failure = None;
                true
            }
            Err(err) => {
                self.last_failure = Some(err);
                false
            }
        }
    }

    pub fn apply(&self, ty: &Ty) -> Ty {
        self.subst.apply(ty)
    }

    pub fn instantiate(&mut self, scheme: &Scheme) -> Ty {
        instantiate(scheme, &mut self.vars)
    }

    /// Generalise against the substitution-applied environment.
    pub fn generalize(&self, ty: &Ty) -> Scheme {
        let mut env_vars = FxHashSet::default();
        if let Some(scope) = self.env.last() {
            for scheme in scope.values() {
                let applied = self.subst.apply(&scheme.ty);
                for v in applied.vars() {
                    if !scheme.vars.contains(&v) {
                        env_vars.insert(v);
                    }
                }
            }
        }
        generalize(ty, &self.subst, &env_vars)
    }

    // ── Recording ───────────────────────────────────────────────────────

    /// Record the substitution-applied type of a node; register the hole
    /// if the type still is one.
    pub fn record_type(&mut self, id: NodeId, ty: &Ty) -> Ty {
        let applied = self.subst.apply(ty);
        if let Ty::Hole(prov) = &applied {
            self.register_hole(id, prov.clone(), Vec::new());
        }
        self.node_types.insert(id, applied.clone());
        applied
    }

    pub fn register_hole(&mut self, origin: NodeId, provenance: Provenance, related: Vec<NodeId>) {
        self.holes.entry(HoleId(origin)).or_insert_with(|| UnknownInfo {
            category: provenance.category(),
            provenance,
            origin,
            related,
        });
    }

    /// Mint a hole typed at `origin` and register it.
    pub fn mint_hole(&mut self, origin: NodeId, provenance: Provenance) -> Ty {
        self.register_hole(origin, provenance.clone(), Vec::new());
        Ty::Hole(provenance)
    }

    pub fn emit(&mut self, stub: Stub) {
        self.stubs.push(stub);
    }

    pub fn diag(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Replace an expression with a mark node. Returns the hole type the
    /// mark carries. The diagnostic is optional: pure gradual-typing
    /// events mark without diagnosing.
    pub fn mark_expr(
        &mut self,
        id: NodeId,
        span: Span,
        kind: MExprKind,
        provenance: Provenance,
        diagnostic: Option<Diagnostic>,
    ) -> Ty {
        let ty = self.mint_hole(id, provenance);
        self.marks.insert(
            id,
            MExpr {
                id,
                span,
                ty: ty.clone(),
                kind,
            },
        );
        self.node_types.insert(id, ty.clone());
        if let Some(d) = diagnostic {
            self.diag(d);
        }
        ty
    }

    /// Internal-invariant escape hatch: mark and keep going.
    pub fn mark_internal(&mut self, id: NodeId, span: Span, reason: &str) -> Ty {
        debug_assert!(false, "internal invariant violated: {}", reason);
        let diagnostic =
            Diagnostic::new(id, Reason::InternalError).with("reason", reason.to_string());
        self.mark_expr(
            id,
            span,
            MExprKind::MarkInternal {
                reason: reason.to_string(),
            },
            Provenance::Internal {
                reason: reason.to_string(),
            },
            Some(diagnostic),
        )
    }
}
