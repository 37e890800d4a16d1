//! Tolerant two-layer type inference for Rill.
//!
//! Layer 1 (`infer`) walks the AST and synthesises Hindley-Milner types
//! with records, row-polymorphic effect rows, and carrier types -- and it
//! never throws: every ill-typed construct becomes a *mark* node typed by
//! a provenance-tagged *hole*, with a diagnostic on the side. Deferred
//! obligations are logged as constraint stubs.
//!
//! Layer 2 (`solve`) replays the stubs in a fixed phase order, propagates
//! constraint labels over the flow graph, detects conflicting
//! requirements on each hole, and re-annotates the marked AST with
//! resolved types.
//!
//! ```
//! use rill_ast::{AstBuilder, TopLevel};
//!
//! let mut b = AstBuilder::new();
//! let x = b.ident("x");
//! let body = b.body(x);
//! let param = b.param_var("x");
//! let id = b.let_decl("id", vec![param], body);
//! let program = b.program(vec![TopLevel::Let(id)]);
//!
//! let (layer1, layer2) = rill_typeck::check(&program);
//! assert!(layer1.layer1_diagnostics.is_empty());
//! assert_eq!(layer2.summaries["id"].to_string(), "forall a. a -> a");
//! ```

pub mod adt;
pub mod builtins;
pub mod ctx;
pub mod decl;
pub mod domain;
pub mod error;
pub mod flow;
pub mod infer;
pub mod lower;
pub mod mark;
pub mod materialize;
pub mod present;
pub mod solve;
pub mod stub;
pub mod ty;
pub mod unify;

pub use error::{Diagnostic, Reason};
pub use infer::{infer_program, InferOptions, InferResult};
pub use present::{present_program, Presentation, RenderOptions};
pub use solve::{
    solve_constraints, solve_with_options, HoleSolution, SolveInput, SolveOptions, SolverResult,
};
pub use ty::{HoleId, Provenance, Scheme, Ty, TyVar, UnknownInfo};

use rill_ast::Program;

/// Run both layers with defaults: prelude on, infection registry
/// assembled from the program's own `domain`/`op`/`policy`/`annotate`
/// declarations.
pub fn check(program: &Program) -> (InferResult, SolverResult) {
    let layer1 = infer_program(program, InferOptions::default());
    let registry = domain::DomainRegistry::from_program(program);
    let layer2 = solve_constraints(SolveInput::from_infer(&layer1, Some(registry)));
    (layer1, layer2)
}
