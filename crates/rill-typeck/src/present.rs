//! Presentation: joins both layers' outputs for IDE consumption and
//! renders diagnostics against source text.
//!
//! The core never touches source text; this layer owns the span index
//! (built from the remarked program) and attaches spans to diagnostics.
//! Rendering goes through ariadne, colorless by default so test output
//! stays stable.

use std::collections::BTreeMap;
use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use rill_common::{NodeId, Span};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Diagnostic, Reason};
use crate::infer::InferResult;
use crate::mark::for_each_node;
use crate::solve::SolverResult;

/// One node's resolved view: its final type (rendered), node kind, and
/// mark tag if the node is a mark.
#[derive(Clone, Debug, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub span: Span,
    pub ty: String,
    pub kind: String,
    pub mark: Option<String>,
}

/// A diagnostic with its span attached from the span index.
#[derive(Clone, Debug, Serialize)]
pub struct PresentedDiagnostic {
    pub origin: NodeId,
    pub reason: Reason,
    pub details: BTreeMap<String, Value>,
    pub span: Option<Span>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Presentation {
    pub node_views: FxHashMap<NodeId, NodeView>,
    pub diagnostics: Vec<PresentedDiagnostic>,
    pub span_index: FxHashMap<NodeId, Span>,
}

/// Join both layers into the IDE-facing view.
pub fn present_program(layer1: &InferResult, layer2: &SolverResult) -> Presentation {
    let mut node_views = FxHashMap::default();
    let mut span_index = FxHashMap::default();
    for_each_node(&layer2.remarked_program, &mut |meta| {
        span_index.insert(meta.id, meta.span);
        node_views.insert(
            meta.id,
            NodeView {
                id: meta.id,
                span: meta.span,
                ty: meta.ty.to_string(),
                kind: meta.kind.to_string(),
                mark: meta.mark.map(str::to_string),
            },
        );
    });

    let diagnostics = layer1
        .layer1_diagnostics
        .iter()
        .chain(layer2.diagnostics.iter())
        .map(|d| attach_span(d, &span_index))
        .collect();

    Presentation {
        node_views,
        diagnostics,
        span_index,
    }
}

fn attach_span(d: &Diagnostic, span_index: &FxHashMap<NodeId, Span>) -> PresentedDiagnostic {
    PresentedDiagnostic {
        origin: d.origin,
        reason: d.reason,
        details: d.details.clone(),
        span: span_index.get(&d.origin).copied(),
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub color: bool,
}

impl RenderOptions {
    /// Colorless output for deterministic snapshots.
    pub fn colorless() -> Self {
        RenderOptions { color: false }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { color: true }
    }
}

fn headline(d: &PresentedDiagnostic) -> String {
    let detail = |key: &str| -> Option<String> {
        d.details.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    };
    match d.reason {
        Reason::TypeMismatch | Reason::BranchMismatch => {
            match (detail("expected"), detail("actual")) {
                (Some(e), Some(a)) => format!("expected {}, found {}", e, a),
                _ => "type mismatch".to_string(),
            }
        }
        Reason::FreeVariable => match detail("name").or_else(|| detail("operator")) {
            Some(name) => format!("undefined variable: {}", name),
            None => "undefined variable".to_string(),
        },
        Reason::NotFunction => match detail("callee") {
            Some(callee) => format!("{} is not a function", callee),
            None => "not a function".to_string(),
        },
        Reason::OccursCycle => match (detail("left"), detail("right")) {
            (Some(l), Some(r)) => format!("infinite type: {} occurs in {}", l, r),
            _ => "infinite type".to_string(),
        },
        Reason::NonExhaustiveMatch => match detail("missing") {
            Some(missing) => format!("non-exhaustive match: missing {}", missing),
            None => "non-exhaustive match".to_string(),
        },
        Reason::MissingField => match detail("field") {
            Some(field) => format!("no field {} on this value", field),
            None => "missing field".to_string(),
        },
        other => other.as_str().to_string(),
    }
}

/// Render one diagnostic against the source text.
pub fn render_diagnostic(
    diagnostic: &PresentedDiagnostic,
    source: &str,
    _filename: &str,
    options: &RenderOptions,
) -> String {
    let config = Config::default().with_color(options.color);
    let source_len = source.len();

    // Clamp the span to source bounds; ariadne needs a non-empty range.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };
    let span = diagnostic
        .span
        .map(|s| s.start as usize..s.end as usize)
        .unwrap_or(0..source_len);
    let span = clamp(span);

    let report = Report::build(ReportKind::Error, span.clone())
        .with_code(diagnostic.reason.as_str())
        .with_message(headline(diagnostic))
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(headline(diagnostic))
                .with_color(Color::Red),
        )
        .finish();

    let mut buf = Vec::new();
    let cache = Source::from(source);
    report
        .write(cache, &mut buf)
        .expect("diagnostic rendering writes into a Vec");
    String::from_utf8(buf).expect("diagnostic output is UTF-8")
}

/// Render every diagnostic of a presentation.
pub fn render_all(
    presentation: &Presentation,
    source: &str,
    filename: &str,
    options: &RenderOptions,
) -> Vec<String> {
    presentation
        .diagnostics
        .iter()
        .map(|d| render_diagnostic(d, source, filename, options))
        .collect()
}
