//! AST construction.
//!
//! `AstBuilder` is the only way to make AST nodes: it owns the per-unit
//! `NodeAlloc`, so every node gets a unique id at construction. The parser
//! drives it with real spans; tests drive it with synthetic ones and set
//! spans on the public fields where a test needs them.

use rill_common::{NodeAlloc, NodeId, Span};

use crate::expr::{Expr, ExprKind, Literal, MatchArm, Stmt};
use crate::item::{
    AnnotateDecl, CtorDecl, DomainDecl, FieldDecl, LetDecl, OpClass, OpDecl, OpRuleDecl, Param,
    PolicyDecl, PolicyKind, Program, TopLevel, TypeDecl, TypeMember,
};
use crate::pat::{Pattern, PatternKind};
use crate::ty_expr::{TypeExpr, TypeExprKind};

#[derive(Debug, Default)]
pub struct AstBuilder {
    alloc: NodeAlloc,
}

impl AstBuilder {
    pub fn new() -> Self {
        AstBuilder {
            alloc: NodeAlloc::new(),
        }
    }

    pub fn fresh_id(&mut self) -> NodeId {
        self.alloc.fresh()
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            kind,
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    pub fn ident(&mut self, name: impl Into<String>) -> Expr {
        self.expr(ExprKind::Ident(name.into()))
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn char(&mut self, value: char) -> Expr {
        self.expr(ExprKind::Literal(Literal::Char(value)))
    }

    pub fn string(&mut self, value: impl Into<String>) -> Expr {
        self.expr(ExprKind::Literal(Literal::Str(value.into())))
    }

    pub fn unit(&mut self) -> Expr {
        self.expr(ExprKind::Literal(Literal::Unit))
    }

    pub fn ctor(&mut self, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Ctor {
            name: name.into(),
            args,
        })
    }

    pub fn tuple(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Tuple(elems))
    }

    pub fn record(&mut self, fields: Vec<(&str, Expr)>) -> Expr {
        self.expr(ExprKind::RecordLit(
            fields.into_iter().map(|(n, e)| (n.to_string(), e)).collect(),
        ))
    }

    pub fn project(&mut self, target: Expr, field: impl Into<String>) -> Expr {
        self.expr(ExprKind::Projection {
            target: Box::new(target),
            field: field.into(),
        })
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn binary(&mut self, op: impl Into<String>, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op: op.into(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn unary(&mut self, op: impl Into<String>, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op: op.into(),
            operand: Box::new(operand),
        })
    }

    pub fn arrow(&mut self, params: Vec<Param>, body: Expr) -> Expr {
        self.expr(ExprKind::Arrow {
            params,
            return_annotation: None,
            body: Box::new(body),
        })
    }

    pub fn arrow_ann(&mut self, params: Vec<Param>, ret: TypeExpr, body: Expr) -> Expr {
        self.expr(ExprKind::Arrow {
            params,
            return_annotation: Some(ret),
            body: Box::new(body),
        })
    }

    pub fn block(&mut self, stmts: Vec<Stmt>, result: Option<Expr>) -> Expr {
        self.expr(ExprKind::Block {
            stmts,
            result: result.map(Box::new),
        })
    }

    /// A `{ expr }` block with no statements.
    pub fn body(&mut self, result: Expr) -> Expr {
        self.block(Vec::new(), Some(result))
    }

    pub fn match_(&mut self, scrutinees: Vec<Expr>, arms: Vec<MatchArm>) -> Expr {
        self.expr(ExprKind::Match { scrutinees, arms })
    }

    pub fn match_fn(&mut self, arity: usize, arms: Vec<MatchArm>) -> Expr {
        self.expr(ExprKind::MatchFn { arity, arms })
    }

    pub fn annotated(&mut self, value: Expr, annotation: TypeExpr) -> Expr {
        self.expr(ExprKind::Annotated {
            value: Box::new(value),
            annotation,
        })
    }

    pub fn hole(&mut self) -> Expr {
        self.expr(ExprKind::Hole)
    }

    pub fn arm(&mut self, patterns: Vec<Pattern>, body: Expr) -> MatchArm {
        MatchArm {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            patterns,
            body,
        }
    }

    /// Single-scrutinee arm.
    pub fn arm1(&mut self, pattern: Pattern, body: Expr) -> MatchArm {
        self.arm(vec![pattern], body)
    }

    // ── Patterns ────────────────────────────────────────────────────────

    fn pattern(&mut self, kind: PatternKind) -> Pattern {
        Pattern {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            kind,
        }
    }

    pub fn pat_wild(&mut self) -> Pattern {
        self.pattern(PatternKind::Wildcard)
    }

    pub fn pat_var(&mut self, name: impl Into<String>) -> Pattern {
        self.pattern(PatternKind::Var(name.into()))
    }

    pub fn pat_int(&mut self, value: i64) -> Pattern {
        self.pattern(PatternKind::Literal(Literal::Int(value)))
    }

    pub fn pat_bool(&mut self, value: bool) -> Pattern {
        self.pattern(PatternKind::Literal(Literal::Bool(value)))
    }

    pub fn pat_tuple(&mut self, elems: Vec<Pattern>) -> Pattern {
        self.pattern(PatternKind::Tuple(elems))
    }

    pub fn pat_ctor(&mut self, name: impl Into<String>, args: Vec<Pattern>) -> Pattern {
        self.pattern(PatternKind::Ctor {
            name: name.into(),
            args,
        })
    }

    // ── Parameters ──────────────────────────────────────────────────────

    pub fn param(&mut self, pattern: Pattern) -> Param {
        Param {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            pattern,
            annotation: None,
        }
    }

    pub fn param_var(&mut self, name: impl Into<String>) -> Param {
        let pattern = self.pat_var(name);
        self.param(pattern)
    }

    pub fn param_ann(&mut self, name: impl Into<String>, annotation: TypeExpr) -> Param {
        let pattern = self.pat_var(name);
        Param {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            pattern,
            annotation: Some(annotation),
        }
    }

    // ── Type expressions ────────────────────────────────────────────────

    fn type_expr(&mut self, kind: TypeExprKind) -> TypeExpr {
        TypeExpr {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            kind,
        }
    }

    pub fn te_name(&mut self, name: impl Into<String>) -> TypeExpr {
        self.type_expr(TypeExprKind::Name(name.into()))
    }

    pub fn te_apply(&mut self, name: impl Into<String>, args: Vec<TypeExpr>) -> TypeExpr {
        self.type_expr(TypeExprKind::Apply {
            name: name.into(),
            args,
        })
    }

    pub fn te_func(&mut self, from: TypeExpr, to: TypeExpr) -> TypeExpr {
        self.type_expr(TypeExprKind::Func {
            from: Box::new(from),
            to: Box::new(to),
        })
    }

    pub fn te_tuple(&mut self, elems: Vec<TypeExpr>) -> TypeExpr {
        self.type_expr(TypeExprKind::Tuple(elems))
    }

    pub fn te_record(&mut self, fields: Vec<(&str, TypeExpr)>) -> TypeExpr {
        self.type_expr(TypeExprKind::Record(
            fields.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
        ))
    }

    pub fn te_row(
        &mut self,
        cases: Vec<(&str, Option<TypeExpr>)>,
        tail: Option<&str>,
    ) -> TypeExpr {
        self.type_expr(TypeExprKind::Row {
            cases: cases.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
            tail: tail.map(str::to_string),
        })
    }

    pub fn te_var(&mut self, name: impl Into<String>) -> TypeExpr {
        self.type_expr(TypeExprKind::Var(name.into()))
    }

    pub fn te_hole(&mut self) -> TypeExpr {
        self.type_expr(TypeExprKind::Hole)
    }

    // ── Declarations ────────────────────────────────────────────────────

    pub fn let_decl(&mut self, name: impl Into<String>, params: Vec<Param>, body: Expr) -> LetDecl {
        LetDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            name: name.into(),
            recursive: false,
            params,
            return_annotation: None,
            body,
        }
    }

    pub fn let_rec(&mut self, name: impl Into<String>, params: Vec<Param>, body: Expr) -> LetDecl {
        LetDecl {
            recursive: true,
            ..self.let_decl(name, params, body)
        }
    }

    pub fn let_ann(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        ret: TypeExpr,
        body: Expr,
    ) -> LetDecl {
        LetDecl {
            return_annotation: Some(ret),
            ..self.let_decl(name, params, body)
        }
    }

    pub fn ctor_decl(&mut self, name: impl Into<String>, args: Vec<TypeExpr>) -> CtorDecl {
        CtorDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            name: name.into(),
            args,
        }
    }

    pub fn field_decl(&mut self, name: impl Into<String>, ty: TypeExpr) -> FieldDecl {
        FieldDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            name: name.into(),
            ty,
        }
    }

    /// `type Name<params> = C1(..) | C2(..)`.
    pub fn type_sum(
        &mut self,
        name: impl Into<String>,
        params: Vec<&str>,
        ctors: Vec<CtorDecl>,
    ) -> TypeDecl {
        TypeDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            name: name.into(),
            params: params.into_iter().map(str::to_string).collect(),
            members: ctors.into_iter().map(TypeMember::Ctor).collect(),
            alias: None,
        }
    }

    /// `type Name<params> = <body>`.
    pub fn type_alias(
        &mut self,
        name: impl Into<String>,
        params: Vec<&str>,
        body: TypeExpr,
    ) -> TypeDecl {
        TypeDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            name: name.into(),
            params: params.into_iter().map(str::to_string).collect(),
            members: Vec::new(),
            alias: Some(body),
        }
    }

    pub fn type_decl_raw(
        &mut self,
        name: impl Into<String>,
        params: Vec<&str>,
        members: Vec<TypeMember>,
        alias: Option<TypeExpr>,
    ) -> TypeDecl {
        TypeDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            name: name.into(),
            params: params.into_iter().map(str::to_string).collect(),
            members,
            alias,
        }
    }

    pub fn infix(
        &mut self,
        op: impl Into<String>,
        impl_name: impl Into<String>,
        class: Option<OpClass>,
    ) -> OpDecl {
        OpDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            op: op.into(),
            impl_name: impl_name.into(),
            class,
        }
    }

    pub fn prefix(
        &mut self,
        op: impl Into<String>,
        impl_name: impl Into<String>,
        class: Option<OpClass>,
    ) -> OpDecl {
        self.infix(op, impl_name, class)
    }

    pub fn domain(
        &mut self,
        name: impl Into<String>,
        state_kind: &str,
        merge: &str,
        conflict_pairs: Vec<(&str, &str)>,
        boundary: Option<&str>,
        carrier: Option<&str>,
    ) -> DomainDecl {
        DomainDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            name: name.into(),
            state_kind: state_kind.to_string(),
            merge: merge.to_string(),
            conflict_pairs: conflict_pairs
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            boundary: boundary.map(str::to_string),
            carrier: carrier.map(str::to_string),
        }
    }

    pub fn op_rule(
        &mut self,
        function: impl Into<String>,
        domain: impl Into<String>,
        adds: Vec<&str>,
        removes: Vec<&str>,
    ) -> OpRuleDecl {
        OpRuleDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            function: function.into(),
            domain: domain.into(),
            adds: adds.into_iter().map(str::to_string).collect(),
            removes: removes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn policy(
        &mut self,
        function: impl Into<String>,
        domain: impl Into<String>,
        policy: PolicyKind,
        tags: Vec<&str>,
        domains: Vec<&str>,
    ) -> PolicyDecl {
        PolicyDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            function: function.into(),
            domain: domain.into(),
            policy,
            tags: tags.into_iter().map(str::to_string).collect(),
            domains: domains.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn annotate(
        &mut self,
        function: impl Into<String>,
        domain: impl Into<String>,
        tags: Vec<&str>,
        at_return: bool,
    ) -> AnnotateDecl {
        AnnotateDecl {
            id: self.alloc.fresh(),
            span: Span::synthetic(),
            function: function.into(),
            domain: domain.into(),
            tags: tags.into_iter().map(str::to_string).collect(),
            at_return,
        }
    }

    pub fn program(&mut self, declarations: Vec<TopLevel>) -> Program {
        Program {
            imports: Vec::new(),
            reexports: Vec::new(),
            declarations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::max_node_id;

    #[test]
    fn builder_assigns_unique_ids() {
        let mut b = AstBuilder::new();
        let x = b.ident("x");
        let y = b.ident("y");
        assert_ne!(x.id, y.id);
    }

    #[test]
    fn max_node_id_sees_nested_nodes() {
        let mut b = AstBuilder::new();
        let body = b.ident("x");
        let body = b.body(body);
        let param = b.param_var("x");
        let decl = b.let_decl("id", vec![param], body);
        let program = b.program(vec![TopLevel::Let(decl)]);
        let max = max_node_id(&program).expect("nonempty program");
        assert!(max.0 + 1 == b.alloc.allocated());
    }
}
