//! Prelude registration.
//!
//! Binds the fixed set of primitive schemes and ADTs a unit starts with:
//! integer arithmetic and comparison, boolean connectives, char equality,
//! the polymorphic `compare` returning `Ordering`, a polymorphic `print`,
//! string-to-list conversion, the `List` and `Ordering` ADTs, the `Eff`
//! effect carrier, and the default operator table. Callers can extend or
//! replace all of it through `InferOptions::initial_env`.

use rill_ast::OpClass;

use crate::adt::{AdtInfo, CtorInfo};
use crate::ctx::{InferCtx, OperatorInfo};
use crate::ty::{Scheme, Ty};

/// Register the prelude into a fresh context.
pub fn register_prelude(ctx: &mut InferCtx) {
    register_prelude_types(ctx);
    register_prelude_values(ctx);
    register_default_operators(ctx);
}

fn register_prelude_types(ctx: &mut InferCtx) {
    // type List<a> = Nil | Cons(a, List<a>)
    let a = ctx.vars.fresh();
    let list_a = Ty::list(Ty::Var(a));
    ctx.adt.insert(AdtInfo {
        name: "List".to_string(),
        params: vec![a],
        ctors: vec![
            CtorInfo {
                name: "Nil".to_string(),
                arity: 0,
                scheme: Scheme {
                    vars: vec![a],
                    ty: list_a.clone(),
                },
            },
            CtorInfo {
                name: "Cons".to_string(),
                arity: 2,
                scheme: Scheme {
                    vars: vec![a],
                    ty: Ty::func(Ty::Var(a), Ty::func(list_a.clone(), list_a.clone())),
                },
            },
        ],
        alias: None,
        record_fields: None,
    });
    let _ = ctx.adt.claim_ctor("Nil", "List");
    let _ = ctx.adt.claim_ctor("Cons", "List");

    // type Ordering = LT | EQ | GT
    let ordering = Ty::ordering();
    ctx.adt.insert(AdtInfo {
        name: "Ordering".to_string(),
        params: Vec::new(),
        ctors: ["LT", "EQ", "GT"]
            .iter()
            .map(|name| CtorInfo {
                name: name.to_string(),
                arity: 0,
                scheme: Scheme::mono(ordering.clone()),
            })
            .collect(),
        alias: None,
        record_fields: None,
    });
    for name in ["LT", "EQ", "GT"] {
        let _ = ctx.adt.claim_ctor(name, "Ordering");
    }

    // Eff<v, e>: the effect-domain carrier. Abstract: values of this type
    // are introduced by effectful primitives, not by user constructors.
    let v = ctx.vars.fresh();
    let e = ctx.vars.fresh();
    ctx.adt.insert(AdtInfo {
        name: "Eff".to_string(),
        params: vec![v, e],
        ctors: Vec::new(),
        alias: None,
        record_fields: None,
    });
    ctx.adt.register_carrier("Eff", "effect");
}

fn register_prelude_values(ctx: &mut InferCtx) {
    let int_binop = Scheme::mono(Ty::func(Ty::Int, Ty::func(Ty::Int, Ty::Int)));
    for name in ["int_add", "int_sub", "int_mul", "int_div"] {
        ctx.bind(name, int_binop.clone());
    }
    ctx.bind("int_neg", Scheme::mono(Ty::func(Ty::Int, Ty::Int)));

    let int_cmp = Scheme::mono(Ty::func(Ty::Int, Ty::func(Ty::Int, Ty::Bool)));
    for name in ["int_lt", "int_gt", "int_le", "int_ge", "int_eq", "int_ne"] {
        ctx.bind(name, int_cmp.clone());
    }

    let bool_binop = Scheme::mono(Ty::func(Ty::Bool, Ty::func(Ty::Bool, Ty::Bool)));
    ctx.bind("bool_and", bool_binop.clone());
    ctx.bind("bool_or", bool_binop);
    ctx.bind("bool_not", Scheme::mono(Ty::func(Ty::Bool, Ty::Bool)));

    ctx.bind(
        "char_eq",
        Scheme::mono(Ty::func(Ty::Char, Ty::func(Ty::Char, Ty::Bool))),
    );

    // compare : forall a. a -> a -> Ordering
    {
        let a = ctx.vars.fresh();
        ctx.bind(
            "compare",
            Scheme {
                vars: vec![a],
                ty: Ty::func(Ty::Var(a), Ty::func(Ty::Var(a), Ty::ordering())),
            },
        );
    }

    // print : forall a. a -> Unit
    {
        let a = ctx.vars.fresh();
        ctx.bind(
            "print",
            Scheme {
                vars: vec![a],
                ty: Ty::func(Ty::Var(a), Ty::Unit),
            },
        );
    }

    // string_to_list : String -> List<Char>
    ctx.bind(
        "string_to_list",
        Scheme::mono(Ty::func(Ty::String, Ty::list(Ty::Char))),
    );
}

fn register_default_operators(ctx: &mut InferCtx) {
    let infix = [
        ("+", "int_add", OpClass::Numeric),
        ("-", "int_sub", OpClass::Numeric),
        ("*", "int_mul", OpClass::Numeric),
        ("/", "int_div", OpClass::Numeric),
        ("<", "int_lt", OpClass::Comparison),
        (">", "int_gt", OpClass::Comparison),
        ("<=", "int_le", OpClass::Comparison),
        (">=", "int_ge", OpClass::Comparison),
        ("==", "int_eq", OpClass::Comparison),
        ("!=", "int_ne", OpClass::Comparison),
        ("&&", "bool_and", OpClass::Boolean),
        ("||", "bool_or", OpClass::Boolean),
    ];
    for (op, impl_name, class) in infix {
        ctx.infix_ops.insert(
            op.to_string(),
            OperatorInfo {
                impl_name: impl_name.to_string(),
                class: Some(class),
            },
        );
    }
    ctx.prefix_ops.insert(
        "!".to_string(),
        OperatorInfo {
            impl_name: "bool_not".to_string(),
            class: Some(OpClass::Boolean),
        },
    );
    ctx.prefix_ops.insert(
        "-".to_string(),
        OperatorInfo {
            impl_name: "int_neg".to_string(),
            class: Some(OpClass::Numeric),
        },
    );
}
