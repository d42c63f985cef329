mod binders;
mod constant;
mod emit;
mod env;
mod error;
mod eval;
mod interp;
mod lp;
mod poly;
mod store;
mod wildcard;

pub use binders::expand_generators;
pub use constant::try_evaluate_constant;
pub use env::{Env, Parameters};
pub use error::CodegenError;
pub use eval::{reduce, reduce_rhs, Rhs};
pub use interp::interpolate;
pub use lp::to_lp_string;
pub use poly::Polynomial;
pub use store::{Bound, Constraint, Family, ModelStore, VarDef, VarKey};
pub use wildcard::{contains_wildcard, expand, resolve_domain, WildcardDomain};

use crate::ProblemSpec;
use emit::Emitter;

/// Entry point: lower a `ProblemSpec` against parameter data into a populated model store.
pub fn compile(spec: &ProblemSpec, params: &Parameters) -> Result<ModelStore, CodegenError> {
    tracing::debug!(problem = %spec.name, stmts = spec.stmts.len(), "compile");
    let mut emitter = Emitter::new(Env::new(params));
    emitter.emit_model(spec)?;
    let store = emitter.into_store();
    tracing::info!(
        problem = %spec.name,
        variables = store.num_variables(),
        constraints = store.constraints().len(),
        "model built"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CmpOp, ConstraintDecl, Expr, Generator, Key, ObjSense, ObjectiveDecl, Stmt, Value, VarDecl,
        VarType,
    };

    fn queens() -> ProblemSpec {
        let cells = || {
            vec![
                Generator::new("i", Expr::Range(Box::new(Expr::num(1)), Box::new(Expr::sym("n")))),
                Generator::new("j", Expr::Range(Box::new(Expr::num(1)), Box::new(Expr::sym("n")))),
            ]
        };
        let row = || {
            vec![Generator::new(
                "i",
                Expr::Range(Box::new(Expr::num(1)), Box::new(Expr::sym("n"))),
            )]
        };
        ProblemSpec::new("queens")
            .stmt(Stmt::Variables(VarDecl::new("queen", cells(), VarType::Binary)))
            .stmt(Stmt::Constraint(
                ConstraintDecl::new(
                    row(),
                    Expr::sum(Expr::var("queen", vec![Expr::sym("i"), Expr::Wildcard])),
                    CmpOp::Eq,
                    Expr::num(1),
                )
                .named("row_{i}"),
            ))
            .stmt(Stmt::Objective(ObjectiveDecl {
                body: Some(Expr::sum(Expr::var("queen", vec![Expr::Wildcard, Expr::Wildcard]))),
                sense: Some(ObjSense::Maximize),
                increment: false,
            }))
    }

    #[test]
    fn test_queens_rows() {
        let params = Parameters::new().with("n", 4i64);
        let store = compile(&queens(), &params).unwrap();
        assert_eq!(store.num_variables(), 16);
        assert_eq!(store.constraints().len(), 4);
        let row2 = store.constraint("row_2").unwrap();
        assert_eq!(row2.op, CmpOp::Eq);
        assert_eq!(row2.rhs, Bound::Finite(1.0));
        assert_eq!(row2.lhs.num_terms(), 4);
        for j in 1..=4 {
            let k = VarKey::new("queen", vec![Key::Int(2), Key::Int(j)]);
            assert_eq!(row2.lhs.coeff(&k), 1.0);
        }
        assert_eq!(store.objective().num_terms(), 16);
        assert_eq!(store.sense(), ObjSense::Maximize);
    }

    #[test]
    fn test_diet_limits_and_bounds() {
        let params = Parameters::new()
            .with("foods", Value::list(["bread", "milk"]))
            .with("cost", Value::map([("bread", 2.0), ("milk", 3.5)]))
            .with("limit", Value::map([("calories", 2200.0)]));
        let spec = ProblemSpec::new("diet")
            .stmt(Stmt::Variables(
                VarDecl::new("x", vec![Generator::new("f", Expr::sym("foods"))], VarType::Continuous)
                    .bounds(Some(Expr::num(0)), None),
            ))
            .stmt(Stmt::Constraint(ConstraintDecl::new(
                vec![Generator::new("f", Expr::sym("foods"))],
                Expr::var("x", vec![Expr::sym("f")]),
                CmpOp::Le,
                Expr::index(Expr::sym("limit"), Expr::str("calories")),
            )))
            .stmt(Stmt::Objective(ObjectiveDecl {
                body: Some(Expr::for_sum(
                    vec![Generator::new("f", Expr::sym("foods"))],
                    Expr::index(Expr::sym("cost"), Expr::sym("f"))
                        * Expr::var("x", vec![Expr::sym("f")]),
                )),
                sense: None,
                increment: false,
            }));
        let store = compile(&spec, &params).unwrap();
        let names: Vec<&str> = store.constraints().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["_c0", "_c1"]);
        assert!(store.constraints().iter().all(|c| c.rhs == Bound::Finite(2200.0)));
        let milk = VarKey::new("x", vec![Key::str("milk")]);
        assert_eq!(store.lookup(&milk).unwrap().lower, Some(Bound::Finite(0.0)));
        assert_eq!(store.objective().coeff(&milk), 3.5);
        assert_eq!(store.sense(), ObjSense::Minimize);
    }

    #[test]
    fn test_variable_provenance_and_description() {
        let params = Parameters::new();
        let spec = ProblemSpec::new("p").stmt(Stmt::Variables(VarDecl {
            description: Some("slot {t}".into()),
            ..VarDecl::new("y", vec![Generator::new("t", Expr::range(1, 2))], VarType::Integer)
        }));
        let store = compile(&spec, &params).unwrap();
        let def = store.lookup(&VarKey::new("y", vec![Key::Int(2)])).unwrap();
        assert_eq!(def.description.as_deref(), Some("slot 2"));
        assert_eq!(def.origin, vec![("t".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_scalar_variable_and_unbounded_rhs() {
        let params = Parameters::new();
        let spec = ProblemSpec::new("p")
            .stmt(Stmt::Variables(
                VarDecl::new("z", vec![], VarType::Continuous).bounds(Some(Expr::neg_inf()), Some(Expr::Inf)),
            ))
            .stmt(Stmt::Constraint(ConstraintDecl::new(
                vec![],
                Expr::sym("z") + Expr::num(3),
                CmpOp::Ge,
                Expr::neg_inf(),
            )));
        let store = compile(&spec, &params).unwrap();
        let z = store.lookup(&VarKey::scalar("z")).unwrap();
        assert_eq!((z.lower, z.upper), (Some(Bound::NegInf), Some(Bound::PosInf)));
        let c = &store.constraints()[0];
        assert_eq!(c.rhs, Bound::NegInf);
        assert_eq!(c.lhs.constant_term(), 0.0);
    }

    #[test]
    fn test_increment_objective_and_sense_only() {
        let params = Parameters::new();
        let spec = ProblemSpec::new("p")
            .stmt(Stmt::Variables(VarDecl::new("a", vec![], VarType::Continuous)))
            .stmt(Stmt::Objective(ObjectiveDecl {
                body: Some(Expr::var("a", vec![])),
                sense: None,
                increment: false,
            }))
            .stmt(Stmt::Objective(ObjectiveDecl {
                body: Some(Expr::num(2) * Expr::var("a", vec![])),
                sense: None,
                increment: true,
            }))
            .stmt(Stmt::Objective(ObjectiveDecl {
                body: None,
                sense: Some(ObjSense::Maximize),
                increment: false,
            }));
        let store = compile(&spec, &params).unwrap();
        assert_eq!(store.objective().coeff(&VarKey::scalar("a")), 3.0);
        assert_eq!(store.sense(), ObjSense::Maximize);
    }

    #[test]
    fn test_duplicate_names_and_variables() {
        let params = Parameters::new();
        let spec = ProblemSpec::new("p")
            .stmt(Stmt::Variables(VarDecl::new("a", vec![], VarType::Continuous)))
            .stmt(Stmt::Variables(VarDecl::new("a", vec![], VarType::Continuous)));
        assert!(matches!(compile(&spec, &params), Err(CodegenError::DuplicateVariable(_))));

        let spec = ProblemSpec::new("p")
            .stmt(Stmt::Variables(VarDecl::new("a", vec![], VarType::Continuous)))
            .stmt(Stmt::Constraint(
                ConstraintDecl::new(
                    vec![Generator::new("i", Expr::range(1, 2))],
                    Expr::var("a", vec![]),
                    CmpOp::Le,
                    Expr::num(1),
                )
                .named("cap"),
            ));
        assert!(matches!(
            compile(&spec, &params),
            Err(CodegenError::DuplicateConstraintName(n)) if n == "cap"
        ));
    }

    #[test]
    fn test_variable_bound_errors() {
        let params = Parameters::new();
        let spec = ProblemSpec::new("p")
            .stmt(Stmt::Variables(VarDecl::new("a", vec![], VarType::Continuous)))
            .stmt(Stmt::Variables(
                VarDecl::new("b", vec![], VarType::Continuous)
                    .bounds(None, Some(Expr::var("a", vec![]))),
            ));
        assert!(matches!(compile(&spec, &params), Err(CodegenError::InvalidBound { .. })));
    }

    #[test]
    fn test_huge_index_values_are_rejected() {
        let params = Parameters::new().with("big", Value::list([1e19, 2e19]));
        let spec = ProblemSpec::new("p").stmt(Stmt::Variables(VarDecl::new(
            "x",
            vec![Generator::new("i", Expr::sym("big"))],
            VarType::Continuous,
        )));
        assert!(matches!(
            compile(&spec, &params),
            Err(CodegenError::NonScalarIndex { .. })
        ));
    }
}
