use lpdsl::{
    compile, to_lp_string, CmpOp, ConstraintDecl, Expr, Generator, Key, ObjSense, ObjectiveDecl,
    Parameters, ProblemSpec, Stmt, Value, VarDecl, VarType,
};
use std::collections::BTreeMap;

fn board() -> Expr {
    Expr::Range(Box::new(Expr::num(1)), Box::new(Expr::sym("n")))
}

/// Cells grouped by diagonal: `d{i-j}` and `a{i+j}` -> `[[i, j], ..]`.
fn diagonals(n: i64) -> Value {
    let mut groups: BTreeMap<Key, Vec<Value>> = BTreeMap::new();
    for i in 1..=n {
        for j in 1..=n {
            let cell = Value::list([i, j]);
            for name in [format!("d{}", i - j), format!("a{}", i + j)] {
                groups.entry(Key::Str(name)).or_default().push(cell.clone());
            }
        }
    }
    Value::Map(groups.into_iter().map(|(k, v)| (k, Value::List(v))).collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let n: i64 = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(8);
    let params = Parameters::new().with("n", n).with("diagonals", diagonals(n));

    let cell = |k: i64| Expr::index(Expr::sym("c"), Expr::num(k as f64));
    let spec = ProblemSpec::new("n_queens")
        .stmt(Stmt::Variables(VarDecl::new(
            "queen",
            vec![Generator::new("i", board()), Generator::new("j", board())],
            VarType::Binary,
        )))
        .stmt(Stmt::Constraint(
            ConstraintDecl::new(
                vec![Generator::new("i", board())],
                Expr::sum(Expr::var("queen", vec![Expr::sym("i"), Expr::Wildcard])),
                CmpOp::Eq,
                Expr::num(1),
            )
            .named("row_{i}"),
        ))
        .stmt(Stmt::Constraint(
            ConstraintDecl::new(
                vec![Generator::new("j", board())],
                Expr::sum(Expr::var("queen", vec![Expr::Wildcard, Expr::sym("j")])),
                CmpOp::Eq,
                Expr::num(1),
            )
            .named("col_{j}"),
        ))
        .stmt(Stmt::Constraint(
            ConstraintDecl::new(
                vec![Generator::new("g", Expr::sym("diagonals"))],
                Expr::for_sum(
                    vec![Generator::new("c", Expr::index(Expr::sym("diagonals"), Expr::sym("g")))],
                    Expr::var("queen", vec![cell(0), cell(1)]),
                ),
                CmpOp::Le,
                Expr::num(1),
            )
            .named("diag_{g}"),
        ))
        .stmt(Stmt::Objective(ObjectiveDecl {
            body: Some(Expr::sum(Expr::var("queen", vec![Expr::Wildcard, Expr::Wildcard]))),
            sense: Some(ObjSense::Maximize),
            increment: false,
        }));

    let store = compile(&spec, &params)?;
    print!("{}", to_lp_string(&store));
    Ok(())
}
