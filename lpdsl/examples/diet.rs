use lpdsl::{
    compile, to_lp_string, CmpOp, ConstraintDecl, Expr, Generator, ObjSense, ObjectiveDecl,
    Parameters, ProblemSpec, Stmt, VarDecl, VarType,
};

const DATA: &str = r#"{
    "foods": ["bread", "cheese", "milk", "apple"],
    "nutrients": ["calories", "protein", "calcium"],
    "cost": { "bread": 2.0, "cheese": 8.5, "milk": 3.25, "apple": 1.2 },
    "max_servings": 10,
    "minimum": { "calories": 2000, "protein": 55, "calcium": 800 },
    "content": {
        "bread":  { "calories": 250, "protein": 9,  "calcium": 80 },
        "cheese": { "calories": 400, "protein": 25, "calcium": 720 },
        "milk":   { "calories": 120, "protein": 8,  "calcium": 300 },
        "apple":  { "calories": 95,  "protein": 0.5, "calcium": 10 }
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    // parameter file given on the command line, or the built-in table
    let params = match std::env::args().nth(1) {
        Some(path) => Parameters::from_reader(std::fs::File::open(path)?)?,
        None => Parameters::from_json_str(DATA)?,
    };

    let spec = ProblemSpec::new("diet")
        .stmt(Stmt::Variables(VarDecl {
            description: Some("servings of {f}".into()),
            ..VarDecl::new("qty", vec![Generator::new("f", Expr::sym("foods"))], VarType::Integer)
                .bounds(Some(Expr::num(0)), Some(Expr::sym("max_servings")))
        }))
        .stmt(Stmt::Constraint(
            ConstraintDecl::new(
                vec![Generator::new("n", Expr::sym("nutrients"))],
                Expr::sum(
                    Expr::var("qty", vec![Expr::Wildcard])
                        * Expr::index(Expr::index(Expr::sym("content"), Expr::Wildcard), Expr::sym("n")),
                ),
                CmpOp::Ge,
                Expr::index(Expr::sym("minimum"), Expr::sym("n")),
            )
            .named("min_{n}"),
        ))
        .stmt(Stmt::Objective(ObjectiveDecl {
            body: Some(Expr::for_sum(
                vec![Generator::new("f", Expr::sym("foods"))],
                Expr::index(Expr::sym("cost"), Expr::sym("f")) * Expr::var("qty", vec![Expr::sym("f")]),
            )),
            sense: Some(ObjSense::Minimize),
            increment: false,
        }));

    tracing::debug!(json = %spec.to_pretty_json()?, "problem");
    let store = compile(&spec, &params)?;
    print!("{}", to_lp_string(&store));
    Ok(())
}
