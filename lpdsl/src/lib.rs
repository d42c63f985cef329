use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops;

pub mod codegen;

pub use codegen::{
    compile, interpolate, reduce, reduce_rhs, to_lp_string, Bound, CodegenError, Constraint,
    Env, ModelStore, Parameters, Polynomial, VarDef, VarKey,
};

/// A whole problem as handed over by the syntax layer: declarations in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemSpec {
    pub name: String,
    pub stmts: Vec<Stmt>,
}

impl ProblemSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stmts: vec![],
        }
    }

    pub fn stmt(mut self, st: Stmt) -> Self {
        self.stmts.push(st);
        self
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Variables(VarDecl),
    Constraint(ConstraintDecl),
    Objective(ObjectiveDecl),
}

/// `variables(name, [i <- 1..n, ...], ty, min: .., max: ..)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub generators: Vec<Generator>,
    pub ty: VarType,
    pub lower: Option<Expr>,
    pub upper: Option<Expr>,
    pub description: Option<String>,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, generators: Vec<Generator>, ty: VarType) -> Self {
        Self {
            name: name.into(),
            generators,
            ty,
            lower: None,
            upper: None,
            description: None,
        }
    }

    pub fn bounds(mut self, lower: Option<Expr>, upper: Option<Expr>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarType {
    Continuous,
    Integer,
    Binary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDecl {
    pub generators: Vec<Generator>,
    pub lhs: Expr,
    pub op: CmpOp,
    pub rhs: Expr,
    /// Name template, e.g. `"row_{i}"`. Interpolated per generator combination.
    pub name: Option<String>,
}

impl ConstraintDecl {
    pub fn new(generators: Vec<Generator>, lhs: Expr, op: CmpOp, rhs: Expr) -> Self {
        Self {
            generators,
            lhs,
            op,
            rhs,
            name: None,
        }
    }

    pub fn named(mut self, template: impl Into<String>) -> Self {
        self.name = Some(template.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Le,
    Ge,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveDecl {
    pub body: Option<Expr>,
    pub sense: Option<ObjSense>,
    /// Add `body` to the current objective instead of replacing it.
    pub increment: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ObjSense {
    #[default]
    Minimize,
    Maximize,
}

/// One `sym <- domain` dimension of a Cartesian-product expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub sym: String,
    pub domain: Expr,
}

impl Generator {
    pub fn new(sym: impl Into<String>, domain: Expr) -> Self {
        Self {
            sym: sym.into(),
            domain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarRef {
    pub name: String,
    pub indices: Vec<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Num(f64),
    Bool(bool),
    Str(String),
    /// Atom-like literal (`:bread`). Looks up map keys in tag form first.
    Tag(String),
    /// The unbounded sentinel. Only legal as a whole right-hand side or bound.
    Inf,

    Sym(String),
    /// `x(i, j)`: a variable-family reference. Zero indices for scalar variables.
    Var(VarRef),
    /// `:_`
    Wildcard,

    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),

    /// `base[key]`
    Index { base: Box<Expr>, key: Box<Expr> },
    /// `base.name`
    Field { base: Box<Expr>, name: String },

    List(Vec<Expr>),
    /// Inclusive integer range `a..b`.
    Range(Box<Expr>, Box<Expr>),

    /// `sum(expr)`: sums out the wildcards of `expr`.
    Sum(Box<Expr>),
    /// `sum(for i <- .., do: body)`
    ForSum {
        generators: Vec<Generator>,
        body: Box<Expr>,
    },
}

impl Expr {
    pub fn num(v: impl Into<f64>) -> Self {
        Expr::Num(v.into())
    }

    pub fn sym(s: impl Into<String>) -> Self {
        Expr::Sym(s.into())
    }

    pub fn str(s: impl Into<String>) -> Self {
        Expr::Str(s.into())
    }

    pub fn tag(s: impl Into<String>) -> Self {
        Expr::Tag(s.into())
    }

    pub fn var(name: impl Into<String>, indices: Vec<Expr>) -> Self {
        Expr::Var(VarRef {
            name: name.into(),
            indices,
        })
    }

    pub fn index(base: Expr, key: Expr) -> Self {
        Expr::Index {
            base: Box::new(base),
            key: Box::new(key),
        }
    }

    pub fn field(base: Expr, name: impl Into<String>) -> Self {
        Expr::Field {
            base: Box::new(base),
            name: name.into(),
        }
    }

    pub fn range(lo: impl Into<f64>, hi: impl Into<f64>) -> Self {
        Expr::Range(Box::new(Expr::Num(lo.into())), Box::new(Expr::Num(hi.into())))
    }

    pub fn sum(e: Expr) -> Self {
        Expr::Sum(Box::new(e))
    }

    pub fn for_sum(generators: Vec<Generator>, body: Expr) -> Self {
        Expr::ForSum {
            generators,
            body: Box::new(body),
        }
    }

    pub fn neg_inf() -> Self {
        Expr::Neg(Box::new(Expr::Inf))
    }
}

macro_rules! expr_binop {
    ($tr:ident, $method:ident, $variant:ident) => {
        impl ops::$tr for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Box::new(self), Box::new(rhs))
            }
        }
    };
}

expr_binop!(Add, add, Add);
expr_binop!(Sub, sub, Sub);
expr_binop!(Mul, mul, Mul);
expr_binop!(Div, div, Div);

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, xs: &[T]) -> fmt::Result {
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", x)?;
    }
    Ok(())
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.sym, self.domain)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{}", v),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::Tag(s) => write!(f, ":{}", s),
            Expr::Inf => f.write_str(":infinity"),
            Expr::Sym(s) => f.write_str(s),
            Expr::Var(vr) => {
                write!(f, "{}(", vr.name)?;
                join(f, &vr.indices)?;
                f.write_str(")")
            }
            Expr::Wildcard => f.write_str(":_"),
            Expr::Add(a, b) => write!(f, "({} + {})", a, b),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mul(a, b) => write!(f, "({} * {})", a, b),
            Expr::Div(a, b) => write!(f, "({} / {})", a, b),
            Expr::Neg(a) => write!(f, "-{}", a),
            Expr::Index { base, key } => write!(f, "{}[{}]", base, key),
            Expr::Field { base, name } => write!(f, "{}.{}", base, name),
            Expr::List(xs) => {
                f.write_str("[")?;
                join(f, xs)?;
                f.write_str("]")
            }
            Expr::Range(a, b) => write!(f, "{}..{}", a, b),
            Expr::Sum(e) => write!(f, "sum({})", e),
            Expr::ForSum { generators, body } => {
                f.write_str("sum(for ")?;
                join(f, generators)?;
                write!(f, ", do: {})", body)
            }
        }
    }
}

/// A scalar usable as a map key or as one position of a variable index tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
    /// Atom-like key; textually equal to a `Str` key but a distinct map entry.
    Tag(String),
}

impl<'de> Deserialize<'de> for Key {
    // textual keys from JSON objects are always `Str`
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(Key::Str)
    }
}

impl Key {
    pub fn str(s: impl Into<String>) -> Self {
        Key::Str(s.into())
    }

    pub fn tag(s: impl Into<String>) -> Self {
        Key::Tag(s.into())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{}", n),
            Key::Str(s) | Key::Tag(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

/// Constant data: model parameters and anything the constant evaluator produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<Key, Value>),
    #[serde(skip_deserializing)]
    Tag(String),
}

impl Value {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Scalar view of this value, or `None` for composites, non-integral numbers
    /// and integers too large to be represented exactly.
    pub fn to_key(&self) -> Option<Key> {
        match self {
            Value::Num(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_INT => Some(Key::Int(*v as i64)),
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Tag(s) => Some(Key::Tag(s.clone())),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Tag(_) => "tag",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn map<K: Into<Key>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        match k {
            Key::Int(n) => Value::Num(n as f64),
            Key::Str(s) => Value::Str(s),
            Key::Tag(s) => Value::Tag(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Num(v as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Magnitude bound (2^53) below which every integral `f64` is an exact `i64`.
pub(crate) const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Integral numbers print without a decimal point. Everything else uses the
/// shortest round-tripping form, so no digits are lost.
pub(crate) fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < MAX_EXACT_INT {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(v) => f.write_str(&fmt_num(*v)),
            Value::Str(s) | Value::Tag(s) => f.write_str(s),
            Value::List(xs) => {
                f.write_str("[")?;
                join(f, xs)?;
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}
