//! Constant evaluation: literals, parameter lookups, nested container access
//! and arithmetic over constants.
//!
//! Nothing here looks at variable families. An expression that structurally
//! contains a variable reference, a wildcard, a sum or the unbounded sentinel is
//! not a constant and is left to the reducer.

use crate::codegen::env::Env;
use crate::codegen::error::CodegenError;
use crate::{Expr, Key, Value, MAX_EXACT_INT};
use std::borrow::Cow;

/// One access step of a `base[key].field...` chain.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Step<'e> {
    Key(&'e Expr),
    Field(&'e str),
}

/// Splits an access chain into its root and the steps applied to it, innermost first.
pub(crate) fn split_chain(e: &Expr) -> (&Expr, Vec<Step<'_>>) {
    let mut steps = vec![];
    let mut cur = e;
    loop {
        match cur {
            Expr::Index { base, key } => {
                steps.push(Step::Key(key));
                cur = base;
            }
            Expr::Field { base, name } => {
                steps.push(Step::Field(name));
                cur = base;
            }
            _ => break,
        }
    }
    steps.reverse();
    (cur, steps)
}

/// How a lookup key may be rewritten when the exact form is absent.
#[derive(Clone, Copy, Debug)]
enum KeyForm {
    Exact,
    /// The same text in the other key flavor (`"a"` <-> `:a`, `1` -> `"1"`).
    Alternate,
}

const KEY_FORMS: [KeyForm; 2] = [KeyForm::Exact, KeyForm::Alternate];

impl KeyForm {
    fn apply(self, key: &Key) -> Option<Cow<'_, Key>> {
        match self {
            KeyForm::Exact => Some(Cow::Borrowed(key)),
            KeyForm::Alternate => match key {
                Key::Str(s) => Some(Cow::Owned(Key::Tag(s.clone()))),
                Key::Tag(s) => Some(Cow::Owned(Key::Str(s.clone()))),
                Key::Int(n) => Some(Cow::Owned(Key::Str(n.to_string()))),
            },
        }
    }
}

/// Looks `key` up in a map (trying each key form in order) or a 0-based list.
pub(crate) fn get_in<'v>(container: &'v Value, key: &Key) -> Option<&'v Value> {
    match container {
        Value::Map(m) => KEY_FORMS
            .iter()
            .find_map(|form| form.apply(key).and_then(|k| m.get(k.as_ref()))),
        Value::List(xs) => match key {
            Key::Int(i) if *i >= 0 => xs.get(*i as usize),
            _ => None,
        },
        _ => None,
    }
}

/// The form keys are compared in when wildcard domains are joined. Keys that
/// `get_in` treats as the same entry (`1`, `"1"`, `:a`, `"a"`) map to one value.
pub(crate) fn canonical_key(key: &Key) -> Key {
    match key {
        Key::Int(_) => key.clone(),
        Key::Str(s) | Key::Tag(s) => match s.parse::<i64>() {
            Ok(n) if n.to_string() == *s => Key::Int(n),
            _ => Key::Str(s.clone()),
        },
    }
}

/// Keys a wildcard can range over inside `container`: map keys or list positions.
pub(crate) fn container_keys(container: &Value) -> Option<Vec<Key>> {
    match container {
        Value::Map(m) => Some(m.keys().cloned().collect()),
        Value::List(xs) => Some((0..xs.len() as i64).map(Key::Int).collect()),
        _ => None,
    }
}

/// True when `e` contains no variable reference, wildcard, sum or `:infinity`.
pub(crate) fn is_constant_shape(e: &Expr) -> bool {
    match e {
        Expr::Num(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Tag(_) | Expr::Sym(_) => true,
        Expr::Inf | Expr::Var(_) | Expr::Wildcard | Expr::Sum(_) | Expr::ForSum { .. } => false,
        Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Range(a, b) => {
            is_constant_shape(a) && is_constant_shape(b)
        }
        Expr::Neg(a) => is_constant_shape(a),
        Expr::Index { base, key } => is_constant_shape(base) && is_constant_shape(key),
        Expr::Field { base, .. } => is_constant_shape(base),
        Expr::List(xs) => xs.iter().all(is_constant_shape),
    }
}

/// `Some(value)` for constant-shaped expressions, `None` for anything the reducer owns.
pub fn try_evaluate_constant(e: &Expr, env: &Env) -> Result<Option<Value>, CodegenError> {
    if !is_constant_shape(e) {
        return Ok(None);
    }
    eval_const(e, env).map(Some)
}

pub(crate) fn eval_const(e: &Expr, env: &Env) -> Result<Value, CodegenError> {
    match e {
        Expr::Num(v) => Ok(Value::Num(*v)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Tag(s) => Ok(Value::Tag(s.clone())),
        Expr::Sym(s) => env.resolve(s).cloned(),
        Expr::Index { .. } | Expr::Field { .. } => eval_access(e, env).map(Cow::into_owned),
        Expr::List(xs) => xs
            .iter()
            .map(|x| eval_const(x, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Range(a, b) => {
            let lo = eval_int(a, env)?;
            let hi = eval_int(b, env)?;
            // descending ranges are empty
            Ok(Value::List((lo..=hi).map(|n| Value::Num(n as f64)).collect()))
        }
        Expr::Neg(a) => Ok(Value::Num(-eval_num(a, env)?)),
        Expr::Add(a, b) => Ok(Value::Num(eval_num(a, env)? + eval_num(b, env)?)),
        Expr::Sub(a, b) => Ok(Value::Num(eval_num(a, env)? - eval_num(b, env)?)),
        Expr::Mul(a, b) => Ok(Value::Num(eval_num(a, env)? * eval_num(b, env)?)),
        Expr::Div(a, b) => {
            let d = eval_num(b, env)?;
            if d == 0.0 {
                return Err(CodegenError::DivisionByZero { expr: e.to_string() });
            }
            Ok(Value::Num(eval_num(a, env)? / d))
        }
        Expr::Inf => Err(CodegenError::UnboundedInArithmetic { expr: e.to_string() }),
        Expr::Wildcard => Err(CodegenError::UnresolvableWildcard { expr: e.to_string() }),
        Expr::Var(_) | Expr::Sum(_) | Expr::ForSum { .. } => Err(CodegenError::NonNumericConstant {
            value: e.to_string(),
            kind: "variable expression",
        }),
    }
}

pub(crate) fn eval_num(e: &Expr, env: &Env) -> Result<f64, CodegenError> {
    let v = eval_const(e, env)?;
    v.as_num().ok_or_else(|| CodegenError::NonNumericConstant {
        value: v.to_string(),
        kind: v.kind(),
    })
}

fn eval_int(e: &Expr, env: &Env) -> Result<i64, CodegenError> {
    let v = eval_num(e, env)?;
    if v.fract() != 0.0 || v.abs() >= MAX_EXACT_INT {
        return Err(CodegenError::NonScalarIndex {
            value: v.to_string(),
            kind: "non-integral number",
        });
    }
    Ok(v as i64)
}

/// Evaluates `e` to something usable as a map key or variable index.
pub(crate) fn eval_key(e: &Expr, env: &Env) -> Result<Key, CodegenError> {
    let v = eval_const(e, env)?;
    value_to_key(&v)
}

pub(crate) fn value_to_key(v: &Value) -> Result<Key, CodegenError> {
    v.to_key().ok_or_else(|| CodegenError::NonScalarIndex {
        value: v.to_string(),
        kind: v.kind(),
    })
}

/// Walks an access chain by reference from its root. Missing keys report the
/// whole path traversed so far.
fn eval_access<'a>(e: &Expr, env: &'a Env) -> Result<Cow<'a, Value>, CodegenError> {
    let (root, steps) = split_chain(e);
    let mut path = vec![match root {
        Expr::Sym(s) => s.clone(),
        other => other.to_string(),
    }];
    let mut cur: Cow<'a, Value> = match root {
        Expr::Sym(s) => Cow::Borrowed(env.resolve(s)?),
        other => Cow::Owned(eval_const(other, env)?),
    };
    for step in steps {
        let key = match step {
            Step::Key(k) => eval_key(k, env)?,
            Step::Field(name) => Key::Tag(name.to_string()),
        };
        path.push(key.to_string());
        cur = match cur {
            Cow::Borrowed(c) => Cow::Borrowed(
                get_in(c, &key).ok_or_else(|| CodegenError::MissingKey { path: path.clone() })?,
            ),
            Cow::Owned(c) => Cow::Owned(
                get_in(&c, &key)
                    .cloned()
                    .ok_or_else(|| CodegenError::MissingKey { path: path.clone() })?,
            ),
        };
    }
    Ok(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::env::Parameters;
    use std::collections::BTreeMap;

    fn params() -> Parameters {
        let mut by_tag = BTreeMap::new();
        by_tag.insert(Key::tag("protein"), Value::Num(12.0));
        Parameters::new()
            .with("limit", Value::map([("calories", 2200.0)]))
            .with("nutrients", Value::Map(by_tag))
            .with("data", Value::map([("worker", Value::map([("task1", 3.0)]))]))
            .with("costs", Value::list([1.5, 2.5]))
            .with("n", 3i64)
    }

    #[test]
    fn test_nested_lookup() {
        let p = params();
        let env = Env::new(&p);
        let e = Expr::index(Expr::sym("limit"), Expr::str("calories"));
        assert_eq!(eval_num(&e, &env).unwrap(), 2200.0);
        let e = Expr::index(Expr::sym("costs"), Expr::num(1));
        assert_eq!(eval_num(&e, &env).unwrap(), 2.5);
    }

    #[test]
    fn test_key_forms_resolve_both_ways() {
        let p = params();
        let env = Env::new(&p);
        // string key against a tag-keyed map
        let e = Expr::index(Expr::sym("nutrients"), Expr::str("protein"));
        assert_eq!(eval_num(&e, &env).unwrap(), 12.0);
        // tag key and field access against a string-keyed map
        let e = Expr::index(Expr::sym("limit"), Expr::tag("calories"));
        assert_eq!(eval_num(&e, &env).unwrap(), 2200.0);
        let e = Expr::field(Expr::sym("limit"), "calories");
        assert_eq!(eval_num(&e, &env).unwrap(), 2200.0);
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key(&Key::str("1")), Key::Int(1));
        assert_eq!(canonical_key(&Key::tag("-3")), Key::Int(-3));
        assert_eq!(canonical_key(&Key::tag("milk")), Key::str("milk"));
        // not the decimal spelling of an integer
        assert_eq!(canonical_key(&Key::str("01")), Key::str("01"));
        assert_eq!(canonical_key(&Key::Int(7)), Key::Int(7));
    }

    #[test]
    fn test_missing_key_path() {
        let p = params();
        let env = Env::new(&p);
        let e = Expr::index(
            Expr::index(Expr::sym("data"), Expr::str("worker")),
            Expr::str("taskX"),
        );
        let err = eval_const(&e, &env).unwrap_err();
        match err {
            CodegenError::MissingKey { path } => assert_eq!(path, vec!["data", "worker", "taskX"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric() {
        let p = params();
        let env = Env::new(&p);
        let err = eval_num(&Expr::sym("limit"), &env).unwrap_err();
        assert!(matches!(err, CodegenError::NonNumericConstant { kind: "map", .. }));
    }

    #[test]
    fn test_not_constant_shape() {
        let p = params();
        let env = Env::new(&p);
        let e = Expr::var("x", vec![Expr::num(1)]) + Expr::num(1);
        assert!(try_evaluate_constant(&e, &env).unwrap().is_none());
        let e = Expr::sym("n") * Expr::num(2);
        assert_eq!(try_evaluate_constant(&e, &env).unwrap(), Some(Value::Num(6.0)));
    }

    #[test]
    fn test_range() {
        let p = params();
        let env = Env::new(&p);
        let e = Expr::Range(Box::new(Expr::num(1)), Box::new(Expr::sym("n")));
        assert_eq!(eval_const(&e, &env).unwrap(), Value::list([1i64, 2, 3]));
        let e = Expr::range(2, 1);
        assert_eq!(eval_const(&e, &env).unwrap(), Value::List(vec![]));
    }
}
