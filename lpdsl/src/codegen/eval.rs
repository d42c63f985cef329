//! 표현식 축약 (Expression Reducer)
//!
//! 표현식 트리를 바인딩 환경과 모델 저장소에 대해 평가하여 선형 다항식으로 만듭니다.
//! 노드 모양에 따라 상수 평가기, 와일드카드 확장, 생성자 확장으로 분기합니다.

use crate::codegen::binders::expand_binders;
use crate::codegen::constant::{eval_const, eval_key, is_constant_shape};
use crate::codegen::env::Env;
use crate::codegen::error::CodegenError;
use crate::codegen::poly::Polynomial;
use crate::codegen::store::{Bound, ModelStore, VarKey};
use crate::codegen::wildcard::{contains_wildcard, sum_wildcards};
use crate::{Expr, Value, VarRef};

/// 우변(또는 변수 범위) 값: 다항식이거나 무한대 센티널
#[derive(Clone, Debug, PartialEq)]
pub enum Rhs {
    Poly(Polynomial),
    Unbounded(Bound),
}

fn is_unbounded(e: &Expr) -> bool {
    match e {
        Expr::Inf => true,
        Expr::Neg(x) => is_unbounded(x),
        _ => false,
    }
}

/// 우변 표현식을 평가합니다.
///
/// `:infinity`와 `-:infinity`는 산술 연산 전에 처리되며 다항식으로 바뀌지 않습니다.
pub fn reduce_rhs(e: &Expr, env: &Env, store: &ModelStore) -> Result<Rhs, CodegenError> {
    match e {
        Expr::Inf => Ok(Rhs::Unbounded(Bound::PosInf)),
        Expr::Neg(x) if is_unbounded(x) => match reduce_rhs(x, env, store)? {
            Rhs::Unbounded(Bound::PosInf) => Ok(Rhs::Unbounded(Bound::NegInf)),
            _ => Ok(Rhs::Unbounded(Bound::PosInf)),
        },
        _ => reduce(e, env, store).map(Rhs::Poly),
    }
}

/// 표현식을 선형 다항식으로 평가합니다.
///
/// 분기 순서 (먼저 맞는 것이 우선):
/// 1. 숫자/불리언 리터럴
/// 2. 와일드카드 없는 변수 참조: 저장소에서 인스턴스를 찾고, 없으면 `UndeclaredVariable`
/// 3. 와일드카드를 포함한 식: 와일드카드 확장으로 위임
/// 4. 사칙연산
/// 5. 단항 부정
/// 6. `sum(..)` / 생성자 합
/// 7. 그 외: 상수 평가기
pub fn reduce(e: &Expr, env: &Env, store: &ModelStore) -> Result<Polynomial, CodegenError> {
    match e {
        Expr::Num(v) => Ok(Polynomial::constant(*v)),
        Expr::Bool(b) => Ok(Polynomial::constant(if *b { 1.0 } else { 0.0 })),

        Expr::Var(vr) if !contains_wildcard(e) => reduce_var(vr, env, store),
        _ if contains_wildcard(e) => sum_wildcards(e, env, store),

        Expr::Add(a, b) => {
            let (x, y) = operands(e, a, b, env, store)?;
            Ok(x.add(&y))
        }
        Expr::Sub(a, b) => {
            let (x, y) = operands(e, a, b, env, store)?;
            Ok(x.sub(&y))
        }
        // 상수 * 선형식만 지원
        Expr::Mul(a, b) => {
            let (x, y) = operands(e, a, b, env, store)?;
            if let Some(k) = y.as_constant() {
                Ok(x.scale(k))
            } else if let Some(k) = x.as_constant() {
                Ok(y.scale(k))
            } else {
                Err(CodegenError::NonLinear { expr: e.to_string() })
            }
        }
        Expr::Div(a, b) => {
            let (x, y) = operands(e, a, b, env, store)?;
            match y.as_constant() {
                None => Err(CodegenError::DivisionByNonConstant { expr: e.to_string() }),
                Some(k) if k == 0.0 => Err(CodegenError::DivisionByZero { expr: e.to_string() }),
                Some(k) => Ok(x.scale(1.0 / k)),
            }
        }
        Expr::Neg(a) => {
            if is_unbounded(a) {
                return Err(CodegenError::UnboundedInArithmetic { expr: e.to_string() });
            }
            Ok(reduce(a, env, store)?.neg())
        }

        Expr::Sum(inner) => reduce_sum(inner, env, store),
        Expr::ForSum { generators, body } => {
            let mut acc = Polynomial::zero();
            expand_binders(generators, env, store, |cenv| {
                acc.add_inplace(&reduce(body, &cenv, store)?);
                Ok(())
            })?;
            Ok(acc)
        }

        Expr::Inf => Err(CodegenError::UnboundedInArithmetic { expr: e.to_string() }),
        Expr::Sym(s) => reduce_sym(s, env, store),
        _ => constant_poly(e, env),
    }
}

fn operands(
    whole: &Expr,
    a: &Expr,
    b: &Expr,
    env: &Env,
    store: &ModelStore,
) -> Result<(Polynomial, Polynomial), CodegenError> {
    if is_unbounded(a) || is_unbounded(b) {
        return Err(CodegenError::UnboundedInArithmetic {
            expr: whole.to_string(),
        });
    }
    Ok((reduce(a, env, store)?, reduce(b, env, store)?))
}

/// 모든 인덱스가 구체적인 변수 참조를 저장소의 인스턴스로 바꿉니다.
fn reduce_var(vr: &VarRef, env: &Env, store: &ModelStore) -> Result<Polynomial, CodegenError> {
    let mut index = Vec::with_capacity(vr.indices.len());
    for idx in &vr.indices {
        index.push(eval_key(idx, env)?);
    }
    let key = VarKey::new(vr.name.clone(), index);
    if store.lookup(&key).is_none() {
        return Err(CodegenError::UndeclaredVariable(key));
    }
    Ok(Polynomial::variable(key))
}

/// 심볼은 바인딩/파라미터가 우선이고, 둘 다 없을 때만 인덱스 없는 변수로 봅니다.
fn reduce_sym(s: &str, env: &Env, store: &ModelStore) -> Result<Polynomial, CodegenError> {
    if let Some(v) = env.lookup(s) {
        return value_poly(v);
    }
    let key = VarKey::scalar(s);
    if store.lookup(&key).is_some() {
        return Ok(Polynomial::variable(key));
    }
    Err(CodegenError::UnknownSymbol(s.to_string()))
}

/// `sum(x)`: 와일드카드가 있으면 확장하고, 상수 리스트면 원소를 더합니다.
fn reduce_sum(inner: &Expr, env: &Env, store: &ModelStore) -> Result<Polynomial, CodegenError> {
    if contains_wildcard(inner) {
        return sum_wildcards(inner, env, store);
    }
    if is_constant_shape(inner) {
        if let Value::List(xs) = eval_const(inner, env)? {
            let mut acc = Polynomial::zero();
            for x in &xs {
                acc.add_inplace(&value_poly(x)?);
            }
            return Ok(acc);
        }
    }
    reduce(inner, env, store)
}

fn constant_poly(e: &Expr, env: &Env) -> Result<Polynomial, CodegenError> {
    value_poly(&eval_const(e, env)?)
}

fn value_poly(v: &Value) -> Result<Polynomial, CodegenError> {
    v.as_num()
        .map(Polynomial::constant)
        .ok_or_else(|| CodegenError::NonNumericConstant {
            value: v.to_string(),
            kind: v.kind(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::env::Parameters;
    use crate::{Generator, Key, VarType};

    fn store_1d(name: &str, n: i64) -> ModelStore {
        let mut store = ModelStore::new();
        for i in 1..=n {
            store
                .new_variable(VarKey::new(name, vec![Key::Int(i)]), VarType::Continuous, None, None)
                .unwrap();
        }
        store
    }

    fn x(i: i64) -> VarKey {
        VarKey::new("x", vec![Key::Int(i)])
    }

    #[test]
    fn test_linear_combination() {
        let store = store_1d("x", 3);
        let params = Parameters::new().with("w", 2.5);
        let env = Env::new(&params);
        let e = Expr::sym("w") * Expr::var("x", vec![Expr::num(1)])
            - Expr::var("x", vec![Expr::num(2)]) / Expr::num(2)
            + Expr::num(4);
        let p = reduce(&e, &env, &store).unwrap();
        assert_eq!(p.coeff(&x(1)), 2.5);
        assert_eq!(p.coeff(&x(2)), -0.5);
        assert_eq!(p.constant_term(), 4.0);
    }

    #[test]
    fn test_index_resolved_through_bindings() {
        let store = store_1d("x", 3);
        let params = Parameters::new();
        let env = Env::new(&params).overlay("i", Value::Num(2.0));
        let e = Expr::var("x", vec![Expr::sym("i") + Expr::num(1)]);
        let p = reduce(&e, &env, &store).unwrap();
        assert_eq!(p.coeff(&x(3)), 1.0);
    }

    #[test]
    fn test_undeclared_variable() {
        let store = store_1d("x", 3);
        let params = Parameters::new();
        let env = Env::new(&params);
        let err = reduce(&Expr::var("x", vec![Expr::num(7)]), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::UndeclaredVariable(k) if k == x(7)));
        let err = reduce(&Expr::var("y", vec![Expr::num(1)]), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::UndeclaredVariable(k) if k.family == "y"));
    }

    #[test]
    fn test_division_errors() {
        let store = store_1d("x", 2);
        let params = Parameters::new();
        let env = Env::new(&params);
        let xv = || Expr::var("x", vec![Expr::num(1)]);
        let err = reduce(&(xv() / Expr::num(0)), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::DivisionByZero { .. }));
        let err = reduce(&(xv() / xv()), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::DivisionByNonConstant { .. }));
        let err = reduce(&(xv() * xv()), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::NonLinear { .. }));
    }

    #[test]
    fn test_unbounded_only_as_whole_rhs() {
        let store = ModelStore::new();
        let params = Parameters::new();
        let env = Env::new(&params);
        assert_eq!(
            reduce_rhs(&Expr::Inf, &env, &store).unwrap(),
            Rhs::Unbounded(Bound::PosInf)
        );
        assert_eq!(
            reduce_rhs(&Expr::neg_inf(), &env, &store).unwrap(),
            Rhs::Unbounded(Bound::NegInf)
        );
        let err = reduce_rhs(&(Expr::Inf + Expr::num(1)), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::UnboundedInArithmetic { .. }));
    }

    #[test]
    fn test_scalar_variable_fallback() {
        let mut store = ModelStore::new();
        store
            .new_variable(VarKey::scalar("z"), VarType::Continuous, None, None)
            .unwrap();
        let params = Parameters::new().with("k", 3i64);
        let env = Env::new(&params);
        let p = reduce(&(Expr::sym("k") * Expr::sym("z")), &env, &store).unwrap();
        assert_eq!(p.coeff(&VarKey::scalar("z")), 3.0);
        let err = reduce(&Expr::sym("q"), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::UnknownSymbol(s) if s == "q"));
    }

    #[test]
    fn test_binding_shadows_scalar_variable() {
        let mut store = ModelStore::new();
        store
            .new_variable(VarKey::scalar("i"), VarType::Continuous, None, None)
            .unwrap();
        let params = Parameters::new();
        let env = Env::new(&params).overlay("i", Value::Num(5.0));
        let p = reduce(&Expr::sym("i"), &env, &store).unwrap();
        assert_eq!(p.as_constant(), Some(5.0));
    }

    #[test]
    fn test_for_sum_and_empty_domain() {
        let store = store_1d("x", 4);
        let params = Parameters::new().with("empty", Value::List(vec![]));
        let env = Env::new(&params);
        let e = Expr::for_sum(
            vec![Generator::new("i", Expr::range(1, 4))],
            Expr::num(2) * Expr::var("x", vec![Expr::sym("i")]),
        );
        let p = reduce(&e, &env, &store).unwrap();
        assert_eq!(p.num_terms(), 4);
        assert_eq!(p.coeff(&x(4)), 2.0);

        let e = Expr::for_sum(
            vec![Generator::new("i", Expr::sym("empty"))],
            Expr::var("x", vec![Expr::sym("i")]),
        );
        assert!(reduce(&e, &env, &store).unwrap().is_zero());
    }

    #[test]
    fn test_sum_of_constant_list() {
        let store = ModelStore::new();
        let params = Parameters::new().with("costs", Value::list([1.0, 2.0, 3.5]));
        let env = Env::new(&params);
        let p = reduce(&Expr::sum(Expr::sym("costs")), &env, &store).unwrap();
        assert_eq!(p.as_constant(), Some(6.5));
    }

    #[test]
    fn test_non_numeric_constant() {
        let store = ModelStore::new();
        let params = Parameters::new().with("name", "bread");
        let env = Env::new(&params);
        let err = reduce(&(Expr::sym("name") + Expr::num(1)), &env, &store).unwrap_err();
        assert!(matches!(err, CodegenError::NonNumericConstant { kind: "string", .. }));
    }
}
