//! 생성자(generator) 확장
//!
//! `[i <- 1..n, j <- cities]` 형태의 생성자 목록을 도메인 값들의 카르테시안 곱으로
//! 확장합니다. 각 조합마다 바인딩 환경 하나가 만들어집니다.

use crate::codegen::constant::{eval_const, is_constant_shape};
use crate::codegen::env::Env;
use crate::codegen::error::CodegenError;
use crate::codegen::store::ModelStore;
use crate::{Expr, Generator, Value};

/// 생성자 목록을 확장하여 조합별 환경을 모두 반환합니다.
///
/// 순서는 선언 순서를 따르며 가장 오른쪽 생성자가 가장 빠르게 변합니다.
/// `[i <- 1..2, j <- [a, b]]` -> `(1,a) (1,b) (2,a) (2,b)`.
/// 도메인 하나라도 비어 있으면 결과도 비어 있으며, 에러가 아닙니다.
pub fn expand_generators<'p>(
    generators: &[Generator],
    env: &Env<'p>,
    store: &ModelStore,
) -> Result<Vec<Env<'p>>, CodegenError> {
    let mut out = vec![];
    expand_binders(generators, env, store, |cenv| {
        out.push(cenv);
        Ok(())
    })?;
    Ok(out)
}

/// 조합마다 클로저 `f`를 실행합니다. 앞선 생성자의 바인딩은 뒤 생성자의 도메인 평가에 보입니다.
pub(crate) fn expand_binders<'p, F>(
    generators: &[Generator],
    env: &Env<'p>,
    store: &ModelStore,
    mut f: F,
) -> Result<(), CodegenError>
where
    F: FnMut(Env<'p>) -> Result<(), CodegenError>,
{
    /// 재귀적으로 생성자를 하나씩 바인딩합니다.
    fn rec<'p, F>(
        generators: &[Generator],
        i: usize,
        env: &Env<'p>,
        store: &ModelStore,
        f: &mut F,
    ) -> Result<(), CodegenError>
    where
        F: FnMut(Env<'p>) -> Result<(), CodegenError>,
    {
        // 모든 생성자를 처리했으면 클로저 실행
        if i == generators.len() {
            return f(env.clone());
        }
        let g = &generators[i];
        let vals = domain_values(g, env, store)?;
        tracing::trace!(sym = %g.sym, size = vals.len(), "generator domain");
        for v in vals {
            let next = env.overlay(&g.sym, v);
            rec(generators, i + 1, &next, store, f)?;
        }
        Ok(())
    }

    rec(generators, 0, env, store, &mut f)
}

/// 생성자 도메인을 구체적인 값 목록으로 평가합니다.
///
/// - 범위와 리스트: 원소들
/// - 맵: 키 집합
/// - 바인딩되지 않은 심볼이 선언된 변수 패밀리 이름이면: 그 패밀리의 인덱스들
fn domain_values(g: &Generator, env: &Env, store: &ModelStore) -> Result<Vec<Value>, CodegenError> {
    if let Expr::Sym(s) = &g.domain {
        if env.lookup(s).is_none() {
            if let Some(family) = store.get_variable_family(s) {
                return Ok(family
                    .keys()
                    .map(|idx| match idx.as_slice() {
                        [k] => Value::from(k.clone()),
                        ks => Value::List(ks.iter().cloned().map(Value::from).collect()),
                    })
                    .collect());
            }
        }
    }

    let invalid = |kind: &'static str| CodegenError::InvalidGeneratorDomain {
        sym: g.sym.clone(),
        domain: g.domain.to_string(),
        kind,
    };

    if !is_constant_shape(&g.domain) {
        return Err(invalid("variable expression"));
    }
    match eval_const(&g.domain, env)? {
        Value::List(xs) => Ok(xs),
        Value::Map(m) => Ok(m.into_keys().map(Value::from).collect()),
        other => Err(invalid(other.kind())),
    }
}
