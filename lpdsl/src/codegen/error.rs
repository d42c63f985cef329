//! 코드 생성 에러 타입
//!
//! 표현식 컴파일 과정에서 발생할 수 있는 에러를 정의합니다.
//! 모든 에러는 발견된 지점에서 그대로 반환되며, 기본값으로 대체되지 않습니다.

use crate::codegen::store::VarKey;
use thiserror::Error;

/// 표현식 컴파일 중 발생하는 에러
#[derive(Debug, Error)]
pub enum CodegenError {
    /// 생성자 바인딩과 모델 파라미터 어디에도 없는 심볼
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    /// 열거할 수 없는 값으로 평가된 생성자 도메인
    #[error("generator `{sym}` ranges over `{domain}`, which is a {kind}, not an enumerable value")]
    InvalidGeneratorDomain {
        sym: String,
        domain: String,
        kind: &'static str,
    },
    /// 모델에 등록되지 않은 변수 인스턴스
    #[error("undeclared variable `{0}`")]
    UndeclaredVariable(VarKey),
    /// 같은 (패밀리, 인덱스) 변수의 중복 등록
    #[error("variable `{0}` is already declared")]
    DuplicateVariable(VarKey),
    /// 명시적 제약 조건 이름 충돌
    #[error("constraint name `{0}` is already used")]
    DuplicateConstraintName(String),
    /// 같은 와일드카드 슬롯에 대해 추론된 도메인들의 교집합이 비어 있음
    #[error("wildcard domains in `{expr}` do not intersect")]
    EmptyWildcardDomain { expr: String },
    /// 와일드카드 도메인을 추론할 수 없음
    #[error("cannot infer a domain for the wildcard in `{expr}`")]
    UnresolvableWildcard { expr: String },
    /// 숫자가 필요한 곳에 숫자가 아닌 상수
    #[error("expected a number, got {kind} `{value}`")]
    NonNumericConstant { value: String, kind: &'static str },
    /// 중첩 상수 접근 실패. `path`는 컨테이너 이름부터 실패한 키까지의 전체 경로
    #[error("missing key `{}` in `{}`", .path.last().map(String::as_str).unwrap_or(""), render_path(.path))]
    MissingKey { path: Vec<String> },
    /// 상수가 아닌 식으로 나눔
    #[error("division by a non-constant expression `{expr}`")]
    DivisionByNonConstant { expr: String },
    /// 0으로 나눔
    #[error("division by zero in `{expr}`")]
    DivisionByZero { expr: String },
    /// 상수가 아닌 두 다항식의 곱
    #[error("product of two non-constant expressions is not linear: `{expr}`")]
    NonLinear { expr: String },
    /// 변수 인덱스나 맵 키로 사용할 수 없는 값
    #[error("{kind} `{value}` cannot be used as an index or key")]
    NonScalarIndex { value: String, kind: &'static str },
    /// 무한대 센티널이 산술 연산에 사용됨
    #[error("`:infinity` cannot take part in arithmetic: `{expr}`")]
    UnboundedInArithmetic { expr: String },
    /// 상수나 무한대로 평가되지 않는 변수 범위
    #[error("variable bound `{expr}` is not a constant")]
    InvalidBound { expr: String },
    /// 잘못된 설명 템플릿
    #[error("bad template `{template}`: {reason}")]
    Template { template: String, reason: &'static str },
    /// 파라미터 JSON 파싱 실패
    #[error("invalid model parameters: {0}")]
    Parameters(#[from] serde_json::Error),
}

/// `["data", "worker", "taskX"]` -> `data[worker][taskX]`
fn render_path(path: &[String]) -> String {
    let mut out = String::new();
    for (i, p) in path.iter().enumerate() {
        if i == 0 {
            out.push_str(p);
        } else {
            out.push('[');
            out.push_str(p);
            out.push(']');
        }
    }
    out
}
