//! Wildcard expansion: `queen(i, :_)`, `qty(:_) * price[:_][n]`.
//!
//! A wildcard is carried by a leaf reference: a variable-family reference with
//! `:_` among its indices, or a constant access chain with `:_` as a key. Inside
//! one carrier the wildcards are numbered left to right as slots `0, 1, ..`, and
//! slot `k` of every carrier in the same expression is the same enumeration
//! variable. Each carrier contributes the set of slot tuples it admits (existing
//! family instances, or existing container keys), and the expression is summed
//! over the join of those sets. For a single slot this is the intersection of
//! the inferred domains; distinct slots within one carrier range independently.
//! Keys are joined in canonical form, so an integer family index meets the
//! `"1"` keys of a JSON object.
//!
//! Parts of the expression without a wildcard are repeated once per row; see
//! `sum_wildcards`.
//!
//! Nested `sum(..)` and comprehension bodies are separate scopes and are not
//! looked into.

use crate::codegen::constant::{
    canonical_key, container_keys, eval_const, eval_key, get_in, split_chain, Step,
};
use crate::codegen::env::Env;
use crate::codegen::error::CodegenError;
use crate::codegen::eval::reduce;
use crate::codegen::poly::Polynomial;
use crate::codegen::store::ModelStore;
use crate::{Expr, Key, Value, VarRef};
use std::borrow::Cow;
use std::collections::HashMap;

/// A leaf of the expression that carries at least one wildcard.
#[derive(Clone, Copy, Debug)]
enum Carrier<'e> {
    Var(&'e VarRef),
    Access(&'e Expr),
}

/// True when `e` has a wildcard outside any nested sum.
pub fn contains_wildcard(e: &Expr) -> bool {
    match e {
        Expr::Wildcard => true,
        Expr::Var(vr) => vr.indices.iter().any(contains_wildcard),
        Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Range(a, b) => {
            contains_wildcard(a) || contains_wildcard(b)
        }
        Expr::Neg(a) => contains_wildcard(a),
        Expr::Index { base, key } => contains_wildcard(base) || contains_wildcard(key),
        Expr::Field { base, .. } => contains_wildcard(base),
        Expr::List(xs) => xs.iter().any(contains_wildcard),
        Expr::Sum(_) | Expr::ForSum { .. } => false,
        Expr::Num(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Tag(_) | Expr::Inf | Expr::Sym(_) => false,
    }
}

fn collect_carriers<'e>(e: &'e Expr, whole: &Expr, out: &mut Vec<Carrier<'e>>) -> Result<(), CodegenError> {
    let unresolvable = || CodegenError::UnresolvableWildcard {
        expr: whole.to_string(),
    };
    match e {
        Expr::Var(vr) => {
            if vr.indices.iter().any(|i| !matches!(i, Expr::Wildcard) && contains_wildcard(i)) {
                return Err(unresolvable());
            }
            if vr.indices.iter().any(|i| matches!(i, Expr::Wildcard)) {
                out.push(Carrier::Var(vr));
            }
        }
        Expr::Index { .. } | Expr::Field { .. } => {
            let (root, steps) = split_chain(e);
            if contains_wildcard(root) {
                return Err(unresolvable());
            }
            let mut direct = false;
            for st in &steps {
                if let Step::Key(k) = st {
                    match k {
                        Expr::Wildcard => direct = true,
                        k if contains_wildcard(k) => return Err(unresolvable()),
                        _ => {}
                    }
                }
            }
            if direct {
                out.push(Carrier::Access(e));
            }
        }
        Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
            collect_carriers(a, whole, out)?;
            collect_carriers(b, whole, out)?;
        }
        Expr::Neg(a) => collect_carriers(a, whole, out)?,
        Expr::Sum(_) | Expr::ForSum { .. } => {}
        other => {
            if contains_wildcard(other) {
                return Err(unresolvable());
            }
        }
    }
    Ok(())
}

/// Slot tuples admitted by a variable reference: projections of the registered
/// instances that agree with every fixed index. An undeclared family admits nothing.
fn var_tuples(vr: &VarRef, env: &Env, store: &ModelStore) -> Result<Vec<Vec<Key>>, CodegenError> {
    // fixed positions are resolved before looking at the family
    let mut pattern: Vec<Option<Key>> = Vec::with_capacity(vr.indices.len());
    for idx in &vr.indices {
        pattern.push(match idx {
            Expr::Wildcard => None,
            other => Some(eval_key(other, env)?),
        });
    }
    let Some(family) = store.get_variable_family(&vr.name) else {
        tracing::trace!(family = %vr.name, "wildcard over undeclared family");
        return Ok(vec![]);
    };
    let mut out = vec![];
    for index in family.keys() {
        if index.len() != pattern.len() {
            continue;
        }
        let mut slots = vec![];
        let mut ok = true;
        for (k, p) in index.iter().zip(pattern.iter()) {
            match p {
                None => slots.push(k.clone()),
                Some(fixed) if fixed == k => {}
                Some(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            out.push(slots);
        }
    }
    Ok(out)
}

/// Slot tuples admitted by a constant access chain: every key path that exists,
/// up to the last wildcard step.
fn access_tuples(e: &Expr, whole: &Expr, env: &Env) -> Result<Vec<Vec<Key>>, CodegenError> {
    let (root, steps) = split_chain(e);
    let last_wild = steps
        .iter()
        .rposition(|s| matches!(s, Step::Key(Expr::Wildcard)))
        .unwrap_or(0);
    let root_name = match root {
        Expr::Sym(s) => s.clone(),
        other => other.to_string(),
    };
    let root_val: Cow<'_, Value> = match root {
        Expr::Sym(s) => Cow::Borrowed(env.resolve(s)?),
        other => Cow::Owned(eval_const(other, env)?),
    };

    // (slot keys so far, path for diagnostics, current value)
    let mut states: Vec<(Vec<Key>, Vec<String>, &Value)> =
        vec![(vec![], vec![root_name], root_val.as_ref())];
    for step in &steps[..=last_wild] {
        let mut next = vec![];
        for (slots, path, cur) in states {
            let key = match step {
                Step::Key(Expr::Wildcard) => {
                    let keys = container_keys(cur).ok_or_else(|| CodegenError::UnresolvableWildcard {
                        expr: whole.to_string(),
                    })?;
                    for k in keys {
                        if let Some(v) = get_in(cur, &k) {
                            let mut s = slots.clone();
                            let mut p = path.clone();
                            p.push(k.to_string());
                            s.push(k);
                            next.push((s, p, v));
                        }
                    }
                    continue;
                }
                Step::Key(k) => eval_key(k, env)?,
                Step::Field(name) => Key::Tag(name.to_string()),
            };
            let mut p = path;
            p.push(key.to_string());
            let v = get_in(cur, &key).ok_or_else(|| CodegenError::MissingKey { path: p.clone() })?;
            next.push((slots, p, v));
        }
        states = next;
    }
    Ok(states.into_iter().map(|(slots, _, _)| slots).collect())
}

/// The slot tuples an expression is summed over.
///
/// Carriers may spell the same key differently (`1` and `"1"`, `:a` and `"a"`),
/// so tuples are joined on their canonical form and every row remembers the
/// keys each carrier had. `rows()` shows a slot as the first carrier covering it
/// spells it.
#[derive(Clone, Debug, Default)]
pub struct WildcardDomain {
    rows: Vec<Vec<Key>>,
    spelled: Vec<Vec<Vec<Key>>>,
}

impl WildcardDomain {
    pub fn rows(&self) -> &[Vec<Key>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone)]
struct Joined {
    canon: Vec<Key>,
    keys: Vec<Key>,
    spelled: Vec<Vec<Key>>,
}

fn canonical(t: &[Key]) -> Vec<Key> {
    t.iter().map(canonical_key).collect()
}

/// Infers the slot tuples `e` is summed over.
///
/// Returns an empty domain when some carrier admits nothing (sum over nothing).
/// Fails with `EmptyWildcardDomain` when every carrier admits something but no
/// tuple is admitted by all of them.
pub fn resolve_domain(e: &Expr, env: &Env, store: &ModelStore) -> Result<WildcardDomain, CodegenError> {
    let mut carriers = vec![];
    collect_carriers(e, e, &mut carriers)?;
    if carriers.is_empty() {
        return Err(CodegenError::UnresolvableWildcard { expr: e.to_string() });
    }

    let mut sets = Vec::with_capacity(carriers.len());
    for c in &carriers {
        let tuples = match c {
            Carrier::Var(vr) => var_tuples(vr, env, store)?,
            Carrier::Access(a) => access_tuples(a, e, env)?,
        };
        if tuples.is_empty() {
            return Ok(WildcardDomain::default());
        }
        sets.push(tuples);
    }

    let mut sets = sets.into_iter();
    let mut rows: Vec<Joined> = sets
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|t| Joined {
            canon: canonical(&t),
            keys: t.clone(),
            spelled: vec![t],
        })
        .collect();
    for tuples in sets {
        rows = join(rows, &tuples);
        if rows.is_empty() {
            return Err(CodegenError::EmptyWildcardDomain { expr: e.to_string() });
        }
    }
    tracing::trace!(expr = %e, size = rows.len(), "wildcard domain");
    let (rows, spelled) = rows.into_iter().map(|r| (r.keys, r.spelled)).unzip();
    Ok(WildcardDomain { rows, spelled })
}

/// Natural join on the shared slot prefix, comparing canonical keys.
fn join(rows: Vec<Joined>, tuples: &[Vec<Key>]) -> Vec<Joined> {
    let width = rows.first().map_or(0, |r| r.canon.len());
    let twidth = tuples.first().map_or(0, Vec::len);
    let shared = width.min(twidth);
    let canon: Vec<Vec<Key>> = tuples.iter().map(|t| canonical(t)).collect();
    let mut by_prefix: HashMap<&[Key], Vec<usize>> = HashMap::new();
    for (i, c) in canon.iter().enumerate() {
        by_prefix.entry(&c[..shared]).or_default().push(i);
    }
    let mut out = vec![];
    for r in rows {
        let Some(matches) = by_prefix.get(&r.canon[..shared]) else {
            continue;
        };
        for &i in matches {
            let mut merged = r.clone();
            merged.canon.extend(canon[i][shared..].iter().cloned());
            merged.keys.extend(tuples[i][shared..].iter().cloned());
            merged.spelled.push(tuples[i].clone());
            out.push(merged);
        }
    }
    out
}

/// Sums `e` over `domain`, reducing each substituted copy under the same `env`.
/// `domain` must come from `resolve_domain` on the same expression.
pub fn expand(e: &Expr, domain: &WildcardDomain, env: &Env, store: &ModelStore) -> Result<Polynomial, CodegenError> {
    let mut acc = Polynomial::zero();
    for spelled in &domain.spelled {
        let mut next = 0;
        let concrete = substitute(e, spelled, &mut next);
        acc.add_inplace(&reduce(&concrete, env, store)?);
    }
    Ok(acc)
}

/// Sums a wildcard-bearing expression over its inferred domain.
///
/// The whole expression is substituted once per row, so parts that carry no
/// wildcard are repeated for every row: `x(:_) + 5` over three instances has
/// constant `15`, and a nested `sum(..)` next to a wildcard is added once per row.
pub(crate) fn sum_wildcards(e: &Expr, env: &Env, store: &ModelStore) -> Result<Polynomial, CodegenError> {
    let domain = resolve_domain(e, env, store)?;
    expand(e, &domain, env, store)
}

fn key_literal(k: &Key) -> Expr {
    match k {
        Key::Int(n) => Expr::Num(*n as f64),
        Key::Str(s) => Expr::Str(s.clone()),
        Key::Tag(s) => Expr::Tag(s.clone()),
    }
}

fn slot(row: &[Key], k: &mut usize) -> Expr {
    let lit = row.get(*k).map(key_literal).unwrap_or(Expr::Wildcard);
    *k += 1;
    lit
}

fn has_direct_wildcard(e: &Expr) -> bool {
    split_chain(e)
        .1
        .iter()
        .any(|s| matches!(s, Step::Key(Expr::Wildcard)))
}

fn carrier_keys<'r>(spelled: &'r [Vec<Key>], next: &mut usize) -> &'r [Key] {
    let keys = spelled.get(*next).map(Vec::as_slice).unwrap_or_default();
    *next += 1;
    keys
}

/// Replaces carrier wildcards with each carrier's own keys. Carriers are met in
/// the same order `collect_carriers` found them.
fn substitute(e: &Expr, spelled: &[Vec<Key>], next: &mut usize) -> Expr {
    match e {
        Expr::Var(vr) if vr.indices.iter().any(|i| matches!(i, Expr::Wildcard)) => {
            let row = carrier_keys(spelled, next);
            let mut k = 0;
            let indices = vr
                .indices
                .iter()
                .map(|i| match i {
                    Expr::Wildcard => slot(row, &mut k),
                    other => other.clone(),
                })
                .collect();
            Expr::Var(VarRef {
                name: vr.name.clone(),
                indices,
            })
        }
        Expr::Index { .. } | Expr::Field { .. } if has_direct_wildcard(e) => {
            let row = carrier_keys(spelled, next);
            let mut k = 0;
            substitute_chain(e, row, &mut k)
        }
        Expr::Add(a, b) => {
            let a = substitute(a, spelled, next);
            Expr::Add(Box::new(a), Box::new(substitute(b, spelled, next)))
        }
        Expr::Sub(a, b) => {
            let a = substitute(a, spelled, next);
            Expr::Sub(Box::new(a), Box::new(substitute(b, spelled, next)))
        }
        Expr::Mul(a, b) => {
            let a = substitute(a, spelled, next);
            Expr::Mul(Box::new(a), Box::new(substitute(b, spelled, next)))
        }
        Expr::Div(a, b) => {
            let a = substitute(a, spelled, next);
            Expr::Div(Box::new(a), Box::new(substitute(b, spelled, next)))
        }
        Expr::Neg(a) => Expr::Neg(Box::new(substitute(a, spelled, next))),
        other => other.clone(),
    }
}

fn substitute_chain(e: &Expr, row: &[Key], k: &mut usize) -> Expr {
    match e {
        Expr::Index { base, key } => {
            // base first: slots are numbered innermost access first
            let base = substitute_chain(base, row, k);
            let key = match key.as_ref() {
                Expr::Wildcard => slot(row, k),
                other => other.clone(),
            };
            Expr::index(base, key)
        }
        Expr::Field { base, name } => Expr::field(substitute_chain(base, row, k), name.clone()),
        other => other.clone(),
    }
}
