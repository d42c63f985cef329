use crate::codegen::store::VarKey;
use std::collections::BTreeMap;

/// A sum whose magnitude falls to this fraction of its larger operand is a
/// cancellation and becomes exactly zero. Small coefficients are never dropped otherwise.
const CANCEL_REL: f64 = 1e-12;

fn combine(acc: f64, v: f64) -> f64 {
    let sum = acc + v;
    if sum.abs() <= CANCEL_REL * acc.abs().max(v.abs()) {
        0.0
    } else {
        sum
    }
}

/// Sparse linear polynomial: `sum(coeff * var) + constant`.
///
/// Terms are kept in a `BTreeMap` so iteration order (and thus LP output) is
/// reproducible. No term ever carries a zero coefficient.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polynomial {
    terms: BTreeMap<VarKey, f64>,
    constant: f64,
}

impl Polynomial {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(v: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: v,
        }
    }

    pub fn variable(key: VarKey) -> Self {
        Self::term(key, 1.0)
    }

    pub fn term(key: VarKey, coeff: f64) -> Self {
        let mut p = Self::zero();
        if coeff != 0.0 {
            p.terms.insert(key, coeff);
        }
        p
    }

    pub fn add_inplace(&mut self, other: &Polynomial) {
        self.constant = combine(self.constant, other.constant);
        for (k, v) in other.terms.iter() {
            let c = self.terms.entry(k.clone()).or_insert(0.0);
            *c = combine(*c, *v);
        }
        self.prune();
    }

    pub fn sub_inplace(&mut self, other: &Polynomial) {
        self.constant = combine(self.constant, -other.constant);
        for (k, v) in other.terms.iter() {
            let c = self.terms.entry(k.clone()).or_insert(0.0);
            *c = combine(*c, -*v);
        }
        self.prune();
    }

    pub fn add(mut self, other: &Polynomial) -> Self {
        self.add_inplace(other);
        self
    }

    pub fn sub(mut self, other: &Polynomial) -> Self {
        self.sub_inplace(other);
        self
    }

    pub fn scale(&self, k: f64) -> Self {
        let mut e = Self::constant(self.constant * k);
        for (n, c) in self.terms.iter() {
            e.terms.insert(n.clone(), c * k);
        }
        e.prune();
        e
    }

    pub fn neg(&self) -> Self {
        self.scale(-1.0)
    }

    /// Variables with a nonzero coefficient, in sorted order.
    pub fn variables(&self) -> impl Iterator<Item = &VarKey> {
        self.terms.keys()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&VarKey, f64)> {
        self.terms.iter().map(|(k, c)| (k, *c))
    }

    pub fn coeff(&self, key: &VarKey) -> f64 {
        self.terms.get(key).copied().unwrap_or(0.0)
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// The value of a polynomial without variables.
    pub fn as_constant(&self) -> Option<f64> {
        self.terms.is_empty().then_some(self.constant)
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty() && self.constant == 0.0
    }

    /// Splits off the constant term: `p == rest + c`.
    pub fn split_constant(mut self) -> (Polynomial, f64) {
        let c = self.constant;
        self.constant = 0.0;
        (self, c)
    }

    pub fn approx_eq(&self, other: &Polynomial, tol: f64) -> bool {
        let diff = self.clone().sub(other);
        diff.constant.abs() <= tol && diff.terms.values().all(|c| c.abs() <= tol)
    }

    fn prune(&mut self) {
        self.terms.retain(|_, c| *c != 0.0);
    }
}
