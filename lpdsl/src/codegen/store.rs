use crate::codegen::error::CodegenError;
use crate::codegen::poly::Polynomial;
use crate::{CmpOp, Key, ObjSense, VarType};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One concrete decision variable: family name + fully evaluated index tuple.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarKey {
    pub family: String,
    pub index: Vec<Key>,
}

impl VarKey {
    pub fn new(family: impl Into<String>, index: Vec<Key>) -> Self {
        Self {
            family: family.into(),
            index,
        }
    }

    pub fn scalar(family: impl Into<String>) -> Self {
        Self::new(family, vec![])
    }

    /// Readable LP identifier `family__idx1__idx2`. Not unique across keys
    /// (`a b` and `a_b` share it); the LP writer adds suffixes where needed.
    pub(crate) fn lp_name(&self) -> String {
        let mut s = sanitize(&self.family);
        for idx in &self.index {
            s.push_str("__");
            s.push_str(&sanitize(&idx.to_string()));
        }
        s
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.family)?;
        if self.index.is_empty() {
            return Ok(());
        }
        f.write_str("[")?;
        for (i, k) in self.index.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", k)?;
        }
        f.write_str("]")
    }
}

pub(crate) fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// A variable bound or constraint right-hand side. Infinity is never a number here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    Finite(f64),
    PosInf,
    NegInf,
}

#[derive(Clone, Debug)]
pub struct VarDef {
    pub key: VarKey,
    pub ty: VarType,
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
    pub description: Option<String>,
    /// Generator bindings that produced this instance, as `(symbol, value)`.
    pub origin: Vec<(String, String)>,
}

impl VarDef {
    pub fn new(key: VarKey, ty: VarType) -> Self {
        Self {
            key,
            ty,
            lower: None,
            upper: None,
            description: None,
            origin: vec![],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub name: String,
    pub lhs: Polynomial,
    pub op: CmpOp,
    pub rhs: Bound,
}

pub type Family = BTreeMap<Vec<Key>, VarDef>;

/// The problem under construction. Only the statement driver mutates it.
#[derive(Clone, Debug, Default)]
pub struct ModelStore {
    families: BTreeMap<String, Family>,
    constraints: Vec<Constraint>,
    constraint_names: HashSet<String>,
    objective: Polynomial,
    sense: ObjSense,
    cst_id: usize,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_variable(
        &mut self,
        key: VarKey,
        ty: VarType,
        lower: Option<Bound>,
        upper: Option<Bound>,
    ) -> Result<Polynomial, CodegenError> {
        let mut def = VarDef::new(key, ty);
        def.lower = lower;
        def.upper = upper;
        self.declare(def)
    }

    /// Registers a fully described variable. Same family with a new index tuple extends it.
    pub fn declare(&mut self, def: VarDef) -> Result<Polynomial, CodegenError> {
        let family = self.families.entry(def.key.family.clone()).or_default();
        if family.contains_key(&def.key.index) {
            return Err(CodegenError::DuplicateVariable(def.key));
        }
        let poly = Polynomial::variable(def.key.clone());
        family.insert(def.key.index.clone(), def);
        Ok(poly)
    }

    /// All registered instances of a family, or `None` if the family was never declared.
    pub fn get_variable_family(&self, name: &str) -> Option<&Family> {
        self.families.get(name)
    }

    pub fn lookup(&self, key: &VarKey) -> Option<&VarDef> {
        self.families.get(&key.family)?.get(&key.index)
    }

    pub fn variables(&self) -> impl Iterator<Item = &VarDef> {
        self.families.values().flat_map(|f| f.values())
    }

    pub fn num_variables(&self) -> usize {
        self.families.values().map(|f| f.len()).sum()
    }

    /// Stores a constraint and returns its final name. Unnamed constraints get `_c{n}`.
    ///
    /// Names are compared in their sanitized LP form, so `cap a` and `cap_a` clash.
    pub fn add_constraint(
        &mut self,
        name: Option<String>,
        lhs: Polynomial,
        op: CmpOp,
        rhs: Bound,
    ) -> Result<&Constraint, CodegenError> {
        let name = match name {
            Some(n) => {
                if self.constraint_names.contains(&sanitize(&n)) {
                    return Err(CodegenError::DuplicateConstraintName(n));
                }
                n
            }
            None => self.next_auto_name(),
        };
        self.constraint_names.insert(sanitize(&name));
        self.constraints.push(Constraint { name, lhs, op, rhs });
        let last = self.constraints.len() - 1;
        Ok(&self.constraints[last])
    }

    fn next_auto_name(&mut self) -> String {
        loop {
            let n = format!("_c{}", self.cst_id);
            self.cst_id += 1;
            if !self.constraint_names.contains(&n) {
                return n;
            }
        }
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn set_objective(&mut self, objective: Polynomial, sense: ObjSense) {
        self.objective = objective;
        self.sense = sense;
    }

    pub fn increment_objective(&mut self, delta: &Polynomial) {
        self.objective.add_inplace(delta);
    }

    pub fn set_sense(&mut self, sense: ObjSense) {
        self.sense = sense;
    }

    pub fn objective(&self) -> &Polynomial {
        &self.objective
    }

    pub fn sense(&self) -> ObjSense {
        self.sense
    }
}
