use crate::codegen::poly::Polynomial;
use crate::codegen::store::{sanitize, Bound, ModelStore, VarDef, VarKey};
use crate::{fmt_num, CmpOp, ObjSense, VarType};
use std::collections::{HashMap, HashSet};

/// One LP identifier per variable. Keys whose readable names collide after
/// sanitizing get a `_{n}` suffix, assigned in sorted key order.
#[derive(Debug, Default)]
struct LpNames {
    by_key: HashMap<VarKey, String>,
    taken: HashSet<String>,
}

impl LpNames {
    fn for_store(store: &ModelStore) -> Self {
        let mut names = Self::default();
        for v in store.variables() {
            names.assign(&v.key);
        }
        names
    }

    fn assign(&mut self, key: &VarKey) -> &str {
        if !self.by_key.contains_key(key) {
            let base = key.lp_name();
            let mut name = base.clone();
            let mut n = 1;
            while self.taken.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            self.taken.insert(name.clone());
            self.by_key.insert(key.clone(), name);
        }
        &self.by_key[key]
    }
}

/// Renders the store as CPLEX-LP text (readable by SCIP, CBC, HiGHS).
///
/// Distinct variables always get distinct identifiers. Constraint names are
/// already unique after sanitizing (see `ModelStore::add_constraint`).
pub fn to_lp_string(store: &ModelStore) -> String {
    let mut names = LpNames::for_store(store);
    let mut out = String::new();
    match store.sense() {
        ObjSense::Minimize => out.push_str("Minimize\n obj: "),
        ObjSense::Maximize => out.push_str("Maximize\n obj: "),
    }
    out.push_str(&fmt_lin(store.objective(), true, &mut names));
    out.push('\n');

    out.push_str("Subject To\n");
    for c in store.constraints() {
        out.push_str(&format!(
            " {}: {} {} {}\n",
            sanitize(&c.name),
            fmt_lin(&c.lhs, false, &mut names),
            fmt_op(c.op),
            fmt_bound(c.rhs)
        ));
    }

    let bounds: Vec<String> = store
        .variables()
        .filter_map(|v| fmt_var_bounds(v, &mut names))
        .collect();
    if !bounds.is_empty() {
        out.push_str("Bounds\n");
        for b in bounds {
            out.push_str(&format!(" {}\n", b));
        }
    }

    section(&mut out, "General", store, VarType::Integer, &mut names);
    section(&mut out, "Binary", store, VarType::Binary, &mut names);
    out.push_str("End\n");
    out
}

fn section(out: &mut String, title: &str, store: &ModelStore, ty: VarType, names: &mut LpNames) {
    let list: Vec<String> = store
        .variables()
        .filter(|v| v.ty == ty)
        .map(|v| names.assign(&v.key).to_string())
        .collect();
    if list.is_empty() {
        return;
    }
    out.push_str(title);
    out.push('\n');
    for n in list {
        out.push_str(&format!(" {}\n", n));
    }
}

fn fmt_op(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Le => "<=",
        CmpOp::Ge => ">=",
        CmpOp::Eq => "=",
    }
}

fn fmt_bound(b: Bound) -> String {
    match b {
        Bound::Finite(v) => fmt_num(v),
        Bound::PosInf => "+inf".to_string(),
        Bound::NegInf => "-inf".to_string(),
    }
}

/// Binary variables carry their bounds implicitly. Unset bounds keep the LP defaults `[0, +inf)`.
fn fmt_var_bounds(v: &VarDef, names: &mut LpNames) -> Option<String> {
    if v.ty == VarType::Binary {
        return None;
    }
    let name = names.assign(&v.key);
    match (v.lower, v.upper) {
        (None, None) => None,
        (Some(Bound::NegInf), None | Some(Bound::PosInf)) => Some(format!("{} free", name)),
        (Some(lo), None) => Some(format!("{} >= {}", name, fmt_bound(lo))),
        (None, Some(up)) => Some(format!("{} <= {}", name, fmt_bound(up))),
        (Some(lo), Some(up)) => Some(format!("{} <= {} <= {}", fmt_bound(lo), name, fmt_bound(up))),
    }
}

fn fmt_coeff(c: f64) -> String {
    if c < 0.0 {
        format!("-{}", fmt_num(-c))
    } else {
        format!("+{}", fmt_num(c))
    }
}

fn fmt_lin(p: &Polynomial, with_constant: bool, names: &mut LpNames) -> String {
    let mut parts: Vec<String> = p
        .terms()
        .map(|(k, c)| format!("{} {}", fmt_coeff(c), names.assign(k)))
        .collect();
    if parts.is_empty() {
        parts.push("+0".to_string());
    }
    let c = p.constant_term();
    if with_constant && c != 0.0 {
        parts.push(fmt_coeff(c));
    }
    parts.join(" ")
}
