use crate::codegen::error::CodegenError;
use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// User-supplied constant data: the outermost layer of every binding lookup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Parses a JSON object; each top-level field becomes one parameter.
    pub fn from_json_str(s: &str) -> Result<Self, CodegenError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_reader<R: Read>(r: R) -> Result<Self, CodegenError> {
        Ok(serde_json::from_reader(r)?)
    }
}

/// Binding environment: generator bindings over model parameters.
///
/// Never mutated in place; `overlay` returns a fresh environment so sibling
/// expansions cannot observe each other's bindings.
#[derive(Clone, Debug)]
pub struct Env<'p> {
    bind: BTreeMap<String, Value>,
    /// insertion order of `bind`, used for provenance and diagnostics
    order: Vec<String>,
    params: &'p Parameters,
}

impl<'p> Env<'p> {
    pub fn new(params: &'p Parameters) -> Self {
        Self {
            bind: BTreeMap::new(),
            order: vec![],
            params,
        }
    }

    /// Generator bindings first, then parameters.
    pub fn resolve(&self, sym: &str) -> Result<&Value, CodegenError> {
        self.lookup(sym)
            .ok_or_else(|| CodegenError::UnknownSymbol(sym.to_string()))
    }

    pub fn lookup(&self, sym: &str) -> Option<&Value> {
        self.bind.get(sym).or_else(|| self.params.get(sym))
    }

    pub fn overlay(&self, sym: &str, value: Value) -> Env<'p> {
        let mut next = self.clone();
        if next.bind.insert(sym.to_string(), value).is_none() {
            next.order.push(sym.to_string());
        }
        next
    }

    /// Generator bindings in the order they were introduced.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order
            .iter()
            .filter_map(|s| self.bind.get(s).map(|v| (s.as_str(), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_shadow_params() {
        let params = Parameters::new().with("n", 4i64).with("i", 100i64);
        let env = Env::new(&params);
        assert_eq!(env.resolve("i").unwrap(), &Value::Num(100.0));
        let inner = env.overlay("i", Value::Num(1.0));
        assert_eq!(inner.resolve("i").unwrap(), &Value::Num(1.0));
        assert_eq!(inner.resolve("n").unwrap(), &Value::Num(4.0));
        // the outer environment is untouched
        assert_eq!(env.resolve("i").unwrap(), &Value::Num(100.0));
    }

    #[test]
    fn test_unknown_symbol() {
        let params = Parameters::new();
        let env = Env::new(&params).overlay("i", Value::Num(1.0));
        let err = env.resolve("j").unwrap_err();
        assert!(matches!(err, CodegenError::UnknownSymbol(s) if s == "j"));
    }

    #[test]
    fn test_sibling_overlays_are_isolated() {
        let params = Parameters::new();
        let base = Env::new(&params);
        let a = base.overlay("i", Value::Num(1.0));
        let b = base.overlay("j", Value::Num(2.0));
        assert!(a.lookup("j").is_none());
        assert!(b.lookup("i").is_none());
        let ab = a.overlay("j", Value::Num(3.0));
        let order: Vec<&str> = ab.bindings().map(|(s, _)| s).collect();
        assert_eq!(order, vec!["i", "j"]);
    }

    #[test]
    fn test_parameters_from_json() {
        let params = Parameters::from_json_str(r#"{"limit": {"calories": 2200}}"#).unwrap();
        assert!(matches!(params.get("limit"), Some(Value::Map(_))));
        assert!(matches!(
            Parameters::from_json_str("[1, 2]"),
            Err(CodegenError::Parameters(_))
        ));
    }
}
