use crate::codegen::binders::expand_generators;
use crate::codegen::constant::value_to_key;
use crate::codegen::env::Env;
use crate::codegen::error::CodegenError;
use crate::codegen::eval::{reduce, reduce_rhs, Rhs};
use crate::codegen::interp::interpolate;
use crate::codegen::store::{Bound, ModelStore, VarDef, VarKey};
use crate::{ConstraintDecl, Expr, ObjectiveDecl, ProblemSpec, Stmt, VarDecl};

/// Statement driver: folds each declaration into the model store, one at a time.
pub(crate) struct Emitter<'p> {
    env: Env<'p>,
    store: ModelStore,
}

impl<'p> Emitter<'p> {
    pub(crate) fn new(env: Env<'p>) -> Self {
        Self {
            env,
            store: ModelStore::new(),
        }
    }

    pub(crate) fn into_store(self) -> ModelStore {
        self.store
    }

    pub(crate) fn emit_model(&mut self, spec: &ProblemSpec) -> Result<(), CodegenError> {
        for st in &spec.stmts {
            self.emit_stmt(st)?;
        }
        Ok(())
    }

    pub(crate) fn emit_stmt(&mut self, st: &Stmt) -> Result<(), CodegenError> {
        match st {
            Stmt::Variables(d) => self.emit_variables(d),
            Stmt::Constraint(d) => self.emit_constraint(d),
            Stmt::Objective(d) => self.emit_objective(d),
        }
    }

    fn emit_variables(&mut self, decl: &VarDecl) -> Result<(), CodegenError> {
        // bindings are fully expanded against the store before it is written to
        let envs = expand_generators(&decl.generators, &self.env, &self.store)?;
        let count = envs.len();
        for env in envs {
            let mut index = Vec::with_capacity(decl.generators.len());
            for g in &decl.generators {
                index.push(value_to_key(env.resolve(&g.sym)?)?);
            }
            let mut def = VarDef::new(VarKey::new(decl.name.clone(), index), decl.ty);
            def.lower = self.bound(decl.lower.as_ref(), &env)?;
            def.upper = self.bound(decl.upper.as_ref(), &env)?;
            def.description = decl
                .description
                .as_deref()
                .map(|t| interpolate(t, &env))
                .transpose()?;
            def.origin = env
                .bindings()
                .map(|(s, v)| (s.to_string(), v.to_string()))
                .collect();
            self.store.declare(def)?;
        }
        tracing::debug!(family = %decl.name, count, "declared variables");
        Ok(())
    }

    fn bound(&self, e: Option<&Expr>, env: &Env) -> Result<Option<Bound>, CodegenError> {
        let Some(e) = e else { return Ok(None) };
        match reduce_rhs(e, env, &self.store)? {
            Rhs::Unbounded(b) => Ok(Some(b)),
            Rhs::Poly(p) => p
                .as_constant()
                .map(|v| Some(Bound::Finite(v)))
                .ok_or_else(|| CodegenError::InvalidBound { expr: e.to_string() }),
        }
    }

    fn emit_constraint(&mut self, decl: &ConstraintDecl) -> Result<(), CodegenError> {
        let envs = expand_generators(&decl.generators, &self.env, &self.store)?;
        let count = envs.len();
        for env in envs {
            let lhs = reduce(&decl.lhs, &env, &self.store)?;
            // variables to the left, constants to the right
            let (lhs, rhs) = match reduce_rhs(&decl.rhs, &env, &self.store)? {
                Rhs::Poly(r) => {
                    let (lhs, c) = lhs.sub(&r).split_constant();
                    (lhs, Bound::Finite(-c))
                }
                Rhs::Unbounded(b) => (lhs.split_constant().0, b),
            };
            let name = decl
                .name
                .as_deref()
                .map(|t| interpolate(t, &env))
                .transpose()?;
            let c = self.store.add_constraint(name, lhs, decl.op, rhs)?;
            tracing::trace!(name = %c.name, terms = c.lhs.num_terms(), "constraint");
        }
        tracing::debug!(
            template = decl.name.as_deref().unwrap_or("<anonymous>"),
            count,
            "added constraints"
        );
        Ok(())
    }

    fn emit_objective(&mut self, decl: &ObjectiveDecl) -> Result<(), CodegenError> {
        if let Some(sense) = decl.sense {
            self.store.set_sense(sense);
        }
        let Some(body) = &decl.body else {
            return Ok(());
        };
        let p = reduce(body, &self.env, &self.store)?;
        tracing::debug!(terms = p.num_terms(), increment = decl.increment, "objective");
        if decl.increment {
            self.store.increment_objective(&p);
        } else {
            let sense = self.store.sense();
            self.store.set_objective(p, sense);
        }
        Ok(())
    }
}
