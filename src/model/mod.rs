//! Solver-agnostic finite-domain model.
//!
//! A model is a set of named integer variables with explicit domains, a
//! closed set of constraint kinds over them, and a single variable to
//! minimize. It is purely declarative: backends either search it directly
//! ([`crate::backend::SearchBackend`]) or translate it through a
//! [`ModelVisitor`] into their own language.
//!
//! # Key Components
//!
//! - [`FdModel`]: container for variables, constraints and the objective
//! - [`ModelBuilder`]: builds the MCP route model of an instance
//! - [`SymmetryBreaking`]: optional courier-permutation pruning

mod builder;
mod constraint;
mod symmetry;
mod variables;

pub use builder::{ModelBuilder, RouteModel};
pub use constraint::{Comparison, Constraint, Literal, Objective};
pub use symmetry::SymmetryBreaking;
pub use variables::{IntVar, VarId};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{McpError, Result};

/// Walks a model constraint by constraint. One implementation per backend language.
pub trait ModelVisitor {
    fn visit_var(&mut self, id: VarId, var: &IntVar);
    fn visit_linear(&mut self, terms: &[(i64, VarId)], cmp: Comparison, rhs: i64);
    fn visit_implication(&mut self, premise: &Literal, conclusion: &Literal);
    fn visit_exactly_one(&mut self, vars: &[VarId], value: i64);
    fn visit_element_sum(&mut self, target: VarId, table: &Arc<Vec<i64>>, indices: &[VarId]);
    fn visit_path_sum(&mut self, target: VarId, matrix: &Arc<Vec<Vec<i64>>>, path: &[VarId]);
    fn visit_maximum(&mut self, target: VarId, args: &[VarId]);
    fn visit_sentinel_le(&mut self, lhs: VarId, rhs: VarId, sentinel: i64, substitute: i64);
    fn visit_objective(&mut self, objective: &Objective);
}

/// A finite-domain model: variables, constraints and objective.
#[derive(Debug, Clone)]
pub struct FdModel {
    /// Model name.
    pub name: String,
    vars: Vec<IntVar>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl FdModel {
    /// Creates a new empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    /// Adds an integer variable and returns its handle.
    pub fn add_var(&mut self, var: IntVar) -> VarId {
        self.vars.push(var);
        VarId(self.vars.len() - 1)
    }

    pub fn var(&self, id: VarId) -> &IntVar {
        &self.vars[id.0]
    }

    pub fn vars(&self) -> &[IntVar] {
        &self.vars
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.vars.iter().position(|v| v.name == name).map(VarId)
    }

    /// Adds a constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Convenience: add `sum(coef * var) <cmp> rhs`.
    pub fn add_linear(&mut self, terms: Vec<(i64, VarId)>, cmp: Comparison, rhs: i64) {
        self.add_constraint(Constraint::Linear { terms, cmp, rhs });
    }

    /// Convenience: add `premise => conclusion`.
    pub fn add_implication(&mut self, premise: Literal, conclusion: Literal) {
        self.add_constraint(Constraint::Implication { premise, conclusion });
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Sets the objective function.
    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = Some(objective);
    }

    pub fn objective(&self) -> Option<Objective> {
        self.objective
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of constraints of each kind.
    pub fn constraint_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.constraints {
            *counts.entry(c.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Validates the model for consistency.
    ///
    /// Checks names, domains, variable references, table shapes and the objective.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for var in &self.vars {
            if !names.insert(var.name.as_str()) {
                return Err(McpError::InvalidModel(format!("duplicate variable name: {}", var.name)));
            }
            if var.min > var.max {
                return Err(McpError::InvalidModel(format!(
                    "empty domain for {}: [{}, {}]",
                    var.name, var.min, var.max
                )));
            }
        }

        for (idx, constraint) in self.constraints.iter().enumerate() {
            for id in constraint.scope() {
                if id.0 >= self.vars.len() {
                    return Err(McpError::InvalidModel(format!(
                        "constraint {} ({}) references undefined variable #{}",
                        idx,
                        constraint.kind(),
                        id.0
                    )));
                }
            }
            match constraint {
                Constraint::Linear { terms, .. } if terms.is_empty() => {
                    return Err(McpError::InvalidModel(format!("constraint {} has no terms", idx)));
                }
                Constraint::ElementSum { table, indices, .. } => {
                    for &index in indices {
                        self.check_index_domain(index, table.len())?;
                    }
                }
                Constraint::PathSum { matrix, path, .. } => {
                    if matrix.iter().any(|row| row.len() != matrix.len()) {
                        return Err(McpError::InvalidModel(format!("constraint {} has a non-square matrix", idx)));
                    }
                    for &step in path {
                        self.check_index_domain(step, matrix.len())?;
                    }
                }
                Constraint::Maximum { args, .. } if args.is_empty() => {
                    return Err(McpError::InvalidModel(format!("constraint {} takes the maximum of nothing", idx)));
                }
                _ => {}
            }
        }

        match self.objective {
            Some(objective) if objective.var().0 < self.vars.len() => Ok(()),
            Some(_) => Err(McpError::InvalidModel("objective references an undefined variable".into())),
            None => Err(McpError::InvalidModel("no objective".into())),
        }
    }

    fn check_index_domain(&self, id: VarId, len: usize) -> Result<()> {
        let var = &self.vars[id.0];
        if var.min < 0 || var.max >= len as i64 {
            return Err(McpError::InvalidModel(format!(
                "{} ranges over [{}, {}] but indexes a table of length {}",
                var.name, var.min, var.max, len
            )));
        }
        Ok(())
    }

    /// Feed every variable, constraint and the objective to a visitor, in insertion order.
    pub fn walk<V: ModelVisitor>(&self, visitor: &mut V) {
        for (idx, var) in self.vars.iter().enumerate() {
            visitor.visit_var(VarId(idx), var);
        }
        for constraint in &self.constraints {
            match constraint {
                Constraint::Linear { terms, cmp, rhs } => visitor.visit_linear(terms, *cmp, *rhs),
                Constraint::Implication { premise, conclusion } => {
                    visitor.visit_implication(premise, conclusion)
                }
                Constraint::ExactlyOne { vars, value } => visitor.visit_exactly_one(vars, *value),
                Constraint::ElementSum { target, table, indices } => {
                    visitor.visit_element_sum(*target, table, indices)
                }
                Constraint::PathSum { target, matrix, path } => {
                    visitor.visit_path_sum(*target, matrix, path)
                }
                Constraint::Maximum { target, args } => visitor.visit_maximum(*target, args),
                Constraint::SentinelLe { lhs, rhs, sentinel, substitute } => {
                    visitor.visit_sentinel_le(*lhs, *rhs, *sentinel, *substitute)
                }
            }
        }
        if let Some(objective) = &self.objective {
            visitor.visit_objective(objective);
        }
    }
}
