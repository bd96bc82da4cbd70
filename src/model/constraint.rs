//! Constraint kinds of the finite-domain model.
//!
//! The set is closed: every backend translator handles exactly these kinds.

use std::sync::Arc;

use super::variables::VarId;

/// Relational operator between an integer expression and a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
}

impl Comparison {
    #[inline]
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Gt => lhs > rhs,
        }
    }

    /// Whether some value in `[lo, hi]` satisfies `value <op> rhs`.
    pub fn possible(self, lo: i64, hi: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lo <= rhs && rhs <= hi,
            Comparison::Ne => !(lo == hi && lo == rhs),
            Comparison::Le => lo <= rhs,
            Comparison::Lt => lo < rhs,
            Comparison::Ge => hi >= rhs,
            Comparison::Gt => hi > rhs,
        }
    }

    /// Whether every value in `[lo, hi]` satisfies `value <op> rhs`.
    pub fn certain(self, lo: i64, hi: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lo == hi && lo == rhs,
            Comparison::Ne => rhs < lo || rhs > hi,
            Comparison::Le => hi <= rhs,
            Comparison::Lt => hi < rhs,
            Comparison::Ge => lo >= rhs,
            Comparison::Gt => lo > rhs,
        }
    }

    /// Operator obtained when both sides are negated.
    pub fn flip(self) -> Self {
        match self {
            Comparison::Le => Comparison::Ge,
            Comparison::Lt => Comparison::Gt,
            Comparison::Ge => Comparison::Le,
            Comparison::Gt => Comparison::Lt,
            other => other,
        }
    }

    /// Operator spelling shared by the SMT-LIB and MiniZinc writers.
    /// `Ne` has no SMT-LIB operator and is spelled by the writers themselves.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Le => "<=",
            Comparison::Lt => "<",
            Comparison::Ge => ">=",
            Comparison::Gt => ">",
        }
    }
}

/// `var <cmp> value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub var: VarId,
    pub cmp: Comparison,
    pub value: i64,
}

impl Literal {
    pub fn new(var: VarId, cmp: Comparison, value: i64) -> Self {
        Literal { var, cmp, value }
    }

    pub fn eq(var: VarId, value: i64) -> Self {
        Self::new(var, Comparison::Eq, value)
    }

    #[inline]
    pub fn holds(&self, value: i64) -> bool {
        self.cmp.holds(value, self.value)
    }
}

/// A constraint in the finite-domain model.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// `sum(coef * var) <cmp> rhs`
    Linear {
        terms: Vec<(i64, VarId)>,
        cmp: Comparison,
        rhs: i64,
    },

    /// `premise => conclusion`
    Implication { premise: Literal, conclusion: Literal },

    /// Exactly one of `vars` takes `value`.
    ExactlyOne { vars: Vec<VarId>, value: i64 },

    /// `target == sum(table[index] for index in indices)`
    ElementSum {
        target: VarId,
        table: Arc<Vec<i64>>,
        indices: Vec<VarId>,
    },

    /// `target == sum(matrix[path[k]][path[k + 1]])`
    PathSum {
        target: VarId,
        matrix: Arc<Vec<Vec<i64>>>,
        path: Vec<VarId>,
    },

    /// `target == max(args)`
    Maximum { target: VarId, args: Vec<VarId> },

    /// `key(lhs) <= key(rhs)` where `key(x) = if x == sentinel { substitute } else { x }`
    SentinelLe {
        lhs: VarId,
        rhs: VarId,
        sentinel: i64,
        substitute: i64,
    },
}

impl Constraint {
    /// Variables whose value the constraint reads or defines.
    pub fn scope(&self) -> Vec<VarId> {
        match self {
            Constraint::Linear { terms, .. } => terms.iter().map(|&(_, v)| v).collect(),
            Constraint::Implication { premise, conclusion } => vec![premise.var, conclusion.var],
            Constraint::ExactlyOne { vars, .. } => vars.clone(),
            Constraint::ElementSum { target, indices, .. } => {
                std::iter::once(*target).chain(indices.iter().copied()).collect()
            }
            Constraint::PathSum { target, path, .. } => {
                std::iter::once(*target).chain(path.iter().copied()).collect()
            }
            Constraint::Maximum { target, args } => {
                std::iter::once(*target).chain(args.iter().copied()).collect()
            }
            Constraint::SentinelLe { lhs, rhs, .. } => vec![*lhs, *rhs],
        }
    }

    /// Variable functionally defined by this constraint, if any.
    pub fn defined_var(&self) -> Option<VarId> {
        match self {
            Constraint::ElementSum { target, .. }
            | Constraint::PathSum { target, .. }
            | Constraint::Maximum { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Variables a defining constraint reads, i.e. its scope minus the target.
    pub fn inputs(&self) -> &[VarId] {
        match self {
            Constraint::ElementSum { indices, .. } => indices,
            Constraint::PathSum { path, .. } => path,
            Constraint::Maximum { args, .. } => args,
            _ => &[],
        }
    }

    /// Short kind name used in logs and model statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::Linear { .. } => "linear",
            Constraint::Implication { .. } => "implication",
            Constraint::ExactlyOne { .. } => "exactly_one",
            Constraint::ElementSum { .. } => "element_sum",
            Constraint::PathSum { .. } => "path_sum",
            Constraint::Maximum { .. } => "maximum",
            Constraint::SentinelLe { .. } => "sentinel_le",
        }
    }
}

/// Objective function of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Minimize(VarId),
}

impl Objective {
    pub fn var(&self) -> VarId {
        match self {
            Objective::Minimize(var) => *var,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_intervals() {
        assert!(Comparison::Le.possible(3, 9, 3));
        assert!(!Comparison::Le.certain(3, 9, 3));
        assert!(Comparison::Le.certain(1, 3, 3));
        assert!(!Comparison::Eq.possible(4, 9, 3));
        assert!(Comparison::Ne.certain(4, 9, 3));
        assert!(!Comparison::Ne.possible(3, 3, 3));
        assert!(Comparison::Gt.possible(0, 4, 3));
        assert!(!Comparison::Gt.possible(0, 3, 3));
        assert_eq!(Comparison::Lt.flip(), Comparison::Gt);
        assert_eq!(Comparison::Ne.flip(), Comparison::Ne);
    }

    #[test]
    fn test_defined_var_and_scope() {
        let c = Constraint::Maximum { target: VarId(3), args: vec![VarId(0), VarId(1)] };
        assert_eq!(c.defined_var(), Some(VarId(3)));
        assert_eq!(c.scope(), vec![VarId(3), VarId(0), VarId(1)]);

        let l = Constraint::Implication {
            premise: Literal::eq(VarId(0), 2),
            conclusion: Literal::eq(VarId(1), 2),
        };
        assert_eq!(l.defined_var(), None);
        assert_eq!(l.kind(), "implication");
    }
}
