//! Symmetry breaking between interchangeable couriers.
//!
//! Two couriers with the same capacity can swap routes without changing the
//! objective, so every solution has equivalent copies. The constraints added
//! here keep at least one representative of every distinct-cost solution.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constraint::{Comparison, Constraint};
use super::variables::VarId;
use super::FdModel;

/// Which symmetry-breaking constraints to add to a route model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SymmetryBreaking {
    #[default]
    None,
    /// Order equal-capacity couriers by their first stop.
    Lexicographic,
    /// `Lexicographic`, plus smaller-capacity couriers never carry more than
    /// larger-capacity ones.
    LoadOrdered,
}

impl SymmetryBreaking {
    pub fn name(&self) -> &'static str {
        match self {
            SymmetryBreaking::None => "none",
            SymmetryBreaking::Lexicographic => "lex",
            SymmetryBreaking::LoadOrdered => "load",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "none" | "off" => Some(SymmetryBreaking::None),
            "lex" | "lexicographic" => Some(SymmetryBreaking::Lexicographic),
            "load" | "load-ordered" | "load_ordered" => Some(SymmetryBreaking::LoadOrdered),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != SymmetryBreaking::None
    }

    /// Add this mode's constraints and return how many were added.
    ///
    /// `first_stops[i]` is courier `i`'s slot 1; the value `depot` there means
    /// the courier stays home. An idle courier compares as `-1`, so idle
    /// couriers come first within a capacity class.
    pub fn apply(
        &self,
        model: &mut FdModel,
        capacities: &[i64],
        first_stops: &[VarId],
        loads: &[VarId],
        depot: usize,
    ) -> usize {
        let before = model.constraint_count();
        if !self.is_enabled() {
            return 0;
        }

        let m = capacities.len();
        for i1 in 0..m {
            for i2 in (i1 + 1)..m {
                if capacities[i1] == capacities[i2] {
                    model.add_constraint(Constraint::SentinelLe {
                        lhs: first_stops[i1],
                        rhs: first_stops[i2],
                        sentinel: depot as i64,
                        substitute: -1,
                    });
                }
            }
        }

        if *self == SymmetryBreaking::LoadOrdered {
            // Strict only: equal capacities are already ordered above
            for i1 in 0..m {
                for i2 in 0..m {
                    if capacities[i1] < capacities[i2] {
                        model.add_linear(vec![(1, loads[i1]), (-1, loads[i2])], Comparison::Le, 0);
                    }
                }
            }
        }

        let added = model.constraint_count() - before;
        log::debug!("symmetry breaking '{}' added {} constraints", self.name(), added);
        added
    }
}

impl fmt::Display for SymmetryBreaking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
