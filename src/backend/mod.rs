//! Solving backends for the finite-domain model.
//!
//! A [`Backend`] takes an [`FdModel`] and a time limit and answers with a
//! status and, when one was found, a full assignment. Backends that cannot
//! run in-process implement [`ModelTranslator`] instead and emit the model in
//! their own input language.

mod lp;
mod minizinc;
mod search;
mod smtlib;

pub use lp::LpWriter;
pub use minizinc::MiniZincWriter;
pub use search::SearchBackend;
pub use smtlib::SmtLibWriter;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{FdModel, VarId};

/// Configuration of a single backend call
#[derive(Debug, Clone)]
pub struct SolveConfig {
    /// Time limit in seconds
    pub time_limit: f64,
    /// Cooperative cancellation flag, checked alongside the time limit
    pub cancel: Option<Arc<AtomicBool>>,
    /// Search nodes between two time/cancellation checks
    pub check_interval: u64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        SolveConfig {
            time_limit: 300.0,
            cancel: None,
            check_interval: 1024,
        }
    }
}

impl SolveConfig {
    pub fn with_time_limit(time_limit: f64) -> Self {
        SolveConfig {
            time_limit,
            ..Default::default()
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Outcome class of a solve attempt. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Solution found and proven optimal
    Optimal,
    /// Solution found, optimality not proven within the limit
    Satisfiable,
    /// Proven to have no solution
    Unsatisfiable,
    /// Stopped before finding a solution or a proof
    Unknown,
}

impl SolveStatus {
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Satisfiable)
    }

    pub fn is_optimal(&self) -> bool {
        *self == SolveStatus::Optimal
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Satisfiable => "SAT",
            SolveStatus::Unsatisfiable => "UNSAT",
            SolveStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One value per model variable, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    values: Vec<i64>,
}

impl Assignment {
    pub fn new(values: Vec<i64>) -> Self {
        Assignment { values }
    }

    #[inline]
    pub fn value(&self, var: VarId) -> i64 {
        self.values[var.index()]
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a backend returns.
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    pub status: SolveStatus,
    /// Present exactly when `status.has_solution()`
    pub assignment: Option<Assignment>,
    pub objective: Option<i64>,
    /// Search nodes explored, if the backend counts them
    pub nodes: u64,
    pub elapsed: Duration,
}

/// An in-process solver for [`FdModel`]s.
pub trait Backend: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &str;

    /// Minimize the model's objective within `config.time_limit`.
    ///
    /// Returns `Err` only for malformed models; running out of time or
    /// proving infeasibility are reported through [`SolveStatus`].
    fn solve(&self, model: &FdModel, config: &SolveConfig) -> Result<BackendOutcome>;
}

/// Renders an [`FdModel`] in an external solver's input language.
pub trait ModelTranslator {
    /// File extension of the rendered model, without the dot
    fn extension(&self) -> &'static str;

    fn translate(&self, model: &FdModel) -> Result<String>;
}
