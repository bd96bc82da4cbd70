//! Solve orchestration: bounds, model, backend, decoding and checking.
//!
//! One instance is solved under several configurations (symmetry breaking on
//! or off). Each configuration builds its own model, so the runs share no
//! mutable state and go through rayon in parallel.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, SearchBackend, SolveConfig, SolveStatus};
use crate::bounds::Bounds;
use crate::error::{McpError, Result};
use crate::instance::McpInstance;
use crate::model::{ModelBuilder, SymmetryBreaking};
use crate::solution::McpSolution;

/// A named model variant, used as the key of result files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    pub symmetry_breaking: SymmetryBreaking,
}

impl Configuration {
    pub fn new(name: &str, symmetry_breaking: SymmetryBreaking) -> Self {
        Configuration {
            name: name.to_string(),
            symmetry_breaking,
        }
    }

    /// Plain and symmetry-broken runs
    pub fn standard() -> Vec<Self> {
        vec![
            Configuration::new("search", SymmetryBreaking::None),
            Configuration::new("search_sb", SymmetryBreaking::Lexicographic),
        ]
    }

    pub fn all() -> Vec<Self> {
        let mut configurations = Self::standard();
        configurations.push(Configuration::new("search_sb_load", SymmetryBreaking::LoadOrdered));
        configurations
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|c| c.name == name)
    }

    /// Parse a comma-separated list such as `search,search_sb`
    pub fn parse_list(names: &str) -> Result<Vec<Self>> {
        names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                Self::from_name(name).ok_or_else(|| {
                    McpError::Config(format!(
                        "unknown configuration '{}' (expected one of: search, search_sb, search_sb_load)",
                        name
                    ))
                })
            })
            .collect()
    }
}

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub solve: SolveConfig,
    pub configurations: Vec<Configuration>,
    /// Run configurations in parallel
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            solve: SolveConfig::default(),
            configurations: Configuration::standard(),
            parallel: true,
        }
    }
}

/// Result of one configuration on one instance
#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    pub configuration: String,
    pub status: SolveStatus,
    pub solution: Option<McpSolution>,
    /// Wall-clock seconds, model building included
    pub elapsed: f64,
    pub nodes: u64,
    /// Why this configuration failed; the other configurations are unaffected
    pub error: Option<String>,
}

impl SolveOutcome {
    fn failed(configuration: &str, error: &McpError, elapsed: f64) -> Self {
        SolveOutcome {
            configuration: configuration.to_string(),
            status: SolveStatus::Unknown,
            solution: None,
            elapsed,
            nodes: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Drives a backend over every configuration
pub struct McpSolver {
    backend: Box<dyn Backend>,
    config: SolverConfig,
}

impl McpSolver {
    /// Solver using the built-in branch-and-bound backend
    pub fn new(config: SolverConfig) -> Self {
        Self::with_backend(Box::new(SearchBackend::new()), config)
    }

    pub fn with_backend(backend: Box<dyn Backend>, config: SolverConfig) -> Self {
        McpSolver { backend, config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve an instance under every configuration.
    ///
    /// Fails before any search on malformed instances or contradictory bounds.
    /// A configuration that fails afterwards is reported in its own outcome.
    pub fn solve(&self, instance: &McpInstance) -> Result<Vec<SolveOutcome>> {
        let bounds = Bounds::compute(instance)?;
        log::info!(
            "Solving {} (m={}, n={}) with {} configuration(s) on backend '{}'",
            instance.name,
            instance.num_couriers(),
            instance.num_packages(),
            self.config.configurations.len(),
            self.backend.name()
        );

        let run = |configuration: &Configuration| {
            let start = Instant::now();
            self.solve_configuration(instance, &bounds, configuration)
                .unwrap_or_else(|e| {
                    log::error!("{} [{}]: {}", instance.name, configuration.name, e);
                    SolveOutcome::failed(&configuration.name, &e, start.elapsed().as_secs_f64())
                })
        };
        let outcomes = if self.config.parallel {
            self.config.configurations.par_iter().map(run).collect()
        } else {
            self.config.configurations.iter().map(run).collect()
        };
        Ok(outcomes)
    }

    /// Build, solve, decode and check one configuration
    pub fn solve_configuration(
        &self,
        instance: &McpInstance,
        bounds: &Bounds,
        configuration: &Configuration,
    ) -> Result<SolveOutcome> {
        let start = Instant::now();
        let route = ModelBuilder::new(instance, bounds)
            .with_symmetry_breaking(configuration.symmetry_breaking)
            .build()?;
        let outcome = self.backend.solve(&route.model, &self.config.solve)?;
        let elapsed = start.elapsed().as_secs_f64();

        let solution = match &outcome.assignment {
            Some(assignment) if outcome.status.has_solution() => {
                let routes = route.decode(assignment)?;
                let mut solution = McpSolution::from_routes(instance, routes, &configuration.name);
                solution.optimal = outcome.status.is_optimal();
                solution.computation_time = elapsed;

                let violations = solution.validate(instance);
                if !violations.is_empty() {
                    let details: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                    log::warn!("{} [{}]: checker rejected solution", instance.name, configuration.name);
                    return Err(McpError::MalformedAssignment(details.join("; ")));
                }
                let model_objective = route.objective_value(assignment)?;
                if model_objective != solution.objective {
                    return Err(McpError::MalformedAssignment(format!(
                        "model objective {} differs from decoded objective {}",
                        model_objective, solution.objective
                    )));
                }
                Some(solution)
            }
            _ => None,
        };

        log::info!(
            "{} [{}]: {} obj={} in {:.3}s ({} nodes)",
            instance.name,
            configuration.name,
            outcome.status,
            solution
                .as_ref()
                .map(|s| s.objective.to_string())
                .unwrap_or_else(|| "-".to_string()),
            elapsed,
            outcome.nodes
        );

        Ok(SolveOutcome {
            configuration: configuration.name.clone(),
            status: outcome.status,
            solution,
            elapsed,
            nodes: outcome.nodes,
            error: None,
        })
    }
}

/// Best solution among outcomes: lowest objective, proven optimal first on ties
pub fn best_solution(outcomes: &[SolveOutcome]) -> Option<&McpSolution> {
    outcomes
        .iter()
        .filter_map(|o| o.solution.as_ref())
        .min_by_key(|s| (s.objective, !s.optimal))
}
