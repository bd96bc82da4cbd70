//! MCP Solver Library
//!
//! Modeling core for the Multiple Couriers Problem (MCP): `m` couriers with
//! capacities deliver `n` sized packages from a shared depot, and the longest
//! route is minimized.
//!
//! # Features
//!
//! - Instance parsing, validation and random generation
//! - Exact load and distance bounds with an early infeasibility verdict
//! - A solver-agnostic finite-domain model with optional symmetry breaking
//! - A built-in branch-and-bound backend plus SMT-LIB, MiniZinc and LP exporters
//! - Decoders from raw assignments to routes, and an independent checker
//! - JSON result files and batch statistics
//!
//! # Example
//!
//! ```no_run
//! use mcp_solver::instance::McpInstance;
//! use mcp_solver::solver::{best_solution, McpSolver, SolverConfig};
//!
//! let instance = McpInstance::from_file("inst01.dat").unwrap();
//!
//! let solver = McpSolver::new(SolverConfig::default());
//! let outcomes = solver.solve(&instance).unwrap();
//!
//! if let Some(best) = best_solution(&outcomes) {
//!     println!("Longest route: {}", best.objective);
//! }
//! ```

pub mod error;
pub mod instance;
pub mod bounds;
pub mod model;
pub mod backend;
pub mod decoder;
pub mod solution;
pub mod solver;
pub mod report;
pub mod benchmark;

pub use bounds::Bounds;
pub use error::{McpError, Result};
pub use instance::McpInstance;
pub use solution::McpSolution;
pub use solver::{Configuration, McpSolver, SolverConfig};
