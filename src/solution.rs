//! Solution representation and checking for the MCP.
//!
//! A solution is one ordered list of 1-based package IDs per courier. The
//! checker here only looks at the instance data, never at the model that
//! produced the routes, so it also validates results read back from disk.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instance::McpInstance;

/// Represents a solution to the MCP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpSolution {
    /// Routes as 1-based package IDs in visit order, one per courier
    pub routes: Vec<Vec<usize>>,
    /// Length of each route from the depot and back
    pub route_distances: Vec<i64>,
    /// Longest route, the minimized objective
    pub objective: i64,
    /// Whether the objective was proven optimal
    pub optimal: bool,
    /// Configuration that produced this solution
    pub configuration: String,
    /// Computation time in seconds
    pub computation_time: f64,
}

impl McpSolution {
    /// Create a solution from routes, computing the distances and objective
    pub fn from_routes(instance: &McpInstance, routes: Vec<Vec<usize>>, configuration: &str) -> Self {
        let route_distances: Vec<i64> = routes.iter().map(|r| instance.route_distance(r)).collect();
        let objective = route_distances.iter().copied().max().unwrap_or(0);
        McpSolution {
            routes,
            route_distances,
            objective,
            optimal: false,
            configuration: configuration.to_string(),
            computation_time: 0.0,
        }
    }

    /// Number of couriers that leave the depot
    pub fn active_couriers(&self) -> usize {
        self.routes.iter().filter(|r| !r.is_empty()).count()
    }

    /// Sum of all route lengths
    pub fn total_distance(&self) -> i64 {
        self.route_distances.iter().sum()
    }

    pub fn loads(&self, instance: &McpInstance) -> Vec<i64> {
        self.routes.iter().map(|r| instance.route_load(r)).collect()
    }

    /// Check the solution against the instance. Empty when valid.
    pub fn validate(&self, instance: &McpInstance) -> Vec<Violation> {
        check_routes(instance, &self.routes, Some(self.objective))
    }

    pub fn is_valid(&self, instance: &McpInstance) -> bool {
        self.validate(instance).is_empty()
    }
}

/// A way in which routes fail to solve an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    CourierCountMismatch { expected: usize, found: usize },
    MissingPackage(usize),
    DuplicatePackage(usize),
    UnknownPackage(usize),
    CapacityExceeded { courier: usize, load: i64, capacity: i64 },
    ObjectiveMismatch { reported: i64, actual: i64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::CourierCountMismatch { expected, found } => {
                write!(f, "expected {} routes, found {}", expected, found)
            }
            Violation::MissingPackage(p) => write!(f, "package {} is not delivered", p),
            Violation::DuplicatePackage(p) => write!(f, "package {} is delivered more than once", p),
            Violation::UnknownPackage(p) => write!(f, "package {} does not exist", p),
            Violation::CapacityExceeded { courier, load, capacity } => {
                write!(f, "courier {} carries {} over capacity {}", courier, load, capacity)
            }
            Violation::ObjectiveMismatch { reported, actual } => {
                write!(f, "objective {} does not match the longest route {}", reported, actual)
            }
        }
    }
}

/// Check 1-based routes against an instance: route count, coverage,
/// uniqueness, capacity and, when given, the reported objective.
pub fn check_routes(instance: &McpInstance, routes: &[Vec<usize>], objective: Option<i64>) -> Vec<Violation> {
    let mut violations = Vec::new();
    let n = instance.num_packages();

    if routes.len() != instance.num_couriers() {
        violations.push(Violation::CourierCountMismatch {
            expected: instance.num_couriers(),
            found: routes.len(),
        });
    }

    let mut seen = HashSet::new();
    for route in routes {
        for &package in route {
            if package == 0 || package > n {
                violations.push(Violation::UnknownPackage(package));
            } else if !seen.insert(package) {
                violations.push(Violation::DuplicatePackage(package));
            }
        }
    }
    for package in 1..=n {
        if !seen.contains(&package) {
            violations.push(Violation::MissingPackage(package));
        }
    }

    // Distances and loads are only meaningful over known packages
    if violations.iter().any(|v| matches!(v, Violation::UnknownPackage(_))) {
        return violations;
    }

    for (i, route) in routes.iter().enumerate().take(instance.num_couriers()) {
        let load = instance.route_load(route);
        if load > instance.capacities[i] {
            violations.push(Violation::CapacityExceeded {
                courier: i + 1,
                load,
                capacity: instance.capacities[i],
            });
        }
    }

    if let Some(reported) = objective {
        let actual = routes.iter().map(|r| instance.route_distance(r)).max().unwrap_or(0);
        if reported != actual {
            violations.push(Violation::ObjectiveMismatch { reported, actual });
        }
    }

    violations
}

impl fmt::Display for McpSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solution ({})", self.configuration)?;
        writeln!(f, "  Max distance: {}", self.objective)?;
        writeln!(f, "  Optimal: {}", self.optimal)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        for (i, route) in self.routes.iter().enumerate() {
            let distance = self.route_distances.get(i).copied().unwrap_or(0);
            writeln!(f, "  Courier {}: {:?} (distance {})", i + 1, route, distance)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> McpInstance {
        let distances = (0..4)
            .map(|i| (0..4).map(|j| if i == j { 0 } else { 1 }).collect())
            .collect();
        McpInstance::new("ones", vec![6, 3], vec![3, 3, 3], distances).unwrap()
    }

    #[test]
    fn test_solution_creation() {
        let inst = instance();
        let sol = McpSolution::from_routes(&inst, vec![vec![1, 2], vec![3]], "search");
        assert_eq!(sol.route_distances, vec![3, 2]);
        assert_eq!(sol.objective, 3);
        assert_eq!(sol.total_distance(), 5);
        assert_eq!(sol.active_couriers(), 2);
        assert_eq!(sol.loads(&inst), vec![6, 3]);
        assert!(!sol.optimal);
        assert!(sol.is_valid(&inst));
    }

    #[test]
    fn test_empty_routes() {
        let inst = McpInstance::new("empty", vec![1, 1], vec![], vec![vec![0]]).unwrap();
        let sol = McpSolution::from_routes(&inst, vec![vec![], vec![]], "search");
        assert_eq!(sol.objective, 0);
        assert_eq!(sol.active_couriers(), 0);
        assert!(sol.is_valid(&inst));
    }

    #[test]
    fn test_coverage_and_uniqueness() {
        let inst = instance();
        let violations = check_routes(&inst, &[vec![1, 1], vec![]], None);
        assert!(violations.contains(&Violation::DuplicatePackage(1)));
        assert!(violations.contains(&Violation::MissingPackage(2)));
        assert!(violations.contains(&Violation::MissingPackage(3)));

        let violations = check_routes(&inst, &[vec![1, 2, 4], vec![3]], None);
        assert_eq!(violations, vec![Violation::UnknownPackage(4)]);
    }

    #[test]
    fn test_capacity_and_objective() {
        let inst = instance();
        let violations = check_routes(&inst, &[vec![1], vec![2, 3]], Some(2));
        assert_eq!(
            violations,
            vec![
                Violation::CapacityExceeded { courier: 2, load: 6, capacity: 3 },
                Violation::ObjectiveMismatch { reported: 2, actual: 3 },
            ]
        );
    }

    #[test]
    fn test_courier_count() {
        let inst = instance();
        let violations = check_routes(&inst, &[vec![1, 2], vec![3], vec![]], None);
        assert_eq!(violations, vec![Violation::CourierCountMismatch { expected: 2, found: 3 }]);
    }
}
