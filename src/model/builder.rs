//! Route model construction.
//!
//! A route is a row of slots `position[i][0..=slot_bound]` holding location
//! indices, with the depot `n` in the first and last slot. Packages appear in
//! exactly one interior slot overall and a courier that has returned to the
//! depot stays there.

use std::sync::Arc;

use crate::backend::Assignment;
use crate::bounds::Bounds;
use crate::decoder;
use crate::error::{McpError, Result};
use crate::instance::McpInstance;

use super::constraint::{Comparison, Constraint, Literal, Objective};
use super::symmetry::SymmetryBreaking;
use super::variables::{IntVar, VarId};
use super::FdModel;

/// A built route model together with handles to its variable groups.
#[derive(Debug, Clone)]
pub struct RouteModel {
    pub model: FdModel,
    /// `positions[i][k]`, courier-major
    pub positions: Vec<Vec<VarId>>,
    pub loads: Vec<VarId>,
    pub route_distances: Vec<VarId>,
    pub max_distance: VarId,
    pub slot_bound: usize,
    pub depot: usize,
}

impl RouteModel {
    /// A backend assignment must carry one value per model variable.
    fn check_assignment(&self, assignment: &Assignment) -> Result<()> {
        if assignment.len() != self.model.var_count() {
            return Err(McpError::MalformedAssignment(format!(
                "assignment has {} values but model {} has {} variables",
                assignment.len(),
                self.model.name,
                self.model.var_count()
            )));
        }
        Ok(())
    }

    /// Raw slot values of every courier from a backend assignment.
    pub fn extract_positions(&self, assignment: &Assignment) -> Result<Vec<Vec<i64>>> {
        self.check_assignment(assignment)?;
        Ok(self
            .positions
            .iter()
            .map(|row| row.iter().map(|&var| assignment.value(var)).collect())
            .collect())
    }

    /// Decode an assignment into 1-based routes.
    pub fn decode(&self, assignment: &Assignment) -> Result<Vec<Vec<usize>>> {
        decoder::decode_positions(&self.extract_positions(assignment)?, self.depot)
    }

    pub fn route_distance_values(&self, assignment: &Assignment) -> Result<Vec<i64>> {
        self.check_assignment(assignment)?;
        Ok(self.route_distances.iter().map(|&var| assignment.value(var)).collect())
    }

    pub fn objective_value(&self, assignment: &Assignment) -> Result<i64> {
        self.check_assignment(assignment)?;
        Ok(assignment.value(self.max_distance))
    }
}

/// Builds the finite-domain model of one instance.
///
/// Each call to [`ModelBuilder::build`] allocates a fresh model, so builders
/// can run concurrently for different configurations.
pub struct ModelBuilder<'a> {
    instance: &'a McpInstance,
    bounds: &'a Bounds,
    symmetry: SymmetryBreaking,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(instance: &'a McpInstance, bounds: &'a Bounds) -> Self {
        ModelBuilder {
            instance,
            bounds,
            symmetry: SymmetryBreaking::None,
        }
    }

    pub fn with_symmetry_breaking(mut self, symmetry: SymmetryBreaking) -> Self {
        self.symmetry = symmetry;
        self
    }

    pub fn build(&self) -> Result<RouteModel> {
        let instance = self.instance;
        let bounds = self.bounds;
        let m = instance.num_couriers();
        let n = instance.num_packages();
        let depot = n;
        let depot_value = depot as i64;
        let slot_bound = bounds.slot_bound;
        let (lower, upper) = bounds.distance_domain();

        let mut model = FdModel::new(format!("{}_{}", instance.name, self.symmetry.name()));

        let positions: Vec<Vec<VarId>> = (0..m)
            .map(|i| {
                (0..=slot_bound)
                    .map(|k| model.add_var(IntVar::new(format!("position_{}_{}", i, k), 0, depot_value)))
                    .collect()
            })
            .collect();
        let loads: Vec<VarId> = (0..m)
            .map(|i| model.add_var(IntVar::new(format!("load_{}", i), 0, bounds.max_load)))
            .collect();
        let route_distances: Vec<VarId> = (0..m)
            .map(|i| model.add_var(IntVar::new(format!("route_distance_{}", i), 0, upper)))
            .collect();
        let max_distance = model.add_var(IntVar::new("max_distance", lower, upper));

        // Route ends at the depot
        for row in &positions {
            model.add_linear(vec![(1, row[0])], Comparison::Eq, depot_value);
            model.add_linear(vec![(1, row[slot_bound])], Comparison::Eq, depot_value);
        }

        // Every package in exactly one interior slot
        for j in 0..n {
            let slots = positions.iter().flat_map(|row| row[1..slot_bound].iter().copied()).collect();
            model.add_constraint(Constraint::ExactlyOne { vars: slots, value: j as i64 });
        }

        // Returning to the depot is final
        for row in &positions {
            for k in 1..slot_bound {
                model.add_implication(Literal::eq(row[k], depot_value), Literal::eq(row[k + 1], depot_value));
            }
        }

        // Loads; the depot has size 0
        let mut size_table = instance.sizes.clone();
        size_table.push(0);
        let size_table = Arc::new(size_table);
        for (i, row) in positions.iter().enumerate() {
            model.add_constraint(Constraint::ElementSum {
                target: loads[i],
                table: Arc::clone(&size_table),
                indices: row[1..slot_bound].to_vec(),
            });
            model.add_linear(vec![(1, loads[i])], Comparison::Le, instance.capacities[i]);
            model.add_implication(
                Literal::new(loads[i], Comparison::Ne, 0),
                Literal::new(loads[i], Comparison::Ge, bounds.min_load),
            );
        }
        if n > 0 {
            model.add_linear(loads.iter().map(|&l| (1, l)).collect(), Comparison::Ge, instance.total_size());
        }

        // Route distances; waiting at the depot is free
        let mut transitions = instance.distances.clone();
        transitions[depot][depot] = 0;
        let transitions = Arc::new(transitions);
        for (i, row) in positions.iter().enumerate() {
            model.add_constraint(Constraint::PathSum {
                target: route_distances[i],
                matrix: Arc::clone(&transitions),
                path: row.clone(),
            });
            model.add_linear(vec![(1, route_distances[i]), (-1, max_distance)], Comparison::Le, 0);
        }

        model.add_constraint(Constraint::Maximum {
            target: max_distance,
            args: route_distances.clone(),
        });
        model.add_linear(vec![(1, max_distance)], Comparison::Ge, lower);

        let first_stops: Vec<VarId> = positions.iter().map(|row| row[1]).collect();
        self.symmetry.apply(&mut model, &instance.capacities, &first_stops, &loads, depot);

        model.set_objective(Objective::Minimize(max_distance));
        model.validate()?;

        log::debug!(
            "built model {}: {} variables, {} constraints",
            model.name,
            model.var_count(),
            model.constraint_count()
        );

        Ok(RouteModel {
            model,
            positions,
            loads,
            route_distances,
            max_distance,
            slot_bound,
            depot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ones() -> McpInstance {
        let distances = (0..4)
            .map(|i| (0..4).map(|j| if i == j { 0 } else { 1 }).collect())
            .collect();
        McpInstance::new("ones", vec![10, 10], vec![3, 3, 3], distances).unwrap()
    }

    #[test]
    fn test_variable_groups() {
        let instance = all_ones();
        let bounds = Bounds::compute(&instance).unwrap();
        let route = ModelBuilder::new(&instance, &bounds).build().unwrap();

        assert_eq!(route.positions.len(), 2);
        assert_eq!(route.positions[0].len(), bounds.slot_bound + 1);
        assert_eq!(route.depot, 3);
        // 2 * 5 positions + 2 loads + 2 route distances + max
        assert_eq!(route.model.var_count(), 15);

        let max = route.model.var(route.max_distance);
        assert_eq!((max.min, max.max), (2, 4));
        let load = route.model.var(route.loads[1]);
        assert_eq!((load.min, load.max), (0, 9));
        assert_eq!(route.model.var_by_name("position_1_4"), Some(route.positions[1][4]));
    }

    #[test]
    fn test_constraint_counts() {
        let instance = all_ones();
        let bounds = Bounds::compute(&instance).unwrap();
        let route = ModelBuilder::new(&instance, &bounds).build().unwrap();
        let counts = route.model.constraint_counts();

        assert_eq!(counts.get("exactly_one"), Some(&3));
        assert_eq!(counts.get("element_sum"), Some(&2));
        assert_eq!(counts.get("path_sum"), Some(&2));
        assert_eq!(counts.get("maximum"), Some(&1));
        // 3 absorbing-depot links + 1 load floor per courier
        assert_eq!(counts.get("implication"), Some(&8));
        assert_eq!(counts.get("sentinel_le"), None);
    }

    #[test]
    fn test_symmetry_breaking_adds_constraints() {
        let instance = all_ones();
        let bounds = Bounds::compute(&instance).unwrap();
        let plain = ModelBuilder::new(&instance, &bounds).build().unwrap();
        let broken = ModelBuilder::new(&instance, &bounds)
            .with_symmetry_breaking(SymmetryBreaking::Lexicographic)
            .build()
            .unwrap();
        assert_eq!(broken.model.constraint_count(), plain.model.constraint_count() + 1);
        assert_ne!(broken.model.name, plain.model.name);
    }

    #[test]
    fn test_no_packages() {
        let instance = McpInstance::new("empty", vec![4, 4], vec![], vec![vec![7]]).unwrap();
        let bounds = Bounds::compute(&instance).unwrap();
        let route = ModelBuilder::new(&instance, &bounds).build().unwrap();
        assert_eq!(route.slot_bound, 1);
        assert_eq!(route.model.var(route.max_distance).min, 0);
        assert_eq!(route.model.var(route.loads[0]).max, 0);
        assert!(route.model.validate().is_ok());
    }

    #[test]
    fn test_builds_are_independent() {
        let instance = all_ones();
        let bounds = Bounds::compute(&instance).unwrap();
        let builder = ModelBuilder::new(&instance, &bounds);
        let a = builder.build().unwrap();
        let b = builder.build().unwrap();
        assert_eq!(a.max_distance, b.max_distance);
        assert_eq!(a.model.var_count(), b.model.var_count());
    }

    #[test]
    fn test_short_assignment_is_rejected() {
        let instance = all_ones();
        let bounds = Bounds::compute(&instance).unwrap();
        let route = ModelBuilder::new(&instance, &bounds).build().unwrap();
        let short = Assignment::new(vec![3, 0, 1]);

        assert!(matches!(route.decode(&short), Err(McpError::MalformedAssignment(_))));
        assert!(matches!(route.objective_value(&short), Err(McpError::MalformedAssignment(_))));
        assert!(route.route_distance_values(&short).is_err());

        let long = Assignment::new(vec![0; route.model.var_count() + 1]);
        assert!(route.extract_positions(&long).is_err());
    }
}
