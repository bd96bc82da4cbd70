//! Numeric bounds derived from an instance.
//!
//! The bounds tighten variable domains of the finite-domain model and give a
//! quick infeasibility verdict before any model is built. Everything is exact
//! integer arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};
use crate::instance::McpInstance;

/// Load and distance bounds of one instance. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Smallest package size (0 when there are no packages)
    pub min_load: i64,
    /// `min(max capacity, sum of all sizes)`
    pub max_load: i64,
    /// Most expensive single-package round trip from the depot, over shortest
    /// paths so that matrices breaking the triangle inequality stay valid
    pub lower_bound_distance: i64,
    /// Sum of the row maxima of the distance matrix
    pub upper_bound_distance: i64,
    /// `upper_bound_distance` tightened by the `max_stops + 1` largest edges
    pub tightened_upper_bound: i64,
    /// Most packages a single courier could carry
    pub max_stops: usize,
    /// Index of the final route slot; slots run `0..=slot_bound`
    pub slot_bound: usize,
}

impl Bounds {
    /// Compute the bounds of a validated instance.
    ///
    /// Fails with [`McpError::MalformedInstance`] on structurally invalid data and
    /// with [`McpError::InfeasibleBounds`] when the bounds prove the instance
    /// cannot be modeled.
    pub fn compute(instance: &McpInstance) -> Result<Self> {
        instance.validate()?;

        let n = instance.num_packages();
        let depot = instance.depot();
        let max_capacity = instance.capacities.iter().copied().max().unwrap_or(0);

        let total_size = instance.total_size();
        let total_capacity = instance.total_capacity();
        if total_size > total_capacity {
            return Err(McpError::InfeasibleBounds(format!(
                "total package size {} exceeds total capacity {}",
                total_size, total_capacity
            )));
        }
        if let Some((j, size)) = instance.sizes.iter().enumerate().find(|(_, &s)| s > max_capacity) {
            return Err(McpError::InfeasibleBounds(format!(
                "package {} of size {} exceeds every courier capacity (max {})",
                j + 1,
                size,
                max_capacity
            )));
        }

        let min_load = instance.sizes.iter().copied().min().unwrap_or(0);
        let max_load = max_capacity.min(total_size);

        let max_stops = max_stops(&instance.sizes, max_capacity);
        if max_stops * instance.num_couriers() < n {
            return Err(McpError::InfeasibleBounds(format!(
                "{} couriers carrying at most {} packages each cannot deliver {} packages",
                instance.num_couriers(),
                max_stops,
                n
            )));
        }

        let shortest = shortest_paths(&instance.distances);
        let lower_bound_distance = (0..n)
            .map(|j| shortest[depot][j] + shortest[j][depot])
            .max()
            .unwrap_or(0);

        let upper_bound_distance: i64 = instance
            .distances
            .iter()
            .map(|row| row.iter().copied().max().unwrap_or(0))
            .sum();

        let mut entries: Vec<i64> = instance.distances.iter().flatten().copied().collect();
        entries.sort_unstable_by(|a, b| b.cmp(a));
        let largest_edges: i64 = entries.iter().take(max_stops + 1).sum();
        let tightened_upper_bound = upper_bound_distance.min(largest_edges);

        if min_load > max_load {
            return Err(McpError::InfeasibleBounds(format!(
                "minimum load {} exceeds maximum load {}",
                min_load, max_load
            )));
        }
        if lower_bound_distance > tightened_upper_bound {
            return Err(McpError::InfeasibleBounds(format!(
                "distance lower bound {} exceeds upper bound {}",
                lower_bound_distance, tightened_upper_bound
            )));
        }

        let bounds = Bounds {
            min_load,
            max_load,
            lower_bound_distance,
            upper_bound_distance,
            tightened_upper_bound,
            max_stops,
            slot_bound: max_stops + 1,
        };
        log::debug!("{}: {:?}", instance.name, bounds);
        Ok(bounds)
    }

    /// Domain of the minimized maximum distance
    pub fn distance_domain(&self) -> (i64, i64) {
        (self.lower_bound_distance, self.tightened_upper_bound)
    }
}

/// All-pairs shortest path lengths (Floyd-Warshall) over non-negative distances.
fn shortest_paths(distances: &[Vec<i64>]) -> Vec<Vec<i64>> {
    let mut dist = distances.to_vec();
    let size = dist.len();
    for k in 0..size {
        for i in 0..size {
            for j in 0..size {
                let through = dist[i][k] + dist[k][j];
                if through < dist[i][j] {
                    dist[i][j] = through;
                }
            }
        }
    }
    dist
}

/// Largest `c` such that the `c` smallest sizes fit together in `capacity`.
fn max_stops(sizes: &[i64], capacity: i64) -> usize {
    let mut sorted = sizes.to_vec();
    sorted.sort_unstable();
    let mut load = 0;
    let mut count = 0;
    for size in sorted {
        if load + size > capacity {
            break;
        }
        load += size;
        count += 1;
    }
    count
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Bounds:")?;
        writeln!(f, "  Load: [{}, {}]", self.min_load, self.max_load)?;
        writeln!(f, "  Distance: [{}, {}] (loose upper {})", self.lower_bound_distance, self.tightened_upper_bound, self.upper_bound_distance)?;
        writeln!(f, "  Max stops per courier: {}", self.max_stops)?;
        writeln!(f, "  Route slots: 0..={}", self.slot_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ones(couriers: Vec<i64>, sizes: Vec<i64>) -> McpInstance {
        let n = sizes.len() + 1;
        let distances = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0 } else { 1 }).collect())
            .collect();
        McpInstance::new("ones", couriers, sizes, distances).unwrap()
    }

    #[test]
    fn test_bounds_all_ones() {
        let instance = all_ones(vec![10, 10], vec![3, 3, 3]);
        let bounds = Bounds::compute(&instance).unwrap();
        assert_eq!(bounds.min_load, 3);
        assert_eq!(bounds.max_load, 9);
        assert_eq!(bounds.lower_bound_distance, 2);
        assert_eq!(bounds.upper_bound_distance, 4);
        assert_eq!(bounds.max_stops, 3);
        assert_eq!(bounds.slot_bound, 4);
        assert_eq!(bounds.tightened_upper_bound, 4);
        assert_eq!(bounds.distance_domain(), (2, 4));
    }

    #[test]
    fn test_tightened_bound() {
        // One package per courier at most: route has two edges
        let instance = McpInstance::new(
            "tight",
            vec![5, 5],
            vec![4, 4],
            vec![vec![0, 9, 2], vec![9, 0, 3], vec![2, 3, 0]],
        )
        .unwrap();
        let bounds = Bounds::compute(&instance).unwrap();
        assert_eq!(bounds.max_stops, 1);
        assert_eq!(bounds.upper_bound_distance, 9 + 9 + 3);
        assert_eq!(bounds.tightened_upper_bound, 18);
        assert_eq!(bounds.lower_bound_distance, 6);
        assert_eq!(bounds.max_load, 5);
    }

    #[test]
    fn test_no_packages() {
        let instance = McpInstance::new("empty", vec![3, 3], vec![], vec![vec![0]]).unwrap();
        let bounds = Bounds::compute(&instance).unwrap();
        assert_eq!(bounds.min_load, 0);
        assert_eq!(bounds.max_load, 0);
        assert_eq!(bounds.lower_bound_distance, 0);
        assert_eq!(bounds.max_stops, 0);
        assert_eq!(bounds.slot_bound, 1);
    }

    #[test]
    fn test_total_capacity_too_small() {
        let instance = all_ones(vec![5], vec![3, 3, 3]);
        assert!(matches!(Bounds::compute(&instance), Err(McpError::InfeasibleBounds(_))));
    }

    #[test]
    fn test_package_too_large() {
        let instance = all_ones(vec![4, 4, 4], vec![5, 1]);
        assert!(matches!(Bounds::compute(&instance), Err(McpError::InfeasibleBounds(_))));
    }

    #[test]
    fn test_not_enough_stops() {
        // Total capacity suffices but each courier carries a single package
        let instance = all_ones(vec![3, 3], vec![2, 2, 2]);
        assert!(matches!(Bounds::compute(&instance), Err(McpError::InfeasibleBounds(_))));
    }

    #[test]
    fn test_malformed_instance_rejected() {
        let instance = McpInstance {
            name: "broken".into(),
            capacities: vec![5],
            sizes: vec![1],
            distances: vec![vec![0, 1, 2], vec![1, 0, 2]],
        };
        assert!(matches!(Bounds::compute(&instance), Err(McpError::MalformedInstance(_))));
    }

    #[test]
    fn test_lower_bound_follows_shortest_paths() {
        // Depot to package 2 costs 10 directly but 2 through package 1
        let instance = McpInstance::new(
            "detour",
            vec![10],
            vec![1, 1],
            vec![vec![0, 1, 1], vec![1, 0, 10], vec![1, 10, 0]],
        )
        .unwrap();
        let bounds = Bounds::compute(&instance).unwrap();
        assert_eq!(bounds.lower_bound_distance, 4);
        assert_eq!(bounds.tightened_upper_bound, 21);
        assert!(bounds.lower_bound_distance <= 12);
    }

    #[test]
    fn test_shortest_paths() {
        let shortest = shortest_paths(&[vec![0, 7, 1], vec![7, 0, 2], vec![1, 2, 0]]);
        assert_eq!(shortest[0][1], 3);
        assert_eq!(shortest[1][0], 3);
        assert_eq!(shortest[0][2], 1);
    }

    #[test]
    fn test_lower_bound_never_exceeds_upper_bound() {
        for seed in 0..25 {
            let instance = McpInstance::random("r", 1 + (seed as usize % 4), seed as usize % 9, seed).unwrap();
            let bounds = Bounds::compute(&instance).unwrap();
            assert!(bounds.lower_bound_distance <= bounds.tightened_upper_bound);
            assert!(bounds.tightened_upper_bound <= bounds.upper_bound_distance);
        }
    }
}
