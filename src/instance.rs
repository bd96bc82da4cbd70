//! Module for parsing and representing MCP instances.
//!
//! This module handles the `.dat` files used for the Multiple Couriers Problem.
//! It stores courier capacities, package sizes and the integer distance matrix,
//! where the last row/column is the depot.

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};

/// Represents a complete MCP instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpInstance {
    /// Name of the instance (file stem when loaded from disk)
    pub name: String,
    /// Capacity of each courier (`m` entries)
    pub capacities: Vec<i64>,
    /// Size of each package (`n` entries)
    pub sizes: Vec<i64>,
    /// `(n+1) x (n+1)` distance matrix, index `n` is the depot. Need not be
    /// symmetric or satisfy the triangle inequality.
    pub distances: Vec<Vec<i64>>,
}

impl McpInstance {
    /// Build and validate an instance.
    pub fn new(
        name: impl Into<String>,
        capacities: Vec<i64>,
        sizes: Vec<i64>,
        distances: Vec<Vec<i64>>,
    ) -> Result<Self> {
        let instance = McpInstance {
            name: name.into(),
            capacities,
            sizes,
            distances,
        };
        instance.validate()?;
        Ok(instance)
    }

    /// Parse an instance from a `.dat` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::parse(name, &text)
    }

    /// Parse the `.dat` layout:
    /// `m`, `n`, the `m` capacities, the `n` sizes, then `n+1` matrix rows.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let mut next_row = |what: &str| -> Result<(usize, Vec<i64>)> {
            let (line_no, line) = lines.next().ok_or_else(|| McpError::Parse {
                line: 0,
                message: format!("unexpected end of file, missing {}", what),
            })?;
            let values = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<i64>().map_err(|_| McpError::Parse {
                        line: line_no,
                        message: format!("invalid {} '{}'", what, token),
                    })
                })
                .collect::<Result<Vec<i64>>>()?;
            Ok((line_no, values))
        };

        let (line_no, m) = next_row("courier count")?;
        let couriers = single_count(line_no, &m, "courier count")?;
        let (line_no, n) = next_row("package count")?;
        let packages = single_count(line_no, &n, "package count")?;

        let (_, capacities) = next_row("capacity")?;
        let sizes = if packages == 0 {
            Vec::new()
        } else {
            next_row("size")?.1
        };

        let mut distances = Vec::with_capacity(packages + 1);
        for _ in 0..=packages {
            distances.push(next_row("distance")?.1);
        }

        if capacities.len() != couriers {
            return Err(McpError::MalformedInstance(format!(
                "declared {} couriers but found {} capacities",
                couriers,
                capacities.len()
            )));
        }
        if sizes.len() != packages {
            return Err(McpError::MalformedInstance(format!(
                "declared {} packages but found {} sizes",
                packages,
                sizes.len()
            )));
        }

        Self::new(name, capacities, sizes, distances)
    }

    /// Check structural validity. Never repairs anything.
    pub fn validate(&self) -> Result<()> {
        if self.capacities.is_empty() {
            return Err(McpError::MalformedInstance("at least one courier is required".into()));
        }
        if let Some(c) = self.capacities.iter().find(|&&c| c < 0) {
            return Err(McpError::MalformedInstance(format!("negative capacity {}", c)));
        }
        if let Some(s) = self.sizes.iter().find(|&&s| s < 0) {
            return Err(McpError::MalformedInstance(format!("negative package size {}", s)));
        }

        let expected = self.sizes.len() + 1;
        if self.distances.len() != expected {
            return Err(McpError::MalformedInstance(format!(
                "distance matrix has {} rows, expected {}",
                self.distances.len(),
                expected
            )));
        }
        for (i, row) in self.distances.iter().enumerate() {
            if row.len() != expected {
                return Err(McpError::MalformedInstance(format!(
                    "distance row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    expected
                )));
            }
            if let Some(d) = row.iter().find(|&&d| d < 0) {
                return Err(McpError::MalformedInstance(format!(
                    "negative distance {} in row {}",
                    d, i
                )));
            }
        }
        Ok(())
    }

    /// Number of couriers (`m`)
    #[inline]
    pub fn num_couriers(&self) -> usize {
        self.capacities.len()
    }

    /// Number of packages (`n`)
    #[inline]
    pub fn num_packages(&self) -> usize {
        self.sizes.len()
    }

    /// Index of the depot in the distance matrix
    #[inline]
    pub fn depot(&self) -> usize {
        self.sizes.len()
    }

    /// Get the distance between two locations (0-based, depot = `n`)
    #[inline]
    pub fn distance(&self, from: usize, to: usize) -> i64 {
        self.distances[from][to]
    }

    pub fn total_size(&self) -> i64 {
        self.sizes.iter().sum()
    }

    pub fn total_capacity(&self) -> i64 {
        self.capacities.iter().sum()
    }

    /// Fast feasibility pre-check: everything must fit in the fleet.
    pub fn passes_capacity_precheck(&self) -> bool {
        self.total_size() <= self.total_capacity()
    }

    /// Whether every off-diagonal pair has the same distance both ways.
    pub fn is_symmetric(&self) -> bool {
        let n = self.distances.len();
        (0..n).all(|i| (i + 1..n).all(|j| self.distances[i][j] == self.distances[j][i]))
    }

    /// Length of a route given as 1-based package IDs, from the depot and back.
    /// An empty route never leaves the depot and has length 0.
    pub fn route_distance(&self, stops: &[usize]) -> i64 {
        if stops.is_empty() {
            return 0;
        }
        let depot = self.depot();
        let mut length = 0;
        let mut current = depot;
        for &stop in stops {
            length += self.distance(current, stop - 1);
            current = stop - 1;
        }
        length + self.distance(current, depot)
    }

    /// Total size carried along a route of 1-based package IDs
    pub fn route_load(&self, stops: &[usize]) -> i64 {
        stops.iter().map(|&stop| self.sizes[stop - 1]).sum()
    }

    /// Render the instance as MiniZinc data (`.dzn`)
    pub fn to_dzn(&self) -> String {
        let join = |values: &[i64]| {
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        };
        let mut out = String::new();
        out.push_str(&format!("m = {};\n", self.num_couriers()));
        out.push_str(&format!("n = {};\n", self.num_packages()));
        out.push_str(&format!("l = [{}];\n", join(&self.capacities)));
        out.push_str(&format!("s = [{}];\n", join(&self.sizes)));
        out.push_str("D = [|");
        let rows: Vec<String> = self.distances.iter().map(|row| join(row)).collect();
        out.push_str(&rows.join("\n     |"));
        out.push_str("|];\n");
        out
    }

    /// Render the instance in the `.dat` layout accepted by [`McpInstance::parse`]
    pub fn to_dat(&self) -> String {
        let join = |values: &[i64]| {
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
        };
        let mut out = format!("{}\n{}\n", self.num_couriers(), self.num_packages());
        out.push_str(&join(&self.capacities));
        out.push('\n');
        if !self.sizes.is_empty() {
            out.push_str(&join(&self.sizes));
            out.push('\n');
        }
        for row in &self.distances {
            out.push_str(&join(row));
            out.push('\n');
        }
        out
    }

    /// Generate a random instance with symmetric Manhattan distances.
    /// Deterministic via seed; the result always admits a feasible assignment.
    pub fn random(name: impl Into<String>, couriers: usize, packages: usize, seed: u64) -> Result<Self> {
        use rand::prelude::*;
        use rand_chacha::ChaCha8Rng;

        if couriers == 0 {
            return Err(McpError::MalformedInstance("at least one courier is required".into()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let points: Vec<(i64, i64)> = (0..=packages)
            .map(|_| (rng.gen_range(0..=50), rng.gen_range(0..=50)))
            .collect();
        let sizes: Vec<i64> = (0..packages).map(|_| rng.gen_range(1..=20)).collect();

        // Capacities cover a round-robin assignment plus some slack
        let mut loads = vec![0i64; couriers];
        for (j, size) in sizes.iter().enumerate() {
            loads[j % couriers] += size;
        }
        let capacities: Vec<i64> = loads
            .iter()
            .map(|load| load + rng.gen_range(0..=10))
            .collect();

        let distances = points
            .iter()
            .map(|a| {
                points
                    .iter()
                    .map(|b| (a.0 - b.0).abs() + (a.1 - b.1).abs())
                    .collect()
            })
            .collect();

        Self::new(name, capacities, sizes, distances)
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let n = self.distances.len();
        let mut off_diagonal: Vec<i64> = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    off_diagonal.push(self.distances[i][j]);
                }
            }
        }
        let avg_distance = if off_diagonal.is_empty() {
            0.0
        } else {
            off_diagonal.iter().sum::<i64>() as f64 / off_diagonal.len() as f64
        };

        InstanceStatistics {
            name: self.name.clone(),
            couriers: self.num_couriers(),
            packages: self.num_packages(),
            total_capacity: self.total_capacity(),
            total_size: self.total_size(),
            min_capacity: self.capacities.iter().copied().min().unwrap_or(0),
            max_capacity: self.capacities.iter().copied().max().unwrap_or(0),
            symmetric: self.is_symmetric(),
            avg_distance,
            max_distance: off_diagonal.iter().copied().max().unwrap_or(0),
        }
    }
}

fn single_count(line: usize, values: &[i64], what: &str) -> Result<usize> {
    match values {
        [value] if *value >= 0 => Ok(*value as usize),
        _ => Err(McpError::Parse {
            line,
            message: format!("expected a single non-negative {}", what),
        }),
    }
}

/// Statistics about an MCP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub couriers: usize,
    pub packages: usize,
    pub total_capacity: i64,
    pub total_size: i64,
    pub min_capacity: i64,
    pub max_capacity: i64,
    pub symmetric: bool,
    pub avg_distance: f64,
    pub max_distance: i64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Couriers: {}", self.couriers)?;
        writeln!(f, "  Packages: {} (+ depot)", self.packages)?;
        writeln!(f, "  Capacity: total {} (min {}, max {})", self.total_capacity, self.min_capacity, self.max_capacity)?;
        writeln!(f, "  Total package size: {}", self.total_size)?;
        writeln!(f, "  Symmetric distances: {}", self.symmetric)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {}", self.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "2\n3\n10 10\n3 3 3\n0 1 1 1\n1 0 1 1\n1 1 0 1\n1 1 1 0\n";

    #[test]
    fn test_parse_dat() {
        let instance = McpInstance::parse("small", SMALL).unwrap();
        assert_eq!(instance.num_couriers(), 2);
        assert_eq!(instance.num_packages(), 3);
        assert_eq!(instance.depot(), 3);
        assert_eq!(instance.capacities, vec![10, 10]);
        assert_eq!(instance.sizes, vec![3, 3, 3]);
        assert_eq!(instance.distance(3, 0), 1);
        assert!(instance.passes_capacity_precheck());
        assert!(instance.is_symmetric());
    }

    #[test]
    fn test_parse_ignores_blank_lines() {
        let text = "\n1\n\n1\n5\n2\n0 4\n\n4 0\n";
        let instance = McpInstance::parse("blank", text).unwrap();
        assert_eq!(instance.num_packages(), 1);
        assert_eq!(instance.distances, vec![vec![0, 4], vec![4, 0]]);
    }

    #[test]
    fn test_parse_rejects_bad_token() {
        let err = McpInstance::parse("bad", "2\n3\n10 x\n").unwrap_err();
        match err {
            McpError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_rows() {
        let err = McpInstance::parse("short", "1\n2\n5\n1 1\n0 1 1\n").unwrap_err();
        assert!(matches!(err, McpError::Parse { .. }));
    }

    #[test]
    fn test_validation_errors() {
        let not_square = McpInstance::new("x", vec![5], vec![1], vec![vec![0, 1], vec![1]]);
        assert!(matches!(not_square, Err(McpError::MalformedInstance(_))));

        let wrong_size = McpInstance::new("x", vec![5], vec![1, 1], vec![vec![0, 1], vec![1, 0]]);
        assert!(matches!(wrong_size, Err(McpError::MalformedInstance(_))));

        let negative = McpInstance::new("x", vec![5], vec![1], vec![vec![0, -1], vec![1, 0]]);
        assert!(matches!(negative, Err(McpError::MalformedInstance(_))));

        let no_courier = McpInstance::new("x", vec![], vec![], vec![vec![0]]);
        assert!(matches!(no_courier, Err(McpError::MalformedInstance(_))));
    }

    #[test]
    fn test_capacity_count_mismatch() {
        let err = McpInstance::parse("x", "2\n1\n5\n1\n0 1\n1 0\n").unwrap_err();
        assert!(matches!(err, McpError::MalformedInstance(_)));
    }

    #[test]
    fn test_route_distance_and_load() {
        let instance = McpInstance::new(
            "line",
            vec![10],
            vec![2, 4],
            vec![vec![0, 3, 1], vec![3, 0, 2], vec![1, 2, 0]],
        )
        .unwrap();
        // depot(2) -> 1 -> 2 -> depot = 1 + 3 + 2
        assert_eq!(instance.route_distance(&[1, 2]), 6);
        assert_eq!(instance.route_distance(&[]), 0);
        assert_eq!(instance.route_load(&[1, 2]), 6);
    }

    #[test]
    fn test_zero_packages() {
        let instance = McpInstance::parse("empty", "2\n0\n4 4\n0\n").unwrap();
        assert_eq!(instance.num_packages(), 0);
        assert_eq!(instance.depot(), 0);
        assert_eq!(instance.to_dat(), "2\n0\n4 4\n0\n");
    }

    #[test]
    fn test_dat_round_trip_and_dzn() {
        let instance = McpInstance::parse("small", SMALL).unwrap();
        let again = McpInstance::parse("small", &instance.to_dat()).unwrap();
        assert_eq!(instance, again);

        let dzn = instance.to_dzn();
        assert!(dzn.contains("m = 2;"));
        assert!(dzn.contains("l = [10, 10];"));
        assert!(dzn.contains("D = [|0, 1, 1, 1"));
        assert!(dzn.trim_end().ends_with("|];"));
    }

    #[test]
    fn test_random_instance() {
        let a = McpInstance::random("r", 3, 7, 42).unwrap();
        let b = McpInstance::random("r", 3, 7, 42).unwrap();
        assert_eq!(a, b);
        assert!(a.is_symmetric());
        assert!(a.passes_capacity_precheck());
        assert!((0..=7).all(|i| a.distance(i, i) == 0));
    }

    #[test]
    fn test_statistics() {
        let instance = McpInstance::parse("small", SMALL).unwrap();
        let stats = instance.statistics();
        assert_eq!(stats.total_size, 9);
        assert_eq!(stats.total_capacity, 20);
        assert_eq!(stats.max_distance, 1);
        assert!((stats.avg_distance - 1.0).abs() < 1e-10);
        assert!(stats.to_string().contains("Couriers: 2"));
    }
}
