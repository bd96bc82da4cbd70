//! Batch runs over instance directories.
//!
//! Solves every instance under every configuration, writes the per-instance
//! JSON result files, and aggregates per-configuration statistics for CSV
//! export and a plain-text report.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::path::Path;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backend::{Backend, SearchBackend, SolveConfig};
use crate::error::Result;
use crate::instance::McpInstance;
use crate::report;
use crate::solver::{Configuration, McpSolver, SolveOutcome, SolverConfig};

/// Result of one configuration on one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub instance: String,
    pub couriers: usize,
    pub packages: usize,
    pub configuration: String,
    /// OPTIMAL, SAT, UNSAT, UNKNOWN or ERROR
    pub status: String,
    pub objective: Option<i64>,
    pub optimal: bool,
    /// Wall-clock seconds
    pub time: f64,
    pub nodes: u64,
    pub error: Option<String>,
}

impl RunRecord {
    fn from_outcome(instance: &McpInstance, outcome: &SolveOutcome) -> Self {
        RunRecord {
            instance: instance.name.clone(),
            couriers: instance.num_couriers(),
            packages: instance.num_packages(),
            configuration: outcome.configuration.clone(),
            status: if outcome.is_failed() {
                "ERROR".to_string()
            } else {
                outcome.status.to_string()
            },
            objective: outcome.solution.as_ref().map(|s| s.objective),
            optimal: outcome.solution.as_ref().map(|s| s.optimal).unwrap_or(false),
            time: outcome.elapsed,
            nodes: outcome.nodes,
            error: outcome.error.clone(),
        }
    }

    fn failed(instance: &McpInstance, configuration: &str, error: String) -> Self {
        RunRecord {
            instance: instance.name.clone(),
            couriers: instance.num_couriers(),
            packages: instance.num_packages(),
            configuration: configuration.to_string(),
            status: "ERROR".to_string(),
            objective: None,
            optimal: false,
            time: 0.0,
            nodes: 0,
            error: Some(error),
        }
    }
}

/// Aggregated statistics for a configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationStatistics {
    pub configuration: String,
    pub num_instances: usize,
    /// Runs that produced a solution
    pub num_solved: usize,
    pub num_optimal: usize,
    /// Mean objective over solved runs
    pub avg_objective: Option<f64>,
    pub best_objective: Option<i64>,
    pub avg_time: f64,
    pub std_time: f64,
    pub total_time: f64,
}

/// Batch configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Time limit per configuration run, in seconds
    pub time_limit: f64,
    pub configurations: Vec<Configuration>,
    /// Solve instances in parallel
    pub parallel: bool,
    /// Write `<output_dir>/<instance>.json` after each instance
    pub save_results: bool,
    pub output_dir: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            time_limit: 300.0,
            configurations: Configuration::standard(),
            parallel: true,
            save_results: true,
            output_dir: "res".to_string(),
        }
    }
}

/// Batch runner
pub struct Batch {
    config: BatchConfig,
    solver: McpSolver,
    records: Vec<RunRecord>,
}

impl Batch {
    pub fn new(config: BatchConfig) -> Self {
        Self::with_backend(config, Box::new(SearchBackend::new()))
    }

    pub fn with_backend(config: BatchConfig, backend: Box<dyn Backend>) -> Self {
        let solver = McpSolver::with_backend(
            backend,
            SolverConfig {
                solve: SolveConfig::with_time_limit(config.time_limit),
                configurations: config.configurations.clone(),
                parallel: config.parallel,
            },
        );
        Batch {
            config,
            solver,
            records: Vec::new(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Solve one instance under every configuration and save its result file.
    /// A malformed instance yields one ERROR record per configuration; a single
    /// failing configuration yields one ERROR record and is left out of the file.
    pub fn run_instance(&self, instance: &McpInstance) -> Vec<RunRecord> {
        let outcomes = match self.solver.solve(instance) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                log::error!("{}: {}", instance.name, e);
                return self
                    .config
                    .configurations
                    .iter()
                    .map(|c| RunRecord::failed(instance, &c.name, e.to_string()))
                    .collect();
            }
        };

        if self.config.save_results {
            let path = report::result_path(&self.config.output_dir, &instance.name);
            if let Err(e) = report::save_results(&path, &outcomes, self.config.time_limit) {
                log::error!("Failed to save {}: {}", path.display(), e);
            }
        }

        outcomes
            .iter()
            .map(|o| RunRecord::from_outcome(instance, o))
            .collect()
    }

    /// Run every instance, calling `on_done` as each one finishes
    pub fn run_on_instances<F>(&mut self, instances: &[McpInstance], on_done: F)
    where
        F: Fn(&McpInstance) + Sync,
    {
        let run = |instance: &McpInstance| {
            let records = self.run_instance(instance);
            on_done(instance);
            records
        };
        let batches: Vec<Vec<RunRecord>> = if self.config.parallel {
            instances.par_iter().map(run).collect()
        } else {
            instances.iter().map(run).collect()
        };
        self.records.extend(batches.into_iter().flatten());
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Statistics per configuration, best mean objective first
    pub fn compute_statistics(&self) -> Vec<ConfigurationStatistics> {
        let mut groups: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.configuration.as_str()).or_default().push(record);
        }

        let mut statistics: Vec<ConfigurationStatistics> = groups
            .into_iter()
            .map(|(configuration, records)| {
                let objectives: Vec<f64> = records
                    .iter()
                    .filter_map(|r| r.objective)
                    .map(|o| o as f64)
                    .collect();
                let times: Vec<f64> = records.iter().map(|r| r.time).collect();

                let avg_objective = if objectives.is_empty() {
                    None
                } else {
                    Some(objectives.iter().mean())
                };
                let std_time = if times.len() < 2 { 0.0 } else { times.iter().std_dev() };

                ConfigurationStatistics {
                    configuration: configuration.to_string(),
                    num_instances: records.len(),
                    num_solved: objectives.len(),
                    num_optimal: records.iter().filter(|r| r.optimal).count(),
                    avg_objective,
                    best_objective: records.iter().filter_map(|r| r.objective).min(),
                    avg_time: times.iter().mean(),
                    std_time,
                    total_time: times.iter().sum(),
                }
            })
            .collect();

        statistics.sort_by_key(|s| {
            (
                s.avg_objective.is_none(),
                OrderedFloat(s.avg_objective.unwrap_or(0.0)),
                s.configuration.clone(),
            )
        });
        statistics
    }

    /// Export run records to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export per-configuration statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("         MCP Batch Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        report.push_str(&format!("Time limit: {}s\n\n", self.config.time_limit));

        report.push_str("Configuration Summary:\n");
        report.push_str("-".repeat(80).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>10} {:>10} {:>12} {:>10} {:>14}\n",
            "Configuration", "Solved", "Optimal", "Avg Obj", "Best Obj", "Avg Time (s)"
        ));
        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            let avg = stat
                .avg_objective
                .map(|a| format!("{:.2}", a))
                .unwrap_or_else(|| "-".to_string());
            let best = stat
                .best_objective
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string());
            report.push_str(&format!(
                "{:<20} {:>10} {:>10} {:>12} {:>10} {:>14.3}\n",
                stat.configuration,
                format!("{}/{}", stat.num_solved, stat.num_instances),
                stat.num_optimal,
                avg,
                best,
                stat.avg_time
            ));
        }
        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        report.push_str("\nBest Solutions per Instance:\n");
        let mut best: BTreeMap<&str, &RunRecord> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.objective.is_some()) {
            let entry = best.entry(record.instance.as_str()).or_insert(record);
            if (record.objective, !record.optimal) < (entry.objective, !entry.optimal) {
                *entry = record;
            }
        }
        for (instance, record) in &best {
            report.push_str(&format!(
                "  {}: {} ({}{})\n",
                instance,
                record.objective.unwrap_or_default(),
                record.configuration,
                if record.optimal { ", optimal" } else { "" }
            ));
        }

        let unsolved: BTreeSet<&str> = self
            .records
            .iter()
            .map(|r| r.instance.as_str())
            .filter(|name| !best.contains_key(name))
            .collect();
        if !unsolved.is_empty() {
            report.push_str("\nNo solution:\n");
            for name in unsolved {
                report.push_str(&format!("  {}\n", name));
            }
        }

        report
    }

    /// Write `results.csv`, `statistics.csv` and `report.txt` into `dir`
    pub fn write_outputs<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        self.export_to_csv(dir.join("results.csv"))?;
        self.export_statistics_csv(dir.join("statistics.csv"))?;
        fs::write(dir.join("report.txt"), self.generate_report())?;
        Ok(())
    }
}

/// Load every `.dat` instance in a directory, sorted by name.
/// Files that fail to parse are logged and skipped.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<McpInstance>> {
    let mut instances = Vec::new();

    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e == "dat").unwrap_or(false) {
            match McpInstance::from_file(&path) {
                Ok(instance) => instances.push(instance),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
    }

    instances.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(instances)
}
