//! Per-instance JSON result files.
//!
//! Each file maps a configuration name to one entry:
//!
//! ```json
//! { "search_sb": { "time": 12, "optimal": true, "obj": 205, "sol": [[1, 4], [2, 3]] } }
//! ```
//!
//! Writing merges into whatever the file already holds, so runs of different
//! configurations can share one file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::SolveStatus;
use crate::error::Result;
use crate::instance::McpInstance;
use crate::solution::{check_routes, Violation};
use crate::solver::SolveOutcome;

/// One configuration's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Whole seconds, or the time limit when the run was not proven within it
    pub time: u64,
    pub optimal: bool,
    /// `null` when no solution was found
    pub obj: Option<i64>,
    /// 1-based routes, empty when no solution was found
    pub sol: Vec<Vec<usize>>,
}

pub type ResultFile = BTreeMap<String, ResultEntry>;

impl ResultEntry {
    pub fn from_outcome(outcome: &SolveOutcome, time_limit: f64) -> Self {
        let limit = time_limit.max(0.0).floor() as u64;
        let proven = outcome.status.is_optimal() || outcome.status == SolveStatus::Unsatisfiable;
        let within_limit = outcome.elapsed < time_limit;
        let time = if proven && within_limit {
            (outcome.elapsed.floor() as u64).min(limit)
        } else {
            limit
        };
        match &outcome.solution {
            Some(solution) => ResultEntry {
                time,
                optimal: solution.optimal && within_limit,
                obj: Some(solution.objective),
                sol: solution.routes.clone(),
            },
            None => ResultEntry {
                time,
                optimal: false,
                obj: None,
                sol: Vec::new(),
            },
        }
    }
}

/// `<dir>/<instance>.json`
pub fn result_path<P: AsRef<Path>>(dir: P, instance_name: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.json", instance_name))
}

/// Read a result file. A missing file is empty; unreadable JSON is replaced.
pub fn load_results<P: AsRef<Path>>(path: P) -> Result<ResultFile> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ResultFile::new());
    }
    let text = fs::read_to_string(path)?;
    match serde_json::from_str(&text) {
        Ok(results) => Ok(results),
        Err(e) => {
            log::warn!("{}: discarding unreadable results ({})", path.display(), e);
            Ok(ResultFile::new())
        }
    }
}

/// Merge outcomes into the result file at `path` and return the merged content.
/// Failed configurations leave their existing entry untouched.
pub fn save_results<P: AsRef<Path>>(path: P, outcomes: &[SolveOutcome], time_limit: f64) -> Result<ResultFile> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut results = load_results(path)?;
    for outcome in outcomes.iter().filter(|o| !o.is_failed()) {
        results.insert(outcome.configuration.clone(), ResultEntry::from_outcome(outcome, time_limit));
    }
    fs::write(path, serde_json::to_string_pretty(&results)?)?;
    log::debug!("wrote {} entries to {}", results.len(), path.display());
    Ok(results)
}

/// Check every entry of a result file against its instance.
/// Entries without a solution have nothing to check.
pub fn check_results(instance: &McpInstance, results: &ResultFile) -> BTreeMap<String, Vec<Violation>> {
    results
        .iter()
        .filter(|(_, entry)| entry.obj.is_some())
        .map(|(name, entry)| (name.clone(), check_routes(instance, &entry.sol, entry.obj)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::McpSolution;

    fn instance() -> McpInstance {
        let distances = (0..4)
            .map(|i| (0..4).map(|j| if i == j { 0 } else { 1 }).collect())
            .collect();
        McpInstance::new("ones", vec![10, 10], vec![3, 3, 3], distances).unwrap()
    }

    fn outcome(name: &str, status: SolveStatus, elapsed: f64) -> SolveOutcome {
        let solution = if status.has_solution() {
            let mut s = McpSolution::from_routes(&instance(), vec![vec![1, 2], vec![3]], name);
            s.optimal = status.is_optimal();
            Some(s)
        } else {
            None
        };
        SolveOutcome {
            configuration: name.to_string(),
            status,
            solution,
            elapsed,
            nodes: 0,
            error: None,
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mcp-report-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_entry_time_rules() {
        let entry = ResultEntry::from_outcome(&outcome("search", SolveStatus::Optimal, 12.7), 300.0);
        assert_eq!(entry.time, 12);
        assert!(entry.optimal);
        assert_eq!(entry.obj, Some(3));
        assert_eq!(entry.sol, vec![vec![1, 2], vec![3]]);

        let entry = ResultEntry::from_outcome(&outcome("search", SolveStatus::Satisfiable, 300.2), 300.0);
        assert_eq!(entry.time, 300);
        assert!(!entry.optimal);

        let entry = ResultEntry::from_outcome(&outcome("search", SolveStatus::Unknown, 300.0), 300.0);
        assert_eq!(entry.time, 300);
        assert_eq!(entry.obj, None);
        assert!(entry.sol.is_empty());
    }

    #[test]
    fn test_json_layout() {
        let entry = ResultEntry::from_outcome(&outcome("search", SolveStatus::Optimal, 0.4), 300.0);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["time"], 0);
        assert_eq!(json["optimal"], true);
        assert_eq!(json["obj"], 3);
        assert_eq!(json["sol"][0][1], 2);
    }

    #[test]
    fn test_save_merges_existing_entries() {
        let dir = temp_dir("merge");
        let path = result_path(&dir, "inst01");

        save_results(&path, &[outcome("search", SolveStatus::Optimal, 1.0)], 300.0).unwrap();
        let merged = save_results(&path, &[outcome("search_sb", SolveStatus::Satisfiable, 300.0)], 300.0).unwrap();
        assert_eq!(merged.len(), 2);

        let loaded = load_results(&path).unwrap();
        assert_eq!(loaded, merged);
        assert!(loaded["search"].optimal);
        assert!(!loaded["search_sb"].optimal);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unreadable_file_is_replaced() {
        let dir = temp_dir("garbage");
        fs::create_dir_all(&dir).unwrap();
        let path = result_path(&dir, "inst02");
        fs::write(&path, "not json").unwrap();
        assert!(load_results(&path).unwrap().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_check_results() {
        let inst = instance();
        let mut results = ResultFile::new();
        results.insert(
            "good".into(),
            ResultEntry { time: 1, optimal: true, obj: Some(3), sol: vec![vec![1, 2], vec![3]] },
        );
        results.insert(
            "bad".into(),
            ResultEntry { time: 1, optimal: true, obj: Some(2), sol: vec![vec![1, 2], vec![]] },
        );
        results.insert(
            "none".into(),
            ResultEntry { time: 300, optimal: false, obj: None, sol: vec![] },
        );

        let report = check_results(&inst, &results);
        assert_eq!(report.len(), 2);
        assert!(report["good"].is_empty());
        assert!(report["bad"].contains(&Violation::MissingPackage(3)));
        assert!(report["bad"].contains(&Violation::ObjectiveMismatch { reported: 2, actual: 3 }));
    }

    #[test]
    fn test_failed_outcome_is_not_saved() {
        let dir = temp_dir("failed");
        let path = result_path(&dir, "inst03");
        let mut failed = outcome("search_sb", SolveStatus::Unknown, 0.2);
        failed.error = Some("malformed assignment: truncated".into());

        let saved = save_results(&path, &[outcome("search", SolveStatus::Optimal, 0.5), failed], 300.0).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved.contains_key("search"));

        let _ = fs::remove_dir_all(&dir);
    }
}
