//! MCP Solver - Command Line Interface
//!
//! Solves Multiple Couriers Problem instances, runs batches over instance
//! directories, exports the model for external solvers and checks result files.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use mcp_solver::backend::{LpWriter, MiniZincWriter, ModelTranslator, SmtLibWriter, SolveConfig};
use mcp_solver::benchmark::{load_instances_from_dir, Batch, BatchConfig};
use mcp_solver::bounds::Bounds;
use mcp_solver::instance::McpInstance;
use mcp_solver::model::{ModelBuilder, SymmetryBreaking};
use mcp_solver::report;
use mcp_solver::solver::{best_solution, Configuration, McpSolver, SolverConfig};

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "mcp-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Modeling, bounding and decoding core for the Multiple Couriers Problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance under every configuration
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        /// Time limit per configuration in seconds
        #[arg(short, long, default_value = "300")]
        time_limit: f64,

        /// Comma-separated configurations: search, search_sb, search_sb_load
        #[arg(short, long, default_value = "search,search_sb")]
        configurations: String,

        /// Directory for the JSON result file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run configurations one after the other
        #[arg(long)]
        sequential: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Solve every .dat instance of a directory
    Batch {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Directory for the per-instance JSON result files
        #[arg(short, long, default_value = "res")]
        output: PathBuf,

        /// Directory for results.csv, statistics.csv and report.txt
        #[arg(long, default_value = "results")]
        summary: PathBuf,

        #[arg(short, long, default_value = "300")]
        time_limit: f64,

        #[arg(short, long, default_value = "search,search_sb")]
        configurations: String,

        /// Maximum number of packages
        #[arg(long)]
        max_packages: Option<usize>,

        #[arg(long)]
        sequential: bool,
    },

    /// Analyze an instance: statistics, bounds and model size
    Analyze {
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Write the model of an instance for an external solver
    Export {
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(short, long, value_enum, default_value = "smt2")]
        format: ExportFormat,

        #[arg(short, long, value_enum, default_value = "none")]
        symmetry: Symmetry,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate random feasible instances
    Generate {
        #[arg(short = 'm', long, default_value = "3")]
        couriers: usize,

        #[arg(short = 'n', long, default_value = "8")]
        packages: usize,

        /// Number of instances
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Seed of the first instance, incremented for each following one
        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[arg(short, long, default_value = "instances")]
        output: PathBuf,
    },

    /// Check a JSON result file against its instance
    Check {
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(short, long)]
        results: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum ExportFormat {
    /// SMT-LIB 2 with an optimization objective
    Smt2,
    /// Flat MiniZinc model
    Mzn,
    /// CPLEX LP for MIP solvers
    Lp,
    /// MiniZinc data file of the instance only
    Dzn,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Symmetry {
    None,
    /// Lexicographic first stops among equal-capacity couriers
    Lex,
    /// Lexicographic plus loads ordered by capacity
    Load,
}

impl From<Symmetry> for SymmetryBreaking {
    fn from(symmetry: Symmetry) -> Self {
        match symmetry {
            Symmetry::None => SymmetryBreaking::None,
            Symmetry::Lex => SymmetryBreaking::Lexicographic,
            Symmetry::Load => SymmetryBreaking::LoadOrdered,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve { instance, time_limit, configurations, output, sequential, verbose } => {
            solve_instance(&instance, time_limit, &configurations, output, sequential, verbose);
        }

        Commands::Batch { dir, output, summary, time_limit, configurations, max_packages, sequential } => {
            run_batch(&dir, &output, &summary, time_limit, &configurations, max_packages, sequential);
        }

        Commands::Analyze { instance } => {
            analyze_instance(&instance);
        }

        Commands::Export { instance, format, symmetry, output } => {
            export_model(&instance, format, symmetry, output);
        }

        Commands::Generate { couriers, packages, count, seed, output } => {
            generate_instances(couriers, packages, count, seed, &output);
        }

        Commands::Check { instance, results } => {
            check_results(&instance, &results);
        }
    }
}

fn load_instance(path: &Path) -> McpInstance {
    match McpInstance::from_file(path) {
        Ok(inst) => inst,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}

fn parse_configurations(names: &str) -> Vec<Configuration> {
    match Configuration::parse_list(names) {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => {
            eprintln!("No configuration given");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }
}

fn solve_instance(
    path: &Path,
    time_limit: f64,
    configurations: &str,
    output: Option<PathBuf>,
    sequential: bool,
    verbose: bool,
) {
    println!("Loading instance from {:?}...", path);
    let instance = load_instance(path);

    if verbose {
        println!("{}", instance.statistics());
    }

    let config = SolverConfig {
        solve: SolveConfig::with_time_limit(time_limit),
        configurations: parse_configurations(configurations),
        parallel: !sequential,
    };
    let solver = McpSolver::new(config);

    println!("Solving {} configuration(s)...", solver.config().configurations.len());
    let start = Instant::now();
    let outcomes = match solver.solve(&instance) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let elapsed = start.elapsed().as_secs_f64();

    println!("\n========== Results ==========");
    println!("{:<18} {:>10} {:>10} {:>10} {:>12}", "Configuration", "Status", "Objective", "Time (s)", "Nodes");
    for outcome in &outcomes {
        let objective = outcome
            .solution
            .as_ref()
            .map(|s| s.objective.to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = if outcome.is_failed() { "ERROR".to_string() } else { outcome.status.to_string() };
        println!(
            "{:<18} {:>10} {:>10} {:>10.3} {:>12}",
            outcome.configuration, status, objective, outcome.elapsed, outcome.nodes
        );
        if let Some(error) = &outcome.error {
            println!("  {}", error);
        }
    }

    match best_solution(&outcomes) {
        Some(best) => {
            println!("\n{}", best);
            if verbose {
                println!("Loads: {:?}", best.loads(&instance));
                println!("Total distance: {}", best.total_distance());
            }
        }
        None => println!("\nNo solution found"),
    }
    println!("Wall time: {:.3}s", elapsed);

    if let Some(dir) = output {
        let path = report::result_path(&dir, &instance.name);
        match report::save_results(&path, &outcomes, time_limit) {
            Ok(_) => println!("Results saved to {:?}", path),
            Err(e) => {
                eprintln!("Error saving results: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_batch(
    dir: &Path,
    output: &Path,
    summary: &Path,
    time_limit: f64,
    configurations: &str,
    max_packages: Option<usize>,
    sequential: bool,
) {
    println!("Loading instances from {:?}...", dir);

    let mut instances = match load_instances_from_dir(dir) {
        Ok(instances) => instances,
        Err(e) => {
            eprintln!("Error reading {:?}: {}", dir, e);
            std::process::exit(1);
        }
    };

    if let Some(max) = max_packages {
        instances.retain(|i| i.num_packages() <= max);
    }

    println!("Found {} instances", instances.len());

    if instances.is_empty() {
        eprintln!("No instances found!");
        return;
    }

    let config = BatchConfig {
        time_limit,
        configurations: parse_configurations(configurations),
        parallel: !sequential,
        save_results: true,
        output_dir: output.to_string_lossy().to_string(),
    };

    let progress = ProgressBar::new(instances.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
        progress.set_style(style);
    }

    let mut batch = Batch::new(config);
    batch.run_on_instances(&instances, |instance| {
        progress.set_message(instance.name.clone());
        progress.inc(1);
    });
    progress.finish_with_message("done");

    if let Err(e) = batch.write_outputs(summary) {
        eprintln!("Error writing summary: {}", e);
        std::process::exit(1);
    }

    println!("\n{}", batch.generate_report());
    println!("Result files written to {:?}", output);
    println!("Summary written to {:?}", summary);
}

fn analyze_instance(path: &Path) {
    let instance = load_instance(path);

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let bounds = match Bounds::compute(&instance) {
        Ok(bounds) => bounds,
        Err(e) => {
            println!("Bounds: {}", e);
            return;
        }
    };
    println!("{}", bounds);

    println!("Model size:");
    for mode in [SymmetryBreaking::None, SymmetryBreaking::Lexicographic, SymmetryBreaking::LoadOrdered] {
        match ModelBuilder::new(&instance, &bounds).with_symmetry_breaking(mode).build() {
            Ok(route) => {
                println!(
                    "  {:<6} {} variables, {} constraints",
                    mode.name(),
                    route.model.var_count(),
                    route.model.constraint_count()
                );
                for (kind, count) in route.model.constraint_counts() {
                    println!("           {:<14} {}", kind, count);
                }
            }
            Err(e) => println!("  {:<6} failed: {}", mode.name(), e),
        }
    }
}

fn export_model(path: &Path, format: ExportFormat, symmetry: Symmetry, output: Option<PathBuf>) {
    let instance = load_instance(path);

    let text = if format == ExportFormat::Dzn {
        Ok(instance.to_dzn())
    } else {
        Bounds::compute(&instance).and_then(|bounds| {
            let route = ModelBuilder::new(&instance, &bounds)
                .with_symmetry_breaking(symmetry.into())
                .build()?;
            match format {
                ExportFormat::Smt2 => SmtLibWriter::new().translate(&route.model),
                ExportFormat::Lp => LpWriter::new().translate(&route.model),
                _ => MiniZincWriter::new().translate(&route.model),
            }
        })
    };

    let text = match text {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(file) => {
            if let Err(e) = std::fs::write(&file, text) {
                eprintln!("Error writing {:?}: {}", file, e);
                std::process::exit(1);
            }
            println!("Model written to {:?}", file);
        }
        None => print!("{}", text),
    }
}

fn generate_instances(couriers: usize, packages: usize, count: usize, seed: u64, output: &Path) {
    if let Err(e) = std::fs::create_dir_all(output) {
        eprintln!("Error creating {:?}: {}", output, e);
        std::process::exit(1);
    }

    for k in 0..count as u64 {
        let name = format!("rand_m{}_n{}_s{}", couriers, packages, seed + k);
        let instance = match McpInstance::random(&name, couriers, packages, seed + k) {
            Ok(instance) => instance,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };
        let file = output.join(format!("{}.dat", name));
        if let Err(e) = std::fs::write(&file, instance.to_dat()) {
            eprintln!("Error writing {:?}: {}", file, e);
            std::process::exit(1);
        }
        println!("Wrote {:?}", file);
    }
}

fn check_results(instance_path: &Path, results_path: &Path) {
    let instance = load_instance(instance_path);
    let results = match report::load_results(results_path) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error reading results: {}", e);
            std::process::exit(1);
        }
    };

    let report = report::check_results(&instance, &results);
    let mut failures = 0;
    for (configuration, entry) in &results {
        match report.get(configuration) {
            Some(violations) if !violations.is_empty() => {
                failures += 1;
                println!("{:<18} INVALID", configuration);
                for violation in violations {
                    println!("    {}", violation);
                }
            }
            Some(_) => println!("{:<18} valid (obj {})", configuration, entry.obj.unwrap_or_default()),
            None => println!("{:<18} no solution", configuration),
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
}
