//! Rigel simulation CLI
//!
//! Runs built-in scenarios or JSON run plans against the simulated runtime
//! and prints each requirements report.

use anyhow::{bail, Context};
use clap::Parser;
use rigel_sim::{RunExport, RunPlan, ScenarioId, ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Rigel deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "rigel-sim")]
#[command(
    about = "Run simulated ROS simulations and evaluate their requirements",
    long_about = None
)]
struct Args {
    /// Scenario to run (equals_done, timeout, breakpoint, ..., all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// JSON run plan to run instead of the built-in scenarios
    #[arg(short, long)]
    plan: Option<PathBuf>,

    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of consecutive seeds to run (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Upper bound of random message delivery delay
    #[arg(long, default_value = "0")]
    jitter_ms: u64,

    /// Monitoring poll interval
    #[arg(long, default_value = "100")]
    poll_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export all results to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// What one invocation runs.
enum Target {
    Scenarios(Vec<ScenarioId>),
    Plan(String, RunPlan),
}

impl Target {
    fn from_args(args: &Args) -> anyhow::Result<Self> {
        if let Some(path) = &args.plan {
            let plan = RunPlan::load(path)
                .with_context(|| format!("Cannot load run plan {}", path.display()))?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "plan".to_string());
            return Ok(Target::Plan(name, plan));
        }

        if args.scenario == "all" {
            return Ok(Target::Scenarios(ScenarioId::all()));
        }
        match args.scenario.parse::<ScenarioId>() {
            Ok(id) => Ok(Target::Scenarios(vec![id])),
            Err(e) => {
                let names: Vec<_> = ScenarioId::all().iter().map(|id| id.name()).collect();
                bail!("{}. Available scenarios: {}, all", e, names.join(", "))
            }
        }
    }
}

fn print_result(result: &ScenarioResult) {
    if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario, result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario,
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
    if !result.report.is_empty() {
        print!("{}", result.report);
    }
    for failure in &result.teardown_errors {
        error!("  teardown: {}", failure);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let target = Target::from_args(&args)?;

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    if !args.json {
        info!("Rigel simulation oracle v{}", env!("CARGO_PKG_VERSION"));
    }

    let mut export = RunExport::new(base_seed, args.jitter_ms);
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_jitter(args.jitter_ms)
            .with_poll_interval(Duration::from_millis(args.poll_ms));

        let results = match &target {
            Target::Plan(name, plan) => vec![runner.run_plan(name, plan.clone()).await],
            Target::Scenarios(ids) => {
                let mut results = Vec::with_capacity(ids.len());
                for id in ids {
                    results.push(runner.run(*id).await);
                }
                results
            }
        };

        for result in results {
            if !args.json {
                print_result(&result);
            }
            export.add_result(result);
        }
    }

    if args.json {
        println!("{}", export.to_json()?);
    } else if export.all_passed() {
        info!("All {} runs passed", export.passed);
    } else {
        error!("{}/{} runs failed", export.failed, export.results.len());
    }

    if let Some(path) = &args.export {
        export
            .write_to_file(path)
            .with_context(|| format!("Failed to write export to {}", path))?;
        info!("Exported {} results to {}", export.results.len(), path);
    }

    // Exit with proper code for CI
    if !export.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}
