//! fogsim CLI
//!
//! Runs the placement engine over a recorded or synthetic mobility scenario

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fogsim_engine::{
    GeneratorParams, Scenario, ScenarioFeed, ScenarioGenerator, SimulationConfig,
    SimulationReport, Simulator, StrategyKind, TableMode,
};

/// fogsim: task offloading across user, fog and cloud tiers
#[derive(Parser)]
#[command(name = "fogsim")]
#[command(about = "Simulate deadline-aware task placement in a mobile fog fabric", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print the results table
    Run {
        /// Placement strategy (random, fully_random, heuristic, table-learning, table-learning-variant)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Number of ticks to simulate
        #[arg(short, long)]
        duration: Option<usize>,

        /// Scenario JSON file (a synthetic one is generated when omitted)
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Simulation config JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// RNG seed for strategies and the synthetic scenario
        #[arg(long)]
        seed: Option<u64>,

        /// Backpressure queue capacity
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Decision table mode (offline, online)
        #[arg(long)]
        table_mode: Option<String>,

        /// Directory holding per-zone decision tables
        #[arg(long)]
        table_dir: Option<PathBuf>,

        /// Output JSON file for the run report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic scenario to a JSON file
    Generate {
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of mobility frames
        #[arg(long, default_value_t = 200)]
        frames: usize,

        /// Number of task-generating vehicles
        #[arg(long, default_value_t = 20)]
        vehicles: usize,

        /// Mean task arrivals per tick
        #[arg(long, default_value_t = 3.0)]
        task_rate: f64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fogsim=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            strategy,
            duration,
            scenario,
            config,
            seed,
            queue_capacity,
            table_mode,
            table_dir,
            output,
        } => {
            let mut config = match config {
                Some(path) => SimulationConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => SimulationConfig::default(),
            };
            if let Some(strategy) = strategy {
                config.strategy = strategy.parse::<StrategyKind>()?;
            }
            if let Some(duration) = duration {
                config.duration = duration;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(capacity) = queue_capacity {
                config.queue_capacity = capacity;
            }
            if let Some(mode) = table_mode {
                config.tables.mode = mode.parse::<TableMode>()?;
            }
            if let Some(dir) = table_dir {
                config.tables.directory = dir;
            }
            config.validate()?;

            run(config, scenario, output)
        }
        Commands::Generate {
            output,
            seed,
            frames,
            vehicles,
            task_rate,
        } => {
            let params = GeneratorParams {
                frames,
                vehicles,
                task_rate,
                ..GeneratorParams::default()
            };
            let scenario = ScenarioGenerator::new(params, seed).generate()?;
            scenario
                .save(&output)
                .with_context(|| format!("writing scenario {}", output.display()))?;
            println!(
                "Wrote {} frames, {} tasks and {} zones to {}",
                scenario.frames.len(),
                scenario.tasks.len(),
                scenario.zones.len(),
                output.display()
            );
            Ok(())
        }
    }
}

fn run(
    config: SimulationConfig,
    scenario_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  fogsim placement engine                                 ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    println!("  Strategy: {}", config.strategy);
    println!("  Duration: {} ticks of {}", config.duration, config.tick_length);
    println!("  Queue capacity: {}", config.queue_capacity);
    println!("  Seed: {}", config.seed);
    if config.strategy.is_learning() {
        println!(
            "  Tables: {:?} in {}",
            config.tables.mode,
            config.tables.directory.display()
        );
    }
    println!();

    let scenario = match scenario_path {
        Some(path) => {
            println!("Loading scenario from {}...", path.display());
            Scenario::load(&path).with_context(|| format!("loading scenario {}", path.display()))?
        }
        None => {
            println!("Generating synthetic scenario...");
            let params = GeneratorParams {
                frames: config.duration + 1,
                tick_length: config.tick_length,
                ..GeneratorParams::default()
            };
            ScenarioGenerator::new(params, config.seed).generate()?
        }
    };
    println!(
        "  {} frames, {} tasks, {} fixed fog nodes, {} zones\n",
        scenario.frames.len(),
        scenario.tasks.len(),
        scenario.fixed_fog_nodes.len(),
        scenario.zones.len()
    );

    let feed = ScenarioFeed::new(scenario)?;
    let mut simulator = Simulator::new(feed, config)?;
    let report = simulator.run();

    let written = simulator.persist_tables()?;
    if !written.is_empty() {
        info!(tables = written.len(), "decision tables saved");
    }

    print_report(&report);

    if let Some(path) = output {
        println!("\nWriting report to {}...", path.display());
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(&path, json).with_context(|| format!("writing report {}", path.display()))?;
        println!("  Report saved");
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("\n╔══════════════════════════════════════════════════════════╗");
    println!("║  Simulation Results                                      ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("{:<28} {:>12}", "Metric", "Value");
    println!("{}", "-".repeat(41));
    println!("{:<28} {:>12}", "Strategy", report.strategy);
    println!("{:<28} {:>12}", "Ticks", report.ticks);
    println!("{:<28} {:>12}", "Total tasks", report.total_tasks);
    println!("{:<28} {:>12}", "Cloud tasks", report.cloud_tasks);
    println!("{:<28} {:>12}", "Delivered on time", report.on_time);
    println!("{:<28} {:>12}", "Delivered late", report.late);
    println!("{:<28} {:>12}", "Dropped (queue overflow)", report.dropped);
    println!("{:<28} {:>12}", "In flight at end", report.in_flight);
    println!("{:<28} {:>12}", "Migrations", report.migrations);
    println!("{:<28} {:>11.2}%", "Migration ratio", report.migration_ratio);
    println!("{:<28} {:>12}", "Deadline misses", report.deadline_misses);
    println!("{:<28} {:>11.2}%", "Deadline miss ratio", report.deadline_miss_ratio);

    if let Some(spread) = &report.fog_assignments {
        println!("\nFog assignments across {} nodes:", spread.nodes);
        println!("  min {}  avg {:.2}  max {}", spread.min, spread.average, spread.max);
    }
}
