//! Stratus simulator CLI
//!
//! Runs a synthetic workload through the scheduler and prints the final
//! SLA/energy report.

use clap::Parser;
use std::fs;
use tracing_subscriber::EnvFilter;

use stratus_core::{PolicyKind, SchedulerConfig, SimTime};
use stratus_sim::workload::{build_cluster, ClusterShape, WorkloadGenerator};
use stratus_sim::SimulationEngine;

#[derive(Parser, Debug)]
#[command(name = "stratus-sim")]
#[command(about = "Simulate the Stratus cluster scheduler on a synthetic workload", long_about = None)]
struct Args {
    /// Number of machines in the cluster
    #[arg(short, long, default_value_t = 32)]
    machines: usize,

    /// Installed memory per machine (MB)
    #[arg(long, default_value_t = 16_384)]
    memory_mb: u64,

    /// Number of tasks to generate
    #[arg(short, long, default_value_t = 200)]
    tasks: usize,

    /// Simulated duration in seconds
    #[arg(short, long, default_value_t = 600)]
    duration_secs: u64,

    /// Placement policy (greedy, first-fit)
    #[arg(short, long, default_value_t = PolicyKind::Greedy)]
    policy: PolicyKind,

    /// Lowest-id machines kept always on
    #[arg(long, default_value_t = 16)]
    min_active: usize,

    /// Memory utilization ceiling for placements
    #[arg(long, default_value_t = 1.0)]
    max_util: f64,

    /// Memory overhead charged per VM (MB)
    #[arg(long, default_value_t = 8)]
    vm_overhead_mb: u64,

    /// Periodic check cadence in seconds
    #[arg(long, default_value_t = 10)]
    tick_secs: u64,

    /// Workload RNG seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Write the report as JSON to this path
    #[arg(short, long)]
    output: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = SchedulerConfig {
        min_active_machines: args.min_active.min(args.machines),
        max_util: args.max_util,
        vm_overhead_mb: args.vm_overhead_mb,
        policy: args.policy,
    };

    let shape = ClusterShape {
        machines: args.machines,
        memory_mb: args.memory_mb,
    };
    let cluster = build_cluster(&shape, args.vm_overhead_mb);
    let horizon = SimTime(args.duration_secs * 1_000_000);

    let mut engine = SimulationEngine::new(cluster, config, horizon, args.tick_secs * 1_000_000);
    let mut generator = match WorkloadGenerator::new(args.seed, args.machines) {
        Ok(generator) => generator,
        Err(err) => {
            eprintln!("failed to build workload generator: {err}");
            std::process::exit(1);
        }
    };
    for task in generator.generate(args.tasks, horizon) {
        engine.add_task(task.id, task.spec, task.arrival, task.duration_us);
    }

    println!(
        "stratus-sim: {} machines, {} tasks, {} policy, {}s horizon",
        args.machines, args.tasks, args.policy, args.duration_secs
    );

    match engine.run() {
        Ok(report) => {
            println!("{report}");
            if let Some(path) = args.output {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => {
                        if let Err(err) = fs::write(&path, json) {
                            eprintln!("failed to write {path}: {err}");
                            std::process::exit(1);
                        }
                        println!("report written to {path}");
                    }
                    Err(err) => {
                        eprintln!("failed to serialize report: {err}");
                        std::process::exit(1);
                    }
                }
            }
        }
        Err(err) => {
            eprintln!("simulation failed: {err}");
            std::process::exit(1);
        }
    }
}
