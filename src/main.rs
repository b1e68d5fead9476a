use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use fitalloc::workload::{Workload, replay};
use fitalloc::{Allocator, Config, Policy, Strategy, SystemSupplier};

/// Replays a random allocate/release trace against each placement policy and
/// reports time and memory utilization.
#[derive(Debug, Parser)]
#[command(name = "fitalloc")]
struct Cli {
    /// Policy to run (first, best, worst); all three when omitted.
    #[arg(long)]
    policy: Option<Policy>,
    /// Number of operations in the trace.
    #[arg(long, default_value_t = 100_000)]
    ops: usize,
    #[arg(long, default_value_t = 0x2545_f491_4f6c_dd1d)]
    seed: u64,
    /// Smallest request size in bytes.
    #[arg(long, default_value_t = 8)]
    min_size: usize,
    /// Largest request size in bytes.
    #[arg(long, default_value_t = 4000)]
    max_size: usize,
    /// Roughly one op in this many releases a live object.
    #[arg(long, default_value_t = 3)]
    release_every: u64,
    /// Bytes requested from the system per refill.
    #[arg(long, default_value_t = 4096)]
    page_size: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config {
        page_size: cli.page_size,
        min_request: cli.min_size,
        max_request: cli.max_size,
    };
    if let Err(err) = config.validate() {
        eprintln!("fitalloc: {err}");
        return ExitCode::FAILURE;
    }

    let trace = Workload {
        seed: cli.seed,
        ops: cli.ops,
        min_size: cli.min_size,
        max_size: cli.max_size,
        release_every: cli.release_every,
    }
    .trace();

    let policies = match cli.policy {
        Some(policy) => vec![policy],
        None => Policy::ALL.to_vec(),
    };

    println!("{:<10} {:>10} {:>8} {:>12} {:>12}", "policy", "time", "pages", "end util", "mean util");
    for policy in policies {
        let mut alloc = match Allocator::with_config(config, policy, SystemSupplier::new()) {
            Ok(alloc) => alloc,
            Err(err) => {
                eprintln!("fitalloc: {err}");
                return ExitCode::FAILURE;
            }
        };

        let start = Instant::now();
        let report = match replay(&mut alloc, &trace) {
            Ok(report) => report,
            Err(err) => {
                eprintln!("fitalloc: {policy}: {err}");
                return ExitCode::FAILURE;
            }
        };
        let elapsed = start.elapsed();

        println!(
            "{:<10} {:>8}ms {:>8} {:>11.1}% {:>11.1}%",
            alloc.strategy().name(),
            elapsed.as_millis(),
            report.end.pages,
            report.end.utilization() * 100.0,
            report.mean_utilization * 100.0,
        );
        log::debug!("{policy}: {}", report.end);
        alloc.finalize();
    }

    ExitCode::SUCCESS
}
