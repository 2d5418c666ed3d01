//! TraceNet simulator CLI
//!
//! Run batches of epidemic episodes under one or all testing/isolation
//! strategies and optionally persist the resulting distributions.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracenet_core::config::{DEFAULT_R0, ISOLATED_INFECTION_FACTOR};
use tracenet_core::{Result, SimConfig, SimError, Strategy};
use tracenet_sim::exporter::{prepare_run_dir, write_results};
use tracenet_sim::{RunAggregator, RunResults, SimContext};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// TraceNet contact-network epidemic simulator
#[derive(Parser, Debug)]
#[command(name = "tracenet-sim")]
#[command(about = "Compare testing and isolation strategies on a random contact network", long_about = None)]
struct Args {
    /// Strategy to run (A-H, a strategy name, or "all")
    #[arg(short = 'S', long, default_value = "D")]
    strategy: String,

    /// Population size
    #[arg(short = 'n', long, default_value = "10000")]
    population: usize,

    /// Expected contacts per person
    #[arg(long, default_value = "20")]
    mean_degree: f64,

    /// Tests available per step (individual tests or pools)
    #[arg(short, long, default_value = "100")]
    tests: usize,

    /// Members per pooled test
    #[arg(long, default_value = "10")]
    pool_size: usize,

    /// Steps per episode
    #[arg(short, long, default_value = "10")]
    iterations: usize,

    /// Number of episodes
    #[arg(short, long, default_value = "100")]
    episodes: usize,

    /// Basic reproduction number; sets the infection probability to
    /// r0 / (mean_degree * iterations)
    #[arg(long, conflicts_with = "p_infect")]
    r0: Option<f64>,

    /// Infection probability per contact and step (mutually exclusive with --r0)
    #[arg(long)]
    p_infect: Option<f64>,

    /// Infection probability from an isolated carrier (default: 0.1 * p_infect)
    #[arg(long)]
    p_infect_isolated: Option<f64>,

    /// Test sensitivity
    #[arg(long, default_value = "0.7")]
    test_positive: f64,

    /// Probability that a node starts out sick
    #[arg(long, default_value = "0.01")]
    init_sick: f64,

    /// Probability that a traced contact is isolated
    #[arg(long, default_value = "0.25")]
    isolate_nbr: f64,

    /// Master seed (random if omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Directory to write results under
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run episodes in parallel
    #[arg(long)]
    parallel: bool,

    /// Record and persist per-step counts
    #[arg(long)]
    trace: bool,

    /// Stop starting new episodes after this many seconds (per strategy)
    #[arg(long)]
    time_budget: Option<f64>,

    /// JSON summary on stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn strategies(&self) -> Result<Vec<Strategy>> {
        if self.strategy.eq_ignore_ascii_case("all") {
            Ok(Strategy::all())
        } else {
            Ok(vec![self.strategy.parse()?])
        }
    }

    fn time_budget(&self) -> Result<Option<Duration>> {
        self.time_budget
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|_| SimError::invalid(format!("invalid time budget: {secs}")))
            })
            .transpose()
    }

    /// Configuration shared by every strategy of this invocation.
    ///
    /// Fails on a negative or non-finite `--r0`.
    fn base_config(&self, master_seed: u64) -> Result<SimConfig> {
        let p_infect = match self.p_infect {
            Some(p) => p,
            None => SimConfig::checked_infection_from_r0(
                self.r0.unwrap_or(DEFAULT_R0),
                self.mean_degree,
                self.iterations,
            )?,
        };
        let p_infect_isolated = self
            .p_infect_isolated
            .unwrap_or(ISOLATED_INFECTION_FACTOR * p_infect);

        Ok(SimConfig::default()
            .with_population(self.population)
            .with_mean_degree(self.mean_degree)
            .with_testing(self.tests, self.test_positive)
            .with_pool_size(self.pool_size)
            .with_iterations(self.iterations)
            .with_episodes(self.episodes)
            .with_infection(p_infect, p_infect_isolated)
            .with_init_sick(self.init_sick)
            .with_isolate_neighbor(self.isolate_nbr)
            .with_seed(master_seed))
    }
}

fn log_results(results: &RunResults) {
    let summary = results.distributions.summary();
    info!(
        "{} ({}): {}/{} episodes",
        results.strategy,
        results.strategy.name(),
        results.completed_episodes(),
        results.requested_episodes
    );
    info!(
        "  infected  mean={:.1} sd={:.1} median={:.1} range=[{}, {}]",
        summary.infected.mean,
        summary.infected.std_dev,
        summary.infected.median,
        summary.infected.min,
        summary.infected.max
    );
    info!(
        "  isolated  mean={:.1} sd={:.1} median={:.1} range=[{}, {}]",
        summary.isolated.mean,
        summary.isolated.std_dev,
        summary.isolated.median,
        summary.isolated.min,
        summary.isolated.max
    );
    info!(
        "  healthy_free={:.1} sick_free={:.1} sick_isolated={:.1} healthy_isolated={:.1}",
        summary.healthy_free.mean,
        summary.sick_free.mean,
        summary.sick_isolated.mean,
        summary.healthy_isolated.mean
    );
}

fn run(args: &Args) -> Result<()> {
    let strategies = args.strategies()?;
    let time_budget = args.time_budget()?;

    // One master seed for every strategy, so they all see the same graphs
    // and initial outbreaks.
    let master_seed = SimContext::from_seed_option(args.seed).seed();
    let base = args.base_config(master_seed)?;

    // Validate everything and create output locations before simulating.
    let mut jobs = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let config = base.clone().with_strategy(strategy);
        let mut aggregator = RunAggregator::new(config.clone())?
            .with_parallel(args.parallel)
            .with_trace(args.trace);
        if let Some(budget) = time_budget {
            aggregator = aggregator.with_time_budget(budget);
        }
        let dir = args
            .output
            .as_deref()
            .map(|root| prepare_run_dir(root, &config))
            .transpose()?;
        jobs.push((config, aggregator, dir));
    }

    if !args.json {
        info!("TraceNet Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "N={} mean_degree={} p_infect={:.5} p_infect_isolated={:.5} seed={}",
            base.population, base.mean_degree, base.p_infect, base.p_infect_isolated, master_seed
        );
    }

    let mut summaries = Vec::with_capacity(jobs.len());
    for (config, aggregator, dir) in jobs {
        let results = aggregator.run();

        if let Some(dir) = dir {
            write_results(&dir, &config, &results)?;
        }

        if args.json {
            summaries.push(serde_json::json!({
                "strategy": config.strategy.letter().to_string(),
                "name": config.strategy.name(),
                "seed": results.master_seed,
                "requested_episodes": results.requested_episodes,
                "completed_episodes": results.completed_episodes(),
                "stopped_early": results.stopped_early,
                "summary": results.distributions.summary(),
            }));
        } else {
            log_results(&results);
        }
    }

    if args.json {
        let out = serde_json::to_string_pretty(&summaries).map_err(SimError::serialization)?;
        println!("{out}");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    if let Err(e) = run(&args) {
        error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_r0_is_rejected() {
        let args = Args::parse_from(["tracenet-sim", "--r0=-3"]);
        assert!(matches!(
            args.base_config(1),
            Err(SimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_r0_sets_infection_probability() {
        let args = Args::parse_from(["tracenet-sim", "--r0", "4", "--mean-degree", "8", "-i", "5"]);
        let config = args.base_config(1).unwrap();
        assert!((config.p_infect - 0.1).abs() < 1e-12);
        assert!((config.p_infect_isolated - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_r0_and_p_infect_conflict() {
        let parsed = Args::try_parse_from(["tracenet-sim", "--r0", "4", "--p-infect", "0.1"]);
        assert!(parsed.is_err());
    }
}
