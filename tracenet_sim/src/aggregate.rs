//! Multi-episode aggregation.
//!
//! Runs many independent episodes and collects their final population
//! counts into per-episode distributions. Each episode draws from its own
//! ChaCha8 streams seeded from `(master seed, episode index)`, so the
//! sequential and the rayon fan-out produce the same sequences.

use crate::context::SimContext;
use crate::runner::{EpisodeOutcome, SimulationRunner};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracenet_core::{PopulationCounts, Result, SimConfig, Strategy};
use tracing::{debug, info, warn};

/// The six per-episode sequences, index = episode order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distributions {
    pub infected: Vec<usize>,
    pub isolated: Vec<usize>,
    pub healthy_free: Vec<usize>,
    pub sick_free: Vec<usize>,
    pub sick_isolated: Vec<usize>,
    pub healthy_isolated: Vec<usize>,
}

impl Distributions {
    /// Appends one episode's final counts.
    pub fn push(&mut self, counts: &PopulationCounts) {
        self.infected.push(counts.infected());
        self.isolated.push(counts.isolated());
        self.healthy_free.push(counts.healthy_free);
        self.sick_free.push(counts.sick_free);
        self.sick_isolated.push(counts.sick_isolated);
        self.healthy_isolated.push(counts.healthy_isolated);
    }

    /// Number of episodes recorded.
    pub fn len(&self) -> usize {
        self.infected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infected.is_empty()
    }

    /// Named sequences, in persistence order.
    pub fn series(&self) -> [(&'static str, &[usize]); 6] {
        [
            ("infected", self.infected.as_slice()),
            ("isolated", self.isolated.as_slice()),
            ("healthy_free", self.healthy_free.as_slice()),
            ("sick_free", self.sick_free.as_slice()),
            ("sick_isolated", self.sick_isolated.as_slice()),
            ("healthy_isolated", self.healthy_isolated.as_slice()),
        ]
    }

    pub fn summary(&self) -> DistributionSummary {
        DistributionSummary {
            infected: SeriesSummary::from_values(&self.infected),
            isolated: SeriesSummary::from_values(&self.isolated),
            healthy_free: SeriesSummary::from_values(&self.healthy_free),
            sick_free: SeriesSummary::from_values(&self.sick_free),
            sick_isolated: SeriesSummary::from_values(&self.sick_isolated),
            healthy_isolated: SeriesSummary::from_values(&self.healthy_isolated),
        }
    }
}

/// Descriptive statistics of one sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (0 for fewer than two values)
    pub std_dev: f64,
    pub min: usize,
    pub median: f64,
    pub max: usize,
}

impl SeriesSummary {
    /// Summarizes `values`; an empty slice yields all zeros.
    pub fn from_values(values: &[usize]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let count = values.len();
        let mean = values.iter().sum::<usize>() as f64 / count as f64;
        let std_dev = if count > 1 {
            let ss: f64 = values
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let median = if count % 2 == 1 {
            sorted[count / 2] as f64
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) as f64 / 2.0
        };

        Self {
            count,
            mean,
            std_dev,
            min: sorted[0],
            median,
            max: sorted[count - 1],
        }
    }
}

/// Summaries of all six sequences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub infected: SeriesSummary,
    pub isolated: SeriesSummary,
    pub healthy_free: SeriesSummary,
    pub sick_free: SeriesSummary,
    pub sick_isolated: SeriesSummary,
    pub healthy_isolated: SeriesSummary,
}

/// Output of a multi-episode run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResults {
    /// Policy simulated
    pub strategy: Strategy,

    /// Master seed every episode seed was derived from
    pub master_seed: u64,

    /// Episodes asked for
    pub requested_episodes: usize,

    /// True if a stop signal or time budget cut the run short
    pub stopped_early: bool,

    /// Seed of each completed episode, in episode order
    pub episode_seeds: Vec<u64>,

    /// Final-count distributions
    pub distributions: Distributions,

    /// Per-episode step traces (empty unless tracing was enabled)
    pub traces: Vec<Vec<PopulationCounts>>,
}

impl RunResults {
    pub fn completed_episodes(&self) -> usize {
        self.distributions.len()
    }
}

/// Repeats episodes and collects their final counts.
pub struct RunAggregator {
    runner: SimulationRunner,
    context: SimContext,
    parallel: bool,
    stop_flag: Option<Arc<AtomicBool>>,
    time_budget: Option<Duration>,
}

impl RunAggregator {
    /// Validates `config` and prepares a run. Without a configured seed a
    /// master seed is drawn from entropy (and logged by [`run`](Self::run)).
    pub fn new(config: SimConfig) -> Result<Self> {
        let runner = SimulationRunner::new(config)?;
        let context = SimContext::from_seed_option(runner.config().seed);
        Ok(Self {
            runner,
            context,
            parallel: false,
            stop_flag: None,
            time_budget: None,
        })
    }

    /// Runs episodes on the rayon thread pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Records per-step traces for every episode.
    pub fn with_trace(mut self, record: bool) -> Self {
        self.runner = self.runner.with_trace(record);
        self
    }

    /// Cooperative stop: once `flag` is set no new episode starts.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    /// Stop starting new episodes after `budget` of wall-clock time.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn config(&self) -> &SimConfig {
        self.runner.config()
    }

    pub fn master_seed(&self) -> u64 {
        self.context.seed()
    }

    fn should_stop(&self, started: Instant) -> bool {
        let flagged = self
            .stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        let expired = self
            .time_budget
            .is_some_and(|budget| started.elapsed() >= budget);
        flagged || expired
    }

    fn try_episode(&self, index: usize, started: Instant) -> Option<EpisodeOutcome> {
        if self.should_stop(started) {
            return None;
        }
        let outcome = self
            .runner
            .run_episode(index, self.context.episode_seed(index));
        debug!(
            "Episode {} done: infected={} isolated={}",
            index,
            outcome.final_counts.infected(),
            outcome.final_counts.isolated()
        );
        Some(outcome)
    }

    /// Runs every episode and joins the results in episode order.
    pub fn run(&self) -> RunResults {
        let config = self.config();
        let requested = config.episodes;
        info!(
            "Running {} episodes of strategy {} ({}), N={}, {} steps (seed={})",
            requested,
            config.strategy,
            config.strategy.name(),
            config.population,
            config.iterations,
            self.master_seed()
        );

        let started = Instant::now();
        let outcomes: Vec<EpisodeOutcome> = if self.parallel {
            let attempts: Vec<Option<EpisodeOutcome>> = (0..requested)
                .into_par_iter()
                .map(|index| self.try_episode(index, started))
                .collect();
            leading_outcomes(attempts)
        } else {
            (0..requested)
                .map_while(|index| self.try_episode(index, started))
                .collect()
        };

        let results = self.collect(outcomes);
        if results.stopped_early {
            warn!(
                "Stopped early: {}/{} episodes completed",
                results.completed_episodes(),
                requested
            );
        }
        info!(
            "Finished {} episodes in {:.2?}",
            results.completed_episodes(),
            started.elapsed()
        );
        results
    }

    fn collect(&self, outcomes: Vec<EpisodeOutcome>) -> RunResults {
        let mut distributions = Distributions::default();
        let mut episode_seeds = Vec::with_capacity(outcomes.len());
        let mut traces = Vec::new();

        for outcome in outcomes {
            distributions.push(&outcome.final_counts);
            episode_seeds.push(outcome.seed);
            if let Some(trace) = outcome.trace {
                traces.push(trace);
            }
        }

        let requested = self.config().episodes;
        RunResults {
            strategy: self.config().strategy,
            master_seed: self.master_seed(),
            requested_episodes: requested,
            stopped_early: distributions.len() < requested,
            episode_seeds,
            distributions,
            traces,
        }
    }
}

/// Keeps the completed episodes up to the first one that never ran.
///
/// Rayon workers stop at different indices, so a parallel run can finish
/// episodes past a gap; those are dropped to keep position `i` = episode `i`.
fn leading_outcomes(attempts: Vec<Option<EpisodeOutcome>>) -> Vec<EpisodeOutcome> {
    attempts.into_iter().map_while(|outcome| outcome).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: Strategy) -> SimConfig {
        SimConfig::default()
            .with_population(150)
            .with_mean_degree(5.0)
            .with_init_sick(0.05)
            .with_iterations(6)
            .with_episodes(12)
            .with_testing(15, 0.8)
            .with_pool_size(4)
            .with_infection(0.08, 0.008)
            .with_strategy(strategy)
            .with_seed(42)
    }

    #[test]
    fn test_collects_one_entry_per_episode() {
        let results = RunAggregator::new(config(Strategy::NoisyTrace)).unwrap().run();
        assert_eq!(results.completed_episodes(), 12);
        assert!(!results.stopped_early);
        assert_eq!(results.episode_seeds.len(), 12);
        for (_, series) in results.distributions.series() {
            assert_eq!(series.len(), 12);
        }
        for i in 0..12 {
            let d = &results.distributions;
            assert_eq!(d.infected[i], d.sick_free[i] + d.sick_isolated[i]);
            assert_eq!(d.isolated[i], d.healthy_isolated[i] + d.sick_isolated[i]);
            assert_eq!(
                d.healthy_free[i] + d.sick_free[i] + d.sick_isolated[i] + d.healthy_isolated[i],
                150
            );
        }
    }

    #[test]
    fn test_same_seed_same_distributions() {
        for strategy in Strategy::all() {
            let a = RunAggregator::new(config(strategy)).unwrap().run();
            let b = RunAggregator::new(config(strategy)).unwrap().run();
            assert_eq!(a.distributions, b.distributions, "strategy {strategy}");
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = RunAggregator::new(config(Strategy::PooledTrace))
            .unwrap()
            .run();
        let parallel = RunAggregator::new(config(Strategy::PooledTrace))
            .unwrap()
            .with_parallel(true)
            .run();
        assert_eq!(sequential.distributions, parallel.distributions);
        assert_eq!(sequential.episode_seeds, parallel.episode_seeds);
    }

    #[test]
    fn test_stop_flag_prevents_new_episodes() {
        let flag = Arc::new(AtomicBool::new(true));
        let results = RunAggregator::new(config(Strategy::NoIsolation))
            .unwrap()
            .with_stop_flag(flag)
            .run();
        assert_eq!(results.completed_episodes(), 0);
        assert!(results.stopped_early);
        assert_eq!(results.requested_episodes, 12);
    }

    #[test]
    fn test_parallel_stop_keeps_episode_prefix() {
        let flag = Arc::new(AtomicBool::new(false));
        let aggregator = RunAggregator::new(config(Strategy::FullTrace).with_episodes(400))
            .unwrap()
            .with_parallel(true)
            .with_stop_flag(Arc::clone(&flag));

        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let results = std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(20));
                flag.store(true, Ordering::Relaxed);
            });
            pool.install(|| aggregator.run())
        });

        let context = SimContext::new(42);
        assert_eq!(results.episode_seeds.len(), results.completed_episodes());
        for (i, seed) in results.episode_seeds.iter().enumerate() {
            assert_eq!(*seed, context.episode_seed(i), "position {i}");
        }

        let sequential = RunAggregator::new(
            config(Strategy::FullTrace).with_episodes(results.completed_episodes()),
        )
        .unwrap()
        .run();
        assert_eq!(sequential.distributions, results.distributions);
    }

    #[test]
    fn test_leading_outcomes_stops_at_first_gap() {
        let runner = SimulationRunner::new(config(Strategy::NoIsolation)).unwrap();
        let attempts = vec![
            Some(runner.run_episode(0, 10)),
            Some(runner.run_episode(1, 11)),
            None,
            Some(runner.run_episode(3, 13)),
        ];
        let kept: Vec<usize> = leading_outcomes(attempts)
            .iter()
            .map(|outcome| outcome.episode)
            .collect();
        assert_eq!(kept, vec![0, 1]);
        assert!(leading_outcomes(vec![None, Some(runner.run_episode(1, 11))]).is_empty());
    }

    #[test]
    fn test_zero_time_budget_stops_immediately() {
        let results = RunAggregator::new(config(Strategy::NoIsolation))
            .unwrap()
            .with_time_budget(Duration::ZERO)
            .run();
        assert!(results.stopped_early);
        assert!(results.distributions.is_empty());
    }

    #[test]
    fn test_traces_collected_when_enabled() {
        let results = RunAggregator::new(config(Strategy::Reopening))
            .unwrap()
            .with_trace(true)
            .run();
        assert_eq!(results.traces.len(), 12);
        assert!(results.traces.iter().all(|t| t.len() == 7));
    }

    #[test]
    fn test_series_summary() {
        let summary = SeriesSummary::from_values(&[4, 1, 3, 2]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 1);
        assert_eq!(summary.max, 4);
        assert!((summary.mean - 2.5).abs() < 1e-12);
        assert!((summary.median - 2.5).abs() < 1e-12);
        // Sample variance of 1..=4 is 5/3
        assert!((summary.std_dev - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);

        assert_eq!(SeriesSummary::from_values(&[]), SeriesSummary::default());
        assert_eq!(SeriesSummary::from_values(&[7]).std_dev, 0.0);
    }
}
