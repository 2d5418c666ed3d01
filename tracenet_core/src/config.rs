//! Simulation parameters.

use crate::error::{Result, SimError};
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Median basic reproduction number used for the default infection rate.
pub const DEFAULT_R0: f64 = 5.7;

/// Isolated carriers transmit at this fraction of the free rate by default.
pub const ISOLATED_INFECTION_FACTOR: f64 = 0.1;

/// Parameter bundle for a batch of episodes.
///
/// Built once, validated, then shared read-only by every episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of people (graph nodes)
    pub population: usize,

    /// Expected number of contacts per person
    pub mean_degree: f64,

    /// Probability that a node is infected at episode start
    pub p_init_sick: f64,

    /// Test sensitivity; no false positives are modeled
    pub test_positive: f64,

    /// Tests (individual or pooled) available per step
    pub test_capacity: usize,

    /// Members per pooled test
    pub pool_size: usize,

    /// Per-contact, per-step transmission probability from a free carrier
    pub p_infect: f64,

    /// Per-contact, per-step transmission probability from an isolated carrier
    pub p_infect_isolated: f64,

    /// Probability that a traced contact is isolated (noisy tracing)
    pub p_isolate_neighbor: f64,

    /// Steps per episode
    pub iterations: usize,

    /// Independent episodes per run
    pub episodes: usize,

    /// Testing/isolation policy
    pub strategy: Strategy,

    /// Master seed (None = fresh entropy)
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mean_degree = 20.0;
        let iterations = 10;
        let p_infect = Self::infection_from_r0(DEFAULT_R0, mean_degree, iterations);
        Self {
            population: 10_000,
            mean_degree,
            p_init_sick: 0.01,
            test_positive: 0.7,
            test_capacity: 100,
            pool_size: 10,
            p_infect,
            p_infect_isolated: ISOLATED_INFECTION_FACTOR * p_infect,
            p_isolate_neighbor: 0.25,
            iterations,
            episodes: 100,
            strategy: Strategy::NoIsolation,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Per-contact, per-step infection probability that yields roughly `r0`
    /// secondary cases over the whole episode.
    ///
    /// `p = r0 / (mean_degree * iterations)`, clamped to `[0, 1]`.
    pub fn infection_from_r0(r0: f64, mean_degree: f64, iterations: usize) -> f64 {
        let exposures = mean_degree * iterations as f64;
        if exposures <= 0.0 {
            return 0.0;
        }
        (r0 / exposures).clamp(0.0, 1.0)
    }

    /// Like [`infection_from_r0`](Self::infection_from_r0), but rejects a
    /// negative or non-finite `r0` and warns when the result is capped at 1.
    pub fn checked_infection_from_r0(r0: f64, mean_degree: f64, iterations: usize) -> Result<f64> {
        if !r0.is_finite() || r0 < 0.0 {
            return Err(SimError::invalid(format!(
                "r0 must be a non-negative number, got {r0}"
            )));
        }
        let exposures = mean_degree * iterations as f64;
        if exposures > 0.0 && r0 > exposures {
            warn!(
                "r0={} exceeds mean_degree * iterations = {}; infection probability capped at 1",
                r0, exposures
            );
        }
        Ok(Self::infection_from_r0(r0, mean_degree, iterations))
    }

    pub fn with_population(mut self, population: usize) -> Self {
        self.population = population;
        self
    }

    pub fn with_mean_degree(mut self, mean_degree: f64) -> Self {
        self.mean_degree = mean_degree;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_episodes(mut self, episodes: usize) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_testing(mut self, test_capacity: usize, test_positive: f64) -> Self {
        self.test_capacity = test_capacity;
        self.test_positive = test_positive;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets both transmission probabilities.
    pub fn with_infection(mut self, p_infect: f64, p_infect_isolated: f64) -> Self {
        self.p_infect = p_infect;
        self.p_infect_isolated = p_infect_isolated;
        self
    }

    pub fn with_init_sick(mut self, p_init_sick: f64) -> Self {
        self.p_init_sick = p_init_sick;
        self
    }

    pub fn with_isolate_neighbor(mut self, p_isolate_neighbor: f64) -> Self {
        self.p_isolate_neighbor = p_isolate_neighbor;
        self
    }

    /// Checks every parameter; a configuration that passes never fails later.
    pub fn validate(&self) -> Result<()> {
        if self.population == 0 {
            return Err(SimError::invalid("population must be positive"));
        }
        if !self.mean_degree.is_finite() || self.mean_degree < 0.0 {
            return Err(SimError::invalid(format!(
                "mean_degree must be a non-negative number, got {}",
                self.mean_degree
            )));
        }

        let probabilities = [
            ("p_init_sick", self.p_init_sick),
            ("test_positive", self.test_positive),
            ("p_infect", self.p_infect),
            ("p_infect_isolated", self.p_infect_isolated),
            ("p_isolate_neighbor", self.p_isolate_neighbor),
        ];
        for (name, value) in probabilities {
            check_probability(name, value)?;
        }

        if self.strategy.is_pooled() && self.pool_size == 0 {
            return Err(SimError::invalid(format!(
                "strategy {} needs pool_size >= 1",
                self.strategy.letter()
            )));
        }
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::invalid(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}
