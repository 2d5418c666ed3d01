//! Testing and isolation policies.
//!
//! Each policy runs once per timestep, before infection spreads, and only
//! touches the isolated set. Test results carry no memory between steps: a
//! node sampled again later is tested afresh, and releasing a node never
//! shields it from being isolated again.

use crate::config::SimConfig;
use crate::error::SimError;
use crate::graph::{Graph, NodeId};
use crate::state::SimulationState;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Policy identifiers, one variant per single-letter id (A through H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A: test a random sample, isolate positives
    TestAndIsolate,

    /// B: A plus isolation of every contact of a positive
    FullTrace,

    /// C: A plus isolation of each contact with some probability
    NoisyTrace,

    /// D: do nothing
    NoIsolation,

    /// E: everyone isolated from the start
    Lockdown,

    /// F: pooled tests with noisy tracing, negative pools are released
    PooledTrace,

    /// G: pooled tests without tracing, negative pools are released
    PooledNoTrace,

    /// H: individual tests with noisy tracing, negatives are released
    Reopening,
}

/// What happens to the contacts of a positive test.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Tracing {
    Off,
    Full,
    Noisy(f64),
}

/// Tallies from one strategy step, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestingReport {
    /// Individual or pooled tests performed
    pub tests: usize,

    /// Tests that came back positive
    pub positives: usize,

    /// Isolations released because of a negative result
    pub released: usize,
}

impl Strategy {
    /// Returns every policy, in letter order.
    pub fn all() -> Vec<Strategy> {
        vec![
            Strategy::TestAndIsolate,
            Strategy::FullTrace,
            Strategy::NoisyTrace,
            Strategy::NoIsolation,
            Strategy::Lockdown,
            Strategy::PooledTrace,
            Strategy::PooledNoTrace,
            Strategy::Reopening,
        ]
    }

    /// Single-letter identifier.
    pub fn letter(&self) -> char {
        match self {
            Strategy::TestAndIsolate => 'A',
            Strategy::FullTrace => 'B',
            Strategy::NoisyTrace => 'C',
            Strategy::NoIsolation => 'D',
            Strategy::Lockdown => 'E',
            Strategy::PooledTrace => 'F',
            Strategy::PooledNoTrace => 'G',
            Strategy::Reopening => 'H',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::TestAndIsolate => "test_and_isolate",
            Strategy::FullTrace => "full_trace",
            Strategy::NoisyTrace => "noisy_trace",
            Strategy::NoIsolation => "no_isolation",
            Strategy::Lockdown => "lockdown",
            Strategy::PooledTrace => "pooled_trace",
            Strategy::PooledNoTrace => "pooled_no_trace",
            Strategy::Reopening => "reopening",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Strategy::TestAndIsolate => "Test a random sample each step and isolate positives",
            Strategy::FullTrace => "Test and isolate, plus isolate every contact of a positive",
            Strategy::NoisyTrace => "Test and isolate, plus isolate each contact with some probability",
            Strategy::NoIsolation => "No testing and no isolation",
            Strategy::Lockdown => "Everyone isolated for the whole episode",
            Strategy::PooledTrace => "Lockdown released by pooled tests, positives traced noisily",
            Strategy::PooledNoTrace => "Lockdown released by pooled tests, no tracing",
            Strategy::Reopening => "Lockdown released by individual tests, positives traced noisily",
        }
    }

    /// True for policies that isolate the whole population before step one.
    pub fn requires_lockdown(&self) -> bool {
        matches!(
            self,
            Strategy::Lockdown
                | Strategy::PooledTrace
                | Strategy::PooledNoTrace
                | Strategy::Reopening
        )
    }

    /// True for policies that test pools rather than individuals.
    pub fn is_pooled(&self) -> bool {
        matches!(self, Strategy::PooledTrace | Strategy::PooledNoTrace)
    }

    /// Applies one timestep of this policy to `state`.
    ///
    /// Only isolation membership changes; the sick set is read, never written.
    pub fn step<R: Rng + ?Sized>(
        &self,
        graph: &Graph,
        state: &mut SimulationState,
        config: &SimConfig,
        rng: &mut R,
    ) -> TestingReport {
        let noisy = Tracing::Noisy(config.p_isolate_neighbor);
        match self {
            Strategy::NoIsolation | Strategy::Lockdown => TestingReport::default(),
            Strategy::TestAndIsolate => {
                test_individuals(graph, state, config, rng, Tracing::Off, false)
            }
            Strategy::FullTrace => test_individuals(graph, state, config, rng, Tracing::Full, false),
            Strategy::NoisyTrace => test_individuals(graph, state, config, rng, noisy, false),
            Strategy::Reopening => test_individuals(graph, state, config, rng, noisy, true),
            Strategy::PooledTrace => test_pools(graph, state, config, rng, noisy),
            Strategy::PooledNoTrace => test_pools(graph, state, config, rng, Tracing::Off),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl std::str::FromStr for Strategy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Strategy::all()
            .into_iter()
            .find(|strategy| {
                key == strategy.name() || key == strategy.letter().to_ascii_lowercase().to_string()
            })
            .ok_or_else(|| SimError::invalid(format!("Unknown strategy: {s}")))
    }
}

/// Draws `amount` distinct nodes uniformly, clamped to the population.
fn sample_nodes<R: Rng + ?Sized>(rng: &mut R, population: usize, amount: usize) -> Vec<NodeId> {
    index::sample(rng, population, amount.min(population)).into_vec()
}

fn trace_contacts<R: Rng + ?Sized>(
    graph: &Graph,
    state: &mut SimulationState,
    node: NodeId,
    tracing: Tracing,
    rng: &mut R,
) {
    match tracing {
        Tracing::Off => {}
        Tracing::Full => {
            for &neighbor in graph.neighbors(node) {
                state.mark_isolated(neighbor);
            }
        }
        Tracing::Noisy(p) => {
            for &neighbor in graph.neighbors(node) {
                if rng.gen_bool(p) {
                    state.mark_isolated(neighbor);
                }
            }
        }
    }
}

/// Individual testing (A, B, C, H).
///
/// Healthy nodes never test positive. With `release_negatives`, every
/// sampled node that does not test positive leaves isolation.
fn test_individuals<R: Rng + ?Sized>(
    graph: &Graph,
    state: &mut SimulationState,
    config: &SimConfig,
    rng: &mut R,
    tracing: Tracing,
    release_negatives: bool,
) -> TestingReport {
    let sample = sample_nodes(rng, graph.node_count(), config.test_capacity);
    let mut report = TestingReport {
        tests: sample.len(),
        ..TestingReport::default()
    };

    for node in sample {
        let positive = state.is_sick(node) && rng.gen_bool(config.test_positive);
        if positive {
            report.positives += 1;
            state.mark_isolated(node);
            trace_contacts(graph, state, node, tracing, rng);
        } else if release_negatives && state.is_isolated(node) {
            state.unmark_isolated(node);
            report.released += 1;
        }
    }
    report
}

/// Pooled testing (F, G).
///
/// Up to `test_capacity * pool_size` distinct nodes are drawn and split into
/// consecutive pools. A pool with no sick member is always negative. Pools
/// are resolved in order, so a contact traced by an earlier pool can be
/// released by a later negative pool in the same step.
fn test_pools<R: Rng + ?Sized>(
    graph: &Graph,
    state: &mut SimulationState,
    config: &SimConfig,
    rng: &mut R,
    tracing: Tracing,
) -> TestingReport {
    let pool_size = config.pool_size.max(1);
    let wanted = config.test_capacity.saturating_mul(pool_size);
    let sample = sample_nodes(rng, graph.node_count(), wanted);

    let mut report = TestingReport::default();
    for pool in sample.chunks(pool_size) {
        report.tests += 1;
        let any_sick = pool.iter().any(|&node| state.is_sick(node));
        let positive = any_sick && rng.gen_bool(config.test_positive);

        if positive {
            report.positives += 1;
            for &member in pool {
                state.mark_isolated(member);
                trace_contacts(graph, state, member, tracing, rng);
            }
        } else {
            for &member in pool {
                if state.is_isolated(member) {
                    state.unmark_isolated(member);
                    report.released += 1;
                }
            }
        }
    }
    report
}
