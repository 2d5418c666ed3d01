//! Episode runner - drives one simulation episode from seeding to final counts.

use crate::context::EpisodeStreams;

use rand::Rng;
use tracenet_core::{
    Graph, GraphGenerator, InfectionSpreader, PopulationCounts, Result, SimConfig,
    SimulationState,
};
use tracing::debug;

/// Result of a single episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeOutcome {
    /// Episode index within the run
    pub episode: usize,

    /// Seed the episode's streams were derived from
    pub seed: u64,

    /// Nodes infected at initialization
    pub initial_sick: usize,

    /// Population counts after the last step
    pub final_counts: PopulationCounts,

    /// Counts after initialization (entry 0) and after each step, if recorded
    pub trace: Option<Vec<PopulationCounts>>,
}

/// Runs episodes for one validated configuration.
///
/// The runner holds no per-episode state, so a single instance can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    config: SimConfig,
    generator: GraphGenerator,
    spreader: InfectionSpreader,
    record_trace: bool,
}

impl SimulationRunner {
    /// Validates `config` and creates a runner.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let generator = GraphGenerator::new(config.population, config.mean_degree)?;
        let spreader = InfectionSpreader::new(config.p_infect, config.p_infect_isolated);
        Ok(Self {
            config,
            generator,
            spreader,
            record_trace: false,
        })
    }

    /// Records per-step counts in every outcome.
    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs one full episode on a fresh graph and state.
    pub fn run_episode(&self, episode: usize, seed: u64) -> EpisodeOutcome {
        let mut streams = EpisodeStreams::new(seed);
        let graph = self.generator.generate(&mut streams.graph);
        let mut state = SimulationState::new(graph.node_count());

        let initial_sick = self.initialize(&mut state, &mut streams.outbreak);
        debug!(
            "Episode {}: {} edges, {} initially sick (seed={:#x})",
            episode,
            graph.edge_count(),
            initial_sick,
            seed
        );

        let trace = self.run_steps(episode, &graph, &mut state, &mut streams.dynamics);

        EpisodeOutcome {
            episode,
            seed,
            initial_sick,
            final_counts: state.snapshot_counts(),
            trace,
        }
    }

    /// Resets `state`, seeds the outbreak and applies the initial lockdown
    /// when the strategy calls for one. Returns the number of seeded nodes.
    pub fn initialize<R: Rng + ?Sized>(&self, state: &mut SimulationState, rng: &mut R) -> usize {
        state.reset();
        for node in 0..state.node_count() {
            if rng.gen_bool(self.config.p_init_sick) {
                state.mark_sick(node);
            }
        }
        if self.config.strategy.requires_lockdown() {
            state.isolate_all();
        }
        state.sick_count()
    }

    /// Advances `state` by `config.iterations` steps: strategy first, then
    /// spread.
    pub fn run_steps<R: Rng + ?Sized>(
        &self,
        episode: usize,
        graph: &Graph,
        state: &mut SimulationState,
        rng: &mut R,
    ) -> Option<Vec<PopulationCounts>> {
        let strategy = self.config.strategy;
        let mut trace = self
            .record_trace
            .then(|| Vec::with_capacity(self.config.iterations + 1));
        if let Some(trace) = trace.as_mut() {
            trace.push(state.snapshot_counts());
        }

        for step in 0..self.config.iterations {
            debug!(
                "Episode {} t={}: infected={} isolated={}",
                episode,
                step,
                state.sick_count(),
                state.isolated_count()
            );

            let report = strategy.step(graph, state, &self.config, rng);
            let newly_sick = self.spreader.step(graph, state, rng);

            if report.tests > 0 {
                debug!(
                    "  tests={} positive={} released={} new_infections={}",
                    report.tests, report.positives, report.released, newly_sick
                );
            }
            if let Some(trace) = trace.as_mut() {
                trace.push(state.snapshot_counts());
            }
        }

        debug!(
            "Episode {} end: infected={} isolated={}",
            episode,
            state.sick_count(),
            state.isolated_count()
        );
        trace
    }
}
