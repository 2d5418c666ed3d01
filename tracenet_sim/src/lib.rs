//! TraceNet simulation harness
//!
//! Repeats stochastic episodes of the `tracenet_core` engine and turns
//! them into distributions of final population counts.
//!
//! # Determinism
//!
//! All entropy in a run derives from one 64-bit master seed. Episode `i`
//! gets its own seed, derived from the master seed and `i` alone, which in
//! turn feeds three independent ChaCha8 streams (graph, outbreak,
//! dynamics). Any run, or any single episode of it, replays from its seed,
//! and the parallel fan-out gives the same sequences as the sequential one.
//!
//! # Usage
//!
//! ```ignore
//! use tracenet_core::{SimConfig, Strategy};
//! use tracenet_sim::RunAggregator;
//!
//! let config = SimConfig::default()
//!     .with_strategy(Strategy::NoisyTrace)
//!     .with_episodes(50)
//!     .with_seed(42);
//!
//! let results = RunAggregator::new(config)?.with_parallel(true).run();
//! println!("mean infected: {}", results.distributions.summary().infected.mean);
//! ```

mod aggregate;
mod context;
pub mod exporter;
mod runner;

pub use aggregate::{DistributionSummary, Distributions, RunAggregator, RunResults, SeriesSummary};
pub use context::{EpisodeStreams, SimContext};
pub use exporter::RunExport;
pub use runner::{EpisodeOutcome, SimulationRunner};
