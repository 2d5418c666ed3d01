//! TraceNet Core - contact-network epidemic engine
//!
//! The per-timestep state transition for comparing testing and isolation
//! policies on a random contact network:
//! 1. **Graph**: binomial random contact graph, regenerated per episode
//! 2. **State**: who has ever been sick, who is isolated right now
//! 3. **Strategy**: one of eight testing/isolation policies, run first
//! 4. **Spread**: one hop of probabilistic transmission, run second
//!
//! # Step ordering
//!
//! ```text
//!   strategy.step(graph, state)        isolation only
//!           │
//!           ▼
//!   snapshot sick set                  carriers for this step
//!           │
//!           ▼
//!   spreader.step(graph, state)        infection only
//! ```
//!
//! An isolation decided in a step already lowers that step's transmission
//! from the newly isolated carrier.

pub mod config;
pub mod error;
pub mod graph;
pub mod spread;
pub mod state;
pub mod strategy;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use graph::{Graph, GraphGenerator, NodeId};
pub use spread::InfectionSpreader;
pub use state::{NodeCategory, PopulationCounts, SimulationState};
pub use strategy::{Strategy, TestingReport};
