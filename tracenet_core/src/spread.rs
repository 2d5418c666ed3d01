//! Probabilistic transmission along contact edges.

use crate::graph::Graph;
use crate::state::SimulationState;
use rand::Rng;

/// Transmission probabilities for one episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfectionSpreader {
    /// Per-contact probability when the carrier is free
    pub p_infect: f64,

    /// Per-contact probability when the carrier is isolated
    pub p_infect_isolated: f64,
}

impl InfectionSpreader {
    pub fn new(p_infect: f64, p_infect_isolated: f64) -> Self {
        Self {
            p_infect,
            p_infect_isolated,
        }
    }

    /// Runs one hop of transmission and returns how many nodes became sick.
    ///
    /// Must run after the strategy step of the same timestep: the carrier's
    /// isolation status is read as the strategy left it. Carriers are taken
    /// from a copy of the sick set made before any new infection, so a node
    /// infected here cannot pass it on until the next step. Every
    /// (carrier, contact) pair gets exactly one trial, including contacts
    /// that are already sick.
    pub fn step<R: Rng + ?Sized>(
        &self,
        graph: &Graph,
        state: &mut SimulationState,
        rng: &mut R,
    ) -> usize {
        let carriers = state.sick_nodes();
        let before = state.sick_count();

        for carrier in carriers {
            let p = if state.is_isolated(carrier) {
                self.p_infect_isolated
            } else {
                self.p_infect
            };
            for &contact in graph.neighbors(carrier) {
                if rng.gen_bool(p) {
                    state.mark_sick(contact);
                }
            }
        }

        state.sick_count() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn path(len: usize) -> Graph {
        let edges: Vec<_> = (1..len).map(|v| (v - 1, v)).collect();
        Graph::from_edges(len, &edges)
    }

    #[test]
    fn test_zero_probability_changes_nothing() {
        let graph = path(10);
        let mut state = SimulationState::new(10);
        state.mark_sick(4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let spreader = InfectionSpreader::new(0.0, 0.0);
        for _ in 0..5 {
            assert_eq!(spreader.step(&graph, &mut state, &mut rng), 0);
        }
        assert_eq!(state.sick_nodes(), vec![4]);
    }

    #[test]
    fn test_exactly_one_hop_per_step() {
        let graph = path(6);
        let mut state = SimulationState::new(6);
        state.mark_sick(0);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let spreader = InfectionSpreader::new(1.0, 1.0);
        assert_eq!(spreader.step(&graph, &mut state, &mut rng), 1);
        assert_eq!(state.sick_nodes(), vec![0, 1]);

        assert_eq!(spreader.step(&graph, &mut state, &mut rng), 1);
        assert_eq!(state.sick_nodes(), vec![0, 1, 2]);
    }

    #[test]
    fn test_isolated_carrier_uses_isolated_rate() {
        let graph = path(3);
        let mut state = SimulationState::new(3);
        state.mark_sick(1);
        state.mark_isolated(1);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        // Free rate is certain, isolated rate is zero
        let spreader = InfectionSpreader::new(1.0, 0.0);
        assert_eq!(spreader.step(&graph, &mut state, &mut rng), 0);

        state.unmark_isolated(1);
        assert_eq!(spreader.step(&graph, &mut state, &mut rng), 2);
    }

    #[test]
    fn test_isolation_of_contact_does_not_block() {
        // Only the carrier's status matters
        let graph = path(2);
        let mut state = SimulationState::new(2);
        state.mark_sick(0);
        state.mark_isolated(1);
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let spreader = InfectionSpreader::new(1.0, 0.0);
        assert_eq!(spreader.step(&graph, &mut state, &mut rng), 1);
    }
}
