//! Random contact network.
//!
//! The network is a binomial (Erdős–Rényi) graph: each of the `n(n-1)/2`
//! possible undirected edges is present independently with probability
//! `mean_degree / n`. Generation skips between present edges with
//! geometrically distributed gaps, so the cost is O(n + m) instead of
//! one Bernoulli draw per node pair.

use crate::error::{Result, SimError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Geometric};
use tracing::debug;

/// Node identifier, dense in `0..node_count()`.
pub type NodeId = usize;

/// Immutable undirected contact graph stored as adjacency lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<Vec<NodeId>>,
    edge_count: usize,
}

impl Graph {
    /// Creates a graph with `num_nodes` nodes and no edges.
    pub fn empty(num_nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); num_nodes],
            edge_count: 0,
        }
    }

    /// Builds a graph from an explicit edge list.
    ///
    /// Self-loops, duplicate edges and endpoints outside `0..num_nodes` are
    /// ignored.
    pub fn from_edges(num_nodes: usize, edges: &[(NodeId, NodeId)]) -> Self {
        let mut graph = Self::empty(num_nodes);
        for &(u, v) in edges {
            if u < num_nodes && v < num_nodes && u != v && !graph.contains_edge(u, v) {
                graph.push_edge(u, v);
            }
        }
        graph
    }

    // Caller guarantees the edge is new and both endpoints are valid.
    fn push_edge(&mut self, u: NodeId, v: NodeId) {
        self.adjacency[u].push(v);
        self.adjacency[v].push(u);
        self.edge_count += 1;
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Neighbors of `node`.
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.adjacency[node]
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency[node].len()
    }

    /// Average degree over all nodes (0 for an empty graph).
    pub fn mean_degree(&self) -> f64 {
        if self.adjacency.is_empty() {
            return 0.0;
        }
        2.0 * self.edge_count as f64 / self.adjacency.len() as f64
    }

    /// Returns true if `u` and `v` are adjacent.
    pub fn contains_edge(&self, u: NodeId, v: NodeId) -> bool {
        if u >= self.node_count() || v >= self.node_count() {
            return false;
        }
        // Scan the shorter list
        let (a, b) = if self.degree(u) <= self.degree(v) { (u, v) } else { (v, u) };
        self.adjacency[a].contains(&b)
    }

    /// Every undirected edge exactly once, as `(u, v)` with `u < v`.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::with_capacity(self.edge_count);
        for (u, neighbors) in self.adjacency.iter().enumerate() {
            for &v in neighbors {
                if u < v {
                    edges.push((u, v));
                }
            }
        }
        edges
    }
}

/// Builds binomial random graphs for a fixed population and mean degree.
#[derive(Debug, Clone, Copy)]
pub struct GraphGenerator {
    num_nodes: usize,
    mean_degree: f64,
}

impl GraphGenerator {
    /// Creates a generator.
    ///
    /// Fails with [`SimError::InvalidParameter`] if `num_nodes` is zero or
    /// `mean_degree` is negative or not finite.
    pub fn new(num_nodes: usize, mean_degree: f64) -> Result<Self> {
        if num_nodes == 0 {
            return Err(SimError::invalid("population must be positive"));
        }
        if !mean_degree.is_finite() || mean_degree < 0.0 {
            return Err(SimError::invalid(format!(
                "mean degree must be a non-negative number, got {mean_degree}"
            )));
        }
        Ok(Self {
            num_nodes,
            mean_degree,
        })
    }

    /// Probability that any given pair of nodes is connected.
    pub fn edge_probability(&self) -> f64 {
        (self.mean_degree / self.num_nodes as f64).min(1.0)
    }

    /// Generates a graph from the supplied random source.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Graph {
        let n = self.num_nodes;
        let p = self.edge_probability();
        let mut graph = Graph::empty(n);

        if p <= 0.0 || n < 2 {
            return graph;
        }

        if p >= 1.0 {
            for v in 1..n {
                for w in 0..v {
                    graph.push_edge(v, w);
                }
            }
            return graph;
        }

        let gaps = match Geometric::new(p) {
            Ok(dist) => dist,
            // p is already restricted to (0, 1)
            Err(_) => return graph,
        };
        let max_pairs = (n as u64) * (n as u64 - 1) / 2;

        // Walk the lower triangle (v, w) with w < v in row-major order,
        // jumping over the pairs that are absent.
        let mut v: u64 = 1;
        let mut w: i64 = -1;
        let n64 = n as u64;
        while v < n64 {
            let skip = gaps.sample(rng);
            if skip >= max_pairs {
                break;
            }
            w += 1 + skip as i64;
            while w >= v as i64 && v < n64 {
                w -= v as i64;
                v += 1;
            }
            if v < n64 {
                graph.push_edge(v as NodeId, w as NodeId);
            }
        }

        debug!(
            "Generated contact graph: {} nodes, {} edges (mean degree {:.2})",
            n,
            graph.edge_count(),
            graph.mean_degree()
        );
        graph
    }

    /// Generates a graph from `seed`, or from ambient entropy when `None`.
    pub fn generate_seeded(&self, seed: Option<u64>) -> Graph {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.generate(&mut rng)
    }
}

/// Convenience wrapper: validate parameters and generate in one call.
pub fn generate(num_nodes: usize, mean_degree: f64, seed: Option<u64>) -> Result<Graph> {
    Ok(GraphGenerator::new(num_nodes, mean_degree)?.generate_seeded(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_population() {
        assert!(matches!(
            GraphGenerator::new(0, 4.0),
            Err(SimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_negative_degree() {
        assert!(GraphGenerator::new(10, -1.0).is_err());
        assert!(GraphGenerator::new(10, f64::NAN).is_err());
    }

    #[test]
    fn test_zero_degree_has_no_edges() {
        let graph = generate(50, 0.0, Some(1)).unwrap();
        assert_eq!(graph.node_count(), 50);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_saturated_degree_is_complete() {
        let graph = generate(12, 100.0, Some(1)).unwrap();
        assert_eq!(graph.edge_count(), 12 * 11 / 2);
        for node in 0..12 {
            assert_eq!(graph.degree(node), 11);
        }
    }

    #[test]
    fn test_same_seed_same_graph() {
        let a = generate(300, 6.0, Some(99)).unwrap();
        let b = generate(300, 6.0, Some(99)).unwrap();
        assert_eq!(a, b);

        let c = generate(300, 6.0, Some(100)).unwrap();
        assert_ne!(a.edges(), c.edges());
    }

    #[test]
    fn test_edges_are_simple_and_symmetric() {
        let graph = generate(400, 8.0, Some(7)).unwrap();
        let edges = graph.edges();
        assert_eq!(edges.len(), graph.edge_count());
        for &(u, v) in &edges {
            assert!(u < v);
            assert!(graph.neighbors(u).contains(&v));
            assert!(graph.neighbors(v).contains(&u));
        }
        let mut dedup = edges.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), edges.len());
    }

    #[test]
    fn test_mean_degree_is_close_to_target() {
        let graph = generate(2000, 10.0, Some(2024)).unwrap();
        // Expected mean degree is 10 * (n - 1) / n; std error is tiny at this size
        approx::assert_abs_diff_eq!(graph.mean_degree(), 10.0, epsilon = 0.5);
    }

    #[test]
    fn test_from_edges_ignores_bad_input() {
        let graph = Graph::from_edges(4, &[(0, 1), (1, 0), (2, 2), (3, 9), (2, 3)]);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.contains_edge(1, 0));
        assert!(graph.contains_edge(3, 2));
        assert!(!graph.contains_edge(0, 3));
    }
}
