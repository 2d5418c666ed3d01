//! Per-episode infection and isolation membership.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};

/// Dense membership set over `0..capacity`.
///
/// Iteration is always in ascending node order, which keeps seeded runs
/// reproducible regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeSet {
    members: Vec<bool>,
    len: usize,
}

impl NodeSet {
    fn new(capacity: usize) -> Self {
        Self {
            members: vec![false; capacity],
            len: 0,
        }
    }

    fn insert(&mut self, node: NodeId) {
        if !self.members[node] {
            self.members[node] = true;
            self.len += 1;
        }
    }

    fn remove(&mut self, node: NodeId) {
        if self.members[node] {
            self.members[node] = false;
            self.len -= 1;
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        self.members[node]
    }

    fn fill(&mut self) {
        self.members.iter_mut().for_each(|m| *m = true);
        self.len = self.members.len();
    }

    fn clear(&mut self) {
        self.members.iter_mut().for_each(|m| *m = false);
        self.len = 0;
    }

    fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(node, &present)| present.then_some(node))
    }
}

/// Classification of a single node at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    HealthyFree,
    HealthyIsolated,
    SickFree,
    SickIsolated,
}

/// The four mutually exclusive population counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCounts {
    pub healthy_free: usize,
    pub sick_free: usize,
    pub sick_isolated: usize,
    pub healthy_isolated: usize,
}

impl PopulationCounts {
    /// Everyone ever infected (free or isolated).
    pub fn infected(&self) -> usize {
        self.sick_free + self.sick_isolated
    }

    /// Everyone currently isolated (healthy or sick).
    pub fn isolated(&self) -> usize {
        self.healthy_isolated + self.sick_isolated
    }

    /// Population size; always equals the node count.
    pub fn total(&self) -> usize {
        self.healthy_free + self.sick_free + self.sick_isolated + self.healthy_isolated
    }
}

/// Infection and isolation membership for one episode.
///
/// `sick` only ever grows within an episode. `isolated` grows and shrinks
/// through explicit calls and is not a subset of `sick`: healthy contacts
/// can be isolated too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationState {
    sick: NodeSet,
    isolated: NodeSet,
}

impl SimulationState {
    /// Creates an all-healthy, all-free state for `num_nodes` nodes.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            sick: NodeSet::new(num_nodes),
            isolated: NodeSet::new(num_nodes),
        }
    }

    /// Clears both sets in place.
    pub fn reset(&mut self) {
        self.sick.clear();
        self.isolated.clear();
    }

    pub fn node_count(&self) -> usize {
        self.sick.members.len()
    }

    pub fn mark_sick(&mut self, node: NodeId) {
        self.sick.insert(node);
    }

    pub fn mark_isolated(&mut self, node: NodeId) {
        self.isolated.insert(node);
    }

    pub fn unmark_isolated(&mut self, node: NodeId) {
        self.isolated.remove(node);
    }

    /// Isolates the whole population (initial lockdown).
    pub fn isolate_all(&mut self) {
        self.isolated.fill();
    }

    pub fn is_sick(&self, node: NodeId) -> bool {
        self.sick.contains(node)
    }

    pub fn is_isolated(&self, node: NodeId) -> bool {
        self.isolated.contains(node)
    }

    pub fn sick_count(&self) -> usize {
        self.sick.len
    }

    pub fn isolated_count(&self) -> usize {
        self.isolated.len
    }

    /// Sick nodes in ascending order, copied out.
    ///
    /// The spread step iterates over this copy so that infections added
    /// during the step never propagate within the same step.
    pub fn sick_nodes(&self) -> Vec<NodeId> {
        self.sick.iter().collect()
    }

    /// Isolated nodes in ascending order.
    pub fn isolated_nodes(&self) -> Vec<NodeId> {
        self.isolated.iter().collect()
    }

    pub fn category(&self, node: NodeId) -> NodeCategory {
        match (self.is_sick(node), self.is_isolated(node)) {
            (false, false) => NodeCategory::HealthyFree,
            (false, true) => NodeCategory::HealthyIsolated,
            (true, false) => NodeCategory::SickFree,
            (true, true) => NodeCategory::SickIsolated,
        }
    }

    /// Counts each category across the population.
    pub fn snapshot_counts(&self) -> PopulationCounts {
        let sick_isolated = self
            .sick
            .members
            .iter()
            .zip(&self.isolated.members)
            .filter(|(sick, isolated)| **sick && **isolated)
            .count();
        let n = self.node_count();
        PopulationCounts {
            healthy_free: n - self.sick.len - self.isolated.len + sick_isolated,
            sick_free: self.sick.len - sick_isolated,
            sick_isolated,
            healthy_isolated: self.isolated.len - sick_isolated,
        }
    }
}
