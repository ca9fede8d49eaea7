//! Bounded neighbourhood extraction around seed genes

use std::collections::{BTreeSet, VecDeque};

use crate::graph::InteractionGraph;
use crate::GeneId;

/// Induced neighbourhood of a seed set
#[derive(Debug, Clone, PartialEq)]
pub struct Subgraph {
    pub graph: InteractionGraph,

    /// Seeds that were present in the source graph
    pub seeds: BTreeSet<GeneId>,

    /// Number of seeds the caller asked for
    pub seeds_requested: usize,
}

impl Subgraph {
    pub fn seeds_found(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_seed(&self, gene: GeneId) -> bool {
        self.seeds.contains(&gene)
    }
}

/// Keep every node within `hops` edges of a present seed, plus all edges of
/// `graph` between kept nodes. Seeds missing from `graph` are skipped.
pub fn extract_subgraph(graph: &InteractionGraph, seeds: &BTreeSet<GeneId>, hops: u32) -> Subgraph {
    let mut distance: Vec<Option<u32>> = vec![None; graph.node_count()];
    let mut queue = VecDeque::new();
    let mut found = BTreeSet::new();

    // BTreeSet iteration gives the canonical ascending seed order
    for &seed in seeds {
        if let Some(node) = graph.index_of(seed) {
            found.insert(seed);
            if distance[node].is_none() {
                distance[node] = Some(0);
                queue.push_back(node);
            }
        }
    }

    while let Some(node) = queue.pop_front() {
        let d = distance[node].unwrap_or(0);
        if d >= hops {
            continue;
        }
        for &neighbor in graph.neighbors(node) {
            let neighbor = neighbor as usize;
            if distance[neighbor].is_none() {
                distance[neighbor] = Some(d + 1);
                queue.push_back(neighbor);
            }
        }
    }

    let keep: Vec<bool> = distance.iter().map(Option::is_some).collect();
    let sub = graph.induced(&keep);

    log::debug!(
        "Extracted {} nodes within {} hops of {}/{} seeds",
        sub.node_count(),
        hops,
        found.len(),
        seeds.len()
    );

    Subgraph {
        graph: sub,
        seeds: found,
        seeds_requested: seeds.len(),
    }
}
