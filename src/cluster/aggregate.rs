//! Weighted network levels for multi-level modularity optimisation

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::graph::InteractionGraph;

/// Gains closer than this are treated as equal
const GAIN_EPSILON: f64 = 1e-12;

/// Safety cap on local-moving passes per level
const MAX_PASSES: usize = 64;

/// One level of the multi-level scheme. Node `i` of a coarse level stands for
/// a group of nodes of the level below; `self_loops[i]` holds the weight of
/// the edges inside that group.
#[derive(Debug, Clone)]
pub(super) struct WeightedNetwork {
    /// Neighbor lists without self entries, ascending by neighbor
    pub adjacency: Vec<Vec<(usize, f64)>>,
    pub self_loops: Vec<f64>,
    /// Weighted degree: incident weight plus twice the self-loop
    pub strength: Vec<f64>,
    /// Total edge weight m; constant across levels
    pub total_weight: f64,
}

impl WeightedNetwork {
    pub fn from_graph(graph: &InteractionGraph) -> Self {
        let adjacency: Vec<Vec<(usize, f64)>> = (0..graph.node_count())
            .map(|node| graph.weighted_neighbors(node).collect())
            .collect();
        let total_weight = graph.edges().iter().map(|e| e.weight()).sum();
        let self_loops = vec![0.0; adjacency.len()];
        Self::assemble(adjacency, self_loops, total_weight)
    }

    fn assemble(adjacency: Vec<Vec<(usize, f64)>>, self_loops: Vec<f64>, total_weight: f64) -> Self {
        let strength = adjacency
            .iter()
            .zip(&self_loops)
            .map(|(nbrs, &own)| nbrs.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * own)
            .collect();
        Self {
            adjacency,
            self_loops,
            strength,
            total_weight,
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Collapse each group `membership[i]` (ids in `0..group_count`) into one node
    pub fn aggregate(&self, membership: &[usize], group_count: usize) -> WeightedNetwork {
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); group_count];
        let mut self_loops = vec![0.0; group_count];

        for (node, neighbors) in self.adjacency.iter().enumerate() {
            let group = membership[node];
            self_loops[group] += self.self_loops[node];
            for &(neighbor, weight) in neighbors {
                let other = membership[neighbor];
                if other == group {
                    // Each internal edge is listed from both ends
                    if node < neighbor {
                        self_loops[group] += weight;
                    }
                } else {
                    *links[group].entry(other).or_insert(0.0) += weight;
                }
            }
        }

        let adjacency = links
            .into_iter()
            .map(|m| m.into_iter().collect())
            .collect();
        Self::assemble(adjacency, self_loops, self.total_weight)
    }
}

/// Relabel to `0..count` in order of first appearance
pub(super) fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let relabeled = labels
        .iter()
        .map(|&label| {
            let next = mapping.len();
            *mapping.entry(label).or_insert(next)
        })
        .collect();
    (relabeled, mapping.len())
}

/// Greedy local moving: visit nodes in a random order and move each to the
/// neighboring community with the best modularity gain, repeating until a
/// full pass moves nothing. Returns whether any node moved.
///
/// `community` holds ids in `0..node_count`.
pub(super) fn move_nodes<R: Rng>(
    network: &WeightedNetwork,
    community: &mut [usize],
    resolution: f64,
    rng: &mut R,
) -> bool {
    let n = network.node_count();
    let m2 = 2.0 * network.total_weight;
    if n == 0 || m2 <= 0.0 {
        return false;
    }

    let mut community_strength = vec![0.0; n];
    for (node, &c) in community.iter().enumerate() {
        community_strength[c] += network.strength[node];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut link_weight = vec![0.0; n];
    let mut seen = vec![false; n];
    let mut touched: Vec<usize> = Vec::new();
    let mut any_moved = false;

    for _ in 0..MAX_PASSES {
        let mut moved = false;

        for &node in &order {
            let current = community[node];
            let k = network.strength[node];

            for &(neighbor, weight) in &network.adjacency[node] {
                let c = community[neighbor];
                if !seen[c] {
                    seen[c] = true;
                    touched.push(c);
                }
                link_weight[c] += weight;
            }

            community_strength[current] -= k;
            let gain = |c: usize, strength: &[f64]| {
                link_weight[c] - resolution * k * strength[c] / m2
            };

            let mut best = current;
            let mut best_gain = gain(current, &community_strength);
            for &c in &touched {
                if c == current {
                    continue;
                }
                let g = gain(c, &community_strength);
                if g > best_gain + GAIN_EPSILON {
                    best = c;
                    best_gain = g;
                }
            }

            community_strength[best] += k;
            if best != current {
                community[node] = best;
                moved = true;
            }

            for c in touched.drain(..) {
                link_weight[c] = 0.0;
                seen[c] = false;
            }
        }

        if !moved {
            break;
        }
        any_moved = true;
    }

    any_moved
}
