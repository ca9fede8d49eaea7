//! Leiden modularity optimisation
//!
//! Local moving as in Louvain, then a refinement step that rebuilds each
//! community from singletons, merging a node only into a well-connected
//! sub-community it has edges to. The network is aggregated on the refined
//! partition while the coarse communities seed the next level.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;

use super::aggregate::{move_nodes, renumber, WeightedNetwork};
use crate::graph::InteractionGraph;

const MAX_LEVELS: usize = 32;

/// Detect communities with Leiden. Every returned community induces a
/// connected subgraph of `graph`.
pub(super) fn leiden<R: Rng>(graph: &InteractionGraph, resolution: f64, rng: &mut R) -> Vec<usize> {
    let mut network = WeightedNetwork::from_graph(graph);
    let mut membership: Vec<usize> = (0..graph.node_count()).collect();
    let mut community: Vec<usize> = (0..network.node_count()).collect();

    for level in 0..MAX_LEVELS {
        move_nodes(&network, &mut community, resolution, rng);
        let (moved, count) = renumber(&community);
        community = moved;

        if count == network.node_count() {
            log::debug!("Leiden converged after {} levels", level);
            break;
        }

        let (refined, refined_count) = renumber(&refine(&network, &community, resolution, rng));

        // When refinement merged nothing, fall back to aggregating on the
        // communities so the level still shrinks.
        let (groups, group_count, next_community) = if refined_count < network.node_count() {
            let mut next = vec![0; refined_count];
            for (node, &r) in refined.iter().enumerate() {
                next[r] = community[node];
            }
            (refined, refined_count, next)
        } else {
            (community.clone(), count, (0..count).collect())
        };

        for m in membership.iter_mut() {
            *m = groups[*m];
        }
        log::debug!(
            "Leiden level {}: {} nodes, {} communities, {} refined",
            level,
            network.node_count(),
            count,
            group_count
        );
        network = network.aggregate(&groups, group_count);
        community = next_community;
    }

    let labels: Vec<usize> = membership.iter().map(|&m| community[m]).collect();
    split_disconnected(graph, &labels)
}

/// Rebuild each community from singletons. A singleton node is merged only if
/// it is well connected to the rest of its community, and only into a
/// sub-community that is itself well connected and adjacent to the node.
fn refine<R: Rng>(
    network: &WeightedNetwork,
    community: &[usize],
    resolution: f64,
    rng: &mut R,
) -> Vec<usize> {
    let n = network.node_count();
    let m2 = 2.0 * network.total_weight;

    let mut community_strength = vec![0.0; n];
    for (node, &c) in community.iter().enumerate() {
        community_strength[c] += network.strength[node];
    }

    let mut refined: Vec<usize> = (0..n).collect();
    let mut refined_strength = network.strength.clone();
    let mut refined_size = vec![1usize; n];

    // Weight between each refined cluster and the rest of its community
    let mut external: Vec<f64> = (0..n)
        .map(|node| {
            network.adjacency[node]
                .iter()
                .filter(|&&(nb, _)| community[nb] == community[node])
                .map(|&(_, w)| w)
                .sum()
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut link_weight = vec![0.0; n];
    let mut seen = vec![false; n];
    let mut touched: Vec<usize> = Vec::new();

    for &node in &order {
        if refined_size[refined[node]] > 1 {
            continue;
        }

        let c = community[node];
        let k = network.strength[node];
        if external[node] < resolution * k * (community_strength[c] - k) / m2 {
            continue;
        }

        for &(neighbor, weight) in &network.adjacency[node] {
            if community[neighbor] != c {
                continue;
            }
            let r = refined[neighbor];
            if !seen[r] {
                seen[r] = true;
                touched.push(r);
            }
            link_weight[r] += weight;
        }

        let mut best: Option<(usize, f64)> = None;
        for &r in &touched {
            if r == refined[node] {
                continue;
            }
            let strength = refined_strength[r];
            let well_connected =
                external[r] >= resolution * strength * (community_strength[c] - strength) / m2;
            if !well_connected {
                continue;
            }
            let gain = link_weight[r] - resolution * k * strength / m2;
            if gain >= 0.0 && best.map_or(true, |(_, g)| gain > g) {
                best = Some((r, gain));
            }
        }

        if let Some((target, _)) = best {
            let own = refined[node];
            external[target] += external[own] - 2.0 * link_weight[target];
            refined_strength[target] += k;
            refined_size[target] += refined_size[own];
            refined_size[own] = 0;
            refined[node] = target;
        }

        for r in touched.drain(..) {
            link_weight[r] = 0.0;
            seen[r] = false;
        }
    }

    refined
}

/// Give each connected piece of a community its own label
pub(super) fn split_disconnected(graph: &InteractionGraph, labels: &[usize]) -> Vec<usize> {
    let n = graph.node_count();
    let mut result = vec![usize::MAX; n];
    let mut next = 0;
    let mut queue = VecDeque::new();

    for start in 0..n {
        if result[start] != usize::MAX {
            continue;
        }
        result[start] = next;
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            for &neighbor in graph.neighbors(node) {
                let neighbor = neighbor as usize;
                if result[neighbor] == usize::MAX && labels[neighbor] == labels[start] {
                    result[neighbor] = next;
                    queue.push_back(neighbor);
                }
            }
        }
        next += 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::network::tests::graph;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ring_of_cliques() -> InteractionGraph {
        // Four 4-cliques joined in a ring by single weak edges
        let mut edges = Vec::new();
        for block in 0..4u64 {
            let base = block * 10;
            for a in 0..4 {
                for b in (a + 1)..4 {
                    edges.push((base + a, base + b, 950));
                }
            }
            let next = ((block + 1) % 4) * 10;
            edges.push((base + 3, next, 150));
        }
        graph(&[], &edges)
    }

    #[test]
    fn finds_the_cliques() {
        let g = ring_of_cliques();
        let labels = leiden(&g, 1.0, &mut StdRng::seed_from_u64(11));
        for block in 0..4 {
            let first = labels[block * 4];
            for offset in 1..4 {
                assert_eq!(labels[block * 4 + offset], first);
            }
        }
        let mut distinct = labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn every_community_is_connected() {
        let g = ring_of_cliques();
        for seed in 0..8 {
            let labels = leiden(&g, 1.0, &mut StdRng::seed_from_u64(seed));
            assert_eq!(split_disconnected(&g, &labels), renumber(&labels).0);
        }
    }

    #[test]
    fn split_separates_unlinked_members() {
        let g = graph(&[], &[(1, 2, 900), (3, 4, 900)]);
        let split = split_disconnected(&g, &[0, 0, 0, 0]);
        assert_eq!(split, vec![0, 0, 1, 1]);
    }
}
