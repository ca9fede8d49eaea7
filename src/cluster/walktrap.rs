//! Walktrap agglomerative clustering (Pons & Latapy)
//!
//! Each node gets the distribution of a `steps`-long random walk started from
//! it. Adjacent communities are merged greedily by the smallest increase in
//! walk-distance variance, and the dendrogram is cut where modularity peaks.
//! Memory is quadratic in the node count.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::graph::components::DisjointSets;
use crate::graph::InteractionGraph;

/// Weight of the self-loop added to every node before walking
const LOOP_WEIGHT: f64 = 1.0;

struct WalkCommunity {
    size: usize,
    /// Walk distribution; emptied once the community is merged away
    probabilities: Vec<f64>,
    /// Adjacent communities and the edge weight between them
    links: BTreeMap<usize, f64>,
    total_strength: f64,
}

pub(super) fn walktrap(graph: &InteractionGraph, steps: usize) -> Vec<usize> {
    let n = graph.node_count();
    let m = graph.edges().iter().map(|e| e.weight()).sum::<f64>();
    if n == 0 || m <= 0.0 {
        return (0..n).collect();
    }

    let walk_degree: Vec<f64> = (0..n).map(|v| graph.strength(v) + LOOP_WEIGHT).collect();
    let probabilities: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|start| walk_from(graph, &walk_degree, start, steps))
        .collect();

    let mut communities: Vec<WalkCommunity> = probabilities
        .into_iter()
        .enumerate()
        .map(|(v, probabilities)| WalkCommunity {
            size: 1,
            probabilities,
            links: graph.weighted_neighbors(v).collect(),
            total_strength: graph.strength(v),
        })
        .collect();

    let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for v in 0..n {
        for (&u, _) in &communities[v].links {
            if v < u {
                pairs.insert((v, u), delta_sigma(&communities[v], &communities[u], &walk_degree, n));
            }
        }
    }

    let m2 = 2.0 * m;
    let mut modularity: f64 = -communities
        .iter()
        .map(|c| (c.total_strength / m2).powi(2))
        .sum::<f64>();
    let mut best_modularity = modularity;
    let mut best_step = 0;
    let mut merges: Vec<(usize, usize)> = Vec::with_capacity(n);

    while let Some((&(a, b), _)) = pairs
        .iter()
        .min_by(|x, y| x.1.total_cmp(y.1).then(x.0.cmp(y.0)))
    {
        let between = communities[a].links.get(&b).copied().unwrap_or(0.0);
        modularity += between / m
            - 2.0 * communities[a].total_strength * communities[b].total_strength / (m2 * m2);

        let merged = merge(&mut communities, a, b);
        merges.push((a, b));
        if modularity > best_modularity {
            best_modularity = modularity;
            best_step = merges.len();
        }

        pairs.retain(|&(x, y), _| x != a && x != b && y != a && y != b);
        let neighbors: Vec<usize> = communities[merged].links.keys().copied().collect();
        for other in neighbors {
            let distance = delta_sigma(&communities[merged], &communities[other], &walk_degree, n);
            pairs.insert((other.min(merged), other.max(merged)), distance);
        }
    }

    log::debug!(
        "Walktrap: {} merges, cut after {} with modularity {:.4}",
        merges.len(),
        best_step,
        best_modularity
    );

    // Replay the dendrogram up to the best cut. Community ids past `n` are
    // merge results; map each back to a node it contains.
    let mut sets = DisjointSets::new(n);
    let mut representative: Vec<u32> = (0..n as u32).collect();
    for &(a, b) in &merges[..best_step] {
        let (ra, rb) = (representative[a], representative[b]);
        sets.union(ra, rb);
        representative.push(ra);
    }

    (0..n).map(|v| sets.find(v as u32) as usize).collect()
}

fn walk_from(graph: &InteractionGraph, walk_degree: &[f64], start: usize, steps: usize) -> Vec<f64> {
    let n = graph.node_count();
    let mut current = vec![0.0; n];
    current[start] = 1.0;

    for _ in 0..steps {
        let mut next = vec![0.0; n];
        for (v, &p) in current.iter().enumerate() {
            if p == 0.0 {
                continue;
            }
            let share = p / walk_degree[v];
            next[v] += share * LOOP_WEIGHT;
            for (u, w) in graph.weighted_neighbors(v) {
                next[u] += share * w;
            }
        }
        current = next;
    }

    current
}

/// Variance increase from merging two communities
fn delta_sigma(a: &WalkCommunity, b: &WalkCommunity, walk_degree: &[f64], n: usize) -> f64 {
    let r2: f64 = a
        .probabilities
        .iter()
        .zip(&b.probabilities)
        .zip(walk_degree)
        .map(|((pa, pb), d)| (pa - pb).powi(2) / d)
        .sum();
    let (sa, sb) = (a.size as f64, b.size as f64);
    (sa * sb / (sa + sb)) * r2 / n as f64
}

/// Merge `a` and `b` into a new community appended at the end; returns its id
fn merge(communities: &mut Vec<WalkCommunity>, a: usize, b: usize) -> usize {
    let merged_id = communities.len();
    let left = std::mem::replace(&mut communities[a].probabilities, Vec::new());
    let right = std::mem::replace(&mut communities[b].probabilities, Vec::new());
    let (sa, sb) = (communities[a].size as f64, communities[b].size as f64);

    let probabilities = left
        .iter()
        .zip(&right)
        .map(|(pa, pb)| (sa * pa + sb * pb) / (sa + sb))
        .collect();

    let mut links = std::mem::take(&mut communities[a].links);
    for (other, weight) in std::mem::take(&mut communities[b].links) {
        *links.entry(other).or_insert(0.0) += weight;
    }
    links.remove(&a);
    links.remove(&b);

    for &other in links.keys() {
        let neighbor_links = &mut communities[other].links;
        let weight = neighbor_links.remove(&a).unwrap_or(0.0) + neighbor_links.remove(&b).unwrap_or(0.0);
        neighbor_links.insert(merged_id, weight);
    }

    communities.push(WalkCommunity {
        size: communities[a].size + communities[b].size,
        probabilities,
        links,
        total_strength: communities[a].total_strength + communities[b].total_strength,
    });
    merged_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::network::tests::graph;

    fn two_cliques() -> InteractionGraph {
        graph(
            &[],
            &[
                (1, 2, 1000),
                (1, 3, 1000),
                (1, 4, 1000),
                (2, 3, 1000),
                (2, 4, 1000),
                (3, 4, 1000),
                (5, 6, 1000),
                (5, 7, 1000),
                (5, 8, 1000),
                (6, 7, 1000),
                (6, 8, 1000),
                (7, 8, 1000),
                (4, 5, 200),
            ],
        )
    }

    #[test]
    fn cuts_between_cliques() {
        let labels = walktrap(&two_cliques(), 4);
        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn is_deterministic() {
        let g = two_cliques();
        assert_eq!(walktrap(&g, 4), walktrap(&g, 4));
    }

    #[test]
    fn walk_distribution_is_stochastic() {
        let g = two_cliques();
        let degree: Vec<f64> = (0..g.node_count()).map(|v| g.strength(v) + LOOP_WEIGHT).collect();
        let p = walk_from(&g, &degree, 0, 4);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
