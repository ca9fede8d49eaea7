//! Weighted PageRank by power iteration

use serde::{Deserialize, Serialize};

use crate::graph::InteractionGraph;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    /// L1 change between iterations below which iteration stops
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

/// Stationary distribution of a damped walk that follows edges in
/// proportion to their weight. Rank held by nodes without edges is spread
/// uniformly. The result sums to 1.
pub fn pagerank(graph: &InteractionGraph, config: &PageRankConfig) -> Vec<f64> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let uniform = 1.0 / n as f64;
    let strength: Vec<f64> = (0..n).map(|v| graph.strength(v)).collect();
    let mut rank = vec![uniform; n];

    for iteration in 0..config.max_iterations {
        let dangling: f64 = (0..n)
            .filter(|&v| strength[v] <= 0.0)
            .map(|v| rank[v])
            .sum();
        let base = (1.0 - config.damping) * uniform + config.damping * dangling * uniform;

        let mut next = vec![base; n];
        for v in 0..n {
            if strength[v] <= 0.0 {
                continue;
            }
            let share = config.damping * rank[v] / strength[v];
            for (u, w) in graph.weighted_neighbors(v) {
                next[u] += share * w;
            }
        }

        let change: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if change < config.tolerance {
            log::debug!("PageRank converged after {} iterations", iteration + 1);
            break;
        }
    }

    let total: f64 = rank.iter().sum();
    if total > 0.0 {
        for r in rank.iter_mut() {
            *r /= total;
        }
    }
    rank
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::network::tests::graph;

    #[test]
    fn sums_to_one() {
        let g = graph(&[7], &[(1, 2, 900), (2, 3, 300), (3, 1, 600), (3, 4, 100)]);
        let rank = pagerank(&g, &PageRankConfig::default());
        assert!((rank.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(rank.iter().all(|&r| r > 0.0));
    }

    #[test]
    fn hub_outranks_leaves() {
        let g = graph(&[], &[(1, 2, 800), (1, 3, 800), (1, 4, 800), (1, 5, 800)]);
        let rank = pagerank(&g, &PageRankConfig::default());
        assert!(rank[1..].iter().all(|&r| rank[0] > r));
        assert!((rank[1] - rank[4]).abs() < 1e-12);
    }

    #[test]
    fn stronger_edges_attract_more_rank() {
        // 2 is tied to 1 by a strong edge, 3 by a weak one
        let g = graph(&[], &[(1, 2, 1000), (1, 3, 100)]);
        let rank = pagerank(&g, &PageRankConfig::default());
        assert!(rank[1] > rank[2]);
    }

    #[test]
    fn edgeless_graph_is_uniform() {
        let g = graph(&[1, 2, 3], &[]);
        let rank = pagerank(&g, &PageRankConfig::default());
        for r in rank {
            assert!((r - 1.0 / 3.0).abs() < 1e-12);
        }
    }
}
