//! Weighted betweenness (Brandes over Dijkstra)

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;

use crate::graph::InteractionGraph;

/// Sources handled per parallel task. Partial sums are combined in chunk
/// order so results do not depend on scheduling.
const SOURCE_CHUNK: usize = 32;

/// Relative tolerance under which two path lengths count as equal
const TIE_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, PartialEq)]
struct Visit {
    distance: f64,
    node: usize,
}

impl Eq for Visit {}

impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on distance, then node index
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn same_length(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Share of shortest weighted paths through each node, normalized by the
/// `(n - 1)(n - 2) / 2` pairs a node can sit between. Zero below three nodes.
pub fn betweenness_centrality(graph: &InteractionGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n < 3 || graph.edge_count() == 0 {
        return vec![0.0; n];
    }

    let sources: Vec<usize> = (0..n).collect();
    let partials: Vec<Vec<f64>> = sources
        .par_chunks(SOURCE_CHUNK)
        .map(|chunk| {
            let mut acc = vec![0.0; n];
            for &source in chunk {
                accumulate_from(graph, source, &mut acc);
            }
            acc
        })
        .collect();

    let mut totals = vec![0.0; n];
    for partial in partials {
        for (total, value) in totals.iter_mut().zip(partial) {
            *total += value;
        }
    }

    // Every unordered pair was counted from both ends
    let scale = ((n - 1) * (n - 2)) as f64;
    totals.iter().map(|&b| b / scale).collect()
}

/// Single-source dependency accumulation
fn accumulate_from(graph: &InteractionGraph, source: usize, acc: &mut [f64]) {
    let n = graph.node_count();
    let mut distance = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0f64; n];
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut settled = vec![false; n];
    let mut order: Vec<usize> = Vec::with_capacity(n);

    distance[source] = 0.0;
    sigma[source] = 1.0;
    let mut heap = BinaryHeap::new();
    heap.push(Visit {
        distance: 0.0,
        node: source,
    });

    while let Some(Visit { distance: d, node: v }) = heap.pop() {
        if settled[v] {
            continue;
        }
        settled[v] = true;
        order.push(v);

        for (w, edge) in graph.neighbor_edges(v) {
            if settled[w] {
                continue;
            }
            let candidate = d + edge.distance();
            if distance[w].is_infinite() || (candidate < distance[w] && !same_length(candidate, distance[w])) {
                distance[w] = candidate;
                sigma[w] = sigma[v];
                predecessors[w].clear();
                predecessors[w].push(v);
                heap.push(Visit {
                    distance: candidate,
                    node: w,
                });
            } else if same_length(candidate, distance[w]) {
                sigma[w] += sigma[v];
                predecessors[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    while let Some(w) = order.pop() {
        for &v in &predecessors[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != source {
            acc[w] += delta[w];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::network::tests::graph;

    #[test]
    fn star_center_carries_every_path() {
        let g = graph(&[], &[(1, 2, 1000), (1, 3, 1000), (1, 4, 1000)]);
        let bc = betweenness_centrality(&g);
        assert!((bc[0] - 1.0).abs() < 1e-12);
        assert!(bc[1..].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn path_middle_nodes() {
        // 1 - 2 - 3 - 4 with equal scores
        let g = graph(&[], &[(1, 2, 500), (2, 3, 500), (3, 4, 500)]);
        let bc = betweenness_centrality(&g);
        // Node 2 sits between (1,3) and (1,4): 2 of 3 pairs
        assert!((bc[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((bc[2] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(bc[0], 0.0);
    }

    #[test]
    fn confident_detour_beats_weak_direct_edge() {
        // Direct 1-3 is weak (distance 10), the route through 2 costs 2
        let g = graph(&[], &[(1, 3, 100), (1, 2, 1000), (2, 3, 1000)]);
        let bc = betweenness_centrality(&g);
        assert!((bc[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn equal_paths_split_credit() {
        // Square 1-2-4-3-1: two shortest routes between 1 and 4
        let g = graph(&[], &[(1, 2, 800), (2, 4, 800), (1, 3, 800), (3, 4, 800)]);
        let bc = betweenness_centrality(&g);
        let pairs = 3.0;
        // Node 2 gets half of (1,4); normalized over 3 pairs
        assert!((bc[1] - 0.5 / pairs).abs() < 1e-12);
        assert!((bc[2] - 0.5 / pairs).abs() < 1e-12);
    }

    #[test]
    fn chunked_sum_matches_across_runs() {
        let mut edges = Vec::new();
        for i in 0..80u64 {
            edges.push((i, i + 1, (100 + (i * 37) % 900) as u16));
            edges.push((i, (i * 7 + 3) % 81, (150 + (i * 13) % 800) as u16));
        }
        let g = graph(&[], &edges);
        assert_eq!(betweenness_centrality(&g), betweenness_centrality(&g));
    }
}
