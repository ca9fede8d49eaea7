//! Cluster statistics and partition quality

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use crate::graph::InteractionGraph;
use crate::GeneId;

/// Representatives reported per cluster
pub const REPRESENTATIVE_COUNT: usize = 5;

/// Newman modularity of `labels` (one per node index) under normalized edge
/// weights: `Q = sum_c [ L_c / m - resolution * (d_c / 2m)^2 ]`.
///
/// Zero for an edgeless graph.
pub fn modularity(graph: &InteractionGraph, labels: &[usize], resolution: f64) -> f64 {
    let m: f64 = graph.edges().iter().map(|e| e.weight()).sum();
    if m <= 0.0 {
        return 0.0;
    }

    let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
    let mut degree: BTreeMap<usize, f64> = BTreeMap::new();

    for node in 0..graph.node_count() {
        *degree.entry(labels[node]).or_insert(0.0) += graph.strength(node);
    }
    for edge in graph.edges() {
        let (Some(s), Some(t)) = (graph.index_of(edge.source), graph.index_of(edge.target)) else {
            continue;
        };
        if labels[s] == labels[t] {
            *internal.entry(labels[s]).or_insert(0.0) += edge.weight();
        }
    }

    degree
        .iter()
        .map(|(label, &d)| {
            let l = internal.get(label).copied().unwrap_or(0.0);
            l / m - resolution * (d / (2.0 * m)).powi(2)
        })
        .sum()
}

/// Internal edges over possible undirected edges; 1.0 for a singleton
pub fn cluster_density(graph: &InteractionGraph, members: &[usize]) -> f64 {
    let n = members.len();
    if n <= 1 {
        return 1.0;
    }

    let member_set: HashSet<usize> = members.iter().copied().collect();
    let mut endpoints = 0usize;
    for &node in members {
        endpoints += graph
            .neighbors(node)
            .iter()
            .filter(|&&n| member_set.contains(&(n as usize)))
            .count();
    }

    // Each internal edge was seen from both ends
    let actual = endpoints / 2;
    let potential = n * (n - 1) / 2;
    actual as f64 / potential as f64
}

/// Up to `top` members ranked by degree inside the cluster, ties by gene id
pub fn central_members(graph: &InteractionGraph, members: &[usize], top: usize) -> Vec<GeneId> {
    let member_set: HashSet<usize> = members.iter().copied().collect();

    let mut by_degree: Vec<(usize, GeneId)> = members
        .iter()
        .map(|&node| {
            let degree = graph
                .neighbors(node)
                .iter()
                .filter(|&&n| member_set.contains(&(n as usize)))
                .count();
            (degree, graph.gene(node))
        })
        .collect();

    by_degree.sort_by_key(|&(degree, gene)| (Reverse(degree), gene));
    by_degree.into_iter().take(top).map(|(_, gene)| gene).collect()
}

/// Order groups for display: larger first, then by smallest gene.
///
/// `groups` holds each group's members in ascending order. Returns group
/// positions in display order, so `display_order(..)[d]` is the group shown
/// with display index `d`.
pub fn display_order(groups: &[Vec<GeneId>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&g| {
        let members = &groups[g];
        (Reverse(members.len()), members.first().copied().unwrap_or(GeneId::MAX))
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::network::tests::graph;

    fn two_pairs() -> InteractionGraph {
        graph(&[], &[(1, 2, 1000), (3, 4, 1000)])
    }

    #[test]
    fn modularity_of_perfect_split() {
        let g = two_pairs();
        let q = modularity(&g, &[0, 0, 1, 1], 1.0);
        assert!((q - 0.5).abs() < 1e-12);

        let whole = modularity(&g, &[0, 0, 0, 0], 1.0);
        assert!(whole.abs() < 1e-12);
    }

    #[test]
    fn modularity_stays_in_bounds() {
        let g = graph(
            &[],
            &[(1, 2, 900), (2, 3, 200), (3, 4, 700), (4, 1, 50), (1, 3, 1000)],
        );
        let labelings: [[usize; 4]; 5] = [
            [0, 0, 0, 0],
            [0, 1, 2, 3],
            [0, 1, 0, 1],
            [0, 0, 1, 1],
            [1, 0, 0, 1],
        ];
        for labels in labelings {
            let q = modularity(&g, &labels, 1.0);
            assert!((-1.0..=1.0).contains(&q), "{:?} gave {}", labels, q);
        }
    }

    #[test]
    fn modularity_of_edgeless_graph_is_zero() {
        let g = graph(&[1, 2], &[]);
        assert_eq!(modularity(&g, &[0, 1], 1.0), 0.0);
    }

    #[test]
    fn density_of_triangle_with_tail() {
        let g = graph(&[], &[(1, 2, 900), (2, 3, 900), (1, 3, 900), (3, 4, 900)]);
        assert!((cluster_density(&g, &[0, 1, 2]) - 1.0).abs() < 1e-12);
        assert!((cluster_density(&g, &[0, 1, 2, 3]) - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(cluster_density(&g, &[3]), 1.0);
    }

    #[test]
    fn central_members_prefers_hubs() {
        let g = graph(&[], &[(5, 1, 900), (5, 2, 900), (5, 3, 900), (1, 2, 900)]);
        let members: Vec<usize> = (0..g.node_count()).collect();
        assert_eq!(central_members(&g, &members, 2), vec![5, 1]);
    }

    #[test]
    fn display_order_ignores_raw_numbering() {
        let a = vec![vec![10, 11], vec![1, 2, 3], vec![4, 5]];
        let b = vec![vec![4, 5], vec![10, 11], vec![1, 2, 3]];

        let shown = |groups: &[Vec<GeneId>]| -> Vec<Vec<GeneId>> {
            display_order(groups).into_iter().map(|g| groups[g].clone()).collect()
        };
        assert_eq!(shown(&a), shown(&b));
        assert_eq!(shown(&a), vec![vec![1, 2, 3], vec![4, 5], vec![10, 11]]);
    }
}
