//! Cluster detection entry point

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::metrics::{central_members, cluster_density, display_order, modularity, REPRESENTATIVE_COUNT};
use super::{leiden, louvain, walktrap};
use super::{Algorithm, Cluster, ClusterAssignment, Partition};
use crate::error::{EngineError, Result};
use crate::graph::InteractionGraph;
use crate::GeneId;

/// Random-walk length used by walktrap
pub const WALKTRAP_STEPS: usize = 4;

/// Parameters of one detection run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    pub algorithm: Algorithm,

    /// Seed for the randomized node orders; ignored by walktrap
    pub seed: u64,

    /// Clusters smaller than this are dropped and their genes left unclustered
    pub min_cluster_size: usize,

    /// Modularity resolution used during optimisation
    pub resolution: f64,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Leiden,
            seed: 42,
            min_cluster_size: 1,
            resolution: 1.0,
        }
    }
}

/// Size caps protecting against runaway detection cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionLimits {
    pub max_nodes: usize,
    pub max_walktrap_nodes: usize,
}

/// Partition `graph` into communities.
///
/// Identical `(graph, options)` always produce an identical partition.
/// Different seeds may produce different partitions of comparable quality,
/// since Leiden and Louvain visit nodes in a seeded random order.
pub fn detect_communities(
    graph: &InteractionGraph,
    options: &DetectOptions,
    limits: &DetectionLimits,
) -> Result<Partition> {
    if graph.edge_count() == 0 {
        return Err(EngineError::InsufficientStructure(format!(
            "graph with {} nodes has no edges to cluster",
            graph.node_count()
        )));
    }
    if !options.resolution.is_finite() || options.resolution <= 0.0 {
        return Err(EngineError::invalid(format!(
            "resolution must be positive, got {}",
            options.resolution
        )));
    }

    let node_count = graph.node_count();
    let cap = match options.algorithm {
        Algorithm::Walktrap => limits.max_walktrap_nodes.min(limits.max_nodes),
        Algorithm::Leiden | Algorithm::Louvain => limits.max_nodes,
    };
    if node_count > cap {
        return Err(EngineError::AlgorithmUnavailable {
            algorithm: options.algorithm.name(),
            reason: format!("graph has {} nodes, limit is {}", node_count, cap),
        });
    }

    log::info!(
        "Detecting communities with {} (seed {}) on {} nodes, {} edges",
        options.algorithm,
        options.seed,
        node_count,
        graph.edge_count()
    );

    let mut rng = StdRng::seed_from_u64(options.seed);
    let raw_labels = match options.algorithm {
        Algorithm::Leiden => leiden::leiden(graph, options.resolution, &mut rng),
        Algorithm::Louvain => louvain::louvain(graph, options.resolution, &mut rng),
        Algorithm::Walktrap => walktrap::walktrap(graph, WALKTRAP_STEPS),
    };

    let partition = build_partition(graph, &raw_labels, options);
    log::info!(
        "Found {} clusters (modularity {:.4}, {} genes unclustered)",
        partition.cluster_count(),
        partition.modularity,
        partition.unclustered.len()
    );

    Ok(partition)
}

/// Group nodes by raw label, drop undersized groups, rank the rest for
/// display and compute per-cluster metrics.
fn build_partition(graph: &InteractionGraph, raw_labels: &[usize], options: &DetectOptions) -> Partition {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &label) in raw_labels.iter().enumerate() {
        groups.entry(label).or_default().push(node);
    }

    let mut kept: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut unclustered: BTreeSet<GeneId> = BTreeSet::new();
    for (label, nodes) in groups {
        if nodes.len() >= options.min_cluster_size {
            kept.push((label, nodes));
        } else {
            unclustered.extend(nodes.iter().map(|&n| graph.gene(n)));
        }
    }

    let member_genes: Vec<Vec<GeneId>> = kept
        .iter()
        .map(|(_, nodes)| nodes.iter().map(|&n| graph.gene(n)).collect())
        .collect();
    let order = display_order(&member_genes);

    let clusters: Vec<Cluster> = order
        .par_iter()
        .enumerate()
        .map(|(display_index, &group)| {
            let (raw_index, nodes) = &kept[group];
            Cluster {
                display_index,
                raw_index: *raw_index,
                members: member_genes[group].clone(),
                size: nodes.len(),
                density: cluster_density(graph, nodes),
                representatives: central_members(graph, nodes, REPRESENTATIVE_COUNT),
            }
        })
        .collect();

    let mut assignments = BTreeMap::new();
    for cluster in &clusters {
        for &gene in &cluster.members {
            assignments.insert(
                gene,
                ClusterAssignment {
                    raw_index: cluster.raw_index,
                    display_index: cluster.display_index,
                },
            );
        }
    }

    // Unclustered genes are scored as singleton communities
    let mut scoring_labels = vec![0usize; graph.node_count()];
    let mut singleton = clusters.len();
    for node in 0..graph.node_count() {
        scoring_labels[node] = match assignments.get(&graph.gene(node)) {
            Some(a) => a.display_index,
            None => {
                singleton += 1;
                singleton
            }
        };
    }

    Partition {
        algorithm: options.algorithm,
        seed: options.seed,
        modularity: modularity(graph, &scoring_labels, 1.0),
        clusters,
        assignments,
        unclustered: unclustered.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::graph::network::tests::graph;

    const LIMITS: DetectionLimits = DetectionLimits {
        max_nodes: 1000,
        max_walktrap_nodes: 100,
    };

    fn options(algorithm: Algorithm, seed: u64) -> DetectOptions {
        DetectOptions {
            algorithm,
            seed,
            ..Default::default()
        }
    }

    /// Three dense groups of different sizes with sparse weak links between them
    fn modules() -> InteractionGraph {
        let mut edges = Vec::new();
        let groups: [&[u64]; 3] = [&[1, 2, 3, 4, 5], &[10, 11, 12, 13], &[20, 21, 22]];
        for group in groups {
            for (i, &a) in group.iter().enumerate() {
                for &b in &group[i + 1..] {
                    edges.push((a, b, 900));
                }
            }
        }
        edges.push((5, 10, 150));
        edges.push((13, 20, 150));
        edges.push((1, 22, 120));
        graph(&[], &edges)
    }

    #[test]
    fn edgeless_graph_is_insufficient() {
        let err = detect_communities(&graph(&[1, 2, 3], &[]), &DetectOptions::default(), &LIMITS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStructure);

        let err = detect_communities(&graph(&[1], &[]), &DetectOptions::default(), &LIMITS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStructure);
    }

    #[test]
    fn all_algorithms_recover_the_modules() {
        let g = modules();
        for algorithm in [Algorithm::Leiden, Algorithm::Louvain, Algorithm::Walktrap] {
            let partition = detect_communities(&g, &options(algorithm, 3), &LIMITS).unwrap();
            let members = partition.membership_lists();
            assert_eq!(
                members,
                vec![vec![1, 2, 3, 4, 5], vec![10, 11, 12, 13], vec![20, 21, 22]],
                "{} split differently",
                algorithm
            );
            assert!(partition.modularity > 0.3);
            assert!(partition.unclustered.is_empty());
        }
    }

    #[test]
    fn same_seed_same_partition() {
        let g = modules();
        for algorithm in [Algorithm::Leiden, Algorithm::Louvain, Algorithm::Walktrap] {
            let first = detect_communities(&g, &options(algorithm, 99), &LIMITS).unwrap();
            let second = detect_communities(&g, &options(algorithm, 99), &LIMITS).unwrap();
            assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
        }
    }

    #[test]
    fn different_seeds_find_comparable_partitions() {
        // Seeds change the visiting order and therefore possibly the raw
        // labels; the display view of this well-separated graph must not move.
        let g = modules();
        let reference = detect_communities(&g, &options(Algorithm::Leiden, 0), &LIMITS).unwrap();
        for seed in 1..10 {
            let other = detect_communities(&g, &options(Algorithm::Leiden, seed), &LIMITS).unwrap();
            assert_eq!(other.membership_lists(), reference.membership_lists());
            assert!((other.modularity - reference.modularity).abs() < 1e-9);
        }
    }

    #[test]
    fn display_indices_follow_size() {
        let g = modules();
        let partition = detect_communities(&g, &DetectOptions::default(), &LIMITS).unwrap();
        let sizes: Vec<usize> = partition.clusters.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![5, 4, 3]);
        for (d, cluster) in partition.clusters.iter().enumerate() {
            assert_eq!(cluster.display_index, d);
            for gene in &cluster.members {
                assert_eq!(partition.assignments[gene].display_index, d);
                assert_eq!(partition.assignments[gene].raw_index, cluster.raw_index);
            }
        }
        assert_eq!(partition.cluster_of(21).map(|c| c.display_index), Some(2));
    }

    #[test]
    fn small_clusters_are_left_unclustered() {
        let g = modules();
        let opts = DetectOptions {
            min_cluster_size: 4,
            ..Default::default()
        };
        let partition = detect_communities(&g, &opts, &LIMITS).unwrap();
        assert_eq!(partition.cluster_count(), 2);
        assert_eq!(partition.unclustered, vec![20, 21, 22]);
        assert!(partition.cluster_of(20).is_none());
        assert!(!partition.assignments.contains_key(&20));
    }

    #[test]
    fn representatives_and_density() {
        let g = modules();
        let partition = detect_communities(&g, &DetectOptions::default(), &LIMITS).unwrap();
        let first = &partition.clusters[0];
        assert!((first.density - 1.0).abs() < 1e-12);
        assert!(first.representatives.len() <= REPRESENTATIVE_COUNT);
        assert!(first.representatives.iter().all(|g| first.members.contains(g)));
    }

    #[test]
    fn size_caps_refuse_detection() {
        let g = modules();
        let tight = DetectionLimits {
            max_nodes: 1000,
            max_walktrap_nodes: 5,
        };
        let err = detect_communities(&g, &options(Algorithm::Walktrap, 0), &tight).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlgorithmUnavailable);
        assert!(detect_communities(&g, &options(Algorithm::Louvain, 0), &tight).is_ok());
    }

    #[test]
    fn modularity_within_bounds_for_all_algorithms() {
        let g = graph(
            &[],
            &[(1, 2, 500), (2, 3, 600), (3, 1, 700), (3, 4, 50), (4, 5, 990)],
        );
        for algorithm in [Algorithm::Leiden, Algorithm::Louvain, Algorithm::Walktrap] {
            let q = detect_communities(&g, &options(algorithm, 5), &LIMITS)
                .unwrap()
                .modularity;
            assert!((-1.0..=1.0).contains(&q));
        }
    }
}
