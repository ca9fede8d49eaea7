//! Per-gene importance scores

mod betweenness;
mod closeness;
mod pagerank;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::graph::InteractionGraph;
use crate::GeneId;

pub use betweenness::betweenness_centrality;
pub use closeness::closeness_centrality;
pub use pagerank::{pagerank, PageRankConfig};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Degree,
    Betweenness,
    Closeness,
    Pagerank,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Degree,
        Metric::Betweenness,
        Metric::Closeness,
        Metric::Pagerank,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Degree => "degree",
            Metric::Betweenness => "betweenness",
            Metric::Closeness => "closeness",
            Metric::Pagerank => "pagerank",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Requested metrics for every gene of a graph.
///
/// A `None` value means the metric is undefined for that gene (closeness in a
/// single-node component). Metrics that were not requested are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityResult {
    pub metrics: BTreeSet<Metric>,
    pub scores: BTreeMap<GeneId, BTreeMap<Metric, Option<f64>>>,
}

impl CentralityResult {
    pub fn get(&self, gene: GeneId, metric: Metric) -> Option<f64> {
        self.scores.get(&gene)?.get(&metric).copied().flatten()
    }

    /// Rough heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let per_gene = mem::size_of::<GeneId>()
            + self.metrics.len() * (mem::size_of::<Metric>() + mem::size_of::<Option<f64>>() + 16)
            + 32;
        mem::size_of::<Self>() + self.scores.len() * per_gene
    }
}

/// Degree over the maximum possible degree `n - 1`
pub fn degree_centrality(graph: &InteractionGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n <= 1 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|node| graph.degree(node) as f64 / (n - 1) as f64)
        .collect()
}

/// Compute each requested metric over `graph`
pub fn compute_centrality(
    graph: &InteractionGraph,
    metrics: &BTreeSet<Metric>,
    pagerank_config: &PageRankConfig,
) -> CentralityResult {
    log::info!(
        "Computing [{}] for {} nodes, {} edges",
        metrics.iter().join(", "),
        graph.node_count(),
        graph.edge_count()
    );

    let mut scores: BTreeMap<GeneId, BTreeMap<Metric, Option<f64>>> = graph
        .genes()
        .iter()
        .map(|&gene| (gene, BTreeMap::new()))
        .collect();

    for &metric in metrics {
        let values: Vec<Option<f64>> = match metric {
            Metric::Degree => degree_centrality(graph).into_iter().map(Some).collect(),
            Metric::Betweenness => betweenness_centrality(graph).into_iter().map(Some).collect(),
            Metric::Closeness => closeness_centrality(graph),
            Metric::Pagerank => pagerank(graph, pagerank_config).into_iter().map(Some).collect(),
        };

        for (node, value) in values.into_iter().enumerate() {
            if let Some(record) = scores.get_mut(&graph.gene(node)) {
                record.insert(metric, value);
            }
        }
    }

    CentralityResult {
        metrics: metrics.clone(),
        scores,
    }
}
