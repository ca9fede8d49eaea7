//! Interchange formats and results persistence

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, to_string_pretty};

use crate::cluster::Cluster;
use crate::engine::{BuildResponse, ClusterResponse};
use crate::GeneId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceNode {
    pub id: GeneId,
    pub label: String,
    pub degree: usize,
    /// Display index of the gene's cluster, if any
    pub group: Option<usize>,
    pub is_seed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceLink {
    pub source: GeneId,
    pub target: GeneId,
    /// Normalized edge weight
    pub value: f64,
}

/// Node/link document consumed by force-directed graph renderers.
///
/// Only display indices appear here; raw algorithm labels stay internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceGraph {
    pub nodes: Vec<ForceNode>,
    pub links: Vec<ForceLink>,
}

impl ForceGraph {
    pub fn new(graph: &BuildResponse) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| ForceNode {
                id: n.id,
                label: n.id.to_string(),
                degree: n.degree,
                group: None,
                is_seed: n.is_seed.unwrap_or(false),
            })
            .collect();
        let links = graph
            .edges
            .iter()
            .map(|e| ForceLink {
                source: e.source,
                target: e.target,
                value: e.weight,
            })
            .collect();

        Self { nodes, links }
    }

    /// Color nodes by the cluster they were assigned to
    pub fn with_clusters(mut self, clusters: &ClusterResponse) -> Self {
        let groups: HashMap<GeneId, usize> = clusters
            .assignments
            .iter()
            .map(|a| (a.gene, a.display_index))
            .collect();
        for node in &mut self.nodes {
            node.group = groups.get(&node.id).copied();
        }
        self
    }

    /// Replace the numeric labels with names where known
    pub fn with_labels(mut self, labels: &HashMap<GeneId, String>) -> Self {
        for node in &mut self.nodes {
            if let Some(label) = labels.get(&node.id) {
                node.label = label.clone();
            }
        }
        self
    }
}

/// One cluster's genes as handed to an enrichment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentSet {
    pub display_index: usize,
    pub genes: Vec<GeneId>,
}

/// Member lists ordered by display index
pub fn enrichment_sets(clusters: &[Cluster]) -> Vec<EnrichmentSet> {
    let mut sets: Vec<EnrichmentSet> = clusters
        .iter()
        .map(|c| EnrichmentSet {
            display_index: c.display_index,
            genes: c.members.clone(),
        })
        .collect();
    sets.sort_by_key(|s| s.display_index);
    sets
}

/// Write `value` as pretty JSON, creating parent directories as needed
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Save a clustering run to `output_dir`: a summary, one file per cluster
/// and the enrichment sets.
pub fn save_cluster_results(response: &ClusterResponse, output_dir: impl AsRef<Path>) -> Result<()> {
    let output_dir = output_dir.as_ref();
    log::info!(
        "Saving {} clusters to {}",
        response.cluster_count,
        output_dir.display()
    );

    let clusters_dir = output_dir.join("clusters");
    fs::create_dir_all(&clusters_dir)?;

    let clustered: usize = response.clusters.iter().map(|c| c.size).sum();
    let count = response.clusters.len().max(1) as f64;
    let summary = json!({
        "algorithm": response.algorithm,
        "seed": response.seed,
        "modularity": response.modularity,
        "cluster_stats": {
            "cluster_count": response.cluster_count,
            "total_clustered_genes": clustered,
            "unclustered_genes": response.unclustered.len(),
            "largest_cluster_size": response.clusters.first().map_or(0, |c| c.size),
            "smallest_cluster_size": response.clusters.last().map_or(0, |c| c.size),
            "avg_cluster_size": clustered as f64 / count,
            "avg_density": response.clusters.iter().map(|c| c.density).sum::<f64>() / count,
        }
    });
    let mut file = File::create(output_dir.join("summary.json"))?;
    file.write_all(to_string_pretty(&summary)?.as_bytes())?;

    for cluster in &response.clusters {
        write_json(
            clusters_dir.join(format!("cluster_{}.json", cluster.display_index)),
            cluster,
        )?;
    }

    write_json(
        output_dir.join("enrichment_sets.json"),
        &enrichment_sets(&response.clusters),
    )?;

    log::info!("Results saved successfully");
    Ok(())
}
