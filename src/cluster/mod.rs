//! Community detection over interaction graphs

pub mod detection;
pub mod metrics;

mod aggregate;
mod leiden;
mod louvain;
mod walktrap;

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GeneId;

pub use detection::{detect_communities, DetectOptions, DetectionLimits};

/// Supported community detection algorithms
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Modularity optimisation with refinement; clusters are always connected
    Leiden,
    /// Classic multi-level modularity optimisation
    Louvain,
    /// Random-walk agglomeration, deterministic, bounded graph size
    Walktrap,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Leiden => "leiden",
            Algorithm::Louvain => "louvain",
            Algorithm::Walktrap => "walktrap",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "leiden" => Ok(Algorithm::Leiden),
            "louvain" => Ok(Algorithm::Louvain),
            "walktrap" => Ok(Algorithm::Walktrap),
            other => Err(format!("unknown algorithm: {}", other)),
        }
    }
}

/// Where one gene landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// Label produced by the algorithm; arbitrary and run-dependent
    pub raw_index: usize,

    /// Position in the size-ordered cluster list
    pub display_index: usize,
}

/// A detected community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub display_index: usize,

    pub raw_index: usize,

    /// Members in ascending gene order
    pub members: Vec<GeneId>,

    pub size: usize,

    /// Internal edges / possible internal edges
    pub density: f64,

    /// Highest intra-cluster degree members, at most five
    pub representatives: Vec<GeneId>,
}

/// Cluster assignment for every gene of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub algorithm: Algorithm,

    pub seed: u64,

    /// Newman modularity of the returned clusters; unclustered genes count
    /// as singletons
    pub modularity: f64,

    /// Clusters ordered by display index
    pub clusters: Vec<Cluster>,

    pub assignments: BTreeMap<GeneId, ClusterAssignment>,

    /// Genes whose cluster fell below the minimum size
    pub unclustered: Vec<GeneId>,
}

impl Partition {
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn cluster_of(&self, gene: GeneId) -> Option<&Cluster> {
        self.assignments
            .get(&gene)
            .and_then(|a| self.clusters.get(a.display_index))
    }

    /// Member lists ordered by display index, as consumed by enrichment
    pub fn membership_lists(&self) -> Vec<Vec<GeneId>> {
        self.clusters.iter().map(|c| c.members.clone()).collect()
    }

    /// Rough heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let clusters: usize = self
            .clusters
            .iter()
            .map(|c| {
                mem::size_of::<Cluster>()
                    + (c.members.capacity() + c.representatives.capacity()) * mem::size_of::<GeneId>()
            })
            .sum();
        let assignments = self.assignments.len()
            * (mem::size_of::<GeneId>() + mem::size_of::<ClusterAssignment>() + 16);
        let unclustered = self.unclustered.capacity() * mem::size_of::<GeneId>();

        mem::size_of::<Self>() + clusters + assignments + unclustered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_round_trip() {
        for algorithm in [Algorithm::Leiden, Algorithm::Louvain, Algorithm::Walktrap] {
            assert_eq!(algorithm.name().parse::<Algorithm>(), Ok(algorithm));
        }
        assert_eq!("LEIDEN".parse::<Algorithm>(), Ok(Algorithm::Leiden));
        assert!("infomap".parse::<Algorithm>().is_err());
        assert_eq!(
            serde_json::to_string(&Algorithm::Walktrap).unwrap(),
            "\"walktrap\""
        );
    }
}
