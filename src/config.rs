//! Configuration management for the network engine

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::centrality::PageRankConfig;
use crate::cluster::DetectionLimits;
use crate::error::EngineError;

/// Limits and tuning for a [`NetworkEngine`](crate::engine::NetworkEngine).
///
/// Every field has a default, so a JSON config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest gene set a single request may name
    pub max_genes: usize,

    /// Largest hop radius for subgraph extraction
    pub max_hops: u32,

    /// Worker threads (0 = use all available cores)
    pub worker_threads: usize,

    /// Jobs admitted beyond the running ones
    pub queue_depth: usize,

    /// Entries kept per result cache
    pub cache_capacity: usize,

    pub cache_ttl_secs: u64,

    /// Byte budget per result cache
    pub cache_max_bytes: usize,

    /// Node cap for Leiden and Louvain
    pub max_detection_nodes: usize,

    /// Node cap for walktrap, whose memory grows with the square of the nodes
    pub max_walktrap_nodes: usize,

    pub pagerank: PageRankConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_genes: 5000,
            max_hops: 4,
            worker_threads: 0,
            queue_depth: 16,
            cache_capacity: 256,
            cache_ttl_secs: 600,
            cache_max_bytes: 256 * 1024 * 1024,
            max_detection_nodes: 20_000,
            max_walktrap_nodes: 3000,
            pagerank: PageRankConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with custom request limits and pool size
    pub fn new(max_genes: usize, max_hops: u32, worker_threads: usize) -> Self {
        Self {
            max_genes,
            max_hops,
            worker_threads,
            ..Self::default()
        }
    }

    /// Load a JSON config file; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_genes == 0 {
            return Err(EngineError::invalid("max_genes must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(EngineError::invalid("cache_capacity must be at least 1"));
        }
        let damping = self.pagerank.damping;
        if !(0.0..1.0).contains(&damping) {
            return Err(EngineError::invalid(format!(
                "pagerank damping must be in [0, 1), got {}",
                damping
            )));
        }
        Ok(())
    }

    pub fn detection_limits(&self) -> DetectionLimits {
        DetectionLimits {
            max_nodes: self.max_detection_nodes,
            max_walktrap_nodes: self.max_walktrap_nodes,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            ttl: Duration::from_secs(self.cache_ttl_secs),
            max_bytes: self.cache_max_bytes,
        }
    }
}
