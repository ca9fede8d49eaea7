//! Request-level operations over a shared interaction store
//!
//! Every operation validates its request on the caller's thread, then runs on
//! the engine's worker pool. Built graphs, partitions and centrality results
//! are memoized per canonical request.

pub mod pool;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::centrality::{compute_centrality, CentralityResult, Metric};
use crate::cluster::{detect_communities, Algorithm, Cluster, DetectOptions, Partition};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::graph::{build_graph, extract_subgraph, filter_graph, FilterOptions, InteractionGraph};
use crate::store::{InteractionStore, MAX_SCORE};
use crate::GeneId;

pub use pool::{JobHandle, WorkerPool};

fn default_min_confidence() -> u16 {
    400
}

/// Gene set, threshold and reductions shared by every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkQuery {
    pub gene_ids: Vec<GeneId>,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: u16,

    #[serde(default)]
    pub filter: FilterOptions,
}

impl NetworkQuery {
    pub fn new(gene_ids: impl IntoIterator<Item = GeneId>, min_confidence: u16) -> Self {
        Self {
            gene_ids: gene_ids.into_iter().collect(),
            min_confidence,
            filter: FilterOptions::default(),
        }
    }

    pub fn with_filter(mut self, filter: FilterOptions) -> Self {
        self.filter = filter;
        self
    }

    /// Canonical gene set after checking the request against `config`
    fn validate(&self, config: &EngineConfig) -> Result<BTreeSet<GeneId>> {
        let genes: BTreeSet<GeneId> = self.gene_ids.iter().copied().collect();
        if genes.is_empty() {
            return Err(EngineError::invalid("gene set is empty"));
        }
        if genes.len() > config.max_genes {
            return Err(EngineError::CapacityExceeded {
                resource: "gene set",
                limit: config.max_genes,
                requested: genes.len(),
            });
        }
        if self.min_confidence > MAX_SCORE {
            return Err(EngineError::invalid(format!(
                "min_confidence {} is above {}",
                self.min_confidence, MAX_SCORE
            )));
        }
        Ok(genes)
    }
}

pub type BuildRequest = NetworkQuery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub network: NetworkQuery,

    #[serde(default)]
    pub options: DetectOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphRequest {
    pub network: NetworkQuery,
    pub seeds: Vec<GeneId>,
    pub hops: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentralityRequest {
    pub network: NetworkQuery,
    pub metrics: BTreeSet<Metric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: GeneId,
    pub degree: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_seed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: GeneId,
    pub target: GeneId,
    pub weight: f64,
    pub score: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResponse {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
}

impl BuildResponse {
    fn from_graph(graph: &InteractionGraph, seeds: Option<&BTreeSet<GeneId>>) -> Self {
        let nodes = (0..graph.node_count())
            .map(|node| {
                let id = graph.gene(node);
                NodeRecord {
                    id,
                    degree: graph.degree(node),
                    is_seed: seeds.map(|s| s.contains(&id)),
                }
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|e| EdgeRecord {
                source: e.source,
                target: e.target,
                weight: e.weight(),
                score: e.score,
            })
            .collect();

        Self {
            nodes,
            edges,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            component_count: graph.component_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub gene: GeneId,
    pub raw_index: usize,
    pub display_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub algorithm: Algorithm,
    pub seed: u64,
    pub modularity: f64,
    pub cluster_count: usize,
    pub assignments: Vec<AssignmentRecord>,
    pub clusters: Vec<Cluster>,
    pub unclustered: Vec<GeneId>,
}

impl From<&Partition> for ClusterResponse {
    fn from(partition: &Partition) -> Self {
        Self {
            algorithm: partition.algorithm,
            seed: partition.seed,
            modularity: partition.modularity,
            cluster_count: partition.cluster_count(),
            assignments: partition
                .assignments
                .iter()
                .map(|(&gene, a)| AssignmentRecord {
                    gene,
                    raw_index: a.raw_index,
                    display_index: a.display_index,
                })
                .collect(),
            clusters: partition.clusters.clone(),
            unclustered: partition.unclustered.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphResponse {
    #[serde(flatten)]
    pub graph: BuildResponse,
    pub seeds_requested: usize,
    pub seeds_found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityResponse {
    pub node_count: usize,
    pub edge_count: usize,
    pub result: CentralityResult,
}

/// State shared between the engine handle and its running jobs
struct Shared {
    store: Arc<dyn InteractionStore>,
    config: EngineConfig,
    graphs: ResultCache<InteractionGraph>,
    partitions: ResultCache<Partition>,
    centralities: ResultCache<CentralityResult>,
}

impl Shared {
    /// Built and filtered graph for `query`, from cache when possible
    fn network(&self, query: &NetworkQuery, genes: &BTreeSet<GeneId>) -> Result<Arc<InteractionGraph>> {
        let key = CacheKey::new("graph", genes, query.min_confidence, &query.filter, &())?;
        self.graphs.get_or_compute(key, || {
            let built = build_graph(
                self.store.as_ref(),
                genes,
                query.min_confidence,
                self.config.max_genes,
            )?;
            Ok(filter_graph(&built, &query.filter))
        })
    }

    fn build(&self, query: &NetworkQuery, genes: &BTreeSet<GeneId>) -> Result<BuildResponse> {
        let graph = self.network(query, genes)?;
        Ok(BuildResponse::from_graph(&graph, None))
    }

    fn cluster(&self, request: &ClusterRequest, genes: &BTreeSet<GeneId>) -> Result<ClusterResponse> {
        let graph = self.network(&request.network, genes)?;
        let options = &request.options;
        let params = (
            options.algorithm,
            options.seed,
            options.min_cluster_size,
            options.resolution.to_bits(),
        );
        let key = CacheKey::new(
            "cluster",
            genes,
            request.network.min_confidence,
            &request.network.filter,
            &params,
        )?;
        let limits = self.config.detection_limits();
        let partition = self
            .partitions
            .get_or_compute(key, || detect_communities(&graph, options, &limits))?;
        Ok(ClusterResponse::from(partition.as_ref()))
    }

    fn subgraph(&self, request: &SubgraphRequest, genes: &BTreeSet<GeneId>) -> Result<SubgraphResponse> {
        let graph = self.network(&request.network, genes)?;
        let seeds: BTreeSet<GeneId> = request.seeds.iter().copied().collect();
        let subgraph = extract_subgraph(&graph, &seeds, request.hops);

        Ok(SubgraphResponse {
            graph: BuildResponse::from_graph(&subgraph.graph, Some(&subgraph.seeds)),
            seeds_requested: subgraph.seeds_requested,
            seeds_found: subgraph.seeds_found(),
        })
    }

    fn centrality(
        &self,
        request: &CentralityRequest,
        genes: &BTreeSet<GeneId>,
    ) -> Result<CentralityResponse> {
        let graph = self.network(&request.network, genes)?;
        let metrics: Vec<Metric> = request.metrics.iter().copied().collect();
        let key = CacheKey::new(
            "centrality",
            genes,
            request.network.min_confidence,
            &request.network.filter,
            &metrics,
        )?;
        let result = self.centralities.get_or_compute(key, || {
            Ok::<_, EngineError>(compute_centrality(&graph, &request.metrics, &self.config.pagerank))
        })?;

        Ok(CentralityResponse {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            result: result.as_ref().clone(),
        })
    }
}

/// Entry point for the four network operations.
///
/// `submit_*` methods return a [`JobHandle`] immediately; the plain methods
/// submit and wait.
pub struct NetworkEngine {
    shared: Arc<Shared>,
    pool: WorkerPool,
}

impl NetworkEngine {
    pub fn new(store: Arc<dyn InteractionStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_threads, config.queue_depth)?;
        let cache_config = config.cache_config();

        Ok(Self {
            shared: Arc::new(Shared {
                store,
                graphs: ResultCache::new("graph", cache_config),
                partitions: ResultCache::new("partition", cache_config),
                centralities: ResultCache::new("centrality", cache_config),
                config,
            }),
            pool,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Statistics of the graph, partition and centrality caches
    pub fn cache_stats(&self) -> [CacheStats; 3] {
        [
            self.shared.graphs.stats(),
            self.shared.partitions.stats(),
            self.shared.centralities.stats(),
        ]
    }

    pub fn submit_build(&self, request: BuildRequest) -> Result<JobHandle<BuildResponse>> {
        let genes = request.validate(&self.shared.config)?;
        log::info!(
            "Build: {} genes, min confidence {}",
            genes.len(),
            request.min_confidence
        );
        let shared = Arc::clone(&self.shared);
        self.pool.submit(move || shared.build(&request, &genes))
    }

    pub fn build(&self, request: BuildRequest) -> Result<BuildResponse> {
        self.submit_build(request)?.wait()
    }

    pub fn submit_cluster(&self, request: ClusterRequest) -> Result<JobHandle<ClusterResponse>> {
        let genes = request.network.validate(&self.shared.config)?;
        let resolution = request.options.resolution;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(EngineError::invalid(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }
        log::info!(
            "Cluster: {} genes with {} (seed {})",
            genes.len(),
            request.options.algorithm,
            request.options.seed
        );
        let shared = Arc::clone(&self.shared);
        self.pool.submit(move || shared.cluster(&request, &genes))
    }

    pub fn cluster(&self, request: ClusterRequest) -> Result<ClusterResponse> {
        self.submit_cluster(request)?.wait()
    }

    pub fn submit_subgraph(&self, request: SubgraphRequest) -> Result<JobHandle<SubgraphResponse>> {
        let genes = request.network.validate(&self.shared.config)?;
        if request.seeds.is_empty() {
            return Err(EngineError::invalid("no seed genes given"));
        }
        if request.hops > self.shared.config.max_hops {
            return Err(EngineError::invalid(format!(
                "hops {} is above the limit of {}",
                request.hops, self.shared.config.max_hops
            )));
        }
        log::info!(
            "Subgraph: {} seeds, {} hops over {} genes",
            request.seeds.len(),
            request.hops,
            genes.len()
        );
        let shared = Arc::clone(&self.shared);
        self.pool.submit(move || shared.subgraph(&request, &genes))
    }

    pub fn subgraph(&self, request: SubgraphRequest) -> Result<SubgraphResponse> {
        self.submit_subgraph(request)?.wait()
    }

    pub fn submit_centrality(
        &self,
        request: CentralityRequest,
    ) -> Result<JobHandle<CentralityResponse>> {
        let genes = request.network.validate(&self.shared.config)?;
        if request.metrics.is_empty() {
            return Err(EngineError::invalid("no centrality metrics requested"));
        }
        let shared = Arc::clone(&self.shared);
        self.pool.submit(move || shared.centrality(&request, &genes))
    }

    pub fn centrality(&self, request: CentralityRequest) -> Result<CentralityResponse> {
        self.submit_centrality(request)?.wait()
    }
}
