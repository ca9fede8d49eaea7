use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use gene_network_engine::centrality::Metric;
use gene_network_engine::cluster::{Algorithm, DetectOptions};
use gene_network_engine::engine::{
    CentralityRequest, ClusterRequest, NetworkQuery, SubgraphRequest,
};
use gene_network_engine::export::{self, ForceGraph};
use gene_network_engine::graph::FilterOptions;
use gene_network_engine::store::load_parquet;
use gene_network_engine::{EngineConfig, GeneId, NetworkEngine};

#[derive(Parser, Debug)]
#[clap(
    name = "gene-network",
    about = "Protein-interaction network analysis over a disease gene catalogue"
)]
struct Cli {
    /// Path to the Parquet interaction table (gene_a, gene_b, score)
    #[clap(long, global = true)]
    interactions: Option<PathBuf>,

    /// JSON engine configuration; flags below override it
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, global = true)]
    threads: Option<usize>,

    /// Verbose logging
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct NetworkArgs {
    /// Comma-separated gene identifiers
    #[clap(long, value_delimiter = ',', required = true)]
    genes: Vec<GeneId>,

    /// Minimum interaction confidence (0-1000)
    #[clap(long, default_value = "400")]
    min_confidence: u16,

    /// Drop genes without interactions
    #[clap(long)]
    remove_isolated: bool,

    /// Prune genes below this degree until none remain
    #[clap(long, default_value = "0")]
    min_degree: usize,

    /// Keep only the largest connected component
    #[clap(long)]
    largest_component: bool,

    /// Output file (stdout when omitted)
    #[clap(long)]
    output: Option<PathBuf>,

    #[clap(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

impl NetworkArgs {
    fn query(&self) -> NetworkQuery {
        NetworkQuery::new(self.genes.iter().copied(), self.min_confidence).with_filter(FilterOptions {
            remove_isolated: self.remove_isolated,
            min_degree: self.min_degree,
            largest_component_only: self.largest_component,
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    ForceGraph,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the thresholded interaction graph
    Build {
        #[clap(flatten)]
        network: NetworkArgs,
    },

    /// Detect communities
    Cluster {
        #[clap(flatten)]
        network: NetworkArgs,

        #[clap(long, value_enum, default_value = "leiden")]
        algorithm: Algorithm,

        #[clap(long, default_value = "42")]
        seed: u64,

        /// Minimum cluster size
        #[clap(long, default_value = "1")]
        min_cluster_size: usize,

        #[clap(long, default_value = "1.0")]
        resolution: f64,

        /// Also write summary, per-cluster files and enrichment sets here
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },

    /// Extract the neighbourhood of seed genes
    Subgraph {
        #[clap(flatten)]
        network: NetworkArgs,

        /// Comma-separated seed gene identifiers
        #[clap(long, value_delimiter = ',', required = true)]
        seeds: Vec<GeneId>,

        #[clap(long, default_value = "1")]
        hops: u32,
    },

    /// Score gene importance
    Centrality {
        #[clap(flatten)]
        network: NetworkArgs,

        /// Comma-separated metrics
        #[clap(
            long,
            value_enum,
            value_delimiter = ',',
            default_value = "degree,betweenness,closeness,pagerank"
        )]
        metrics: Vec<Metric>,
    },
}

fn emit<T: Serialize>(value: &T, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            export::write_json(path, value)?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.worker_threads = threads;
    }

    let interactions = args
        .interactions
        .as_ref()
        .context("--interactions is required")?;
    let store = load_parquet(interactions)
        .with_context(|| format!("Failed to load {}", interactions.display()))?;
    log::info!(
        "Interaction table covers {} genes, {} records",
        store.gene_count(),
        store.record_count()
    );

    let engine = NetworkEngine::new(Arc::new(store), config)?;

    match args.command {
        Command::Build { network } => {
            let response = engine.build(network.query())?;
            log::info!(
                "Graph: {} nodes, {} edges, {} components",
                response.node_count,
                response.edge_count,
                response.component_count
            );
            match network.format {
                OutputFormat::Json => emit(&response, network.output.as_ref())?,
                OutputFormat::ForceGraph => {
                    emit(&ForceGraph::new(&response), network.output.as_ref())?
                }
            }
        }

        Command::Cluster {
            network,
            algorithm,
            seed,
            min_cluster_size,
            resolution,
            output_dir,
        } => {
            let response = engine.cluster(ClusterRequest {
                network: network.query(),
                options: DetectOptions {
                    algorithm,
                    seed,
                    min_cluster_size,
                    resolution,
                },
            })?;
            log::info!(
                "Found {} clusters, modularity {:.4}",
                response.cluster_count,
                response.modularity
            );

            if let Some(dir) = &output_dir {
                export::save_cluster_results(&response, dir)?;
            }
            match network.format {
                OutputFormat::Json => emit(&response, network.output.as_ref())?,
                OutputFormat::ForceGraph => {
                    let graph = engine.build(network.query())?;
                    let document = ForceGraph::new(&graph).with_clusters(&response);
                    emit(&document, network.output.as_ref())?
                }
            }
        }

        Command::Subgraph {
            network,
            seeds,
            hops,
        } => {
            let response = engine.subgraph(SubgraphRequest {
                network: network.query(),
                seeds,
                hops,
            })?;
            log::info!(
                "Subgraph: {} of {} seeds found, {} nodes",
                response.seeds_found,
                response.seeds_requested,
                response.graph.node_count
            );
            match network.format {
                OutputFormat::Json => emit(&response, network.output.as_ref())?,
                OutputFormat::ForceGraph => {
                    emit(&ForceGraph::new(&response.graph), network.output.as_ref())?
                }
            }
        }

        Command::Centrality { network, metrics } => {
            let metrics: BTreeSet<Metric> = metrics.into_iter().collect();
            let response = engine.centrality(CentralityRequest {
                network: network.query(),
                metrics,
            })?;
            emit(&response, network.output.as_ref())?;
        }
    }

    Ok(())
}
