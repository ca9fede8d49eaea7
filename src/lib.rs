//! Protein-interaction network analysis for a disease gene catalogue

pub mod cache;
pub mod centrality;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod store;

/// Numeric gene identifier as used by the interaction store
pub type GeneId = u64;

pub use config::EngineConfig;
pub use engine::NetworkEngine;
pub use error::{EngineError, ErrorKind, Result};
