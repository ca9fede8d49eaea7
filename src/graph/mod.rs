//! Graph representation, construction and structural operations

pub mod builder;
pub mod components;
pub mod filter;
pub mod network;
pub mod subgraph;

pub use builder::{build_graph, GraphBuilder};
pub use filter::{filter_graph, FilterOptions};
pub use network::{Edge, InteractionGraph};
pub use subgraph::{extract_subgraph, Subgraph};
