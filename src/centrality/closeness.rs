//! Component-local weighted closeness

use petgraph::algo::dijkstra;
use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use crate::graph::InteractionGraph;
use crate::store::MAX_SCORE;

/// `(s - 1) / sum(distances)` where `s` is the size of the node's own
/// component and distances are weighted shortest paths inside it.
///
/// Nodes in a single-node component get `None`; there is nothing to be close
/// to, and reporting 0 would read as "infinitely far".
pub fn closeness_centrality(graph: &InteractionGraph) -> Vec<Option<f64>> {
    let pg = graph.to_petgraph();

    (0..graph.node_count())
        .into_par_iter()
        .map(|node| {
            let reached = dijkstra(&pg, NodeIndex::new(node), None, |e| {
                MAX_SCORE as f64 / (*e.weight()).max(1) as f64
            });
            let reachable = reached.len();
            if reachable <= 1 {
                return None;
            }
            let total: f64 = reached.values().sum();
            (total > 0.0).then(|| (reachable - 1) as f64 / total)
        })
        .collect()
}
