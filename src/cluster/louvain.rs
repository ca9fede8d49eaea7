//! Louvain modularity optimisation

use rand::Rng;

use super::aggregate::{move_nodes, renumber, WeightedNetwork};
use crate::graph::InteractionGraph;

const MAX_LEVELS: usize = 32;

/// Detect communities with the multi-level Louvain heuristic.
///
/// Returns one community label per node index of `graph`. Communities are not
/// guaranteed to be internally connected.
pub(super) fn louvain<R: Rng>(graph: &InteractionGraph, resolution: f64, rng: &mut R) -> Vec<usize> {
    let mut network = WeightedNetwork::from_graph(graph);
    // Original node -> node of the current level
    let mut membership: Vec<usize> = (0..graph.node_count()).collect();

    for level in 0..MAX_LEVELS {
        let mut community: Vec<usize> = (0..network.node_count()).collect();
        if !move_nodes(&network, &mut community, resolution, rng) {
            log::debug!("Louvain converged after {} levels", level);
            break;
        }

        let (community, count) = renumber(&community);
        for m in membership.iter_mut() {
            *m = community[*m];
        }
        log::debug!(
            "Louvain level {}: {} -> {} nodes",
            level,
            network.node_count(),
            count
        );
        network = network.aggregate(&community, count);
    }

    membership
}
