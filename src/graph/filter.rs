//! Structural reduction of a built graph

use serde::{Deserialize, Serialize};

use crate::graph::InteractionGraph;

/// Which reductions to apply; the default applies none
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Drop nodes without edges
    pub remove_isolated: bool,

    /// Drop nodes with fewer than this many edges, repeatedly, until stable
    pub min_degree: usize,

    /// Keep only the component with the most nodes
    pub largest_component_only: bool,
}

impl FilterOptions {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Apply `options` in the order: degree pruning, component restriction,
/// isolated-node removal. The result's node set is a subset of the input's
/// and surviving edges are unchanged.
pub fn filter_graph(graph: &InteractionGraph, options: &FilterOptions) -> InteractionGraph {
    if options.is_noop() {
        return graph.clone();
    }

    let node_count = graph.node_count();
    let mut alive = vec![true; node_count];
    let mut degree: Vec<usize> = (0..node_count).map(|n| graph.degree(n)).collect();

    if options.min_degree > 0 {
        prune_to_min_degree(graph, options.min_degree, &mut alive, &mut degree);
    }

    if options.largest_component_only {
        restrict_to_largest_component(graph, &mut alive);
        for node in 0..node_count {
            degree[node] = live_degree(graph, node, &alive);
        }
    }

    if options.remove_isolated {
        for node in 0..node_count {
            if alive[node] && degree[node] == 0 {
                alive[node] = false;
            }
        }
    }

    let filtered = graph.induced(&alive);
    log::debug!(
        "Filter {:?}: {} -> {} nodes, {} -> {} edges",
        options,
        graph.node_count(),
        filtered.node_count(),
        graph.edge_count(),
        filtered.edge_count()
    );
    filtered
}

/// Remove nodes below `k` until no removal happens. Removing a node lowers
/// its neighbors' degrees, which can push them below `k` in turn.
fn prune_to_min_degree(
    graph: &InteractionGraph,
    k: usize,
    alive: &mut [bool],
    degree: &mut [usize],
) {
    let mut rounds = 0;
    loop {
        let mut changed = false;
        for node in 0..graph.node_count() {
            if !alive[node] || degree[node] >= k {
                continue;
            }
            alive[node] = false;
            changed = true;
            for &neighbor in graph.neighbors(node) {
                let neighbor = neighbor as usize;
                if alive[neighbor] {
                    degree[neighbor] -= 1;
                }
            }
        }
        rounds += 1;
        if !changed {
            break;
        }
    }
    log::debug!("Degree pruning (k = {}) converged after {} rounds", k, rounds);
}

fn restrict_to_largest_component(graph: &InteractionGraph, alive: &mut [bool]) {
    let current = graph.induced(alive);
    // Components come ordered by smallest gene, so the first maximum wins ties
    let mut best: Option<Vec<usize>> = None;
    for component in current.components() {
        if best.as_ref().map_or(true, |b| component.len() > b.len()) {
            best = Some(component);
        }
    }

    alive.iter_mut().for_each(|a| *a = false);
    if let Some(component) = best {
        for node in component {
            if let Some(original) = graph.index_of(current.gene(node)) {
                alive[original] = true;
            }
        }
    }
}

fn live_degree(graph: &InteractionGraph, node: usize, alive: &[bool]) -> usize {
    if !alive[node] {
        return 0;
    }
    graph
        .neighbors(node)
        .iter()
        .filter(|&&n| alive[n as usize])
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::network::tests::graph;

    fn min_degree(k: usize) -> FilterOptions {
        FilterOptions {
            min_degree: k,
            ..Default::default()
        }
    }

    fn largest() -> FilterOptions {
        FilterOptions {
            largest_component_only: true,
            ..Default::default()
        }
    }

    #[test]
    fn largest_component_tie_goes_to_lowest_gene() {
        let g = graph(&[], &[(1, 2, 900), (3, 4, 900)]);
        assert_eq!(g.component_count(), 2);

        let kept = filter_graph(&g, &largest());
        assert_eq!(kept.genes(), &[1, 2]);
        assert_eq!(kept.edge_count(), 1);
    }

    #[test]
    fn min_degree_drops_unconnected_node() {
        let g = graph(&[3], &[(1, 2, 900)]);
        let kept = filter_graph(&g, &min_degree(1));
        assert_eq!(kept.genes(), &[1, 2]);
        assert_eq!(kept.edges(), g.edges());
    }

    #[test]
    fn min_degree_reaches_fixed_point() {
        // Triangle 1-2-3 with a tail 3-4-5. One pass at k = 2 removes 5 only;
        // the fixed point must also remove 4.
        let g = graph(
            &[],
            &[(1, 2, 900), (2, 3, 900), (1, 3, 900), (3, 4, 900), (4, 5, 900)],
        );
        let kept = filter_graph(&g, &min_degree(2));
        assert_eq!(kept.genes(), &[1, 2, 3]);
        assert_eq!(kept.edge_count(), 3);

        let again = filter_graph(&kept, &min_degree(2));
        assert_eq!(again, kept);
    }

    #[test]
    fn min_degree_is_monotone() {
        let g = graph(
            &[10],
            &[
                (1, 2, 900),
                (1, 3, 900),
                (1, 4, 900),
                (2, 3, 900),
                (3, 4, 900),
                (4, 5, 900),
                (5, 6, 900),
            ],
        );
        let mut previous = g.node_count();
        for k in 0..6 {
            let count = filter_graph(&g, &min_degree(k)).node_count();
            assert!(count <= g.node_count());
            assert!(count <= previous, "k = {} grew the graph", k);
            previous = count;
        }
    }

    #[test]
    fn component_restriction_is_idempotent() {
        let g = graph(&[7], &[(1, 2, 900), (2, 3, 900), (4, 5, 900)]);
        let once = filter_graph(&g, &largest());
        let twice = filter_graph(&once, &largest());
        assert_eq!(once, twice);
        assert_eq!(once.genes(), &[1, 2, 3]);
    }

    #[test]
    fn degree_pruning_precedes_component_choice() {
        // Star on 1 has four nodes but collapses under k = 2; the triangle survives.
        let g = graph(
            &[],
            &[
                (1, 2, 900),
                (1, 3, 900),
                (1, 4, 900),
                (10, 11, 900),
                (11, 12, 900),
                (10, 12, 900),
            ],
        );
        let options = FilterOptions {
            min_degree: 2,
            largest_component_only: true,
            remove_isolated: true,
        };
        let kept = filter_graph(&g, &options);
        assert_eq!(kept.genes(), &[10, 11, 12]);
    }

    #[test]
    fn remove_isolated_keeps_weights() {
        let g = graph(&[8, 9], &[(1, 2, 321)]);
        let options = FilterOptions {
            remove_isolated: true,
            ..Default::default()
        };
        let kept = filter_graph(&g, &options);
        assert_eq!(kept.genes(), &[1, 2]);
        assert_eq!(kept.edges()[0].score, 321);
    }

    #[test]
    fn empty_result_is_allowed() {
        let g = graph(&[1, 2], &[]);
        let kept = filter_graph(&g, &min_degree(1));
        assert!(kept.is_empty());
        assert_eq!(filter_graph(&kept, &largest()).node_count(), 0);
    }
}
