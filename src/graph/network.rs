//! Weighted undirected interaction graph

use std::mem;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::store::MAX_SCORE;
use crate::GeneId;

/// An undirected interaction, stored once with `source < target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: GeneId,
    pub target: GeneId,
    /// Raw confidence score on the 0..=1000 scale
    pub score: u16,
}

impl Edge {
    /// Normalized weight in [0, 1]
    pub fn weight(&self) -> f64 {
        self.score as f64 / MAX_SCORE as f64
    }

    /// Path length used by shortest-path metrics; stronger evidence is shorter
    pub fn distance(&self) -> f64 {
        MAX_SCORE as f64 / self.score.max(1) as f64
    }
}

/// Compressed sparse-row graph over a sorted gene set.
///
/// Node `i` is `genes[i]`. The adjacency of node `i` lives in
/// `neighbors[offsets[i]..offsets[i + 1]]`, sorted by neighbor index, with
/// `edge_ids` pointing at the shared edge record for each slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionGraph {
    genes: Vec<GeneId>,
    offsets: Vec<u32>,
    neighbors: Vec<u32>,
    edge_ids: Vec<u32>,
    edges: Vec<Edge>,
}

impl InteractionGraph {
    /// Assemble the adjacency from a sorted, deduplicated gene list and
    /// canonical edges between those genes.
    pub(crate) fn from_parts(genes: Vec<GeneId>, mut edges: Vec<Edge>) -> Self {
        debug_assert!(genes.windows(2).all(|w| w[0] < w[1]));
        edges.retain(|e| {
            e.source < e.target
                && genes.binary_search(&e.source).is_ok()
                && genes.binary_search(&e.target).is_ok()
        });
        edges.sort_unstable_by_key(|e| (e.source, e.target));
        edges.dedup_by_key(|e| (e.source, e.target));

        let node_count = genes.len();
        let endpoints: Vec<(usize, usize)> = edges
            .iter()
            .filter_map(|e| {
                let s = genes.binary_search(&e.source).ok()?;
                let t = genes.binary_search(&e.target).ok()?;
                Some((s, t))
            })
            .collect();

        let mut degrees = vec![0u32; node_count];
        for &(s, t) in &endpoints {
            degrees[s] += 1;
            degrees[t] += 1;
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);
        let mut offset = 0;
        for &degree in &degrees {
            offset += degree;
            offsets.push(offset);
        }

        let slots = offset as usize;
        let mut neighbors = vec![0u32; slots];
        let mut edge_ids = vec![0u32; slots];
        let mut cursor: Vec<usize> = offsets[..node_count].iter().map(|&o| o as usize).collect();

        for (edge_id, &(s, t)) in endpoints.iter().enumerate() {
            neighbors[cursor[s]] = t as u32;
            edge_ids[cursor[s]] = edge_id as u32;
            cursor[s] += 1;
            neighbors[cursor[t]] = s as u32;
            edge_ids[cursor[t]] = edge_id as u32;
            cursor[t] += 1;
        }

        let mut graph = Self {
            genes,
            offsets,
            neighbors,
            edge_ids,
            edges,
        };
        graph.sort_adjacency_lists();
        graph
    }

    /// An edgeless graph over the given genes
    pub fn isolated(genes: impl IntoIterator<Item = GeneId>) -> Self {
        let mut genes: Vec<GeneId> = genes.into_iter().collect();
        genes.sort_unstable();
        genes.dedup();
        Self::from_parts(genes, Vec::new())
    }

    fn sort_adjacency_lists(&mut self) {
        for node in 0..self.node_count() {
            let start = self.offsets[node] as usize;
            let end = self.offsets[node + 1] as usize;
            if end - start > 1 {
                let mut slots: Vec<(u32, u32)> = self.neighbors[start..end]
                    .iter()
                    .copied()
                    .zip(self.edge_ids[start..end].iter().copied())
                    .collect();
                slots.sort_unstable();
                for (i, (n, e)) in slots.into_iter().enumerate() {
                    self.neighbors[start + i] = n;
                    self.edge_ids[start + i] = e;
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.genes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Gene identifiers in ascending order
    pub fn genes(&self) -> &[GeneId] {
        &self.genes
    }

    /// Edges ordered by `(source, target)`
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn gene(&self, node: usize) -> GeneId {
        self.genes[node]
    }

    pub fn index_of(&self, gene: GeneId) -> Option<usize> {
        self.genes.binary_search(&gene).ok()
    }

    pub fn contains(&self, gene: GeneId) -> bool {
        self.index_of(gene).is_some()
    }

    /// Neighbor node indices of `node`, ascending
    pub fn neighbors(&self, node: usize) -> &[u32] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.neighbors[start..end]
    }

    /// Neighbors of `node` with the edge record connecting them
    pub fn neighbor_edges(&self, node: usize) -> impl Iterator<Item = (usize, &Edge)> + '_ {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        self.neighbors[start..end]
            .iter()
            .zip(&self.edge_ids[start..end])
            .map(move |(&n, &e)| (n as usize, &self.edges[e as usize]))
    }

    /// Neighbors of `node` with normalized edge weights
    pub fn weighted_neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.neighbor_edges(node).map(|(n, e)| (n, e.weight()))
    }

    pub fn degree(&self, node: usize) -> usize {
        (self.offsets[node + 1] - self.offsets[node]) as usize
    }

    pub fn gene_degree(&self, gene: GeneId) -> Option<usize> {
        self.index_of(gene).map(|node| self.degree(node))
    }

    /// Sum of normalized weights on the edges of `node`
    pub fn strength(&self, node: usize) -> f64 {
        self.weighted_neighbors(node).map(|(_, w)| w).sum()
    }

    pub fn has_edge(&self, a: GeneId, b: GeneId) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => self.neighbors(a).binary_search(&(b as u32)).is_ok(),
            _ => false,
        }
    }

    /// Connected components as sorted node-index lists, ordered by their
    /// smallest member (which is also their smallest gene id).
    pub fn components(&self) -> Vec<Vec<usize>> {
        super::components::connected_components(self)
    }

    pub fn component_count(&self) -> usize {
        self.components().len()
    }

    /// Subgraph induced by the nodes flagged in `keep`; surviving edges are
    /// carried over unchanged.
    pub fn induced(&self, keep: &[bool]) -> InteractionGraph {
        debug_assert_eq!(keep.len(), self.node_count());

        let genes: Vec<GeneId> = self
            .genes
            .iter()
            .zip(keep)
            .filter(|(_, &k)| k)
            .map(|(&g, _)| g)
            .collect();

        let edges: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| {
                let s = self.genes.binary_search(&e.source).map_or(false, |i| keep[i]);
                let t = self.genes.binary_search(&e.target).map_or(false, |i| keep[i]);
                s && t
            })
            .copied()
            .collect();

        Self::from_parts(genes, edges)
    }

    /// Undirected petgraph view; node index `i` carries `genes[i]` and edge
    /// weights are raw scores.
    pub fn to_petgraph(&self) -> UnGraph<GeneId, u16> {
        let mut graph = UnGraph::with_capacity(self.node_count(), self.edge_count());
        for &gene in &self.genes {
            graph.add_node(gene);
        }
        for edge in &self.edges {
            if let (Some(s), Some(t)) = (self.index_of(edge.source), self.index_of(edge.target)) {
                graph.add_edge(NodeIndex::new(s), NodeIndex::new(t), edge.score);
            }
        }
        graph
    }

    /// Estimate heap and inline size in bytes
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let genes = self.genes.capacity() * mem::size_of::<GeneId>();
        let offsets = self.offsets.capacity() * mem::size_of::<u32>();
        let adjacency = (self.neighbors.capacity() + self.edge_ids.capacity()) * mem::size_of::<u32>();
        let edges = self.edges.capacity() * mem::size_of::<Edge>();

        base + genes + offsets + adjacency + edges
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a graph from `(a, b, score)` triples plus any extra isolated genes
    pub(crate) fn graph(genes: &[GeneId], edges: &[(GeneId, GeneId, u16)]) -> InteractionGraph {
        let mut all: Vec<GeneId> = genes.to_vec();
        all.extend(edges.iter().flat_map(|&(a, b, _)| [a, b]));
        all.sort_unstable();
        all.dedup();
        let edges = edges
            .iter()
            .map(|&(a, b, score)| Edge {
                source: a.min(b),
                target: a.max(b),
                score,
            })
            .collect();
        InteractionGraph::from_parts(all, edges)
    }

    #[test]
    fn adjacency_is_symmetric() {
        let g = graph(&[], &[(1, 2, 900), (2, 3, 500), (1, 3, 100)]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        for node in 0..g.node_count() {
            for &n in g.neighbors(node) {
                assert!(g.neighbors(n as usize).contains(&(node as u32)));
            }
        }
        assert!(g.has_edge(3, 2));
        assert!(g.has_edge(2, 3));
        assert!(!g.has_edge(1, 4));
    }

    #[test]
    fn edges_stored_once_in_canonical_order() {
        let g = graph(&[], &[(5, 1, 300), (2, 1, 800)]);
        let pairs: Vec<(GeneId, GeneId)> = g.edges().iter().map(|e| (e.source, e.target)).collect();
        assert_eq!(pairs, vec![(1, 2), (1, 5)]);
        assert!(g.edges().iter().all(|e| e.source < e.target));
    }

    #[test]
    fn weights_and_distances() {
        let g = graph(&[], &[(1, 2, 250)]);
        let e = g.edges()[0];
        assert!((e.weight() - 0.25).abs() < 1e-12);
        assert!((e.distance() - 4.0).abs() < 1e-12);
        assert!((g.strength(0) - 0.25).abs() < 1e-12);

        let zero = Edge { source: 1, target: 2, score: 0 };
        assert!(zero.distance().is_finite());
    }

    #[test]
    fn induced_keeps_internal_edges_only() {
        let g = graph(&[], &[(1, 2, 900), (2, 3, 900), (3, 4, 900)]);
        let sub = g.induced(&[true, true, true, false]);
        assert_eq!(sub.genes(), &[1, 2, 3]);
        assert_eq!(sub.edge_count(), 2);
        assert_eq!(sub.gene_degree(3), Some(1));
    }

    #[test]
    fn component_count_counts_isolated_nodes() {
        let g = graph(&[9], &[(1, 2, 900), (3, 4, 900)]);
        assert_eq!(g.component_count(), 3);
    }

    #[test]
    fn petgraph_view_matches() {
        let g = graph(&[7], &[(1, 2, 900), (2, 3, 400)]);
        let pg = g.to_petgraph();
        assert_eq!(pg.node_count(), 4);
        assert_eq!(pg.edge_count(), 2);
        assert_eq!(pg[NodeIndex::new(3)], 7);

        let edge = pg.find_edge(NodeIndex::new(1), NodeIndex::new(2)).unwrap();
        assert_eq!(pg[edge], 400);
        assert!(pg.find_edge(NodeIndex::new(0), NodeIndex::new(2)).is_none());
    }
}
