//! Graph construction from stored interaction records

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, Result};
use crate::graph::network::{Edge, InteractionGraph};
use crate::store::{InteractionStore, StoreError, MAX_SCORE};
use crate::GeneId;

/// Builder for incrementally constructing an InteractionGraph over a fixed
/// gene set
pub struct GraphBuilder {
    /// Requested genes; every one becomes a node
    genes: BTreeSet<GeneId>,

    /// Minimum score for an interaction to become an edge
    min_confidence: u16,

    /// Best score seen per unordered pair
    pairs: BTreeMap<(GeneId, GeneId), u16>,
}

impl GraphBuilder {
    pub fn new(genes: BTreeSet<GeneId>, min_confidence: u16) -> Self {
        Self {
            genes,
            min_confidence,
            pairs: BTreeMap::new(),
        }
    }

    /// Offer one reported interaction. Reports touching genes outside the
    /// requested set, self-reports and scores below the threshold are dropped.
    /// Returns whether the report was kept.
    pub fn add_interaction(&mut self, gene: GeneId, partner: GeneId, score: u16) -> bool {
        if gene == partner || score < self.min_confidence {
            return false;
        }
        if !self.genes.contains(&gene) || !self.genes.contains(&partner) {
            return false;
        }

        let key = (gene.min(partner), gene.max(partner));
        let best = self.pairs.entry(key).or_insert(score);
        *best = (*best).max(score);
        true
    }

    pub fn build(self) -> InteractionGraph {
        let edges = self
            .pairs
            .into_iter()
            .map(|((source, target), score)| Edge {
                source,
                target,
                score,
            })
            .collect();

        InteractionGraph::from_parts(self.genes.into_iter().collect(), edges)
    }
}

/// Fetch interactions for `genes` and assemble the thresholded graph.
///
/// The fetch is all-or-nothing: any adapter failure or out-of-range score
/// fails the build without returning a partial graph.
pub fn build_graph(
    store: &dyn InteractionStore,
    genes: &BTreeSet<GeneId>,
    min_confidence: u16,
    max_genes: usize,
) -> Result<InteractionGraph> {
    if genes.is_empty() {
        return Err(EngineError::invalid("gene set is empty"));
    }
    if genes.len() > max_genes {
        return Err(EngineError::CapacityExceeded {
            resource: "gene set",
            limit: max_genes,
            requested: genes.len(),
        });
    }
    if min_confidence > MAX_SCORE {
        return Err(EngineError::invalid(format!(
            "min_confidence {} outside 0..={}",
            min_confidence, MAX_SCORE
        )));
    }

    log::debug!(
        "Fetching interactions for {} genes (min confidence {})",
        genes.len(),
        min_confidence
    );
    let records = store.fetch(genes)?;

    let mut builder = GraphBuilder::new(genes.clone(), min_confidence);
    let mut offered = 0usize;
    let mut kept = 0usize;

    // Walk genes in order so a malformed record is reported deterministically
    for gene in genes {
        let Some(interactions) = records.get(gene) else {
            continue;
        };
        for interaction in interactions {
            if interaction.score > MAX_SCORE {
                return Err(StoreError::Malformed(format!(
                    "score {} for {}-{} exceeds {}",
                    interaction.score, gene, interaction.partner, MAX_SCORE
                ))
                .into());
            }
            offered += 1;
            if builder.add_interaction(*gene, interaction.partner, interaction.score) {
                kept += 1;
            }
        }
    }

    let graph = builder.build();
    log::info!(
        "Built graph with {} nodes and {} edges ({} of {} reports kept)",
        graph.node_count(),
        graph.edge_count(),
        kept,
        offered
    );

    Ok(graph)
}
