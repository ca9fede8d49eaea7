//! Interaction store adapter
//!
//! The engine never writes to the store. Everything it needs is the list of
//! reported partners and confidence scores for each requested gene.

pub mod parquet;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::GeneId;

pub use self::parquet::load_parquet;

/// Upper bound of the confidence score scale used by the source data
pub const MAX_SCORE: u16 = 1000;

/// One reported interaction, seen from the gene it was fetched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub partner: GeneId,
    pub score: u16,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("malformed interaction data: {0}")]
    Malformed(String),
}

/// Read-only source of per-gene interaction records.
///
/// Implementations return an entry (possibly empty) for every requested gene
/// they know nothing about, or simply omit it; both mean "no interactions".
/// A failure must fail the whole fetch.
pub trait InteractionStore: Send + Sync {
    fn fetch(
        &self,
        genes: &BTreeSet<GeneId>,
    ) -> Result<HashMap<GeneId, Vec<Interaction>>, StoreError>;
}

/// In-memory interaction table
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: HashMap<GeneId, Vec<Interaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction as reported for `gene` only
    pub fn insert(&mut self, gene: GeneId, partner: GeneId, score: u16) {
        self.records
            .entry(gene)
            .or_default()
            .push(Interaction { partner, score });
    }

    /// Record an interaction in both directions
    pub fn insert_pair(&mut self, a: GeneId, b: GeneId, score: u16) {
        self.insert(a, b, score);
        self.insert(b, a, score);
    }

    pub fn with_pair(mut self, a: GeneId, b: GeneId, score: u16) -> Self {
        self.insert_pair(a, b, score);
        self
    }

    pub fn gene_count(&self) -> usize {
        self.records.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }
}

impl InteractionStore for MemoryStore {
    fn fetch(
        &self,
        genes: &BTreeSet<GeneId>,
    ) -> Result<HashMap<GeneId, Vec<Interaction>>, StoreError> {
        Ok(genes
            .iter()
            .map(|gene| {
                let records = self.records.get(gene).cloned().unwrap_or_default();
                (*gene, records)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_gene_yields_empty_list() {
        let store = MemoryStore::new().with_pair(1, 2, 900);
        let genes: BTreeSet<GeneId> = [1, 7].into_iter().collect();

        let fetched = store.fetch(&genes).unwrap();
        assert_eq!(fetched[&1], vec![Interaction { partner: 2, score: 900 }]);
        assert!(fetched[&7].is_empty());
        assert!(!fetched.contains_key(&2));
    }

    #[test]
    fn insert_is_directional() {
        let mut store = MemoryStore::new();
        store.insert(1, 2, 500);
        assert_eq!(store.gene_count(), 1);
        assert_eq!(store.record_count(), 1);

        store.insert_pair(3, 4, 700);
        assert_eq!(store.record_count(), 3);
    }
}
