//! Parquet-backed interaction table

use std::path::Path;

use polars::prelude::*;

use super::{MemoryStore, StoreError, MAX_SCORE};
use crate::GeneId;

impl From<PolarsError> for StoreError {
    fn from(err: PolarsError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Load an ingested interaction table into memory.
///
/// The table must have integer columns `gene_a`, `gene_b` and `score`. Each row
/// is recorded for `gene_a`; ingestion usually writes both directions, and the
/// graph builder merges them either way.
pub fn load_parquet(path: impl AsRef<Path>) -> Result<MemoryStore, StoreError> {
    let path = path.as_ref();
    log::info!("Reading interaction table: {}", path.display());

    if !path.exists() {
        return Err(StoreError::Unavailable(format!(
            "file not found: {}",
            path.display()
        )));
    }

    let df = LazyFrame::scan_parquet(path, Default::default())?
        .select([
            col("gene_a").cast(DataType::Int64),
            col("gene_b").cast(DataType::Int64),
            col("score").cast(DataType::Int64),
        ])
        .collect()?;

    log::info!("Loaded {} interaction rows", df.height());

    let gene_a = df.column("gene_a")?.i64()?;
    let gene_b = df.column("gene_b")?.i64()?;
    let score = df.column("score")?.i64()?;

    let mut store = MemoryStore::new();
    for row in 0..df.height() {
        let (Some(a), Some(b), Some(s)) = (gene_a.get(row), gene_b.get(row), score.get(row))
        else {
            return Err(StoreError::Malformed(format!("null cell in row {}", row)));
        };

        let a = to_gene_id(a, row)?;
        let b = to_gene_id(b, row)?;
        if !(0..=MAX_SCORE as i64).contains(&s) {
            return Err(StoreError::Malformed(format!(
                "score {} out of range in row {}",
                s, row
            )));
        }

        store.insert(a, b, s as u16);
    }

    log::debug!(
        "Interaction table covers {} genes, {} records",
        store.gene_count(),
        store.record_count()
    );

    Ok(store)
}

fn to_gene_id(raw: i64, row: usize) -> Result<GeneId, StoreError> {
    GeneId::try_from(raw)
        .map_err(|_| StoreError::Malformed(format!("negative gene id {} in row {}", raw, row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Interaction, InteractionStore};
    use std::collections::BTreeSet;
    use std::fs::File;
    use tempfile::TempDir;

    fn write_table(dir: &TempDir, mut df: DataFrame) -> std::path::PathBuf {
        let path = dir.path().join("interactions.parquet");
        let file = File::create(&path).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();
        path
    }

    #[test]
    fn loads_rows_per_source_gene() {
        let dir = TempDir::new().unwrap();
        let df = df!(
            "gene_a" => &[1i64, 2, 1],
            "gene_b" => &[2i64, 1, 3],
            "score" => &[900i64, 850, 400],
        )
        .unwrap();
        let path = write_table(&dir, df);

        let store = load_parquet(&path).unwrap();
        let genes: BTreeSet<GeneId> = [1, 2, 3].into_iter().collect();
        let fetched = store.fetch(&genes).unwrap();

        assert_eq!(fetched[&1].len(), 2);
        assert_eq!(fetched[&2], vec![Interaction { partner: 1, score: 850 }]);
        assert!(fetched[&3].is_empty());
    }

    #[test]
    fn out_of_range_score_is_malformed() {
        let dir = TempDir::new().unwrap();
        let df = df!(
            "gene_a" => &[1i64],
            "gene_b" => &[2i64],
            "score" => &[1200i64],
        )
        .unwrap();
        let path = write_table(&dir, df);

        assert!(matches!(load_parquet(&path), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let result = load_parquet(dir.path().join("absent.parquet"));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
