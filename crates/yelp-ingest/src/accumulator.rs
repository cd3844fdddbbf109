//! Per-relation row buffers with threshold flushing

use std::collections::BTreeMap;

use crate::error::Result;
use crate::loader::BulkLoader;
use crate::relation::Relation;
use crate::rows::Row;
use crate::store::BulkStore;

/// Outcome of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flushed {
    pub relation: Relation,
    pub rows: u64,
}

/// Buffers admitted rows and hands full buffers to the loader
///
/// Owned by a single phase. A failed flush propagates; the failing buffer is left in place
/// so nothing is silently discarded.
pub struct BatchAccumulator<S> {
    loader: BulkLoader<S>,
    thresholds: BTreeMap<Relation, usize>,
    buffers: BTreeMap<Relation, Vec<Row>>,
}

impl<S: BulkStore> BatchAccumulator<S> {
    /// `threshold` gives the flush size for each relation (minimum 1)
    pub fn new(loader: BulkLoader<S>, threshold: impl Fn(Relation) -> usize) -> Self {
        let thresholds = Relation::ALL
            .iter()
            .map(|r| (*r, threshold(*r).max(1)))
            .collect();
        Self {
            loader,
            thresholds,
            buffers: BTreeMap::new(),
        }
    }

    fn threshold(&self, relation: Relation) -> usize {
        self.thresholds.get(&relation).copied().unwrap_or(1)
    }

    /// Rows currently buffered for `relation`
    pub fn pending(&self, relation: Relation) -> usize {
        self.buffers.get(&relation).map_or(0, Vec::len)
    }

    /// Buffer one row, flushing its relation when the threshold is reached
    pub async fn add(&mut self, row: Row) -> Result<Option<Flushed>> {
        let relation = row.relation();
        let threshold = self.threshold(relation);
        let buffer = self
            .buffers
            .entry(relation)
            .or_insert_with(|| Vec::with_capacity(threshold.min(1 << 16)));
        buffer.push(row);

        if buffer.len() >= threshold {
            return self.flush(relation).await.map(Some);
        }
        Ok(None)
    }

    /// Flush every non-empty buffer
    pub async fn finish(&mut self) -> Result<Vec<Flushed>> {
        let pending: Vec<Relation> = self
            .buffers
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(relation, _)| *relation)
            .collect();

        let mut flushed = Vec::with_capacity(pending.len());
        for relation in pending {
            flushed.push(self.flush(relation).await?);
        }
        Ok(flushed)
    }

    async fn flush(&mut self, relation: Relation) -> Result<Flushed> {
        let rows = match self.buffers.get(&relation) {
            Some(rows) => self.loader.load(relation, rows).await?,
            None => 0,
        };
        if let Some(buffer) = self.buffers.get_mut(&relation) {
            buffer.clear();
        }
        Ok(Flushed { relation, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::{BusinessCategoryRow, CheckinRow};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::Duration;

    fn category(i: usize) -> Row {
        Row::BusinessCategory(BusinessCategoryRow {
            business_id: format!("b{}", i),
            category: "Cafes".into(),
        })
    }

    fn checkin(i: u32) -> Row {
        Row::Checkin(CheckinRow {
            business_id: "b1".into(),
            checkin_time: NaiveDate::from_ymd_opt(2019, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, i)
                .unwrap(),
        })
    }

    fn accumulator(store: &Arc<MemoryStore>, threshold: usize) -> BatchAccumulator<MemoryStore> {
        let loader = BulkLoader::new(Arc::clone(store)).with_retry_delay(Duration::ZERO);
        BatchAccumulator::new(loader, move |_| threshold)
    }

    #[tokio::test]
    async fn test_flushes_at_threshold() {
        let store = Arc::new(MemoryStore::new());
        let mut acc = accumulator(&store, 3);

        for i in 0..7 {
            acc.add(category(i)).await.unwrap();
        }
        assert_eq!(store.copy_calls(Relation::BusinessCategory).unwrap(), 2);
        assert_eq!(acc.pending(Relation::BusinessCategory), 1);

        let flushed = acc.finish().await.unwrap();
        assert_eq!(
            flushed,
            vec![Flushed {
                relation: Relation::BusinessCategory,
                rows: 1
            }]
        );
        assert_eq!(store.count(Relation::BusinessCategory).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_relations_buffer_independently() {
        let store = Arc::new(MemoryStore::new());
        let mut acc = accumulator(&store, 100);
        acc.add(category(1)).await.unwrap();
        acc.add(checkin(1)).await.unwrap();
        acc.add(checkin(2)).await.unwrap();

        assert_eq!(store.count(Relation::Checkin).unwrap(), 0);
        let flushed = acc.finish().await.unwrap();
        assert_eq!(flushed.len(), 2);
        assert_eq!(store.count(Relation::Checkin).unwrap(), 2);
        assert_eq!(store.count(Relation::BusinessCategory).unwrap(), 1);

        // Nothing left to flush
        assert!(acc.finish().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_flush_propagates_and_keeps_rows() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(Relation::Checkin, 2).unwrap();
        let mut acc = accumulator(&store, 2);

        acc.add(checkin(1)).await.unwrap();
        assert!(acc.add(checkin(2)).await.is_err());
        assert_eq!(acc.pending(Relation::Checkin), 2);
    }
}
