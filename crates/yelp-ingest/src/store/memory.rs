use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{BulkStore, CopyBatch};
use crate::copy::decode_line;
use crate::error::{IngestError, Result};
use crate::relation::{Relation, RootEntity};

/// Decoded rows of one relation
pub type StoredRows = Vec<Vec<Option<String>>>;

type Key = Vec<Option<String>>;

#[derive(Default)]
struct State {
    tables: BTreeMap<Relation, StoredRows>,
    keys: BTreeMap<Relation, HashSet<Key>>,
    copy_calls: BTreeMap<Relation, usize>,
    failures: BTreeMap<Relation, u32>,
}

/// In-memory [`BulkStore`]
///
/// Batches are decoded back into fields so callers can inspect exactly what a `COPY` would
/// have written. Primary keys are enforced like the real tables: a batch carrying a key that
/// is already stored, or twice within itself, is rejected whole. Failures can be injected per
/// relation.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| IngestError::store("memory store lock poisoned"))
    }

    /// Make the next `times` batches for `relation` fail
    pub fn fail_next(&self, relation: Relation, times: u32) -> Result<()> {
        self.lock()?.failures.insert(relation, times);
        Ok(())
    }

    /// Seed committed rows, as if an earlier run had loaded them
    pub fn insert_rows(&self, relation: Relation, rows: StoredRows) -> Result<()> {
        self.lock()?.append(relation, rows)
    }

    pub fn rows(&self, relation: Relation) -> Result<StoredRows> {
        Ok(self
            .lock()?
            .tables
            .get(&relation)
            .cloned()
            .unwrap_or_default())
    }

    pub fn count(&self, relation: Relation) -> Result<usize> {
        Ok(self.lock()?.tables.get(&relation).map_or(0, Vec::len))
    }

    /// Number of batches accepted for `relation`
    pub fn copy_calls(&self, relation: Relation) -> Result<usize> {
        Ok(self.lock()?.copy_calls.get(&relation).copied().unwrap_or(0))
    }

    /// Row count of every relation, in relation order
    pub fn table_counts(&self) -> Result<Vec<(Relation, i64)>> {
        let state = self.lock()?;
        Ok(Relation::ALL
            .iter()
            .map(|r| (*r, state.tables.get(r).map_or(0, Vec::len) as i64))
            .collect())
    }
}

impl State {
    /// Append `rows` unless one of them repeats a primary key; nothing is kept on failure
    fn append(&mut self, relation: Relation, rows: StoredRows) -> Result<()> {
        if let Some(width) = relation.key_width() {
            let stored = self.keys.entry(relation).or_default();
            let mut batch: HashSet<Key> = HashSet::with_capacity(rows.len());
            for row in &rows {
                let key: Key = row.iter().take(width).cloned().collect();
                if stored.contains(&key) || !batch.insert(key.clone()) {
                    return Err(IngestError::store(format!(
                        "duplicate key value violates primary key of {}: {:?}",
                        relation, key
                    )));
                }
            }
            stored.extend(batch);
        }
        self.tables.entry(relation).or_default().extend(rows);
        Ok(())
    }
}

#[async_trait]
impl BulkStore for MemoryStore {
    async fn copy_in(&self, batch: &CopyBatch) -> Result<u64> {
        let mut state = self.lock()?;

        if let Some(remaining) = state.failures.get_mut(&batch.relation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(IngestError::store(format!(
                    "injected failure for {}",
                    batch.relation
                )));
            }
        }

        let text = std::str::from_utf8(&batch.payload)
            .map_err(|e| IngestError::store(format!("payload is not UTF-8: {}", e)))?;
        let rows: StoredRows = text.lines().map(decode_line).collect();
        let written = rows.len() as u64;

        state.append(batch.relation, rows)?;
        *state.copy_calls.entry(batch.relation).or_default() += 1;
        Ok(written)
    }

    async fn fetch_identities(&self, entity: RootEntity) -> Result<HashSet<String>> {
        let state = self.lock()?;
        Ok(state
            .tables
            .get(&entity.relation())
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.first().cloned().flatten())
                    .collect()
            })
            .unwrap_or_default())
    }
}
