//! Bulk store interface
//!
//! The pipeline talks to its database only through [`BulkStore`]: one bulk write of an
//! encoded batch and one bulk read of a root entity's identities. [`PgStore`] is the
//! PostgreSQL implementation; [`MemoryStore`] records batches in memory for dry runs and tests.

mod memory;
mod postgres;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::copy::CopyEncoder;
use crate::error::Result;
use crate::relation::{Relation, RootEntity};
use crate::rows::Row;

pub use memory::MemoryStore;
pub use postgres::{IntegrityCheck, PgStore};

/// One relation's rows, already encoded in `COPY` text format
#[derive(Debug, Clone)]
pub struct CopyBatch {
    pub relation: Relation,
    pub rows: usize,
    pub payload: Vec<u8>,
}

impl CopyBatch {
    /// Encode rows that all belong to `relation`
    pub fn encode(relation: Relation, rows: &[Row]) -> Self {
        let mut encoder = CopyEncoder::with_capacity(rows.len() * 64);
        for row in rows {
            debug_assert_eq!(row.relation(), relation);
            row.encode(&mut encoder);
        }
        Self {
            relation,
            rows: encoder.rows(),
            payload: encoder.into_bytes(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Storage collaborator of the pipeline
#[async_trait]
pub trait BulkStore: Send + Sync {
    /// Apply one batch atomically; returns the number of rows written
    async fn copy_in(&self, batch: &CopyBatch) -> Result<u64>;

    /// Every committed identity of a root entity
    async fn fetch_identities(&self, entity: RootEntity) -> Result<HashSet<String>>;
}
