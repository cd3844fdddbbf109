//! Bulk loader: one encoded batch, one `COPY`, one retry

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::relation::Relation;
use crate::rows::Row;
use crate::store::{BulkStore, CopyBatch};

/// A batch is attempted at most this many times
pub const MAX_ATTEMPTS: u32 = 2;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct BulkLoader<S> {
    store: Arc<S>,
    retry_delay: Duration,
}

impl<S> Clone for BulkLoader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry_delay: self.retry_delay,
        }
    }
}

impl<S: BulkStore> BulkLoader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Encode `rows` once and apply them as a single batch
    ///
    /// A failed attempt is retried with the identical payload; the second failure is returned
    /// as [`IngestError::BatchFailed`]. Empty input writes nothing.
    pub async fn load(&self, relation: Relation, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let batch = CopyBatch::encode(relation, rows);
        let started = Instant::now();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.copy_in(&batch).await {
                Ok(written) => {
                    debug!(
                        relation = %relation,
                        rows = written,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Batch loaded"
                    );
                    return Ok(written);
                },
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        relation = %relation,
                        rows = batch.rows,
                        attempt,
                        error = %e,
                        "Batch failed, retrying once"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                },
                Err(e) => {
                    return Err(IngestError::BatchFailed {
                        relation,
                        rows: batch.rows,
                        attempts: attempt,
                        source: Box::new(e),
                    });
                },
            }
        }
    }
}
