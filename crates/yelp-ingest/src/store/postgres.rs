use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, info};

use super::{BulkStore, CopyBatch};
use crate::error::Result;
use crate::relation::{Relation, RootEntity};

/// PostgreSQL store writing through `COPY ... FROM STDIN`
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Result of one integrity query
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityCheck {
    pub name: String,
    pub violations: i64,
}

/// (child table, child column, parent table, parent column)
const FOREIGN_KEYS: [(&str, &str, &str, &str); 11] = [
    ("business_categories", "business_id", "businesses", "business_id"),
    ("business_hours", "business_id", "businesses", "business_id"),
    ("business_attributes", "business_id", "businesses", "business_id"),
    ("user_friends", "user_id", "users", "user_id"),
    ("user_friends", "friend_id", "users", "user_id"),
    ("user_elite_years", "user_id", "users", "user_id"),
    ("reviews", "user_id", "users", "user_id"),
    ("reviews", "business_id", "businesses", "business_id"),
    ("tips", "user_id", "users", "user_id"),
    ("tips", "business_id", "businesses", "business_id"),
    ("checkins", "business_id", "businesses", "business_id"),
];

/// (table, key columns)
const UNIQUE_KEYS: [(&str, &str); 8] = [
    ("businesses", "business_id"),
    ("users", "user_id"),
    ("reviews", "review_id"),
    ("business_categories", "business_id, category"),
    ("business_hours", "business_id, day"),
    ("business_attributes", "business_id, attribute_name"),
    ("user_friends", "user_id, friend_id"),
    ("user_elite_years", "user_id, year"),
];

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Row count of every target table, in relation order
    pub async fn table_counts(&self) -> Result<Vec<(Relation, i64)>> {
        let mut counts = Vec::with_capacity(Relation::ALL.len());
        for relation in Relation::ALL {
            let sql = format!("SELECT COUNT(*) FROM {}", relation.table_name());
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
            counts.push((relation, count));
        }
        Ok(counts)
    }

    /// Empty every target table and reset the synthetic key sequences
    pub async fn truncate_all(&self) -> Result<()> {
        let tables: Vec<&str> = Relation::ALL.iter().map(|r| r.table_name()).collect();
        let sql = format!("TRUNCATE {} RESTART IDENTITY CASCADE", tables.join(", "));
        sqlx::query(&sql).execute(&self.pool).await?;
        info!(tables = tables.len(), "Truncated all tables");
        Ok(())
    }

    /// Dangling foreign keys, duplicate keys and friend self loops; every count should be 0
    pub async fn integrity_report(&self) -> Result<Vec<IntegrityCheck>> {
        let mut checks = Vec::new();

        for (child, column, parent, parent_column) in FOREIGN_KEYS {
            let sql = format!(
                "SELECT COUNT(*) FROM {child} c LEFT JOIN {parent} p ON c.{column} = p.{parent_column} \
                 WHERE p.{parent_column} IS NULL"
            );
            checks.push(IntegrityCheck {
                name: format!("{child}.{column} -> {parent}"),
                violations: sqlx::query_scalar(&sql).fetch_one(&self.pool).await?,
            });
        }

        for (table, key) in UNIQUE_KEYS {
            let sql = format!(
                "SELECT COUNT(*) FROM (SELECT {key} FROM {table} GROUP BY {key} HAVING COUNT(*) > 1) d"
            );
            checks.push(IntegrityCheck {
                name: format!("duplicate {table} ({key})"),
                violations: sqlx::query_scalar(&sql).fetch_one(&self.pool).await?,
            });
        }

        checks.push(IntegrityCheck {
            name: "user_friends self references".to_string(),
            violations: sqlx::query_scalar("SELECT COUNT(*) FROM user_friends WHERE user_id = friend_id")
                .fetch_one(&self.pool)
                .await?,
        });

        Ok(checks)
    }
}

#[async_trait]
impl BulkStore for PgStore {
    async fn copy_in(&self, batch: &CopyBatch) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let mut copy = tx.copy_in_raw(&batch.relation.copy_statement()).await?;
        copy.send(batch.payload.as_slice()).await?;
        let written = copy.finish().await?;

        tx.commit().await?;

        debug!(
            relation = %batch.relation,
            rows = written,
            bytes = batch.payload.len(),
            "COPY batch committed"
        );
        Ok(written)
    }

    async fn fetch_identities(&self, entity: RootEntity) -> Result<HashSet<String>> {
        let sql = match entity {
            RootEntity::Business => "SELECT business_id FROM businesses",
            RootEntity::User => "SELECT user_id FROM users",
        };

        let mut ids = HashSet::new();
        let mut stream = sqlx::query_scalar::<_, String>(sql).fetch(&self.pool);
        while let Some(id) = stream.try_next().await? {
            ids.insert(id);
        }

        debug!(entity = %entity, count = ids.len(), "Loaded committed identities");
        Ok(ids)
    }
}
