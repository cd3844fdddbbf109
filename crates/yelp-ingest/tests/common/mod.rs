//! Shared helpers for yelp-ingest integration tests
//!
//! - [`Dataset`] writes small JSONL source files into a temporary directory
//! - [`TestPostgres`] starts a PostgreSQL 16 container with the schema migrated
//! - [`init_test_tracing`] routes pipeline logs to the test output

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;
use yelp_ingest::config::IngestConfig;
use yelp_ingest::normalize::EntityKind;

/// Source files for one test, removed when dropped
pub struct Dataset {
    dir: TempDir,
}

impl Dataset {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create dataset dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write one JSON value per line for `kind`
    pub fn write(&self, kind: EntityKind, records: &[Value]) -> &Self {
        let lines: Vec<String> = records.iter().map(|r| r.to_string()).collect();
        self.write_raw(kind, &lines.join("\n"))
    }

    /// Write the file content verbatim (for malformed-line tests)
    pub fn write_raw(&self, kind: EntityKind, content: &str) -> &Self {
        let name = IngestConfig::default().files.file_name(kind).to_string();
        let mut file =
            std::fs::File::create(self.dir.path().join(name)).expect("failed to create source file");
        writeln!(file, "{}", content).expect("failed to write source file");
        self
    }

    /// Config pointing at this dataset, without progress bars
    pub fn config(&self) -> IngestConfig {
        IngestConfig::default()
            .with_dataset_dir(self.path())
            .with_progress(false)
    }
}

/// PostgreSQL container with migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432.tcp()).await?;
        let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,yelp_ingest=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
