//! Yelp bulk ingestion library
//!
//! Loads the Yelp academic dataset (line-delimited JSON) into a normalized PostgreSQL
//! schema. Records stream through a fixed pipeline:
//!
//! - [`reader`]: lazy line-by-line JSON reader
//! - [`normalize`]: raw record to typed rows, exploding nested fields into child relations
//! - [`validator`]: in-memory foreign-key membership checks, built once per phase
//! - [`accumulator`] and [`loader`]: per-relation batches applied with `COPY ... FROM STDIN`
//! - [`coordinator`]: phase ordering, cancellation and run statistics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use yelp_ingest::{config::IngestConfig, coordinator::RunCoordinator, db, store::PgStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     let summary = RunCoordinator::new(Arc::new(PgStore::new(pool)), config)
//!         .run(&[])
//!         .await?;
//!     println!("{} rows loaded", summary.total_admitted());
//!     Ok(())
//! }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod accumulator;
pub mod config;
pub mod coordinator;
pub mod copy;
pub mod db;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod progress;
pub mod reader;
pub mod relation;
pub mod rows;
pub mod stats;
pub mod store;
pub mod validator;

pub use coordinator::{Phase, RunCoordinator};
pub use error::{IngestError, Result};
pub use relation::{Relation, RootEntity};
pub use stats::RunSummary;
