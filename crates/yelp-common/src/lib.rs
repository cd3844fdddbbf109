//! Yelp ETL Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Yelp ETL workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`YelpError`] and the [`Result`] alias used for I/O,
//!   configuration, and parsing failures
//! - **Logging**: centralized `tracing` subscriber setup, see [`logging`]
//!
//! # Example
//!
//! ```no_run
//! use yelp_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!
//!     info!("Ready to ingest");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, YelpError};
