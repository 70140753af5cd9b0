//! EPI Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Downloads public case count and policy intervention datasets, reconciles
//! them into two canonical record sets and publishes those as one atomic
//! snapshot.
//!
//! # Stages
//!
//! - **Fetch**: [`fetcher::CachedFetcher`] with an optional on-disk cache and
//!   manual redirect handling
//! - **Parse**: [`parser`] grid, quote-aware CSV and JSON readers
//! - **Reconcile**: [`reconcile`] date ordering and forward-fill of the
//!   cumulative series
//! - **Publish**: [`publisher::SnapshotPublisher`] shadow-table swap in
//!   PostgreSQL
//!
//! [`pipeline::IngestPipeline`] runs the stages in order.
//!
//! # Example
//!
//! ```no_run
//! use epi_ingest::config::IngestConfig;
//! use epi_ingest::fetcher::CachedFetcher;
//! use epi_ingest::pipeline::IngestPipeline;
//! use epi_ingest::publisher::SnapshotPublisher;
//! use epi_ingest::sources::SourceCatalog;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let fetcher = CachedFetcher::new(&config.fetch, Some("./cache".into()))?;
//!     let pipeline = IngestPipeline::new(SourceCatalog::default(), fetcher, config.fetch.concurrency);
//!     let publisher = SnapshotPublisher::new(config.database.pool(), &config.publish);
//!
//!     pipeline.run(&publisher).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod publisher;
pub mod reconcile;
pub mod sources;

pub use config::IngestConfig;
pub use error::{ConfigError, FetchError, IngestError, ParseError, PublishError, Result};
pub use models::{CaseRecord, InterventionRecord, Snapshot};
pub use pipeline::{IngestPipeline, PipelineStats};
pub use publisher::{SnapshotPublisher, SwapState};
