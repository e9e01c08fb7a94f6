//! altpub - Republish AltStore source catalogs to an app-store developer API
//!
//! altpub reads an AltStore-style repository feed, downloads every package
//! and its icon, and publishes them to a store API: it creates the app and
//! its version, uploads the binary in chunks and attaches the icon. A local
//! ledger of published bundle identifiers makes re-runs idempotent.
//!
//! # Examples
//!
//! ```no_run
//! use altpub::{Config, RunOptions, Runner};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let token = config.resolve_token(None)?;
//!
//! let report = Runner::new(&config).run(&RunOptions { token, limit: Some(5) })?;
//! println!("Published {} apps", report.stats.processed);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Fetch and filter the source catalog
//! - [`client`] - Store API session, payloads and retry policy
//! - [`metadata`] - Category and platform resolution
//! - [`downloader`] - Streaming downloads
//! - [`uploader`] - Chunked binary upload
//! - [`pipeline`] - Per-entry publish state machine
//! - [`ledger`] - Already published bundle identifiers
//! - [`report`] - Run counters and summary
//! - [`runner`] - A complete run
//! - [`config`] - User configuration
//! - [`error`] - Error types and result handling

pub mod catalog;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod ledger;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod uploader;

pub use catalog::{fetch_catalog, parse_catalog, CatalogEntry};
pub use client::{BinaryAttachment, RetryPolicy, StoreClient};
pub use config::Config;
pub use downloader::{download, ProgressCallback};
pub use error::{Error, Result};
pub use ledger::{Ledger, LEDGER_NAME};
pub use metadata::{resolve_metadata, PublishTargets, Taxonomy};
pub use pipeline::{EntryOutcome, ProgressHooks, PublishSettings, Publisher, Stage};
pub use report::{FailureRecord, RunReport, RunStats};
pub use runner::{PlanAction, PlannedEntry, RunOptions, Runner};
pub use uploader::{ChunkPlan, ChunkedUploader, DEFAULT_CHUNK_SIZE};
