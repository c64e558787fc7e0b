//! Broadsheet: newspaper scan extraction into CSV shards
//!
//! This crate turns the markdown rendering of scanned newspaper pages into
//! tabular records (file name, agency, date, section headers, body text):
//!
//! 1. **Enumeration** -- List a publication's documents in file-name order
//! 2. **Conversion** -- Hand each document to an external document-to-markdown
//!    collaborator (a command, or markdown saved by an earlier conversion)
//! 3. **Extraction** -- Pull the first date, the heading titles and the body
//!    out of the markdown with per-publication patterns and ignore keywords
//! 4. **Sharding** -- Append one row per document to size-bounded CSV files
//!    that a later run can continue from any document offset
//!
//! # Architecture
//!
//! - **Sequential** -- One document at a time; the converter is the only
//!   blocking call
//! - **Immutable configuration** -- An [`ExtractionConfig`] is passed to every
//!   extraction call instead of process-wide settings
//! - **Pure extraction** -- Header list and body are independent passes over
//!   the same input
//! - **Scoped shards** -- The shard writer owns its file; dropping it flushes
//!   and closes on every exit path
//! - **Resumable output** -- Resumed runs start at the first shard an earlier
//!   run could not have written and never overwrite existing files
//!
//! # Key Modules
//!
//! - [`publication`] -- Per-publication settings loaded from JSON
//! - [`content`] -- Date, header and body extraction
//! - [`shard`] -- Size-bounded CSV shard writer
//! - [`source`] -- Document listing and markdown conversion collaborators
//! - [`pipeline`] -- The sequential extraction run
//! - [`models`] -- Extraction results and output records
//! - [`stats`] -- Run counters
//! - [`error`] -- Error kinds
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! # Convert with an external tool and write shards of 500 rows
//! broadsheet run -p daily_nation --converter-cmd "pdf2md" --max-rows 500
//!
//! # Continue from document 1200 after an interrupted run
//! broadsheet run -p daily_nation --converter-cmd "pdf2md" --max-rows 500 --start-index 1200
//!
//! # Tune ignore keywords against one saved page
//! broadsheet inspect -p daily_nation Daily_Nation_first100_md/003DNC1812.md
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod publication;
pub mod shard;
pub mod source;
pub mod stats;

pub use error::{PipelineError, Result};
pub use publication::ExtractionConfig;
