//! Error types for the extraction pipeline.
//!
//! Every variant except [`PipelineError::Conversion`] is fatal to a run.
//! Conversion failures are routed through
//! [`crate::pipeline::ConversionPolicy`], which decides whether one bad scan
//! aborts the batch or is skipped with a warning.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Publication settings are unknown, unreadable or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The source folder is missing or holds no documents.
    #[error("no documents found in '{path}'\n{hint}")]
    SourceNotFound { path: PathBuf, hint: String },

    /// An operator-supplied run parameter is outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The document-to-markdown collaborator failed on one document.
    #[error("failed to convert '{path}' to markdown: {reason}")]
    Conversion { path: PathBuf, reason: String },

    /// A resumed run would overwrite a shard written by an earlier run.
    #[error("shard '{path}' already exists\nRestart from index 0 to overwrite, or pick a different output directory.")]
    ShardExists { path: PathBuf },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
