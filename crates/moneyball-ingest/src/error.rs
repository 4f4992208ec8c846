// File-level ingestion failures. Row-level failures never surface here.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is {size} bytes, over the {limit}-byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{path} has no header line")]
    MalformedHeader { path: PathBuf },

    #[error("failed to split {path} into fields: {source}")]
    Split { path: PathBuf, source: csv::Error },

    #[error("ingesting {path} timed out after {after:?}")]
    Timeout { path: PathBuf, after: Duration },

    #[error("failed to list pending files in {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        source: std::io::Error,
    },
}
