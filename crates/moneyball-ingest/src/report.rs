// Per-file and per-batch ingestion results.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::IngestError;

/// What happened to a source file after its rows were processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted,
    Archived { to: PathBuf },
    Kept,
    /// The data is already written; the file just stays where it was.
    Failed { message: String },
}

impl fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupOutcome::Deleted => write!(f, "deleted"),
            CleanupOutcome::Archived { to } => write!(f, "archived to {}", to.display()),
            CleanupOutcome::Kept => write!(f, "kept"),
            CleanupOutcome::Failed { message } => write!(f, "cleanup failed: {message}"),
        }
    }
}

/// Row counters for one file. A row is either written or skipped by its
/// game-stat write. `row_errors` counts store writes that still failed
/// after any retry; a failed game-stat write also counts as skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowTally {
    pub rows_total: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
    pub row_errors: usize,
    pub players_written: usize,
}

/// Outcome of ingesting one file.
#[derive(Debug)]
pub struct IngestResult {
    pub file_name: String,
    pub tally: RowTally,
    /// `None` when the file failed before cleanup.
    pub cleanup: Option<CleanupOutcome>,
    pub error: Option<IngestError>,
}

impl IngestResult {
    pub fn succeeded(file_name: &str, tally: RowTally, cleanup: CleanupOutcome) -> Self {
        Self {
            file_name: file_name.to_string(),
            tally,
            cleanup: Some(cleanup),
            error: None,
        }
    }

    pub fn failed(file_name: &str, error: IngestError) -> Self {
        Self {
            file_name: file_name.to_string(),
            tally: RowTally::default(),
            cleanup: None,
            error: Some(error),
        }
    }

    /// Whether the file-level stage completed, regardless of row skips.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn rows_total(&self) -> usize {
        self.tally.rows_total
    }

    pub fn rows_written(&self) -> usize {
        self.tally.rows_written
    }

    pub fn rows_skipped(&self) -> usize {
        self.tally.rows_skipped
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            file_name: self.file_name.clone(),
            ok: self.is_success(),
            tally: self.tally,
            cleanup: self.cleanup.as_ref().map(ToString::to_string),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Outcome of a directory sweep: one result per pending file, in name order.
#[derive(Debug)]
pub struct BatchResult {
    pub per_file: Vec<IngestResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn files_succeeded(&self) -> usize {
        self.per_file.iter().filter(|r| r.is_success()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.per_file.len() - self.files_succeeded()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut totals = RowTally::default();
        for r in &self.per_file {
            totals.rows_total += r.tally.rows_total;
            totals.rows_written += r.tally.rows_written;
            totals.rows_skipped += r.tally.rows_skipped;
            totals.row_errors += r.tally.row_errors;
            totals.players_written += r.tally.players_written;
        }
        BatchSummary {
            started_at: self.started_at,
            finished_at: self.finished_at,
            files_succeeded: self.files_succeeded(),
            files_failed: self.files_failed(),
            totals,
            files: self.per_file.iter().map(IngestResult::summary).collect(),
        }
    }
}

/// Serializable view of an [`IngestResult`].
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub file_name: String,
    pub ok: bool,
    #[serde(flatten)]
    pub tally: RowTally,
    pub cleanup: Option<String>,
    pub error: Option<String>,
}

/// Serializable view of a [`BatchResult`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub totals: RowTally,
    pub files: Vec<FileSummary>,
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.error {
            return write!(f, "{}: FAILED ({err})", self.file_name);
        }
        write!(
            f,
            "{}: {} rows, {} written, {} skipped ({} errors), {} players updated",
            self.file_name,
            self.tally.rows_total,
            self.tally.rows_written,
            self.tally.rows_skipped,
            self.tally.row_errors,
            self.tally.players_written,
        )?;
        if let Some(cleanup) = &self.cleanup {
            write!(f, "; {cleanup}")?;
        }
        Ok(())
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            writeln!(f, "{file}")?;
        }
        write!(
            f,
            "{} files ok, {} failed; {} rows written, {} skipped",
            self.files_succeeded, self.files_failed, self.totals.rows_written, self.totals.rows_skipped
        )
    }
}
