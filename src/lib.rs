use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use serde::Serialize;

pub mod catalog;
pub mod cli;
pub mod grouping;
pub mod naming;
pub mod planner;
pub mod utils;

/// Ebook formats accepted for migration. Collaborators may pass a wider set to
/// the planner; this is only the default.
pub const ACCEPTED_FORMATS: &[&str] = &["epub", "kepub"];

/// One catalogued book, as read from the Calibre metadata store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRecord {
    pub id: i64,
    pub title: String,
    /// At least one entry; the first is the primary author used for naming.
    pub authors: Vec<String>,
    pub series_name: Option<String>,
    /// Meaningful only when `series_name` is present. May be fractional.
    pub series_index: Option<f64>,
    /// The book's asset directory inside the Calibre library.
    pub source_path: PathBuf,
    /// Lower-cased extensions of the files found on disk for this book.
    pub formats: BTreeSet<String>,
    /// Format -> on-disk file path, captured by the reader so planning stays
    /// free of filesystem access.
    pub format_files: BTreeMap<String, PathBuf>,
}

impl BookRecord {
    pub fn primary_author(&self) -> &str {
        self.authors.first().map(String::as_str).unwrap_or("Unknown Author")
    }
}

/// A book after series classification, ready for destination naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedBook {
    pub record: BookRecord,
    /// Destination-folder identity, e.g. "Author - Series" or "Author".
    pub group_key: String,
    pub is_series: bool,
    /// Volume number; present iff `is_series`.
    pub display_index: Option<f64>,
    /// Zero-pad width for volume numbers in this book's group (min 2).
    pub index_pad: usize,
    pub clean_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EntryStatus {
    Planned,
    Skipped { reason: String },
    Error { reason: String },
}

impl EntryStatus {
    pub fn reason(&self) -> Option<&str> {
        match self {
            EntryStatus::Planned => None,
            EntryStatus::Skipped { reason } | EntryStatus::Error { reason } => Some(reason),
        }
    }
}

/// One file the migration would copy, or the record of why it will not be.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyPlanEntry {
    pub book_id: i64,
    pub source_file: PathBuf,
    /// Empty for entries skipped before naming (e.g. unsupported format).
    pub dest_folder: String,
    pub dest_file_name: String,
    pub format: String,
    pub status: EntryStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata query error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, MigrateError>;

// Re-exports for convenience
pub use catalog::calibre::{CalibreLibrary, MetadataProvider};
pub use grouping::series::SeriesGrouper;
pub use grouping::title::{SequenceHint, TitleNormalizer};
pub use naming::destination::DestinationNamer;
pub use planner::migration::{MigrationPlan, MigrationPlanner, PlanStats};
pub use utils::file_ops::{ExecutionReport, Executor};
pub use utils::reporting::Reporter;
