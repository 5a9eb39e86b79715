use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use log::{debug, warn};
use serde::Serialize;

use crate::grouping::series::SeriesGrouper;
use crate::naming::destination::DestinationNamer;
use crate::{BookRecord, CopyPlanEntry, EntryStatus, ACCEPTED_FORMATS};

pub const REASON_UNSUPPORTED_FORMAT: &str = "unsupported format";
pub const REASON_DESTINATION_COLLISION: &str = "destination collision";
pub const REASON_MISSING_FILE: &str = "missing source file";

#[derive(Debug, Default, Serialize)]
pub struct PlanStats {
    pub total_records: usize,
    pub author_filtered: usize,
    pub planned: usize,
    pub skipped: BTreeMap<String, usize>,
    pub errored: BTreeMap<String, usize>,
}

impl PlanStats {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn errored_total(&self) -> usize {
        self.errored.values().sum()
    }
}

#[derive(Debug, Serialize)]
pub struct MigrationPlan {
    pub entries: Vec<CopyPlanEntry>,
    pub stats: PlanStats,
}

/// Turns the full record set into an ordered list of copy operations plus
/// skip/error diagnostics. Never touches the filesystem.
pub struct MigrationPlanner {
    grouper: SeriesGrouper,
    namer: DestinationNamer,
    whitelist: BTreeSet<String>,
}

impl MigrationPlanner {
    pub fn new() -> Self {
        Self::with_whitelist(ACCEPTED_FORMATS.iter().map(|f| f.to_string()))
    }

    pub fn with_whitelist(formats: impl IntoIterator<Item = String>) -> Self {
        Self {
            grouper: SeriesGrouper::new(),
            namer: DestinationNamer::new(),
            whitelist: formats.into_iter().map(|f| f.to_lowercase()).collect(),
        }
    }

    pub fn plan(&self, records: &[BookRecord], author_filter: Option<&str>) -> MigrationPlan {
        let mut stats = PlanStats {
            total_records: records.len(),
            ..PlanStats::default()
        };
        let mut entries = Vec::new();

        // Author filter runs before grouping, so a filtered subset still
        // groups correctly on its own.
        let needle = author_filter.map(str::to_lowercase);
        let mut surviving = Vec::new();
        for record in records {
            if let Some(needle) = &needle {
                if !record.primary_author().to_lowercase().contains(needle) {
                    stats.author_filtered += 1;
                    continue;
                }
            }

            let accepted: Vec<&String> =
                record.formats.iter().filter(|f| self.whitelist.contains(*f)).collect();
            if accepted.is_empty() {
                debug!(
                    "skipping '{}' (id {}): formats {:?} outside whitelist",
                    record.title, record.id, record.formats
                );
                *stats.skipped.entry(REASON_UNSUPPORTED_FORMAT.to_string()).or_insert(0) += 1;
                entries.push(CopyPlanEntry {
                    book_id: record.id,
                    source_file: record.source_path.clone(),
                    dest_folder: String::new(),
                    dest_file_name: String::new(),
                    format: record.formats.iter().cloned().collect::<Vec<_>>().join(","),
                    status: EntryStatus::Skipped {
                        reason: REASON_UNSUPPORTED_FORMAT.to_string(),
                    },
                });
                continue;
            }
            surviving.push(record.clone());
        }

        let grouped = self.grouper.classify(surviving);

        // First planned entry wins a destination; later claimants error out
        // instead of silently overwriting.
        let mut claimed: HashMap<(String, String), i64> = HashMap::new();
        for book in &grouped {
            let (dest_folder, base) = self.namer.name(book);
            let accepted = book.record.formats.iter().filter(|f| self.whitelist.contains(*f));
            for format in accepted {
                let dest_file_name = format!("{}.{}", base, format);
                let source_file = match book.record.format_files.get(format) {
                    Some(path) => path.clone(),
                    None => {
                        warn!(
                            "book id {} lists format {} but no file path was captured",
                            book.record.id, format
                        );
                        *stats.errored.entry(REASON_MISSING_FILE.to_string()).or_insert(0) += 1;
                        entries.push(CopyPlanEntry {
                            book_id: book.record.id,
                            source_file: PathBuf::new(),
                            dest_folder: dest_folder.clone(),
                            dest_file_name,
                            format: format.clone(),
                            status: EntryStatus::Error {
                                reason: REASON_MISSING_FILE.to_string(),
                            },
                        });
                        continue;
                    }
                };

                let key = (dest_folder.clone(), dest_file_name.clone());
                let status = if let Some(owner) = claimed.get(&key).copied() {
                    warn!(
                        "destination collision: '{}/{}' wanted by book {} but owned by book {}",
                        dest_folder, dest_file_name, book.record.id, owner
                    );
                    *stats
                        .errored
                        .entry(REASON_DESTINATION_COLLISION.to_string())
                        .or_insert(0) += 1;
                    EntryStatus::Error {
                        reason: REASON_DESTINATION_COLLISION.to_string(),
                    }
                } else {
                    claimed.insert(key, book.record.id);
                    stats.planned += 1;
                    EntryStatus::Planned
                };

                entries.push(CopyPlanEntry {
                    book_id: book.record.id,
                    source_file,
                    dest_folder: dest_folder.clone(),
                    dest_file_name,
                    format: format.clone(),
                    status,
                });
            }
        }

        MigrationPlan { entries, stats }
    }
}

impl Default for MigrationPlanner {
    fn default() -> Self {
        Self::new()
    }
}
