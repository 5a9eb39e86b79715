use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{CopyPlanEntry, EntryStatus};

/// Outcome of one failed copy, kept for the final summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyFailure {
    pub dest: String,
    pub reason: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub copied: usize,
    pub already_exists: usize,
    pub failures: Vec<CopyFailure>,
}

impl ExecutionReport {
    fn merge(mut self, other: ExecutionReport) -> ExecutionReport {
        self.copied += other.copied;
        self.already_exists += other.already_exists;
        self.failures.extend(other.failures);
        self
    }
}

/// Carries out a migration plan against the destination library. Only
/// entries whose status is Planned are touched; a dry run logs intended
/// actions and writes nothing.
pub struct Executor {
    dest_root: PathBuf,
    dry_run: bool,
}

impl Executor {
    pub fn new(dest_root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            dest_root: dest_root.into(),
            dry_run,
        }
    }

    /// Destination folders are independent, so they are processed in
    /// parallel; entries within a folder run sequentially. A failing entry is
    /// recorded and the rest of the run continues.
    pub fn execute(&self, entries: &[CopyPlanEntry]) -> ExecutionReport {
        let mut by_folder: BTreeMap<&str, Vec<&CopyPlanEntry>> = BTreeMap::new();
        for entry in entries {
            if entry.status == EntryStatus::Planned {
                by_folder.entry(entry.dest_folder.as_str()).or_default().push(entry);
            }
        }

        by_folder
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(folder, entries)| self.execute_folder(folder, &entries))
            .reduce(ExecutionReport::default, ExecutionReport::merge)
    }

    fn execute_folder(&self, folder: &str, entries: &[&CopyPlanEntry]) -> ExecutionReport {
        let folder_path = self.dest_root.join(folder);
        let mut report = ExecutionReport::default();

        if !self.dry_run {
            if let Err(e) = fs::create_dir_all(&folder_path) {
                warn!("cannot create {}: {}", folder_path.display(), e);
                for entry in entries {
                    report.failures.push(CopyFailure {
                        dest: format!("{}/{}", folder, entry.dest_file_name),
                        reason: e.to_string(),
                    });
                }
                return report;
            }
        }

        for entry in entries {
            let dest = folder_path.join(&entry.dest_file_name);
            if self.dry_run {
                info!("[dry run] would copy {} -> {}", entry.source_file.display(), dest.display());
                report.copied += 1;
                continue;
            }
            match self.copy_entry(&entry.source_file, &dest) {
                CopyOutcome::Copied => report.copied += 1,
                CopyOutcome::AlreadyExists => {
                    info!("destination already exists, skipping: {}", dest.display());
                    report.already_exists += 1;
                }
                CopyOutcome::Failed(reason) => {
                    warn!("copy failed for {}: {}", dest.display(), reason);
                    report.failures.push(CopyFailure {
                        dest: format!("{}/{}", folder, entry.dest_file_name),
                        reason,
                    });
                }
            }
        }
        report
    }

    fn copy_entry(&self, source: &Path, dest: &Path) -> CopyOutcome {
        if dest.exists() {
            return CopyOutcome::AlreadyExists;
        }
        match fs::copy(source, dest) {
            Ok(bytes) => {
                debug!("copied {} -> {} ({} bytes)", source.display(), dest.display(), bytes);
                CopyOutcome::Copied
            }
            Err(e) => CopyOutcome::Failed(e.to_string()),
        }
    }
}

enum CopyOutcome {
    Copied,
    AlreadyExists,
    Failed(String),
}
