use std::path::Path;

use csv::Writer;
use log::info;

use crate::planner::migration::MigrationPlan;
use crate::utils::file_ops::ExecutionReport;
use crate::{EntryStatus, Result};

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Write one CSV row per plan entry plus a trailing summary block, so a
    /// re-run can start from the unresolved collisions and failures.
    pub fn generate_migration_report(
        &self,
        plan: &MigrationPlan,
        execution: Option<&ExecutionReport>,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let mut writer = Writer::from_path(output_path_ref)?;

        writer.write_record([
            "Book Id",
            "Status",
            "Reason",
            "Source",
            "Destination Folder",
            "Destination File",
            "Format",
        ])?;

        for entry in &plan.entries {
            let status = match &entry.status {
                EntryStatus::Planned => "Planned",
                EntryStatus::Skipped { .. } => "Skipped",
                EntryStatus::Error { .. } => "Error",
            };
            let book_id = entry.book_id.to_string();
            let source = entry.source_file.display().to_string();
            writer.write_record([
                book_id.as_str(),
                status,
                entry.status.reason().unwrap_or(""),
                source.as_str(),
                entry.dest_folder.as_str(),
                entry.dest_file_name.as_str(),
                entry.format.as_str(),
            ])?;
        }

        writer.write_record(["", "", "", "", "", "", ""])?;
        writer.write_record(["Summary", "", "", "", "", "", ""])?;
        self.summary_row(&mut writer, "Total Records", plan.stats.total_records, "")?;
        self.summary_row(&mut writer, "Author Filtered", plan.stats.author_filtered, "")?;
        self.summary_row(&mut writer, "Planned", plan.stats.planned, "")?;
        for (reason, count) in &plan.stats.skipped {
            self.summary_row(&mut writer, "Skipped", *count, reason)?;
        }
        for (reason, count) in &plan.stats.errored {
            self.summary_row(&mut writer, "Errored", *count, reason)?;
        }
        if let Some(execution) = execution {
            self.summary_row(&mut writer, "Copied", execution.copied, "")?;
            self.summary_row(&mut writer, "Already Existing", execution.already_exists, "")?;
            for failure in &execution.failures {
                writer.write_record([
                    "Copy Failure",
                    "1",
                    failure.reason.as_str(),
                    "",
                    "",
                    failure.dest.as_str(),
                    "",
                ])?;
            }
        }

        writer.flush()?;
        info!("report generated: {}", output_path_ref.display());
        Ok(())
    }

    fn summary_row<W: std::io::Write>(&self, writer: &mut Writer<W>, label: &str, count: usize, reason: &str) -> Result<()> {
        let count = count.to_string();
        writer.write_record([label, count.as_str(), reason, "", "", "", ""])?;
        Ok(())
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::migration::MigrationPlanner;
    use crate::BookRecord;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn report_lists_entries_and_summary() {
        let record = BookRecord {
            id: 1,
            title: "Warbreaker".to_string(),
            authors: vec!["Brandon Sanderson".to_string()],
            series_name: None,
            series_index: None,
            source_path: PathBuf::from("lib/warbreaker"),
            formats: BTreeSet::from(["epub".to_string()]),
            format_files: BTreeMap::from([("epub".to_string(), PathBuf::from("lib/warbreaker/w.epub"))]),
        };
        let plan = MigrationPlanner::new().plan(&[record], None);

        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("report.csv");
        Reporter::new().generate_migration_report(&plan, None, &out).unwrap();

        let contents = fs::read_to_string(&out).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Book Id,Status,Reason,Source,Destination Folder,Destination File,Format"
        );
        assert!(contents.contains("Warbreaker.epub"));
        assert!(contents.contains("Planned,1"));
    }
}
