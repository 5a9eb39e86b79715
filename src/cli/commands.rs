use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "calibre2komga")]
#[command(version = "1.0")]
#[command(about = "Migrate ebooks from a Calibre library into Komga's flat per-series layout", long_about = None)]
pub struct Cli {
    /// Path to the Calibre library directory (must contain metadata.db)
    pub calibre_path: PathBuf,

    /// Path to the Komga library directory (created if missing)
    pub komga_path: PathBuf,

    /// Show what would be migrated without copying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only migrate books whose author matches this substring (case insensitive)
    #[arg(long)]
    pub author: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Write a CSV report of every planned, skipped and errored entry
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_paths_and_flags() {
        let cli = Cli::parse_from([
            "calibre2komga",
            "/books/calibre",
            "/books/komga",
            "--dry-run",
            "--author",
            "sanderson",
        ]);
        assert_eq!(cli.calibre_path, PathBuf::from("/books/calibre"));
        assert_eq!(cli.komga_path, PathBuf::from("/books/komga"));
        assert!(cli.dry_run);
        assert_eq!(cli.author.as_deref(), Some("sanderson"));
        assert!(!cli.verbose);
        assert!(cli.report.is_none());
    }
}
