use clap::Parser;
use log::{debug, error, info};

use calibre2komga::cli::commands::Cli;
use calibre2komga::{
    CalibreLibrary, EntryStatus, Executor, MetadataProvider, MigrationPlanner, Reporter,
};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Configure thread pool for the parallel copy phase
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()
    {
        debug!("thread pool already configured: {}", e);
    }

    info!(
        "starting migration from {} to {} (dry run: {})",
        cli.calibre_path.display(),
        cli.komga_path.display(),
        cli.dry_run
    );

    // Only a missing/unreadable metadata store is fatal; everything later is
    // accumulated and reported.
    let library = match CalibreLibrary::open(&cli.calibre_path) {
        Ok(library) => library,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let records = match library.records() {
        Ok(records) => records,
        Err(e) => {
            error!("failed to read Calibre metadata: {}", e);
            std::process::exit(1);
        }
    };

    let planner = MigrationPlanner::new();
    let plan = planner.plan(&records, cli.author.as_deref());

    for entry in &plan.entries {
        match &entry.status {
            EntryStatus::Planned => debug!(
                "planned: {} -> {}/{}",
                entry.source_file.display(),
                entry.dest_folder,
                entry.dest_file_name
            ),
            EntryStatus::Skipped { reason } => debug!("skipped book {}: {}", entry.book_id, reason),
            EntryStatus::Error { reason } => debug!("errored book {}: {}", entry.book_id, reason),
        }
    }

    let executor = Executor::new(&cli.komga_path, cli.dry_run);
    let execution = executor.execute(&plan.entries);

    if let Some(report_path) = &cli.report {
        if let Err(e) = Reporter::new().generate_migration_report(&plan, Some(&execution), report_path) {
            error!("error generating report: {}", e);
        }
    }

    println!("\nMigration Summary:");
    println!("  Total books found: {}", plan.stats.total_records);
    if plan.stats.author_filtered > 0 {
        println!("  Filtered out by author: {}", plan.stats.author_filtered);
    }
    println!("  Files planned: {}", plan.stats.planned);
    for (reason, count) in &plan.stats.skipped {
        println!("  Skipped ({}): {}", reason, count);
    }
    for (reason, count) in &plan.stats.errored {
        println!("  Errored ({}): {}", reason, count);
    }
    if cli.dry_run {
        println!("  Files that would be copied: {}", execution.copied);
    } else {
        println!("  Files copied: {}", execution.copied);
        println!("  Already existing, skipped: {}", execution.already_exists);
        println!("  Copy failures: {}", execution.failures.len());
    }
    for entry in &plan.entries {
        if let EntryStatus::Error { reason } = &entry.status {
            println!("    book {}: {} ({}/{})", entry.book_id, reason, entry.dest_folder, entry.dest_file_name);
        }
    }
    for failure in &execution.failures {
        println!("    copy failed: {} ({})", failure.dest, failure.reason);
    }

    // Partial errors still exit 0; re-running after fixes is idempotent.
}
