//! End-to-end run against a synthetic Calibre library on disk:
//! metadata.db -> records -> plan -> copy.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use rusqlite::{params, Connection};

use calibre2komga::planner::migration::REASON_UNSUPPORTED_FORMAT;
use calibre2komga::{CalibreLibrary, Executor, MetadataProvider, MigrationPlanner};

fn seed_schema(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, path TEXT, series_index REAL);
         CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT);
         CREATE TABLE books_authors_link (id INTEGER PRIMARY KEY, book INTEGER, author INTEGER);
         CREATE TABLE series (id INTEGER PRIMARY KEY, name TEXT);
         CREATE TABLE books_series_link (id INTEGER PRIMARY KEY, book INTEGER, series INTEGER);
         INSERT INTO authors (id, name) VALUES (1, 'Brandon Sanderson'), (2, 'Isaac Asimov');
         INSERT INTO series (id, name) VALUES (1, 'Mistborn');",
    )
    .unwrap();
}

fn add_book(
    conn: &Connection,
    root: &Path,
    id: i64,
    title: &str,
    path: &str,
    author_id: i64,
    series: Option<(i64, f64)>,
    files: &[&str],
) {
    let index = series.map(|(_, i)| i).unwrap_or(1.0);
    conn.execute(
        "INSERT INTO books (id, title, path, series_index) VALUES (?1, ?2, ?3, ?4)",
        params![id, title, path, index],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO books_authors_link (book, author) VALUES (?1, ?2)",
        params![id, author_id],
    )
    .unwrap();
    if let Some((series_id, _)) = series {
        conn.execute(
            "INSERT INTO books_series_link (book, series) VALUES (?1, ?2)",
            params![id, series_id],
        )
        .unwrap();
    }
    let dir = root.join(path);
    fs::create_dir_all(&dir).unwrap();
    for file in files {
        fs::write(dir.join(file), format!("contents of {}", file)).unwrap();
    }
}

#[test]
fn migrates_a_small_library() {
    let calibre = tempfile::tempdir().unwrap();
    let komga = tempfile::tempdir().unwrap();

    let conn = Connection::open(calibre.path().join("metadata.db")).unwrap();
    seed_schema(&conn);
    add_book(
        &conn,
        calibre.path(),
        1,
        "The Final Empire",
        "Brandon Sanderson/The Final Empire (12)",
        1,
        Some((1, 1.0)),
        &["The Final Empire.epub"],
    );
    add_book(
        &conn,
        calibre.path(),
        2,
        "The Well of Ascension",
        "Brandon Sanderson/The Well of Ascension (13)",
        1,
        Some((1, 2.0)),
        &["The Well of Ascension.epub"],
    );
    add_book(
        &conn,
        calibre.path(),
        3,
        "Warbreaker (178)",
        "Brandon Sanderson/Warbreaker (178)",
        1,
        None,
        &["Warbreaker.epub", "Warbreaker.mobi"],
    );
    add_book(
        &conn,
        calibre.path(),
        4,
        "Nightfall",
        "Isaac Asimov/Nightfall (99)",
        2,
        None,
        &["Nightfall.mobi"],
    );
    drop(conn);

    let library = CalibreLibrary::open(calibre.path()).unwrap();
    let records = library.records().unwrap();
    assert_eq!(records.len(), 4);

    let plan = MigrationPlanner::new().plan(&records, None);
    assert_eq!(plan.stats.planned, 3);
    assert_eq!(plan.stats.skipped[REASON_UNSUPPORTED_FORMAT], 1);
    assert_eq!(plan.stats.errored_total(), 0);

    let report = Executor::new(komga.path(), false).execute(&plan.entries);
    assert_eq!(report.copied, 3);
    assert_eq!(report.failures.len(), 0);

    let series_dir = komga.path().join("Brandon Sanderson - Mistborn");
    assert!(series_dir.join("Volume 01 - The Final Empire.epub").is_file());
    assert!(series_dir.join("Volume 02 - The Well of Ascension.epub").is_file());
    assert!(komga.path().join("Brandon Sanderson/Warbreaker.epub").is_file());
    assert!(!komga.path().join("Isaac Asimov").exists());

    // A second run plans identically and copies nothing new.
    let second_plan = MigrationPlanner::new().plan(&records, None);
    assert_eq!(plan.entries, second_plan.entries);
    let rerun = Executor::new(komga.path(), false).execute(&second_plan.entries);
    assert_eq!(rerun.copied, 0);
    assert_eq!(rerun.already_exists, 3);
}

#[test]
fn author_filter_limits_the_run() {
    let calibre = tempfile::tempdir().unwrap();
    let komga = tempfile::tempdir().unwrap();

    let conn = Connection::open(calibre.path().join("metadata.db")).unwrap();
    seed_schema(&conn);
    add_book(
        &conn,
        calibre.path(),
        1,
        "Warbreaker",
        "Brandon Sanderson/Warbreaker (178)",
        1,
        None,
        &["Warbreaker.epub"],
    );
    add_book(
        &conn,
        calibre.path(),
        2,
        "Nightfall",
        "Isaac Asimov/Nightfall (99)",
        2,
        None,
        &["Nightfall.epub"],
    );
    drop(conn);

    let library = CalibreLibrary::open(calibre.path()).unwrap();
    let records = library.records().unwrap();
    let plan = MigrationPlanner::new().plan(&records, Some("sanderson"));

    assert_eq!(plan.stats.author_filtered, 1);
    assert_eq!(plan.stats.planned, 1);

    Executor::new(komga.path(), false).execute(&plan.entries);
    assert!(komga.path().join("Brandon Sanderson/Warbreaker.epub").is_file());
    assert!(!komga.path().join("Isaac Asimov").exists());
}
