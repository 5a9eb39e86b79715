use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{info, warn};
use rusqlite::{Connection, OpenFlags};

use crate::{BookRecord, MigrateError, Result};

const METADATA_DB: &str = "metadata.db";

/// Abstract source of book records. Grouping and naming only ever see this
/// trait, so a different catalog format (or a JSON export) can slot in
/// without touching the core.
pub trait MetadataProvider {
    fn records(&self) -> Result<Vec<BookRecord>>;
}

/// Reads book metadata from a Calibre library's `metadata.db` and captures
/// each book's on-disk files.
#[derive(Debug)]
pub struct CalibreLibrary {
    root: PathBuf,
    conn: Connection,
}

impl CalibreLibrary {
    /// Fails with `MetadataUnavailable` when `root` is not a Calibre library.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(MigrateError::MetadataUnavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let db_path = root.join(METADATA_DB);
        if !db_path.is_file() {
            return Err(MigrateError::MetadataUnavailable(format!(
                "no {} found in {}",
                METADATA_DB,
                root.display()
            )));
        }
        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| MigrateError::MetadataUnavailable(format!("{}: {}", db_path.display(), e)))?;
        Ok(Self { root, conn })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn query_rows(&self) -> Result<Vec<RawRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.id, b.title, b.path, b.series_index, \
                    (SELECT GROUP_CONCAT(name, '|') FROM \
                        (SELECT a.name AS name FROM books_authors_link bal \
                         JOIN authors a ON a.id = bal.author \
                         WHERE bal.book = b.id ORDER BY bal.id)) AS authors, \
                    (SELECT s.name FROM books_series_link bsl \
                     JOIN series s ON s.id = bsl.series \
                     WHERE bsl.book = b.id) AS series \
             FROM books b ORDER BY b.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                title: row.get(1)?,
                path: row.get(2)?,
                series_index: row.get(3)?,
                authors: row.get(4)?,
                series: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

struct RawRow {
    id: i64,
    title: String,
    path: String,
    series_index: Option<f64>,
    authors: Option<String>,
    series: Option<String>,
}

impl MetadataProvider for CalibreLibrary {
    fn records(&self) -> Result<Vec<BookRecord>> {
        let rows = self.query_rows()?;
        let mut records = Vec::new();
        for row in rows {
            let source_path = self.root.join(&row.path);
            if !source_path.is_dir() {
                warn!(
                    "book path does not exist, skipping: {} (id {})",
                    source_path.display(),
                    row.id
                );
                continue;
            }

            let authors: Vec<String> = row
                .authors
                .as_deref()
                .unwrap_or("Unknown Author")
                .split('|')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            let authors = if authors.is_empty() {
                vec!["Unknown Author".to_string()]
            } else {
                authors
            };

            let series_name = row.series.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            // Calibre stores a series_index for every book; it only means
            // anything when the book actually belongs to a series.
            let series_index = if series_name.is_some() { row.series_index } else { None };

            let (formats, format_files) = scan_book_dir(&source_path);
            records.push(BookRecord {
                id: row.id,
                title: row.title,
                authors,
                series_name,
                series_index,
                source_path,
                formats,
                format_files,
            });
        }
        info!("loaded metadata for {} books from Calibre database", records.len());
        Ok(records)
    }
}

/// Collect the files directly inside a book's directory, keyed by format.
/// Kobo's `*.kepub.epub` files count as format "kepub". When a format occurs
/// twice the lexicographically first file wins.
fn scan_book_dir(dir: &Path) -> (BTreeSet<String>, BTreeMap<String, PathBuf>) {
    let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("error accessing entry under {}: {}", dir.display(), err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    entries.sort();

    let mut formats = BTreeSet::new();
    let mut format_files = BTreeMap::new();
    for path in entries {
        let Some(format) = file_format(&path) else { continue };
        formats.insert(format.clone());
        format_files.entry(format).or_insert(path);
    }
    (formats, format_files)
}

fn file_format(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?.to_lowercase();
    if name.ends_with(".kepub.epub") {
        return Some("kepub".to_string());
    }
    let ext = path.extension()?.to_str()?.to_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn seed_library(root: &Path) -> Connection {
        let conn = Connection::open(root.join(METADATA_DB)).unwrap();
        conn.execute_batch(
            "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, path TEXT, series_index REAL);
             CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE books_authors_link (id INTEGER PRIMARY KEY, book INTEGER, author INTEGER);
             CREATE TABLE series (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE books_series_link (id INTEGER PRIMARY KEY, book INTEGER, series INTEGER);",
        )
        .unwrap();
        conn
    }

    fn add_book(
        conn: &Connection,
        root: &Path,
        id: i64,
        title: &str,
        path: &str,
        author: &str,
        series: Option<(&str, f64)>,
        files: &[&str],
    ) {
        conn.execute(
            "INSERT INTO books (id, title, path, series_index) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, title, path, series.map(|(_, i)| i).unwrap_or(1.0)],
        )
        .unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO authors (id, name) VALUES ((SELECT COALESCE(MAX(id), 0) + 1 FROM authors), ?1)",
            rusqlite::params![author],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO books_authors_link (book, author) VALUES (?1, (SELECT id FROM authors WHERE name = ?2))",
            rusqlite::params![id, author],
        )
        .unwrap();
        if let Some((name, _)) = series {
            conn.execute(
                "INSERT OR IGNORE INTO series (id, name) VALUES ((SELECT COALESCE(MAX(id), 0) + 1 FROM series), ?1)",
                rusqlite::params![name],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO books_series_link (book, series) VALUES (?1, (SELECT id FROM series WHERE name = ?2))",
                rusqlite::params![id, name],
            )
            .unwrap();
        }
        let dir = root.join(path);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), b"ebook bytes").unwrap();
        }
    }

    #[test]
    fn open_fails_without_metadata_db() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CalibreLibrary::open(tmp.path()).unwrap_err();
        assert!(matches!(err, MigrateError::MetadataUnavailable(_)));
    }

    #[test]
    fn reads_records_with_series_and_formats() {
        let tmp = tempfile::tempdir().unwrap();
        let conn = seed_library(tmp.path());
        add_book(
            &conn,
            tmp.path(),
            1,
            "The Final Empire",
            "Brandon Sanderson/The Final Empire (1)",
            "Brandon Sanderson",
            Some(("Mistborn", 1.0)),
            &["The Final Empire.epub", "cover.jpg"],
        );
        add_book(
            &conn,
            tmp.path(),
            2,
            "Warbreaker (178)",
            "Brandon Sanderson/Warbreaker (178)",
            "Brandon Sanderson",
            None,
            &["Warbreaker.kepub.epub"],
        );
        drop(conn);

        let library = CalibreLibrary::open(tmp.path()).unwrap();
        let records = library.records().unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].series_name.as_deref(), Some("Mistborn"));
        assert_eq!(records[0].series_index, Some(1.0));
        assert_eq!(records[0].primary_author(), "Brandon Sanderson");
        assert!(records[0].formats.contains("epub"));
        assert!(records[0].formats.contains("jpg"));

        assert_eq!(records[1].series_name, None);
        assert_eq!(records[1].series_index, None, "index is meaningless without a series");
        assert!(records[1].formats.contains("kepub"));
        assert!(records[1].format_files["kepub"].ends_with("Warbreaker.kepub.epub"));
    }

    #[test]
    fn missing_book_directory_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let conn = seed_library(tmp.path());
        conn.execute(
            "INSERT INTO books (id, title, path, series_index) VALUES (1, 'Ghost', 'Nobody/Ghost', 1.0)",
            [],
        )
        .unwrap();
        drop(conn);

        let library = CalibreLibrary::open(tmp.path()).unwrap();
        assert_eq!(library.records().unwrap().len(), 0);
    }

    #[test]
    fn book_without_author_gets_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let conn = seed_library(tmp.path());
        conn.execute(
            "INSERT INTO books (id, title, path, series_index) VALUES (1, 'Anon', 'Unknown/Anon', 1.0)",
            [],
        )
        .unwrap();
        fs::create_dir_all(tmp.path().join("Unknown/Anon")).unwrap();
        fs::write(tmp.path().join("Unknown/Anon/Anon.epub"), b"x").unwrap();
        drop(conn);

        let library = CalibreLibrary::open(tmp.path()).unwrap();
        let records = library.records().unwrap();
        assert_eq!(records[0].primary_author(), "Unknown Author");
    }
}
