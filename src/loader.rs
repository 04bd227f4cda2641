//! Incremental load of the newest batch into the warehouse.
//!
//! Read the stored natural keys, take the set difference against the
//! batch, append what remains. Rows are never updated in place; repeat
//! scrapes of a known link are dropped here and freshness is resolved at
//! read time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::info;

use crate::batch;
use crate::db;
use crate::error::Result;
use crate::model::{LoadReport, Posting};

#[derive(Debug, PartialEq)]
pub enum LoadOutcome {
    /// No batch file exists yet.
    NothingToLoad,
    Loaded { batch: PathBuf, report: LoadReport },
}

pub fn load_latest(conn: &Connection, raw_dir: &Path) -> Result<LoadOutcome> {
    let Some(path) = batch::latest_batch(raw_dir)? else {
        info!("No batch files in {}", raw_dir.display());
        return Ok(LoadOutcome::NothingToLoad);
    };
    info!("Loading batch {}", path.display());
    let postings = batch::read_batch(&path)?;
    let report = load_postings(conn, &postings)?;
    Ok(LoadOutcome::Loaded {
        batch: path,
        report,
    })
}

pub fn load_postings(conn: &Connection, postings: &[Posting]) -> Result<LoadReport> {
    db::init_schema(conn)?;
    let existing = db::existing_links(conn)?;
    let fresh = unseen(postings, &existing);
    info!(
        "Batch has {} postings: {} duplicates skipped, {} to append",
        postings.len(),
        postings.len() - fresh.len(),
        fresh.len()
    );

    let inserted = if fresh.is_empty() {
        0
    } else {
        db::append_postings(conn, &fresh)?
    };
    let report = LoadReport {
        attempted: postings.len(),
        skipped_duplicate: postings.len() - fresh.len(),
        inserted,
    };
    info!(
        "Load: {} attempted, {} duplicates skipped, {} inserted",
        report.attempted, report.skipped_duplicate, report.inserted
    );
    Ok(report)
}

/// Postings whose link is neither stored nor repeated earlier in the batch.
pub fn unseen<'a>(postings: &'a [Posting], existing: &HashSet<String>) -> Vec<&'a Posting> {
    let mut seen: HashSet<&str> = HashSet::new();
    postings
        .iter()
        .filter(|p| !existing.contains(&p.link) && seen.insert(p.link.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::batch::tests::{posting, scratch_dir};
    use crate::db::tests::memory;

    fn p(link: &str) -> Posting {
        posting(link, "Data Engineer", "2024-02-01 09:00:00")
    }

    #[test]
    fn only_unseen_links_are_appended() {
        let conn = memory();
        load_postings(&conn, &[p("A"), p("B")]).unwrap();

        let report = load_postings(&conn, &[p("A"), p("C")]).unwrap();
        assert_eq!(
            report,
            LoadReport {
                attempted: 2,
                skipped_duplicate: 1,
                inserted: 1
            }
        );
        let links = db::existing_links(&conn).unwrap();
        assert_eq!(links.len(), 3);
        assert!(links.contains("C"));
    }

    #[test]
    fn reloading_the_same_batch_inserts_nothing() {
        let conn = memory();
        let batch = [p("A"), p("B")];
        assert_eq!(load_postings(&conn, &batch).unwrap().inserted, 2);

        let again = load_postings(&conn, &batch).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.skipped_duplicate, 2);
        assert_eq!(db::get_stats(&conn).unwrap().rows, 2);
    }

    #[test]
    fn changed_fields_do_not_make_a_known_link_new() {
        let conn = memory();
        load_postings(&conn, &[p("A")]).unwrap();
        let rescraped = posting("A", "Lead Data Engineer", "2024-02-09 09:00:00");
        assert_eq!(load_postings(&conn, &[rescraped]).unwrap().inserted, 0);
    }

    #[test]
    fn repeated_link_within_a_batch_is_stored_once() {
        let conn = memory();
        let report = load_postings(&conn, &[p("A"), p("A"), p("B")]).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped_duplicate, 1);
    }

    #[test]
    fn failed_append_reports_only_unseen_rows() {
        let conn = memory();
        load_postings(&conn, &[p("A")]).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_c BEFORE INSERT ON job_postings
             WHEN NEW.link = 'C'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        let err = load_postings(&conn, &[p("A"), p("B"), p("C")]).unwrap_err();
        assert!(matches!(err, crate::error::Error::Write { rows: 2, .. }));
        assert_eq!(db::get_stats(&conn).unwrap().rows, 1);
    }

    #[test]
    fn empty_batch_succeeds_without_inserts() {
        let conn = memory();
        let report = load_postings(&conn, &[]).unwrap();
        assert_eq!(report, LoadReport::default());
    }

    #[test]
    fn missing_batch_is_a_no_op() {
        let conn = memory();
        let dir = scratch_dir("loader_none");
        assert_eq!(load_latest(&conn, &dir).unwrap(), LoadOutcome::NothingToLoad);
    }

    #[test]
    fn newest_batch_file_is_loaded_twice_without_duplicates() {
        let conn = memory();
        let dir = scratch_dir("loader_file");
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        let path = batch::write_batch(&dir, &[p("A"), p("B")], created).unwrap();

        let first = load_latest(&conn, &dir).unwrap();
        assert_eq!(
            first,
            LoadOutcome::Loaded {
                batch: path.clone(),
                report: LoadReport {
                    attempted: 2,
                    skipped_duplicate: 0,
                    inserted: 2
                }
            }
        );
        match load_latest(&conn, &dir).unwrap() {
            LoadOutcome::Loaded { batch, report } => {
                assert_eq!(batch, path);
                assert_eq!(report.inserted, 0);
                assert_eq!(report.skipped_duplicate, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
