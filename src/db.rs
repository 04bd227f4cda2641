use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::Posting;

const TABLE: &str = "job_postings";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path).map_err(Error::Connection)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(Error::Connection)?;
    Ok(conn)
}

/// Open a warehouse that must already exist. Used by read-only commands so
/// they never leave an empty database file behind.
pub fn open_existing(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Connection::open_with_flags(path, flags).map_err(Error::Connection)
}

/// Idempotent; never touches existing rows.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS job_postings (
            id                    INTEGER PRIMARY KEY,
            title                 TEXT NOT NULL,
            company               TEXT,
            location              TEXT,
            work_type             TEXT,
            posted_date           TEXT,
            scraped_at            TEXT NOT NULL,
            link                  TEXT NOT NULL,
            description           TEXT,
            extracted_skills      TEXT,
            description_embedding BLOB
        );
        CREATE INDEX IF NOT EXISTS idx_job_postings_link ON job_postings(link);
        ",
    )
    .map_err(Error::Schema)?;
    Ok(())
}

fn table_exists(conn: &Connection) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Every natural key currently stored. Empty when the table does not exist yet.
pub fn existing_links(conn: &Connection) -> Result<HashSet<String>> {
    if !table_exists(conn)? {
        return Ok(HashSet::new());
    }
    let mut stmt = conn.prepare("SELECT DISTINCT link FROM job_postings")?;
    let links = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(links)
}

/// Append all rows in one transaction. On failure nothing is stored.
pub fn append_postings(conn: &Connection, postings: &[&Posting]) -> Result<usize> {
    let write_err = |source: rusqlite::Error| Error::Write {
        rows: postings.len(),
        source,
    };
    let tx = conn.unchecked_transaction().map_err(write_err)?;
    let mut count = 0;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO job_postings
                 (title, company, location, work_type, posted_date, scraped_at, link, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(write_err)?;
        for p in postings {
            count += stmt
                .execute(rusqlite::params![
                    p.title,
                    p.company,
                    p.location,
                    p.work_type,
                    p.posted_date,
                    p.scraped_at,
                    p.link,
                    p.description,
                ])
                .map_err(write_err)?;
        }
    }
    tx.commit().map_err(write_err)?;
    Ok(count)
}

/// One row per link: the greatest `scraped_at`, ties going to the highest
/// row id. Ordered freshest first.
pub fn latest_view(conn: &Connection) -> Result<Vec<Posting>> {
    if !table_exists(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT title, company, location, work_type, posted_date, scraped_at,
                link, description, extracted_skills
         FROM (
             SELECT *,
                    ROW_NUMBER() OVER (
                        PARTITION BY link ORDER BY scraped_at DESC, id DESC
                    ) AS rn
             FROM job_postings
         )
         WHERE rn = 1
         ORDER BY scraped_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Posting {
                title: row.get(0)?,
                company: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                location: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                work_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                posted_date: row.get(4)?,
                scraped_at: row.get(5)?,
                link: row.get(6)?,
                description: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                extracted_skills: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn engine_version(conn: &Connection) -> Result<String> {
    Ok(conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?)
}

pub struct Stats {
    pub rows: usize,
    pub distinct_links: usize,
    pub pending_skills: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    if !table_exists(conn)? {
        return Ok(Stats {
            rows: 0,
            distinct_links: 0,
            pending_skills: 0,
        });
    }
    let rows: usize = conn.query_row("SELECT COUNT(*) FROM job_postings", [], |r| r.get(0))?;
    let distinct_links: usize =
        conn.query_row("SELECT COUNT(DISTINCT link) FROM job_postings", [], |r| r.get(0))?;
    let pending_skills: usize = conn.query_row(
        "SELECT COUNT(*) FROM job_postings WHERE extracted_skills IS NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        rows,
        distinct_links,
        pending_skills,
    })
}
