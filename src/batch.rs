//! Raw batch files: one write-once CSV per extraction run.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::info;

use crate::csv;
use crate::error::{Error, Result};
use crate::model::Posting;

const PREFIX: &str = "jobs_raw_";
const EXTENSION: &str = "csv";
const COLUMNS: [&str; 8] = [
    "title",
    "company",
    "location",
    "work_type",
    "posted_date",
    "scraped_at",
    "link",
    "description",
];
const DATE_FMT: &str = "%Y-%m-%d";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_PARSE_FMT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Write the batch under `dir`, named after `created`. Refuses to
/// overwrite an existing batch.
pub fn write_batch(dir: &Path, postings: &[Posting], created: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "{}{}.{}",
        PREFIX,
        created.format("%Y%m%d_%H%M%S"),
        EXTENSION
    ));

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| Error::batch(&path, e))?;
    let mut w = BufWriter::new(file);

    csv::write_row(&mut w, &COLUMNS)?;
    for p in postings {
        let posted = p.posted_date.format(DATE_FMT).to_string();
        let scraped = p.scraped_at.format(TIMESTAMP_FMT).to_string();
        csv::write_row(
            &mut w,
            &[
                p.title.as_str(),
                &p.company,
                &p.location,
                &p.work_type,
                &posted,
                &scraped,
                &p.link,
                &p.description,
            ],
        )?;
    }
    w.flush()?;

    info!("Wrote {} postings to {}", postings.len(), path.display());
    Ok(path)
}

/// Most recently created batch in `dir`, or `None` when there is none.
/// Falls back to modification time where creation time is unavailable;
/// equal times are ordered by file name, which embeds the timestamp.
pub fn latest_batch(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(list_batches(dir)?
        .into_iter()
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path))
}

pub fn count_batches(dir: &Path) -> Result<usize> {
    Ok(list_batches(dir)?.len())
}

fn list_batches(dir: &Path) -> Result<Vec<(SystemTime, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_batch = path.extension().is_some_and(|e| e == EXTENSION)
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PREFIX));
        if !is_batch {
            continue;
        }
        let meta = entry.metadata()?;
        let created = meta.created().or_else(|_| meta.modified())?;
        found.push((created, path));
    }
    Ok(found)
}

/// Read a batch back. Header names are matched case-insensitively, so
/// uppercased column names are accepted.
pub fn read_batch(path: &Path) -> Result<Vec<Posting>> {
    let text = fs::read_to_string(path).map_err(|e| Error::batch(path, e))?;
    let mut rows = csv::parse_rows(&text).into_iter();

    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let index: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();
    let col = |name: &str| {
        index
            .get(name)
            .copied()
            .ok_or_else(|| Error::batch(path, format!("missing column {:?}", name)))
    };
    let [title, company, location, work_type, posted_date, scraped_at, link, description] =
        [
            col("title")?,
            col("company")?,
            col("location")?,
            col("work_type")?,
            col("posted_date")?,
            col("scraped_at")?,
            col("link")?,
            col("description")?,
        ];

    let mut postings = Vec::new();
    for (n, row) in rows.enumerate() {
        let line = n + 2;
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");

        let posted = NaiveDate::parse_from_str(cell(posted_date), DATE_FMT)
            .map_err(|e| Error::batch(path, format!("row {}: posted_date: {}", line, e)))?;
        let scraped = NaiveDateTime::parse_from_str(cell(scraped_at), TIMESTAMP_PARSE_FMT)
            .map_err(|e| Error::batch(path, format!("row {}: scraped_at: {}", line, e)))?;
        if cell(link).is_empty() {
            return Err(Error::batch(path, format!("row {}: empty link", line)));
        }

        postings.push(Posting {
            title: cell(title).to_string(),
            company: cell(company).to_string(),
            location: cell(location).to_string(),
            work_type: cell(work_type).to_string(),
            posted_date: posted,
            scraped_at: scraped,
            link: cell(link).to_string(),
            description: cell(description).to_string(),
            extracted_skills: None,
        });
    }
    Ok(postings)
}
