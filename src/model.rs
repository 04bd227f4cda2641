use chrono::{NaiveDate, NaiveDateTime};

/// Placeholder stored when a detail page could not be fetched.
pub const ACCESS_FAILED: &str = "Access Failed";
pub const NOT_SPECIFIED: &str = "not specified";
pub const NOT_AVAILABLE: &str = "N/A";

/// One job listing. `link` is the natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub work_type: String,
    pub posted_date: NaiveDate,
    /// UTC instant of the extraction, whole seconds.
    pub scraped_at: NaiveDateTime,
    pub link: String,
    pub description: String,
    /// Comma-delimited keywords, filled in by the external transformation.
    pub extracted_skills: Option<String>,
}

/// Counts reported by one incremental load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempted: usize,
    pub skipped_duplicate: usize,
    pub inserted: usize,
}
