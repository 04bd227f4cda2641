//! Error types shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure or non-2xx response for a single request.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The warehouse could not be opened.
    #[error("warehouse connection failed: {0}")]
    Connection(#[source] rusqlite::Error),

    /// Table creation failed.
    #[error("warehouse schema setup failed: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("warehouse query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A bulk append was rolled back; none of its rows are stored.
    #[error("bulk append of {rows} rows failed: {source}")]
    Write {
        rows: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("batch file {}: {reason}", path.display())]
    Batch { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Error::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn batch(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Batch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
