use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const ENV_PREFIX: &str = "JOB_RADAR";

const LISTING_URL: &str = "https://id.jobstreet.com/id/job-search/data-engineer-jobs/";
const SITE_BASE_URL: &str = "https://id.jobstreet.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const ALLOW_KEYWORDS: &[&str] = &[
    "DATA",
    "ETL",
    "ANALYTICS",
    "BIG DATA",
    "BUSINESS INTELLIGENCE",
    "MACHINE LEARNING",
];
const DENY_KEYWORDS: &[&str] = &[
    "SALES",
    "MARKETING",
    "ACCOUNTING",
    "CUSTOMER SERVICE",
    "ADMIN",
];

/// Runtime settings, built once in `main` and handed to each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Search results page scraped on every run.
    pub listing_url: String,
    /// Base used to resolve relative detail links.
    pub site_base_url: String,
    pub user_agent: String,
    /// Directory holding one CSV batch per extraction run.
    pub raw_dir: PathBuf,
    pub db_path: PathBuf,
    /// Bounds of the random pause before each detail fetch.
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Number of skills shown by the report.
    pub top_n: usize,
    pub allow_keywords: Vec<String>,
    pub deny_keywords: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listing_url: LISTING_URL.to_string(),
            site_base_url: SITE_BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            raw_dir: PathBuf::from("data/raw"),
            db_path: PathBuf::from("data/job_radar.sqlite"),
            delay_min_ms: 1000,
            delay_max_ms: 3000,
            top_n: 20,
            allow_keywords: ALLOW_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            deny_keywords: DENY_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with `JOB_RADAR_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_environment(environment())
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    fn validated(mut self) -> Result<Self> {
        if self.delay_min_ms > self.delay_max_ms {
            return Err(ConfigError::Message(format!(
                "delay_min_ms ({}) exceeds delay_max_ms ({})",
                self.delay_min_ms, self.delay_max_ms
            ))
            .into());
        }
        self.allow_keywords = normalize_keywords(&self.allow_keywords);
        self.deny_keywords = normalize_keywords(&self.deny_keywords);
        if self.allow_keywords.is_empty() {
            return Err(ConfigError::Message("allow_keywords must not be empty".into()).into());
        }
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("allow_keywords")
        .with_list_parse_key("deny_keywords")
}

/// Policy keywords are matched against uppercased titles.
fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_uppercase())
        .filter(|k| !k.is_empty())
        .collect()
}
