//! Posting extraction: listing fetch, gate, then serial detail enrichment.

use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::{NaiveDateTime, Timelike, Utc};
use config::ConfigError;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::gate::{Policy, Verdict};
use crate::html::{self, Candidate, Detail};
use crate::model::Posting;

/// Something that can GET a page body. Non-2xx responses are errors.
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| invalid_setting("user_agent", e))?;
        headers.insert(USER_AGENT, agent);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::fetch("client setup", e))?;
        Ok(HttpSource { client })
    }
}

impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("HTTP {}", status)));
        }
        response.text().await.map_err(|e| Error::fetch(url, e))
    }
}

/// Per-run extraction counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    /// `<article>` entries seen on the listing page.
    pub found: usize,
    pub malformed: usize,
    pub rejected: usize,
    pub accepted: usize,
    /// Accepted postings kept with placeholder detail values.
    pub detail_failed: usize,
}

pub struct Extraction {
    pub postings: Vec<Posting>,
    pub stats: ExtractStats,
}

pub struct Extractor<S> {
    source: S,
    policy: Policy,
    base: Url,
    delay_ms: RangeInclusive<u64>,
}

impl<S: PageSource> Extractor<S> {
    pub fn new(source: S, policy: Policy, settings: &Settings) -> Result<Self> {
        let base = Url::parse(&settings.site_base_url)
            .map_err(|e| invalid_setting("site_base_url", e))?;
        Ok(Extractor {
            source,
            policy,
            base,
            delay_ms: settings.delay_min_ms..=settings.delay_max_ms,
        })
    }

    /// Fetch the listing and return retained postings in page order.
    ///
    /// Only the listing fetch is fatal. A failed detail fetch keeps the
    /// posting with "Access Failed" placeholders.
    pub async fn extract(&self, listing_url: &str) -> Result<Extraction> {
        info!("Fetching listing: {}", listing_url);
        let body = self.source.fetch(listing_url).await?;
        let page = html::parse_listing(&body, &self.base);

        let mut stats = ExtractStats {
            found: page.candidates.len() + page.skipped,
            malformed: page.skipped,
            ..Default::default()
        };
        info!(
            "Listing has {} entries ({} without title or link)",
            stats.found, stats.malformed
        );

        let accepted: Vec<Candidate> = page
            .candidates
            .into_iter()
            .filter(|c| match self.policy.classify(&c.title) {
                Verdict::Accepted => true,
                Verdict::Rejected(reason) => {
                    debug!("Rejected {:?}: {}", c.title, reason);
                    stats.rejected += 1;
                    false
                }
            })
            .collect();
        stats.accepted = accepted.len();

        let pb = ProgressBar::new(accepted.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let mut postings = Vec::with_capacity(accepted.len());
        for candidate in accepted {
            self.pause().await;
            let detail = match self.source.fetch(&candidate.link).await {
                Ok(body) => html::parse_detail(&body),
                Err(e) => {
                    warn!("Detail fetch failed, keeping placeholders: {}", e);
                    stats.detail_failed += 1;
                    Detail::access_failed()
                }
            };
            postings.push(build_posting(candidate, detail, scrape_instant()));
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "Extracted {} postings ({} rejected, {} detail failures)",
            postings.len(),
            stats.rejected,
            stats.detail_failed
        );
        Ok(Extraction { postings, stats })
    }

    async fn pause(&self) {
        let ms = rand::thread_rng().gen_range(self.delay_ms.clone());
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

fn invalid_setting(key: &str, e: impl std::fmt::Display) -> Error {
    Error::Config(ConfigError::Message(format!("{}: {}", key, e)))
}

fn scrape_instant() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

fn build_posting(candidate: Candidate, detail: Detail, scraped_at: NaiveDateTime) -> Posting {
    let posted_date = html::resolve_posted_date(candidate.age_label.as_deref(), scraped_at.date());
    Posting {
        title: candidate.title,
        company: candidate.company,
        location: candidate.location,
        work_type: detail.work_type,
        posted_date,
        scraped_at,
        link: candidate.link,
        description: detail.description,
        extracted_skills: None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::model::ACCESS_FAILED;

    const LISTING_URL: &str = "https://id.jobstreet.com/id/job-search/data-engineer-jobs/";

    struct StubSource {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(pages: &[(&str, &str)]) -> Self {
            StubSource {
                pages: pages
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_string()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageSource for StubSource {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| Error::fetch(url, "HTTP 404 Not Found"))
        }
    }

    fn settings() -> Settings {
        Settings {
            delay_min_ms: 0,
            delay_max_ms: 0,
            ..Settings::default()
        }
    }

    fn extractor(source: StubSource) -> Extractor<StubSource> {
        let policy = Policy::new(["DATA"], ["SALES"]);
        Extractor::new(source, policy, &settings()).unwrap()
    }

    const LISTING: &str = r#"<html><body>
      <article><a data-automation="jobTitle" href="/id/job/1">Data Engineer</a>
               <a data-automation="jobCompany">Acme</a></article>
      <article><a data-automation="jobTitle" href="/id/job/2">Data Engineer - Sales Support</a></article>
      <article><a data-automation="jobTitle" href="/id/job/3">Lead Data Platform</a></article>
      <article><p>advert</p></article>
    </body></html>"#;

    const DETAIL: &str = r#"<div data-automation="jobAdDetails">Spark and Airflow</div>
      <span data-automation="job-detail-work-type">Contract</span>"#;

    #[test]
    fn bad_client_settings_are_config_errors() {
        let bad_base = Settings {
            site_base_url: "not a url".to_string(),
            ..settings()
        };
        let policy = Policy::new(["DATA"], ["SALES"]);
        let result = Extractor::new(StubSource::new(&[]), policy, &bad_base);
        assert!(matches!(result, Err(Error::Config(_))));

        assert!(matches!(HttpSource::new("bad\nagent"), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_run() {
        let ex = extractor(StubSource::new(&[]));
        let err = ex.extract(LISTING_URL).await.err().unwrap();
        assert!(matches!(err, Error::Fetch { .. }));
    }

    #[tokio::test]
    async fn rejected_titles_never_reach_detail_fetch() {
        let ex = extractor(StubSource::new(&[
            (LISTING_URL, LISTING),
            ("https://id.jobstreet.com/id/job/1", DETAIL),
            ("https://id.jobstreet.com/id/job/3", DETAIL),
        ]));
        let run = ex.extract(LISTING_URL).await.unwrap();

        let requested = ex.source.requested.lock().unwrap().clone();
        assert!(!requested.iter().any(|u| u.ends_with("/id/job/2")));
        assert_eq!(run.stats.found, 4);
        assert_eq!(run.stats.malformed, 1);
        assert_eq!(run.stats.rejected, 1);
        assert_eq!(run.stats.accepted, 2);

        let titles: Vec<&str> = run.postings.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Data Engineer", "Lead Data Platform"]);
        assert_eq!(run.postings[0].company, "Acme");
        assert_eq!(run.postings[0].work_type, "Contract");
        assert_eq!(run.postings[0].description, "Spark and Airflow");
        assert_eq!(run.postings[0].posted_date, run.postings[0].scraped_at.date());
        assert!(run.postings[0].extracted_skills.is_none());
    }

    #[tokio::test]
    async fn failed_detail_keeps_posting_with_placeholders() {
        let ex = extractor(StubSource::new(&[
            (LISTING_URL, LISTING),
            ("https://id.jobstreet.com/id/job/1", DETAIL),
        ]));
        let run = ex.extract(LISTING_URL).await.unwrap();

        assert_eq!(run.postings.len(), 2);
        assert_eq!(run.stats.detail_failed, 1);
        let failed = &run.postings[1];
        assert_eq!(failed.link, "https://id.jobstreet.com/id/job/3");
        assert_eq!(failed.description, ACCESS_FAILED);
        assert_eq!(failed.work_type, ACCESS_FAILED);
    }
}
