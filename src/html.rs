//! Listing and detail page markup contract.
//!
//! Selectors follow the `data-automation` attributes the job site renders.
//! A layout change on the site shows up here as skipped candidates or
//! placeholder values, never as a panic.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::model::{ACCESS_FAILED, NOT_AVAILABLE, NOT_SPECIFIED};

static ARTICLE: LazyLock<Selector> = LazyLock::new(|| sel("article"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| sel(r#"a[data-automation="jobTitle"]"#));
static COMPANY: LazyLock<Selector> = LazyLock::new(|| sel(r#"a[data-automation="jobCompany"]"#));
static LOCATION: LazyLock<Selector> = LazyLock::new(|| sel(r#"a[data-automation="jobLocation"]"#));
static LISTING_DATE: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"[data-automation="jobListingDate"]"#));
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"[data-automation="jobAdDetails"]"#));
static WORK_TYPE: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"[data-automation="job-detail-work-type"]"#));

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+)\s*\+?\s*(hari|minggu|bulan|menit|mnt|jam|days?|weeks?|months?|hours?|minutes?|mo|d|w|h|m)\b",
    )
    .unwrap()
});

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// One entry on the listing page, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub age_label: Option<String>,
}

#[derive(Debug, Default)]
pub struct ListingPage {
    /// In page order.
    pub candidates: Vec<Candidate>,
    /// Entries without a title or a usable detail link.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub description: String,
    pub work_type: String,
}

impl Detail {
    pub fn access_failed() -> Self {
        Detail {
            description: ACCESS_FAILED.to_string(),
            work_type: ACCESS_FAILED.to_string(),
        }
    }
}

pub fn parse_listing(html: &str, base: &Url) -> ListingPage {
    let document = Html::parse_document(html);
    let mut page = ListingPage::default();

    for article in document.select(&ARTICLE) {
        let Some(title_el) = article.select(&TITLE).next() else {
            page.skipped += 1;
            continue;
        };
        let title = inline_text(title_el);
        if title.is_empty() {
            page.skipped += 1;
            continue;
        }
        let Some(link) = title_el.value().attr("href").and_then(|h| canonical_link(base, h))
        else {
            debug!("No detail link for {:?}, skipping", title);
            page.skipped += 1;
            continue;
        };

        page.candidates.push(Candidate {
            title,
            company: first_text(article, &COMPANY).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            location: first_text(article, &LOCATION).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            link,
            age_label: first_text(article, &LISTING_DATE),
        });
    }

    page
}

pub fn parse_detail(html: &str) -> Detail {
    let document = Html::parse_document(html);

    let description = document
        .select(&DESCRIPTION)
        .next()
        .map(block_text)
        .unwrap_or_default();
    let work_type = document
        .select(&WORK_TYPE)
        .next()
        .map(inline_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());

    Detail {
        description,
        work_type,
    }
}

/// Absolute detail URL without query string or fragment, so tracking
/// parameters do not change the natural key between scrapes.
pub fn canonical_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut url = base.join(href).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Resolve a relative age label ("3d ago", "5 hari yang lalu") against the
/// scrape date. Hours and minutes count as today.
pub fn resolve_posted_date(label: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(caps) = label.and_then(|l| AGE_RE.captures(l)) else {
        return today;
    };
    let Ok(amount) = caps[1].parse::<u64>() else {
        return today;
    };
    let unit = caps[2].to_lowercase();
    let days = match unit.as_str() {
        "hari" | "d" | "day" | "days" => amount,
        "minggu" | "w" | "week" | "weeks" => amount.saturating_mul(7),
        "bulan" | "mo" | "month" | "months" => amount.saturating_mul(30),
        _ => 0,
    };
    today.checked_sub_days(Days::new(days)).unwrap_or(today)
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(inline_text)
        .filter(|t| !t.is_empty())
}

fn inline_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text nodes one per line, whitespace collapsed within each line.
fn block_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
