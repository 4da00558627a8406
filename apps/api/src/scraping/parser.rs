//! Job-listing parser: turns a saved search-results page into structured job records.
//!
//! Every field is located through a selector cascade: the first selector that matches
//! wins, so older and newer page layouts are both understood.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::job::{JobInfo, ParsedJob};
use crate::scraping::fields::{
    classify_info_item, extract_budget_from_text, is_overflow_token, looks_like_job_line,
    parse_jobs_count, FIXED_PRICE, HOURLY,
};

pub const SITE_ORIGIN: &str = "https://www.upwork.com";

const JOB_TILE_SELECTORS: &[&str] = &[
    r#"article[data-test="JobTile"]"#,
    r#"section[data-qa="job-tile"]"#,
    r#"[data-qa="job-tile"]"#,
];

const TITLE_LINK_SELECTORS: &[&str] = &[
    r#"h2.job-tile-title a[data-test="job-tile-title-link"]"#,
    r#"h2 a[data-qa="job-title"]"#,
    "h2 a",
    r#"a[data-test="job-tile-title-link"]"#,
    r#"a[data-qa="job-title"]"#,
];

// "pubilshed" is how the site spells it.
const POSTED_TIME_SELECTORS: &[&str] = &[r#"small[data-test="job-pubilshed-date"]"#, "small"];

const JOB_INFO_SELECTORS: &[&str] = &[r#"ul[data-test="JobInfo"] li"#, "ul li"];

const DESCRIPTION_SELECTORS: &[&str] = &[
    r#"[data-test="UpCLineClamp JobDescription"] .air3-line-clamp p"#,
    ".air3-line-clamp p",
    "p",
];

const SKILL_SELECTORS: &[&str] = &[
    r#"[data-test="TokenClamp JobAttrs"] .air3-token span"#,
    ".air3-token span",
];

const JOBS_COUNT_SELECTOR: &str = r#"[data-test="JobsCountQA JobsCount"]"#;

// Lenient cascades for pages saved by older capture scripts.
const LOOSE_TILE_SELECTORS: &[&str] = &[
    r#"[data-test="JobTile"]"#,
    ".job-tile",
    ".job-listing",
    r#"[class*="job"]"#,
    "article",
];

const LOOSE_TITLE_SELECTORS: &[&str] = &[
    r#"[data-test="UpCLineClamp JobTitle"]"#,
    r#"h4[data-test*="title"]"#,
    "h3",
    "h4",
    ".job-title",
    r#"a[href*="job"]"#,
];

const LOOSE_DESCRIPTION_SELECTORS: &[&str] = &[
    r#"[data-test="job-description"]"#,
    ".job-description",
    "p",
    ".description",
];

const LOOSE_SKILL_SELECTORS: &[&str] = &[".skill", ".tag", ".badge", r#"[data-test*="skill"]"#];

const LOOSE_LINK_SELECTOR: &str = r#"a[href*="job"]"#;

const MAX_LOOSE_TILES: usize = 20;
const MAX_SKILLS_PER_SELECTOR: usize = 10;
const MAX_SKILL_CHARS: usize = 30;
const MIN_GOOD_DESCRIPTION_CHARS: usize = 50;
const MAX_DESCRIPTION_CHARS: usize = 1000;

const GENERIC_SCAN_LINES: usize = 50;
const MIN_GENERIC_LINE_CHARS: usize = 10;
const MAX_GENERIC_TITLE_CHARS: usize = 100;
const MAX_GENERIC_JOBS: usize = 10;

/// Page-level information about a scraped search result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
    pub total_jobs_found: usize,
    pub jobs_count_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_jobs_on_page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingStats {
    pub html_length: usize,
    pub jobs_extracted: usize,
    pub parsing_successful: bool,
}

/// Full result of parsing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub metadata: PageMetadata,
    pub jobs: Vec<ParsedJob>,
    pub parsing_stats: ParsingStats,
}

/// Parses a page into metadata, jobs and stats. `source` labels where the HTML came from.
pub fn parse_html(html: &str, source: Option<&str>) -> ParseOutcome {
    let document = Html::parse_document(html);

    let jobs = extract_jobs(&document);
    let mut metadata = extract_metadata_from(&document);
    metadata.total_jobs_found = jobs.len();
    metadata.source = source.map(String::from);

    let parsing_stats = ParsingStats {
        html_length: html.len(),
        jobs_extracted: jobs.len(),
        parsing_successful: !jobs.is_empty(),
    };

    ParseOutcome {
        metadata,
        jobs,
        parsing_stats,
    }
}

/// Extracts every job tile with a title from the page.
pub fn parse_job_listings(html: &str) -> Vec<ParsedJob> {
    extract_jobs(&Html::parse_document(html))
}

/// Extracts page title, canonical URL and the result counter.
pub fn extract_metadata(html: &str) -> PageMetadata {
    extract_metadata_from(&Html::parse_document(html))
}

/// Like [`parse_job_listings`], but falls back to loose tile matching and then to
/// scanning page text when the current layout yields nothing.
pub fn parse_job_listings_lenient(html: &str) -> Vec<ParsedJob> {
    let document = Html::parse_document(html);

    let jobs = extract_jobs(&document);
    if !jobs.is_empty() {
        return jobs;
    }

    let tiles = select_all(document.root_element(), LOOSE_TILE_SELECTORS);
    if tiles.is_empty() {
        debug!("No job elements found, scanning page text");
        return extract_text_jobs(&document);
    }
    debug!("Found {} loosely matched job elements", tiles.len());

    tiles
        .into_iter()
        .take(MAX_LOOSE_TILES)
        .filter_map(parse_loose_tile)
        .collect()
}

fn extract_jobs(document: &Html) -> Vec<ParsedJob> {
    let tiles = select_all(document.root_element(), JOB_TILE_SELECTORS);
    debug!("Found {} job elements", tiles.len());

    tiles.into_iter().filter_map(parse_tile).collect()
}

fn parse_tile(tile: ElementRef<'_>) -> Option<ParsedJob> {
    let title_link = select_first(tile, TITLE_LINK_SELECTORS)?;
    let title = stripped_text(title_link);
    if title.is_empty() {
        return None;
    }

    let job_uid = tile
        .value()
        .attr("data-ev-job-uid")
        .filter(|uid| !uid.is_empty())
        .map(String::from);

    let url = title_link.value().attr("href").map(absolute_url);

    let posted_time = select_first(tile, POSTED_TIME_SELECTORS).map(stripped_text);

    let mut job_info = JobInfo::default();
    for item in select_all(tile, JOB_INFO_SELECTORS) {
        classify_info_item(&stripped_text(item), &mut job_info);
    }

    let description = select_first(tile, DESCRIPTION_SELECTORS).map(stripped_text);

    let skills = select_all(tile, SKILL_SELECTORS)
        .into_iter()
        .map(stripped_text)
        .filter(|s| !s.is_empty() && !is_overflow_token(s))
        .collect();

    Some(ParsedJob {
        job_uid,
        title,
        url,
        posted_time,
        job_info,
        description,
        skills,
    })
}

fn parse_loose_tile(tile: ElementRef<'_>) -> Option<ParsedJob> {
    let title = first_of_each(tile, LOOSE_TITLE_SELECTORS)
        .map(stripped_text)
        .find(|title| !title.is_empty())?;

    let mut description = String::new();
    for element in first_of_each(tile, LOOSE_DESCRIPTION_SELECTORS) {
        description = stripped_text(element);
        if description.chars().count() > MIN_GOOD_DESCRIPTION_CHARS {
            break;
        }
    }
    let description = (!description.is_empty())
        .then(|| description.chars().take(MAX_DESCRIPTION_CHARS).collect());

    let mut skills: Vec<String> = Vec::new();
    for selector in LOOSE_SKILL_SELECTORS.iter().filter_map(|css| Selector::parse(css).ok()) {
        for element in tile.select(&selector).take(MAX_SKILLS_PER_SELECTOR) {
            let skill = stripped_text(element);
            if !skill.is_empty()
                && skill.chars().count() < MAX_SKILL_CHARS
                && !skills.contains(&skill)
            {
                skills.push(skill);
            }
        }
    }

    let url = select_first(tile, &[LOOSE_LINK_SELECTOR])
        .and_then(|link| link.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(absolute_url);

    let job_uid = tile
        .value()
        .attr("data-ev-job-uid")
        .filter(|uid| !uid.is_empty())
        .map(String::from);

    let text = tile.text().collect::<Vec<_>>().join(" ");
    let lowered = text.to_lowercase();
    let job_info = JobInfo {
        job_type: guess_job_type(&lowered).map(String::from),
        experience_level: guess_experience_level(&lowered).map(String::from),
        budget: extract_budget_from_text(&text),
        ..JobInfo::default()
    };

    Some(ParsedJob {
        job_uid,
        title,
        url,
        posted_time: None,
        job_info,
        description,
        skills,
    })
}

fn guess_job_type(lowered: &str) -> Option<&'static str> {
    if lowered.contains("hourly") || lowered.contains("/hr") {
        Some(HOURLY)
    } else if lowered.contains("fixed") || lowered.contains("project") {
        Some(FIXED_PRICE)
    } else {
        None
    }
}

fn guess_experience_level(lowered: &str) -> Option<&'static str> {
    if lowered.contains("expert") || lowered.contains("senior") {
        Some("Expert")
    } else if lowered.contains("intermediate") {
        Some("Intermediate")
    } else if lowered.contains("entry") || lowered.contains("beginner") {
        Some("Entry Level")
    } else {
        None
    }
}

/// Last resort: lines of page text that read like job headlines become bare jobs.
fn extract_text_jobs(document: &Html) -> Vec<ParsedJob> {
    let text: String = document.root_element().text().collect();
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_GENERIC_LINE_CHARS)
        .take(GENERIC_SCAN_LINES)
        .filter(|line| looks_like_job_line(line))
        .take(MAX_GENERIC_JOBS)
        .map(|line| ParsedJob {
            title: line.chars().take(MAX_GENERIC_TITLE_CHARS).collect(),
            description: Some(line.to_string()),
            job_info: JobInfo {
                budget: extract_budget_from_text(line),
                ..JobInfo::default()
            },
            ..ParsedJob::default()
        })
        .collect()
}

fn extract_metadata_from(document: &Html) -> PageMetadata {
    let root = document.root_element();

    let title = select_first(root, &["title"])
        .map(stripped_text)
        .unwrap_or_default();

    let url = select_first(root, &[r#"link[rel~="canonical"]"#])
        .and_then(|link| link.value().attr("href"))
        .unwrap_or_default()
        .to_string();

    let jobs_count_text = select_first(root, &[JOBS_COUNT_SELECTOR])
        .map(stripped_text)
        .unwrap_or_default();
    let total_jobs_on_page = parse_jobs_count(&jobs_count_text);

    PageMetadata {
        title,
        url,
        scraped_at: Utc::now(),
        total_jobs_found: 0,
        jobs_count_text,
        total_jobs_on_page,
        source: None,
    }
}

/// Makes site-relative links absolute.
pub fn absolute_url(href: &str) -> String {
    if href.is_empty() || href.starts_with("http") {
        href.to_string()
    } else {
        format!("{SITE_ORIGIN}{href}")
    }
}

/// Text of an element with each text node trimmed and joined without separators.
fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// First element matched by the first selector in the cascade that matches anything.
fn select_first<'a>(scope: ElementRef<'a>, cascade: &[&str]) -> Option<ElementRef<'a>> {
    cascade
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| scope.select(&selector).next())
}

/// The first match of every selector in the cascade, in cascade order.
fn first_of_each<'a>(
    scope: ElementRef<'a>,
    cascade: &'static [&'static str],
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    cascade
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .filter_map(move |selector| scope.select(&selector).next())
}

/// All elements matched by the first selector in the cascade that matches anything.
fn select_all<'a>(scope: ElementRef<'a>, cascade: &[&str]) -> Vec<ElementRef<'a>> {
    for selector in cascade.iter().filter_map(|css| Selector::parse(css).ok()) {
        let found: Vec<_> = scope.select(&selector).collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT_LAYOUT: &str = r#"
        <html>
          <head>
            <title>Rust jobs | Upwork</title>
            <link rel="canonical" href="https://www.upwork.com/nx/search/jobs/?q=rust">
          </head>
          <body>
            <div data-test="JobsCountQA JobsCount">5,679 jobs found</div>
            <article data-test="JobTile" data-ev-job-uid="1890001">
              <small data-test="job-pubilshed-date"><span>Posted</span> <span>2 hours ago</span></small>
              <h2 class="job-tile-title">
                <a data-test="job-tile-title-link" href="/jobs/Rust-backend_~01abc/">Rust backend engineer</a>
              </h2>
              <ul data-test="JobInfo">
                <li><strong>Hourly: $40.00 - $80.00</strong></li>
                <li>Expert</li>
                <li>Est. time: 1 to 3 months, 30+ hrs/week</li>
              </ul>
              <div data-test="UpCLineClamp JobDescription">
                <div class="air3-line-clamp"><p>We need a Rust engineer to build an ingestion service.</p></div>
              </div>
              <div data-test="TokenClamp JobAttrs">
                <span class="air3-token"><span>Rust</span></span>
                <span class="air3-token"><span>PostgreSQL</span></span>
                <span class="air3-token"><span>+2</span></span>
              </div>
            </article>
            <article data-test="JobTile" data-ev-job-uid="1890002">
              <h2 class="job-tile-title">
                <a data-test="job-tile-title-link" href="https://www.upwork.com/jobs/~02def">Blog writer for casino reviews</a>
              </h2>
              <ul data-test="JobInfo">
                <li>Fixed price</li>
                <li>Intermediate</li>
                <li>Est. budget: $1,200.00</li>
              </ul>
              <p>Long-form SEO articles.</p>
            </article>
            <article data-test="JobTile" data-ev-job-uid="1890003">
              <ul data-test="JobInfo"><li>Fixed price</li></ul>
            </article>
          </body>
        </html>
    "#;

    const NEWER_LAYOUT: &str = r#"
        <html><body>
          <section data-qa="job-tile">
            <h2><a data-qa="job-title" href="/jobs/~03ghi">Data scraping specialist</a></h2>
            <small>Posted yesterday</small>
            <ul><li>Entry Level</li></ul>
            <p>Scrape product listings.</p>
            <span class="air3-token"><span>Python</span></span>
          </section>
        </body></html>
    "#;

    const LOOSE_LAYOUT: &str = r#"
        <html><body>
          <div class="job-tile" data-ev-job-uid="loose-1">
            <h3>Technical blog writer</h3>
            <p>Short intro</p>
            <div class="description">We need weekly long-form posts about Rust tooling and databases.</div>
            <span>Budget: $450</span>
            <span class="tag">Writing</span>
            <span class="tag">Rust</span>
            <span class="tag">Writing</span>
            <span class="tag">This label is far too long to be a skill</span>
            <a href="/jobs/~loose1">View job</a>
            <span>Fixed-price project, Expert level</span>
          </div>
          <div class="job-tile"><span>no heading here</span></div>
        </body></html>
    "#;

    const TEXT_ONLY_PAGE: &str = "<html><body><div>
Welcome back
Looking for a Senior Rust Developer to build APIs
Budget is $500 for the fixed project
short
Contact us about our privacy policy today
</div></body></html>";

    #[test]
    fn test_parses_current_layout_tiles() {
        let jobs = parse_job_listings(CURRENT_LAYOUT);
        assert_eq!(jobs.len(), 2, "tile without a title must be dropped");

        let first = &jobs[0];
        assert_eq!(first.job_uid.as_deref(), Some("1890001"));
        assert_eq!(first.title, "Rust backend engineer");
        assert_eq!(
            first.url.as_deref(),
            Some("https://www.upwork.com/jobs/Rust-backend_~01abc/")
        );
        assert_eq!(first.posted_time.as_deref(), Some("Posted2 hours ago"));
        assert_eq!(first.job_info.job_type.as_deref(), Some("Hourly"));
        assert_eq!(first.job_info.hourly_rate_min.as_deref(), Some("40.00"));
        assert_eq!(first.job_info.hourly_rate_max.as_deref(), Some("80.00"));
        assert_eq!(first.job_info.experience_level.as_deref(), Some("Expert"));
        assert_eq!(
            first.job_info.duration.as_deref(),
            Some("1 to 3 months, 30+ hrs/week")
        );
        assert_eq!(
            first.description.as_deref(),
            Some("We need a Rust engineer to build an ingestion service.")
        );
        assert_eq!(first.skills, vec!["Rust", "PostgreSQL"]);
    }

    #[test]
    fn test_fixed_price_tile_and_absolute_url() {
        let jobs = parse_job_listings(CURRENT_LAYOUT);
        let second = &jobs[1];
        assert_eq!(second.url.as_deref(), Some("https://www.upwork.com/jobs/~02def"));
        assert_eq!(second.job_info.job_type.as_deref(), Some("Fixed price"));
        assert_eq!(second.job_info.budget.as_deref(), Some("1,200.00"));
        assert_eq!(second.job_info.experience_level.as_deref(), Some("Intermediate"));
        assert_eq!(second.description.as_deref(), Some("Long-form SEO articles."));
        assert!(second.skills.is_empty());
        assert!(second.posted_time.is_none());
    }

    #[test]
    fn test_falls_back_to_newer_layout() {
        let jobs = parse_job_listings(NEWER_LAYOUT);
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert!(job.job_uid.is_none());
        assert_eq!(job.title, "Data scraping specialist");
        assert_eq!(job.url.as_deref(), Some("https://www.upwork.com/jobs/~03ghi"));
        assert_eq!(job.posted_time.as_deref(), Some("Posted yesterday"));
        assert_eq!(job.job_info.experience_level.as_deref(), Some("Entry Level"));
        assert_eq!(job.description.as_deref(), Some("Scrape product listings."));
        assert_eq!(job.skills, vec!["Python"]);
    }

    #[test]
    fn test_metadata_extraction() {
        let metadata = extract_metadata(CURRENT_LAYOUT);
        assert_eq!(metadata.title, "Rust jobs | Upwork");
        assert_eq!(metadata.url, "https://www.upwork.com/nx/search/jobs/?q=rust");
        assert_eq!(metadata.jobs_count_text, "5,679 jobs found");
        assert_eq!(metadata.total_jobs_on_page, Some(5679));
    }

    #[test]
    fn test_parse_html_stats() {
        let outcome = parse_html(CURRENT_LAYOUT, Some("fixture.html"));
        assert_eq!(outcome.metadata.total_jobs_found, 2);
        assert_eq!(outcome.metadata.source.as_deref(), Some("fixture.html"));
        assert_eq!(outcome.parsing_stats.html_length, CURRENT_LAYOUT.len());
        assert_eq!(outcome.parsing_stats.jobs_extracted, 2);
        assert!(outcome.parsing_stats.parsing_successful);
    }

    #[test]
    fn test_page_without_tiles() {
        let outcome = parse_html("<html><head><title>Login</title></head><body></body></html>", None);
        assert!(outcome.jobs.is_empty());
        assert!(!outcome.parsing_stats.parsing_successful);
        assert_eq!(outcome.metadata.title, "Login");
        assert_eq!(outcome.metadata.url, "");
        assert!(outcome.metadata.total_jobs_on_page.is_none());
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url("/jobs/~1"), "https://www.upwork.com/jobs/~1");
        assert_eq!(absolute_url("https://example.com/x"), "https://example.com/x");
        assert_eq!(absolute_url(""), "");
    }

    #[test]
    fn test_lenient_prefers_current_layout() {
        assert_eq!(
            parse_job_listings_lenient(CURRENT_LAYOUT),
            parse_job_listings(CURRENT_LAYOUT)
        );
    }

    #[test]
    fn test_lenient_loose_tiles() {
        assert!(parse_job_listings(LOOSE_LAYOUT).is_empty());

        let jobs = parse_job_listings_lenient(LOOSE_LAYOUT);
        assert_eq!(jobs.len(), 1, "tile without a title must be dropped");

        let job = &jobs[0];
        assert_eq!(job.job_uid.as_deref(), Some("loose-1"));
        assert_eq!(job.title, "Technical blog writer");
        assert_eq!(
            job.description.as_deref(),
            Some("We need weekly long-form posts about Rust tooling and databases.")
        );
        assert_eq!(job.url.as_deref(), Some("https://www.upwork.com/jobs/~loose1"));
        assert_eq!(job.job_info.budget.as_deref(), Some("450"));
        assert_eq!(job.job_info.job_type.as_deref(), Some(FIXED_PRICE));
        assert_eq!(job.job_info.experience_level.as_deref(), Some("Expert"));
        assert_eq!(job.skills, vec!["Writing", "Rust"]);
    }

    #[test]
    fn test_lenient_truncates_long_description() {
        let html = format!(
            r#"<html><body><article><h3>Editor</h3><p>{}</p></article></body></html>"#,
            "x".repeat(1500)
        );
        let jobs = parse_job_listings_lenient(&html);
        assert_eq!(jobs[0].description.as_ref().map(|d| d.len()), Some(1000));
    }

    #[test]
    fn test_lenient_scans_text_lines() {
        let jobs = parse_job_listings_lenient(TEXT_ONLY_PAGE);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title, "Looking for a Senior Rust Developer to build APIs");
        assert!(jobs[0].job_info.budget.is_none());
        assert_eq!(jobs[1].job_info.budget.as_deref(), Some("500"));
        assert!(jobs.iter().all(|job| job.job_uid.is_none()));
    }

    #[test]
    fn test_guessed_job_fields() {
        assert_eq!(guess_job_type("$30/hr"), Some(HOURLY));
        assert_eq!(guess_job_type("one-off project"), Some(FIXED_PRICE));
        assert_eq!(guess_job_type("long term"), None);
        assert_eq!(guess_experience_level("beginner friendly"), Some("Entry Level"));
        assert_eq!(guess_experience_level("senior only"), Some("Expert"));
        assert_eq!(guess_experience_level("anyone"), None);
    }
}
