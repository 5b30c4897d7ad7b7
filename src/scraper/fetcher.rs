//! Chapter fetcher: builds the chapter URL, downloads and parses the page, retries with
//! exponential backoff, and throttles after every successful chapter.

use super::client::PageSource;
use super::error::FetchError;
use super::normalize::extract_text;
use crate::model::{ChapterRecord, FailureKind, FetchOutcome};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_DELAY_SECS: u64 = 2;

/// Chapter heading on the site.
const HEADING_SELECTOR: &str = "h2.heading-font.mt-2";
/// Chapter body container on the site.
const CONTENT_SELECTOR: &str = "div#inner_chap_content_1";
const TITLE_PREFIX: &str = "Chương";

/// Blocking delay. Abstracted so retry timing can be observed without sleeping.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// `{base_url}/chuong-{chapter_num}.html`
pub fn chapter_url(base_url: &str, chapter_num: u32) -> String {
    format!(
        "{}/chuong-{}.html",
        base_url.trim_end_matches('/'),
        chapter_num
    )
}

/// Delay after failed attempt `attempt` (0-based): 1s, 2s, 4s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

fn parse_selector(sel: &str) -> Result<Selector, FetchError> {
    Selector::parse(sel).map_err(|e| FetchError::Selector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a chapter page into a record. Heading and content container are both required.
pub fn parse_chapter_page(
    html: &str,
    chapter_num: u32,
    url: &str,
) -> Result<ChapterRecord, FetchError> {
    let doc = Html::parse_document(html);

    let heading_sel = parse_selector(HEADING_SELECTOR)?;
    let heading = doc
        .select(&heading_sel)
        .next()
        .ok_or_else(|| FetchError::MissingHeading {
            chapter_num,
            selector: HEADING_SELECTOR.to_string(),
            url: url.to_string(),
        })?;
    let heading_text = heading.text().collect::<String>();
    let title = format!("{} {}: {}", TITLE_PREFIX, chapter_num, heading_text.trim());

    let content_sel = parse_selector(CONTENT_SELECTOR)?;
    let container = doc
        .select(&content_sel)
        .next()
        .ok_or_else(|| FetchError::MissingContent {
            chapter_num,
            selector: CONTENT_SELECTOR.to_string(),
            url: url.to_string(),
        })?;

    Ok(ChapterRecord::new(chapter_num, title, extract_text(container)))
}

/// Fetches one chapter at a time with bounded retries.
pub struct ChapterFetcher<S, Z = ThreadSleeper> {
    source: S,
    sleeper: Z,
    base_url: String,
    max_retries: u32,
    request_delay: Duration,
}

impl<S: PageSource> ChapterFetcher<S, ThreadSleeper> {
    pub fn new(source: S, base_url: impl Into<String>) -> Self {
        Self::with_sleeper(source, ThreadSleeper, base_url)
    }
}

impl<S: PageSource, Z: Sleeper> ChapterFetcher<S, Z> {
    pub fn with_sleeper(source: S, sleeper: Z, base_url: impl Into<String>) -> Self {
        Self {
            source,
            sleeper,
            base_url: base_url.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            request_delay: Duration::from_secs(DEFAULT_REQUEST_DELAY_SECS),
        }
    }

    /// Total attempts per chapter (default 3). Values below 1 are raised to 1.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n.max(1);
        self
    }

    /// Pause after each successful chapter (default 2s).
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Fetch one chapter. Always yields exactly one outcome; failures never escape as errors.
    pub fn fetch(&mut self, chapter_num: u32) -> FetchOutcome {
        let url = chapter_url(&self.base_url, chapter_num);
        let attempts = self.max_retries;
        let mut last_err: Option<FetchError> = None;

        for attempt in 0..attempts {
            debug!(chapter = chapter_num, attempt, %url, "fetching chapter");
            match self.try_fetch(&url, chapter_num) {
                Ok(record) => {
                    self.sleeper.sleep(self.request_delay);
                    return FetchOutcome::Success(record);
                }
                Err(e) => {
                    if attempt + 1 < attempts {
                        let delay = backoff_delay(attempt);
                        warn!(
                            chapter = chapter_num,
                            attempt = attempt + 1,
                            kind = %e.kind(),
                            "Attempt {} failed for chapter {}: {}. Retrying in {}s",
                            attempt + 1,
                            chapter_num,
                            e,
                            delay.as_secs()
                        );
                        self.sleeper.sleep(delay);
                    }
                    last_err = Some(e);
                }
            }
        }

        let (kind, reason) = match last_err {
            Some(e) => (e.kind(), e.to_string()),
            None => (FailureKind::Network, "no attempt was made".to_string()),
        };
        error!(
            chapter = chapter_num,
            attempts,
            %kind,
            "Failed to fetch chapter {} after {} attempts: {}",
            chapter_num,
            attempts,
            reason
        );
        FetchOutcome::Failure {
            chapter_num,
            kind,
            reason,
        }
    }

    fn try_fetch(&mut self, url: &str, chapter_num: u32) -> Result<ChapterRecord, FetchError> {
        let html = self.source.get_page(url)?;
        parse_chapter_page(&html, chapter_num, url)
    }
}
