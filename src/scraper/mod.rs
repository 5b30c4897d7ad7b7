//! Chapter scraping: HTTP client, page parsing, text normalization, and retrying fetcher.

mod client;
mod error;
mod fetcher;
pub mod normalize;

pub use client::{
    PageClient, PageClientBuilder, PageSource, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
pub use error::FetchError;
pub use fetcher::{
    backoff_delay, chapter_url, parse_chapter_page, ChapterFetcher, Sleeper, ThreadSleeper,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_DELAY_SECS,
};
