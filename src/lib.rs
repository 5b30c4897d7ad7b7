//! truyen-crawl: fetch a web novel chapter by chapter and pack the chapters into EPUB volumes.

pub mod batch;
pub mod cli;
pub mod config;
pub mod epub;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use crate::batch::{BatchAccumulator, Packager};
pub use crate::epub::{write_epub, BookInfo, EpubError, EpubPackager};
pub use crate::model::{ChapterRecord, FailureKind, FetchOutcome};
pub use crate::pipeline::{crawl, range_len, CrawlSummary};
pub use crate::progress::ProgressSink;
pub use crate::scraper::{ChapterFetcher, FetchError, PageClient, PageSource, Sleeper, ThreadSleeper};
