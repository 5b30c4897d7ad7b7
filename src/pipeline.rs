//! Driver: walks the chapter range in ascending order, fetching each chapter and feeding the
//! batch accumulator. Fetch failures are logged and skipped; packaging failures end the run.

use crate::batch::{BatchAccumulator, Packager};
use crate::epub::EpubError;
use crate::scraper::{ChapterFetcher, PageSource, Sleeper};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use tracing::{debug, info};

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub attempted: u64,
    pub fetched: u64,
    /// Chapters dropped after exhausting retries, ascending.
    pub failed: Vec<u32>,
    /// Written books in book-number order.
    pub books: Vec<PathBuf>,
}

/// Number of chapters in an inclusive range. Counted in u64 so `0..=u32::MAX` fits.
pub fn range_len(range: &RangeInclusive<u32>) -> u64 {
    if range.is_empty() {
        0
    } else {
        u64::from(*range.end()) - u64::from(*range.start()) + 1
    }
}

/// Number of books a range yields if every chapter succeeds.
pub fn planned_book_count(range: &RangeInclusive<u32>, chapters_per_file: usize) -> u64 {
    range_len(range).div_ceil(chapters_per_file.max(1) as u64)
}

/// Fetch every chapter in `range` and package them in batches.
///
/// `progress` is called after each chapter with (chapters done, total).
pub fn crawl<S, Z, P>(
    fetcher: &mut ChapterFetcher<S, Z>,
    mut accumulator: BatchAccumulator<P>,
    range: RangeInclusive<u32>,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<CrawlSummary, EpubError>
where
    S: PageSource,
    Z: Sleeper,
    P: Packager,
{
    let total = range_len(&range);
    let mut summary = CrawlSummary::default();

    for chapter_num in range {
        summary.attempted += 1;
        let outcome = fetcher.fetch(chapter_num);
        if outcome.is_success() {
            summary.fetched += 1;
            debug!(chapter = chapter_num, "Fetched chapter {}", chapter_num);
        } else {
            summary.failed.push(chapter_num);
        }
        if let Some(path) = accumulator.accumulate(outcome)? {
            debug!(path = %path.display(), "batch flushed");
        }
        if let Some(p) = progress {
            p(summary.attempted, total);
        }
    }

    summary.books = accumulator.finish()?;
    info!(
        attempted = summary.attempted,
        fetched = summary.fetched,
        failed = summary.failed.len(),
        books = summary.books.len(),
        "Crawl finished"
    );
    Ok(summary)
}
