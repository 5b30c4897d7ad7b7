//! Data model shared by the fetcher, the batch accumulator and the EPUB writer.

use std::fmt;

/// One fetched chapter: number on the site, display title, and normalized plain text.
///
/// `content` holds no markup; lines are separated by a single `\n` and none are blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRecord {
    pub chapter_num: u32,
    pub title: String,
    pub content: String,
}

impl ChapterRecord {
    pub fn new(chapter_num: u32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chapter_num,
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Category of a fetch failure, so callers can tell transport problems from page-shape problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection, timeout, non-2xx status, or unreadable body.
    Network,
    /// Page arrived but the heading or content container was missing.
    Parse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => f.write_str("network"),
            FailureKind::Parse => f.write_str("parse"),
        }
    }
}

/// Result of fetching one chapter after all retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(ChapterRecord),
    Failure {
        chapter_num: u32,
        kind: FailureKind,
        reason: String,
    },
}

impl FetchOutcome {
    pub fn chapter_num(&self) -> u32 {
        match self {
            FetchOutcome::Success(record) => record.chapter_num,
            FetchOutcome::Failure { chapter_num, .. } => *chapter_num,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// The fetched record, dropping failures.
    pub fn into_record(self) -> Option<ChapterRecord> {
        match self {
            FetchOutcome::Success(record) => Some(record),
            FetchOutcome::Failure { .. } => None,
        }
    }
}
