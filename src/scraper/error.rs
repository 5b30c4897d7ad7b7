//! Error type for one chapter fetch attempt. Every variant is recoverable by retrying.

use crate::model::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    // Transport
    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    // Page shape
    #[error("Chapter {chapter_num}: no heading matching '{selector}' at {url}")]
    MissingHeading {
        chapter_num: u32,
        selector: String,
        url: String,
    },

    #[error("Chapter {chapter_num}: no content container matching '{selector}' at {url}")]
    MissingContent {
        chapter_num: u32,
        selector: String,
        url: String,
    },

    #[error("Invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network { .. }
            | FetchError::HttpStatus { .. }
            | FetchError::BodyRead { .. } => FailureKind::Network,
            FetchError::MissingHeading { .. }
            | FetchError::MissingContent { .. }
            | FetchError::Selector { .. } => FailureKind::Parse,
        }
    }
}
