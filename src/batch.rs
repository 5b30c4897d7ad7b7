//! Groups fetched chapters into fixed-size batches and hands each full batch to a packager.

use crate::epub::EpubError;
use crate::model::{ChapterRecord, FetchOutcome};
use std::path::PathBuf;

/// Turns one batch into one output file. Implemented by [EpubPackager](crate::epub::EpubPackager).
pub trait Packager {
    /// Package `batch` as book `book_num` and return the written path.
    fn package(&mut self, batch: &[ChapterRecord], book_num: u32) -> Result<PathBuf, EpubError>;
}

impl<T: Packager + ?Sized> Packager for &mut T {
    fn package(&mut self, batch: &[ChapterRecord], book_num: u32) -> Result<PathBuf, EpubError> {
        (**self).package(batch, book_num)
    }
}

/// Buffer of successful chapters plus the next book number.
///
/// Book numbers start at 1 and advance by exactly one per flush.
pub struct BatchAccumulator<P> {
    packager: P,
    chapters_per_file: usize,
    buffer: Vec<ChapterRecord>,
    next_book_num: u32,
    written: Vec<PathBuf>,
}

impl<P: Packager> BatchAccumulator<P> {
    /// `chapters_per_file` below 1 is treated as 1.
    pub fn new(packager: P, chapters_per_file: usize) -> Self {
        let chapters_per_file = chapters_per_file.max(1);
        Self {
            packager,
            chapters_per_file,
            buffer: Vec::with_capacity(chapters_per_file.min(1024)),
            next_book_num: 1,
            written: Vec::new(),
        }
    }

    /// Feed one outcome. Failures are ignored; a full buffer is flushed immediately.
    ///
    /// Returns the written path when this call triggered a flush.
    pub fn accumulate(&mut self, outcome: FetchOutcome) -> Result<Option<PathBuf>, EpubError> {
        match outcome.into_record() {
            Some(record) => self.push(record),
            None => Ok(None),
        }
    }

    pub fn push(&mut self, record: ChapterRecord) -> Result<Option<PathBuf>, EpubError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.chapters_per_file {
            return self.flush().map(Some);
        }
        Ok(None)
    }

    /// Flush the partial final batch, if any, and return every written path in order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>, EpubError> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        Ok(self.written)
    }

    fn flush(&mut self) -> Result<PathBuf, EpubError> {
        let batch = std::mem::take(&mut self.buffer);
        let path = self.packager.package(&batch, self.next_book_num)?;
        self.next_book_num += 1;
        self.written.push(path.clone());
        Ok(path)
    }
}
