//! CLI parsing and orchestration. Resolves settings, runs the crawl, maps errors to exit codes.

use crate::batch::BatchAccumulator;
use crate::config::{self, Config, CrawlSettings};
use crate::epub::{EpubError, EpubPackager};
use crate::pipeline::{crawl, planned_book_count};
use crate::progress::{progress_bar, ProgressSink};
use crate::scraper::{ChapterFetcher, PageClient};
use clap::{ArgAction, Parser};
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Top-level error carrying an exit code. Chapter fetch failures never reach this type.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{0}")]
    Epub(#[from] EpubError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Client(_) => 2,
            CliRunError::Epub(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "truyen-crawl")]
#[command(about = "Crawl a truyenyy novel chapter by chapter and pack the chapters into EPUB volumes")]
#[command(
    after_help = "Config file keys (base_url, start_chapter, end_chapter, chapters_per_file, max_retries, output_dir, slug, title, language, user_agent, request_delay_secs, timeout_secs) are read from ./truyen-crawl.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Novel URL; chapter N is fetched from {base_url}/chuong-N.html.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Chapter range to crawl (inclusive), e.g. 1-499 or 2000-2515.
    #[arg(long, value_parser = parse_chapter_range)]
    pub chapters: Option<(u32, u32)>,

    /// Chapters per EPUB file.
    #[arg(long)]
    pub per_file: Option<usize>,

    /// Attempts per chapter before it is skipped (default 3).
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Output directory (default: ./output). Created if missing.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// File name stem; books are written as {slug}-{n}.epub.
    #[arg(long)]
    pub slug: Option<String>,

    /// Book title; each file is titled "{title} - Tập {n}".
    #[arg(long)]
    pub title: Option<String>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Pause after each fetched chapter in seconds (overrides config; default 2).
    #[arg(long)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Errors only; no progress bar.
    #[arg(short, long)]
    pub quiet: bool,

    /// More log output (-v debug, -vv trace) and full error chains.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print resolved settings and the files a full run would write, without fetching.
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_chapter_range(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim();
    let (from_str, to_str) = s.split_once('-').ok_or_else(|| {
        format!(
            "Invalid --chapters: expected 'from-to' (e.g. 1-10), got '{}'",
            s
        )
    })?;
    let from_str = from_str.trim();
    let to_str = to_str.trim();
    let from: u32 = from_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid start chapter number",
            from_str
        )
    })?;
    let to: u32 = to_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid end chapter number",
            to_str
        )
    })?;
    if from == 0 {
        return Err("Invalid --chapters: chapters are numbered from 1".to_string());
    }
    if from > to {
        return Err(format!(
            "Invalid --chapters: start ({}) must be <= end ({})",
            from, to
        ));
    }
    Ok((from, to))
}

/// Defaults, then config file, then CLI flags.
fn resolve_settings(args: &Args, config: Option<&Config>) -> CrawlSettings {
    let mut settings = CrawlSettings::default();
    if let Some(c) = config {
        settings.apply_config(c);
    }
    if let Some(v) = &args.base_url {
        settings.base_url = v.clone();
    }
    if let Some((from, to)) = args.chapters {
        settings.start_chapter = from;
        settings.end_chapter = to;
    }
    if let Some(v) = args.per_file {
        settings.chapters_per_file = v;
    }
    if let Some(v) = args.max_retries {
        settings.max_retries = v;
    }
    if let Some(v) = &args.output_dir {
        settings.output_dir = v.clone();
    }
    if let Some(v) = &args.slug {
        settings.slug = v.clone();
    }
    if let Some(v) = &args.title {
        settings.title = v.clone();
    }
    if let Some(v) = &args.user_agent {
        settings.user_agent = v.clone();
    }
    if let Some(v) = args.delay {
        settings.request_delay_secs = v;
    }
    if let Some(v) = args.timeout {
        settings.timeout_secs = v;
    }
    settings
}

fn packager_for(settings: &CrawlSettings) -> EpubPackager {
    EpubPackager::new(&settings.output_dir, &settings.slug, &settings.title)
        .language(&settings.language)
}

/// Chapter number shown after `done` chapters of a run starting at `start`.
fn current_chapter(start: u32, done: u64) -> u64 {
    u64::from(start) + done.saturating_sub(1)
}

fn print_dry_run(settings: &CrawlSettings) {
    let range = settings.start_chapter..=settings.end_chapter;
    let books = planned_book_count(&range, settings.chapters_per_file);
    let packager = packager_for(settings);
    eprintln!("Base URL: {}", settings.base_url);
    eprintln!(
        "Chapters: {}-{} ({} per file, {} attempts each)",
        settings.start_chapter,
        settings.end_chapter,
        settings.chapters_per_file,
        settings.max_retries
    );
    for book_num in 1..=books as u32 {
        eprintln!("Output: {}", packager.book_path(book_num).display());
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
///
/// `log_sink` is the writer the tracing subscriber was built with; the progress bar is attached
/// to it for the duration of the crawl.
pub fn run<F>(args: &Args, log_sink: &ProgressSink<F>) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let settings = resolve_settings(args, config.as_ref());
    settings.validate().map_err(CliRunError::InvalidInput)?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    let client = PageClient::builder()
        .user_agent(settings.user_agent.clone())
        .timeout_secs(settings.timeout_secs)
        .build()
        .map_err(CliRunError::Client)?;
    let mut fetcher = ChapterFetcher::new(client, settings.base_url.clone())
        .max_retries(settings.max_retries)
        .request_delay(Duration::from_secs(settings.request_delay_secs));
    let accumulator = BatchAccumulator::new(packager_for(&settings), settings.chapters_per_file);

    info!(
        base_url = %settings.base_url,
        start = settings.start_chapter,
        end = settings.end_chapter,
        per_file = settings.chapters_per_file,
        "Starting crawl"
    );

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |done: u64, total: u64| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = progress_bar(total);
            log_sink.attach(&bar);
            bar
        });
        pb.set_position(done);
        pb.set_message(format!("Chapter {}", current_chapter(settings.start_chapter, done)));
    };
    let progress: Option<&dyn Fn(u64, u64)> = if args.quiet { None } else { Some(&progress_cb) };

    let result = crawl(
        &mut fetcher,
        accumulator,
        settings.start_chapter..=settings.end_chapter,
        progress,
    );

    if let Some(pb) = progress_state.borrow_mut().take() {
        log_sink.detach();
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    let summary = result?;
    if !summary.failed.is_empty() {
        warn!(
            "Skipped {} chapter(s) after {} attempts: {:?}",
            summary.failed.len(),
            settings.max_retries,
            summary.failed
        );
    }
    if summary.books.is_empty() {
        warn!("No chapters were fetched; nothing written.");
    }
    Ok(())
}
