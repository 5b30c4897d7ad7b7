//! Optional config file loading and crawl settings. Search order: ./truyen-crawl.toml, then
//! $XDG_CONFIG_HOME/truyen-crawl/config.toml (or ~/.config/truyen-crawl/config.toml).

use crate::epub::{DEFAULT_LANGUAGE, DEFAULT_OUTPUT_DIR, DEFAULT_SLUG, DEFAULT_TITLE};
use crate::scraper::{
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_DELAY_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://truyenyy.app/truyen/bat-dau-muoi-lien-rut-sau-do-vo-dich";
pub const DEFAULT_START_CHAPTER: u32 = 1;
pub const DEFAULT_END_CHAPTER: u32 = 499;
pub const DEFAULT_CHAPTERS_PER_FILE: usize = 500;

const CONFIG_FILE_NAME: &str = "truyen-crawl.toml";
const CONFIG_DIR_NAME: &str = "truyen-crawl";

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct Config {
    /// Novel index URL; chapters live at `{base_url}/chuong-{n}.html`.
    pub base_url: Option<String>,
    pub start_chapter: Option<u32>,
    pub end_chapter: Option<u32>,
    pub chapters_per_file: Option<usize>,
    /// Attempts per chapter, including the first.
    pub max_retries: Option<u32>,
    pub output_dir: Option<PathBuf>,
    /// File name stem; books are written as `{slug}-{book_num}.epub`.
    pub slug: Option<String>,
    /// Book title; each file is titled `{title} - Tập {book_num}`.
    pub title: Option<String>,
    pub language: Option<String>,
    pub user_agent: Option<String>,
    /// Pause after each successfully fetched chapter.
    pub request_delay_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// Search order: (1) ./truyen-crawl.toml, (2) $XDG_CONFIG_HOME/truyen-crawl/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join(CONFIG_FILE_NAME)];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join(CONFIG_DIR_NAME).join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub base_url: String,
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub chapters_per_file: usize,
    pub max_retries: u32,
    pub output_dir: PathBuf,
    pub slug: String,
    pub title: String,
    pub language: String,
    pub user_agent: String,
    pub request_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            start_chapter: DEFAULT_START_CHAPTER,
            end_chapter: DEFAULT_END_CHAPTER,
            chapters_per_file: DEFAULT_CHAPTERS_PER_FILE,
            max_retries: DEFAULT_MAX_RETRIES,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            slug: DEFAULT_SLUG.to_string(),
            title: DEFAULT_TITLE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay_secs: DEFAULT_REQUEST_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CrawlSettings {
    /// Overlay keys present in `config` onto these settings.
    pub fn apply_config(&mut self, config: &Config) {
        if let Some(v) = &config.base_url {
            self.base_url = v.clone();
        }
        if let Some(v) = config.start_chapter {
            self.start_chapter = v;
        }
        if let Some(v) = config.end_chapter {
            self.end_chapter = v;
        }
        if let Some(v) = config.chapters_per_file {
            self.chapters_per_file = v;
        }
        if let Some(v) = config.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = &config.output_dir {
            self.output_dir = v.clone();
        }
        if let Some(v) = &config.slug {
            self.slug = v.clone();
        }
        if let Some(v) = &config.title {
            self.title = v.clone();
        }
        if let Some(v) = &config.language {
            self.language = v.clone();
        }
        if let Some(v) = &config.user_agent {
            self.user_agent = v.clone();
        }
        if let Some(v) = config.request_delay_secs {
            self.request_delay_secs = v;
        }
        if let Some(v) = config.timeout_secs {
            self.timeout_secs = v;
        }
    }

    /// Check the settings before any network activity. Returns a user-facing message on error.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("base_url must not be empty.".to_string());
        }
        if self.start_chapter == 0 {
            return Err("start_chapter must be at least 1.".to_string());
        }
        if self.start_chapter > self.end_chapter {
            return Err(format!(
                "start_chapter ({}) must be <= end_chapter ({}).",
                self.start_chapter, self.end_chapter
            ));
        }
        if self.chapters_per_file == 0 {
            return Err("chapters_per_file must be at least 1.".to_string());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1.".to_string());
        }
        if self.slug.trim().is_empty() {
            return Err("slug must not be empty.".to_string());
        }
        Ok(())
    }
}
