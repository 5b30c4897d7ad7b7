//! Terminal progress bar and the log writer that shares the terminal with it.
//!
//! Log lines go through [ProgressSink]. While a bar is attached, each write is wrapped in
//! `ProgressBar::suspend` so the bar is cleared, the line printed, and the bar redrawn below it.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;

/// `MakeWriter` for the tracing subscriber. Clones share the attached bar.
#[derive(Clone)]
pub struct ProgressSink<F = fn() -> io::Stderr> {
    bar: Arc<Mutex<Option<ProgressBar>>>,
    make_out: F,
}

impl ProgressSink {
    /// Sink writing to stderr.
    pub fn stderr() -> Self {
        Self::with_output(io::stderr)
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl<F> ProgressSink<F> {
    pub fn with_output(make_out: F) -> Self {
        Self {
            bar: Arc::new(Mutex::new(None)),
            make_out,
        }
    }

    /// Route subsequent log writes around `bar`.
    pub fn attach(&self, bar: &ProgressBar) {
        *self.slot() = Some(bar.clone());
    }

    /// Stop suspending; returns the bar that was attached.
    pub fn detach(&self) -> Option<ProgressBar> {
        self.slot().take()
    }

    pub fn is_attached(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<'a, F, W> MakeWriter<'a> for ProgressSink<F>
where
    F: Fn() -> W + 'a,
    W: Write,
{
    type Writer = SinkWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            bar: self.slot().clone(),
            out: (self.make_out)(),
        }
    }
}

/// One log event's writer; holds the bar that was attached when the event started.
pub struct SinkWriter<W> {
    bar: Option<ProgressBar>,
    out: W,
}

impl<W: Write> Write for SinkWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let out = &mut self.out;
        match &self.bar {
            Some(bar) => bar.suspend(|| out.write(buf)),
            None => out.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let out = &mut self.out;
        match &self.bar {
            Some(bar) => bar.suspend(|| out.write_all(buf)),
            None => out.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Chapter progress bar for a run of `total` chapters.
pub fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
        .map(|s| {
            s.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ ")
        });
    match style {
        Ok(s) => bar.set_style(s),
        Err(e) => warn!("progress bar template rejected: {}", e),
    }
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// In-memory log target for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedLogs {
    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Run `f` with an INFO-level subscriber writing into a fresh buffer through `sink`.
    pub(crate) fn run<F, T>(
        sink: impl Fn(CapturedLogs) -> ProgressSink<F>,
        f: impl FnOnce() -> T,
    ) -> (T, String)
    where
        F: Fn() -> CapturedLogs + Send + Sync + 'static,
    {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(sink(logs.clone()))
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, logs.text())
    }
}

#[cfg(test)]
impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captures log output from `f` through a plain [ProgressSink].
#[cfg(test)]
pub(crate) fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    CapturedLogs::run(|logs| ProgressSink::with_output(move || logs.clone()), f)
}
