// Progress aggregation and the overwriting status line
//
// One `ProgressTracker` lives for the whole batch. Each item gets an
// `ItemProgress` handle that forwards engine callbacks and remembers whether
// the item has already been counted, so `finished_files` moves exactly once
// per item no matter who reports completion first.

use colored::Colorize;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::models::MediaItem;
use super::traits::{ProgressHooks, TransferProgress};

const BAR_WIDTH: usize = 40;
const MIB: f64 = 1024.0 * 1024.0;
const MIN_SAMPLE_SECS: f64 = 1e-3;

/// Shared counters for a batch
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub total_files: usize,
    pub finished_files: usize,
    pub current_file: String,
    pub start_time: Instant,
    pub last_bytes_seen: u64,
    pub last_sample_time: Instant,
    /// Bytes per second measured between the last two samples
    pub instantaneous_rate: f64,
}

impl ProgressState {
    pub fn new(total_files: usize) -> Self {
        let now = Instant::now();
        Self {
            total_files,
            finished_files: 0,
            current_file: String::new(),
            start_time: now,
            last_bytes_seen: 0,
            last_sample_time: now,
            instantaneous_rate: 0.0,
        }
    }

    /// Fold one sample into the rate estimate.
    pub fn record_sample(&mut self, downloaded: u64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_sample_time).as_secs_f64();
        let delta = downloaded.saturating_sub(self.last_bytes_seen) as f64;
        self.instantaneous_rate = delta / elapsed.max(MIN_SAMPLE_SECS);
        self.last_bytes_seen = downloaded;
        self.last_sample_time = now;
    }

    pub fn files_left(&self) -> usize {
        self.total_files.saturating_sub(self.finished_files)
    }
}

/// Everything the status line shows, captured at one instant
#[derive(Debug, Clone)]
pub struct StatusView {
    pub progress: TransferProgress,
    pub file_name: String,
    pub network_rate: f64,
    pub elapsed_secs: f64,
    pub total_files: usize,
    pub finished_files: usize,
    pub files_left: usize,
}

/// Render the status line body (no carriage return, no colors).
pub fn render_status(view: &StatusView) -> String {
    let downloaded = view.progress.downloaded_bytes;
    let total = view.progress.total_bytes.unwrap_or(0);
    let percent = if total > 0 {
        (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let filled = ((BAR_WIDTH as f64 * percent / 100.0) as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "█".repeat(filled), "-".repeat(BAR_WIDTH - filled));

    let speed_kib = view.progress.speed.unwrap_or(0.0) / 1024.0;
    let eta = view
        .progress
        .eta
        .map_or_else(|| "N/A".to_string(), |s| s.to_string());

    let stats = format!(
        "Speed: {:.2}KB/s | Net: {:.2}MB/s | ETA: {}s | Elapsed: {:.1}s | Left: {} | Downloaded: {}/{}",
        speed_kib,
        view.network_rate / MIB,
        eta,
        view.elapsed_secs,
        view.files_left,
        view.finished_files,
        view.total_files,
    );

    let head = format!(
        "[{}] {:6.2}% | {:6.2}MB / {:6.2}MB",
        bar,
        percent,
        downloaded as f64 / MIB,
        total as f64 / MIB,
    );

    if view.total_files > 1 {
        let current = (view.finished_files + 1).min(view.total_files);
        format!(
            "{} | File {}/{} ({}) | {}",
            head, current, view.total_files, view.file_name, stats
        )
    } else {
        format!("{} | {}", head, stats)
    }
}

struct Console {
    out: Box<dyn Write + Send>,
    /// A status line is on screen without a trailing newline
    line_open: bool,
}

/// Batch-wide progress aggregator
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
    console: Mutex<Console>,
    colorize: bool,
}

impl ProgressTracker {
    pub fn new(total_files: usize) -> Arc<Self> {
        Arc::new(Self::build(total_files, Box::new(io::stdout()), true))
    }

    /// Tracker writing plain text to `out` (used by tests and non-tty output).
    pub fn with_writer(total_files: usize, out: Box<dyn Write + Send>) -> Arc<Self> {
        Arc::new(Self::build(total_files, out, false))
    }

    fn build(total_files: usize, out: Box<dyn Write + Send>, colorize: bool) -> Self {
        Self {
            state: Mutex::new(ProgressState::new(total_files)),
            console: Mutex::new(Console {
                out,
                line_open: false,
            }),
            colorize,
        }
    }

    /// Per-item handle wired to this tracker
    pub fn item(self: &Arc<Self>, item: &MediaItem) -> ItemProgress {
        ItemProgress {
            tracker: Arc::clone(self),
            label: item.title.clone(),
            counted: AtomicBool::new(false),
        }
    }

    pub fn finished_files(&self) -> usize {
        self.state.lock().finished_files
    }

    pub fn total_files(&self) -> usize {
        self.state.lock().total_files
    }

    /// Print a permanent line, closing any open status line first.
    pub fn println(&self, message: &str) {
        self.emit_line(message, None);
    }

    pub fn print_info(&self, message: &str) {
        self.emit_line(message, Some(Tone::Info));
    }

    pub fn print_warn(&self, message: &str) {
        self.emit_line(message, Some(Tone::Warn));
    }

    pub fn print_error(&self, message: &str) {
        self.emit_line(message, Some(Tone::Error));
    }

    fn emit_line(&self, message: &str, tone: Option<Tone>) {
        self.emit_lines(&[(message, tone)]);
    }

    /// Write consecutive lines under one console lock so other workers
    /// cannot interleave with them.
    fn emit_lines(&self, lines: &[(&str, Option<Tone>)]) {
        let mut console = self.console.lock();
        if console.line_open {
            let _ = writeln!(console.out);
        }
        for (message, tone) in lines {
            let _ = writeln!(console.out, "{}", self.paint(message, *tone));
        }
        let _ = console.out.flush();
        console.line_open = false;
    }

    fn paint(&self, message: &str, tone: Option<Tone>) -> String {
        if !self.colorize {
            return message.to_string();
        }
        match tone {
            None => message.to_string(),
            Some(Tone::Progress) => message.green().to_string(),
            Some(Tone::Info) => message.cyan().to_string(),
            Some(Tone::Warn) => message.yellow().to_string(),
            Some(Tone::Error) => message.red().to_string(),
        }
    }

    fn report_progress(&self, label: &str, progress: &TransferProgress) {
        let view = {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.record_sample(progress.downloaded_bytes, now);
            state.current_file = label.to_string();
            StatusView {
                progress: *progress,
                file_name: state.current_file.clone(),
                network_rate: state.instantaneous_rate,
                elapsed_secs: now.saturating_duration_since(state.start_time).as_secs_f64(),
                total_files: state.total_files,
                finished_files: state.finished_files,
                files_left: state.files_left(),
            }
        };

        let line = self.paint(&render_status(&view), Some(Tone::Progress));
        let mut console = self.console.lock();
        let _ = write!(console.out, "\r{}", line);
        let _ = console.out.flush();
        console.line_open = true;
    }

    /// Count an item as finished unless its flag says it already was.
    fn count(&self, counted: &AtomicBool) -> bool {
        let mut state = self.state.lock();
        if counted.swap(true, Ordering::SeqCst) {
            return false;
        }
        if state.finished_files >= state.total_files {
            tracing::debug!(
                "Finished count already at total ({}), not incrementing",
                state.total_files
            );
            return false;
        }
        state.finished_files += 1;
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Progress,
    Info,
    Warn,
    Error,
}

/// Progress callbacks for a single item
pub struct ItemProgress {
    tracker: Arc<ProgressTracker>,
    label: String,
    counted: AtomicBool,
}

impl ItemProgress {
    /// Fallback bookkeeping for items that never reached `on_finished`
    /// (skipped, failed, no URL). Returns whether this call did the counting.
    pub fn complete(&self) -> bool {
        self.tracker.count(&self.counted)
    }
}

impl ProgressHooks for ItemProgress {
    fn on_progress(&self, progress: &TransferProgress) {
        self.tracker.report_progress(&self.label, progress);
    }

    fn on_finished(&self, final_path: &Path) {
        self.tracker.count(&self.counted);

        let shown = final_path.display();
        let finished = format!("Download finished: {}", shown);
        let saved = std::fs::metadata(final_path)
            .ok()
            .map(|meta| format!("Saved: {} ({:.2} MB)", shown, meta.len() as f64 / MIB));

        let mut lines = vec![(finished.as_str(), Some(Tone::Info))];
        if let Some(saved) = &saved {
            lines.push((saved.as_str(), Some(Tone::Warn)));
        }
        self.tracker.emit_lines(&lines);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    /// Cloneable in-memory writer
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn item(title: &str) -> MediaItem {
        MediaItem::entry(1, json!({ "title": title, "id": "x" }))
    }

    fn view(downloaded: u64, total: Option<u64>, files: (usize, usize)) -> StatusView {
        StatusView {
            progress: TransferProgress {
                downloaded_bytes: downloaded,
                total_bytes: total,
                speed: Some(2048.0),
                eta: Some(7),
            },
            file_name: "clip.mp4".to_string(),
            network_rate: 3.0 * MIB,
            elapsed_secs: 1.25,
            total_files: files.1,
            finished_files: files.0,
            files_left: files.1 - files.0,
        }
    }

    #[test]
    fn test_render_half_done_single_file() {
        let line = render_status(&view(512 * 1024, Some(1024 * 1024), (0, 1)));
        let bar = format!("[{}{}]", "█".repeat(20), "-".repeat(20));
        assert!(line.starts_with(&bar), "{}", line);
        assert!(line.contains(" 50.00%"));
        assert!(line.contains("  0.50MB /   1.00MB"));
        assert!(line.contains("Speed: 2.00KB/s"));
        assert!(line.contains("Net: 3.00MB/s"));
        assert!(line.contains("ETA: 7s"));
        assert!(line.contains("Elapsed: 1.2s") || line.contains("Elapsed: 1.3s"));
        assert!(line.contains("Left: 1 | Downloaded: 0/1"));
        assert!(!line.contains("File "));
    }

    #[test]
    fn test_render_playlist_and_unknown_total() {
        let line = render_status(&view(100, None, (2, 5)));
        assert!(line.starts_with(&format!("[{}]", "-".repeat(BAR_WIDTH))));
        assert!(line.contains("  0.00%"));
        assert!(line.contains("File 3/5 (clip.mp4)"));
        assert!(line.contains("Left: 3 | Downloaded: 2/5"));
    }

    #[test]
    fn test_render_clamps_overshoot() {
        let line = render_status(&view(2000, Some(1000), (0, 1)));
        assert!(line.contains("100.00%"));
        assert!(line.starts_with(&format!("[{}]", "█".repeat(BAR_WIDTH))));
    }

    #[test]
    fn test_rate_sampling() {
        let mut state = ProgressState::new(1);
        let t0 = state.last_sample_time;
        state.record_sample(1_000, t0 + Duration::from_secs(1));
        assert!((state.instantaneous_rate - 1_000.0).abs() < 1e-6);

        state.record_sample(3_000, t0 + Duration::from_secs(3));
        assert!((state.instantaneous_rate - 1_000.0).abs() < 1e-6);

        // Counter reset by the next file must not produce a negative rate
        state.record_sample(10, t0 + Duration::from_secs(4));
        assert_eq!(state.instantaneous_rate, 0.0);
        assert_eq!(state.last_bytes_seen, 10);
    }

    #[test]
    fn test_item_counted_once() {
        let tracker = ProgressTracker::with_writer(2, Box::new(SharedBuf::default()));
        let handle = tracker.item(&item("a"));

        handle.on_finished(Path::new("/nonexistent/a.mp4"));
        handle.on_finished(Path::new("/nonexistent/a.m4a"));
        assert!(!handle.complete());
        assert_eq!(tracker.finished_files(), 1);

        let other = tracker.item(&item("b"));
        assert!(other.complete());
        assert!(!other.complete());
        assert_eq!(tracker.finished_files(), 2);
    }

    #[test]
    fn test_never_exceeds_total() {
        let tracker = ProgressTracker::with_writer(1, Box::new(SharedBuf::default()));
        assert!(tracker.item(&item("a")).complete());
        assert!(!tracker.item(&item("b")).complete());
        assert_eq!(tracker.finished_files(), 1);
    }

    #[test]
    fn test_status_line_overwrites_and_finish_line_is_permanent() {
        let buf = SharedBuf::default();
        let tracker = ProgressTracker::with_writer(1, Box::new(buf.clone()));
        let handle = tracker.item(&item("clip"));

        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join("clip.mp4");
        std::fs::write(&saved, vec![0u8; 1024 * 1024]).unwrap();

        handle.on_progress(&TransferProgress {
            downloaded_bytes: 10,
            total_bytes: Some(100),
            ..Default::default()
        });
        handle.on_finished(&saved);

        let out = buf.contents();
        assert!(out.starts_with("\r["));
        assert!(out.contains(" 10.00%"));
        assert!(out.contains(&format!("\nDownload finished: {}\n", saved.display())));
        assert!(out.contains(&format!("Saved: {} (1.00 MB)\n", saved.display())));
    }

    #[test]
    fn test_finish_lines_stay_together_under_contention() {
        let buf = SharedBuf::default();
        let tracker = ProgressTracker::with_writer(16, Box::new(buf.clone()));
        let dir = tempfile::tempdir().unwrap();

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                let path = dir.path().join(format!("clip{}.mp4", i));
                std::fs::write(&path, b"data").unwrap();
                std::thread::spawn(move || {
                    let handle = tracker.item(&item(&format!("clip{}", i)));
                    for _ in 0..20 {
                        tracker.print_error("noise");
                    }
                    handle.on_finished(&path);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let out = buf.contents();
        let lines: Vec<&str> = out.lines().collect();
        for (pos, line) in lines.iter().enumerate() {
            if let Some(path) = line.strip_prefix("Download finished: ") {
                assert_eq!(lines.get(pos + 1).copied(), Some(format!("Saved: {} (0.00 MB)", path).as_str()));
            }
        }
        assert_eq!(tracker.finished_files(), 8);
    }
}
