// Top-level flow: settings, tool check, info fetch, batch, summary

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Args;
use crate::config::{is_interactive, InquirePrompter, NoPrompt, Prompter, Settings};
use crate::console;
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::utils::{format_duration, wait_with_deadline, Waited};
use crate::downloader::{
    run_batch, BatchReport, DownloadError, Downloader, InfoRequest, MediaEngine, MediaItem,
    ProgressTracker,
};
use crate::error::{AppError, Result};
use crate::ytdlp::YtDlp;

/// What the top-level metadata says about a URL
#[derive(Debug, Clone, PartialEq)]
pub struct InfoSummary {
    pub title: String,
    pub duration_secs: Option<u64>,
    /// Playlist type and entry count
    pub playlist: Option<(String, usize)>,
}

impl InfoSummary {
    pub fn from_info(info: &Value) -> Self {
        let title = info["title"]
            .as_str()
            .filter(|t| !t.is_empty())
            .unwrap_or("Unknown Title")
            .to_string();
        let duration_secs = info["duration"]
            .as_f64()
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d as u64);
        let playlist = is_playlist(info).then(|| {
            let kind = info["playlist_type"]
                .as_str()
                .unwrap_or("Unknown")
                .to_string();
            let count = info["entries"].as_array().map_or(0, Vec::len);
            (kind, count)
        });
        Self {
            title,
            duration_secs,
            playlist,
        }
    }
}

fn is_playlist(info: &Value) -> bool {
    info["_type"].as_str() == Some("playlist") || info.get("entries").is_some()
}

/// One work item per playlist entry (1-based), or a single item.
pub fn build_items(info: &Value) -> Vec<MediaItem> {
    if !is_playlist(info) {
        return vec![MediaItem::single(info.clone())];
    }
    info["entries"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .map(|(i, entry)| MediaItem::entry(i + 1, entry.clone()))
                .collect()
        })
        .unwrap_or_default()
}

pub async fn run(args: Args) -> Result<BatchReport> {
    if !args.quiet {
        console::print_banner();
    }

    let interactive = is_interactive(&args);
    let mut prompter: Box<dyn Prompter + Send> = if interactive {
        Box::new(InquirePrompter)
    } else {
        Box::new(NoPrompt)
    };

    let settings = Settings::resolve(&args, prompter.as_mut(), interactive)?;
    std::fs::create_dir_all(&settings.output_dir)?;
    tracing::debug!("Settings: {:?}", settings);

    let manager = ToolManager::new().with_ytdlp_path(settings.ytdlp.clone());
    let detector = manager.clone();
    let (ytdlp, ffmpeg) = tokio::task::spawn_blocking(move || {
        (
            detector.get_tool_info(ToolType::YtDlp),
            detector.get_tool_info(ToolType::Ffmpeg),
        )
    })
    .await
    .map_err(|e| AppError::Io(std::io::Error::other(e)))?;

    if !ytdlp.is_available {
        return Err(DownloadError::ToolNotFound(format!(
            "yt-dlp is required; {}",
            ToolType::YtDlp.install_hint()
        ))
        .into());
    }
    tracing::info!(
        "Using {} {}",
        ytdlp.path.as_deref().unwrap_or("yt-dlp"),
        ytdlp.version.as_deref().unwrap_or("")
    );
    if !ffmpeg.is_available {
        tracing::warn!("ffmpeg not found; {}", ToolType::Ffmpeg.install_hint());
    }

    let engine = Arc::new(
        YtDlp::new(manager.ytdlp_command()).with_socket_timeout(settings.socket_timeout),
    );
    let unit = Downloader::new(engine.clone(), settings.download_options(ffmpeg.is_available))
        .with_socket_timeout(settings.socket_timeout);
    for downgrade in &unit.plan().downgrades {
        tracing::warn!("{}", downgrade);
        console::warn(downgrade);
    }

    let info = fetch_top_level(engine, &settings, prompter.as_mut()).await?;

    let summary = InfoSummary::from_info(&info);
    println!();
    console::info(&format!("Title: {}", summary.title));
    if let Some(secs) = summary.duration_secs {
        console::info(&format!("Duration: {}", format_duration(secs)));
    }
    if let Some((kind, count)) = &summary.playlist {
        console::notice(&format!(
            "\nPlaylist detected: {}. {} video(s) will be downloaded as {} ({}).",
            kind, count, settings.mode, settings.quality
        ));
    }

    let items = build_items(&info);
    let concurrency = if summary.playlist.is_some() {
        settings.concurrency
    } else {
        1
    };
    let tracker = ProgressTracker::new(items.len());
    let report = run_batch(items, concurrency, Arc::new(unit), tracker.clone()).await;

    print_summary(&report, &tracker);
    Ok(report)
}

/// Fetch metadata for the user's URL, asking whether to keep waiting each
/// time the deadline passes.
async fn fetch_top_level(
    engine: Arc<dyn MediaEngine>,
    settings: &Settings,
    prompter: &mut (dyn Prompter + Send),
) -> Result<Value> {
    let request = InfoRequest {
        flat: settings.flat,
        socket_timeout: settings.socket_timeout,
    };
    let url = settings.url.clone();
    let mut handle = tokio::spawn(async move { engine.fetch_info(&url, &request).await });

    let pb = console::spinner("Fetching video information... Please wait.");
    let limit = settings.info_timeout;
    let mut waited = Duration::ZERO;

    let fetched = loop {
        match wait_with_deadline(&mut handle, limit).await {
            Ok(Waited::Done(result)) => break result,
            Ok(Waited::Expired) => {
                waited += limit;
                let timeout = DownloadError::InfoFetchTimeout(waited.as_secs());
                tracing::warn!("{}", timeout);
                if !settings.interactive {
                    handle.abort();
                    pb.finish_and_clear();
                    return Err(timeout.into());
                }
                let options = vec!["Keep waiting".to_string(), "Give up".to_string()];
                let message = format!("No answer after {}s. What now?", waited.as_secs());
                let choice = pb.suspend(|| prompter.select(&message, &options, 0));
                match choice {
                    Ok(0) => continue,
                    Ok(_) => {
                        handle.abort();
                        pb.finish_and_clear();
                        return Err(timeout.into());
                    }
                    Err(e) => {
                        handle.abort();
                        pb.finish_and_clear();
                        return Err(e);
                    }
                }
            }
            Err(e) => break Err(DownloadError::InfoFetch(e.to_string())),
        }
    };
    pb.finish_and_clear();

    fetched.map_err(|e| {
        tracing::debug!("Info fetch failed: {}", e);
        AppError::Download(e)
    })
}

fn print_summary(report: &BatchReport, tracker: &ProgressTracker) {
    tracker.println("");
    tracker.print_info(&format!(
        "Done: {} downloaded, {} skipped, {} failed ({}/{} files accounted for)",
        report.downloaded(),
        report.skipped(),
        report.failed(),
        tracker.finished_files(),
        tracker.total_files()
    ));
    for (item, err) in report.failures() {
        tracker.print_error(&format!("  - {}: {}", item.title, err));
    }
}
