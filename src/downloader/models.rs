// Common data models for downloader

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use super::errors::DownloadError;

/// What the user wants out of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaMode {
    #[default]
    Video,
    Audio,
}

impl fmt::Display for MediaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Requested quality ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Quality {
    #[default]
    Best,
    #[value(name = "1080")]
    P1080,
    #[value(name = "720")]
    P720,
    #[value(name = "480")]
    P480,
    #[value(name = "360")]
    P360,
    Low,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Self::Best,
        Self::P1080,
        Self::P720,
        Self::P480,
        Self::P360,
        Self::Low,
    ];

    /// Height limit in pixels, `None` for best/low
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
            Self::Best | Self::Low => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Low => write!(f, "low"),
            other => write!(f, "{}p", other.max_height().unwrap_or_default()),
        }
    }
}

/// One unit of work: a single video or one playlist entry.
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// 1-based position within the batch, `None` for a single video
    pub index: Option<usize>,
    pub title: String,
    /// Raw metadata as returned by the engine (possibly a flat reference)
    pub metadata: Value,
}

impl MediaItem {
    pub fn single(metadata: Value) -> Self {
        Self {
            index: None,
            title: title_of(&metadata),
            metadata,
        }
    }

    pub fn entry(index: usize, metadata: Value) -> Self {
        Self {
            index: Some(index),
            title: title_of(&metadata),
            metadata,
        }
    }

    /// Playable URL: webpage URL, then generic URL, then a watch URL built from the id.
    pub fn source_url(&self) -> Option<String> {
        let non_empty = |key: &str| {
            self.metadata[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        non_empty("webpage_url")
            .or_else(|| non_empty("url"))
            .or_else(|| non_empty("id").map(|id| format!("https://www.youtube.com/watch?v={}", id)))
    }

    /// Flat listings return sparse references that must be fetched again before use.
    pub fn needs_refetch(&self) -> bool {
        let missing = |key: &str| self.metadata[key].as_str().map_or(true, |s| s.is_empty());
        let unresolved = matches!(
            self.metadata["_type"].as_str(),
            Some("url") | Some("url_transparent")
        );
        missing("title") || missing("id") || unresolved
    }

    /// Label used in console output
    pub fn label(&self) -> String {
        match self.index {
            Some(idx) => format!("#{} {}", idx, self.title),
            None => self.title.clone(),
        }
    }
}

fn title_of(metadata: &Value) -> String {
    metadata["title"]
        .as_str()
        .filter(|t| !t.is_empty())
        .unwrap_or("Unknown Title")
        .to_string()
}

/// Where an item is expected to land on disk. Recomputed for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub path: PathBuf,
    /// Normalized comparison key of the file name
    pub key: String,
    pub preserve_index: bool,
}

/// Download options shared by every item of a run
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub mode: MediaMode,
    pub quality: Quality,
    pub convert_mp3: bool,
    pub subtitles: bool,
    pub auto_subtitles: bool,
    pub sub_langs: Vec<String>,
    pub embed_subtitles: bool,
    pub force: bool,
    /// Whether ffmpeg is available for merging/conversion
    pub has_transcoder: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            mode: MediaMode::Video,
            quality: Quality::Best,
            convert_mp3: false,
            subtitles: false,
            auto_subtitles: false,
            sub_langs: Vec::new(),
            embed_subtitles: false,
            force: false,
            has_transcoder: true,
        }
    }
}

/// Options for a metadata fetch
#[derive(Debug, Clone)]
pub struct InfoRequest {
    /// Request a flat playlist listing
    pub flat: bool,
    /// Socket timeout passed to the engine
    pub socket_timeout: u32,
}

impl Default for InfoRequest {
    fn default() -> Self {
        Self {
            flat: true,
            socket_timeout: 30,
        }
    }
}

/// Everything the engine needs to transfer one item
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub output_dir: PathBuf,
    /// Output template relative to `output_dir`, e.g. `%(title)s_3.%(ext)s`
    pub template: String,
    /// Format selector
    pub format: String,
    /// Post-processing and subtitle arguments
    pub extra_args: Vec<String>,
}

/// Result of one Download Unit invocation
#[derive(Debug, Clone)]
pub enum Outcome {
    Downloaded,
    Skipped { existing: PathBuf },
    Failed(DownloadError),
}

impl Outcome {
    pub fn is_downloaded(&self) -> bool {
        matches!(self, Self::Downloaded)
    }
}
