use clap::Parser;
use std::path::PathBuf;

use crate::downloader::Quality;

#[derive(Parser, Debug, Clone)]
#[command(name = "tubegrab", author, version, about = "Download videos, audio and playlists with yt-dlp", long_about = None)]
pub struct Args {
    /// Video or playlist URL (asked for when omitted)
    pub url: Option<String>,

    /// Download audio only
    #[arg(long, conflicts_with = "video")]
    pub audio: bool,

    /// Download video (default)
    #[arg(long)]
    pub video: bool,

    /// Quality ceiling
    #[arg(long, value_enum)]
    pub quality: Option<Quality>,

    /// Convert audio downloads to mp3 (needs ffmpeg)
    #[arg(long)]
    pub convert_mp3: bool,

    /// Download even when a matching file already exists
    #[arg(long)]
    pub force: bool,

    /// Write subtitles
    #[arg(long)]
    pub subtitles: bool,

    /// Write automatically generated subtitles
    #[arg(long)]
    pub autosub: bool,

    /// Subtitle languages, comma separated (e.g. en,de)
    #[arg(long, value_name = "LANGS")]
    pub sub_lang: Option<String>,

    /// Embed subtitles into the video file (needs ffmpeg)
    #[arg(long)]
    pub embed_subtitles: bool,

    /// Download folder
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Seconds to wait for media info before asking what to do
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub info_timeout: u64,

    /// Fetch full metadata for every playlist entry up front
    #[arg(long)]
    pub no_extract_flat: bool,

    /// Number of playlist entries downloaded in parallel
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Network socket timeout passed to yt-dlp, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub socket_timeout: u32,

    /// Path to the yt-dlp binary
    #[arg(long, env = "TUBEGRAB_YTDLP", value_name = "PATH")]
    pub ytdlp: Option<String>,

    /// Never prompt; use flags and defaults only
    #[arg(long)]
    pub non_interactive: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors and skip the banner
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        Ok(_) => Err("concurrency must be at least 1".to_string()),
        Err(e) => Err(format!("invalid number: {}", e)),
    }
}
