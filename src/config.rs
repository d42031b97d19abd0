// Run settings - flags first, then prompts, then defaults

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;
use crate::downloader::format_selector::parse_sub_langs;
use crate::downloader::{DownloadOptions, MediaMode, Quality};
use crate::error::{AppError, Result};

/// Source of interactive answers
pub trait Prompter {
    /// Free-text answer; an empty reply yields `default`.
    fn text(&mut self, message: &str, default: &str) -> Result<String>;

    /// Index of the chosen option
    fn select(&mut self, message: &str, options: &[String], default: usize) -> Result<usize>;
}

/// Terminal prompts via `inquire`
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn text(&mut self, message: &str, default: &str) -> Result<String> {
        let mut prompt = inquire::Text::new(message);
        if !default.is_empty() {
            prompt = prompt.with_default(default);
        }
        let answer = prompt.prompt()?;
        let answer = answer.trim();
        Ok(if answer.is_empty() { default } else { answer }.to_string())
    }

    fn select(&mut self, message: &str, options: &[String], default: usize) -> Result<usize> {
        let choice = inquire::Select::new(message, options.to_vec())
            .with_starting_cursor(default.min(options.len().saturating_sub(1)))
            .prompt()?;
        Ok(options.iter().position(|o| *o == choice).unwrap_or(default))
    }
}

/// Answers every question with its default
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn text(&mut self, _message: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }

    fn select(&mut self, _message: &str, _options: &[String], default: usize) -> Result<usize> {
        Ok(default)
    }
}

/// Whether prompts can be shown at all
pub fn is_interactive(args: &Args) -> bool {
    !args.non_interactive && std::io::stdin().is_terminal()
}

/// Folder offered when `--dir` is absent: the working directory, or the
/// user's Downloads folder on Windows.
pub fn default_download_dir() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if cfg!(windows) {
        return dirs::download_dir().unwrap_or(cwd);
    }
    cwd
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub url: String,
    pub output_dir: PathBuf,
    pub mode: MediaMode,
    pub quality: Quality,
    pub convert_mp3: bool,
    pub force: bool,
    pub subtitles: bool,
    pub auto_subtitles: bool,
    pub sub_langs: Vec<String>,
    pub embed_subtitles: bool,
    pub info_timeout: Duration,
    pub flat: bool,
    pub concurrency: usize,
    pub socket_timeout: u32,
    pub ytdlp: Option<String>,
    pub interactive: bool,
}

impl Settings {
    /// Merge flags with answers from `prompter`. Prompts are only shown for
    /// values no flag supplied.
    pub fn resolve(args: &Args, prompter: &mut dyn Prompter, interactive: bool) -> Result<Self> {
        let url = match args.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => url.to_string(),
            None if interactive => prompter.text("Enter YouTube URL", "")?,
            None => String::new(),
        };
        if url.trim().is_empty() {
            return Err(AppError::NoUrl);
        }

        let output_dir = match &args.dir {
            Some(dir) => dir.clone(),
            None if interactive => {
                let default = default_download_dir();
                PathBuf::from(prompter.text("Enter download folder", &default.to_string_lossy())?)
            }
            None => default_download_dir(),
        };

        let mode = if args.audio {
            MediaMode::Audio
        } else if args.video || !interactive {
            MediaMode::Video
        } else {
            let options = vec!["Video".to_string(), "Audio only".to_string()];
            match prompter.select("Download as", &options, 0)? {
                1 => MediaMode::Audio,
                _ => MediaMode::Video,
            }
        };

        let quality = match args.quality {
            Some(q) => q,
            None if interactive && mode == MediaMode::Video => {
                let options: Vec<String> = Quality::ALL.iter().map(|q| q.to_string()).collect();
                let idx = prompter.select("Quality", &options, 0)?;
                Quality::ALL.get(idx).copied().unwrap_or_default()
            }
            None => Quality::Best,
        };

        Ok(Self {
            url: url.trim().to_string(),
            output_dir,
            mode,
            quality,
            convert_mp3: args.convert_mp3,
            force: args.force,
            subtitles: args.subtitles,
            auto_subtitles: args.autosub,
            sub_langs: args.sub_lang.as_deref().map(parse_sub_langs).unwrap_or_default(),
            embed_subtitles: args.embed_subtitles,
            info_timeout: Duration::from_secs(args.info_timeout.max(1)),
            flat: !args.no_extract_flat,
            concurrency: args.concurrency.max(1),
            socket_timeout: args.socket_timeout,
            ytdlp: args.ytdlp.clone(),
            interactive,
        })
    }

    /// Per-item options once tool detection has run
    pub fn download_options(&self, has_transcoder: bool) -> DownloadOptions {
        DownloadOptions {
            output_dir: self.output_dir.clone(),
            mode: self.mode,
            quality: self.quality,
            convert_mp3: self.convert_mp3,
            subtitles: self.subtitles,
            auto_subtitles: self.auto_subtitles,
            sub_langs: self.sub_langs.clone(),
            embed_subtitles: self.embed_subtitles,
            force: self.force,
            has_transcoder,
        }
    }
}
