// FormatSelector - maps user choices onto yt-dlp format selectors and flags
//
// Handles:
// - Quality ceilings (1080p, 720p, 480p, 360p) and best/worst
// - Audio-only selection with optional mp3 conversion
// - Subtitle download and embedding
// - Downgrades when ffmpeg is missing (no merging, no conversion, no embedding)

use super::models::{DownloadOptions, MediaMode, Quality};

/// Engine arguments derived from one set of options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPlan {
    /// Value for `-f`
    pub format: String,
    /// Extra post-processing / subtitle arguments
    pub extra_args: Vec<String>,
    /// Extension the output is known to get, if any
    pub forced_ext: Option<&'static str>,
    /// Features that were dropped because the transcoder is missing
    pub downgrades: Vec<String>,
}

pub struct FormatSelector;

impl FormatSelector {
    /// Format selector for `-f`
    pub fn selector(mode: MediaMode, quality: Quality, can_merge: bool) -> String {
        match mode {
            MediaMode::Audio => match quality {
                Quality::Low => "wa/w".to_string(),
                _ => "ba/b".to_string(),
            },
            MediaMode::Video => match (quality.max_height(), quality, can_merge) {
                (Some(h), _, true) => format!("bv*[height<={h}]+ba/b[height<={h}]"),
                (Some(h), _, false) => format!("b[height<={h}]/w"),
                (None, Quality::Low, true) => "wv*+wa/w".to_string(),
                (None, Quality::Low, false) => "w".to_string(),
                (None, _, true) => "bv*+ba/b".to_string(),
                (None, _, false) => "b".to_string(),
            },
        }
    }

    /// Build the complete plan for `options`
    pub fn plan(options: &DownloadOptions) -> FormatPlan {
        let can_transcode = options.has_transcoder;
        let mut extra_args = Vec::new();
        let mut downgrades = Vec::new();
        let mut forced_ext = None;

        if options.mode == MediaMode::Audio && options.convert_mp3 {
            if can_transcode {
                extra_args.extend(["-x", "--audio-format", "mp3"].map(String::from));
                forced_ext = Some("mp3");
            } else {
                downgrades.push(
                    "ffmpeg not found: audio will be kept in its original format instead of mp3"
                        .to_string(),
                );
            }
        }

        if options.subtitles {
            extra_args.push("--write-subs".to_string());
        }
        if options.auto_subtitles {
            extra_args.push("--write-auto-subs".to_string());
        }
        let wants_subs = options.subtitles || options.auto_subtitles;
        if wants_subs && !options.sub_langs.is_empty() {
            extra_args.push("--sub-langs".to_string());
            extra_args.push(options.sub_langs.join(","));
        }
        if options.embed_subtitles {
            if !wants_subs {
                // Embedding implies fetching the subtitles in the first place
                extra_args.push("--write-subs".to_string());
            }
            if can_transcode && options.mode == MediaMode::Video {
                extra_args.push("--embed-subs".to_string());
            } else if !can_transcode {
                downgrades.push(
                    "ffmpeg not found: subtitles will be saved as separate files".to_string(),
                );
            }
        }

        if options.mode == MediaMode::Video && !can_transcode {
            downgrades.push(
                "ffmpeg not found: using single-file formats, quality may be lower".to_string(),
            );
        }

        FormatPlan {
            format: Self::selector(options.mode, options.quality, can_transcode),
            extra_args,
            forced_ext,
            downgrades,
        }
    }
}

/// Parse a comma separated language list, dropping blanks.
pub fn parse_sub_langs(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
