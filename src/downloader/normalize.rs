// Filename normalization - turns a file name into an existence key
//
// Two names denote the same logical item when their keys match:
// - extension is dropped (the engine may pick webm one run and mp4 the next)
// - punctuation is dropped, whitespace collapsed, case folded
// - optionally, trailing " (N)" / "_N" / "-N" / " N" suffixes are dropped

use regex::Regex;
use std::path::Path;

lazy_static::lazy_static! {
    static ref INDEX_SUFFIX_RE: Regex = Regex::new(r"(?:\s*\(\d+\)|[_\-\s]\d+)$").unwrap();
    static ref PUNCT_RE: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref SPACES_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Normalize `name` into a comparison key.
///
/// With `strip_index` set, auto-deduplication and playlist index suffixes are
/// treated as noise. The result is a fixed point: normalizing it again with
/// the same flag returns it unchanged.
pub fn normalize(name: &str, strip_index: bool) -> String {
    let mut current = strip_extension(base_name(name)).to_string();

    loop {
        let next = normalize_step(&current, strip_index);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_step(name: &str, strip_index: bool) -> String {
    let name = if strip_index {
        INDEX_SUFFIX_RE.replace(name.trim_end(), "").into_owned()
    } else {
        name.to_string()
    };
    let name = PUNCT_RE.replace_all(&name, "");
    let name = SPACES_RE.replace_all(&name, " ");
    name.trim().to_lowercase()
}

fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}

/// Drop the real extension, leaving dotted titles like "Mr. Smith goes" intact.
fn strip_extension(name: &str) -> &str {
    let path = Path::new(name);
    let is_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| !e.is_empty() && e.chars().all(|c| c.is_alphanumeric() || c == '_'));

    if !is_extension {
        return name;
    }

    match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_suffixes_are_noise_when_stripping() {
        let plain = normalize("video", true);
        assert_eq!(plain, "video");
        assert_eq!(normalize("video_1", true), plain);
        assert_eq!(normalize("video (1)", true), plain);
        assert_eq!(normalize("video-12.mp4", true), plain);
        assert_eq!(normalize("Video 3.webm", true), plain);
    }

    #[test]
    fn test_index_preserved_when_not_stripping() {
        assert_ne!(normalize("video_1", false), normalize("video", false));
        assert_eq!(normalize("video_1.mp4", false), "video_1");
        assert_ne!(normalize("Song_1.mp3", false), normalize("Song_2.mp3", false));
    }

    #[test]
    fn test_extension_punctuation_and_case() {
        assert_eq!(normalize("Song.mp3", true), normalize("Song.webm", true));
        assert_eq!(
            normalize("Rick Astley - Never Gonna Give You Up (Official Video).mp4", false),
            "rick astley - never gonna give you up official video"
        );
        assert_eq!(normalize("  Hello,   World!  ", false), "hello world");
        assert_eq!(normalize("/tmp/dl/Clip.mkv", false), "clip");
    }

    #[test]
    fn test_dotted_title_without_extension() {
        assert_eq!(normalize("Mr. Smith goes", false), "mr smith goes");
    }

    #[test]
    fn test_empty_and_degenerate_inputs() {
        assert_eq!(normalize("", true), "");
        assert_eq!(normalize("", false), "");
        assert_eq!(normalize("!!!", true), "");
        assert_eq!(normalize(".mp4", false), "mp4");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "video",
            "video_1",
            "video (1)",
            "video-1!",
            "video(1)_2 3",
            "Ünïcödé Tïtle (2).opus",
            "  spaced   out  name_7.m4a",
            "a.b.c",
            "Track 01",
            "",
            "___",
            "- 1",
        ];
        for s in samples {
            for strip in [true, false] {
                let once = normalize(s, strip);
                assert_eq!(normalize(&once, strip), once, "input {:?} strip={}", s, strip);
            }
        }
    }
}
