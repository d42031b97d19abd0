// Output templates - predicts the file name the engine will write

use regex::Regex;
use serde_json::Value;

lazy_static::lazy_static! {
    static ref FIELD_RE: Regex = Regex::new(r"%\((\w+)\)s").unwrap();
}

/// Template for a single video
pub const SINGLE_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Template for a playlist entry; the index is baked in so that entries
/// sharing a title land in different files.
pub fn entry_template(index: usize) -> String {
    format!("%(title)s_{}.%(ext)s", index)
}

/// Render `template` against engine metadata.
///
/// `ext` overrides the metadata extension (e.g. `mp3` after conversion).
/// Unknown or missing fields render as `NA`, like the engine does.
pub fn render(template: &str, metadata: &Value, ext: &str) -> String {
    FIELD_RE
        .replace_all(template, |caps: &regex::Captures| {
            let field = &caps[1];
            let value = if field == "ext" {
                Some(ext.to_string())
            } else {
                match &metadata[field] {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }
            };
            sanitize(&value.unwrap_or_else(|| "NA".to_string()))
        })
        .into_owned()
}

/// Make a value safe inside one path component, matching yt-dlp's default
/// (non-restricted) file name sanitizer so predicted names equal written ones.
fn sanitize(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter_map(|c| match c {
            '/' => Some('\u{29F8}'),
            '\\' => Some('\u{29F9}'),
            // Full-width counterparts
            '"' | '*' | ':' | '<' | '>' | '?' | '|' => char::from_u32(c as u32 + 0xFEE0),
            '\n' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_single() {
        let meta = json!({ "title": "My Clip", "ext": "webm", "id": "abc" });
        assert_eq!(render(SINGLE_TEMPLATE, &meta, "webm"), "My Clip.webm");
        assert_eq!(render(SINGLE_TEMPLATE, &meta, "mp3"), "My Clip.mp3");
    }

    #[test]
    fn test_render_entry_keeps_index() {
        let meta = json!({ "title": "Intro" });
        assert_eq!(render(&entry_template(4), &meta, "mp4"), "Intro_4.mp4");
    }

    #[test]
    fn test_render_sanitizes_and_fills_missing() {
        let meta = json!({ "title": "AC/DC\\Live\n", "playlist_index": 3 });
        assert_eq!(
            render("%(title)s-%(playlist_index)s-%(uploader)s.%(ext)s", &meta, "m4a"),
            "AC⧸DC⧹Live-3-NA.m4a"
        );
        assert_eq!(render(SINGLE_TEMPLATE, &json!({ "title": ".." }), "mp4"), "_.mp4");
    }

    #[test]
    fn test_render_uses_full_width_replacements() {
        let meta = json!({ "title": "Why? A: \"B\" <c>|*" });
        assert_eq!(render(SINGLE_TEMPLATE, &meta, "mp4"), "Why？ A： ＂B＂ ＜c＞｜＊.mp4");

        let meta = json!({ "title": "one\ntwo\u{7}" });
        assert_eq!(render(SINGLE_TEMPLATE, &meta, "mp4"), "one two.mp4");
    }
}
