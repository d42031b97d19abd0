// Error types for the engine and per-item downloads

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Metadata could not be retrieved (network, bad URL, engine failure)
    #[error("Could not fetch media info: {0}")]
    InfoFetch(String),

    /// Metadata fetch did not finish before the deadline
    #[error("Timed out after {0}s while fetching media info")]
    InfoFetchTimeout(u64),

    /// The transfer of a single item failed
    #[error("Download failed: {0}")]
    Download(String),

    /// Item carries no webpage URL, URL or id
    #[error("URL not found")]
    MissingUrl,

    /// yt-dlp (or another required binary) is not installed
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Engine output could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DownloadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::InfoFetchTimeout(_))
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            return Self::ToolNotFound(e.to_string());
        }
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(format!("Invalid JSON: {}", e))
    }
}

// Engine stderr is free text; classify it into the closest variant.
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("command not found") || lower.contains("no such file or directory") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("failed to parse json") || lower.contains("invalid json") {
            return Self::Parse(s);
        }

        if lower.contains("unsupported url") || lower.contains("is not a valid url") {
            return Self::InfoFetch(s);
        }

        Self::Download(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_classification() {
        let e = DownloadError::from("ERROR: Unsupported URL: https://example.com".to_string());
        assert!(matches!(e, DownloadError::InfoFetch(_)));

        let e = DownloadError::from("sh: yt-dlp: command not found".to_string());
        assert!(matches!(e, DownloadError::ToolNotFound(_)));

        let e = DownloadError::from("ERROR: HTTP Error 403: Forbidden".to_string());
        assert!(matches!(e, DownloadError::Download(_)));
    }

    #[test]
    fn test_missing_binary_is_tool_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "yt-dlp");
        assert!(matches!(DownloadError::from(io), DownloadError::ToolNotFound(_)));
    }

    #[test]
    fn test_timeout_message() {
        let e = DownloadError::InfoFetchTimeout(30);
        assert!(e.is_timeout());
        assert_eq!(e.to_string(), "Timed out after 30s while fetching media info");
    }
}
