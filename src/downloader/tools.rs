use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }

    pub fn install_hint(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "install it with `pip install -U yt-dlp` or your package manager",
            ToolType::Ffmpeg => "install ffmpeg from https://ffmpeg.org or your package manager",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Locates external binaries: explicit override, common install paths, then PATH.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_override: Option<String>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        self.ytdlp_override = path.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = path
            .as_deref()
            .and_then(|p| Self::get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            // A binary that cannot report its version is treated as broken
            is_available: version.is_some(),
            version,
            path,
        }
    }

    /// Path to use when spawning yt-dlp, even if detection failed.
    pub fn ytdlp_command(&self) -> String {
        self.locate(ToolType::YtDlp)
            .unwrap_or_else(|| ToolType::YtDlp.as_str().to_string())
    }

    fn locate(&self, tool_type: ToolType) -> Option<String> {
        if tool_type == ToolType::YtDlp {
            if let Some(path) = &self.ytdlp_override {
                return Some(path.clone());
            }
        }

        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if Path::new(&path).exists() {
                return Some(path);
            }
        }

        // 2. Try PATH
        let finder = if cfg!(windows) { "where" } else { "which" };
        if let Ok(output) = Command::new(finder).arg(binary_name).output() {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Some(first) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                    return Some(first.to_string());
                }
            }
        }

        None
    }

    fn get_version(path: &str, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout);
                // ffmpeg prints a banner; the first line carries the version
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}
