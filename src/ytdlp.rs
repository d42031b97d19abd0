// yt-dlp engine - metadata fetch and transfer through the yt-dlp binary

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::downloader::diagnostics::explain;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{InfoRequest, TransferRequest};
use crate::downloader::traits::{MediaEngine, ProgressHooks, TransferProgress};
use crate::downloader::utils::run_output;

const PROGRESS_MARKER: &str = "TUBEGRAB_PROGRESS";
const DONE_MARKER: &str = "TUBEGRAB_DONE";

/// Stderr lines kept for error reporting
const STDERR_TAIL: usize = 20;

lazy_static::lazy_static! {
    static ref PROGRESS_TEMPLATE: String = format!(
        "download:{} %(progress.downloaded_bytes)s %(progress.total_bytes)s \
         %(progress.total_bytes_estimate)s %(progress.speed)s %(progress.eta)s",
        PROGRESS_MARKER
    );
    static ref DONE_TEMPLATE: String = format!("after_move:{} %(filepath)s", DONE_MARKER);

    // Plain yt-dlp output, seen when the custom template is not honoured
    // [download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)
    static ref PLAIN_PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*)\s*([KMG]i?B)\s+at\s+(\d+\.?\d*)\s*([KMG]i?B)/s(?:\s+ETA\s+(\d+):(\d+))?"
    ).unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"\[download\]\s+(.+) has already been downloaded").unwrap();
}

/// Something the engine reported on one output line
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress(TransferProgress),
    Finished(PathBuf),
}

/// Parse one line of yt-dlp output.
pub fn parse_line(line: &str) -> Option<EngineEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.trim_start().strip_prefix(PROGRESS_MARKER) {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        let num = |i: usize| {
            fields
                .get(i)
                .and_then(|f| f.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
        };
        let downloaded = num(0)? as u64;
        return Some(EngineEvent::Progress(TransferProgress {
            downloaded_bytes: downloaded,
            total_bytes: num(1).or_else(|| num(2)).map(|v| v as u64),
            speed: num(3),
            eta: num(4).map(|v| v as u64),
        }));
    }

    if let Some(rest) = line.trim_start().strip_prefix(DONE_MARKER) {
        let path = rest.trim();
        if path.is_empty() || path == "NA" {
            return None;
        }
        return Some(EngineEvent::Finished(PathBuf::from(path)));
    }

    if let Some(caps) = PLAIN_PROGRESS_RE.captures(line) {
        let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
        let total = to_bytes(caps.get(2)?.as_str(), caps.get(3)?.as_str())?;
        let speed = to_bytes(caps.get(4)?.as_str(), caps.get(5)?.as_str());
        let eta = match (caps.get(6), caps.get(7)) {
            (Some(m), Some(s)) => {
                let m: u64 = m.as_str().parse().ok()?;
                let s: u64 = s.as_str().parse().ok()?;
                Some(m * 60 + s)
            }
            _ => None,
        };
        return Some(EngineEvent::Progress(TransferProgress {
            downloaded_bytes: (total * percent / 100.0) as u64,
            total_bytes: Some(total as u64),
            speed,
            eta,
        }));
    }

    if let Some(caps) = ALREADY_RE.captures(line) {
        return Some(EngineEvent::Finished(PathBuf::from(caps.get(1)?.as_str().trim())));
    }

    None
}

fn to_bytes(value: &str, unit: &str) -> Option<f64> {
    let value: f64 = value.parse().ok()?;
    let scale = match unit {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        _ => return None,
    };
    Some(value * scale)
}

/// yt-dlp driven as a child process
pub struct YtDlp {
    program: String,
    socket_timeout: u32,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            socket_timeout: 30,
        }
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout = seconds;
        self
    }

    fn info_args(&self, url: &str, request: &InfoRequest) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--yes-playlist".to_string(),
            "--socket-timeout".to_string(),
            request.socket_timeout.to_string(),
        ];
        if request.flat {
            args.push("--flat-playlist".to_string());
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn transfer_args(&self, url: &str, request: &TransferRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.format.clone(),
            "-P".to_string(),
            request.output_dir.to_string_lossy().to_string(),
            "-o".to_string(),
            request.template.clone(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.to_string(),
            "--newline".to_string(),
            // --print implies --quiet and --simulate; undo both
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.clone(),
            "--print".to_string(),
            DONE_TEMPLATE.clone(),
        ];
        args.extend(request.extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaEngine for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_info(&self, url: &str, request: &InfoRequest) -> Result<Value, DownloadError> {
        let args = self.info_args(url, request);
        tracing::debug!("[yt-dlp] {} {}", self.program, args.join(" "));

        let output = run_output(&self.program, &args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::InfoFetch(explain(&stderr)));
        }

        let json: Value = serde_json::from_slice(&output.stdout)?;
        if !json.is_object() {
            return Err(DownloadError::Parse("yt-dlp returned no metadata".to_string()));
        }
        Ok(json)
    }

    async fn transfer(
        &self,
        url: &str,
        request: &TransferRequest,
        hooks: &dyn ProgressHooks,
    ) -> Result<(), DownloadError> {
        let args = self.transfer_args(url, request);
        tracing::debug!("[yt-dlp] {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Io("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Io("Failed to capture stderr".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_open, mut err_open) = (true, true);
        let mut tail: Vec<String> = Vec::new();

        // Quiet mode sends progress to stderr, so both streams carry events
        while out_open || err_open {
            let (line, from_stderr) = tokio::select! {
                line = out_lines.next_line(), if out_open => (line, false),
                line = err_lines.next_line(), if err_open => (line, true),
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    if from_stderr {
                        err_open = false;
                    } else {
                        out_open = false;
                    }
                    continue;
                }
            };

            match parse_line(&line) {
                Some(EngineEvent::Progress(progress)) => hooks.on_progress(&progress),
                Some(EngineEvent::Finished(path)) => hooks.on_finished(&path),
                None if from_stderr && !line.trim().is_empty() => {
                    tracing::debug!("[yt-dlp] {}", line);
                    if tail.len() == STDERR_TAIL {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
                None => {}
            }
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }

        let stderr = tail.join("\n");
        if stderr.is_empty() {
            return Err(DownloadError::Download(format!("yt-dlp exited with {}", status)));
        }
        Err(explain(&stderr).into())
    }
}
