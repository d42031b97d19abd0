// Seams between the batch logic and the outside world

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use super::errors::DownloadError;
use super::models::{InfoRequest, MediaItem, Outcome, TransferRequest};

/// A byte-level progress report fired during a transfer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferProgress {
    pub downloaded_bytes: u64,
    /// Exact size, or the engine's estimate when the exact size is unknown
    pub total_bytes: Option<u64>,
    /// Engine-reported speed in bytes per second
    pub speed: Option<f64>,
    /// Engine-reported time left in seconds
    pub eta: Option<u64>,
}

/// Callbacks fired from inside a blocking transfer, on whichever task runs it.
pub trait ProgressHooks: Send + Sync {
    fn on_progress(&self, progress: &TransferProgress);

    fn on_finished(&self, final_path: &Path);
}

/// Hooks that ignore every report
pub struct NoProgress;

impl ProgressHooks for NoProgress {
    fn on_progress(&self, _progress: &TransferProgress) {}

    fn on_finished(&self, _final_path: &Path) {}
}

/// Extraction/transfer engine (yt-dlp in production)
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Fetch metadata for a URL: a single video or a playlist with `entries`
    async fn fetch_info(&self, url: &str, request: &InfoRequest) -> Result<Value, DownloadError>;

    /// Transfer one item, reporting progress through `hooks`
    async fn transfer(
        &self,
        url: &str,
        request: &TransferRequest,
        hooks: &dyn ProgressHooks,
    ) -> Result<(), DownloadError>;
}

/// Downloads one item to completion and reports what happened.
///
/// Implementations must not fail: every error becomes `Outcome::Failed`.
#[async_trait]
pub trait DownloadUnit: Send + Sync {
    async fn download_one(&self, item: &MediaItem, hooks: &dyn ProgressHooks) -> Outcome;
}
