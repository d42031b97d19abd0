// Download unit - one item from URL resolution to finished file

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::errors::DownloadError;
use super::existence::{check_on_disk, target_for};
use super::format_selector::{FormatPlan, FormatSelector};
use super::models::{
    DownloadOptions, DownloadTarget, InfoRequest, MediaItem, MediaMode, Outcome, TransferRequest,
};
use super::template::{entry_template, render, SINGLE_TEMPLATE};
use super::traits::{DownloadUnit, MediaEngine, ProgressHooks};

/// Downloads items through a `MediaEngine`, skipping what is already on disk.
pub struct Downloader {
    engine: Arc<dyn MediaEngine>,
    options: DownloadOptions,
    plan: FormatPlan,
    info_request: InfoRequest,
}

impl Downloader {
    pub fn new(engine: Arc<dyn MediaEngine>, options: DownloadOptions) -> Self {
        let plan = FormatSelector::plan(&options);
        Self {
            engine,
            options,
            plan,
            info_request: InfoRequest {
                flat: false,
                ..InfoRequest::default()
            },
        }
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.info_request.socket_timeout = seconds;
        self
    }

    pub fn plan(&self) -> &FormatPlan {
        &self.plan
    }

    /// Output template for `item`: playlist entries carry their index.
    pub fn template_for(item: &MediaItem) -> String {
        match item.index {
            Some(idx) => entry_template(idx),
            None => SINGLE_TEMPLATE.to_string(),
        }
    }

    fn predicted_ext(&self, metadata: &Value) -> String {
        if let Some(ext) = self.plan.forced_ext {
            return ext.to_string();
        }
        match metadata["ext"].as_str().filter(|e| !e.is_empty()) {
            Some(ext) => ext.to_string(),
            None => match self.options.mode {
                MediaMode::Audio => "m4a".to_string(),
                MediaMode::Video => "mp4".to_string(),
            },
        }
    }

    /// Where `item` is expected to be saved, given its (full) metadata.
    pub fn prepare_target(&self, item: &MediaItem, metadata: &Value) -> DownloadTarget {
        let file_name = render(&Self::template_for(item), metadata, &self.predicted_ext(metadata));
        target_for(self.options.output_dir.join(file_name), item.index.is_some())
    }

    async fn try_download(
        &self,
        item: &MediaItem,
        hooks: &dyn ProgressHooks,
    ) -> Result<Outcome, DownloadError> {
        let mut url = item.source_url().ok_or(DownloadError::MissingUrl)?;

        let metadata = if item.needs_refetch() {
            tracing::debug!("Refetching full metadata for {}", url);
            let full = self.engine.fetch_info(&url, &self.info_request).await?;
            if let Some(resolved) = full["webpage_url"].as_str().filter(|u| !u.is_empty()) {
                url = resolved.to_string();
            }
            full
        } else {
            item.metadata.clone()
        };

        let target = self.prepare_target(item, &metadata);

        if !self.options.force {
            if let Some(existing) = check_on_disk(&target) {
                tracing::debug!(
                    "Skipping {}: {} already exists",
                    item.label(),
                    existing.display()
                );
                return Ok(Outcome::Skipped { existing });
            }
        }

        let request = TransferRequest {
            output_dir: self.options.output_dir.clone(),
            template: Self::template_for(item),
            format: self.plan.format.clone(),
            extra_args: self.plan.extra_args.clone(),
        };

        tracing::debug!(
            "Transferring {} via {} to {}",
            url,
            self.engine.name(),
            target.path.display()
        );
        self.engine.transfer(&url, &request, hooks).await?;
        Ok(Outcome::Downloaded)
    }
}

#[async_trait]
impl DownloadUnit for Downloader {
    async fn download_one(&self, item: &MediaItem, hooks: &dyn ProgressHooks) -> Outcome {
        match self.try_download(item, hooks).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("{} failed: {}", item.label(), e);
                Outcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::downloader::traits::{NoProgress, TransferProgress};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::path::Path;

    /// Engine that writes small files instead of downloading
    #[derive(Default)]
    pub(crate) struct FakeEngine {
        pub full_info: Option<Value>,
        pub fail_fetch: bool,
        pub fail_transfer: bool,
        pub fetched: Mutex<Vec<String>>,
        pub transferred: Mutex<Vec<(String, TransferRequest)>>,
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_info(&self, url: &str, _request: &InfoRequest) -> Result<Value, DownloadError> {
            self.fetched.lock().push(url.to_string());
            if self.fail_fetch {
                return Err(DownloadError::InfoFetch("ERROR: Video unavailable".to_string()));
            }
            Ok(self.full_info.clone().unwrap_or(Value::Null))
        }

        async fn transfer(
            &self,
            url: &str,
            request: &TransferRequest,
            hooks: &dyn ProgressHooks,
        ) -> Result<(), DownloadError> {
            self.transferred.lock().push((url.to_string(), request.clone()));
            if self.fail_transfer {
                return Err(DownloadError::Download("ERROR: HTTP Error 403: Forbidden".to_string()));
            }
            hooks.on_progress(&TransferProgress {
                downloaded_bytes: 4,
                total_bytes: Some(4),
                speed: None,
                eta: Some(0),
            });
            let name = render(&request.template, &json!({ "title": url }), "mp4");
            let path = request.output_dir.join(name);
            std::fs::write(&path, b"data").map_err(DownloadError::from)?;
            hooks.on_finished(&path);
            Ok(())
        }
    }

    fn options(dir: &Path) -> DownloadOptions {
        DownloadOptions {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn single(title: &str, ext: &str) -> MediaItem {
        MediaItem::single(json!({
            "id": "abc",
            "title": title,
            "ext": ext,
            "webpage_url": format!("https://www.youtube.com/watch?v={}", title),
        }))
    }

    #[tokio::test]
    async fn test_downloads_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let unit = Downloader::new(engine.clone(), options(dir.path()));

        let outcome = unit.download_one(&single("Song", "webm"), &NoProgress).await;
        assert!(outcome.is_downloaded());

        let transferred = engine.transferred.lock();
        assert_eq!(transferred.len(), 1);
        assert_eq!(transferred[0].1.template, "%(title)s.%(ext)s");
        assert_eq!(transferred[0].1.format, "bv*+ba/b");
    }

    #[tokio::test]
    async fn test_skips_when_other_extension_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song.webm"), b"old").unwrap();

        let engine = Arc::new(FakeEngine::default());
        let mut opts = options(dir.path());
        opts.mode = MediaMode::Audio;
        opts.convert_mp3 = true;
        let unit = Downloader::new(engine.clone(), opts);

        let item = single("Song", "webm");
        assert_eq!(
            unit.prepare_target(&item, &item.metadata).path,
            dir.path().join("Song.mp3")
        );

        match unit.download_one(&item, &NoProgress).await {
            Outcome::Skipped { existing } => assert_eq!(existing, dir.path().join("Song.webm")),
            other => panic!("expected skip, got {:?}", other),
        }
        assert!(engine.transferred.lock().is_empty());
    }

    #[tokio::test]
    async fn test_title_with_slash_matches_file_written_by_engine() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AC⧸DC Live.webm"), b"old").unwrap();

        let engine = Arc::new(FakeEngine::default());
        let unit = Downloader::new(engine.clone(), options(dir.path()));
        let item = single("AC/DC Live", "mp4");

        let target = unit.prepare_target(&item, &item.metadata);
        assert_eq!(target.path, dir.path().join("AC⧸DC Live.mp4"));
        assert_eq!(target.key, "acdc live");

        match unit.download_one(&item, &NoProgress).await {
            Outcome::Skipped { existing } => {
                assert_eq!(existing, dir.path().join("AC⧸DC Live.webm"))
            }
            other => panic!("expected skip, got {:?}", other),
        }
        assert!(engine.transferred.lock().is_empty());
    }

    #[tokio::test]
    async fn test_force_downloads_anyway() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song.webm"), b"old").unwrap();

        let engine = Arc::new(FakeEngine::default());
        let mut opts = options(dir.path());
        opts.force = true;
        let unit = Downloader::new(engine.clone(), opts);

        assert!(unit.download_one(&single("Song", "webm"), &NoProgress).await.is_downloaded());
        assert_eq!(engine.transferred.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_byte_leftover_is_redownloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song.webm"), b"").unwrap();

        let unit = Downloader::new(Arc::new(FakeEngine::default()), options(dir.path()));
        assert!(unit.download_one(&single("Song", "webm"), &NoProgress).await.is_downloaded());
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let dir = tempfile::tempdir().unwrap();
        let unit = Downloader::new(Arc::new(FakeEngine::default()), options(dir.path()));
        let item = MediaItem::entry(1, json!({ "title": "No link" }));

        let outcome = unit.download_one(&item, &NoProgress).await;
        assert!(matches!(outcome, Outcome::Failed(DownloadError::MissingUrl)));
    }

    #[tokio::test]
    async fn test_flat_entry_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine {
            full_info: Some(json!({
                "id": "xyz",
                "title": "Full Title",
                "ext": "mp4",
                "webpage_url": "https://www.youtube.com/watch?v=xyz",
            })),
            ..Default::default()
        });
        let unit = Downloader::new(engine.clone(), options(dir.path()));
        let item = MediaItem::entry(2, json!({ "_type": "url", "id": "xyz", "url": "https://youtu.be/xyz" }));

        assert!(unit.download_one(&item, &NoProgress).await.is_downloaded());
        assert_eq!(engine.fetched.lock().as_slice(), ["https://youtu.be/xyz"]);
        let transferred = engine.transferred.lock();
        assert_eq!(transferred[0].0, "https://www.youtube.com/watch?v=xyz");
        assert_eq!(transferred[0].1.template, "%(title)s_2.%(ext)s");
    }

    #[tokio::test]
    async fn test_refetch_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine {
            fail_fetch: true,
            ..Default::default()
        });
        let unit = Downloader::new(engine.clone(), options(dir.path()));
        let item = MediaItem::entry(1, json!({ "_type": "url", "id": "gone" }));

        let outcome = unit.download_one(&item, &NoProgress).await;
        assert!(matches!(outcome, Outcome::Failed(DownloadError::InfoFetch(_))));
        assert!(engine.transferred.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_error_becomes_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine {
            fail_transfer: true,
            ..Default::default()
        });
        let unit = Downloader::new(engine, options(dir.path()));

        let outcome = unit.download_one(&single("Song", "mp4"), &NoProgress).await;
        assert!(matches!(outcome, Outcome::Failed(DownloadError::Download(_))));
    }

    #[tokio::test]
    async fn test_same_title_playlist_entries_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Intro_1.mp4"), b"first").unwrap();

        let engine = Arc::new(FakeEngine::default());
        let unit = Downloader::new(engine.clone(), options(dir.path()));
        let entry = |idx| {
            MediaItem::entry(
                idx,
                json!({ "id": format!("v{}", idx), "title": "Intro", "ext": "mp4", "url": "Intro" }),
            )
        };

        assert!(matches!(
            unit.download_one(&entry(1), &NoProgress).await,
            Outcome::Skipped { .. }
        ));
        assert!(unit.download_one(&entry(2), &NoProgress).await.is_downloaded());
        assert!(dir.path().join("Intro_2.mp4").exists());
    }
}
