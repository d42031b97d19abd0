// Downloader module - engine-agnostic download pipeline

pub mod diagnostics;
pub mod errors;
pub mod existence;
pub mod format_selector;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod progress;
pub mod template;
pub mod tools;
pub mod traits;
pub mod unit;
pub mod utils;

pub use errors::DownloadError;
pub use models::{DownloadOptions, InfoRequest, MediaItem, MediaMode, Outcome, Quality};
pub use orchestrator::{run_batch, BatchOrchestrator, BatchReport};
pub use progress::{ItemProgress, ProgressState, ProgressTracker};
pub use traits::{DownloadUnit, MediaEngine, ProgressHooks};
pub use unit::Downloader;
