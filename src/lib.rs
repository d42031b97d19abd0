pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod downloader;
pub mod error;
pub mod ytdlp;

pub use app::run;
