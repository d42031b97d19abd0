use thiserror::Error;

use crate::downloader::DownloadError;

/// Errors that end a run before or instead of the batch
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No URL provided. Exiting.")]
    NoUrl,

    #[error("Exited by user. Goodbye!")]
    Interrupted,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl From<inquire::InquireError> for AppError {
    fn from(e: inquire::InquireError) -> Self {
        match e {
            inquire::InquireError::OperationInterrupted | inquire::InquireError::OperationCanceled => {
                AppError::Interrupted
            }
            other => AppError::Prompt(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
