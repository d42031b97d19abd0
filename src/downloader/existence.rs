// Existence check - decides whether an item is already on disk
//
// No download ledger is kept. The download directory is listed fresh for
// every check, so files that appear or vanish mid-run are picked up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::models::DownloadTarget;
use super::normalize::normalize;

/// A regular file found in the download directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// List regular files of `dir` with their sizes. Unreadable entries are skipped.
pub fn list_dir(dir: &Path) -> io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_file() {
            entries.push(FileEntry::new(entry.path(), meta.len()));
        }
    }
    Ok(entries)
}

/// Build the target for `path`, computing its key with the matching strip mode.
pub fn target_for(path: PathBuf, preserve_index: bool) -> DownloadTarget {
    let key = normalize(&path.to_string_lossy(), !preserve_index);
    DownloadTarget {
        path,
        key,
        preserve_index,
    }
}

/// First entry that denotes the same logical item as `target`.
///
/// Zero-byte files never count: they are leftovers of a crashed run.
pub fn find_existing(target: &DownloadTarget, entries: &[FileEntry]) -> Option<PathBuf> {
    let usable = || entries.iter().filter(|e| e.size > 0);

    if let Some(exact) = usable().find(|e| e.path == target.path) {
        return Some(exact.path.clone());
    }

    // Punctuation-only names all share the empty key
    if target.key.is_empty() {
        return None;
    }

    let strip_index = !target.preserve_index;
    usable()
        .find(|e| normalize(&e.path.to_string_lossy(), strip_index) == target.key)
        .map(|e| e.path.clone())
}

pub fn already_exists(target_path: &Path, entries: &[FileEntry], preserve_index: bool) -> bool {
    let target = target_for(target_path.to_path_buf(), preserve_index);
    find_existing(&target, entries).is_some()
}

/// Check the filesystem for `target`: exact path first, then a scan of its directory.
pub fn check_on_disk(target: &DownloadTarget) -> Option<PathBuf> {
    if let Ok(meta) = fs::metadata(&target.path) {
        if meta.is_file() && meta.len() > 0 {
            return Some(target.path.clone());
        }
    }

    let dir = target.path.parent().filter(|p| !p.as_os_str().is_empty())?;
    match list_dir(dir) {
        Ok(entries) => find_existing(target, &entries),
        Err(e) => {
            tracing::debug!("Cannot list {}: {}", dir.display(), e);
            None
        }
    }
}
