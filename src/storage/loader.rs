use std::path::{Path, PathBuf};

use futures::{pin_mut, stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{HotkeysError, Result};
use crate::record::{parse_shortcut_file, ShortcutRecord};
use crate::storage::memory::{IndexBuilder, ShortcutIndex};

/// Reads a directory tree of `*.json` shortcut files into a fresh index.
#[derive(Debug, Clone)]
pub struct ShortcutLoader {
    root: PathBuf,
    concurrency: usize,
}

impl ShortcutLoader {
    pub fn new(root: impl Into<PathBuf>, concurrency: usize) -> Self {
        Self {
            root: root.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every shortcut file under the root.
    ///
    /// Files are read concurrently but merged in path order, so the first
    /// writer for a duplicate key is the same on every load. A file that
    /// cannot be read or parsed is logged and skipped. A missing root yields
    /// an empty index.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<ShortcutIndex> {
        let mut builder = IndexBuilder::new();

        let is_dir = tokio::fs::metadata(&self.root).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            warn!(path = %self.root.display(), "Shortcuts directory does not exist");
            return Ok(builder.finish());
        }

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || discover_files(&root))
            .await
            .map_err(|e| HotkeysError::Internal(format!("file discovery task failed: {}", e)))?;
        debug!(path = %self.root.display(), files = files.len(), "Discovered shortcut files");

        let loads = stream::iter(files)
            .map(|path| async move {
                let result = load_file(&path).await;
                (path, result)
            })
            .buffered(self.concurrency);
        pin_mut!(loads);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HotkeysError::Cancelled),
                next = loads.next() => next,
            };
            let Some((path, result)) = next else {
                break;
            };

            match result {
                Ok(records) => {
                    let count = records.len();
                    let mut accepted = 0;
                    for record in records {
                        if builder.insert(record) {
                            accepted += 1;
                        }
                    }
                    builder.file_loaded();
                    debug!(path = %path.display(), records = count, accepted, "Loaded shortcut file");
                }
                Err(error) => {
                    builder.file_failed();
                    warn!(%error, "Skipping shortcut file");
                }
            }
        }

        let index = builder.finish();
        let meta = index.metadata();
        info!(
            records = meta.total_records,
            sources = meta.total_sources,
            files = meta.files_loaded,
            failed = meta.files_failed,
            duplicates = meta.duplicates_dropped,
            "Shortcut index built"
        );
        Ok(index)
    }
}

/// Recursively list `*.json` files under `root`, sorted by path.
pub fn discover_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(%error, "Failed to read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_shortcut_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub fn is_shortcut_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

async fn load_file(path: &Path) -> Result<Vec<ShortcutRecord>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| HotkeysError::io(path, e))?;
    let default_source = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    parse_shortcut_file(&contents, &default_source).map_err(|e| HotkeysError::json(path, e))
}
