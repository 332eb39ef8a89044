//! Repository façade over the shortcut index.
//!
//! The index is double-buffered: a reload builds a complete new
//! [`ShortcutIndex`] off to the side and then swaps the shared pointer, so a
//! reader sees either the old index or the new one, never a mix. Reloads are
//! serialized by a single async mutex. The first read loads the directory and
//! then installs the change watcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{HotkeysConfig, WatcherConfig};
use crate::error::{HotkeysError, Result};
use crate::query::ranker::{self, SearchQuery};
use crate::record::ShortcutRecord;
use crate::storage::loader::ShortcutLoader;
use crate::storage::memory::ShortcutIndex;
use crate::storage::watcher::ShortcutWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Reloaded,
}

/// Change notification. Only `Reloaded` with source `"All"` is emitted today.
#[derive(Debug, Clone, Serialize)]
pub struct ShortcutsChanged {
    pub change_type: ChangeType,
    pub source: String,
    pub affected: Vec<Arc<ShortcutRecord>>,
    pub generation: u64,
    pub at: DateTime<Utc>,
}

impl ShortcutsChanged {
    fn reloaded(generation: u64) -> Self {
        Self {
            change_type: ChangeType::Reloaded,
            source: "All".to_string(),
            affected: Vec::new(),
            generation,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStats {
    pub reloads: u64,
    pub searches: u64,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub records: usize,
    pub sources: usize,
    pub duplicates_dropped: usize,
    pub generation: u64,
    pub last_reload: Option<DateTime<Utc>>,
    /// Highest number of reloads ever observed running at once.
    pub max_concurrent_reloads: usize,
    pub watching: bool,
}

/// Read and search access to shortcut records.
///
/// Every operation takes a cancellation token and reports
/// [`HotkeysError::Cancelled`] instead of partial results.
#[async_trait]
pub trait ShortcutSource: Send + Sync {
    /// Snapshot of every record.
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<Arc<ShortcutRecord>>>;

    /// Detached copy of the source grouping.
    async fn get_by_source(&self, cancel: &CancellationToken) -> Result<HashMap<String, Vec<Arc<ShortcutRecord>>>>;

    /// Matching records, best first, bounded by the configured result limit.
    /// A query with no term and no filters returns nothing.
    async fn search(&self, query: &SearchQuery, cancel: &CancellationToken) -> Result<Vec<Arc<ShortcutRecord>>>;

    /// Full rebuild from disk.
    async fn reload(&self, cancel: &CancellationToken) -> Result<()>;

    /// Generation of the current index, initializing it first if needed.
    async fn generation(&self, cancel: &CancellationToken) -> Result<u64>;

    fn subscribe(&self) -> broadcast::Receiver<ShortcutsChanged>;
}

#[derive(Debug)]
pub struct ShortcutRepository {
    inner: Arc<RepositoryInner>,
}

#[derive(Debug)]
struct RepositoryInner {
    loader: ShortcutLoader,
    watcher_config: WatcherConfig,
    max_results: usize,

    index: RwLock<Arc<ShortcutIndex>>,
    reload_lock: tokio::sync::Mutex<()>,
    initialized: OnceCell<()>,
    watcher: Mutex<Option<ShortcutWatcher>>,
    changes: broadcast::Sender<ShortcutsChanged>,
    shutdown: CancellationToken,

    reloads: AtomicU64,
    searches: AtomicU64,
    last_reload: Mutex<Option<DateTime<Utc>>>,
    active_reloads: AtomicUsize,
    max_concurrent_reloads: AtomicUsize,
}

impl ShortcutRepository {
    pub fn new(config: &HotkeysConfig) -> Self {
        let loader = ShortcutLoader::new(&config.shortcuts_dir, config.loader.concurrency);
        let (changes, _) = broadcast::channel(config.notify_capacity.max(1));

        Self {
            inner: Arc::new(RepositoryInner {
                loader,
                watcher_config: config.watcher.clone(),
                max_results: config.search.max_results,
                index: RwLock::new(Arc::new(ShortcutIndex::new())),
                reload_lock: tokio::sync::Mutex::new(()),
                initialized: OnceCell::new(),
                watcher: Mutex::new(None),
                changes,
                shutdown: CancellationToken::new(),
                reloads: AtomicU64::new(0),
                searches: AtomicU64::new(0),
                last_reload: Mutex::new(None),
                active_reloads: AtomicUsize::new(0),
                max_concurrent_reloads: AtomicUsize::new(0),
            }),
        }
    }

    /// Current index without triggering initialization.
    pub fn snapshot(&self) -> Arc<ShortcutIndex> {
        self.inner.snapshot()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.initialized()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.watcher.lock().is_some()
    }

    /// Stop reacting to file changes. Reads keep working on the last index.
    pub fn stop_watching(&self) {
        if self.inner.watcher.lock().take().is_some() {
            info!("Stopped watching shortcuts directory");
        }
    }

    pub fn stats(&self) -> RepositoryStats {
        let index = self.snapshot();
        let meta = index.metadata();
        RepositoryStats {
            reloads: self.inner.reloads.load(Ordering::Relaxed),
            searches: self.inner.searches.load(Ordering::Relaxed),
            files_loaded: meta.files_loaded,
            files_failed: meta.files_failed,
            records: meta.total_records,
            sources: meta.total_sources,
            duplicates_dropped: meta.duplicates_dropped,
            generation: meta.generation,
            last_reload: *self.inner.last_reload.lock(),
            max_concurrent_reloads: self.inner.max_concurrent_reloads.load(Ordering::SeqCst),
            watching: self.is_watching(),
        }
    }

    async fn ensure_initialized(&self, cancel: &CancellationToken) -> Result<Arc<ShortcutIndex>> {
        self.inner
            .initialized
            .get_or_try_init(|| async {
                self.inner.reload(cancel).await?;
                self.install_watcher().await;
                Ok::<(), HotkeysError>(())
            })
            .await?;
        Ok(self.snapshot())
    }

    async fn install_watcher(&self) {
        let config = &self.inner.watcher_config;
        let root = self.inner.loader.root();
        if !config.enabled {
            debug!("File watching disabled");
            return;
        }
        let is_dir = tokio::fs::metadata(root).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            debug!(path = %root.display(), "Not watching missing shortcuts directory");
            return;
        }

        let weak: Weak<RepositoryInner> = Arc::downgrade(&self.inner);
        let started = ShortcutWatcher::start(root, config, Handle::current(), move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let shutdown = inner.shutdown.clone();
                match inner.reload(&shutdown).await {
                    Ok(()) => {}
                    Err(HotkeysError::Cancelled) => debug!("Reload skipped, repository shutting down"),
                    Err(error) => warn!(%error, "Reload after file change failed"),
                }
            }
        });

        match started {
            Ok(watcher) => {
                info!(path = %root.display(), "Watching shortcuts directory");
                *self.inner.watcher.lock() = Some(watcher);
            }
            Err(error) => warn!(%error, path = %root.display(), "Failed to start file watcher"),
        }
    }
}

impl RepositoryInner {
    fn snapshot(&self) -> Arc<ShortcutIndex> {
        Arc::clone(&self.index.read())
    }

    async fn reload(&self, cancel: &CancellationToken) -> Result<()> {
        let _lock = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HotkeysError::Cancelled),
            lock = self.reload_lock.lock() => lock,
        };
        let _active = ActiveReload::enter(self);
        let started = Instant::now();

        let mut index = self.loader.load(cancel).await?;
        let generation = self.snapshot().generation() + 1;
        index.set_generation(generation);
        let records = index.len();

        *self.index.write() = Arc::new(index);
        self.reloads.fetch_add(1, Ordering::Relaxed);
        *self.last_reload.lock() = Some(Utc::now());

        info!(
            generation,
            records,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Shortcuts reloaded"
        );

        // No subscribers is fine
        let _ = self.changes.send(ShortcutsChanged::reloaded(generation));
        Ok(())
    }
}

/// Tracks how many reloads are inside the critical section.
struct ActiveReload<'a> {
    inner: &'a RepositoryInner,
}

impl<'a> ActiveReload<'a> {
    fn enter(inner: &'a RepositoryInner) -> Self {
        let active = inner.active_reloads.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_concurrent_reloads.fetch_max(active, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for ActiveReload<'_> {
    fn drop(&mut self) {
        self.inner.active_reloads.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for ShortcutRepository {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
        self.inner.watcher.lock().take();
    }
}

#[async_trait]
impl ShortcutSource for ShortcutRepository {
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<Arc<ShortcutRecord>>> {
        Ok(self.ensure_initialized(cancel).await?.all())
    }

    async fn get_by_source(&self, cancel: &CancellationToken) -> Result<HashMap<String, Vec<Arc<ShortcutRecord>>>> {
        Ok(self.ensure_initialized(cancel).await?.by_source())
    }

    async fn search(&self, query: &SearchQuery, cancel: &CancellationToken) -> Result<Vec<Arc<ShortcutRecord>>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.ensure_initialized(cancel).await?;
        self.inner.searches.fetch_add(1, Ordering::Relaxed);

        let results = ranker::rank(index.records(), query, self.inner.max_results, cancel)?;
        debug!(term = %query.term, app = ?query.app_filter, hits = results.len(), "Searched shortcuts");
        Ok(results)
    }

    async fn reload(&self, cancel: &CancellationToken) -> Result<()> {
        self.inner.reload(cancel).await
    }

    async fn generation(&self, cancel: &CancellationToken) -> Result<u64> {
        Ok(self.ensure_initialized(cancel).await?.generation())
    }

    fn subscribe(&self) -> broadcast::Receiver<ShortcutsChanged> {
        self.inner.changes.subscribe()
    }
}
