//! Change watcher for the shortcuts directory.
//!
//! Every relevant raw event schedules a reload after the debounce delay. By
//! default events are not coalesced, so a burst of N events causes N reloads;
//! reloads are serialized and idempotent, so this only costs redundant work.
//! With `coalesce` enabled a single pending flag collapses a burst into one
//! reload.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::WatcherConfig;
use crate::error::Result;
use crate::storage::loader::is_shortcut_file;

/// Handle to a running watcher. Dropping it stops watching.
pub struct ShortcutWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    events_seen: Arc<AtomicU64>,
}

impl std::fmt::Debug for ShortcutWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortcutWatcher")
            .field("root", &self.root)
            .field("events_seen", &self.events_seen.load(Ordering::Relaxed))
            .finish()
    }
}

impl ShortcutWatcher {
    /// Watch `root` recursively and run `reload` on `runtime` after the
    /// debounce delay for every `*.json` create/modify/remove/rename.
    pub fn start<F, Fut>(root: &Path, config: &WatcherConfig, runtime: Handle, reload: F) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let reload = Arc::new(reload);
        let debounce = config.debounce();
        let pending = config.coalesce.then(|| Arc::new(AtomicBool::new(false)));
        let events_seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&events_seen);

        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) if is_shortcut_event(&event) => {
                counter.fetch_add(1, Ordering::Relaxed);
                if let Some(pending) = &pending {
                    if pending.swap(true, Ordering::SeqCst) {
                        debug!(paths = ?event.paths, "Reload already pending");
                        return;
                    }
                }
                debug!(kind = ?event.kind, paths = ?event.paths, "Shortcut file changed");

                let reload = Arc::clone(&reload);
                let pending = pending.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(debounce).await;
                    if let Some(pending) = pending {
                        pending.store(false, Ordering::SeqCst);
                    }
                    (*reload)().await;
                });
            }
            Ok(_) => {}
            Err(error) => warn!(%error, "File watcher error"),
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok(Self {
            _watcher: watcher,
            root: root.to_path_buf(),
            events_seen,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of relevant raw events observed so far.
    pub fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Relaxed)
    }
}

/// Create, modify (content or name) and remove events on `*.json` paths.
/// Access and metadata-only events are ignored.
pub fn is_shortcut_event(event: &Event) -> bool {
    let relevant_kind = match &event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    relevant_kind && event.paths.iter().any(|path| is_shortcut_file(path))
}
