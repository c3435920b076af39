//! File watching for git-triggered restarts.
//!
//! A [`PathWatcher`] calls a callback whenever one of the registered files
//! changes. [`FileWatcher`] watches each file's parent directory with a
//! debounced `notify` watcher, since git replaces ref files by renaming a
//! lock file over them.
//!
//! ```ignore
//! let watcher = FileWatcher::new()?;
//! watcher.register(&repo.join(".git/HEAD"), Arc::new(|| println!("checkout")))?;
//! ```

use crate::error::{Error, Result};
use notify_debouncer_full::{
    new_debouncer,
    notify::{RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Invoked on the watcher's thread; must not block.
pub type WatchCallback = Arc<dyn Fn() + Send + Sync>;

pub trait PathWatcher: Send + Sync {
    /// Call `on_change` whenever `path` is written, created, renamed or removed.
    fn register(&self, path: &Path, on_change: WatchCallback) -> Result<()>;

    fn registered(&self, path: &Path) -> bool;

    /// Stop watching; no callbacks run afterwards.
    fn close(&self);
}

type CallbackMap = HashMap<PathBuf, WatchCallback>;

/// Debounced filesystem watcher.
pub struct FileWatcher {
    debouncer: Mutex<Option<Debouncer<RecommendedWatcher, FileIdMap>>>,
    callbacks: Arc<RwLock<CallbackMap>>,
    watched_dirs: Mutex<HashSet<PathBuf>>,
}

/// Git writes HEAD and the ref in quick succession during checkout/fetch.
const DEBOUNCE: Duration = Duration::from_millis(300);

impl FileWatcher {
    pub fn new() -> Result<Self> {
        let callbacks: Arc<RwLock<CallbackMap>> = Arc::new(RwLock::new(HashMap::new()));
        let handler_callbacks = Arc::clone(&callbacks);

        let debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let changed: HashSet<PathBuf> = events
                        .iter()
                        .flat_map(|event| event.paths.iter().map(|p| normalize(p)))
                        .collect();
                    // Clone out of the lock so callbacks can re-enter the watcher
                    let fire: Vec<WatchCallback> = {
                        let callbacks = handler_callbacks.read();
                        changed
                            .iter()
                            .filter_map(|path| callbacks.get(path).cloned())
                            .collect()
                    };
                    for callback in fire {
                        callback();
                    }
                }
                Err(errors) => {
                    tracing::warn!("Watch error: {:?}", errors);
                }
            }
        })
        .map_err(|e| Error::Filesystem(format!("Failed to create file watcher: {}", e)))?;

        Ok(Self {
            debouncer: Mutex::new(Some(debouncer)),
            callbacks,
            watched_dirs: Mutex::new(HashSet::new()),
        })
    }
}

impl PathWatcher for FileWatcher {
    fn register(&self, path: &Path, on_change: WatchCallback) -> Result<()> {
        let key = normalize(path);
        let dir = key
            .parent()
            .ok_or_else(|| Error::Filesystem(format!("Cannot watch {}", path.display())))?
            .to_path_buf();

        let mut debouncer = self.debouncer.lock();
        let Some(debouncer) = debouncer.as_mut() else {
            return Err(Error::Filesystem("File watcher is closed".to_string()));
        };

        let mut watched_dirs = self.watched_dirs.lock();
        if !watched_dirs.contains(&dir) {
            debouncer
                .watcher()
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    Error::Filesystem(format!("Failed to watch path {}: {}", dir.display(), e))
                })?;
            debouncer.cache().add_root(&dir, RecursiveMode::NonRecursive);
            watched_dirs.insert(dir);
        }

        self.callbacks.write().insert(key.clone(), on_change);
        tracing::debug!("Watching {}", key.display());
        Ok(())
    }

    fn registered(&self, path: &Path) -> bool {
        self.callbacks.read().contains_key(&normalize(path))
    }

    fn close(&self) {
        if let Some(debouncer) = self.debouncer.lock().take() {
            debouncer.stop();
        }
        self.callbacks.write().clear();
    }
}

/// Canonicalize the parent directory so event paths and registered paths compare equal.
fn normalize(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
