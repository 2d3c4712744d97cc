// src/watch/watcher.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::types::{ChangeEvent, ChangeKind};
use crate::watch::WatchControl;
use crate::watch::listeners::{Listener, ListenerSet};
use crate::watch::path_utils::{is_system_ignored, relative_or_full, relative_str};

/// Called with a description of every notifier runtime error.
pub type ErrorHook = Arc<dyn Fn(String) + Send + Sync>;

/// State shared between the session handle and its dispatch task.
#[derive(Default)]
struct SessionShared {
    paused: AtomicBool,
    /// Paths added through `add_silently`; exempt from the system ignore set.
    silent: Mutex<HashSet<PathBuf>>,
    listeners: RwLock<ListenerSet>,
}

impl SessionShared {
    fn is_silent(&self, path: &Path) -> bool {
        match self.silent.lock() {
            Ok(set) => set.contains(path),
            Err(_) => {
                warn!("silent path set mutex poisoned; treating path as not added");
                false
            }
        }
    }
}

/// A running filesystem watch over a fixed set of roots plus any paths
/// added at runtime.
///
/// Dropping the session stops file watching.
pub struct WatchSession {
    root: PathBuf,
    watcher: RecommendedWatcher,
    shared: Arc<SessionShared>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("root", &self.root)
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Start watching every directory in `roots` recursively.
    ///
    /// - `root` is the project root against which relative paths (and so all
    ///   glob patterns) are computed.
    /// - `on_error` receives notifier runtime errors; initialization errors
    ///   are returned instead.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(root: impl Into<PathBuf>, roots: &[PathBuf], on_error: ErrorHook) -> Result<Self> {
        let root = root.into();
        let root = root.canonicalize().unwrap_or_else(|_| root.clone());

        let shared = Arc::new(SessionShared::default());

        // Channel from the blocking notify callback into the async world.
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if raw_tx.send(res).is_err() {
                    // We can't log via tracing reliably from notify's thread
                    // during teardown; the dispatch task is already gone.
                    eprintln!("devsup: watch session closed; dropping notify event");
                }
            },
            Config::default(),
        )?;

        for dir in roots {
            watcher.watch(dir, RecursiveMode::Recursive)?;
            info!("watching {:?}", dir);
        }

        let task_shared = Arc::clone(&shared);
        let task_root = root.clone();
        tokio::spawn(async move {
            while let Some(res) = raw_rx.recv().await {
                match res {
                    Ok(event) => dispatch_notify_event(&task_shared, &task_root, event),
                    Err(err) => {
                        error!(error = %err, "file watcher error");
                        on_error(err.to_string());
                    }
                }
            }
            debug!("watch session dispatch loop finished");
        });

        Ok(Self {
            root,
            watcher,
            shared,
        })
    }

    /// Register a listener. It receives every event delivered after this call.
    pub fn on_event(&self, listener: Listener) {
        match self.shared.listeners.write() {
            Ok(mut set) => set.push(listener),
            Err(_) => warn!(listener = %listener.name(), "listener set lock poisoned; listener not registered"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl WatchControl for WatchSession {
    fn pause(&self) {
        if !self.shared.paused.swap(true, Ordering::SeqCst) {
            debug!("watch session paused");
        }
    }

    fn resume(&self) {
        if self.shared.paused.swap(false, Ordering::SeqCst) {
            debug!("watch session resumed");
        }
    }

    fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    fn add_silently(&mut self, path: &Path) -> Result<()> {
        let known = match self.shared.silent.lock() {
            Ok(set) => set.contains(path),
            Err(_) => {
                warn!("silent path set mutex poisoned; watching anyway");
                false
            }
        };
        if known {
            return Ok(());
        }

        // Only remember the path once notify accepted it, so a failed add
        // can be retried.
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        if let Ok(mut set) = self.shared.silent.lock() {
            set.insert(path.to_path_buf());
        }
        debug!(path = ?path, "added path to watch session");
        Ok(())
    }
}

fn dispatch_notify_event(shared: &SessionShared, root: &Path, event: Event) {
    let Some(kind) = change_kind(&event.kind) else {
        return;
    };

    for path in event.paths {
        if shared.paused.load(Ordering::SeqCst) {
            debug!(?path, "watch session paused; dropping event");
            continue;
        }
        if is_system_ignored(&path) && !shared.is_silent(&path) {
            continue;
        }

        let rel = relative_str(root, &path).unwrap_or_else(|| relative_or_full(root, &path));
        let change = ChangeEvent::new(kind, path, rel);
        debug!(kind = %change.kind, path = %change.rel, "dispatching file event");

        match shared.listeners.read() {
            Ok(set) => {
                set.dispatch(&change);
            }
            Err(_) => warn!("listener set lock poisoned; dropping event"),
        }
    }
}

/// Map notify's event kinds onto add / change / unlink.
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Add),
        EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Change),
        EventKind::Remove(_) => Some(ChangeKind::Unlink),
        EventKind::Access(_) | EventKind::Other => None,
    }
}
