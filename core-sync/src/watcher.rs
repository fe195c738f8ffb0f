//! # Directory Watcher
//!
//! Turns OS file-change notifications for a mutable set of roots into a
//! single debounced "something changed" callback.
//!
//! ## Pipeline
//!
//! ```text
//! notify thread ──try_send──> bounded channel ──> debounce task ──> callback
//! ```
//!
//! - Only create, write, rename and remove events on supported extensions
//!   count; everything else is dropped before the debounce task sees it
//! - Every relevant event re-arms a single-shot timer; the callback fires
//!   once the window (default 1s) passes without further relevant events
//! - The callback runs on the debounce task and must not block it
//!
//! [`DirectoryWatcher::stop`] drops the OS watch and ends the debounce task
//! immediately, discarding a pending timer.

use crate::error::{Result, SyncError};
use core_runtime::config::CoreConfig;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the channel between the notify thread and the debounce task.
const CHANNEL_CAPACITY: usize = 512;

/// Invoked once per quiet period after relevant changes.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

struct Running {
    // Dropping the watcher releases every OS watch.
    watcher: RecommendedWatcher,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct WatcherState {
    paths: Vec<PathBuf>,
    running: Option<Running>,
}

/// Debounced watcher over a set of root directories.
pub struct DirectoryWatcher {
    extensions: Arc<Vec<String>>,
    debounce: Duration,
    callback: ChangeCallback,
    state: Mutex<WatcherState>,
}

impl DirectoryWatcher {
    /// `extensions` are matched case-insensitively without the leading dot.
    pub fn new(extensions: Vec<String>, debounce: Duration, callback: ChangeCallback) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        Self {
            extensions: Arc::new(extensions),
            debounce,
            callback,
            state: Mutex::new(WatcherState::default()),
        }
    }

    /// Watcher using the configured extensions and debounce window.
    pub fn from_config(config: &CoreConfig, callback: ChangeCallback) -> Self {
        Self::new(config.supported_extensions(), config.watch_debounce, callback)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running.is_some()
    }

    /// Current watched set, in insertion order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.lock().paths.clone()
    }

    /// Start delivering notifications. A second call is a no-op.
    ///
    /// Must be called inside a Tokio runtime. Roots that cannot be watched
    /// are logged and skipped.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.running.is_some() {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|err| SyncError::Watcher(format!("no async runtime: {}", err)))?;

        let (bridge_tx, bridge_rx) = mpsc::channel::<Event>(CHANNEL_CAPACITY);
        let extensions = Arc::clone(&self.extensions);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    forward_relevant(&bridge_tx, &extensions, event);
                }
                Err(err) => warn!(error = %err, "Filesystem watcher error"),
            },
            notify::Config::default(),
        )?;

        for path in &state.paths {
            if let Err(err) = watcher.watch(path, RecursiveMode::Recursive) {
                warn!(path = %path.display(), error = %err, "Failed to watch path");
            }
        }

        let shutdown = CancellationToken::new();
        let task = handle.spawn(debounce_loop(
            bridge_rx,
            Arc::clone(&self.extensions),
            self.debounce,
            Arc::clone(&self.callback),
            shutdown.clone(),
        ));

        info!(
            paths = state.paths.len(),
            debounce_ms = self.debounce.as_millis() as u64,
            "Directory watcher started"
        );
        state.running = Some(Running {
            watcher,
            shutdown,
            task,
        });
        Ok(())
    }

    /// Release the OS watches and end the event loop. A second call is a no-op.
    pub fn stop(&self) {
        let running = self.state.lock().running.take();
        if let Some(Running {
            watcher,
            shutdown,
            task,
        }) = running
        {
            shutdown.cancel();
            drop(watcher);
            drop(task);
            info!("Directory watcher stopped");
        }
    }

    /// Add a root. Watching starts right away if the watcher is running.
    pub fn add_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let mut state = self.state.lock();
        if state.paths.contains(&path) {
            return Ok(());
        }

        if let Some(running) = state.running.as_mut() {
            running.watcher.watch(&path, RecursiveMode::Recursive)?;
        }

        debug!(path = %path.display(), "Watching path");
        state.paths.push(path);
        Ok(())
    }

    /// Remove a root. Returns false if it was not watched.
    pub fn remove_path(&self, path: &Path) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state.paths.iter().position(|p| p == path) else {
            return false;
        };

        state.paths.remove(index);
        if let Some(running) = state.running.as_mut() {
            if let Err(err) = running.watcher.unwatch(path) {
                warn!(path = %path.display(), error = %err, "Failed to unwatch path");
            }
        }
        true
    }

    /// Replace the whole watched set: unwatch everything, then watch `paths`.
    ///
    /// Individual failures are logged, never returned.
    pub fn set_paths(&self, paths: &[PathBuf]) {
        let mut state = self.state.lock();
        let WatcherState {
            paths: current,
            running,
        } = &mut *state;

        if let Some(running) = running.as_mut() {
            for path in current.iter() {
                if let Err(err) = running.watcher.unwatch(path) {
                    debug!(path = %path.display(), error = %err, "Failed to unwatch path");
                }
            }
        }

        current.clear();
        for path in paths {
            if current.contains(path) {
                continue;
            }
            if let Some(running) = running.as_mut() {
                if let Err(err) = running.watcher.watch(path, RecursiveMode::Recursive) {
                    warn!(path = %path.display(), error = %err, "Failed to watch path");
                }
            }
            current.push(path.clone());
        }

        info!(paths = current.len(), "Watched paths replaced");
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// True for create/write/rename/remove events touching a supported file.
pub fn is_relevant(event: &Event, extensions: &[String]) -> bool {
    let kind_matches = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Name(_))
        | EventKind::Modify(ModifyKind::Any) => true,
        _ => false,
    };

    kind_matches
        && event.paths.iter().any(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    extensions.iter().any(|supported| *supported == ext)
                })
                .unwrap_or(false)
        })
}

/// Queue `event` for the debounce task if it is relevant.
///
/// Only relevant events take channel capacity, so a full channel always
/// holds at least one event that will re-arm the timer. Returns whether the
/// event was queued.
fn forward_relevant(tx: &mpsc::Sender<Event>, extensions: &[String], event: Event) -> bool {
    if !is_relevant(&event, extensions) {
        return false;
    }
    tx.try_send(event).is_ok()
}

async fn debounce_loop(
    mut events: mpsc::Receiver<Event>,
    extensions: Arc<Vec<String>>,
    window: Duration,
    callback: ChangeCallback,
    shutdown: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    if is_relevant(&event, &extensions) {
                        deadline = Some(Instant::now() + window);
                    }
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                debug!("Filesystem changes settled");
                callback();
            }
        }
    }

    debug!("Watcher event loop exiting");
}
