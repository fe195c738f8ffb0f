//! Library service orchestration.
//!
//! [`LibraryService`] owns one instance of each engine piece and wires them
//! together:
//!
//! ```text
//! DirectoryWatcher ──(debounced change)──> SyncEngine ──> EntityStore
//!                                              │
//!                                              └──> CoverFetchPool ──> EventBus ──> host
//! ```
//!
//! Only one sync runs at a time. [`LibraryService::sync_now`] issued while
//! another sync is active fails with [`ServiceError::SyncInProgress`];
//! watcher-triggered and automatic syncs are skipped in that case.

use crate::error::{Result, ServiceError};
use core_library::{DatabaseConfig, EntityStore, Settings, Tab};
use core_metadata::{CoverFetchConfig, CoverFetchPool};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_sync::{ChangeCallback, DirectoryWatcher, SyncEngine, SyncReport};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Long-lived handle to a running library.
///
/// Cloning is cheap; all clones drive the same store, pool and watcher.
#[derive(Clone)]
pub struct LibraryService {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoreConfig,
    store: Arc<EntityStore>,
    covers: Arc<CoverFetchPool>,
    engine: SyncEngine,
    events: EventBus,
    watcher: DirectoryWatcher,
    /// Cancellation handle of the running sync
    active_sync: Mutex<Option<CancellationToken>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

/// Clears the single-flight slot when a sync ends, including when its future is dropped.
struct ActiveSyncGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for ActiveSyncGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

impl LibraryService {
    /// Open the database at `config.database_path` and start the library.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn start(config: CoreConfig) -> Result<Self> {
        let store = EntityStore::initialize(DatabaseConfig::new(config.database_path.clone())).await?;
        Self::start_with_store(config, Arc::new(store)).await
    }

    /// Start the library on an already opened store.
    ///
    /// Starts the cover workers and the watcher on the persisted sync paths,
    /// then kicks off a background sync if the auto-sync schedule says so.
    pub async fn start_with_store(config: CoreConfig, store: Arc<EntityStore>) -> Result<Self> {
        config.validate()?;

        let covers = Arc::new(CoverFetchPool::new(
            CoverFetchConfig::default()
                .with_workers(config.cover_workers)
                .with_queue_capacity(config.cover_queue_capacity),
            Arc::clone(&config.cover_resolver),
        )?);
        let events = EventBus::with_emitter(
            config.event_buffer_size,
            Arc::clone(&config.event_emitter),
        );
        let engine = SyncEngine::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&covers),
            events.clone(),
        );

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let callback: ChangeCallback = Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.spawn_sync("watcher");
                }
            });

            Inner {
                watcher: DirectoryWatcher::from_config(&config, callback),
                config,
                store,
                covers,
                engine,
                events,
                active_sync: Mutex::new(None),
                background: Mutex::new(Vec::new()),
                shutdown: CancellationToken::new(),
            }
        });

        let settings = inner.store.settings();
        inner.watcher.set_paths(&settings.sync_paths);
        if let Err(err) = inner.watcher.start() {
            inner.covers.stop().await;
            return Err(err.into());
        }

        info!(
            paths = settings.sync_paths.len(),
            strategy = settings.sync_strategy.as_str(),
            "Library service started"
        );

        if settings.is_auto_sync_due(inner.config.clock.unix_timestamp()) {
            info!(
                frequency = settings.auto_sync_frequency.as_str(),
                "Auto-sync due"
            );
            inner.spawn_sync("auto");
        }

        Ok(Self { inner })
    }

    /// Run a sync now and wait for its report.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        self.inner.run_sync().await
    }

    /// Request cancellation of the running sync. Returns false if none is running.
    pub fn cancel_sync(&self) -> bool {
        match self.inner.active_sync.lock().as_ref() {
            Some(token) => {
                token.cancel();
                info!("Sync cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.active_sync.lock().is_some()
    }

    pub fn settings(&self) -> Settings {
        self.inner.store.settings()
    }

    /// Persist `settings` and point the watcher at the new sync paths.
    #[instrument(skip(self, settings), fields(paths = settings.sync_paths.len()))]
    pub async fn update_settings(&self, settings: &Settings) -> Result<()> {
        self.inner.store.update_settings(settings).await?;
        self.inner.watcher.set_paths(&settings.sync_paths);
        Ok(())
    }

    /// Copy `source` into the managed directory and catalogue it.
    pub async fn import_file(&self, source: &Path) -> Result<Tab> {
        Ok(self.inner.engine.import_file(source).await?)
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.watcher.is_running()
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.inner.watcher.paths()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop watching, cancel any sync and drain the cover queue.
    ///
    /// The store stays open for reads. Calling this twice is harmless.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.inner.watcher.stop();
        self.inner.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.inner.background.lock());
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "Background sync task failed");
            }
        }

        self.inner.covers.stop().await;
        info!("Library service stopped");
    }
}

impl Inner {
    async fn run_sync(&self) -> Result<SyncReport> {
        let cancel = {
            let mut active = self.active_sync.lock();
            if self.shutdown.is_cancelled() {
                return Err(ServiceError::ShutDown);
            }
            if active.is_some() {
                return Err(ServiceError::SyncInProgress);
            }
            let token = self.shutdown.child_token();
            *active = Some(token.clone());
            token
        };
        let _guard = ActiveSyncGuard {
            slot: &self.active_sync,
        };

        Ok(self.engine.sync_with_cancel(cancel).await?)
    }

    fn spawn_sync(self: &Arc<Self>, trigger: &'static str) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(trigger, "No async runtime, sync not started");
            return;
        };

        let inner = Arc::clone(self);
        let task = handle.spawn(async move {
            match inner.run_sync().await {
                Ok(report) => debug!(
                    trigger,
                    added = report.added,
                    updated = report.updated,
                    cancelled = report.cancelled,
                    "Background sync finished"
                ),
                Err(ServiceError::SyncInProgress) => {
                    debug!(trigger, "Sync already running, skipping")
                }
                Err(ServiceError::ShutDown) => {}
                Err(err) => warn!(trigger, error = %err, "Background sync failed"),
            }
        });

        let mut background = self.background.lock();
        background.retain(|task| !task.is_finished());
        background.push(task);
    }
}
