//! Sync daemon and runtime logic.

use super::editor_bridge::watch_saves;
use super::events::{EventBatcher, SyncEvent, WatchConfig};
use crate::concurrency::BusyFlag;
use crate::error::ApiError;
use crate::session::Session;
use crate::writer::SaveOutcome;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

/// Cloneable handle for feeding or stopping a running daemon
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    tx: UnboundedSender<SyncEvent>,
}

impl DaemonHandle {
    /// Queue an event as if a watcher had reported it.
    pub fn submit(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            debug!("Sync daemon has already stopped");
        }
    }

    pub fn stop(&self) {
        self.submit(SyncEvent::Shutdown);
    }
}

/// Watches one container and its cache, and keeps them in step
pub struct SyncDaemon {
    session: Arc<Mutex<Session>>,
    config: WatchConfig,
    tx: UnboundedSender<SyncEvent>,
    rx: Mutex<Option<UnboundedReceiver<SyncEvent>>>,
}

impl SyncDaemon {
    /// Wrap an opened session.
    pub fn new(session: Session, config: WatchConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: Arc::new(Mutex::new(session)),
            config,
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        Arc::clone(&self.session)
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            tx: self.tx.clone(),
        }
    }

    /// Watch until a `Shutdown` event arrives, then tear down.
    ///
    /// Watchers are dropped before pending saves are flushed and before the
    /// session is closed, so nothing fires into a cache that is being deleted.
    pub async fn run(&self) -> Result<(), ApiError> {
        let mut rx = self
            .rx
            .lock()
            .take()
            .ok_or_else(|| ApiError::WatchError("Sync daemon is already running".to_string()))?;
        let watchers = self.register_watchers()?;

        let mut batcher = EventBatcher::new(self.config.clone());
        loop {
            let next = match batcher.deadline() {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline.into(), rx.recv()).await {
                        Ok(event) => event,
                        Err(_elapsed) => {
                            self.process_events(batcher.take_batch()).await;
                            continue;
                        }
                    }
                }
                None => rx.recv().await,
            };
            match next {
                None | Some(SyncEvent::Shutdown) => break,
                Some(event) => {
                    if batcher.add_event(event, Instant::now()) {
                        self.process_events(batcher.take_batch()).await;
                    }
                }
            }
        }

        drop(watchers);
        info!("Watchers stopped");
        if !batcher.is_empty() {
            self.process_events(batcher.take_batch()).await;
        }
        if self.config.purge_on_exit {
            let session = Arc::clone(&self.session);
            tokio::task::spawn_blocking(move || session.lock().close())
                .await
                .map_err(|e| ApiError::WatchError(format!("Close task failed: {}", e)))??;
        }
        Ok(())
    }

    fn register_watchers(&self) -> Result<Vec<RecommendedWatcher>, ApiError> {
        let (container, cache_root, busy) = {
            let session = self.session.lock();
            session.store().ensure_root()?;
            (
                session.container().to_path_buf(),
                session.store().root().to_path_buf(),
                session.busy_flag(),
            )
        };
        let container_watcher = watch_container(&container, busy, self.tx.clone())?;
        let save_watcher = watch_saves(&cache_root, self.tx.clone())?;
        info!(
            container = %container.display(),
            cache = %cache_root.display(),
            "Watching container and cache"
        );
        Ok(vec![container_watcher, save_watcher])
    }

    async fn process_events(&self, events: Vec<SyncEvent>) {
        if events.is_empty() {
            return;
        }
        debug!(event_count = events.len(), "Processing sync events");
        for event in events {
            let session = Arc::clone(&self.session);
            let joined =
                tokio::task::spawn_blocking(move || handle_event(&mut session.lock(), event)).await;
            if let Err(e) = joined {
                error!("Sync worker failed: {}", e);
            }
        }
    }
}

fn handle_event(session: &mut Session, event: SyncEvent) {
    match event {
        SyncEvent::ContainerChanged => match session.on_container_changed() {
            Ok(Some(report)) if report.has_changes() => {
                info!(
                    added = report.added,
                    changed = report.changed,
                    tombstoned = report.tombstoned,
                    removed = report.removed,
                    "Container changed on disk"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Reconciliation failed; cache left as it was"),
        },
        SyncEvent::CacheSaved { path, mtime } => match session.on_save(&path, mtime) {
            Ok(SaveOutcome::NotTracked) => debug!(file = %path.display(), "Not a live part"),
            Ok(_) | Err(ApiError::ContainerLocked(_)) => {}
            Err(e) => error!(file = %path.display(), error = %e, "Write-back failed"),
        },
        SyncEvent::Shutdown => {}
    }
}

/// Watch the container's directory and report changes to the container file.
/// Events arriving while a pass or write-back holds the busy flag are dropped.
fn watch_container(
    container: &Path,
    busy: BusyFlag,
    tx: UnboundedSender<SyncEvent>,
) -> Result<RecommendedWatcher, ApiError> {
    let name = container
        .file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| ApiError::WatchError(format!("{} has no file name", container.display())))?;
    let dir = match container.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !touches_container(&event, &name) {
                return;
            }
            if busy.is_busy() {
                debug!("Sync in flight; dropping container change");
                return;
            }
            if tx.send(SyncEvent::ContainerChanged).is_err() {
                debug!("Sync loop has stopped; dropping container change");
            }
        }
        Err(e) => error!("Container watch error: {}", e),
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn touches_container(event: &Event, name: &OsStr) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == Some(name))
}
