//! Editor integration: the surfaces a host renders into, and the save notifier
//! that turns cache file writes into sync events.

use super::events::SyncEvent;
use crate::error::ApiError;
use crate::tree::PartTree;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

/// Editor operations the session drives
pub trait EditorSurface: Send + Sync {
    fn open(&self, path: &Path);
    fn diff(&self, left: &Path, right: &Path, title: &str);
    /// Close every open tab whose file lives under `prefix`.
    fn close_all_tabs_under(&self, prefix: &Path);
    /// Mark a tab modified so the user saves it again.
    fn force_dirty(&self, path: &Path);
    fn show_warning(&self, message: &str);
}

/// Renders the part tree
pub trait TreeView: Send + Sync {
    fn refresh(&self, tree: &PartTree);
}

/// Surface for headless use; ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEditor;

impl EditorSurface for NullEditor {
    fn open(&self, _path: &Path) {}
    fn diff(&self, _left: &Path, _right: &Path, _title: &str) {}
    fn close_all_tabs_under(&self, _prefix: &Path) {}
    fn force_dirty(&self, _path: &Path) {}
    fn show_warning(&self, message: &str) {
        warn!("{}", message);
    }
}

impl TreeView for NullEditor {
    fn refresh(&self, _tree: &PartTree) {}
}

/// Watch the cache root recursively and report every written file as a save.
pub(crate) fn watch_saves(
    cache_root: &Path,
    tx: UnboundedSender<SyncEvent>,
) -> Result<RecommendedWatcher, ApiError> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for sync_event in saves_from(event) {
                if tx.send(sync_event).is_err() {
                    debug!("Sync loop has stopped; dropping save notification");
                    return;
                }
            }
        }
        Err(e) => error!("Cache watch error: {}", e),
    })?;
    watcher.watch(cache_root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

fn saves_from(event: Event) -> Vec<SyncEvent> {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    );
    if !relevant {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter_map(|path| {
            let metadata = std::fs::metadata(&path).ok()?;
            if !metadata.is_file() {
                return None;
            }
            let mtime = metadata.modified().ok()?;
            Some(SyncEvent::CacheSaved { path, mtime })
        })
        .collect()
}
