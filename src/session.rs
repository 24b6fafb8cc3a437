//! Session
//!
//! One opened container: its cache store, sync state, busy flag, and the
//! editor surfaces it reports to. Every mutation of the tree, snapshot, or
//! cache goes through `&mut Session`, so passes and write-backs never overlap.

use crate::cache::CacheStore;
use crate::codec::{self, ArchiveCodec, ArchiveSnapshot};
use crate::concurrency::BusyFlag;
use crate::config::PartMirrorConfig;
use crate::detect::ChangeDetector;
use crate::error::{ApiError, StorageError};
use crate::reconcile::Reconciler;
use crate::state::{SyncReport, SyncState};
use crate::tree::{PartTree, StatusIcon};
use crate::types::{ChangeKind, Role};
use crate::watch::{EditorSurface, TreeView};
use crate::writer::{is_current_name, EditWriter, SaveOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Classification of one part for status listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartStatus {
    pub part: String,
    pub kind: ChangeKind,
    pub icon: StatusIcon,
}

/// Files to hand to a diff view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTarget {
    pub left: PathBuf,
    pub right: PathBuf,
    pub title: String,
}

pub struct Session {
    container: PathBuf,
    store: CacheStore,
    codec: Arc<dyn ArchiveCodec>,
    editor: Arc<dyn EditorSurface>,
    tree_view: Arc<dyn TreeView>,
    state: SyncState,
    busy: BusyFlag,
}

impl Session {
    pub fn new(
        container: impl Into<PathBuf>,
        store: CacheStore,
        codec: Arc<dyn ArchiveCodec>,
        editor: Arc<dyn EditorSurface>,
        tree_view: Arc<dyn TreeView>,
    ) -> Self {
        Self {
            container: container.into(),
            store,
            codec,
            editor,
            tree_view,
            state: SyncState::new(),
            busy: BusyFlag::new(),
        }
    }

    /// Session with the cache placed and formatted per `config`.
    pub fn from_config(
        container: impl Into<PathBuf>,
        config: &PartMirrorConfig,
        codec: Arc<dyn ArchiveCodec>,
        editor: Arc<dyn EditorSurface>,
        tree_view: Arc<dyn TreeView>,
    ) -> Self {
        let container = container.into();
        let store = config.cache.store_for(&container);
        Self::new(container, store, codec, editor, tree_view)
    }

    pub fn container(&self) -> &Path {
        &self.container
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn tree(&self) -> &PartTree {
        &self.state.tree
    }

    pub fn is_loaded(&self) -> bool {
        self.state.loaded
    }

    /// Handle on the busy flag for watcher callbacks.
    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Load the container from scratch: purge the cache and run a first pass.
    /// The container is decoded first, so a bad container leaves the cache alone.
    pub fn open(&mut self) -> Result<SyncReport, ApiError> {
        let (bytes, snapshot) = self.read_container()?;
        self.load_fresh(&bytes, snapshot)
    }

    fn read_container(&self) -> Result<(Vec<u8>, ArchiveSnapshot), ApiError> {
        let bytes = std::fs::read(&self.container).map_err(|e| StorageError::at(&self.container, e))?;
        let snapshot = self.codec.decode(&bytes)?;
        Ok((bytes, snapshot))
    }

    fn load_fresh(&mut self, bytes: &[u8], snapshot: ArchiveSnapshot) -> Result<SyncReport, ApiError> {
        let _guard = self.busy.try_acquire();
        self.store.purge_all()?;
        self.state.clear();
        info!(container = %self.container.display(), cache = %self.store.root().display(), "Opening container");
        let report = Reconciler::new(&self.store, self.codec.as_ref())
            .reconcile_decoded(&mut self.state, snapshot, bytes)?;
        self.tree_view.refresh(&self.state.tree);
        Ok(report)
    }

    /// Pick up an existing cache without rewriting it, or open from scratch if
    /// there is none. Statuses are derived from the cache files on disk.
    pub fn attach(&mut self) -> Result<Option<SyncReport>, ApiError> {
        if !self.store.root().is_dir() {
            return self.open().map(Some);
        }
        let (bytes, snapshot) = self.read_container()?;
        let mut tree = PartTree::build(snapshot.file_paths());
        // Parts the container has dropped since the cache was written.
        let cached: Vec<String> = self
            .store
            .files()
            .iter()
            .filter_map(|file| self.store.entry_path_for(file).ok())
            .filter(|part| is_current_name(part) && tree.find(part).is_none())
            .collect();
        tree.extend(&cached);

        let detector = ChangeDetector::new(&self.store);
        for leaf in tree.leaves() {
            let full_path = &tree.node(leaf).full_path;
            let icon = match detector.classify(full_path, &snapshot) {
                // Not yet tombstoned: the next pass does that before removing it.
                ChangeKind::Deleted
                    if !self
                        .store
                        .read_generation_or_empty(full_path, Role::Current)?
                        .is_empty() =>
                {
                    StatusIcon::ChangedFromOutside
                }
                kind => icon_for(kind),
            };
            tree.set_status(leaf, icon);
        }
        tree.propagate_status();

        self.state.clear();
        self.state.tree = tree;
        self.state.snapshot = snapshot;
        self.state.loaded = true;
        self.state.container_digest = Some(codec::digest(&bytes));
        debug!(container = %self.container.display(), parts = self.state.snapshot.len(), "Attached to existing cache");
        self.tree_view.refresh(&self.state.tree);
        Ok(None)
    }

    /// Run a reconciliation pass. Returns `None` if one is already in flight.
    pub fn reconcile(&mut self) -> Result<Option<SyncReport>, ApiError> {
        let Some(_guard) = self.busy.try_acquire() else {
            debug!("Reconciliation already running; dropping request");
            return Ok(None);
        };
        let report = Reconciler::new(&self.store, self.codec.as_ref())
            .reconcile_file(&mut self.state, &self.container)?;
        self.tree_view.refresh(&self.state.tree);
        Ok(Some(report))
    }

    /// The container changed on disk. Skips the pass when the bytes are the
    /// ones we last read or wrote ourselves.
    pub fn on_container_changed(&mut self) -> Result<Option<SyncReport>, ApiError> {
        if !self.state.loaded {
            return Err(ApiError::NotLoaded);
        }
        let Some(_guard) = self.busy.try_acquire() else {
            debug!("Busy; dropping container change");
            return Ok(None);
        };
        let bytes = std::fs::read(&self.container).map_err(|e| StorageError::at(&self.container, e))?;
        let bytes_digest = codec::digest(&bytes);
        if self.state.container_digest == Some(bytes_digest) {
            debug!(
                container = %self.container.display(),
                digest = %hex::encode(&bytes_digest[..8]),
                "Container bytes unchanged; skipping pass"
            );
            return Ok(None);
        }
        let report = Reconciler::new(&self.store, self.codec.as_ref())
            .reconcile_bytes(&mut self.state, &bytes)?;
        self.tree_view.refresh(&self.state.tree);
        Ok(Some(report))
    }

    /// A cache file was saved. A locked container is reported to the user and
    /// the tab is marked dirty so the next save retries.
    pub fn on_save(&mut self, cache_file: &Path, mtime: SystemTime) -> Result<SaveOutcome, ApiError> {
        if !self.state.loaded {
            return Err(ApiError::NotLoaded);
        }
        let _guard = self.busy.try_acquire();
        let result = EditWriter::new(&self.store, self.codec.as_ref(), &self.container)
            .on_save(&mut self.state, cache_file, mtime);
        if let Err(ApiError::ContainerLocked(container)) = &result {
            // Forget the mtime so saving the same bytes again is not debounced.
            self.state.last_saved.remove(cache_file);
            self.editor.show_warning(&format!(
                "{} is open in another program. Close it there and save again.",
                container.display()
            ));
            self.editor.force_dirty(cache_file);
        }
        result
    }

    /// Open the editable generation of a part.
    pub fn view_part(&self, part: &str) -> Result<PathBuf, ApiError> {
        self.require_leaf(part)?;
        let path = self.store.path_for(part, Role::Current)?;
        self.editor.open(&path);
        Ok(path)
    }

    /// Diff a part: the last external change if there is one, otherwise the
    /// synced baseline, against the editable generation.
    pub fn diff_part(&self, part: &str) -> Result<DiffTarget, ApiError> {
        self.require_leaf(part)?;
        let compare = self.store.read_generation_or_empty(part, Role::Compare)?;
        let left_role = if compare.is_empty() {
            Role::Previous
        } else {
            Role::Compare
        };
        let target = DiffTarget {
            left: self.store.path_for(part, left_role)?,
            right: self.store.path_for(part, Role::Current)?,
            title: format!("{} ({} \u{2194} current)", part, left_role.as_str()),
        };
        self.editor.diff(&target.left, &target.right, &target.title);
        Ok(target)
    }

    /// Classify every leaf in the tree, depth-first.
    pub fn status(&self) -> Result<Vec<PartStatus>, ApiError> {
        if !self.state.loaded {
            return Err(ApiError::NotLoaded);
        }
        let detector = ChangeDetector::new(&self.store);
        let tree = &self.state.tree;
        Ok(tree
            .leaves()
            .into_iter()
            .map(|leaf| {
                let node = tree.node(leaf);
                PartStatus {
                    part: node.full_path.clone(),
                    kind: detector.classify(&node.full_path, &self.state.snapshot),
                    icon: node.status,
                }
            })
            .collect())
    }

    /// Throw away the cache and every unsaved edit, then load again.
    pub fn reset(&mut self) -> Result<SyncReport, ApiError> {
        let (bytes, snapshot) = self.read_container()?;
        warn!(container = %self.container.display(), "Resetting cache");
        self.editor.close_all_tabs_under(self.store.root());
        self.load_fresh(&bytes, snapshot)
    }

    /// Close tabs, delete the cache, and forget the container.
    pub fn close(&mut self) -> Result<(), ApiError> {
        let _guard = self.busy.try_acquire();
        self.editor.close_all_tabs_under(self.store.root());
        self.store.purge_all()?;
        self.state.clear();
        self.tree_view.refresh(&self.state.tree);
        info!(container = %self.container.display(), "Closed container");
        Ok(())
    }

    fn require_leaf(&self, part: &str) -> Result<(), ApiError> {
        if !self.state.loaded {
            return Err(ApiError::NotLoaded);
        }
        match self.state.tree.find(part) {
            // A part new in the container has no cache files until a pass runs.
            Some(id) if self.state.tree.node(id).is_leaf() && self.store.exists(part, Role::Current) => {
                Ok(())
            }
            _ => Err(ApiError::PartNotFound(part.to_string())),
        }
    }
}

fn icon_for(kind: ChangeKind) -> StatusIcon {
    match kind {
        ChangeKind::Unchanged | ChangeKind::ChangedByUser => StatusIcon::File,
        ChangeKind::ChangedFromOutside => StatusIcon::ChangedFromOutside,
        ChangeKind::Added => StatusIcon::NewlyAdded,
        ChangeKind::Deleted => StatusIcon::DeletedPendingAck,
    }
}
