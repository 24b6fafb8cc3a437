//! Per-container sync state owned by a session.

use crate::codec::ArchiveSnapshot;
use crate::tree::PartTree;
use crate::types::Digest;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// Everything the reconciler and edit writer mutate
#[derive(Debug, Default)]
pub struct SyncState {
    pub tree: PartTree,
    pub snapshot: ArchiveSnapshot,
    /// Set once the first reconciliation after a load has completed
    pub loaded: bool,
    /// Digest of the container bytes last read or written by us
    pub container_digest: Option<Digest>,
    /// Last processed modification time per saved cache file
    pub last_saved: HashMap<PathBuf, SystemTime>,
    pub last_report: Option<SyncReport>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything derived from the previous load.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub first_load: bool,
    pub added: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub tombstoned: usize,
    pub removed: usize,
    /// Entries whose path cannot be mirrored safely
    pub skipped: usize,
    /// Parts whose unsaved user edits were left in place
    pub pending_edits: usize,
    pub duration_ms: u64,
}

impl SyncReport {
    /// Whether the pass changed anything the user should see.
    pub fn has_changes(&self) -> bool {
        self.added + self.changed + self.tombstoned + self.removed > 0
    }
}
