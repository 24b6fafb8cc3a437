//! Change Detector
//!
//! Byte-level comparison of a part's generations. Read failures never surface
//! as errors here: a baseline that cannot be read is retried once and then
//! treated as "unchanged", so a flaky read cannot trigger a bogus diff.

use crate::cache::CacheStore;
use crate::codec::ArchiveSnapshot;
use crate::error::StorageError;
use crate::types::{ChangeKind, Role};
use std::io;
use tracing::warn;

/// Result of reading a part's `previous` generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// No generation set exists yet
    Untracked,
    Present(Vec<u8>),
    /// Exists but could not be read
    Unreadable,
}

/// Compares cached generations of parts in one cache store
pub struct ChangeDetector<'a> {
    store: &'a CacheStore,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(store: &'a CacheStore) -> Self {
        Self { store }
    }

    /// True iff the materialized `current` differs from `previous`.
    pub fn has_changed_from_outside(&self, full_path: &str) -> bool {
        let current = match self.read_with_retry(full_path, Role::Current) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(part = %full_path, error = %e, "Could not read current generation, assuming unchanged");
                return false;
            }
        };
        self.differs_from_baseline(full_path, &current)
    }

    /// Compare candidate bytes against the stored baseline without touching disk state.
    pub fn differs_from_baseline(&self, full_path: &str, candidate: &[u8]) -> bool {
        match self.baseline(full_path) {
            Baseline::Present(previous) => previous != candidate,
            Baseline::Untracked | Baseline::Unreadable => false,
        }
    }

    /// Read the `previous` generation, retrying once on failure.
    pub fn baseline(&self, full_path: &str) -> Baseline {
        if !self.store.exists(full_path, Role::Previous) {
            return Baseline::Untracked;
        }
        match self.read_with_retry(full_path, Role::Previous) {
            Ok(bytes) => Baseline::Present(bytes),
            Err(e) if is_not_found(&e) => Baseline::Untracked,
            Err(e) => {
                warn!(part = %full_path, error = %e, "Could not read previous generation, assuming unchanged");
                Baseline::Unreadable
            }
        }
    }

    /// Classify a part against the container snapshot and its cache files.
    pub fn classify(&self, full_path: &str, snapshot: &ArchiveSnapshot) -> ChangeKind {
        let baseline = self.baseline(full_path);
        let Some(bytes) = snapshot.get(full_path) else {
            return if baseline == Baseline::Untracked {
                ChangeKind::Unchanged
            } else {
                ChangeKind::Deleted
            };
        };
        let previous = match baseline {
            Baseline::Untracked => return ChangeKind::Added,
            Baseline::Unreadable => return ChangeKind::Unchanged,
            Baseline::Present(previous) => previous,
        };
        if self.store.render(bytes) != previous {
            return ChangeKind::ChangedFromOutside;
        }
        match self.store.read_generation(full_path, Role::Current) {
            Ok(current) if current != previous => ChangeKind::ChangedByUser,
            _ => ChangeKind::Unchanged,
        }
    }

    fn read_with_retry(&self, full_path: &str, role: Role) -> Result<Vec<u8>, StorageError> {
        self.store
            .read_generation(full_path, role)
            .or_else(|e| {
                if is_not_found(&e) {
                    return Err(e);
                }
                tracing::debug!(part = %full_path, role = role.as_str(), error = %e, "Retrying generation read");
                self.store.read_generation(full_path, role)
            })
    }
}

fn is_not_found(err: &StorageError) -> bool {
    err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::NotFound)
}
