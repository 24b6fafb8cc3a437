//! Edit Writer
//!
//! Folds a saved `current` generation back into the container. The container
//! is written through a temporary file and a rename, and the snapshot and the
//! `previous`/`compare` generations are only updated once that write has
//! succeeded, so a failed save leaves both sides as they were.

use crate::cache::CacheStore;
use crate::codec::{self, ArchiveCodec};
use crate::error::{is_lock_error, ApiError, StorageError};
use crate::state::SyncState;
use crate::tree::builder::split_segments;
use crate::types::Role;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Result of handling one save notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Modification time did not advance past the last processed save
    Debounced,
    /// Not the editable generation of a live part
    NotTracked,
    /// Saved bytes equal the `previous` generation
    Unchanged,
    Written { part: String, bytes: usize },
}

/// Writes saved cache files back into one container
pub struct EditWriter<'a> {
    store: &'a CacheStore,
    codec: &'a dyn ArchiveCodec,
    container: &'a Path,
}

impl<'a> EditWriter<'a> {
    pub fn new(store: &'a CacheStore, codec: &'a dyn ArchiveCodec, container: &'a Path) -> Self {
        Self {
            store,
            codec,
            container,
        }
    }

    /// Handle a save of `cache_file` whose modification time is `mtime`.
    pub fn on_save(
        &self,
        state: &mut SyncState,
        cache_file: &Path,
        mtime: SystemTime,
    ) -> Result<SaveOutcome, ApiError> {
        if !self.store.contains(cache_file) {
            return Ok(SaveOutcome::NotTracked);
        }
        if let Some(last) = state.last_saved.get(cache_file) {
            if mtime <= *last {
                debug!(file = %cache_file.display(), "Ignoring repeated save notification");
                return Ok(SaveOutcome::Debounced);
            }
        }
        state.last_saved.insert(cache_file.to_path_buf(), mtime);

        let relative = self.store.entry_path_for(cache_file)?;
        let Some(part) = resolve_part(state, &relative) else {
            if is_current_name(&relative) && state.tree.find(&relative).is_none() {
                warn!(file = %cache_file.display(), "Saved cache file matches no part of the container");
            }
            return Ok(SaveOutcome::NotTracked);
        };

        let Some(saved) = read_if_exists(cache_file)? else {
            return Ok(SaveOutcome::NotTracked);
        };
        let previous_path = self.store.path_for(&part, Role::Previous)?;
        let Some(previous) = read_if_exists(&previous_path)? else {
            return Ok(SaveOutcome::NotTracked);
        };
        if saved == previous {
            return Ok(SaveOutcome::Unchanged);
        }

        let mut next = state.snapshot.clone();
        next.set_data(&part, saved.clone());
        let encoded = self.codec.encode(&next)?;
        write_container(self.container, &encoded)?;

        state.snapshot = next;
        state.container_digest = Some(codec::digest(&encoded));
        self.store.write_generation(&part, Role::Compare, &previous)?;
        self.store.write_generation(&part, Role::Previous, &saved)?;

        info!(part = %part, bytes = saved.len(), container = %self.container.display(), "Wrote part back to container");
        Ok(SaveOutcome::Written {
            part,
            bytes: saved.len(),
        })
    }
}

/// Entry path of the live part whose current generation sits at `relative`.
/// Entries spelled with `\\` separators map to the same cache file as their
/// `/` spelling, so fall back to comparing normalized leaf paths.
fn resolve_part(state: &SyncState, relative: &str) -> Option<String> {
    if state.snapshot.contains(relative) {
        return Some(relative.to_string());
    }
    let tree = &state.tree;
    tree.leaves()
        .into_iter()
        .map(|id| tree.node(id).full_path.as_str())
        .find(|full_path| {
            split_segments(full_path).join("/") == relative && state.snapshot.contains(full_path)
        })
        .map(str::to_string)
}

/// Whether a cache-relative path names a `current` generation file.
pub(crate) fn is_current_name(relative: &str) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    !Role::ALL
        .iter()
        .filter(|role| !role.prefix().is_empty())
        .any(|role| name.starts_with(role.prefix()))
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::at(path, e)),
    }
}

/// Replace the container through a sibling temp file so a failed write cannot truncate it.
/// A symlinked container is written through to its target, and the new file
/// takes the permissions of the one it replaces.
pub(crate) fn write_container(container: &Path, bytes: &[u8]) -> Result<(), ApiError> {
    let target = match dunce::canonicalize(container) {
        Ok(target) => target,
        Err(e) if e.kind() == io::ErrorKind::NotFound => container.to_path_buf(),
        Err(e) => return Err(StorageError::at(container, e).into()),
    };
    let permissions = fs::metadata(&target).ok().map(|m| m.permissions());
    let temp = temp_path_for(&target);
    let result = fs::write(&temp, bytes)
        .and_then(|()| match permissions {
            Some(permissions) => fs::set_permissions(&temp, permissions),
            None => Ok(()),
        })
        .and_then(|()| fs::rename(&temp, &target));
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&temp);
            if is_lock_error(&e) {
                warn!(container = %container.display(), error = %e, "Container is locked");
                Err(ApiError::ContainerLocked(container.to_path_buf()))
            } else {
                Err(StorageError::at(container, e).into())
            }
        }
    }
}

fn temp_path_for(container: &Path) -> PathBuf {
    let name = container
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container".to_string());
    container.with_file_name(format!(".{name}.partmirror-tmp"))
}
