//! Cache Store
//!
//! Keeps the three generations of every leaf part on disk under a hidden cache
//! root. Layout mirrors the container's folders: `a/x.xml` becomes
//! `<root>/a/x.xml`, `<root>/a/prev.x.xml` and `<root>/a/compare.x.xml`.

pub mod format;

pub use format::{render, RenderOptions, DEFAULT_FORMAT_LIMIT};

use crate::codec::ArchiveSnapshot;
use crate::error::StorageError;
use crate::tree::builder::split_segments;
use crate::types::Role;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// On-disk generations for the parts of one container
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    /// Directory shared with the roots of sibling containers
    base: Option<PathBuf>,
    options: RenderOptions,
    hide_root: bool,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self {
            root: root.into(),
            base: None,
            options,
            hide_root: true,
        }
    }

    /// Toggle marking the root hidden on platforms with a hidden attribute.
    pub fn with_hidden_root(mut self, hide_root: bool) -> Self {
        self.hide_root = hide_root;
        self
    }

    /// Mark the root as one container's slot inside a shared cache directory.
    /// The shared directory is the one hidden on creation, and it is removed
    /// once the last slot in it is purged.
    pub fn with_base_dir(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Cache file for an entry's generation.
    pub fn path_for(&self, full_path: &str, role: Role) -> Result<PathBuf, StorageError> {
        let segments = split_segments(full_path);
        let Some((name, folders)) = segments.split_last() else {
            return Err(StorageError::UnsafeEntryPath(full_path.to_string()));
        };
        let mut path = self.root.clone();
        for segment in folders.iter().chain(std::iter::once(name)) {
            if !is_plain_segment(segment) {
                return Err(StorageError::UnsafeEntryPath(full_path.to_string()));
            }
        }
        for folder in folders {
            path.push(folder);
        }
        path.push(format!("{}{}", role.prefix(), name));
        Ok(path)
    }

    /// Entry path for a file under the cache root, `/`-separated.
    pub fn entry_path_for(&self, cache_file: &Path) -> Result<String, StorageError> {
        let relative = strip_root(&self.root, cache_file)
            .ok_or_else(|| StorageError::OutsideCacheRoot(cache_file.to_path_buf()))?;
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            return Err(StorageError::OutsideCacheRoot(cache_file.to_path_buf()));
        }
        Ok(segments.join("/"))
    }

    /// Whether a path lies under the cache root.
    pub fn contains(&self, path: &Path) -> bool {
        strip_root(&self.root, path).is_some_and(|rel| rel.components().next().is_some())
    }

    /// Render the entry's bytes from the snapshot into the given generation.
    pub fn materialize(
        &self,
        snapshot: &ArchiveSnapshot,
        full_path: &str,
        role: Role,
    ) -> Result<(), StorageError> {
        let bytes = snapshot.get(full_path).ok_or_else(|| {
            StorageError::at(
                full_path,
                io::Error::new(io::ErrorKind::NotFound, "entry not in snapshot"),
            )
        })?;
        let rendered = self.render(bytes);
        self.write_generation(full_path, role, &rendered)
    }

    /// Bytes as they would appear in a cache file.
    pub fn render(&self, bytes: &[u8]) -> Vec<u8> {
        render(bytes, &self.options).into_owned()
    }

    pub fn read_generation(&self, full_path: &str, role: Role) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(full_path, role)?;
        fs::read(&path).map_err(|e| StorageError::at(path, e))
    }

    /// Missing files read as empty.
    pub fn read_generation_or_empty(
        &self,
        full_path: &str,
        role: Role,
    ) -> Result<Vec<u8>, StorageError> {
        match self.read_generation(full_path, role) {
            Err(e) if e.io_error().map(|io| io.kind()) == Some(io::ErrorKind::NotFound) => {
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub fn exists(&self, full_path: &str, role: Role) -> bool {
        self.path_for(full_path, role)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Write raw bytes to a generation, creating folders as needed.
    pub fn write_generation(
        &self,
        full_path: &str,
        role: Role,
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        let path = self.path_for(full_path, role)?;
        self.ensure_root()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::at(parent, e))?;
        }
        fs::write(&path, bytes).map_err(|e| StorageError::at(&path, e))?;
        debug!(part = %full_path, role = role.as_str(), bytes = bytes.len(), "Wrote generation");
        Ok(())
    }

    /// Remove all three generations of one part. Missing files are fine.
    pub fn delete_generations(&self, full_path: &str) -> Result<(), StorageError> {
        for role in Role::ALL {
            let path = self.path_for(full_path, role)?;
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::at(path, e)),
            }
        }
        Ok(())
    }

    /// Delete the whole cache root.
    pub fn purge_all(&self) -> Result<(), StorageError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(root = %self.root.display(), "Purged cache"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::at(&self.root, e)),
        }
        if let Some(base) = &self.base {
            // Fails while other containers still have a cache here.
            if fs::remove_dir(base).is_ok() {
                debug!(dir = %base.display(), "Removed empty cache directory");
            }
        }
        Ok(())
    }

    /// Every file currently in the cache, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        if !self.root.exists() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    /// Create the cache root if needed, marking it hidden on first creation.
    pub fn ensure_root(&self) -> Result<(), StorageError> {
        if self.root.is_dir() {
            return Ok(());
        }
        let hidden = self.base.as_deref().unwrap_or(&self.root);
        let fresh = !hidden.is_dir();
        fs::create_dir_all(&self.root).map_err(|e| StorageError::at(&self.root, e))?;
        if self.hide_root && fresh {
            if let Err(e) = hide_directory(hidden) {
                warn!(dir = %hidden.display(), error = %e, "Failed to mark cache directory hidden");
            }
        }
        Ok(())
    }
}

fn is_plain_segment(segment: &str) -> bool {
    segment != "." && segment != ".." && !segment.contains(':')
}

fn strip_root<'p>(root: &Path, path: &'p Path) -> Option<&'p Path> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel);
    }
    // Watch events may report canonical paths while the root was configured otherwise.
    let canonical_root = dunce::canonicalize(root).ok()?;
    path.strip_prefix(canonical_root).ok()
}

#[cfg(windows)]
fn hide_directory(path: &Path) -> io::Result<()> {
    let status = std::process::Command::new("attrib")
        .arg("+h")
        .arg(path)
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("attrib exited with {status}"),
        ))
    }
}

#[cfg(not(windows))]
fn hide_directory(_path: &Path) -> io::Result<()> {
    // The leading dot of the directory name hides it.
    Ok(())
}
