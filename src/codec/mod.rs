//! Archive Codec
//!
//! The core treats the container format as a black box: decode bytes into an
//! ordered `ArchiveSnapshot`, encode a snapshot back into bytes. Unmodified
//! entries must survive a decode/encode round trip with identical content.

mod zip_codec;

pub use zip_codec::ZipCodec;

use crate::error::CodecError;
use crate::types::Digest;
use std::collections::HashMap;

/// Compression applied to an entry when the container is re-encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    Stored,
    #[default]
    Deflated,
}

/// One member of the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
    pub compression: Compression,
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            is_dir: false,
            compression: Compression::default(),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: Vec::new(),
            is_dir: true,
            compression: Compression::Stored,
        }
    }
}

/// In-memory container: entries in archive order, indexed by path
#[derive(Debug, Clone, Default)]
pub struct ArchiveSnapshot {
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl ArchiveSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ArchiveEntry>) -> Self {
        let mut snapshot = Self::new();
        for entry in entries {
            snapshot.insert(entry);
        }
        snapshot
    }

    /// Insert or replace an entry. A replaced entry keeps its position.
    pub fn insert(&mut self, entry: ArchiveEntry) {
        match self.index.get(&entry.path) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.path.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Replace the bytes of an existing file entry, or append a new one.
    pub fn set_data(&mut self, path: &str, data: Vec<u8>) {
        match self.index.get(path) {
            Some(&i) => self.entries[i].data = data,
            None => self.insert(ArchiveEntry::file(path, data)),
        }
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&i| &self.entries[i])
            .filter(|e| !e.is_dir)
            .map(|e| e.data.as_slice())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Paths of the non-directory entries, in archive order.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Container format capability
pub trait ArchiveCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<ArchiveSnapshot, CodecError>;
    fn encode(&self, snapshot: &ArchiveSnapshot) -> Result<Vec<u8>, CodecError>;
}

/// Digest of raw container bytes.
pub fn digest(bytes: &[u8]) -> Digest {
    *blake3::hash(bytes).as_bytes()
}
