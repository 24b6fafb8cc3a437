//! Zip-backed archive codec.

use super::{ArchiveCodec, ArchiveEntry, ArchiveSnapshot, Compression};
use crate::error::CodecError;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Reads and writes containers with the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl ZipCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveCodec for ZipCodec {
    fn decode(&self, bytes: &[u8]) -> Result<ArchiveSnapshot, CodecError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CodecError::Malformed(e.to_string()))?;

        let mut snapshot = ArchiveSnapshot::new();
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| CodecError::Malformed(format!("entry #{i}: {e}")))?;
            let path = file.name().to_string();
            if file.is_dir() {
                snapshot.insert(ArchiveEntry::directory(path));
                continue;
            }
            let compression = match file.compression() {
                CompressionMethod::Stored => Compression::Stored,
                _ => Compression::Deflated,
            };
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).map_err(|e| CodecError::EntryRead {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            snapshot.insert(ArchiveEntry {
                path,
                data,
                is_dir: false,
                compression,
            });
        }
        Ok(snapshot)
    }

    fn encode(&self, snapshot: &ArchiveSnapshot) -> Result<Vec<u8>, CodecError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in snapshot.entries() {
            let method = match entry.compression {
                Compression::Stored => CompressionMethod::Stored,
                Compression::Deflated => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);
            let write_err = |reason: String| CodecError::EntryWrite {
                path: entry.path.clone(),
                reason,
            };

            if entry.is_dir {
                writer
                    .add_directory(entry.path.clone(), options)
                    .map_err(|e| write_err(e.to_string()))?;
                continue;
            }
            writer
                .start_file(entry.path.clone(), options)
                .map_err(|e| write_err(e.to_string()))?;
            writer
                .write_all(&entry.data)
                .map_err(|e| write_err(e.to_string()))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| CodecError::Finish(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}
