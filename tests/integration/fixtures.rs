//! Shared fixtures: scratch containers and a recording editor surface.

use parking_lot::Mutex;
use partmirror::codec::{ArchiveCodec, ArchiveEntry, ArchiveSnapshot, ZipCodec};
use partmirror::config::CacheConfig;
use partmirror::tree::PartTree;
use partmirror::watch::{EditorSurface, TreeView};
use partmirror::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// One call made on the editor surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCall {
    Open(PathBuf),
    Diff { left: PathBuf, right: PathBuf },
    CloseTabsUnder(PathBuf),
    ForceDirty(PathBuf),
    Warning(String),
    Refresh { leaves: usize },
}

#[derive(Debug, Default)]
pub struct RecordingEditor {
    calls: Mutex<Vec<EditorCall>>,
}

impl RecordingEditor {
    pub fn calls(&self) -> Vec<EditorCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: EditorCall) {
        self.calls.lock().push(call);
    }
}

impl EditorSurface for RecordingEditor {
    fn open(&self, path: &Path) {
        self.record(EditorCall::Open(path.to_path_buf()));
    }

    fn diff(&self, left: &Path, right: &Path, _title: &str) {
        self.record(EditorCall::Diff {
            left: left.to_path_buf(),
            right: right.to_path_buf(),
        });
    }

    fn close_all_tabs_under(&self, prefix: &Path) {
        self.record(EditorCall::CloseTabsUnder(prefix.to_path_buf()));
    }

    fn force_dirty(&self, path: &Path) {
        self.record(EditorCall::ForceDirty(path.to_path_buf()));
    }

    fn show_warning(&self, message: &str) {
        self.record(EditorCall::Warning(message.to_string()));
    }
}

impl TreeView for RecordingEditor {
    fn refresh(&self, tree: &PartTree) {
        self.record(EditorCall::Refresh {
            leaves: tree.leaves().len(),
        });
    }
}

pub fn write_container(path: &Path, entries: &[(&str, &[u8])]) {
    let snapshot = ArchiveSnapshot::from_entries(
        entries
            .iter()
            .map(|(name, data)| ArchiveEntry::file(*name, data.to_vec())),
    );
    std::fs::write(path, ZipCodec::new().encode(&snapshot).unwrap()).unwrap();
}

pub fn read_container(path: &Path) -> ArchiveSnapshot {
    ZipCodec::new()
        .decode(&std::fs::read(path).unwrap())
        .unwrap()
}

/// A container in a scratch directory with a session over it.
pub struct Workspace {
    pub temp: TempDir,
    pub container: PathBuf,
    pub editor: Arc<RecordingEditor>,
}

impl Workspace {
    pub fn new(entries: &[(&str, &[u8])]) -> Self {
        let temp = TempDir::new().unwrap();
        let container = temp.path().join("doc.zip");
        write_container(&container, entries);
        Self {
            temp,
            container,
            editor: Arc::new(RecordingEditor::default()),
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        CacheConfig::default().root_for(&self.container)
    }

    pub fn session(&self) -> Session {
        self.session_for(&self.container)
    }

    /// Session over another container in the same directory.
    pub fn session_for(&self, container: &Path) -> Session {
        Session::new(
            container.to_path_buf(),
            CacheConfig::default().store_for(container),
            Arc::new(ZipCodec::new()),
            Arc::clone(&self.editor) as Arc<dyn EditorSurface>,
            Arc::clone(&self.editor) as Arc<dyn TreeView>,
        )
    }

    pub fn replace_container(&self, entries: &[(&str, &[u8])]) {
        write_container(&self.container, entries);
    }
}
