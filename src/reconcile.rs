//! Reconciliation
//!
//! Re-derives the part tree and every generation set from the container's
//! current bytes. A pass runs in two phases: planning decodes the container,
//! extends a copy of the tree, renders each leaf, and reads its baseline
//! without writing anything; applying then writes generations in depth-first
//! order. A container that fails to decode therefore leaves the cache exactly
//! as it was. Parts missing from the container are tombstoned on the first
//! pass that misses them and deleted on the second.

use crate::cache::CacheStore;
use crate::codec::{self, ArchiveCodec, ArchiveSnapshot};
use crate::detect::{Baseline, ChangeDetector};
use crate::error::{ApiError, StorageError};
use crate::state::{SyncReport, SyncState};
use crate::tree::{NodeId, PartTree, StatusIcon};
use crate::types::Role;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a pass will do with one leaf
#[derive(Debug)]
enum LeafAction {
    /// No generation set yet
    Create,
    /// Container bytes differ from the baseline
    Changed { old_previous: Vec<u8> },
    Unchanged { rewrite_current: bool },
}

#[derive(Debug)]
struct LeafPlan {
    node: NodeId,
    full_path: String,
    rendered: Vec<u8>,
    action: LeafAction,
}

/// Runs reconciliation passes against one cache store
pub struct Reconciler<'a> {
    store: &'a CacheStore,
    codec: &'a dyn ArchiveCodec,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a CacheStore, codec: &'a dyn ArchiveCodec) -> Self {
        Self { store, codec }
    }

    /// Read the container file and reconcile against it.
    pub fn reconcile_file(
        &self,
        state: &mut SyncState,
        container: &Path,
    ) -> Result<SyncReport, ApiError> {
        let bytes = std::fs::read(container).map_err(|e| StorageError::at(container, e))?;
        self.reconcile_bytes(state, &bytes)
    }

    /// One full pass over already-read container bytes.
    pub fn reconcile_bytes(
        &self,
        state: &mut SyncState,
        container_bytes: &[u8],
    ) -> Result<SyncReport, ApiError> {
        let snapshot = self.codec.decode(container_bytes)?;
        self.reconcile_decoded(state, snapshot, container_bytes)
    }

    /// One full pass over a snapshot already decoded from `container_bytes`.
    pub fn reconcile_decoded(
        &self,
        state: &mut SyncState,
        snapshot: ArchiveSnapshot,
        container_bytes: &[u8],
    ) -> Result<SyncReport, ApiError> {
        let started = Instant::now();
        let first_load = !state.loaded;
        let mut report = SyncReport {
            first_load,
            ..SyncReport::default()
        };

        let mut tree = state.tree.clone();
        let plans = self.plan(&mut tree, &snapshot, &mut report);

        for plan in &plans {
            self.apply(&mut tree, plan, first_load, &mut report)?;
        }
        self.sweep_deleted(&mut tree, &snapshot, &mut report);
        tree.prune_empty_folders();
        tree.propagate_status();

        state.tree = tree;
        state.snapshot = snapshot;
        state.loaded = true;
        state.container_digest = Some(codec::digest(container_bytes));
        report.duration_ms = started.elapsed().as_millis() as u64;
        state.last_report = Some(report.clone());

        info!(
            first_load,
            added = report.added,
            changed = report.changed,
            unchanged = report.unchanged,
            tombstoned = report.tombstoned,
            removed = report.removed,
            duration_ms = report.duration_ms,
            "Reconciled container"
        );
        Ok(report)
    }

    /// Extend the tree and decide each leaf's action. Reads only.
    fn plan(
        &self,
        tree: &mut PartTree,
        snapshot: &ArchiveSnapshot,
        report: &mut SyncReport,
    ) -> Vec<LeafPlan> {
        let mirrorable: Vec<&str> = snapshot
            .file_paths()
            .filter(|path| match self.store.path_for(path, Role::Current) {
                Ok(_) => true,
                Err(e) => {
                    warn!(entry = %path, error = %e, "Skipping entry that cannot be mirrored");
                    report.skipped += 1;
                    false
                }
            })
            .collect();
        tree.extend(&mirrorable);

        let detector = ChangeDetector::new(self.store);
        let mut plans = Vec::new();
        for node in tree.leaves() {
            let full_path = tree.node(node).full_path.clone();
            let Some(bytes) = snapshot.get(&full_path) else {
                continue;
            };
            let rendered = self.store.render(bytes);
            let action = match detector.baseline(&full_path) {
                Baseline::Untracked => LeafAction::Create,
                Baseline::Present(previous) if previous != rendered => LeafAction::Changed {
                    old_previous: previous,
                },
                Baseline::Present(previous) => {
                    let tombstoned = tree.node(node).status == StatusIcon::DeletedPendingAck;
                    LeafAction::Unchanged {
                        rewrite_current: tombstoned
                            || self.current_needs_rewrite(&full_path, &previous, &rendered, report),
                    }
                }
                Baseline::Unreadable => LeafAction::Unchanged {
                    rewrite_current: true,
                },
            };
            plans.push(LeafPlan {
                node,
                full_path,
                rendered,
                action,
            });
        }
        plans
    }

    /// `current` is rewritten when it is missing or stale, but a pending user edit is kept.
    fn current_needs_rewrite(
        &self,
        full_path: &str,
        previous: &[u8],
        rendered: &[u8],
        report: &mut SyncReport,
    ) -> bool {
        match self.store.read_generation(full_path, Role::Current) {
            Ok(current) if current == rendered => false,
            Ok(current) if current != previous => {
                debug!(part = %full_path, "Keeping unsaved edit in current generation");
                report.pending_edits += 1;
                false
            }
            _ => true,
        }
    }

    fn apply(
        &self,
        tree: &mut PartTree,
        plan: &LeafPlan,
        first_load: bool,
        report: &mut SyncReport,
    ) -> Result<(), StorageError> {
        let path = plan.full_path.as_str();
        match &plan.action {
            LeafAction::Create => {
                self.store.write_generation(path, Role::Current, &plan.rendered)?;
                self.store.write_generation(path, Role::Previous, &plan.rendered)?;
                let status = if first_load {
                    StatusIcon::File
                } else {
                    self.store.write_generation(path, Role::Compare, &[])?;
                    debug!(part = %path, "New part");
                    StatusIcon::NewlyAdded
                };
                tree.set_status(plan.node, status);
                report.added += 1;
            }
            LeafAction::Changed { old_previous } => {
                self.store.write_generation(path, Role::Current, &plan.rendered)?;
                self.store.write_generation(path, Role::Compare, old_previous)?;
                self.store.write_generation(path, Role::Previous, &plan.rendered)?;
                tree.set_status(plan.node, StatusIcon::ChangedFromOutside);
                debug!(part = %path, "Part changed outside the editor");
                report.changed += 1;
            }
            LeafAction::Unchanged { rewrite_current } => {
                if *rewrite_current {
                    self.store.write_generation(path, Role::Current, &plan.rendered)?;
                }
                tree.set_status(plan.node, StatusIcon::File);
                report.unchanged += 1;
            }
        }
        Ok(())
    }

    /// Tombstone or remove leaves the container no longer has. Collect first, then mutate.
    fn sweep_deleted(&self, tree: &mut PartTree, snapshot: &ArchiveSnapshot, report: &mut SyncReport) {
        let present: HashSet<&str> = snapshot.file_paths().collect();
        let absent = tree.leaves_absent_from(&present);

        for node in absent {
            let full_path = tree.node(node).full_path.clone();
            if tree.node(node).status == StatusIcon::DeletedPendingAck {
                if let Err(e) = self.store.delete_generations(&full_path) {
                    warn!(part = %full_path, error = %e, "Failed to delete generations of removed part");
                    continue;
                }
                tree.remove(node);
                debug!(part = %full_path, "Removed part");
                report.removed += 1;
            } else {
                if let Err(e) = self.store.write_generation(&full_path, Role::Current, &[]) {
                    warn!(part = %full_path, error = %e, "Failed to tombstone removed part");
                }
                tree.set_status(node, StatusIcon::DeletedPendingAck);
                debug!(part = %full_path, "Tombstoned part");
                report.tombstoned += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RenderOptions;
    use crate::codec::{ArchiveEntry, ZipCodec};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: CacheStore,
        codec: ZipCodec,
        state: SyncState,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let store = CacheStore::new(temp.path().join(".partmirror"), RenderOptions::default());
            Self {
                _temp: temp,
                store,
                codec: ZipCodec::new(),
                state: SyncState::new(),
            }
        }

        fn container(&self, entries: &[(&str, &[u8])]) -> Vec<u8> {
            let snapshot = ArchiveSnapshot::from_entries(
                entries.iter().map(|(p, d)| ArchiveEntry::file(*p, d.to_vec())),
            );
            self.codec.encode(&snapshot).unwrap()
        }

        fn pass(&mut self, bytes: &[u8]) -> SyncReport {
            Reconciler::new(&self.store, &self.codec)
                .reconcile_bytes(&mut self.state, bytes)
                .unwrap()
        }

        fn read(&self, path: &str, role: Role) -> Vec<u8> {
            self.store.read_generation(path, role).unwrap()
        }

        fn status(&self, path: &str) -> StatusIcon {
            let tree = &self.state.tree;
            tree.node(tree.find(path).unwrap()).status
        }
    }

    #[test]
    fn test_first_load_has_no_markers_and_equal_generations() {
        let mut fx = Fixture::new();
        let bytes = fx.container(&[("a/x.xml", b"<a/>"), ("a/y.bin", &[0xDE, 0xAD])]);

        let report = fx.pass(&bytes);

        assert!(report.first_load);
        assert_eq!(report.added, 2);
        for path in ["a/x.xml", "a/y.bin"] {
            assert_eq!(fx.read(path, Role::Current), fx.read(path, Role::Previous));
            assert!(!fx.store.exists(path, Role::Compare));
            assert_eq!(fx.status(path), StatusIcon::File);
        }
        assert_eq!(fx.store.files().len(), 4);
    }

    #[test]
    fn test_second_pass_without_changes_is_idempotent() {
        let mut fx = Fixture::new();
        let bytes = fx.container(&[("a/x.xml", b"<a><b/></a>"), ("y.bin", b"\x00\x01")]);
        fx.pass(&bytes);
        let before: Vec<(std::path::PathBuf, Vec<u8>)> = fx
            .store
            .files()
            .into_iter()
            .map(|p| (p.clone(), std::fs::read(p).unwrap()))
            .collect();

        let report = fx.pass(&bytes);

        let after: Vec<(std::path::PathBuf, Vec<u8>)> = fx
            .store
            .files()
            .into_iter()
            .map(|p| (p.clone(), std::fs::read(p).unwrap()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(report.unchanged, 2);
        assert!(!report.has_changes());
    }

    #[test]
    fn test_external_change_moves_previous_into_compare() {
        let mut fx = Fixture::new();
        fx.pass(&fx.container(&[("a/x.xml", b"<a/>")]));
        let old_previous = fx.read("a/x.xml", Role::Previous);

        let report = fx.pass(&fx.container(&[("a/x.xml", b"<a b=\"1\"/>")]));

        assert_eq!(report.changed, 1);
        assert_eq!(fx.read("a/x.xml", Role::Compare), old_previous);
        assert_eq!(fx.read("a/x.xml", Role::Previous), b"<a b=\"1\"/>");
        assert_eq!(fx.read("a/x.xml", Role::Current), b"<a b=\"1\"/>");
        assert_eq!(fx.status("a/x.xml"), StatusIcon::ChangedFromOutside);
        assert_eq!(fx.status("a"), StatusIcon::ChangedFromOutside);

        fx.pass(&fx.container(&[("a/x.xml", b"<a b=\"1\"/>")]));
        assert_eq!(fx.status("a/x.xml"), StatusIcon::File);
        assert_eq!(fx.read("a/x.xml", Role::Compare), old_previous);
    }

    #[test]
    fn test_added_part_after_first_load_is_marked() {
        let mut fx = Fixture::new();
        fx.pass(&fx.container(&[("a.xml", b"<a/>")]));

        let report = fx.pass(&fx.container(&[("a.xml", b"<a/>"), ("b/c.xml", b"<c/>")]));

        assert_eq!(report.added, 1);
        assert_eq!(fx.status("b/c.xml"), StatusIcon::NewlyAdded);
        assert!(fx.read("b/c.xml", Role::Compare).is_empty());
        assert_eq!(fx.read("b/c.xml", Role::Current), fx.read("b/c.xml", Role::Previous));
    }

    #[test]
    fn test_deleted_part_takes_two_passes() {
        let mut fx = Fixture::new();
        fx.pass(&fx.container(&[("keep.xml", b"<k/>"), ("gone/x.xml", b"<x/>")]));
        let without = fx.container(&[("keep.xml", b"<k/>")]);

        let first = fx.pass(&without);
        assert_eq!(first.tombstoned, 1);
        assert!(fx.read("gone/x.xml", Role::Current).is_empty());
        assert_eq!(fx.status("gone/x.xml"), StatusIcon::DeletedPendingAck);

        let second = fx.pass(&without);
        assert_eq!(second.removed, 1);
        assert!(!fx.store.exists("gone/x.xml", Role::Current));
        assert!(!fx.store.exists("gone/x.xml", Role::Previous));
        assert!(fx.state.tree.find("gone/x.xml").is_none());
        assert!(fx.state.tree.find("gone").is_none());
    }

    #[test]
    fn test_part_returning_after_tombstone_is_restored() {
        let mut fx = Fixture::new();
        let with = fx.container(&[("x.xml", b"<x/>"), ("y.xml", b"<y/>")]);
        fx.pass(&with);
        fx.pass(&fx.container(&[("y.xml", b"<y/>")]));

        fx.pass(&with);

        assert_eq!(fx.read("x.xml", Role::Current), b"<x/>");
        assert_eq!(fx.status("x.xml"), StatusIcon::File);
    }

    #[test]
    fn test_unsaved_edit_survives_unchanged_container() {
        let mut fx = Fixture::new();
        let bytes = fx.container(&[("x.bin", b"one")]);
        fx.pass(&bytes);
        fx.store.write_generation("x.bin", Role::Current, b"edited").unwrap();

        let report = fx.pass(&bytes);

        assert_eq!(report.pending_edits, 1);
        assert_eq!(fx.read("x.bin", Role::Current), b"edited");
    }

    #[test]
    fn test_malformed_container_leaves_cache_untouched() {
        let mut fx = Fixture::new();
        fx.pass(&fx.container(&[("x.xml", b"<x/>")]));
        let files = fx.store.files();

        let result = Reconciler::new(&fx.store, &fx.codec).reconcile_bytes(&mut fx.state, b"garbage");

        assert!(matches!(result, Err(ApiError::CodecError(_))));
        assert_eq!(fx.store.files(), files);
        assert!(fx.state.snapshot.contains("x.xml"));
    }

    #[test]
    fn test_unsafe_entries_are_skipped() {
        let mut fx = Fixture::new();
        let report = fx.pass(&fx.container(&[("../escape.xml", b"<e/>"), ("ok.xml", b"<o/>")]));
        assert_eq!(report.skipped, 1);
        assert_eq!(report.added, 1);
        assert_eq!(fx.state.tree.leaves().len(), 1);
    }
}
