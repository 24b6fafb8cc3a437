//! End-to-end session behaviour on a small two-part container.

use super::fixtures::{read_container, write_container, EditorCall, Workspace};
use partmirror::tree::StatusIcon;
use partmirror::types::{ChangeKind, Role};
use partmirror::writer::SaveOutcome;
use std::fs;
use std::time::{Duration, SystemTime};

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

fn doc() -> Workspace {
    Workspace::new(&[("a/x.xml", b"<a/>"), ("a/y.bin", &[0xDE, 0xAD])])
}

#[test]
fn test_external_change_then_user_save() {
    let ws = doc();
    let mut session = ws.session();

    let report = session.open().unwrap();
    assert!(report.first_load);
    assert_eq!(report.added, 2);

    let tree = session.tree();
    let a = tree.find("a").unwrap();
    let children: Vec<&str> = tree
        .node(a)
        .children
        .iter()
        .map(|id| tree.node(*id).name.as_str())
        .collect();
    assert_eq!(children, vec!["x.xml", "y.bin"]);
    assert_eq!(session.store().files().len(), 4);
    for part in ["a/x.xml", "a/y.bin"] {
        assert!(!session.store().exists(part, Role::Compare));
        assert_eq!(
            session.store().read_generation(part, Role::Current).unwrap(),
            session.store().read_generation(part, Role::Previous).unwrap()
        );
    }

    ws.replace_container(&[("a/x.xml", b"<a b=\"1\"/>"), ("a/y.bin", &[0xDE, 0xAD])]);
    let report = session.on_container_changed().unwrap().unwrap();
    assert_eq!(report.changed, 1);
    assert_eq!(report.unchanged, 1);

    let store = session.store();
    assert_eq!(store.read_generation("a/x.xml", Role::Compare).unwrap(), b"<a/>");
    assert_eq!(store.read_generation("a/x.xml", Role::Previous).unwrap(), b"<a b=\"1\"/>");
    assert_eq!(store.read_generation("a/x.xml", Role::Current).unwrap(), b"<a b=\"1\"/>");
    let x = session.tree().find("a/x.xml").unwrap();
    assert_eq!(session.tree().node(x).status, StatusIcon::ChangedFromOutside);
    assert_eq!(session.tree().node(a).status, StatusIcon::ChangedFromOutside);

    let y_current = store.path_for("a/y.bin", Role::Current).unwrap();
    fs::write(&y_current, [0xBE, 0xEF]).unwrap();
    let outcome = session.on_save(&y_current, at(10)).unwrap();
    assert!(matches!(outcome, SaveOutcome::Written { ref part, .. } if part == "a/y.bin"));

    let decoded = read_container(&ws.container);
    assert_eq!(decoded.get("a/x.xml"), Some(&b"<a b=\"1\"/>"[..]));
    assert_eq!(decoded.get("a/y.bin"), Some(&[0xBE, 0xEF][..]));
    let store = session.store();
    assert_eq!(store.read_generation("a/y.bin", Role::Compare).unwrap(), vec![0xDE, 0xAD]);
    assert_eq!(store.read_generation("a/y.bin", Role::Previous).unwrap(), vec![0xBE, 0xEF]);

    // The watcher echo of our own write does not trigger a pass.
    assert!(session.on_container_changed().unwrap().is_none());
}

#[test]
fn test_rerun_without_changes_is_byte_identical() {
    let ws = doc();
    let mut session = ws.session();
    session.open().unwrap();
    let before: Vec<(std::path::PathBuf, Vec<u8>)> = session
        .store()
        .files()
        .into_iter()
        .map(|p| {
            let bytes = fs::read(&p).unwrap();
            (p, bytes)
        })
        .collect();

    let report = session.reconcile().unwrap().unwrap();

    assert!(!report.has_changes());
    let after: Vec<(std::path::PathBuf, Vec<u8>)> = session
        .store()
        .files()
        .into_iter()
        .map(|p| {
            let bytes = fs::read(&p).unwrap();
            (p, bytes)
        })
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_deleted_entry_takes_two_passes() {
    let ws = doc();
    let mut session = ws.session();
    session.open().unwrap();
    let y_current = session.store().path_for("a/y.bin", Role::Current).unwrap();

    ws.replace_container(&[("a/x.xml", b"<a/>")]);
    let report = session.reconcile().unwrap().unwrap();
    assert_eq!(report.tombstoned, 1);
    assert_eq!(fs::read(&y_current).unwrap(), Vec::<u8>::new());
    let status = session.status().unwrap();
    assert!(status
        .iter()
        .any(|s| s.part == "a/y.bin" && s.kind == ChangeKind::Deleted));

    let report = session.reconcile().unwrap().unwrap();
    assert_eq!(report.removed, 1);
    assert!(!y_current.exists());
    assert!(session.tree().find("a/y.bin").is_none());
}

#[test]
fn test_view_and_diff_reach_the_editor() {
    let ws = doc();
    let mut session = ws.session();
    session.open().unwrap();

    let current = session.view_part("a/x.xml").unwrap();
    let target = session.diff_part("a/x.xml").unwrap();

    let calls = ws.editor.calls();
    assert!(calls.contains(&EditorCall::Open(current.clone())));
    assert!(calls.contains(&EditorCall::Diff {
        left: target.left.clone(),
        right: current,
    }));
    assert!(calls.contains(&EditorCall::Refresh { leaves: 2 }));
}

#[test]
fn test_reset_discards_unsaved_edits() {
    let ws = doc();
    let mut session = ws.session();
    session.open().unwrap();
    let current = session.store().path_for("a/x.xml", Role::Current).unwrap();
    fs::write(&current, b"<edited/>").unwrap();

    session.reset().unwrap();

    assert_eq!(fs::read(&current).unwrap(), b"<a/>");
    assert!(ws
        .editor
        .calls()
        .contains(&EditorCall::CloseTabsUnder(ws.cache_root())));
}

#[test]
fn test_sibling_containers_keep_separate_caches() {
    let ws = Workspace::new(&[("x.xml", b"<one/>")]);
    let other = ws.temp.path().join("doc2.zip");
    write_container(&other, &[("x.xml", b"<two/>")]);
    let mut first = ws.session();
    let mut second = ws.session_for(&other);
    first.open().unwrap();
    second.open().unwrap();

    let first_view = first.view_part("x.xml").unwrap();
    let second_view = second.view_part("x.xml").unwrap();
    assert_ne!(first_view, second_view);
    assert_eq!(fs::read(&first_view).unwrap(), b"<one/>");

    fs::write(&first_view, b"<one edited=\"1\"/>").unwrap();
    first.on_save(&first_view, at(10)).unwrap();
    assert_eq!(
        read_container(&ws.container).get("x.xml"),
        Some(&b"<one edited=\"1\"/>"[..])
    );
    assert_eq!(read_container(&other).get("x.xml"), Some(&b"<two/>"[..]));

    second.close().unwrap();
    assert_eq!(fs::read(&first_view).unwrap(), b"<one edited=\"1\"/>");
    first.close().unwrap();
    assert!(!ws.temp.path().join(".partmirror").exists());
}
