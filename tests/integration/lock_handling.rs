//! Write-back against a container that cannot be replaced.

use super::fixtures::{read_container, EditorCall, Workspace};
use partmirror::types::Role;
use partmirror::writer::SaveOutcome;
use partmirror::ApiError;
use std::fs;
use std::time::{Duration, SystemTime};

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(unix)]
#[test]
fn test_locked_container_warns_and_retries() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new(&[("x.xml", b"<a/>")]);
    let mut session = ws.session();
    session.open().unwrap();
    let current = session.store().path_for("x.xml", Role::Current).unwrap();
    fs::write(&current, b"<b/>").unwrap();

    let dir = ws.temp.path();
    fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
    if fs::write(dir.join("write-check"), b"").is_ok() {
        // Privileged user; permissions are not enforced.
        let _ = fs::remove_file(dir.join("write-check"));
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = session.on_save(&current, at(10));
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(ApiError::ContainerLocked(_))));
    let calls = ws.editor.calls();
    assert!(calls.iter().any(|c| matches!(c, EditorCall::Warning(_))));
    assert!(calls.contains(&EditorCall::ForceDirty(current.clone())));
    assert_eq!(read_container(&ws.container).get("x.xml"), Some(&b"<a/>"[..]));
    assert_eq!(
        session.store().read_generation("x.xml", Role::Previous).unwrap(),
        b"<a/>"
    );

    // Same mtime again: the failed attempt must not debounce the retry.
    let outcome = session.on_save(&current, at(10)).unwrap();
    assert!(matches!(outcome, SaveOutcome::Written { .. }));
    assert_eq!(read_container(&ws.container).get("x.xml"), Some(&b"<b/>"[..]));
}

#[test]
fn test_failed_write_leaves_container_and_baseline() {
    let ws = Workspace::new(&[("x.xml", b"<a/>")]);
    let mut session = ws.session();
    session.open().unwrap();
    let current = session.store().path_for("x.xml", Role::Current).unwrap();
    fs::write(&current, b"<b/>").unwrap();

    // A directory squatting on the temp file path makes the write fail.
    let squatter = ws.temp.path().join(".doc.zip.partmirror-tmp");
    fs::create_dir(&squatter).unwrap();
    fs::write(squatter.join("keep"), b"").unwrap();

    let result = session.on_save(&current, at(10));

    assert!(result.is_err());
    assert_eq!(read_container(&ws.container).get("x.xml"), Some(&b"<a/>"[..]));
    assert_eq!(
        session.store().read_generation("x.xml", Role::Previous).unwrap(),
        b"<a/>"
    );
    assert!(!session.store().exists("x.xml", Role::Compare));
    assert!(session.state().snapshot.get("x.xml") == Some(&b"<a/>"[..]));
}
