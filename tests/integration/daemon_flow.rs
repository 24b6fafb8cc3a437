//! The sync daemon driven through its handle.

use super::fixtures::{read_container, Workspace};
use partmirror::types::Role;
use partmirror::watch::{SyncDaemon, SyncEvent, WatchConfig};
use std::fs;
use std::time::{Duration, SystemTime};

fn config(purge_on_exit: bool) -> WatchConfig {
    WatchConfig {
        debounce_ms: 10,
        batch_window_ms: 50,
        purge_on_exit,
        ..WatchConfig::default()
    }
}

#[tokio::test]
async fn test_pending_save_is_flushed_on_stop() {
    let ws = Workspace::new(&[("a/x.xml", b"<a/>"), ("a/y.bin", &[0xDE, 0xAD])]);
    let mut session = ws.session();
    session.open().unwrap();
    let current = session.store().path_for("a/y.bin", Role::Current).unwrap();

    let daemon = SyncDaemon::new(session, config(false));
    let handle = daemon.handle();
    fs::write(&current, [0xBE, 0xEF]).unwrap();
    handle.submit(SyncEvent::CacheSaved {
        path: current.clone(),
        mtime: SystemTime::now() + Duration::from_secs(60),
    });
    handle.stop();
    daemon.run().await.unwrap();

    let decoded = read_container(&ws.container);
    assert_eq!(decoded.get("a/y.bin"), Some(&[0xBE, 0xEF][..]));
    assert_eq!(decoded.get("a/x.xml"), Some(&b"<a/>"[..]));
    let session = daemon.session();
    let session = session.lock();
    assert_eq!(
        session.store().read_generation("a/y.bin", Role::Previous).unwrap(),
        vec![0xBE, 0xEF]
    );
    assert!(ws.cache_root().exists());
}

#[tokio::test]
async fn test_container_change_runs_a_pass() {
    let ws = Workspace::new(&[("x.xml", b"<a/>")]);
    let mut session = ws.session();
    session.open().unwrap();

    let daemon = SyncDaemon::new(session, config(true));
    let handle = daemon.handle();
    ws.replace_container(&[("x.xml", b"<a/>"), ("new.xml", b"<n/>")]);
    handle.submit(SyncEvent::ContainerChanged);

    let run = daemon.run();
    tokio::pin!(run);
    // Let the batch window elapse before stopping.
    let early = tokio::time::timeout(Duration::from_millis(300), &mut run).await;
    assert!(early.is_err());
    {
        let session = daemon.session();
        let session = session.lock();
        assert!(session.tree().find("new.xml").is_some());
        assert_eq!(
            session.store().read_generation("new.xml", Role::Current).unwrap(),
            b"<n/>"
        );
    }
    handle.stop();
    run.await.unwrap();

    assert!(!ws.cache_root().exists());
}

#[tokio::test]
async fn test_run_before_open_still_stops_cleanly() {
    let ws = Workspace::new(&[("x.xml", b"<a/>")]);
    let daemon = SyncDaemon::new(ws.session(), config(false));
    daemon.handle().stop();
    daemon.run().await.unwrap();
    assert!(ws.cache_root().is_dir());
}
