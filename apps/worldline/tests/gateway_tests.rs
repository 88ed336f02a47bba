//! Integration tests for the save stores.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use worldline::config::Backend;
use worldline::gateway::{
    FileStore, RedbStore, SaveStore, load_engine, open_store_at, save_engine,
};
use worldline_core::{GitEngine, ManualClock, Position, ResetMode, WorldSnapshot, WorldlineError};

fn busy_engine() -> GitEngine {
    let mut engine = GitEngine::with_clock(
        &WorldSnapshot::default(),
        Arc::new(ManualClock::stepping(5_000, 25)),
    )
    .unwrap();
    engine
        .commit("a", &WorldSnapshot::new(Position::planar(1, 0)))
        .unwrap();
    engine.checkout_new_branch("feat").unwrap();
    engine
        .commit("b", &WorldSnapshot::new(Position::planar(2, 0)).with_cell("gem", "red"))
        .unwrap();
    engine.checkout("main").unwrap();
    engine
}

// =============================================================================
// FILE STORE
// =============================================================================

#[test]
fn file_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("none.wldx"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("world.wldx"));
    let engine = busy_engine();

    save_engine(&store, &engine).unwrap();
    let restored = load_engine(&store).unwrap();

    assert_eq!(restored.export(), engine.export());
    assert_eq!(restored.head(), engine.head());
    assert_eq!(restored.branch_color("feat"), engine.branch_color("feat"));
}

#[test]
fn file_store_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("world.wldx"));
    save_engine(&store, &busy_engine()).unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("world.wldx")]);
}

#[test]
fn file_store_reads_json_exports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hand-edited.json");
    let engine = busy_engine();
    std::fs::write(&path, serde_json::to_vec_pretty(&engine.export()).unwrap()).unwrap();

    let document = FileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(document, engine.export());
}

#[test]
fn file_store_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.wldx");
    std::fs::write(&path, b"definitely not a graph").unwrap();

    assert!(FileStore::new(&path).load().is_err());
}

#[test]
fn file_store_reports_checksum_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.wldx");
    let store = FileStore::new(&path);
    save_engine(&store, &busy_engine()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    match store.load() {
        Err(WorldlineError::ImportMalformed(reason)) => assert!(reason.contains("checksum")),
        other => panic!("expected a checksum failure, got {:?}", other),
    }
}

#[test]
fn engine_keeps_working_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("world.wldx"));
    save_engine(&store, &busy_engine()).unwrap();

    let mut engine = load_engine(&store).unwrap();
    engine.merge("feat").unwrap();
    engine
        .reset("HEAD~1", ResetMode::Hard, &WorldSnapshot::default())
        .unwrap();
    save_engine(&store, &engine).unwrap();

    let reloaded = load_engine(&store).unwrap();
    assert_eq!(reloaded.branch_names(), vec!["main"]);
    assert_eq!(reloaded.commit_count(), 2);
}

// =============================================================================
// REDB STORE
// =============================================================================

#[test]
fn redb_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.redb");
    let engine = busy_engine();

    {
        let store = RedbStore::open(&path).unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(store.digest().unwrap().is_none());
        save_engine(&store, &engine).unwrap();
    }

    let store = RedbStore::open(&path).unwrap();
    let restored = load_engine(&store).unwrap();
    assert_eq!(restored.export(), engine.export());

    let digest = store.digest().unwrap().unwrap();
    assert_eq!(
        digest,
        worldline_core::canonical_digest(&engine.export()).unwrap()
    );
}

#[test]
fn clear_empties_both_backends() {
    let dir = tempfile::tempdir().unwrap();
    let engine = busy_engine();

    let file = FileStore::new(dir.path().join("world.wldx"));
    save_engine(&file, &engine).unwrap();
    file.clear().unwrap();
    assert!(file.load().unwrap().is_none());
    file.clear().unwrap();

    let db = RedbStore::open(dir.path().join("world.redb")).unwrap();
    save_engine(&db, &engine).unwrap();
    db.clear().unwrap();
    assert!(db.load().unwrap().is_none());
    assert!(db.digest().unwrap().is_none());
}

#[test]
fn redb_backend_falls_back_to_file() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be opened as a database.
    let blocked = dir.path().join("blocked");
    std::fs::create_dir(&blocked).unwrap();

    let store = open_store_at(&blocked, Backend::Redb);
    assert_eq!(store.name(), "file");

    save_engine(store.as_ref(), &busy_engine()).unwrap();
    assert!(dir.path().join("blocked.fallback.wldx").is_file());
}

#[test]
fn open_store_picks_backend() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        open_store_at(&dir.path().join("a.wldx"), Backend::File).name(),
        "file"
    );
    assert_eq!(
        open_store_at(&dir.path().join("a.redb"), Backend::Redb).name(),
        "redb"
    );
}
