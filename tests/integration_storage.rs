//! Integration tests for the on-disk pieces: cache file, checkpoints and mover.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use image_deduper::core::cache::{ImageCacheStore, CACHE_FILE_NAME};
use image_deduper::core::checkpoint::{ResumeState, ResumeStore, RESUME_FILE_NAME};
use image_deduper::core::imaging::ImageRecord;
use image_deduper::core::logging::RunLogger;
use image_deduper::core::mover::{MoveOutcome, SafeFileMover};
use image_deduper::error::MoveError;
use predicates::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

fn logger() -> Arc<RunLogger> {
    Arc::new(RunLogger::default())
}

fn record(name: &str) -> ImageRecord {
    ImageRecord {
        path: PathBuf::from("/library").join(name),
        width: 640,
        height: 480,
        length: 123_456,
        phash: 0xDEAD_BEEF_0000_FFFF,
        digest: "a9993e364706816aba3e25717850c26c9cd0d89d".to_string(),
        pixels: vec![0.0, 12.4, 127.6, 255.0],
    }
}

#[test]
fn cache_survives_a_restart() {
    let temp = TempDir::new().unwrap();
    let store = ImageCacheStore::new(CACHE_FILE_NAME, logger());
    store.append(temp.path(), &record("a.jpg")).unwrap();
    store.append(temp.path(), &record("b.jpg")).unwrap();

    let reopened = ImageCacheStore::new(CACHE_FILE_NAME, logger());
    let snapshot = reopened.load(temp.path());

    assert_eq!(snapshot.len(), 2);
    let loaded = snapshot.get(&PathBuf::from("/library/a.jpg")).unwrap();
    assert_eq!(loaded.phash, 0xDEAD_BEEF_0000_FFFF);
    assert_eq!(loaded.pixels, vec![0.0, 12.0, 128.0, 255.0]);
}

#[test]
fn foreign_cache_file_is_discarded() {
    let temp = TempDir::new().unwrap();
    temp.child(CACHE_FILE_NAME).write_binary(b"JFIF garbage").unwrap();

    let snapshot = ImageCacheStore::new(CACHE_FILE_NAME, logger()).load(temp.path());

    assert!(snapshot.is_empty());
    temp.child(CACHE_FILE_NAME).assert(predicate::path::missing());
}

#[test]
fn resume_state_is_plain_json() {
    let temp = TempDir::new().unwrap();
    let store = ResumeStore::new(RESUME_FILE_NAME);
    let state = ResumeState {
        i: 3,
        j: 7,
        moved: BTreeSet::from([PathBuf::from("/library/b.jpg"), PathBuf::from("/library/a.jpg")]),
        current_progress: 42,
    };

    store.save(temp.path(), &state).unwrap();

    temp.child(RESUME_FILE_NAME)
        .assert(predicate::str::contains("\"currentProgress\": 42"));
    assert_eq!(store.load(temp.path()), Some(state));
}

#[test]
fn identical_destination_leaves_one_copy() {
    let temp = TempDir::new().unwrap();
    temp.child("duplicates").create_dir_all().unwrap();
    temp.child("photo.jpg").write_binary(b"same bytes").unwrap();
    temp.child("duplicates/photo.jpg").write_binary(b"same bytes").unwrap();

    let outcome = SafeFileMover::new(logger())
        .move_file(
            temp.child("photo.jpg").path(),
            temp.child("duplicates/photo.jpg").path(),
        )
        .unwrap();

    assert!(matches!(
        outcome,
        MoveOutcome::SourceRemoved | MoveOutcome::DestinationReplaced
    ));
    temp.child("photo.jpg").assert(predicate::path::missing());
    temp.child("duplicates/photo.jpg").assert("same bytes");
}

#[test]
fn different_destination_is_refused() {
    let temp = TempDir::new().unwrap();
    temp.child("duplicates").create_dir_all().unwrap();
    temp.child("photo.jpg").write_binary(b"mine").unwrap();
    temp.child("duplicates/photo.jpg").write_binary(b"theirs").unwrap();

    let result = SafeFileMover::new(logger()).move_file(
        temp.child("photo.jpg").path(),
        temp.child("duplicates/photo.jpg").path(),
    );

    assert!(matches!(result, Err(MoveError::Conflict { .. })));
    temp.child("photo.jpg").assert("mine");
    temp.child("duplicates/photo.jpg").assert("theirs");
}

#[test]
fn problem_file_gets_a_free_name() {
    let temp = TempDir::new().unwrap();
    temp.child("duplicates").create_dir_all().unwrap();
    temp.child("scan.png").write_binary(b"broken one").unwrap();
    temp.child("duplicates/scan.png").write_binary(b"broken two").unwrap();

    let relocated = SafeFileMover::new(logger())
        .relocate_problem_file(temp.child("scan.png").path(), temp.child("duplicates").path())
        .unwrap();

    assert_eq!(relocated, temp.child("duplicates/scan (1).png").path());
    temp.child("duplicates/scan (1).png").assert("broken one");
    temp.child("duplicates/scan.png").assert("broken two");
}
