use rusqlite::Connection;
use tempfile::tempdir;

use crate::error::KeystoneError;
use crate::models::EpisodeRecord;

use super::*;

fn record(id: &str, sequence: u64, payload: &[u8]) -> EpisodeRecord {
    EpisodeRecord {
        id: id.to_string(),
        payload: payload.to_vec(),
        sequence,
        size_bytes: payload.len() as u64,
        enqueued_at: 1_700_000_000_000,
        retry_count: 0,
    }
}

#[test]
fn insert_and_peek_oldest_by_sequence() {
    let temp = tempdir().expect("tempdir");
    let mut store = EpisodeStore::open(temp.path().join("queue.db")).expect("open");

    store.insert(&record("ep-b", 7, b"bb")).expect("insert b");
    store.insert(&record("ep-a", 3, b"a")).expect("insert a");

    let oldest = store.peek_oldest().expect("peek").expect("non-empty");
    assert_eq!(oldest.id, "ep-a");
    assert_eq!(oldest.sequence, 3);
    assert_eq!(oldest.payload, b"a".to_vec());

    // peek is read-only
    assert_eq!(store.count().expect("count"), 2);
    assert_eq!(store.total_bytes().expect("bytes"), 3);
}

#[test]
fn insert_rejects_duplicate_id() {
    let temp = tempdir().expect("tempdir");
    let mut store = EpisodeStore::open(temp.path().join("queue.db")).expect("open");

    store.insert(&record("ep-1", 1, b"x")).expect("insert");
    let err = store
        .insert(&record("ep-1", 2, b"y"))
        .expect_err("duplicate must fail");
    assert!(matches!(err, KeystoneError::DuplicateId(id) if id == "ep-1"));
    assert_eq!(store.count().expect("count"), 1);
}

#[test]
fn delete_by_id_reports_missing_rows() {
    let temp = tempdir().expect("tempdir");
    let mut store = EpisodeStore::open(temp.path().join("queue.db")).expect("open");

    store.insert(&record("ep-1", 1, b"x")).expect("insert");
    store.delete_by_id("ep-1").expect("delete");
    assert!(store.peek_oldest().expect("peek").is_none());

    let err = store.delete_by_id("ep-1").expect_err("second delete");
    assert!(matches!(err, KeystoneError::NotFound(_)));
    assert!(!store.delete_if_present("ep-1").expect("idempotent delete"));
}

#[test]
fn recover_max_sequence_survives_emptied_table() {
    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("queue.db");
    {
        let mut store = EpisodeStore::open(&db_path).expect("open");
        assert_eq!(store.recover_max_sequence().expect("fresh"), None);
        store.insert(&record("ep-1", 41, b"x")).expect("insert");
        store.delete_by_id("ep-1").expect("delete");
        store.close().expect("close");
    }

    let store = EpisodeStore::open(&db_path).expect("reopen");
    assert_eq!(store.count().expect("count"), 0);
    assert_eq!(store.recover_max_sequence().expect("recover"), Some(41));
}

#[test]
fn high_water_mark_never_regresses() {
    let temp = tempdir().expect("tempdir");
    let mut store = EpisodeStore::open(temp.path().join("queue.db")).expect("open");

    store.record_high_water(50).expect("raise");
    store.record_high_water(10).expect("lower attempt");
    assert_eq!(store.recover_max_sequence().expect("recover"), Some(50));

    store.insert(&record("ep-1", 60, b"x")).expect("insert");
    assert_eq!(store.recover_max_sequence().expect("recover"), Some(60));
}

#[test]
fn dead_letters_are_kept_apart_from_pending_episodes() {
    let temp = tempdir().expect("tempdir");
    let mut store = EpisodeStore::open(temp.path().join("queue.db")).expect("open");

    let fixture = record("ep-dead", 5, b"payload");
    store
        .insert_dead_letter(&fixture, "first failure")
        .expect("dead letter");
    store
        .insert_dead_letter(&fixture, "retry budget exhausted")
        .expect("replace dead letter");

    assert_eq!(store.count().expect("count"), 0);
    assert_eq!(store.count_dead_letters().expect("dead count"), 1);
    let parked = store.list_dead_letters(10).expect("list");
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].episode.id, "ep-dead");
    assert_eq!(parked[0].episode.sequence, 5);
    assert_eq!(parked[0].reason, "retry budget exhausted");
    assert!(store.list_dead_letters(0).expect("empty list").is_empty());
}

#[test]
fn legacy_sync_queue_rows_are_imported_in_rowid_order() {
    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("queue.db");
    {
        let conn = Connection::open(&db_path).expect("legacy open");
        conn.execute_batch(
            r"
            CREATE TABLE sync_queue (
                id TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            INSERT INTO sync_queue(id, data, created_at) VALUES ('ep-z', x'01', 0);
            INSERT INTO sync_queue(id, data, created_at) VALUES ('ep-a', x'0203', 0);
            ",
        )
        .expect("legacy schema");
    }

    let mut store = EpisodeStore::open(&db_path).expect("open migrates");
    assert_eq!(store.count().expect("count"), 2);
    assert_eq!(store.total_bytes().expect("bytes"), 3);

    let first = store.peek_oldest().expect("peek").expect("first");
    assert_eq!(first.id, "ep-z");
    assert_eq!(first.sequence, 1);
    store.delete_by_id("ep-z").expect("delete");
    let second = store.peek_oldest().expect("peek").expect("second");
    assert_eq!(second.id, "ep-a");
    assert_eq!(second.sequence, 2);

    drop(store);
    let reopened = EpisodeStore::open(&db_path).expect("reopen");
    assert_eq!(reopened.count().expect("count"), 1);
}

#[test]
fn legacy_import_continues_after_high_water_and_skips_known_ids() {
    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("queue.db");
    {
        let mut store = EpisodeStore::open(&db_path).expect("open");
        store.insert(&record("ep-keep", 4, b"k")).expect("insert");
        store.record_high_water(9).expect("high water");
    }
    {
        let conn = Connection::open(&db_path).expect("raw open");
        conn.execute_batch(
            r"
            CREATE TABLE sync_queue (
                id TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            INSERT INTO sync_queue(id, data, created_at) VALUES ('ep-keep', x'09', 0);
            INSERT INTO sync_queue(id, data, created_at) VALUES ('ep-new', x'0102', 0);
            ",
        )
        .expect("legacy rows");
    }

    let mut store = EpisodeStore::open(&db_path).expect("open migrates");
    assert_eq!(store.count().expect("count"), 2);
    // The skipped duplicate does not consume a sequence number.
    assert_eq!(store.recover_max_sequence().expect("recover"), Some(10));

    let kept = store.peek_oldest().expect("peek").expect("kept");
    assert_eq!(kept.id, "ep-keep");
    assert_eq!(kept.payload, b"k".to_vec());
    store.delete_by_id("ep-keep").expect("delete");
    let imported = store.peek_oldest().expect("peek").expect("imported");
    assert_eq!(imported.id, "ep-new");
    assert_eq!(imported.sequence, 10);
}

#[test]
fn dead_letters_can_be_deleted_and_purged() {
    let temp = tempdir().expect("tempdir");
    let mut store = EpisodeStore::open(temp.path().join("queue.db")).expect("open");

    store
        .insert_dead_letter(&record("ep-1", 1, b"abc"), "exhausted")
        .expect("dead letter 1");
    store
        .insert_dead_letter(&record("ep-2", 2, b"de"), "exhausted")
        .expect("dead letter 2");
    assert_eq!(store.dead_letter_bytes().expect("bytes"), 5);

    store.delete_dead_letter("ep-1").expect("delete");
    let err = store.delete_dead_letter("ep-1").expect_err("already gone");
    assert!(matches!(err, KeystoneError::NotFound(_)));
    assert_eq!(store.count_dead_letters().expect("count"), 1);

    assert_eq!(store.purge_dead_letters().expect("purge"), 1);
    assert_eq!(store.count_dead_letters().expect("count"), 0);
    assert_eq!(store.dead_letter_bytes().expect("bytes"), 0);
}

#[test]
fn open_rejects_episodes_table_without_retry_count() {
    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("queue.db");
    {
        let conn = Connection::open(&db_path).expect("open raw");
        conn.execute_batch(
            r"
            CREATE TABLE episodes (
                id TEXT PRIMARY KEY,
                sequence INTEGER NOT NULL,
                payload BLOB NOT NULL,
                size_bytes INTEGER NOT NULL,
                enqueued_at INTEGER NOT NULL
            );
            ",
        )
        .expect("old schema");
    }

    let err = EpisodeStore::open(&db_path).expect_err("schema check");
    assert!(matches!(err, KeystoneError::Validation(_)));
}

#[cfg(unix)]
#[test]
fn open_hardens_queue_db_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("queue.db");
    let mut store = EpisodeStore::open(&db_path).expect("open");
    store.insert(&record("ep-1", 1, b"x")).expect("insert");

    let mode = std::fs::metadata(&db_path)
        .expect("metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}
