//! End-to-end scenarios against on-disk environments.

use tempfile::tempdir;
use warrendb_core::{Database, Options, StoreError, MAX_KEY_SIZE};

#[test]
fn open_close_reopen() {
    let dir = tempdir().unwrap();

    let mut db = Database::open(dir.path()).unwrap();
    db.close().unwrap();

    let mut db = Database::open(dir.path()).unwrap();
    db.close().unwrap();
}

#[tokio::test]
async fn single_put_get() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    db.put("key", vec![0x01, 0x02, 0x03]).unwrap().await.unwrap();
    assert_eq!(
        db.get("key").unwrap().await.unwrap(),
        Some(vec![0x01, 0x02, 0x03])
    );
}

#[tokio::test]
async fn batched_puts_inside_explicit_transaction() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    db.start_write_transaction().unwrap().await.unwrap();
    let mut pendings = Vec::with_capacity(20_000);
    for i in 0..20_000u32 {
        let pending = db.put(i.to_string(), i.to_le_bytes().to_vec()).unwrap();
        pendings.push(pending);
    }
    db.commit_write_transaction().unwrap().await.unwrap();

    // Every participating put resolves with the commit.
    for pending in pendings {
        pending.await.unwrap();
    }
    for i in (0..20_000u32).step_by(997) {
        assert_eq!(
            db.get_sync(i.to_string()).unwrap(),
            Some(i.to_le_bytes().to_vec())
        );
    }
}

#[tokio::test]
async fn implicit_batching_keeps_every_write() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    let mut pendings = Vec::with_capacity(1_000);
    for i in 0..1_000u32 {
        let key = format!("{i:0>64}");
        let value = vec![(i % 251) as u8; 64];
        pendings.push((key.clone(), value.clone(), db.put(key, value).unwrap()));
    }
    for (key, value, pending) in pendings {
        pending.await.unwrap();
        assert_eq!(db.get_sync(&key).unwrap(), Some(value));
    }
}

#[tokio::test]
async fn snapshot_isolation_until_reset() {
    let dir = tempdir().unwrap();
    let reader = Database::open(dir.path()).unwrap();
    let writer = Database::open(dir.path()).unwrap();

    reader.start_read_transaction().unwrap();
    assert_eq!(reader.get_sync("k").unwrap(), None);

    writer.put("k", vec![42]).unwrap().await.unwrap();

    // The reader's snapshot predates the commit.
    assert_eq!(reader.get_sync("k").unwrap(), None);

    reader.reset_read_txn().unwrap();
    assert_eq!(reader.get_sync("k").unwrap(), Some(vec![42]));
}

#[tokio::test]
async fn failed_write_rolls_back_the_transaction() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    db.start_write_transaction().unwrap().await.unwrap();
    let first = db.put("a", vec![1]).unwrap();
    let oversized = db.put(vec![0u8; MAX_KEY_SIZE + 1], vec![2]).unwrap();

    assert!(matches!(
        oversized.await,
        Err(StoreError::KeyTooLarge { .. })
    ));
    assert!(matches!(first.await, Err(StoreError::KeyTooLarge { .. })));

    // The commit reports the same failure.
    let committed = db.commit_write_transaction().unwrap();
    assert!(matches!(
        committed.await,
        Err(StoreError::KeyTooLarge { .. })
    ));

    assert_eq!(db.get_sync("a").unwrap(), None);
}

#[tokio::test]
async fn last_write_wins_in_submission_order() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    let mut pendings = Vec::new();
    for i in 0..100u8 {
        pendings.push(db.put("key", vec![i]).unwrap());
    }
    for pending in pendings {
        pending.await.unwrap();
    }
    assert_eq!(db.get_sync("key").unwrap(), Some(vec![99]));
}

#[tokio::test]
async fn empty_value_roundtrips() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    db.put("empty", Vec::new()).unwrap().await.unwrap();
    assert_eq!(db.get_sync("empty").unwrap(), Some(Vec::new()));
}

#[tokio::test]
async fn key_size_boundary() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    let largest = vec![0xABu8; MAX_KEY_SIZE];
    db.put(largest.clone(), vec![1]).unwrap().await.unwrap();
    assert_eq!(db.get_sync(&largest).unwrap(), Some(vec![1]));

    let too_large = vec![0xABu8; MAX_KEY_SIZE + 1];
    assert!(matches!(
        db.put(too_large, vec![1]).unwrap().await,
        Err(StoreError::KeyTooLarge { .. })
    ));
}

#[tokio::test]
async fn map_full_surfaces_without_corruption() {
    let dir = tempdir().unwrap();
    let db =
        Database::open_with_options(dir.path(), Options::new().map_size(1024 * 1024)).unwrap();

    db.put("first", vec![1]).unwrap().await.unwrap();

    let mut saw_map_full = false;
    for i in 0..1_000u32 {
        match db.put(format!("fill-{i}"), vec![0u8; 4096]).unwrap().await {
            Ok(()) => {}
            Err(StoreError::MapFull) => {
                saw_map_full = true;
                break;
            }
            Err(other) => panic!("expected MapFull, got {other}"),
        }
    }
    assert!(saw_map_full, "1 MiB map absorbed 4 MiB of values");

    // The environment survives; earlier commits are intact.
    assert_eq!(db.get_sync("first").unwrap(), Some(vec![1]));
}

#[tokio::test]
async fn durable_across_reopen() {
    let dir = tempdir().unwrap();

    {
        let mut db = Database::open(dir.path()).unwrap();
        db.put("durable", vec![7, 8, 9]).unwrap().await.unwrap();
        db.close().unwrap();
    }

    let db = Database::open(dir.path()).unwrap();
    assert_eq!(db.get_sync("durable").unwrap(), Some(vec![7, 8, 9]));
}

#[tokio::test]
async fn transaction_misuse_is_deterministic() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    // Without a window, commit is rejected before it is enqueued.
    assert!(matches!(
        db.commit_write_transaction(),
        Err(StoreError::NoTransaction)
    ));

    db.start_write_transaction().unwrap().await.unwrap();
    assert!(matches!(
        db.start_write_transaction(),
        Err(StoreError::TransactionAlreadyOpen)
    ));

    // A second facade's start is rejected by the worker itself.
    let other = Database::open(dir.path()).unwrap();
    assert!(matches!(
        other.start_write_transaction().unwrap().await,
        Err(StoreError::TransactionAlreadyOpen)
    ));

    db.commit_write_transaction().unwrap().await.unwrap();
}

#[tokio::test]
async fn reads_after_completion_observe_the_write() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    db.put("k", vec![5]).unwrap().await.unwrap();

    // A read transaction started after the completion sees the write.
    db.start_read_transaction().unwrap();
    assert_eq!(db.get_sync("k").unwrap(), Some(vec![5]));
    db.commit_read_transaction().unwrap();
}
