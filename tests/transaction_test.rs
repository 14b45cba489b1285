//! Integration tests for transaction functionality.

use dbkit::{DataAccess, DbError, PoolRegistry, Profile, entity, params};
use std::sync::Arc;
use tempfile::NamedTempFile;

entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Entry {
        pub id: i64 => "Id",
        pub label: String => "Label",
    }
}

fn temp_db_path() -> String {
    NamedTempFile::new()
        .unwrap()
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

fn facade_for(path: &str) -> DataAccess {
    let registry = Arc::new(PoolRegistry::new());
    let profile = Profile::new("app", None, format!("sqlite:{}", path), "sqlite")
        .unwrap()
        .with_max_pool_size(4);
    DataAccess::new(registry, profile)
}

async fn setup_db() -> (DataAccess, String) {
    let path = temp_db_path();
    let db = facade_for(&path);
    db.execute_update("CREATE TABLE entry (Id INTEGER PRIMARY KEY, Label TEXT)", &[])
        .await
        .unwrap();
    (db, path)
}

#[tokio::test]
async fn test_inserts_invisible_until_commit() {
    let (db, path) = setup_db().await;

    let mut tx = db.begin_transaction().await.unwrap();
    tx.execute_update(
        "INSERT INTO entry (Id, Label) VALUES (?, ?)",
        &params![1i64, "one"],
    )
    .await
    .unwrap();
    tx.execute_update(
        "INSERT INTO entry (Id, Label) VALUES (?, ?)",
        &params![2i64, "two"],
    )
    .await
    .unwrap();

    // A fresh, separate connection must not see uncommitted writes
    let outsider = facade_for(&path);
    let seen: Vec<Entry> = outsider
        .query_for_list("SELECT * FROM entry", &[])
        .await
        .unwrap();
    assert!(seen.is_empty(), "uncommitted inserts leaked");

    // The transaction itself sees its own writes
    let own: Vec<Entry> = tx.query_for_list("SELECT * FROM entry", &[]).await.unwrap();
    assert_eq!(own.len(), 2);

    tx.commit().await.unwrap();

    let seen: Vec<Entry> = outsider
        .query_for_list("SELECT * FROM entry ORDER BY Id", &[])
        .await
        .unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].label, "one");

    outsider.shutdown().await;
    db.shutdown().await;
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    let (db, _path) = setup_db().await;

    let mut tx = db.begin_transaction().await.unwrap();
    tx.execute_update(
        "INSERT INTO entry (Id, Label) VALUES (?, ?)",
        &params![7i64, "discard-me"],
    )
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    let seen: Vec<Entry> = db.query_for_list("SELECT * FROM entry", &[]).await.unwrap();
    assert!(seen.is_empty());
    db.shutdown().await;
}

#[tokio::test]
async fn test_terminal_transaction_rejects_every_operation() {
    let (db, _path) = setup_db().await;

    let mut tx = db.begin_transaction().await.unwrap();
    tx.commit().await.unwrap();
    assert!(!tx.is_open());

    let err = tx
        .execute_update("INSERT INTO entry (Id, Label) VALUES (1, 'x')", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ConnectionClosed));

    let err = tx
        .query::<Entry>("SELECT * FROM entry", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ConnectionClosed));

    assert!(matches!(
        tx.commit().await.unwrap_err(),
        DbError::ConnectionClosed
    ));
    assert!(matches!(
        tx.rollback().await.unwrap_err(),
        DbError::ConnectionClosed
    ));

    // rollback is terminal too
    let mut tx = db.begin_transaction().await.unwrap();
    tx.rollback().await.unwrap();
    assert!(matches!(
        tx.execute_update("DELETE FROM entry", &[]).await.unwrap_err(),
        DbError::ConnectionClosed
    ));
    db.shutdown().await;
}

#[tokio::test]
async fn test_batch_update_inside_transaction() {
    let (db, _path) = setup_db().await;

    let mut tx = db.begin_transaction().await.unwrap();
    let counts = tx
        .execute_batch_update(
            "INSERT INTO entry (Id, Label) VALUES (?, ?)",
            &[
                params![1i64, "a"],
                params![2i64, "b"],
                params![3i64, "c"],
            ],
        )
        .await
        .unwrap();
    assert_eq!(counts, vec![1, 1, 1]);
    tx.commit().await.unwrap();

    let seen: Vec<Entry> = db.query_for_list("SELECT * FROM entry", &[]).await.unwrap();
    assert_eq!(seen.len(), 3);
    db.shutdown().await;
}

#[tokio::test]
async fn test_statements_execute_in_issuing_order() {
    let (db, _path) = setup_db().await;

    let mut tx = db.begin_transaction().await.unwrap();
    tx.execute_update(
        "INSERT INTO entry (Id, Label) VALUES (?, ?)",
        &params![1i64, "initial"],
    )
    .await
    .unwrap();
    tx.execute_update(
        "UPDATE entry SET Label = ? WHERE Id = ?",
        &params!["updated", 1i64],
    )
    .await
    .unwrap();

    let entry: Entry = tx
        .query("SELECT * FROM entry WHERE Id = ?", &params![1i64])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.label, "updated");
    tx.commit().await.unwrap();
    db.shutdown().await;
}

#[tokio::test]
async fn test_dropping_open_transaction_rolls_back() {
    let (db, _path) = setup_db().await;

    {
        let mut tx = db.begin_transaction().await.unwrap();
        tx.execute_update(
            "INSERT INTO entry (Id, Label) VALUES (?, ?)",
            &params![9i64, "dropped"],
        )
        .await
        .unwrap();
        // tx dropped here without commit
    }

    let seen: Vec<Entry> = db.query_for_list("SELECT * FROM entry", &[]).await.unwrap();
    assert!(seen.is_empty());
    db.shutdown().await;
}
