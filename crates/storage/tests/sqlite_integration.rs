use storage::repository::KeyValueStore;
use storage::sqlite::SqliteStore;

#[tokio::test]
async fn sqlite_round_trips_entries() {
    let store = SqliteStore::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");

    assert_eq!(store.get("stackPoints").await.unwrap(), None);

    store.set("stackPoints", "5").await.unwrap();
    assert_eq!(
        store.get("stackPoints").await.unwrap(),
        Some("5".to_string())
    );

    store.set("stackPoints", "10").await.unwrap();
    assert_eq!(
        store.get("stackPoints").await.unwrap(),
        Some("10".to_string())
    );

    store.remove("stackPoints").await.unwrap();
    assert_eq!(store.get("stackPoints").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_remove_of_missing_key_is_a_no_op() {
    let store = SqliteStore::connect("sqlite:file:memdb_remove?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");

    store.remove("never_written").await.unwrap();
}

#[tokio::test]
async fn schema_migration_is_idempotent() {
    let store = SqliteStore::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("first migrate");

    store.set("darkMode", "true").await.unwrap();

    // Rerunning must neither fail nor drop existing entries.
    store.migrate().await.expect("second migrate");
    assert_eq!(
        store.get("darkMode").await.unwrap(),
        Some("true".to_string())
    );
}

#[tokio::test]
async fn sqlite_preserves_json_values_verbatim() {
    let store = SqliteStore::connect("sqlite:file:memdb_json?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");

    let blob = r#"["array-0","array-1","tree-0"]"#;
    store.set("completedConcepts", blob).await.unwrap();
    assert_eq!(
        store.get("completedConcepts").await.unwrap().as_deref(),
        Some(blob)
    );
}
