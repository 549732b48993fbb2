use airquery::engine::adapter::SqliteConnector;
use airquery::{Config, Database, FilterClause, Record, SortSpec, StorageEngine, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;

fn row(value: Value) -> Record {
    value.as_object().unwrap().clone()
}

async fn seeded_users(db: &Database) -> Vec<Value> {
    db.select_table("*", "users")
        .insert(vec![
            row(json!({"name": "ann", "age": 31})),
            row(json!({"name": "bob", "age": 25})),
            row(json!({"name": "cid", "age": 40})),
        ])
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_inserts_get_distinct_ids() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&Config::embedded(dir.path())).unwrap();

    let first = tokio::spawn(db.select_table("*", "events").insert(row(json!({"kind": "a"}))));
    let second = tokio::spawn(db.select_table("*", "events").insert(row(json!({"kind": "b"}))));
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0], second[0]);
    assert_eq!(db.select_table("*", "events").count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_repeated_updates_keep_collection_file_small() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::embedded(dir.path());
    let db = Database::new(&config).unwrap();
    let ids = db.select_table("*", "notes").insert(row(json!({"n": 0}))).await.unwrap();

    for n in 1..=50 {
        let updated = db
            .select_table("*", "notes")
            .filter_eq("id", ids[0].clone())
            .update(row(json!({"n": n})))
            .await
            .unwrap();
        assert!(updated);
    }

    let file = config.embedded_root().unwrap().join("notes.db");
    let lines = std::fs::read_to_string(file).unwrap().lines().count();
    assert!(lines <= 2, "collection file kept {} lines", lines);

    let note = db.select_table("*", "notes").fetch().await.unwrap().unwrap();
    assert_eq!(note.get("n"), Some(&json!(50)));
}

#[tokio::test]
async fn test_embedded_filter_sort_page() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&Config::embedded(dir.path())).unwrap();
    let ids = seeded_users(&db).await;
    assert_eq!(ids.len(), 3);

    let oldest_first = db
        .select_table("*", "users")
        .sort(SortSpec::desc("age"))
        .fetch_all()
        .await
        .unwrap();
    let names: Vec<&Value> = oldest_first.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names, vec![&json!("cid"), &json!("ann"), &json!("bob")]);

    // a zero limit still yields one record
    let one = db
        .select_table("*", "users")
        .sort(SortSpec::asc("age"))
        .limit_offset(0, 0)
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].get("name"), Some(&json!("bob")));

    let like = db
        .select_table("*", "users")
        .filter("name", FilterClause::like("^[ab]"))
        .count()
        .await
        .unwrap();
    assert_eq!(like, 2);
}

#[tokio::test]
async fn test_embedded_update_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&Config::embedded(dir.path())).unwrap();
    let ids = seeded_users(&db).await;

    let updated = db
        .select_table("*", "users")
        .filter_eq("id", ids[1].clone())
        .update(row(json!({"age": 26})))
        .await
        .unwrap();
    assert!(updated);

    let bob = db
        .select_table("*", "users")
        .filter_eq("name", "bob")
        .fetch()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.get("age"), Some(&json!(26)));
    assert_eq!(bob.get("id"), Some(&ids[1]));

    let missing = db
        .select_table("*", "users")
        .filter_eq("id", "nope")
        .update(row(json!({"age": 1})))
        .await
        .unwrap();
    assert!(!missing);

    assert!(db.select_table("*", "users").filter_eq("name", "ann").delete().await.unwrap());
    assert!(!db.select_table("*", "users").filter_eq("name", "ann").delete().await.unwrap());
    assert_eq!(db.select_table("*", "users").count().await.unwrap(), 2);
    assert_eq!(db.list_tables().await.unwrap(), vec!["users"]);
}

#[tokio::test]
async fn test_sqlite_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let config = Config::sqlite(&path);
    let db = Database::with_sql_connector(&config, Arc::new(SqliteConnector::new(&path))).unwrap();
    assert_eq!(db.engine(), StorageEngine::Relational);

    airquery::engine::adapter::RelationalAdapter::new(&config.relational, Arc::new(SqliteConnector::new(&path)))
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)")
        .await
        .unwrap();

    let ids = seeded_users(&db).await;
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);

    let empty = db.select_table("*", "users").insert(Vec::<Record>::new()).await.unwrap();
    assert!(empty.is_empty());

    let cid = db
        .select_table("name, age", "users")
        .filter_eq("id", 3)
        .fetch()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cid.get("name"), Some(&json!("cid")));
    assert!(cid.get("id").is_none());

    let page = db
        .select_table("*", "users")
        .limit_offset(1, 1)
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(page.len(), 1);

    let missing = db.select_table("*", "users").filter_eq("name", "zed").fetch().await.unwrap();
    assert!(missing.is_none());

    let like = db
        .select_table("*", "users")
        .filter("name", FilterClause::like("a"))
        .fetch_all()
        .await;
    assert!(matches!(like, Err(StoreError::UnsupportedOperation(_))));

    assert!(db.select_table("*", "users").filter_eq("id", 1).delete().await.unwrap());
    assert_eq!(db.select_table("*", "users").count().await.unwrap(), 2);
}

#[test]
fn test_document_engine_requires_url() {
    let mut config = Config::default();
    config.storage_engine = StorageEngine::DocumentRemote;
    assert!(matches!(Database::new(&config), Err(StoreError::Config(_))));

    config.document.url = "mongodb://localhost:27017/app".to_string();
    let db = Database::new(&config).unwrap();
    assert_eq!(db.engine(), StorageEngine::DocumentRemote);
}
