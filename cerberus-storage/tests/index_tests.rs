use cerberus_model::{FieldDescriptor, IndexSpec, Model, ModelScope};
use cerberus_storage::{PersistentStore, SqliteStore};
use cerberus_types::Entry;
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn scope(model: Model) -> ModelScope {
    ModelScope::new(Arc::new(model))
}

fn accounts(unique_email: bool) -> Model {
    let email = FieldDescriptor::string().indexed();
    let email = if unique_email { email.unique() } else { email };
    Model::new("account", "accounts")
        .field("email", email)
        .field("plan", FieldDescriptor::string())
        .field("region", FieldDescriptor::string())
        .index(IndexSpec::new(["plan", "region"]))
}

fn index_sql(path: &Path) -> Vec<(String, String)> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master
             WHERE type = 'index' AND tbl_name = 'accounts' AND sql IS NOT NULL
             ORDER BY name",
        )
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

fn email(address: &str) -> Entry {
    Entry::from_value(json!({ "email": address })).unwrap()
}

#[tokio::test]
async fn indexes_are_created_on_first_use() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cerberus.db");

    let store = SqliteStore::open(&path);
    store.get_all(&scope(accounts(false))).await.unwrap();
    drop(store);

    let names: Vec<String> = index_sql(&path).into_iter().map(|(name, _)| name).collect();
    assert_eq!(
        names,
        vec!["accounts__owner_idx", "accounts_email_idx", "accounts_plan_region_idx"]
    );
}

#[tokio::test]
async fn changed_index_definition_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cerberus.db");

    let relaxed = SqliteStore::open(&path);
    let first = scope(accounts(false));
    relaxed.insert(&first, email("a@example.com")).await.unwrap();
    relaxed.insert(&first, email("b@example.com")).await.unwrap();
    drop(relaxed);

    let strict = SqliteStore::open(&path);
    let second = scope(accounts(true));
    assert_eq!(strict.get_all(&second).await.unwrap().len(), 2);
    let err = strict.insert(&second, email("a@example.com")).await.unwrap_err();
    assert!(err.is_constraint_violation());
    drop(strict);

    let email_index = index_sql(&path)
        .into_iter()
        .find(|(name, _)| name == "accounts_email_idx")
        .map(|(_, sql)| sql)
        .unwrap();
    assert!(email_index.starts_with("CREATE UNIQUE INDEX"));
}

#[tokio::test]
async fn indexes_are_ensured_once_per_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cerberus.db");

    let store = SqliteStore::open(&path);
    let model = scope(accounts(false));
    store.get_all(&model).await.unwrap();

    // Dropped behind the store's back: a live store does not look again.
    Connection::open(&path)
        .unwrap()
        .execute_batch("DROP INDEX accounts_email_idx")
        .unwrap();
    store.get_all(&model).await.unwrap();
    assert!(index_sql(&path).iter().all(|(name, _)| name != "accounts_email_idx"));

    drop(store);
    let reopened = SqliteStore::open(&path);
    reopened.get_all(&model).await.unwrap();
    assert!(index_sql(&path).iter().any(|(name, _)| name == "accounts_email_idx"));
}

#[tokio::test]
async fn indexed_and_unique_field_gets_one_unique_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cerberus.db");

    let store = SqliteStore::open(&path);
    let accounts = scope(accounts(true));
    store.insert(&accounts, email("a@example.com")).await.unwrap();
    let err = store.insert(&accounts, email("a@example.com")).await.unwrap_err();
    assert!(err.is_constraint_violation());
    drop(store);

    let email_indexes: Vec<String> = index_sql(&path)
        .into_iter()
        .filter(|(_, sql)| sql.contains("$.email"))
        .map(|(name, _)| name)
        .collect();
    assert_eq!(email_indexes, vec!["accounts_email_idx"]);
}

#[tokio::test]
async fn duplicate_index_declarations_merge_uniqueness() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cerberus.db");

    let model = Model::new("account", "accounts")
        .field("email", FieldDescriptor::string().indexed())
        .index(IndexSpec::new(["email"]).unique());
    let accounts = scope(model);

    let store = SqliteStore::open(&path);
    store.insert(&accounts, email("a@example.com")).await.unwrap();
    store.insert(&accounts, email("b@example.com")).await.unwrap();
    let err = store.insert(&accounts, email("b@example.com")).await.unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(store.get_all(&accounts).await.unwrap().len(), 2);
    drop(store);

    let indexes = index_sql(&path);
    let names: Vec<&str> = indexes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["accounts__owner_idx", "accounts_email_idx"]);
    assert!(indexes[1].1.starts_with("CREATE UNIQUE INDEX"));
}
