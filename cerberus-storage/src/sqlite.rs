//! SQLite-backed document store.
//!
//! One table per model namespace: `_id TEXT PRIMARY KEY, _owner TEXT,
//! data TEXT` where `data` holds the entry's fields as a JSON document.
//! The connection is opened on first use and shared; all SQLite work runs on
//! tokio's blocking pool.

use crate::error::{StoreError, StoreResult};
use crate::indexes::ensure_collection;
use crate::sql::{WhereBuilder, order_clause, page_clause, quoted};
use crate::store::PersistentStore;
use async_trait::async_trait;
use cerberus_model::{FieldFlag, Model, ModelScope};
use cerberus_types::{Count, Entry, EntryId, Filters, ID_FIELD, OWNER_FIELD, Query};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Where the database lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file. `None` keeps the database in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

struct Session {
    conn: Connection,
    /// Namespaces whose table and indexes are ensured.
    ensured: HashSet<String>,
}

/// [`PersistentStore`] over one SQLite database.
pub struct SqliteStore {
    config: SqliteConfig,
    session: OnceCell<Arc<Mutex<Session>>>,
}

impl SqliteStore {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            session: OnceCell::new(),
        }
    }

    /// A store on a database file, created if missing.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(SqliteConfig {
            path: Some(path.into()),
        })
    }

    /// A store in memory (for testing).
    pub fn open_in_memory() -> Self {
        Self::new(SqliteConfig::default())
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    async fn session(&self) -> StoreResult<Arc<Mutex<Session>>> {
        self.session
            .get_or_try_init(|| async {
                let path = self.config.path.clone();
                let conn = tokio::task::spawn_blocking(move || match path {
                    Some(path) => Connection::open(path),
                    None => Connection::open_in_memory(),
                })
                .await
                .map_err(|e| StoreError::Task(e.to_string()))??;
                info!(path = ?self.config.path, "opened sqlite store");
                Ok::<_, StoreError>(Arc::new(Mutex::new(Session {
                    conn,
                    ensured: HashSet::new(),
                })))
            })
            .await
            .cloned()
    }

    /// Runs `f` on the blocking pool once the model's table is ensured.
    async fn run<T, F>(&self, model: &Arc<Model>, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let session = self.session().await?;
        let model = Arc::clone(model);
        tokio::task::spawn_blocking(move || {
            let mut session = session.lock().map_err(|_| StoreError::Poisoned)?;
            if !session.ensured.contains(&model.namespace) {
                ensure_collection(&session.conn, &model)?;
                session.ensured.insert(model.namespace.clone());
            }
            f(&session.conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("connected", &self.session.initialized())
            .finish()
    }
}

// ── References ───────────────────────────────────────────────────

fn invalid_reference(field: &str, value: impl Into<String>) -> StoreError {
    StoreError::InvalidReference {
        field: field.to_string(),
        value: value.into(),
    }
}

fn parse_reference(field: &str, raw: &str) -> StoreResult<EntryId> {
    EntryId::parse(raw).map_err(|_| invalid_reference(field, raw))
}

/// External reference form to the stored canonical UUID string.
fn coerce_reference(field: &str, value: Value) -> StoreResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(raw) => parse_reference(field, &raw).map(|id| Value::String(id.to_string())),
        other => Err(invalid_reference(field, other.to_string())),
    }
}

fn is_reference_field(model: &Model, field: &str) -> bool {
    field == ID_FIELD
        || field == "id"
        || field == OWNER_FIELD
        || model.fields.get(field).is_some_and(|d| d.relation.is_some())
}

fn coerce_filter_references(model: &Model, filters: Filters) -> StoreResult<Filters> {
    filters
        .into_iter()
        .map(|(field, filter)| {
            if is_reference_field(model, &field) {
                let filter = filter.try_map_operands(|v| coerce_reference(&field, v))?;
                Ok((field, filter))
            } else {
                Ok((field, filter))
            }
        })
        .collect()
}

fn coerce_entry_references(model: &Model, entry: &mut Entry) -> StoreResult<()> {
    for field in model.fields_with_flag(&[FieldFlag::Relation]) {
        if let Some(value) = entry.fields.get_mut(&field) {
            *value = match value.take() {
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| coerce_reference(&field, item))
                        .collect::<StoreResult<Vec<_>>>()?,
                ),
                single => coerce_reference(&field, single)?,
            };
        }
    }
    Ok(())
}

// ── Rows ─────────────────────────────────────────────────────────

fn decode_row(id: &str, owner: Option<&str>, data: &str) -> StoreResult<Entry> {
    let fields: Map<String, Value> = serde_json::from_str(data)?;
    Ok(Entry {
        id: Some(parse_reference(ID_FIELD, id)?),
        owner: owner.map(|o| parse_reference(OWNER_FIELD, o)).transpose()?,
        fields,
    })
}

fn query_entries(conn: &Connection, sql: &str, params: Vec<SqlValue>) -> StoreResult<Vec<Entry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    rows.map(|row| {
        let (id, owner, data) = row?;
        decode_row(&id, owner.as_deref(), &data)
    })
    .collect()
}

fn select_one(
    conn: &Connection,
    table: &str,
    id: &EntryId,
    owner: Option<EntryId>,
) -> StoreResult<Option<Entry>> {
    let mut clause = WhereBuilder::default();
    clause.id(id);
    clause.owner(owner);
    let (clause, params) = clause.finish();
    let sql = format!("SELECT _id, _owner, data FROM {table}{clause}");
    Ok(query_entries(conn, &sql, params)?.into_iter().next())
}

/// Assigns identifier and owner for a new entry.
fn prepare_insert(scope: &ModelScope, mut entry: Entry) -> StoreResult<Entry> {
    let model = scope.model();
    coerce_entry_references(model, &mut entry)?;
    if model.as_owner {
        let id = EntryId::new();
        entry.id = Some(id);
        entry.owner = Some(id);
    } else {
        entry.id.get_or_insert_with(EntryId::new);
        if scope.has_ownership() {
            entry.owner = scope.owner();
        }
    }
    Ok(entry)
}

fn insert_row(conn: &Connection, table: &str, entry: &Entry) -> StoreResult<()> {
    let data = serde_json::to_string(&entry.fields)?;
    conn.execute(
        &format!("INSERT INTO {table} (_id, _owner, data) VALUES (?1, ?2, ?3)"),
        params![
            entry.id.map(|id| id.to_string()),
            entry.owner.map(|o| o.to_string()),
            data
        ],
    )?;
    Ok(())
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn update_row(
    conn: &Connection,
    table: &str,
    id: &EntryId,
    owner: Option<EntryId>,
    changes: Map<String, Value>,
) -> StoreResult<Option<Entry>> {
    let Some(mut current) = select_one(conn, table, id, owner)? else {
        return Ok(None);
    };
    for (field, value) in changes {
        if field == ID_FIELD || field == "id" {
            continue;
        }
        if is_unset(&value) {
            current.fields.remove(&field);
        } else {
            current.fields.insert(field, value);
        }
    }
    let data = serde_json::to_string(&current.fields)?;
    conn.execute(
        &format!("UPDATE {table} SET data = ?1 WHERE _id = ?2"),
        params![data, id.to_string()],
    )?;
    Ok(Some(current))
}

fn delete_row(
    conn: &Connection,
    table: &str,
    id: &EntryId,
    owner: Option<EntryId>,
) -> StoreResult<usize> {
    let mut clause = WhereBuilder::default();
    clause.id(id);
    clause.owner(owner);
    let (clause, params) = clause.finish();
    Ok(conn.execute(&format!("DELETE FROM {table}{clause}"), params_from_iter(params))?)
}

fn project(entries: &mut [Entry], fields: &[String]) {
    if fields.is_empty() {
        return;
    }
    for entry in entries {
        entry.fields.retain(|name, _| fields.contains(name));
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn search(&self, scope: &ModelScope, query: &Query) -> StoreResult<Vec<Entry>> {
        let model = scope.model();
        let filters = coerce_filter_references(model, query.filters.clone())?;
        let mut clause = WhereBuilder::default();
        clause.owner(scope.scoping_owner());
        clause.filters(&filters)?;
        let (clause, params) = clause.finish();
        let sql = format!(
            "SELECT _id, _owner, data FROM {}{clause}{}{}",
            quoted(&model.namespace),
            order_clause(&query.sort)?,
            page_clause(query.limit, query.offset),
        );

        let mut entries = self
            .run(model, move |conn| query_entries(conn, &sql, params))
            .await?;
        project(&mut entries, &query.fields);
        debug!(namespace = %model.namespace, results = entries.len(), "search");
        Ok(entries)
    }

    async fn count(&self, scope: &ModelScope, query: &Query) -> StoreResult<Count> {
        let model = scope.model();
        let filters = coerce_filter_references(model, query.filters.clone())?;
        let mut clause = WhereBuilder::default();
        clause.owner(scope.scoping_owner());
        clause.filters(&filters)?;
        let (clause, params) = clause.finish();
        let sql = format!("SELECT COUNT(*) FROM {}{clause}", quoted(&model.namespace));

        let count: i64 = self
            .run(model, move |conn| {
                Ok(conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?)
            })
            .await?;
        Ok(Count {
            count: count.max(0) as u64,
        })
    }

    async fn get(&self, scope: &ModelScope, id: &str) -> StoreResult<Option<Entry>> {
        let Ok(id) = EntryId::parse(id) else {
            debug!(namespace = %scope.model().namespace, id, "malformed id, treating as absent");
            return Ok(None);
        };
        let table = quoted(&scope.model().namespace);
        let owner = scope.scoping_owner();
        self.run(scope.model(), move |conn| select_one(conn, &table, &id, owner))
            .await
    }

    async fn get_all(&self, scope: &ModelScope) -> StoreResult<Vec<Entry>> {
        self.search(scope, &Query::default()).await
    }

    async fn insert(&self, scope: &ModelScope, entry: Entry) -> StoreResult<Entry> {
        let entry = prepare_insert(scope, entry)?;
        let table = quoted(&scope.model().namespace);
        let stored = entry.clone();
        self.run(scope.model(), move |conn| insert_row(conn, &table, &stored))
            .await?;
        debug!(namespace = %scope.model().namespace, id = ?entry.id, "inserted");
        Ok(entry)
    }

    async fn batch_insert(&self, scope: &ModelScope, entries: Vec<Entry>) -> StoreResult<Vec<Entry>> {
        let table = quoted(&scope.model().namespace);
        let batch_scope = scope.clone();
        let inserted = self
            .run(scope.model(), move |conn| {
                entries
                    .into_iter()
                    .map(|entry| {
                        let entry = prepare_insert(&batch_scope, entry)?;
                        insert_row(conn, &table, &entry)?;
                        Ok(entry)
                    })
                    .collect::<StoreResult<Vec<_>>>()
            })
            .await?;
        debug!(namespace = %scope.model().namespace, count = inserted.len(), "batch inserted");
        Ok(inserted)
    }

    async fn update(&self, scope: &ModelScope, id: &str, mut entry: Entry) -> StoreResult<Option<Entry>> {
        let id = parse_reference(ID_FIELD, id)?;
        coerce_entry_references(scope.model(), &mut entry)?;
        let table = quoted(&scope.model().namespace);
        let owner = scope.scoping_owner();
        let updated = self
            .run(scope.model(), move |conn| update_row(conn, &table, &id, owner, entry.fields))
            .await?;
        debug!(namespace = %scope.model().namespace, %id, found = updated.is_some(), "updated");
        Ok(updated)
    }

    async fn batch_update(&self, scope: &ModelScope, entries: Vec<Entry>) -> StoreResult<Vec<Entry>> {
        let model = scope.model();
        let mut changes = Vec::with_capacity(entries.len());
        for (position, mut entry) in entries.into_iter().enumerate() {
            let id = entry.id.ok_or(StoreError::MissingIdentifier(position))?;
            coerce_entry_references(model, &mut entry)?;
            changes.push((id, entry.fields));
        }

        let table = quoted(&model.namespace);
        let owner = scope.scoping_owner();
        let updated = self
            .run(model, move |conn| {
                let mut updated = Vec::new();
                for (id, fields) in changes {
                    if let Some(entry) = update_row(conn, &table, &id, owner, fields)? {
                        updated.push(entry);
                    }
                }
                Ok(updated)
            })
            .await?;
        debug!(namespace = %model.namespace, count = updated.len(), "batch updated");
        Ok(updated)
    }

    async fn delete(&self, scope: &ModelScope, id: &str) -> StoreResult<()> {
        let id = parse_reference(ID_FIELD, id)?;
        let table = quoted(&scope.model().namespace);
        let owner = scope.scoping_owner();
        let removed = self
            .run(scope.model(), move |conn| delete_row(conn, &table, &id, owner))
            .await?;
        debug!(namespace = %scope.model().namespace, %id, removed, "deleted");
        Ok(())
    }

    async fn batch_delete(&self, scope: &ModelScope, ids: &[String]) -> StoreResult<()> {
        let ids = ids
            .iter()
            .map(|id| parse_reference(ID_FIELD, id))
            .collect::<StoreResult<Vec<_>>>()?;
        let table = quoted(&scope.model().namespace);
        let owner = scope.scoping_owner();
        let removed = self
            .run(scope.model(), move |conn| {
                ids.iter()
                    .map(|id| delete_row(conn, &table, id, owner))
                    .sum::<StoreResult<usize>>()
            })
            .await?;
        debug!(namespace = %scope.model().namespace, removed, "batch deleted");
        Ok(())
    }
}
