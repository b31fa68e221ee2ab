//! Table and index maintenance, ensured once per namespace.

use crate::error::StoreResult;
use crate::sql::{field_expr, quoted};
use cerberus_model::{IndexSpec, Model};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

pub(crate) fn index_name(namespace: &str, index: &IndexSpec) -> String {
    format!("{namespace}_{}_idx", index.fields.join("_"))
}

/// The model's indexes with duplicate field lists merged; a merged index is
/// unique if any of its sources is.
pub(crate) fn wanted_indexes(model: &Model) -> Vec<IndexSpec> {
    let mut merged: Vec<IndexSpec> = Vec::new();
    for index in model.indexes_for_model() {
        match merged.iter_mut().find(|m| m.fields == index.fields) {
            Some(existing) => existing.unique |= index.unique,
            None => merged.push(index),
        }
    }
    merged
}

pub(crate) fn index_sql(namespace: &str, index: &IndexSpec) -> StoreResult<String> {
    let columns = index
        .fields
        .iter()
        .map(|f| field_expr(f))
        .collect::<StoreResult<Vec<_>>>()?;
    let kind = if index.unique { "UNIQUE INDEX" } else { "INDEX" };
    Ok(format!(
        "CREATE {kind} {} ON {} ({})",
        quoted(&index_name(namespace, index)),
        quoted(namespace),
        columns.join(", ")
    ))
}

fn same_definition(stored: &str, wanted: &str) -> bool {
    stored.split_whitespace().eq(wanted.split_whitespace())
}

/// Creates the namespace table and brings its indexes in line with the
/// model. An index whose stored definition differs is dropped and recreated.
pub(crate) fn ensure_collection(conn: &Connection, model: &Model) -> StoreResult<()> {
    let table = quoted(&model.namespace);
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            _id TEXT PRIMARY KEY,
            _owner TEXT,
            data TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {} ON {table} (_owner);",
        quoted(&format!("{}__owner_idx", model.namespace)),
    ))?;

    for index in wanted_indexes(model) {
        let name = index_name(&model.namespace, &index);
        let wanted = index_sql(&model.namespace, &index)?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [&name],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(stored) if same_definition(&stored, &wanted) => {
                debug!(index = %name, "index up to date");
            }
            Some(_) => {
                warn!(index = %name, "index definition changed, recreating");
                conn.execute_batch(&format!("DROP INDEX {}", quoted(&name)))?;
                conn.execute_batch(&wanted)?;
            }
            None => {
                info!(index = %name, unique = index.unique, "creating index");
                conn.execute_batch(&wanted)?;
            }
        }
    }
    Ok(())
}
