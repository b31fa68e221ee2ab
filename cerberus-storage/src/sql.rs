//! Translation of store-agnostic queries into SQLite clauses.
//!
//! Documents live in a JSON `data` column; field paths become
//! `json_extract` expressions, the system fields map to their own columns.

use crate::error::{StoreError, StoreResult};
use cerberus_model::is_identifier;
use cerberus_types::{EntryId, Filter, Filters, ID_FIELD, OWNER_FIELD, SortDirection, SortField};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// SQL expression reading `field` from a row.
pub(crate) fn field_expr(field: &str) -> StoreResult<String> {
    match field {
        ID_FIELD | "id" => Ok("_id".to_string()),
        OWNER_FIELD => Ok("_owner".to_string()),
        f if is_identifier(f) => Ok(format!("json_extract(data, '$.{f}')")),
        f => Err(StoreError::InvalidField(f.to_string())),
    }
}

/// Binds a JSON scalar the way `json_extract` returns it.
pub(crate) fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Accumulates `AND`-joined conditions and their parameters.
#[derive(Debug, Default)]
pub(crate) struct WhereBuilder {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
}

impl WhereBuilder {
    fn bind(&mut self, value: &Value) -> &'static str {
        self.params.push(sql_value(value));
        "?"
    }

    fn placeholders(&mut self, values: &[&Value]) -> String {
        values
            .iter()
            .map(|v| self.bind(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn id(&mut self, id: &EntryId) {
        self.conditions.push("_id = ?".to_string());
        self.params.push(SqlValue::Text(id.to_string()));
    }

    pub fn owner(&mut self, owner: Option<EntryId>) {
        if let Some(owner) = owner {
            self.conditions.push("_owner = ?".to_string());
            self.params.push(SqlValue::Text(owner.to_string()));
        }
    }

    pub fn filters(&mut self, filters: &Filters) -> StoreResult<()> {
        for (field, filter) in filters {
            let expr = field_expr(field)?;
            self.filter(&expr, filter);
        }
        Ok(())
    }

    fn filter(&mut self, expr: &str, filter: &Filter) {
        match filter {
            Filter::Equals(Value::Null) => self.conditions.push(format!("{expr} IS NULL")),
            Filter::Equals(value) => {
                let p = self.bind(value);
                self.conditions.push(format!("{expr} = {p}"));
            }
            Filter::In(items) => {
                let condition = self.membership(expr, items);
                self.conditions.push(condition);
            }
            Filter::Operators(ops) => {
                let comparisons = [(">", &ops.gt), (">=", &ops.gte), ("<", &ops.lt), ("<=", &ops.lte)];
                for (op, operand) in comparisons {
                    if let Some(operand) = operand {
                        let p = self.bind(operand);
                        self.conditions.push(format!("{expr} {op} {p}"));
                    }
                }
                match &ops.ne {
                    None => {}
                    Some(Value::Array(items)) => {
                        let condition = self.negated_membership(expr, items);
                        self.conditions.push(condition);
                    }
                    Some(Value::Null) => self.conditions.push(format!("{expr} IS NOT NULL")),
                    Some(operand) => {
                        let p = self.bind(operand);
                        self.conditions
                            .push(format!("({expr} IS NULL OR {expr} <> {p})"));
                    }
                }
            }
        }
    }

    /// `IN`, matching absent fields when the list holds a null.
    fn membership(&mut self, expr: &str, items: &[Value]) -> String {
        let values: Vec<&Value> = items.iter().filter(|v| !v.is_null()).collect();
        let with_null = values.len() < items.len();
        let mut parts = Vec::new();
        if !values.is_empty() {
            parts.push(format!("{expr} IN ({})", self.placeholders(&values)));
        }
        if with_null {
            parts.push(format!("{expr} IS NULL"));
        }
        if parts.is_empty() {
            "0".to_string()
        } else {
            format!("({})", parts.join(" OR "))
        }
    }

    /// `NOT IN`, matching absent fields unless the list holds a null.
    fn negated_membership(&mut self, expr: &str, items: &[Value]) -> String {
        let values: Vec<&Value> = items.iter().filter(|v| !v.is_null()).collect();
        let with_null = values.len() < items.len();
        if values.is_empty() {
            return if with_null {
                format!("{expr} IS NOT NULL")
            } else {
                "1".to_string()
            };
        }
        let not_in = format!("{expr} NOT IN ({})", self.placeholders(&values));
        if with_null {
            format!("({expr} IS NOT NULL AND {not_in})")
        } else {
            format!("({expr} IS NULL OR {not_in})")
        }
    }

    /// ` WHERE ...` (empty when unconstrained) and its parameters.
    pub fn finish(self) -> (String, Vec<SqlValue>) {
        let sql = if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        };
        (sql, self.params)
    }
}

/// ` ORDER BY ...`, insertion order breaking ties.
pub(crate) fn order_clause(sort: &[SortField]) -> StoreResult<String> {
    let mut terms = sort
        .iter()
        .map(|s| {
            let direction = match s.direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            field_expr(&s.field).map(|expr| format!("{expr} {direction}"))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    terms.push("rowid ASC".to_string());
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

/// ` LIMIT ... OFFSET ...`; SQLite reads a negative limit as unbounded.
pub(crate) fn page_clause(limit: Option<usize>, offset: usize) -> String {
    match (limit, offset) {
        (None, 0) => String::new(),
        (None, offset) => format!(" LIMIT -1 OFFSET {offset}"),
        (Some(limit), offset) => format!(" LIMIT {limit} OFFSET {offset}"),
    }
}

/// Quotes an identifier already checked by [`is_identifier`].
pub(crate) fn quoted(name: &str) -> String {
    format!("\"{name}\"")
}
