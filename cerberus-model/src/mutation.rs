//! Ordered value transforms applied on the write and read paths.
//!
//! A pipeline is a list of [`Mutation`] stages run in strict sequence. Each
//! stage names the fields it touches; absent and null fields are skipped.
//! Lists are mapped element-wise and mappings recurse into every value, so a
//! transform only ever sees scalars. Asynchronous transforms fan out over
//! every element concurrently and are gathered back in order.

use crate::coerce::{coerce_date, coerce_number};
use crate::error::{MutationError, MutationResult, value_kind};
use crate::introspection::FieldFlag;
use crate::schema::{FieldType, Model};
use cerberus_crypto::FieldCrypto;
use cerberus_types::{Entry, Filters};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use serde_json::{Map, Value};
use std::sync::Arc;

pub type SyncTransform = Arc<dyn Fn(&str, Value) -> MutationResult<Value> + Send + Sync>;
pub type AsyncTransform =
    Arc<dyn Fn(&str, Value) -> BoxFuture<'static, MutationResult<Value>> + Send + Sync>;

/// How a stage transforms one scalar. The `&str` is the top-level field name.
#[derive(Clone)]
pub enum Transform {
    Sync(SyncTransform),
    Async(AsyncTransform),
}

/// One pipeline stage.
#[derive(Clone)]
pub struct Mutation {
    pub name: &'static str,
    pub fields: Vec<String>,
    pub transform: Transform,
}

impl std::fmt::Debug for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Mutation {
    pub fn sync<F>(name: &'static str, fields: Vec<String>, transform: F) -> Self
    where
        F: Fn(&str, Value) -> MutationResult<Value> + Send + Sync + 'static,
    {
        Self {
            name,
            fields,
            transform: Transform::Sync(Arc::new(transform)),
        }
    }

    pub fn asynchronous<F>(name: &'static str, fields: Vec<String>, transform: F) -> Self
    where
        F: Fn(&str, Value) -> BoxFuture<'static, MutationResult<Value>> + Send + Sync + 'static,
    {
        Self {
            name,
            fields,
            transform: Transform::Async(Arc::new(transform)),
        }
    }

    /// Runs this stage over `entry`.
    pub async fn apply(&self, mut entry: Entry) -> MutationResult<Entry> {
        match &self.transform {
            Transform::Sync(f) => {
                for field in &self.fields {
                    if let Some(value) = entry.fields.get_mut(field)
                        && !value.is_null()
                    {
                        *value = walk_sync(field, value.take(), f)?;
                    }
                }
            }
            Transform::Async(f) => {
                let targets: Vec<(String, Value)> = self
                    .fields
                    .iter()
                    .filter_map(|field| match entry.fields.get_mut(field) {
                        Some(value) if !value.is_null() => Some((field.clone(), value.take())),
                        _ => None,
                    })
                    .collect();
                let results = try_join_all(targets.into_iter().map(|(field, value)| async move {
                    let mutated = walk_async(&field, value, f).await?;
                    Ok::<_, MutationError>((field, mutated))
                }))
                .await?;
                for (field, value) in results {
                    entry.fields.insert(field, value);
                }
            }
        }
        Ok(entry)
    }
}

fn walk_sync(field: &str, value: Value, f: &SyncTransform) -> MutationResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => items
            .into_iter()
            .map(|item| walk_sync(field, item, f))
            .collect::<MutationResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, item)| walk_sync(field, item, f).map(|item| (key, item)))
            .collect::<MutationResult<Map<_, _>>>()
            .map(Value::Object),
        scalar => f(field, scalar),
    }
}

fn walk_async<'a>(
    field: &'a str,
    value: Value,
    f: &'a AsyncTransform,
) -> BoxFuture<'a, MutationResult<Value>> {
    async move {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => {
                try_join_all(items.into_iter().map(|item| walk_async(field, item, f)))
                    .await
                    .map(Value::Array)
            }
            Value::Object(map) => {
                let (keys, items): (Vec<_>, Vec<_>) = map.into_iter().unzip();
                let items =
                    try_join_all(items.into_iter().map(|item| walk_async(field, item, f))).await?;
                Ok(Value::Object(keys.into_iter().zip(items).collect()))
            }
            scalar => f(field, scalar).await,
        }
    }
    .boxed()
}

/// Runs every stage over `entry` in order.
pub async fn apply_mutations(entry: Entry, mutations: &[Mutation]) -> MutationResult<Entry> {
    let mut entry = entry;
    for mutation in mutations {
        entry = mutation.apply(entry).await?;
    }
    Ok(entry)
}

/// Runs the pipeline over every entry concurrently, keeping input order.
pub async fn apply_mutations_many(
    entries: Vec<Entry>,
    mutations: &[Mutation],
) -> MutationResult<Vec<Entry>> {
    try_join_all(
        entries
            .into_iter()
            .map(|entry| apply_mutations(entry, mutations)),
    )
    .await
}

/// Coerces filter operands to the declared field types: dates first, then
/// numbers.
pub fn mutate_query_filters(model: &Model, filters: Filters) -> Filters {
    let dates = model.fields_by_type(&[FieldType::Date]);
    let numbers = model.fields_by_type(&[FieldType::Number]);
    filters
        .into_iter()
        .map(|(field, filter)| {
            let filter = if dates.contains(&field) {
                filter.map_operands(coerce_date)
            } else {
                filter
            };
            let filter = if numbers.contains(&field) {
                filter.map_operands(coerce_number)
            } else {
                filter
            };
            (field, filter)
        })
        .collect()
}

fn unsupported(transform: &'static str, field: &str, value: &Value) -> MutationError {
    MutationError::UnsupportedValue {
        transform,
        field: field.to_string(),
        kind: value_kind(value),
    }
}

/// Builds the write and read pipelines of a model.
///
/// Empty strings pass through the hash and encrypt stages so an update can
/// still unset those fields.
#[derive(Debug, Clone)]
pub struct Mutator {
    crypto: Arc<FieldCrypto>,
}

impl Mutator {
    pub fn new(crypto: Arc<FieldCrypto>) -> Self {
        Self { crypto }
    }

    pub fn crypto(&self) -> &FieldCrypto {
        &self.crypto
    }

    /// Hash, then encrypt, then date coercion.
    pub fn write_mutations(&self, model: &Model) -> Vec<Mutation> {
        let hasher = self.crypto.hasher.clone();
        let hash = Mutation::asynchronous(
            "hash",
            model.fields_with_flag(&[FieldFlag::Hashed]),
            move |field, value| {
                let hasher = hasher.clone();
                let field = field.to_string();
                async move {
                    match value {
                        Value::String(plain) if plain.is_empty() => Ok(Value::String(plain)),
                        Value::String(plain) => Ok(Value::String(hasher.hash(plain).await?)),
                        other => Err(unsupported("hash", &field, &other)),
                    }
                }
                .boxed()
            },
        );

        let cipher = self.crypto.cipher.clone();
        let encrypt = Mutation::sync(
            "encrypt",
            model.fields_with_flag(&[FieldFlag::Encrypted]),
            move |field, value| match value {
                Value::String(plain) if plain.is_empty() => Ok(Value::String(plain)),
                Value::String(plain) => Ok(Value::String(cipher.encrypt(&plain)?)),
                other => Err(unsupported("encrypt", field, &other)),
            },
        );

        let dates = Mutation::sync(
            "date",
            model.fields_by_type(&[FieldType::Date]),
            |_, value| Ok(coerce_date(value)),
        );

        [hash, encrypt, dates]
            .into_iter()
            .filter(|m| !m.fields.is_empty())
            .collect()
    }

    /// Decryption of encrypted fields.
    pub fn read_mutations(&self, model: &Model) -> Vec<Mutation> {
        let cipher = self.crypto.cipher.clone();
        let decrypt = Mutation::sync(
            "decrypt",
            model.fields_with_flag(&[FieldFlag::Encrypted]),
            move |field, value| match value {
                Value::String(sealed) if sealed.is_empty() => Ok(Value::String(sealed)),
                Value::String(sealed) => Ok(Value::String(cipher.decrypt(&sealed)?)),
                other => Err(unsupported("decrypt", field, &other)),
            },
        );
        if decrypt.fields.is_empty() {
            Vec::new()
        } else {
            vec![decrypt]
        }
    }

    pub async fn mutate_for_write(&self, model: &Model, entry: Entry) -> MutationResult<Entry> {
        apply_mutations(entry, &self.write_mutations(model)).await
    }

    pub async fn mutate_many_for_write(
        &self,
        model: &Model,
        entries: Vec<Entry>,
    ) -> MutationResult<Vec<Entry>> {
        apply_mutations_many(entries, &self.write_mutations(model)).await
    }

    pub async fn mutate_for_read(&self, model: &Model, entry: Entry) -> MutationResult<Entry> {
        apply_mutations(entry, &self.read_mutations(model)).await
    }

    pub async fn mutate_many_for_read(
        &self,
        model: &Model,
        entries: Vec<Entry>,
    ) -> MutationResult<Vec<Entry>> {
        apply_mutations_many(entries, &self.read_mutations(model)).await
    }
}
