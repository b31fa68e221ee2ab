//! Queries over a model's declared fields.

use crate::schema::{FieldDescriptor, FieldType, IndexSpec, Model};
use cerberus_types::{ID_FIELD, OWNER_FIELD};

/// Boolean properties a field may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldFlag {
    Encrypted,
    Hashed,
    Indexed,
    Unique,
    Relation,
    Restricted,
    Hidden,
    Required,
}

impl FieldDescriptor {
    pub fn has_flag(&self, flag: FieldFlag) -> bool {
        match flag {
            FieldFlag::Encrypted => self.encrypted,
            FieldFlag::Hashed => self.hashed,
            FieldFlag::Indexed => self.indexed,
            FieldFlag::Unique => self.unique,
            FieldFlag::Relation => self.relation.is_some(),
            FieldFlag::Restricted => self.restricted,
            FieldFlag::Hidden => self.hidden,
            FieldFlag::Required => self.required,
        }
    }
}

impl Model {
    /// Names of fields carrying any of `flags`.
    pub fn fields_with_flag(&self, flags: &[FieldFlag]) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, d)| flags.iter().any(|&flag| d.has_flag(flag)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of fields allowing any of `types`.
    pub fn fields_by_type(&self, types: &[FieldType]) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, d)| types.iter().any(|&t| d.allows(t)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Indexes the persistent store maintains for this model.
    ///
    /// Relation, indexed and unique fields each get a single-field index
    /// (unique when the field is), followed by the declared composite indexes.
    pub fn indexes_for_model(&self) -> Vec<IndexSpec> {
        let single = self
            .fields
            .iter()
            .filter(|(_, d)| d.relation.is_some() || d.indexed || d.unique)
            .map(|(name, d)| IndexSpec {
                fields: vec![name.clone()],
                unique: d.unique,
            });
        single.chain(self.indexes.iter().cloned()).collect()
    }

    /// Fields returned when the caller asks for no projection.
    pub fn default_projection(&self) -> Vec<String> {
        let mut projection = vec![ID_FIELD.to_string(), OWNER_FIELD.to_string()];
        projection.extend(
            self.fields
                .iter()
                .filter(|(_, d)| !d.restricted && !d.hidden)
                .map(|(name, _)| name.clone()),
        );
        projection
    }

    /// Whether every requested field exists and is not restricted.
    pub fn is_valid_projection<S: AsRef<str>>(&self, projection: &[S]) -> bool {
        projection.iter().all(|field| {
            let field = field.as_ref();
            if field == ID_FIELD || field == OWNER_FIELD || field == "id" {
                return true;
            }
            self.fields.get(field).is_some_and(|d| !d.restricted)
        })
    }
}
