//! Immutable lookup table of every model known to the engine.

use crate::error::RegistryError;
use crate::schema::Model;
use crate::scope::ModelScope;
use cerberus_types::{ID_FIELD, OWNER_FIELD};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Field names the engine reserves for system values.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, OWNER_FIELD, "id"];

/// Models by name, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Arc<Model>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))
    }

    /// An unowned scope for `name`; callers attach owner and role flags.
    pub fn scope(&self, name: &str) -> Result<ModelScope, RegistryError> {
        self.require(name).map(ModelScope::new)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Collects models and checks them against each other.
#[derive(Debug, Default)]
pub struct ModelRegistryBuilder {
    models: BTreeMap<String, Model>,
}

impl ModelRegistryBuilder {
    pub fn register(mut self, model: Model) -> Result<Self, RegistryError> {
        check_identifier("namespace", &model.namespace)?;

        if self.models.contains_key(&model.name) {
            return Err(RegistryError::DuplicateName(model.name));
        }
        if let Some(existing) = self.models.values().find(|m| m.namespace == model.namespace) {
            return Err(RegistryError::DuplicateNamespace {
                namespace: model.namespace,
                existing: existing.name.clone(),
            });
        }

        for field in model.fields.keys() {
            check_identifier("field name", field)?;
            if RESERVED_FIELDS.contains(&field.as_str()) {
                return Err(RegistryError::ReservedField {
                    model: model.name.clone(),
                    field: field.clone(),
                });
            }
        }
        for index in &model.indexes {
            for field in &index.fields {
                let known = model.fields.contains_key(field)
                    || field == ID_FIELD
                    || field == OWNER_FIELD;
                if !known {
                    return Err(RegistryError::UnknownIndexField {
                        model: model.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }

        self.models.insert(model.name.clone(), model);
        Ok(self)
    }

    /// Registers every model of an iterator.
    pub fn register_all(self, models: impl IntoIterator<Item = Model>) -> Result<Self, RegistryError> {
        models.into_iter().try_fold(self, Self::register)
    }

    /// Resolves relations and freezes the registry.
    pub fn build(self) -> Result<ModelRegistry, RegistryError> {
        for model in self.models.values() {
            for (field, descriptor) in &model.fields {
                if let Some(target) = &descriptor.relation
                    && !self.models.contains_key(target)
                {
                    return Err(RegistryError::UnknownRelation {
                        model: model.name.clone(),
                        field: field.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        Ok(ModelRegistry {
            models: self
                .models
                .into_iter()
                .map(|(name, model)| (name, Arc::new(model)))
                .collect(),
        })
    }
}

/// Whether `value` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn check_identifier(kind: &'static str, value: &str) -> Result<(), RegistryError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(RegistryError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}
