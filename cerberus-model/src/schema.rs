use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative description of one kind of entry.
///
/// Models are loaded once (see [`crate::ModelRegistry`]) and never change
/// afterwards; every operation shares the same `Arc<Model>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    /// Storage namespace: table name in the persistent store and key segment
    /// in the cache.
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Entries are shared by every caller and never owner scoped.
    #[serde(default)]
    pub global: bool,
    /// Each entry owns itself: the generated id doubles as the owner.
    #[serde(default, rename = "asOwner")]
    pub as_owner: bool,
    #[serde(default)]
    pub cache: bool,
    /// Updates may touch restricted fields.
    #[serde(default, rename = "skipRestrictions")]
    pub skip_restrictions: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDescriptor>,
    /// Composite indexes, ensured after the single-field ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexSpec>,
}

impl Model {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            description: None,
            global: false,
            as_owner: false,
            cache: false,
            skip_restrictions: false,
            fields: BTreeMap::new(),
            indexes: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn as_owner(mut self, as_owner: bool) -> Self {
        self.as_owner = as_owner;
        self
    }

    pub fn cached(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn skip_restrictions(mut self, skip: bool) -> Self {
        self.skip_restrictions = skip;
        self
    }

    pub fn descriptor(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.get(field)
    }

    /// Parses a model from a JSON document.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }

    /// Parses a model from a TOML document.
    pub fn from_toml(document: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(document)
    }
}

/// One declared field of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Allowed types. Empty means any value is accepted.
    #[serde(rename = "type", default, with = "type_spec", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Validations::is_empty")]
    pub validations: Validations,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub hashed: bool,
    #[serde(default, rename = "index")]
    pub indexed: bool,
    #[serde(default)]
    pub unique: bool,
    /// Name of the referenced model for relation fields.
    #[serde(default, rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// Rejected on update unless restrictions are skipped.
    #[serde(default)]
    pub restricted: bool,
    /// Left out of the default projection.
    #[serde(default)]
    pub hidden: bool,
}

impl FieldDescriptor {
    fn typed(field_type: FieldType) -> Self {
        Self {
            types: vec![field_type],
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::typed(FieldType::String)
    }

    pub fn number() -> Self {
        Self::typed(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::typed(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::typed(FieldType::Date)
    }

    pub fn array() -> Self {
        Self::typed(FieldType::Array)
    }

    pub fn object() -> Self {
        Self::typed(FieldType::Object)
    }

    /// A string field referencing entries of `model`.
    pub fn relation(model: impl Into<String>) -> Self {
        Self {
            relation: Some(model.into()),
            ..Self::typed(FieldType::String)
        }
    }

    /// A field accepting any of `types`.
    pub fn one_of(types: impl IntoIterator<Item = FieldType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn hashed(mut self) -> Self {
        self.hashed = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        self.validations.format = Some(format);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.validations.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.validations.max = Some(max);
        self
    }

    pub fn allows(&self, field_type: FieldType) -> bool {
        self.types.contains(&field_type)
    }
}

/// Primitive value types a field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value rules checked by the validation engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
    /// Lower bound: length for strings, lists and mappings, value for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Validations {
    pub fn is_empty(&self) -> bool {
        self.format.is_none() && self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    Email,
    Url,
    Date,
}

/// An explicit (usually composite) index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// `type` is either a single name or a list of names.
mod type_spec {
    use super::FieldType;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(FieldType),
        Many(Vec<FieldType>),
    }

    pub fn serialize<S: Serializer>(types: &[FieldType], serializer: S) -> Result<S::Ok, S::Error> {
        match types {
            [single] => single.serialize(serializer),
            many => many.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FieldType>, D::Error> {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(single) => vec![single],
            OneOrMany::Many(many) => many,
        })
    }
}
