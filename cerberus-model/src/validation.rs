//! Schema validation of raw entries.
//!
//! Validation is read-only: it reports every failing field and never touches
//! the entry, so a failed call leaves nothing half-transformed.

use crate::coerce::parse_date;
use crate::schema::{FieldDescriptor, FieldType, Model, StringFormat};
use cerberus_types::{Entry, ID_FIELD};
use regex_lite::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:https?|ftp)://)?(?:[^\s:@/]+(?::[^\s:@/]*)?@)?(?:localhost|(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}|\d{1,3}(?:\.\d{1,3}){3})(?::\d{1,5})?(?:[/?#]\S*)?$",
    )
    .expect("url pattern is valid")
});

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}(?::?\d{2})?)?)?$",
    )
    .expect("date pattern is valid")
});

/// Which rules to relax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Restricted fields are accepted.
    pub skip_restriction: bool,
    /// Required fields may be absent.
    pub skip_missing_requirements: bool,
}

impl ValidationOptions {
    /// Options for a new entry: every required field, restricted allowed.
    pub fn insertion() -> Self {
        Self {
            skip_restriction: true,
            skip_missing_requirements: false,
        }
    }

    /// Options for a partial update.
    pub fn update(restrictions_relaxed: bool) -> Self {
        Self {
            skip_restriction: restrictions_relaxed,
            skip_missing_requirements: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldErrorCode {
    NotAllowed,
    Required,
    BadType,
    BadFormat,
    MinBoundary,
    MaxBoundary,
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub code: FieldErrorCode,
    pub message: String,
}

impl FieldError {
    fn new(code: FieldErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn not_allowed() -> Self {
        Self::new(FieldErrorCode::NotAllowed, "Is not allowed")
    }

    fn required() -> Self {
        Self::new(FieldErrorCode::Required, "Is required")
    }
}

/// Failures of one entry, by field.
pub type FieldErrors = BTreeMap<String, Vec<FieldError>>;

/// Failures of a batch, by position of the failing entry.
pub type BatchErrors = BTreeMap<usize, FieldErrors>;

/// The structured error attached to a rejected request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidationErrors {
    Entry(FieldErrors),
    Batch(BatchErrors),
}

impl ValidationErrors {
    /// Number of fields that failed, over every entry.
    pub fn field_count(&self) -> usize {
        match self {
            Self::Entry(fields) => fields.len(),
            Self::Batch(batch) => batch.values().map(BTreeMap::len).sum(),
        }
    }
}

/// Checks one entry against `model`.
pub fn validate_entry(
    model: &Model,
    entry: &Entry,
    options: ValidationOptions,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    for (field, value) in &entry.fields {
        if field == ID_FIELD || field == "id" {
            continue;
        }
        let failures = match model.descriptor(field) {
            None => vec![FieldError::not_allowed()],
            Some(d) if d.restricted && !options.skip_restriction => vec![FieldError::not_allowed()],
            Some(d) => validate_value(d, value),
        };
        if !failures.is_empty() {
            errors.insert(field.clone(), failures);
        }
    }

    if !options.skip_missing_requirements {
        for (field, descriptor) in &model.fields {
            if descriptor.required && !entry.fields.contains_key(field) {
                errors.insert(field.clone(), vec![FieldError::required()]);
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Checks every entry, reporting only the failing positions.
pub fn validate_entries(
    model: &Model,
    entries: &[Entry],
    options: ValidationOptions,
) -> Result<(), BatchErrors> {
    let errors: BatchErrors = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| validate_entry(model, entry, options).err().map(|e| (index, e)))
        .collect();
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn validate_value(descriptor: &FieldDescriptor, value: &Value) -> Vec<FieldError> {
    if is_empty(value) {
        return if descriptor.required {
            vec![FieldError::required()]
        } else {
            Vec::new()
        };
    }

    if !descriptor.types.is_empty() && !descriptor.types.iter().any(|&t| matches_type(t, value)) {
        let names: Vec<&str> = descriptor.types.iter().map(FieldType::as_str).collect();
        return vec![FieldError::new(
            FieldErrorCode::BadType,
            format!("Must be of type {}", names.join(",")),
        )];
    }

    let mut errors = Vec::new();

    if let (Some(format), Value::String(raw)) = (descriptor.validations.format, value)
        && !matches_format(format, raw)
    {
        let label = match format {
            StringFormat::Email => "email",
            StringFormat::Url => "url",
            StringFormat::Date => "date",
        };
        errors.push(FieldError::new(
            FieldErrorCode::BadFormat,
            format!("Must be a valid {label}"),
        ));
    }

    errors.extend(check_boundaries(descriptor, value));
    errors
}

fn matches_type(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Array => value.is_array(),
        FieldType::Object => value.is_object() || value.is_array(),
        FieldType::Date => match value {
            Value::String(raw) => parse_date(raw).is_some(),
            Value::Number(n) => n.as_i64().is_some(),
            _ => false,
        },
    }
}

fn matches_format(format: StringFormat, raw: &str) -> bool {
    match format {
        StringFormat::Email => EMAIL.is_match(raw),
        StringFormat::Url => URL.is_match(raw),
        StringFormat::Date => ISO_DATE.is_match(raw) && parse_date(raw).is_some(),
    }
}

fn check_boundaries(descriptor: &FieldDescriptor, value: &Value) -> Vec<FieldError> {
    let (min, max) = (descriptor.validations.min, descriptor.validations.max);
    if min.is_none() && max.is_none() {
        return Vec::new();
    }

    let (measure, unit) = match value {
        Value::String(s) => (s.chars().count() as f64, Some("characters")),
        Value::Array(items) => (items.len() as f64, Some("items")),
        Value::Object(map) => (map.len() as f64, Some("items")),
        Value::Number(n) => match n.as_f64() {
            Some(n) => (n, None),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut errors = Vec::new();
    if let Some(min) = min
        && measure < min
    {
        let message = match unit {
            Some(unit) => format!("Must be at least {min} {unit}"),
            None => format!("Must greater or equal to {min}"),
        };
        errors.push(FieldError::new(FieldErrorCode::MinBoundary, message));
    }
    if let Some(max) = max
        && measure > max
    {
        let message = match unit {
            Some(unit) => format!("Must be at most {max} {unit}"),
            None => format!("Must lesser or equal to {max}"),
        };
        errors.push(FieldError::new(FieldErrorCode::MaxBoundary, message));
    }
    errors
}
