//! Store-agnostic query shape.
//!
//! A [`Query`] is built per call (usually by [`Query::from_params`] in the
//! request layer) and consumed by the persistent store adapter, which
//! translates it into its native filter language.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Filters keyed by field name.
pub type Filters = BTreeMap<String, Filter>;

/// Operator names accepted inside an operator set.
pub const OPERATORS: [&str; 5] = ["gt", "gte", "lt", "lte", "ne"];

/// A single field filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equality with a literal.
    Equals(Value),
    /// Membership in a list of literals.
    In(Vec<Value>),
    /// Comparison operators; all present operators must hold.
    Operators(Operators),
}

/// Comparison operator set. `ne` with a list value is a negated membership.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<Value>,
}

impl Operators {
    pub fn is_empty(&self) -> bool {
        self.gt.is_none()
            && self.gte.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.ne.is_none()
    }

    fn try_map<E>(self, f: &mut impl FnMut(Value) -> Result<Value, E>) -> Result<Self, E> {
        let mut apply = |v: Option<Value>| v.map(|v| map_operand(v, f)).transpose();
        Ok(Self {
            gt: apply(self.gt)?,
            gte: apply(self.gte)?,
            lt: apply(self.lt)?,
            lte: apply(self.lte)?,
            ne: apply(self.ne)?,
        })
    }
}

fn map_operand<E>(value: Value, f: &mut impl FnMut(Value) -> Result<Value, E>) -> Result<Value, E> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| f(item))
            .collect::<Result<Vec<_>, E>>()
            .map(Value::Array),
        other => f(other),
    }
}

impl Filter {
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::Equals(value.into())
    }

    pub fn any_of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::In(values.into_iter().map(Into::into).collect())
    }

    pub fn operators(ops: Operators) -> Self {
        Self::Operators(ops)
    }

    /// Applies `f` to every operand (list members element-wise).
    pub fn try_map_operands<E>(
        self,
        mut f: impl FnMut(Value) -> Result<Value, E>,
    ) -> Result<Self, E> {
        match self {
            Self::Equals(v) => f(v).map(Self::Equals),
            Self::In(items) => items
                .into_iter()
                .map(&mut f)
                .collect::<Result<Vec<_>, E>>()
                .map(Self::In),
            Self::Operators(ops) => ops.try_map(&mut f).map(Self::Operators),
        }
    }

    pub fn map_operands(self, mut f: impl FnMut(Value) -> Value) -> Self {
        match self.try_map_operands::<std::convert::Infallible>(|v| Ok(f(v))) {
            Ok(filter) => filter,
            Err(never) => match never {},
        }
    }
}

impl From<Value> for Filter {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::In(items),
            Value::Object(map)
                if !map.is_empty() && map.keys().all(|k| OPERATORS.contains(&k.as_str())) =>
            {
                let mut ops = Operators::default();
                for (key, operand) in map {
                    let slot = match key.as_str() {
                        "gt" => &mut ops.gt,
                        "gte" => &mut ops.gte,
                        "lt" => &mut ops.lt,
                        "lte" => &mut ops.lte,
                        _ => &mut ops.ne,
                    };
                    *slot = Some(operand);
                }
                Self::Operators(ops)
            }
            other => Self::Equals(other),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Equals(v) => v.serialize(serializer),
            Self::In(items) => items.serialize(serializer),
            Self::Operators(ops) => {
                let fields = [
                    ("gt", &ops.gt),
                    ("gte", &ops.gte),
                    ("lt", &ops.lt),
                    ("lte", &ops.lte),
                    ("ne", &ops.ne),
                ];
                let mut map = serializer.serialize_map(None)?;
                for (name, value) in fields {
                    if let Some(value) = value {
                        map.serialize_entry(name, value)?;
                    }
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// `{filters, sort, limit, offset, fields}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, filter: Filter) -> Self {
        self.filters.insert(field.into(), filter);
        self
    }

    pub fn sort_by(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Parses request query-string pairs.
    ///
    /// `limit`, `offset`, `sort` (`a,-b`) and `fields` (`a,b`) are reserved;
    /// every other key is a filter. `key=[a,b]` is a membership filter and
    /// `key[op]=v` adds `op` to the field's operator set.
    pub fn from_params<I, K, V>(params: I, limits: QueryLimits) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::default();
        let mut limit = None;
        let mut operators: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "limit" => limit = Some(value.to_string()),
                "offset" => query.offset = parse_usize("offset", value)?,
                "sort" => query.sort = parse_sort(value),
                "fields" => query.fields = parse_list(value),
                _ => match split_operator(key) {
                    Some((field, op)) => {
                        operators
                            .entry(field.to_string())
                            .or_default()
                            .insert(op.to_string(), value.to_string());
                    }
                    None => {
                        query.filters.insert(key.to_string(), parse_filter_value(value));
                    }
                },
            }
        }

        for (field, ops) in operators {
            query.filters.insert(field.clone(), build_operators(&field, ops)?);
        }
        query.limit = Some(parse_limit(limit.as_deref(), limits)?);
        Ok(query)
    }
}

/// Bounds applied by [`Query::from_params`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// Errors raised while parsing request query parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Limit parameter must be lower or equal to {max}, value passed is {value}")]
    LimitTooHigh { max: usize, value: String },

    #[error("Limit parameter must be greater than 0, value passed is {0}")]
    LimitTooLow(String),

    #[error("{param} parameter must be a number, value passed is {value}")]
    InvalidNumber { param: &'static str, value: String },

    #[error("[{0}] is not a valid operator")]
    BadOperator(String),

    #[error("filter on {0} mixes eq with other operators")]
    MixedEquality(String),
}

fn parse_limit(raw: Option<&str>, limits: QueryLimits) -> Result<usize, QueryError> {
    let Some(raw) = raw else {
        return Ok(limits.default_limit);
    };
    let parsed: i64 = raw.trim().parse().map_err(|_| QueryError::InvalidNumber {
        param: "limit",
        value: raw.to_string(),
    })?;
    if parsed < 0 {
        return Err(QueryError::LimitTooLow(raw.to_string()));
    }
    let parsed = parsed as usize;
    if parsed > limits.max_limit {
        return Err(QueryError::LimitTooHigh {
            max: limits.max_limit,
            value: raw.to_string(),
        });
    }
    Ok(parsed)
}

fn parse_usize(param: &'static str, raw: &str) -> Result<usize, QueryError> {
    raw.trim().parse().map_err(|_| QueryError::InvalidNumber {
        param,
        value: raw.to_string(),
    })
}

fn parse_sort(raw: &str) -> Vec<SortField> {
    parse_list(raw)
        .into_iter()
        .map(|field| match field.strip_prefix('-') {
            Some(name) => SortField::desc(name),
            None => SortField::asc(field),
        })
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_filter_value(raw: &str) -> Filter {
    match parse_operand(raw) {
        Value::Array(items) => Filter::In(items),
        other => Filter::Equals(other),
    }
}

/// `[a,b]` becomes a list of strings, anything else a single string.
fn parse_operand(raw: &str) -> Value {
    match raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => Value::Array(
            inner
                .split(',')
                .map(|s| Value::String(s.trim().to_string()))
                .collect(),
        ),
        None => Value::String(raw.to_string()),
    }
}

/// Splits `field[op]` into `(field, op)`.
fn split_operator(key: &str) -> Option<(&str, &str)> {
    let (field, rest) = key.split_once('[')?;
    let op = rest.strip_suffix(']')?;
    Some((field, op))
}

fn build_operators(field: &str, ops: BTreeMap<String, String>) -> Result<Filter, QueryError> {
    let mut operators = Operators::default();
    let mut equality = None;
    for (op, raw) in ops {
        let operand = parse_operand(&raw);
        match op.as_str() {
            "eq" => equality = Some(operand),
            "gt" => operators.gt = Some(operand),
            "gte" => operators.gte = Some(operand),
            "lt" => operators.lt = Some(operand),
            "lte" => operators.lte = Some(operand),
            "ne" => operators.ne = Some(operand),
            _ => return Err(QueryError::BadOperator(op)),
        }
    }
    match equality {
        Some(_) if !operators.is_empty() => Err(QueryError::MixedEquality(field.to_string())),
        Some(Value::Array(items)) => Ok(Filter::In(items)),
        Some(value) => Ok(Filter::Equals(value)),
        None => Ok(Filter::Operators(operators)),
    }
}
