use cerberus_types::{Filter, Operators, Query, QueryError, QueryLimits, SortField};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn limits() -> QueryLimits {
    QueryLimits {
        default_limit: 20,
        max_limit: 50,
    }
}

fn parse(pairs: &[(&str, &str)]) -> Result<Query, QueryError> {
    Query::from_params(pairs.iter().copied(), limits())
}

// ── Filter conversion ────────────────────────────────────────────

#[test]
fn filter_from_scalar_is_equality() {
    assert_eq!(Filter::from(json!("a")), Filter::Equals(json!("a")));
    assert_eq!(Filter::from(json!(3)), Filter::Equals(json!(3)));
}

#[test]
fn filter_from_list_is_membership() {
    assert_eq!(Filter::from(json!(["a", "b"])), Filter::any_of(["a", "b"]));
}

#[test]
fn filter_from_operator_object() {
    let filter = Filter::from(json!({ "gte": 1, "ne": [3, 4] }));
    assert_eq!(
        filter,
        Filter::Operators(Operators {
            gte: Some(json!(1)),
            ne: Some(json!([3, 4])),
            ..Default::default()
        })
    );
}

#[test]
fn filter_from_plain_object_is_equality() {
    let filter = Filter::from(json!({ "city": "Lyon" }));
    assert_eq!(filter, Filter::Equals(json!({ "city": "Lyon" })));
}

#[test]
fn filter_serde_roundtrip_keeps_shape() {
    let value = json!({ "gt": 1, "lt": 9 });
    let filter: Filter = serde_json::from_value(value.clone()).unwrap();
    assert_eq!(serde_json::to_value(&filter).unwrap(), value);
}

#[test]
fn map_operands_reaches_list_members_and_operators() {
    let double = |v: Value| json!(v.as_i64().unwrap_or(0) * 2);
    assert_eq!(Filter::any_of([1, 2]).map_operands(double), Filter::any_of([2, 4]));

    let ops = Filter::from(json!({ "gt": 1, "ne": [2, 3] })).map_operands(double);
    assert_eq!(ops, Filter::from(json!({ "gt": 2, "ne": [4, 6] })));
}

#[test]
fn try_map_operands_propagates_errors() {
    let result = Filter::any_of(["ok", "bad"]).try_map_operands(|v| {
        if v == json!("bad") { Err("bad operand") } else { Ok(v) }
    });
    assert_eq!(result, Err("bad operand"));
}

// ── Query-string parsing ─────────────────────────────────────────

#[test]
fn params_default_limit_applies() {
    let query = parse(&[]).unwrap();
    assert_eq!(query.limit, Some(20));
    assert_eq!(query.offset, 0);
    assert!(query.filters.is_empty());
}

#[test]
fn params_reserved_keys() {
    let query = parse(&[
        ("limit", "10"),
        ("offset", "5"),
        ("sort", "-createdAt,name"),
        ("fields", "name,email"),
    ])
    .unwrap();
    assert_eq!(query.limit, Some(10));
    assert_eq!(query.offset, 5);
    assert_eq!(query.sort, vec![SortField::desc("createdAt"), SortField::asc("name")]);
    assert_eq!(query.fields, vec!["name".to_string(), "email".to_string()]);
}

#[test]
fn params_limit_bounds() {
    assert_eq!(
        parse(&[("limit", "51")]),
        Err(QueryError::LimitTooHigh { max: 50, value: "51".into() })
    );
    assert_eq!(parse(&[("limit", "-1")]), Err(QueryError::LimitTooLow("-1".into())));
    assert!(matches!(parse(&[("limit", "ten")]), Err(QueryError::InvalidNumber { .. })));
}

#[test]
fn params_filters() {
    let query = parse(&[
        ("name", "admin"),
        ("role", "[a,b]"),
        ("age[gte]", "18"),
        ("age[lt]", "65"),
        ("status[ne]", "[banned,deleted]"),
        ("email[eq]", "a@b.com"),
    ])
    .unwrap();

    assert_eq!(query.filters["name"], Filter::equals("admin"));
    assert_eq!(query.filters["role"], Filter::any_of(["a", "b"]));
    assert_eq!(query.filters["age"], Filter::from(json!({ "gte": "18", "lt": "65" })));
    assert_eq!(
        query.filters["status"],
        Filter::from(json!({ "ne": ["banned", "deleted"] }))
    );
    assert_eq!(query.filters["email"], Filter::equals("a@b.com"));
}

#[test]
fn params_reject_unknown_operator() {
    assert_eq!(
        parse(&[("age[like]", "1")]),
        Err(QueryError::BadOperator("like".into()))
    );
}

#[test]
fn params_reject_eq_mixed_with_ranges() {
    assert_eq!(
        parse(&[("age[eq]", "1"), ("age[gt]", "0")]),
        Err(QueryError::MixedEquality("age".into()))
    );
}

#[test]
fn query_error_messages() {
    assert_eq!(
        QueryError::BadOperator("like".into()).to_string(),
        "[like] is not a valid operator"
    );
    assert_eq!(
        QueryError::LimitTooHigh { max: 50, value: "99".into() }.to_string(),
        "Limit parameter must be lower or equal to 50, value passed is 99"
    );
}
