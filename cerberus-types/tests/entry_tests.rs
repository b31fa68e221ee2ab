use cerberus_types::{Count, Entry, EntryId};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── EntryId ──────────────────────────────────────────────────────

#[test]
fn entry_id_new_is_unique() {
    let a = EntryId::new();
    let b = EntryId::new();
    assert_ne!(a, b);
}

#[test]
fn entry_id_display_and_parse() {
    let id = EntryId::new();
    let parsed = EntryId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn entry_id_validity() {
    assert!(EntryId::is_valid(&EntryId::new().to_string()));
    assert!(!EntryId::is_valid("507f1f77bcf86cd799439011"));
    assert!(!EntryId::is_valid(""));
}

// ── Entry payloads ───────────────────────────────────────────────

#[test]
fn entry_from_payload_accepts_id_alias() {
    let id = EntryId::new();
    let entry = Entry::from_value(json!({ "id": id.to_string(), "name": "admin" })).unwrap();
    assert_eq!(entry.id, Some(id));
    assert_eq!(entry.get_str("name"), Some("admin"));
    assert!(!entry.fields.contains_key("id"));
}

#[test]
fn entry_from_payload_reads_system_fields() {
    let id = EntryId::new();
    let owner = EntryId::new();
    let entry = Entry::from_value(json!({
        "_id": id.to_string(),
        "_owner": owner.to_string(),
        "likes": 3,
    }))
    .unwrap();
    assert_eq!(entry.id, Some(id));
    assert_eq!(entry.owner, Some(owner));
    assert_eq!(entry.get_number("likes"), Some(3.0));
}

#[test]
fn entry_with_malformed_id_is_rejected() {
    assert!(Entry::from_value(json!({ "_id": "nope" })).is_err());
}

#[test]
fn entry_serializes_system_fields_with_underscore() {
    let id = EntryId::new();
    let entry = Entry::new().with_id(id).with_owner(id).with_field("email", "a@b.com");
    assert_eq!(
        entry.to_value(),
        json!({ "_id": id.to_string(), "_owner": id.to_string(), "email": "a@b.com" })
    );
}

#[test]
fn entry_without_system_fields_omits_them() {
    let entry = Entry::new().with_field("done", true);
    assert_eq!(entry.to_value(), json!({ "done": true }));
}

#[test]
fn entry_pointer_reaches_nested_values() {
    let entry = Entry::new().with_field("address", json!({ "city": "Lyon" }));
    assert_eq!(entry.pointer("/address/city"), Some(&json!("Lyon")));
    assert_eq!(entry.pointer("/address"), Some(&json!({ "city": "Lyon" })));
    assert_eq!(entry.pointer("/missing"), None);
}

#[test]
fn entry_has_ignores_null() {
    let entry = Entry::new().with_field("a", json!(null)).with_field("b", 1);
    assert!(!entry.has("a"));
    assert!(entry.has("b"));
    assert!(!entry.has("c"));
}

#[test]
fn many_from_value_parses_arrays() {
    let entries = Entry::many_from_value(json!([{ "a": 1 }, { "a": 2 }])).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].get_number("a"), Some(2.0));
}

#[test]
fn count_serializes_as_object() {
    assert_eq!(serde_json::to_value(Count { count: 4 }).unwrap(), json!({ "count": 4 }));
}
