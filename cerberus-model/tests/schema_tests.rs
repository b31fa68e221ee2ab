use cerberus_model::{FieldDescriptor, FieldFlag, FieldType, IndexSpec, Model, StringFormat};
use pretty_assertions::assert_eq;
use serde_json::json;

fn user_model() -> Model {
    Model::new("user", "users")
        .as_owner(true)
        .cached(true)
        .field(
            "email",
            FieldDescriptor::string().required().unique().format(StringFormat::Email),
        )
        .field("password", FieldDescriptor::string().required().hashed().hidden())
        .field("role", FieldDescriptor::relation("role"))
        .field("phone", FieldDescriptor::string().encrypted())
        .field("credits", FieldDescriptor::number().restricted())
        .field("birthday", FieldDescriptor::date())
        .field("lastSeen", FieldDescriptor::one_of([FieldType::Date, FieldType::Number]).indexed())
        .index(IndexSpec::new(["role", "credits"]))
}

// ── FieldDescriptor constructors ─────────────────────────────────

#[test]
fn relation_is_a_string_with_reference() {
    let d = FieldDescriptor::relation("role");
    assert_eq!(d.types, vec![FieldType::String]);
    assert_eq!(d.relation.as_deref(), Some("role"));
    assert!(d.has_flag(FieldFlag::Relation));
}

#[test]
fn flag_setters_chain() {
    let d = FieldDescriptor::string().required().hashed().hidden();
    assert!(d.required && d.hashed && d.hidden);
    assert!(!d.encrypted && !d.restricted);
    assert!(d.has_flag(FieldFlag::Required));
}

#[test]
fn boundaries_and_format_land_in_validations() {
    let d = FieldDescriptor::string().min(3.0).max(12.0).format(StringFormat::Url);
    assert_eq!(d.validations.min, Some(3.0));
    assert_eq!(d.validations.max, Some(12.0));
    assert_eq!(d.validations.format, Some(StringFormat::Url));
}

// ── Introspection ────────────────────────────────────────────────

#[test]
fn fields_with_any_flag() {
    let model = user_model();
    assert_eq!(model.fields_with_flag(&[FieldFlag::Hashed]), vec!["password"]);
    assert_eq!(
        model.fields_with_flag(&[FieldFlag::Encrypted, FieldFlag::Restricted]),
        vec!["credits", "phone"]
    );
    assert!(model.fields_with_flag(&[]).is_empty());
}

#[test]
fn fields_by_declared_type() {
    let model = user_model();
    assert_eq!(
        model.fields_by_type(&[FieldType::Date]),
        vec!["birthday", "lastSeen"]
    );
    assert_eq!(
        model.fields_by_type(&[FieldType::Number]),
        vec!["credits", "lastSeen"]
    );
    assert!(model.fields_by_type(&[FieldType::Boolean]).is_empty());
}

#[test]
fn indexes_single_fields_then_composites() {
    let indexes = user_model().indexes_for_model();
    assert_eq!(
        indexes,
        vec![
            IndexSpec { fields: vec!["email".into()], unique: true },
            IndexSpec { fields: vec!["lastSeen".into()], unique: false },
            IndexSpec { fields: vec!["role".into()], unique: false },
            IndexSpec::new(["role", "credits"]),
        ]
    );
}

#[test]
fn default_projection_skips_restricted_and_hidden() {
    let projection = user_model().default_projection();
    assert_eq!(
        projection,
        vec!["_id", "_owner", "birthday", "email", "lastSeen", "phone", "role"]
    );
}

#[test]
fn projection_validity() {
    let model = user_model();
    assert!(model.is_valid_projection(&["email", "_id", "password"]));
    assert!(model.is_valid_projection::<&str>(&[]));
    assert!(!model.is_valid_projection(&["credits"]));
    assert!(!model.is_valid_projection(&["nickname"]));
}

// ── Documents ────────────────────────────────────────────────────

#[test]
fn model_from_json_document() {
    let document = json!({
        "name": "user",
        "namespace": "users",
        "asOwner": true,
        "cache": true,
        "skipRestrictions": false,
        "fields": {
            "email": { "type": "string", "required": true, "unique": true,
                       "validations": { "format": "email" } },
            "role": { "type": "string", "$ref": "role", "index": true },
            "seen": { "type": ["date", "number"] },
            "anything": {}
        },
        "indexes": [{ "fields": ["email", "role"], "unique": true }]
    });
    let model = Model::from_json(&document.to_string()).unwrap();

    assert!(model.as_owner && model.cache && !model.global);
    assert_eq!(model.fields["role"].relation.as_deref(), Some("role"));
    assert!(model.fields["role"].indexed);
    assert_eq!(model.fields["seen"].types, vec![FieldType::Date, FieldType::Number]);
    assert!(model.fields["anything"].types.is_empty());
    assert_eq!(
        model.fields["email"].validations.format,
        Some(StringFormat::Email)
    );
    assert_eq!(model.indexes, vec![IndexSpec::new(["email", "role"]).unique()]);
}

#[test]
fn model_from_toml_document() {
    let document = r#"
        name = "post"
        namespace = "posts"
        global = true
        description = "Public posts"

        [fields.title]
        type = "string"
        required = true
        validations = { min = 3, max = 120 }

        [fields.author]
        type = "string"
        "$ref" = "user"
    "#;
    let model = Model::from_toml(document).unwrap();

    assert!(model.global);
    assert_eq!(model.description.as_deref(), Some("Public posts"));
    assert_eq!(model.fields["title"].validations.min, Some(3.0));
    assert_eq!(model.fields["title"].validations.max, Some(120.0));
    assert_eq!(model.fields["author"].relation.as_deref(), Some("user"));
}

#[test]
fn model_serializes_with_document_keys() {
    let value = serde_json::to_value(user_model()).unwrap();
    assert_eq!(value["asOwner"], json!(true));
    assert_eq!(value["fields"]["role"]["$ref"], json!("role"));
    assert_eq!(value["fields"]["email"]["type"], json!("string"));
    assert_eq!(value["fields"]["lastSeen"]["type"], json!(["date", "number"]));
    assert_eq!(value["fields"]["lastSeen"]["index"], json!(true));

    let back: Model = serde_json::from_value(value).unwrap();
    assert_eq!(back, user_model());
}
