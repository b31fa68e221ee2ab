use cerberus_access::{AccessConfig, CerberusConfig, ConfigError, DataAccess};
use cerberus_crypto::CipherKey;
use cerberus_model::{FieldDescriptor, Model, ModelScope};
use cerberus_types::{Entry, EntryId};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn empty_document_uses_defaults() {
    let config = CerberusConfig::from_toml_str("").unwrap();
    assert_eq!(config, CerberusConfig::default());
    assert_eq!(config.access, AccessConfig { default_limit: 20, max_limit: 100 });
    assert_eq!(config.cache.namespace, "cerberus");
    assert_eq!(config.cache.expiration_secs, 3600);
    assert!(!config.cache.enabled);
    assert!(config.storage.path.is_none());
}

#[test]
fn sections_override_defaults() {
    let config = CerberusConfig::from_toml_str(
        r#"
        [storage]
        path = "/var/lib/cerberus.db"

        [cache]
        enabled = true
        namespace = "api"
        nodes = 3

        [cache.redlock]
        retry_count = 4

        [access]
        default_limit = 10
        "#,
    )
    .unwrap();

    assert_eq!(config.storage.path, Some(PathBuf::from("/var/lib/cerberus.db")));
    assert!(config.cache.enabled);
    assert_eq!(config.cache.namespace, "api");
    assert_eq!(config.cache.nodes, 3);
    assert_eq!(config.cache.redlock.retry_count, 4);
    assert_eq!(config.cache.redlock.retry_delay_ms, 100);
    assert_eq!(config.access.default_limit, 10);
    assert_eq!(config.access.max_limit, 100);
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = CerberusConfig::from_toml_str("[cache\nenabled = true").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn inconsistent_limits_are_rejected() {
    let err = CerberusConfig::from_toml_str("[access]\ndefault_limit = 50\nmax_limit = 10").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "access.max_limit", .. }));
}

#[test]
fn from_path_reads_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[cache]\nexpiration_secs = 60").unwrap();

    let config = CerberusConfig::from_path(file.path()).unwrap();
    assert_eq!(config.cache.expiration_secs, 60);

    let missing = CerberusConfig::from_path(&file.path().with_extension("missing")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io(_)));
}

// ── Environment ──────────────────────────────────────────────────

#[test]
fn environment_pairs_override_values() {
    let key = CipherKey::generate().to_base64();
    let config = CerberusConfig::default()
        .apply_env(env(&[
            ("CERBERUS_NAMESPACE", "prod"),
            ("CERBERUS_SQLITE_PATH", "/tmp/prod.db"),
            ("CERBERUS_CACHE_EXPIRATION", "120"),
            ("CERBERUS_CRYPTO_KEY", &key),
            ("CERBERUS_LIMIT", "15"),
            ("CERBERUS_MAX_LIMIT", "30"),
            ("HOME", "/root"),
        ]))
        .unwrap();

    assert_eq!(config.cache.namespace, "prod");
    assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/prod.db")));
    assert_eq!(config.cache.expiration_secs, 120);
    assert_eq!(config.crypto.key.as_deref(), Some(key.as_str()));
    assert_eq!(config.access, AccessConfig { default_limit: 15, max_limit: 30 });
}

#[test]
fn non_numeric_environment_values_are_rejected() {
    let err = CerberusConfig::default()
        .apply_env(env(&[("CERBERUS_LIMIT", "twenty")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "access.default_limit", .. }));
}

#[test]
fn empty_sqlite_path_means_in_memory() {
    let config = CerberusConfig::from_toml_str("[storage]\npath = \"x.db\"")
        .unwrap()
        .apply_env(env(&[("CERBERUS_SQLITE_PATH", "")]))
        .unwrap();
    assert!(config.storage.path.is_none());
}

#[test]
fn effective_limit_clamps() {
    let access = AccessConfig::default();
    assert_eq!(access.effective_limit(None), 20);
    assert_eq!(access.effective_limit(Some(7)), 7);
    assert_eq!(access.effective_limit(Some(1000)), 100);
}

// ── Crypto ───────────────────────────────────────────────────────

#[test]
fn configured_key_is_used() {
    let key = CipherKey::generate();
    let config = CerberusConfig::default()
        .apply_env(env(&[("CERBERUS_CRYPTO_KEY", &key.to_base64())]))
        .unwrap();
    assert_eq!(config.crypto.cipher_key().unwrap().as_bytes(), key.as_bytes());
}

#[test]
fn bad_key_is_a_crypto_error() {
    let config = CerberusConfig::default()
        .apply_env(env(&[("CERBERUS_CRYPTO_KEY", "dG9vLXNob3J0")]))
        .unwrap();
    assert!(matches!(config.crypto.cipher_key(), Err(ConfigError::Crypto(_))));
}

#[test]
fn debug_output_redacts_the_key() {
    let config = CerberusConfig::default()
        .apply_env(env(&[("CERBERUS_CRYPTO_KEY", "c2VjcmV0")]))
        .unwrap();
    let rendered = format!("{:?}", config.crypto);
    assert!(rendered.contains("[REDACTED]"));
    assert!(!rendered.contains("c2VjcmV0"));
}

// ── Wiring ───────────────────────────────────────────────────────

#[tokio::test]
async fn from_config_wires_store_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let document = format!(
        "[storage]\npath = {:?}\n\n[cache]\nenabled = true\n\n[crypto]\nmemory_cost = 1024\ntime_cost = 1\n",
        dir.path().join("cerberus.db")
    );
    let config = CerberusConfig::from_toml_str(&document).unwrap();
    let access = DataAccess::from_config(&config).unwrap();
    assert!(access.cache().is_some());

    let model = Arc::new(Model::new("note", "notes").cached(true).field("title", FieldDescriptor::string()));
    let scope = ModelScope::new(model).with_owner(EntryId::new());
    let note = access
        .insert(&scope, Entry::new().with_field("title", "persisted"))
        .await
        .unwrap();

    let id = note.id.unwrap().to_string();
    assert!(access.cache().unwrap().get(&scope, &id).await.unwrap().is_some());
    assert!(dir.path().join("cerberus.db").exists());
}

#[test]
fn cache_is_optional() {
    let access = DataAccess::from_config(&CerberusConfig::default()).unwrap();
    assert!(access.cache().is_none());
}
