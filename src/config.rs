//! Process-wide configuration store.
//!
//! Configuration is a flat mapping of string keys to scalar or list values,
//! shared by every connection in the process. Compound keys use `:` as a
//! separator (`main:path`, `users:PK`), which is also how nested tables from
//! a TOML configuration file are flattened.

use crate::core::{LitequeryError, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(value: Vec<String>) -> Self {
        ConfigValue::List(value)
    }
}

/// Global configuration state, lazily seeded with defaults.
static CONFIG: OnceCell<Mutex<HashMap<String, ConfigValue>>> = OnceCell::new();

fn store() -> &'static Mutex<HashMap<String, ConfigValue>> {
    CONFIG.get_or_init(|| Mutex::new(defaults()))
}

fn defaults() -> HashMap<String, ConfigValue> {
    HashMap::from([
        ("path".to_string(), ConfigValue::Str(":memory:".to_string())),
        ("foreign_keys".to_string(), ConfigValue::Bool(true)),
        ("journal_mode".to_string(), ConfigValue::Str("WAL".to_string())),
    ])
}

/// Returns the value stored under `key`, if any.
pub fn get(key: &str) -> Option<ConfigValue> {
    store().lock().ok()?.get(key).cloned()
}

/// Stores `value` under `key`, replacing any previous value.
pub fn set(key: impl Into<String>, value: impl Into<ConfigValue>) {
    if let Ok(mut guard) = store().lock() {
        guard.insert(key.into(), value.into());
    }
}

/// Stores several key/value pairs at once.
pub fn set_many<I, K, V>(entries: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ConfigValue>,
{
    if let Ok(mut guard) = store().lock() {
        for (key, value) in entries {
            guard.insert(key.into(), value.into());
        }
    }
}

/// Returns a snapshot of the whole configuration mapping.
pub fn all() -> HashMap<String, ConfigValue> {
    store()
        .lock()
        .map(|guard| guard.clone())
        .unwrap_or_default()
}

/// String accessor; `None` when the key is absent or holds another type.
pub fn get_str(key: &str) -> Option<String> {
    match get(key)? {
        ConfigValue::Str(s) => Some(s),
        _ => None,
    }
}

pub fn get_bool(key: &str) -> Option<bool> {
    match get(key)? {
        ConfigValue::Bool(b) => Some(b),
        _ => None,
    }
}

pub fn get_int(key: &str) -> Option<i64> {
    match get(key)? {
        ConfigValue::Int(i) => Some(i),
        _ => None,
    }
}

pub fn get_list(key: &str) -> Option<Vec<String>> {
    match get(key)? {
        ConfigValue::List(items) => Some(items),
        _ => None,
    }
}

/// Parses TOML configuration text and merges it into the store.
///
/// Nested tables flatten into compound keys: `[main] path = "app.db"`
/// becomes `main:path`.
pub fn load_str(content: &str) -> Result<()> {
    let value: toml::Value =
        toml::from_str(content).map_err(|e| LitequeryError::Config(e.to_string()))?;
    let table = value.as_table().ok_or_else(|| {
        LitequeryError::Config("configuration root must be a table".to_string())
    })?;

    let mut flat = HashMap::new();
    for (key, item) in table {
        flatten(key, item, &mut flat)?;
    }
    debug!(count = flat.len(), "merging configuration entries");
    set_many(flat);
    Ok(())
}

/// Loads a TOML configuration file and merges it into the store.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    load_str(&content)
}

/// Default configuration file location under the platform config directory.
pub fn default_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("litequery").join("config.toml"))
}

/// Loads the default configuration file when it exists.
///
/// Returns `true` when a file was found and merged.
pub fn load_default_file() -> Result<bool> {
    match default_file_path() {
        Some(path) if path.exists() => {
            load_file(path)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn flatten(
    prefix: &str,
    value: &toml::Value,
    out: &mut HashMap<String, ConfigValue>,
) -> Result<()> {
    match value {
        toml::Value::Table(table) => {
            for (key, item) in table {
                flatten(&format!("{}:{}", prefix, key), item, out)?;
            }
        }
        other => {
            out.insert(prefix.to_string(), convert(other)?);
        }
    }
    Ok(())
}

fn convert(value: &toml::Value) -> Result<ConfigValue> {
    Ok(match value {
        toml::Value::String(s) => ConfigValue::Str(s.clone()),
        toml::Value::Integer(i) => ConfigValue::Int(*i),
        toml::Value::Float(f) => ConfigValue::Float(*f),
        toml::Value::Boolean(b) => ConfigValue::Bool(*b),
        toml::Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                list.push(item_string(item)?);
            }
            ConfigValue::List(list)
        }
        other => {
            return Err(LitequeryError::Config(format!(
                "unsupported configuration value: {}",
                other
            )))
        }
    })
}

fn item_string(value: &toml::Value) -> Result<String> {
    Ok(match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        other => {
            return Err(LitequeryError::Config(format!(
                "unsupported list item: {}",
                other
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
"cfgtest:journal_mode" = "MEMORY"

[cfgtest_reports]
path = "/tmp/reports.db"
busy_timeout = 250

[cfgtest_accounts]
PK = ["tenant_id", "account_id"]
"#;

    #[test]
    fn test_defaults_are_seeded() {
        assert_eq!(get_str("path").as_deref(), Some(":memory:"));
        assert_eq!(get_bool("foreign_keys"), Some(true));
        assert_eq!(get_str("journal_mode").as_deref(), Some("WAL"));
    }

    #[test]
    fn test_set_and_get_round_trip() {
        set("cfgtest:answer", 42i64);
        set("cfgtest:verbose", true);
        set("cfgtest:label", "primary");
        assert_eq!(get_int("cfgtest:answer"), Some(42));
        assert_eq!(get_bool("cfgtest:verbose"), Some(true));
        assert_eq!(get_str("cfgtest:label").as_deref(), Some("primary"));
        assert_eq!(get("cfgtest:missing"), None);
    }

    #[test]
    fn test_typed_accessor_rejects_other_types() {
        set("cfgtest:number", 7i64);
        assert_eq!(get_str("cfgtest:number"), None);
        assert_eq!(get_int("cfgtest:number"), Some(7));
    }

    #[test]
    fn test_load_str_flattens_tables() {
        load_str(SAMPLE_CONFIG).expect("sample config should parse");

        assert_eq!(
            get_str("cfgtest:journal_mode").as_deref(),
            Some("MEMORY")
        );
        assert_eq!(
            get_str("cfgtest_reports:path").as_deref(),
            Some("/tmp/reports.db")
        );
        assert_eq!(get_int("cfgtest_reports:busy_timeout"), Some(250));
        assert_eq!(
            get_list("cfgtest_accounts:PK"),
            Some(vec!["tenant_id".to_string(), "account_id".to_string()])
        );
    }

    #[test]
    fn test_load_str_rejects_invalid_toml() {
        let result = load_str("not = = toml");
        assert!(matches!(result, Err(LitequeryError::Config(_))));
    }

    #[test]
    fn test_all_returns_snapshot() {
        set("cfgtest:snapshot", "here");
        let snapshot = all();
        assert_eq!(
            snapshot.get("cfgtest:snapshot"),
            Some(&ConfigValue::Str("here".to_string()))
        );
    }
}
