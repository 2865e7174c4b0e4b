/// Connection Management Module
///
/// This module owns the `Db` handle and the process-wide registry of named
/// handles. A handle wraps one SQLite connection together with its
/// descriptive info, the most recent result and the per-handle schema
/// caches.

use crate::config;
use crate::core::db::query::ResultSet;
use crate::core::db::schema::ColumnInfo;
use crate::core::{LitequeryError, Result};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Descriptive information about a connection.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    /// Registry name when the handle was created through [`Db::instance`].
    pub name: Option<String>,
    /// Database path, or `:memory:`.
    pub path: String,
}

/// A database handle: one connection plus the state the convenience
/// methods operate on.
#[derive(Debug)]
pub struct Db {
    pub(crate) conn: Connection,
    pub(crate) info: ConnectInfo,
    /// Result captured by the most recent statement.
    pub(crate) result: Option<ResultSet>,
    /// Rows affected by the most recent statement.
    pub(crate) changes: usize,
    /// Text of the most recent statement, as prepared.
    pub(crate) last_sql: Option<String>,
    /// Column metadata cache, keyed by unescaped table reference.
    pub(crate) tables: HashMap<String, Vec<ColumnInfo>>,
    /// Primary key cache, keyed by unescaped table reference.
    pub(crate) keys: HashMap<String, Vec<String>>,
}

/// Registry of named handles for [`Db::instance`].
static REGISTRY: OnceCell<Mutex<HashMap<String, Arc<Mutex<Db>>>>> = OnceCell::new();

fn registry() -> &'static Mutex<HashMap<String, Arc<Mutex<Db>>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

impl Db {
    /// Opens a database at the given path (`:memory:` for in-memory) and
    /// applies the configured connection pragmas.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        debug!(path = %path, "opening database");
        let conn = Connection::open(&path)?;
        conn.execute_batch(&pragma_batch())?;

        Ok(Db {
            conn,
            info: ConnectInfo { name: None, path },
            result: None,
            changes: 0,
            last_sql: None,
            tables: HashMap::new(),
            keys: HashMap::new(),
        })
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Returns the shared handle registered under `name`, opening it on
    /// first use.
    ///
    /// The path comes from the `<name>:path` configuration key, falling
    /// back to the global `path` key. Subsequent calls with the same name
    /// return the same handle.
    pub fn instance(name: &str) -> Result<Arc<Mutex<Db>>> {
        let mut guard = registry()
            .lock()
            .map_err(|_| LitequeryError::App("Failed to acquire registry lock".to_string()))?;

        if let Some(existing) = guard.get(name) {
            return Ok(Arc::clone(existing));
        }

        let path = config::get_str(&format!("{}:path", name))
            .or_else(|| config::get_str("path"))
            .unwrap_or_else(|| ":memory:".to_string());
        debug!(name, path = %path, "registering database handle");

        let mut db = Db::open(&path)?;
        db.info.name = Some(name.to_string());
        let shared = Arc::new(Mutex::new(db));
        guard.insert(name.to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    /// The database path this handle was opened with.
    pub fn path(&self) -> &str {
        &self.info.path
    }

    /// The registry name, when the handle came from [`Db::instance`].
    pub fn name(&self) -> Option<&str> {
        self.info.name.as_deref()
    }
}

/// Connection pragmas derived from configuration.
fn pragma_batch() -> String {
    let foreign_keys = config::get_bool("foreign_keys").unwrap_or(true);
    let journal_mode = config::get_str("journal_mode").unwrap_or_else(|| "WAL".to_string());
    format!(
        "PRAGMA foreign_keys = {};\nPRAGMA journal_mode = {};",
        if foreign_keys { "ON" } else { "OFF" },
        journal_mode
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.path(), ":memory:");
        assert_eq!(db.name(), None);
    }

    #[test]
    fn test_open_applies_pragmas() {
        let db = Db::open_in_memory().unwrap();
        let enabled: i64 = db
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_open_invalid_path_fails() {
        let result = Db::open("/nonexistent/path/database.db");
        assert!(result.is_err());
        match result.unwrap_err() {
            LitequeryError::Database(_) => {}
            other => panic!("Expected Database error, got {other:?}"),
        }
    }

    #[test]
    fn test_instance_returns_same_handle() {
        let first = Db::instance("conn_test_shared").unwrap();
        let second = Db::instance("conn_test_shared").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let handle = first.lock().unwrap();
        assert_eq!(handle.name(), Some("conn_test_shared"));
    }

    #[test]
    fn test_instance_reads_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configured.db");
        config::set(
            "conn_test_configured:path",
            path.to_string_lossy().into_owned(),
        );

        let shared = Db::instance("conn_test_configured").unwrap();
        let mut handle = shared.lock().unwrap();
        assert_eq!(handle.path(), path.to_string_lossy().as_ref());
        handle.raw("CREATE TABLE marker (id INTEGER)").unwrap();
        assert!(path.exists());
    }
}
