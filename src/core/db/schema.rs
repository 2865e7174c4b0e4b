/// Schema Introspection Module
///
/// Column metadata and primary-key discovery for [`Db`], with per-handle
/// caching. Primary keys can be overridden through the configuration store
/// with a `<table>:PK` list, which also short-circuits introspection for
/// tables that have none.

use crate::config;
use crate::core::db::connection::Db;
use crate::core::{LitequeryError, Result};
use crate::sql::{escape, QualifiedName};
use rusqlite::{Connection, Row};
use tracing::debug;

/// Metadata for one table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type (e.g. "INTEGER", "TEXT", "REAL", "BLOB")
    pub type_name: String,
    /// Whether the column rejects NULL values
    pub notnull: bool,
    /// Whether this column is part of the primary key
    pub pk: bool,
    /// Default value expression (if any)
    pub dflt_value: Option<String>,
}

impl ColumnInfo {
    /// Creates a ColumnInfo from a `PRAGMA table_info` result row.
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ColumnInfo {
            name: row.get(1)?,
            type_name: row.get(2)?,
            notnull: row.get(3)?,
            pk: row.get(5)?,
            dflt_value: row.get(4)?,
        })
    }
}

impl Db {
    /// Returns the column metadata of `table`, in declaration order.
    ///
    /// The first lookup introspects the database; later lookups are served
    /// from the handle's cache. An unknown table is an error.
    pub fn fields(&mut self, table: &str) -> Result<&[ColumnInfo]> {
        let name = QualifiedName::parse(table)?;
        let key = name.cache_key();

        if !self.tables.contains_key(&key) {
            let columns = load_columns(&self.conn, &name)?;
            if columns.is_empty() {
                return Err(LitequeryError::Schema(format!(
                    "no `{}` table, specify a valid table",
                    key
                )));
            }
            debug!(table = %key, columns = columns.len(), "cached column metadata");
            self.tables.insert(key.clone(), columns);
        }

        Ok(self.tables[&key].as_slice())
    }

    /// Returns the primary-key column names of `table`.
    ///
    /// Resolution order: the `<table>:PK` configuration override, the
    /// handle's cache, then the `pk` flags of [`fields`](Self::fields).
    /// A table without a primary key is an error.
    pub fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let name = QualifiedName::parse(table)?;
        let key = name.cache_key();

        if let Some(columns) = config::get_list(&format!("{}:PK", key)) {
            return Ok(columns);
        }
        if let Some(columns) = self.keys.get(&key) {
            return Ok(columns.clone());
        }

        let derived: Vec<String> = self
            .fields(table)?
            .iter()
            .filter(|column| column.pk)
            .map(|column| column.name.clone())
            .collect();
        if derived.is_empty() {
            return Err(LitequeryError::Schema(format!(
                "no primary key on `{}` table, set a primary key",
                key
            )));
        }

        self.keys.insert(key, derived.clone());
        Ok(derived)
    }
}

fn load_columns(conn: &Connection, name: &QualifiedName) -> Result<Vec<ColumnInfo>> {
    let pragma = match &name.database {
        Some(database) => format!("PRAGMA {}.table_info('{}')", escape(database), name.table),
        None => format!("PRAGMA table_info('{}')", name.table),
    };

    let mut stmt = conn.prepare(&pragma)?;
    let column_iter = stmt.query_map([], |row| ColumnInfo::from_pragma_row(row))?;

    let mut columns = Vec::new();
    for column in column_iter {
        columns.push(column?);
    }
    Ok(columns)
}
