/// Query Execution Module
///
/// Statement construction, execution and result fetching for [`Db`].
/// Builder methods assemble SQL from the helpers in [`crate::sql`], execute
/// it and capture the result on the handle, returning `&mut Self` so fetch
/// helpers can chain:
///
/// ```ignore
/// let rows = db
///     .select("users", FieldList::All, Some(&filter), None, None)?
///     .all()?;
/// ```

use crate::core::db::connection::Db;
use crate::core::{LitequeryError, Result};
use crate::sql::{self, conditions::Conditions, FieldList, Limit, Order};
use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::ToSql;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Named parameters for a statement, keyed without the colon prefix.
pub type ParamMap = BTreeMap<String, Value>;

/// One row of a captured result.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    /// The raw value of `field`, if the result has such a column.
    pub fn value(&self, field: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == field)?;
        self.values.get(index)
    }

    /// Converts the value of `field` through the driver's conversion rules.
    pub fn get<T: FromSql>(&self, field: &str) -> Result<T> {
        let value = self.value(field).ok_or_else(|| {
            LitequeryError::Query(format!("no `{}` column in result row", field))
        })?;
        T::column_result(ValueRef::from(value))
            .map_err(|e| LitequeryError::Query(format!("column `{}`: {}", field, e)))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.values.len());
        for (name, value) in self.columns.iter().zip(&self.values) {
            map.insert(name.clone(), json_value(value));
        }
        serde_json::Value::Object(map)
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => (*i).into(),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(t) => serde_json::Value::String(t.clone()),
        Value::Blob(b) => serde_json::Value::Array(
            b.iter().map(|&byte| serde_json::Value::from(byte)).collect(),
        ),
    }
}

/// A fully captured result set with a fetch cursor.
#[derive(Debug)]
pub struct ResultSet {
    columns: Arc<Vec<String>>,
    rows: Vec<Vec<Value>>,
    cursor: usize,
}

impl ResultSet {
    fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        ResultSet {
            columns: Arc::new(columns),
            rows,
            cursor: 0,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Total number of captured rows, independent of the cursor.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn next_row(&mut self) -> Option<Row> {
        let values = self.rows.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(Row {
            columns: Arc::clone(&self.columns),
            values,
        })
    }

    fn remaining(&mut self) -> Vec<Row> {
        let rows = self.rows[self.cursor..]
            .iter()
            .map(|values| Row {
                columns: Arc::clone(&self.columns),
                values: values.clone(),
            })
            .collect();
        self.cursor = self.rows.len();
        rows
    }
}

impl Db {
    /// Executes a statement verbatim: no comment stripping, no parameters.
    pub fn raw(&mut self, sql: &str) -> Result<&mut Self> {
        debug!(sql, "executing raw statement");
        let (columns, rows) = {
            let mut stmt = self.conn.prepare(sql)?;
            collect_rows(&mut stmt, &ParamMap::new())?
        };
        self.capture(sql.to_string(), columns, rows);
        Ok(self)
    }

    /// Strips comments, prepares through the driver's statement cache,
    /// binds the named parameters and executes.
    pub fn query(&mut self, sql: &str, params: &ParamMap) -> Result<&mut Self> {
        let stripped = sql::uncomment(sql);
        debug!(sql = %stripped, params = params.len(), "executing statement");
        let (columns, rows) = {
            let mut stmt = self.conn.prepare_cached(&stripped)?;
            collect_rows(&mut stmt, params)?
        };
        self.capture(stripped, columns, rows);
        Ok(self)
    }

    /// Builds and executes a SELECT statement.
    ///
    /// `filter` is a condition set translated into a single WHERE fragment
    /// with its parameter map; an empty set means no WHERE clause.
    pub fn select(
        &mut self,
        table: &str,
        fields: FieldList<'_>,
        filter: Option<&Conditions>,
        order: Option<Order<'_>>,
        limit: Option<Limit>,
    ) -> Result<&mut Self> {
        let mut statement = format!(
            "SELECT {} FROM {}",
            fields.to_sql(),
            sql::table_reference(table)?
        );
        let mut params = ParamMap::new();

        if let Some(conditions) = filter {
            if !conditions.is_empty() {
                let clause = conditions.to_where()?;
                statement.push_str(" WHERE ");
                statement.push_str(&clause.sql);
                params = clause.params;
            }
        }
        if let Some(order) = order {
            statement.push_str(" ORDER BY ");
            statement.push_str(&order.to_sql());
        }
        if let Some(limit) = limit {
            statement.push_str(" LIMIT ");
            statement.push_str(&limit.to_sql());
        }

        if params.is_empty() {
            self.raw(&statement)
        } else {
            self.query(&statement, &params)
        }
    }

    /// Inserts one row: `INSERT INTO t (a, b) VALUES (:a, :b)`.
    pub fn insert(&mut self, table: &str, data: &ParamMap) -> Result<&mut Self> {
        if data.is_empty() {
            return Err(LitequeryError::Query(format!(
                "insert into `{}` requires at least one column",
                table
            )));
        }
        let columns: Vec<String> = data.keys().map(|k| sql::escape(k)).collect();
        let placeholders: Vec<String> = data.keys().map(|k| format!(":{}", k)).collect();
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            sql::table_reference(table)?,
            columns.join(", "),
            placeholders.join(", ")
        );
        self.query(&statement, data)
    }

    /// Selects one row by key value. `key` defaults to the first
    /// primary-key column.
    pub fn read(
        &mut self,
        table: &str,
        id: impl Into<Value>,
        key: Option<&str>,
    ) -> Result<&mut Self> {
        let key = self.resolve_key(table, key)?;
        let statement = format!(
            "SELECT * FROM {} WHERE {}",
            sql::table_reference(table)?,
            sql::assignments([key.as_str()], "=", ", ")
        );
        let mut params = ParamMap::new();
        params.insert(key, id.into());
        self.query(&statement, &params)
    }

    /// Updates one row by key value: `UPDATE t SET ... WHERE key = :key`.
    ///
    /// `key` defaults to the first primary-key column; when `id` is absent
    /// it is taken from `data[key]`. Missing both is an error.
    pub fn update(
        &mut self,
        table: &str,
        data: &ParamMap,
        id: Option<Value>,
        key: Option<&str>,
    ) -> Result<&mut Self> {
        if data.is_empty() {
            return Err(LitequeryError::Query(format!(
                "update of `{}` requires at least one column",
                table
            )));
        }
        let key = self.resolve_key(table, key)?;
        let id = match id {
            Some(value) => value,
            None => match data.get(&key) {
                Some(value) if !matches!(value, Value::Null) => value.clone(),
                _ => {
                    return Err(LitequeryError::Query(format!(
                        "no `{}` key value to update `{}`, specify a key value",
                        key, table
                    )))
                }
            },
        };

        let statement = format!(
            "UPDATE {} SET {} WHERE {}",
            sql::table_reference(table)?,
            sql::assignments(data.keys().map(String::as_str), "=", ", "),
            sql::assignments([key.as_str()], "=", ", ")
        );
        let mut params = data.clone();
        params.insert(key, id);
        self.query(&statement, &params)
    }

    /// Deletes one row by key value. `key` defaults to the first
    /// primary-key column.
    pub fn delete(
        &mut self,
        table: &str,
        id: impl Into<Value>,
        key: Option<&str>,
    ) -> Result<&mut Self> {
        let key = self.resolve_key(table, key)?;
        let statement = format!(
            "DELETE FROM {} WHERE {}",
            sql::table_reference(table)?,
            sql::assignments([key.as_str()], "=", ", ")
        );
        let mut params = ParamMap::new();
        params.insert(key, id.into());
        self.query(&statement, &params)
    }

    /// Returns the next row of the captured result, advancing the cursor.
    pub fn fetch(&mut self) -> Result<Option<Row>> {
        Ok(self.result_mut()?.next_row())
    }

    /// Returns every remaining row of the captured result.
    pub fn all(&mut self) -> Result<Vec<Row>> {
        Ok(self.result_mut()?.remaining())
    }

    /// Deserializes every remaining row into `T`.
    pub fn all_as<T: DeserializeOwned>(&mut self) -> Result<Vec<T>> {
        self.all()?
            .into_iter()
            .map(|row| serde_json::from_value(row.to_json()).map_err(Into::into))
            .collect()
    }

    /// Returns the named field from every remaining row; rows without the
    /// column yield `Null`.
    pub fn column(&mut self, field: &str) -> Result<Vec<Value>> {
        let rows = self.result_mut()?.remaining();
        Ok(rows
            .iter()
            .map(|row| row.value(field).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Like [`column`](Self::column), but keyed by the string rendering of
    /// the `index` field of each row.
    pub fn column_indexed(
        &mut self,
        field: &str,
        index: &str,
    ) -> Result<BTreeMap<String, Value>> {
        let rows = self.result_mut()?.remaining();
        Ok(rows
            .iter()
            .map(|row| {
                (
                    key_string(row.value(index)),
                    row.value(field).cloned().unwrap_or(Value::Null),
                )
            })
            .collect())
    }

    /// Row count of the captured result for SELECT statements, affected
    /// rows otherwise.
    pub fn count(&self) -> usize {
        match &self.result {
            Some(result) if !result.columns().is_empty() => result.len(),
            _ => self.changes,
        }
    }

    /// The rowid of the most recent successful INSERT on this connection.
    pub fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Text of the most recent statement, as prepared.
    pub fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    /// Renders a value as a standalone SQL literal.
    pub fn quote(&self, value: &Value) -> String {
        sql::quote(value)
    }

    fn capture(&mut self, sql: String, columns: Vec<String>, rows: Vec<Vec<Value>>) {
        self.changes = if columns.is_empty() {
            self.conn.changes() as usize
        } else {
            0
        };
        self.result = Some(ResultSet::new(columns, rows));
        self.last_sql = Some(sql);
    }

    fn result_mut(&mut self) -> Result<&mut ResultSet> {
        self.result.as_mut().ok_or_else(|| {
            LitequeryError::Query("no result to fetch from; run a query first".to_string())
        })
    }

    fn resolve_key(&mut self, table: &str, key: Option<&str>) -> Result<String> {
        match key {
            Some(key) => Ok(key.to_string()),
            None => self
                .primary_key(table)?
                .first()
                .cloned()
                .ok_or_else(|| {
                    LitequeryError::Schema(format!("no usable key column for `{}`", table))
                }),
        }
    }
}

/// Runs a prepared statement with named parameters and captures column
/// names plus every row as owned values. DML statements produce an empty
/// column list.
fn collect_rows(
    stmt: &mut rusqlite::Statement<'_>,
    params: &ParamMap,
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = columns.len();

    let names: Vec<String> = params.keys().map(|k| format!(":{}", k)).collect();
    let binds: Vec<(&str, &dyn ToSql)> = names
        .iter()
        .map(String::as_str)
        .zip(params.values().map(|v| v as &dyn ToSql))
        .collect();

    let mut collected = Vec::new();
    let mut rows = stmt.query(&binds[..])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(row.get::<_, Value>(i)?);
        }
        collected.push(values);
    }
    Ok((columns, collected))
}

fn key_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Integer(i)) => i.to_string(),
        Some(Value::Real(f)) => f.to_string(),
        Some(Value::Text(t)) => t.clone(),
        Some(Value::Blob(b)) => String::from_utf8_lossy(b).into_owned(),
    }
}
